//! Routing tables and cut batches
//!
//! Types here are checked at construction: a [`Cut`] always carries a
//! non-empty, duplicate-free selector list with a target address that fits
//! its action, and a [`RoutingTable`] is always a partition of selectors
//! across distinct facet addresses.

use crate::error::{CutError, RejectReason};
use diamond_primitives::{Address, Selector};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Routing mutation kind
///
/// The discriminants are the values the diamond-cut protocol expects on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CutAction {
    /// Bind selectors that are not routed yet
    Add = 0,
    /// Rebind routed selectors to a different facet
    Replace = 1,
    /// Unbind selectors; target is the zero address
    Remove = 2,
}

impl CutAction {
    /// Wire value
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CutAction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Add),
            1 => Ok(Self::Replace),
            2 => Ok(Self::Remove),
            other => Err(other),
        }
    }
}

impl fmt::Display for CutAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Replace => f.write_str("replace"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// One routing mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCut")]
pub struct Cut {
    facet_address: Address,
    function_selectors: Vec<Selector>,
    action: CutAction,
}

impl Cut {
    /// Create a checked cut
    ///
    /// # Errors
    /// - [`CutError::EmptySelectors`] if `selectors` is empty
    /// - [`CutError::DuplicateSelector`] if a selector repeats
    /// - [`CutError::InvalidFacetAddress`] if `Remove` targets a non-zero
    ///   address or `Add`/`Replace` target the zero address
    pub fn new(
        facet_address: Address,
        selectors: Vec<Selector>,
        action: CutAction,
    ) -> Result<Self, CutError> {
        let zero_expected = action == CutAction::Remove;
        if facet_address.is_zero() != zero_expected {
            return Err(CutError::InvalidFacetAddress {
                facet: facet_address,
                action,
            });
        }
        check_selectors(facet_address, &selectors)?;
        Ok(Self {
            facet_address,
            function_selectors: selectors,
            action,
        })
    }

    /// `Add` cut binding `selectors` to `facet`
    ///
    /// # Errors
    /// See [`Cut::new`]
    #[inline]
    pub fn add(facet: Address, selectors: Vec<Selector>) -> Result<Self, CutError> {
        Self::new(facet, selectors, CutAction::Add)
    }

    /// `Replace` cut rebinding `selectors` to `facet`
    ///
    /// # Errors
    /// See [`Cut::new`]
    #[inline]
    pub fn replace(facet: Address, selectors: Vec<Selector>) -> Result<Self, CutError> {
        Self::new(facet, selectors, CutAction::Replace)
    }

    /// `Remove` cut unbinding `selectors`
    ///
    /// # Errors
    /// See [`Cut::new`]
    #[inline]
    pub fn remove(selectors: Vec<Selector>) -> Result<Self, CutError> {
        Self::new(Address::ZERO, selectors, CutAction::Remove)
    }

    /// `Remove` cut for every selector of a routing entry
    ///
    /// Entries are checked at construction, so this cannot fail.
    #[must_use]
    pub fn unroute_entry(entry: &RoutingEntry) -> Self {
        Self {
            facet_address: Address::ZERO,
            function_selectors: entry.function_selectors.clone(),
            action: CutAction::Remove,
        }
    }

    /// Target facet (zero for `Remove`)
    #[inline]
    #[must_use]
    pub fn facet_address(&self) -> Address {
        self.facet_address
    }

    /// Selectors in submission order
    #[inline]
    #[must_use]
    pub fn selectors(&self) -> &[Selector] {
        &self.function_selectors
    }

    /// Action
    #[inline]
    #[must_use]
    pub fn action(&self) -> CutAction {
        self.action
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCut {
    facet_address: Address,
    function_selectors: Vec<Selector>,
    action: CutAction,
}

impl TryFrom<RawCut> for Cut {
    type Error = CutError;

    fn try_from(raw: RawCut) -> Result<Self, Self::Error> {
        Self::new(raw.facet_address, raw.function_selectors, raw.action)
    }
}

fn check_selectors(facet: Address, selectors: &[Selector]) -> Result<(), CutError> {
    if selectors.is_empty() {
        return Err(CutError::EmptySelectors { facet });
    }
    let mut seen = HashSet::with_capacity(selectors.len());
    for selector in selectors {
        if !seen.insert(*selector) {
            return Err(CutError::DuplicateSelector {
                selector: *selector,
                facet,
            });
        }
    }
    Ok(())
}

/// Ordered sequence of cuts applied as one atomic transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CutBatch {
    cuts: Vec<Cut>,
}

impl CutBatch {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cut
    #[inline]
    pub fn push(&mut self, cut: Cut) {
        self.cuts.push(cut);
    }

    /// Cuts in order
    #[inline]
    #[must_use]
    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    /// Number of cuts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Check if the batch has no cuts
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Total selectors touched by the batch
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.cuts.iter().map(|c| c.selectors().len()).sum()
    }

    /// Number of selectors touched by cuts of `action`
    #[must_use]
    pub fn count_action(&self, action: CutAction) -> usize {
        self.cuts
            .iter()
            .filter(|c| c.action() == action)
            .map(|c| c.selectors().len())
            .sum()
    }

    /// Iterate over cuts
    pub fn iter(&self) -> impl Iterator<Item = &Cut> {
        self.cuts.iter()
    }
}

impl FromIterator<Cut> for CutBatch {
    fn from_iter<I: IntoIterator<Item = Cut>>(iter: I) -> Self {
        Self {
            cuts: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CutBatch {
    type Item = &'a Cut;
    type IntoIter = std::slice::Iter<'a, Cut>;

    fn into_iter(self) -> Self::IntoIter {
        self.cuts.iter()
    }
}

/// One facet's share of the routing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawEntry")]
pub struct RoutingEntry {
    facet_address: Address,
    function_selectors: Vec<Selector>,
}

impl RoutingEntry {
    /// Create a checked entry
    ///
    /// # Errors
    /// Returns error for the zero address, an empty list or a repeated selector
    pub fn new(facet_address: Address, selectors: Vec<Selector>) -> Result<Self, CutError> {
        if facet_address.is_zero() {
            return Err(CutError::InvalidFacetAddress {
                facet: facet_address,
                action: CutAction::Add,
            });
        }
        check_selectors(facet_address, &selectors)?;
        Ok(Self {
            facet_address,
            function_selectors: selectors,
        })
    }

    /// Facet serving the selectors
    #[inline]
    #[must_use]
    pub fn facet_address(&self) -> Address {
        self.facet_address
    }

    /// Routed selectors
    #[inline]
    #[must_use]
    pub fn selectors(&self) -> &[Selector] {
        &self.function_selectors
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    facet_address: Address,
    function_selectors: Vec<Selector>,
}

impl TryFrom<RawEntry> for RoutingEntry {
    type Error = CutError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        Self::new(raw.facet_address, raw.function_selectors)
    }
}

/// The diamond's selector-to-facet routing, as a partition over facets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RoutingEntry>", into = "Vec<RoutingEntry>")]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
    routes: HashMap<Selector, Address>,
}

impl RoutingTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries, checking the partition invariant
    ///
    /// # Errors
    /// - [`CutError::DuplicateFacet`] if a facet address repeats
    /// - [`CutError::SelectorCollision`] if a selector appears in two entries
    pub fn from_entries(entries: Vec<RoutingEntry>) -> Result<Self, CutError> {
        let mut routes = HashMap::new();
        let mut facets = HashSet::new();
        for entry in &entries {
            if !facets.insert(entry.facet_address) {
                return Err(CutError::DuplicateFacet {
                    facet: entry.facet_address,
                });
            }
            for selector in &entry.function_selectors {
                if let Some(existing) = routes.insert(*selector, entry.facet_address) {
                    return Err(CutError::SelectorCollision {
                        selector: *selector,
                        existing: existing.to_string(),
                        incoming: entry.facet_address.to_string(),
                    });
                }
            }
        }
        Ok(Self { entries, routes })
    }

    /// Entries in table order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    /// Number of facets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no selector is routed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of routed selectors
    #[inline]
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.routes.len()
    }

    /// Facet currently serving `selector`
    #[inline]
    #[must_use]
    pub fn facet_of(&self, selector: &Selector) -> Option<Address> {
        self.routes.get(selector).copied()
    }

    /// Entry of `facet`, if it serves anything
    #[must_use]
    pub fn entry(&self, facet: &Address) -> Option<&RoutingEntry> {
        self.entries.iter().find(|e| e.facet_address == *facet)
    }

    /// Facet addresses in table order
    pub fn facet_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries.iter().map(|e| e.facet_address)
    }

    /// Apply a batch the way the diamond validates it, without side effects
    ///
    /// Returns the table the diamond would hold after the batch. The whole
    /// batch fails on the first violating selector.
    ///
    /// # Errors
    /// Returns [`CutError::Rejected`] naming the offending cut and selector
    pub fn apply(&self, batch: &CutBatch) -> Result<Self, CutError> {
        let mut table: IndexMap<Address, Vec<Selector>> = self
            .entries
            .iter()
            .map(|e| (e.facet_address, e.function_selectors.clone()))
            .collect();
        let mut routes = self.routes.clone();

        for (index, cut) in batch.iter().enumerate() {
            let reject = |selector: Selector, reason: RejectReason| CutError::Rejected {
                index,
                selector,
                reason,
            };
            for selector in cut.selectors() {
                match cut.action() {
                    CutAction::Add => {
                        if let Some(facet) = routes.get(selector) {
                            return Err(reject(*selector, RejectReason::AlreadyRouted { facet: *facet }));
                        }
                        routes.insert(*selector, cut.facet_address());
                        table.entry(cut.facet_address()).or_default().push(*selector);
                    }
                    CutAction::Replace => {
                        let Some(old) = routes.get(selector).copied() else {
                            return Err(reject(*selector, RejectReason::NotRouted));
                        };
                        if old == cut.facet_address() {
                            return Err(reject(*selector, RejectReason::SameFacet));
                        }
                        unroute(&mut table, old, selector);
                        routes.insert(*selector, cut.facet_address());
                        table.entry(cut.facet_address()).or_default().push(*selector);
                    }
                    CutAction::Remove => {
                        let Some(old) = routes.remove(selector) else {
                            return Err(reject(*selector, RejectReason::NotRouted));
                        };
                        unroute(&mut table, old, selector);
                    }
                }
            }
        }

        let entries = table
            .into_iter()
            .map(|(facet_address, function_selectors)| RoutingEntry {
                facet_address,
                function_selectors,
            })
            .collect();
        Ok(Self { entries, routes })
    }
}

fn unroute(table: &mut IndexMap<Address, Vec<Selector>>, facet: Address, selector: &Selector) {
    if let Some(selectors) = table.get_mut(&facet) {
        selectors.retain(|s| s != selector);
        if selectors.is_empty() {
            table.shift_remove(&facet);
        }
    }
}

impl TryFrom<Vec<RoutingEntry>> for RoutingTable {
    type Error = CutError;

    fn try_from(entries: Vec<RoutingEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(entries)
    }
}

impl From<RoutingTable> for Vec<RoutingEntry> {
    fn from(table: RoutingTable) -> Self {
        table.entries
    }
}

/// Facet addresses that no planned `Remove` may target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtectedSet {
    facets: IndexSet<Address>,
}

impl ProtectedSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protected facet
    #[inline]
    pub fn insert(&mut self, facet: Address) -> bool {
        self.facets.insert(facet)
    }

    /// Check if `facet` is protected
    #[inline]
    #[must_use]
    pub fn contains(&self, facet: &Address) -> bool {
        self.facets.contains(facet)
    }

    /// Number of protected facets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// Check if nothing is protected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Protected facets in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.facets.iter()
    }
}

impl FromIterator<Address> for ProtectedSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            facets: iter.into_iter().collect(),
        }
    }
}

/// One-shot call executed after the cuts of a batch, in the same transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    target: Address,
    #[serde(with = "hex_bytes")]
    calldata: Vec<u8>,
}

impl InitPayload {
    /// Create payload calling `target` with `calldata`
    ///
    /// # Errors
    /// Returns [`CutError::InvalidInit`] for a zero target or empty call data
    pub fn new(target: Address, calldata: Vec<u8>) -> Result<Self, CutError> {
        if target.is_zero() {
            return Err(CutError::InvalidInit("initializer target is the zero address".to_string()));
        }
        if calldata.is_empty() {
            return Err(CutError::InvalidInit("initializer call data is empty".to_string()));
        }
        Ok(Self { target, calldata })
    }

    /// Contract the diamond delegates to
    #[inline]
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }

    /// Encoded call
    #[inline]
    #[must_use]
    pub fn calldata(&self) -> &[u8] {
        &self.calldata
    }

    /// `(target, calldata)` as submitted, using the zero-address/empty-data
    /// sentinel when there is no payload
    #[must_use]
    pub fn wire_parts(payload: Option<&Self>) -> (Address, &[u8]) {
        match payload {
            Some(p) => (p.target, &p.calldata),
            None => (Address::ZERO, &[]),
        }
    }
}

/// A resolved facet the upgrade wants routed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    /// Contract name
    pub name: String,
    /// Deployed address (identity)
    pub address: Address,
    /// Selectors it should serve
    pub selectors: Vec<Selector>,
}

impl Facet {
    /// Create new facet descriptor
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, address: Address, selectors: Vec<Selector>) -> Self {
        Self {
            name: name.into(),
            address,
            selectors,
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
