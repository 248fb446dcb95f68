//! Routing table reads

use crate::error::UpgradeError;
use crate::ledger::Ledger;
use diamond_cut::RoutingTable;
use diamond_primitives::Address;
use std::sync::Arc;

/// Reads a diamond's current routing table through its introspection facet
///
/// Nothing is cached; every call is a fresh read of finalized state.
#[derive(Clone)]
pub struct RoutingTableReader {
    ledger: Arc<dyn Ledger>,
}

impl std::fmt::Debug for RoutingTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTableReader").finish_non_exhaustive()
    }
}

impl RoutingTableReader {
    /// Create reader over `ledger`
    #[inline]
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Read the routing table of `diamond`
    ///
    /// # Errors
    /// Returns [`UpgradeError::Ledger`] if the read fails, or
    /// [`UpgradeError::Cut`] if the reported entries are not a partition
    pub async fn read(&self, diamond: Address) -> Result<RoutingTable, UpgradeError> {
        let entries = self.ledger.facets(diamond).await?;
        let table = RoutingTable::from_entries(entries)?;
        tracing::debug!(
            diamond = %diamond,
            facets = table.len(),
            selectors = table.selector_count(),
            "read routing table"
        );
        Ok(table)
    }
}
