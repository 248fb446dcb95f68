//! Errors raised while building cuts, planning batches or previewing them

use diamond_primitives::{Address, Selector};

/// Cut construction, planning and preview errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CutError {
    /// Two facets claim the same selector
    #[error("selector collision: {selector} claimed by both {existing} and {incoming}")]
    SelectorCollision {
        /// The contested selector
        selector: Selector,
        /// Facet that already holds it (name or address)
        existing: String,
        /// Facet that tried to claim it (name or address)
        incoming: String,
    },

    /// A cut or entry carries no selectors
    #[error("no selectors to cut for facet {facet}")]
    EmptySelectors {
        /// Target facet of the cut
        facet: Address,
    },

    /// A selector is listed twice in one cut or entry
    #[error("selector {selector} listed more than once for facet {facet}")]
    DuplicateSelector {
        /// Repeated selector
        selector: Selector,
        /// Facet it was listed for
        facet: Address,
    },

    /// Target address does not fit the action
    #[error("invalid facet address {facet} for {action} cut")]
    InvalidFacetAddress {
        /// Offending address
        facet: Address,
        /// Action of the cut
        action: crate::CutAction,
    },

    /// Two routing entries claim the same facet address
    #[error("facet {facet} appears in more than one routing entry")]
    DuplicateFacet {
        /// Repeated facet address
        facet: Address,
    },

    /// Initializer payload is malformed
    #[error("invalid initializer: {0}")]
    InvalidInit(String),

    /// A batch violates the diamond's cut rules
    #[error("cut #{index} rejected for selector {selector}: {reason}")]
    Rejected {
        /// Position of the offending cut in its batch
        index: usize,
        /// Offending selector
        selector: Selector,
        /// Rule that was violated
        reason: RejectReason,
    },
}

impl CutError {
    /// Check if this is a selector collision
    #[inline]
    #[must_use]
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::SelectorCollision { .. })
    }
}

/// Diamond-side validation rule violated by a cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `Add` of a selector that is already routed
    AlreadyRouted {
        /// Current owner
        facet: Address,
    },
    /// `Replace` or `Remove` of a selector that is not routed
    NotRouted,
    /// `Replace` onto the facet that already serves the selector
    SameFacet,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRouted { facet } => write!(f, "already routed to {facet}"),
            Self::NotRouted => f.write_str("not routed"),
            Self::SameFacet => f.write_str("replacement facet already serves it"),
        }
    }
}
