//! Contract ABI: interfaces, selector extraction and call encoding

mod encode;
mod interface;
mod param;
mod token;

pub use encode::encode_tokens;
pub use interface::{Function, Interface, SelectorFilter, StateMutability};
pub use param::{Param, ParamType};
pub use token::{Token, Word};

/// Errors raised while reading interfaces or encoding calls
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    /// A selector filter names a function the interface does not expose
    #[error("unresolved signature: `{name}` matches no function of the interface")]
    UnresolvedSignature {
        /// The filter entry that failed to resolve
        name: String,
    },

    /// Method lookup failed
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Malformed or unsupported type string
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// Malformed function fragment
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Arguments do not match a function's inputs
    #[error("invalid arguments for {function}: {reason}")]
    InvalidArguments {
        /// Canonical signature of the called function
        function: String,
        /// What went wrong
        reason: String,
    },

    /// A JSON value cannot be tokenized as the expected type
    #[error("invalid value for {expected}: {reason}")]
    InvalidValue {
        /// Canonical type expected
        expected: String,
        /// What went wrong
        reason: String,
    },

    /// Malformed JSON ABI
    #[error("invalid ABI JSON: {0}")]
    Json(#[from] serde_json::Error),
}
