//! Diamond primitives
//!
//! Fixed-width identifiers and ABI handling shared by the cut planner and the
//! upgrade orchestrator.
//!
//! # Core Concepts
//!
//! - [`Address`]: 20-byte account/contract address, zero is the null facet
//! - [`Selector`]: 4-byte routing key derived from a canonical signature
//! - [`TxHash`]: 32-byte transaction identifier
//! - [`abi::Interface`]: callable surface of a contract, selector extraction
//!   and call encoding
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_primitives::abi::{Interface, SelectorFilter};
//!
//! let iface = Interface::from_fragments([
//!     "function mint(address to, uint256 id)",
//!     "function burn(uint256 id)",
//! ])?;
//! let selectors = iface.selectors(&SelectorFilter::include(["mint"]))?;
//! assert_eq!(selectors.len(), 1);
//! ```

#![warn(unreachable_pub)]

pub mod abi;
mod bytes;
mod keccak;

pub use abi::AbiError;
pub use bytes::{Address, BytesError, Selector, TxHash};
pub use keccak::keccak256;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
