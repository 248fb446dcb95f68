// Test harness module
// In-memory ledger for exercising upgrades without a chain

pub mod simulator;

pub use simulator::*;
