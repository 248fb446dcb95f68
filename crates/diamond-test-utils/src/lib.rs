//! Testing utilities for the diamond upgrade workspace
//!
//! Shared fixtures: an ERC-721 rental diamond's facet artifacts, the
//! infrastructure facets every diamond keeps, pre-seeded simulated ledgers
//! and config builders.

#![allow(missing_docs)]

use diamond_core::test_harness::SimulatedLedger;
use diamond_core::{
    ContractArtifact, ContractArtifacts, FacetSpec, InitializerSpec, TargetDiamond, Timeouts, UpgradeConfig,
};
use diamond_cut::{RoutingEntry, RoutingTable};
use diamond_primitives::abi::{Interface, SelectorFilter};
use diamond_primitives::{Address, Selector};
use std::str::FromStr;

pub const DIAMOND_CUT_FACET: &str = "0x3CcAe8D3F0f59B1A50540d7fbed9a40Fd23ab719";
pub const DIAMOND_LOUPE_FACET: &str = "0xf3587E542eF8752dd455ED9900a9AF316B23378d";
pub const OWNERSHIP_FACET: &str = "0x1fcf146989FDd0C7A928e124e869E3F91A17A8E4";

pub const DIAMOND_CUT_ABI: &[&str] = &[
    "function diamondCut((address facetAddress, uint8 action, bytes4[] functionSelectors)[] cuts, address init, bytes data)",
];

pub const DIAMOND_LOUPE_ABI: &[&str] = &[
    "function facets() view returns ((address facetAddress, bytes4[] functionSelectors)[])",
    "function facetFunctionSelectors(address facet) view returns (bytes4[])",
    "function facetAddresses() view returns (address[])",
    "function facetAddress(bytes4 selector) view returns (address)",
    "function supportsInterface(bytes4 interfaceId) view returns (bool)",
];

pub const OWNERSHIP_ABI: &[&str] = &[
    "function owner() view returns (address)",
    "function transferOwnership(address newOwner)",
];

pub const ERC721_ABI: &[&str] = &[
    "function balanceOf(address owner) view returns (uint256)",
    "function ownerOf(uint256 tokenId) view returns (address)",
    "function approve(address to, uint256 tokenId)",
    "function transferFrom(address from, address to, uint256 tokenId)",
    "function safeTransferFrom(address from, address to, uint256 tokenId)",
    "function safeTransferFrom(address from, address to, uint256 tokenId, bytes data)",
    "function tokenURI(uint256 tokenId) view returns (string)",
    "function mint(address to, string uri) returns (uint256)",
    "function supportsInterface(bytes4 interfaceId) view returns (bool)",
    "event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)",
];

pub const RENTAL_ABI: &[&str] = &[
    "function rent(uint256 tokenId, uint64 duration) payable",
    "function endRental(uint256 tokenId)",
    "function rentalOf(uint256 tokenId) view returns (address renter, uint64 expires)",
];

pub const CURRENCY_ABI: &[&str] = &[
    "function setUnderlyingCurrency(address token)",
    "function underlyingCurrency() view returns (address)",
];

pub const WITHDRAWAL_ABI: &[&str] = &["function withdraw(address to, uint256 amount)"];

pub const ACCESS_CONTROL_ABI: &[&str] = &[
    "function grantRole(bytes32 role, address account)",
    "function revokeRole(bytes32 role, address account)",
    "function hasRole(bytes32 role, address account) view returns (bool)",
];

pub const ERC721_INIT_ABI: &[&str] = &["function init((string domainName, string version) args)"];

/// Address from a hex literal
pub fn address(hex: &str) -> Address {
    Address::from_str(hex).unwrap()
}

/// Address with every byte set to `n`
pub fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

pub fn deployer() -> Address {
    address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
}

pub fn diamond_address() -> Address {
    address("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512")
}

pub fn protected_addresses() -> Vec<Address> {
    vec![
        address(DIAMOND_CUT_FACET),
        address(DIAMOND_LOUPE_FACET),
        address(OWNERSHIP_FACET),
    ]
}

/// Artifact from human-readable fragments, with placeholder bytecode
pub fn artifact(name: &str, fragments: &[&str]) -> ContractArtifact {
    let abi = Interface::from_fragments(fragments.iter().copied()).unwrap();
    let mut bytecode = vec![0x60, 0x80, 0x60, 0x40];
    bytecode.extend_from_slice(name.as_bytes());
    ContractArtifact::new(name, abi, bytecode)
}

/// Every contract the rental diamond is built from
pub fn rental_artifacts() -> ContractArtifacts {
    [
        artifact("DiamondCutFacet", DIAMOND_CUT_ABI),
        artifact("DiamondLoupeFacet", DIAMOND_LOUPE_ABI),
        artifact("OwnershipFacet", OWNERSHIP_ABI),
        artifact("AccessControlFacet", ACCESS_CONTROL_ABI),
        artifact("ERC721URIStorage", ERC721_ABI),
        artifact("RentalFacet", RENTAL_ABI),
        artifact("UnderlyingCurrencyFacet", CURRENCY_ABI),
        artifact("WithdrawalFacet", WITHDRAWAL_ABI),
        artifact("ERC721Init", ERC721_INIT_ABI),
    ]
    .into_iter()
    .collect()
}

/// All selectors of a fragment list
pub fn selectors_of(fragments: &[&str]) -> Vec<Selector> {
    Interface::from_fragments(fragments.iter().copied())
        .unwrap()
        .selectors(&SelectorFilter::all())
        .unwrap()
}

/// Routing entries of the three infrastructure facets
pub fn infrastructure_entries() -> Vec<RoutingEntry> {
    vec![
        RoutingEntry::new(address(DIAMOND_CUT_FACET), selectors_of(DIAMOND_CUT_ABI)).unwrap(),
        RoutingEntry::new(address(DIAMOND_LOUPE_FACET), selectors_of(DIAMOND_LOUPE_ABI)).unwrap(),
        RoutingEntry::new(address(OWNERSHIP_FACET), selectors_of(OWNERSHIP_ABI)).unwrap(),
    ]
}

/// Table of a freshly deployed diamond: infrastructure only
pub fn infrastructure_table() -> RoutingTable {
    RoutingTable::from_entries(infrastructure_entries()).unwrap()
}

/// Infrastructure plus an outdated rental and withdrawal facet
///
/// The outdated facets live at `addr(0xa1)` and `addr(0xa2)`.
pub fn outdated_rental_table() -> RoutingTable {
    let mut entries = infrastructure_entries();
    entries.push(RoutingEntry::new(addr(0xa1), selectors_of(RENTAL_ABI)).unwrap());
    entries.push(RoutingEntry::new(addr(0xa2), selectors_of(WITHDRAWAL_ABI)).unwrap());
    RoutingTable::from_entries(entries).unwrap()
}

/// Ledger hosting `diamond_address()` with the outdated rental table
pub fn seeded_ledger() -> SimulatedLedger {
    SimulatedLedger::new().with_diamond(diamond_address(), outdated_rental_table())
}

/// Short timeouts for tests
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        confirmation_secs: 5,
        poll_interval_ms: 1,
    }
}

/// Init arguments of one rental diamond
pub fn init_args(domain: &str) -> serde_json::Value {
    serde_json::json!({ "domainName": domain, "version": "1" })
}

/// Config upgrading `targets` to the full rental facet set
pub fn rental_upgrade_config(targets: &[Address]) -> UpgradeConfig {
    let facets = vec![
        FacetSpec::new("AccessControlFacet"),
        FacetSpec::new("ERC721URIStorage").with_filter(SelectorFilter::exclude(["supportsInterface"])),
        FacetSpec::new("RentalFacet"),
        FacetSpec::new("UnderlyingCurrencyFacet"),
        FacetSpec::new("WithdrawalFacet"),
    ];
    let mut config = UpgradeConfig::new(facets)
        .with_protected(protected_addresses())
        .with_initializer(InitializerSpec::new("ERC721Init"))
        .with_timeouts(fast_timeouts());
    for (i, target) in targets.iter().enumerate() {
        config = config.with_target(
            TargetDiamond::new(*target)
                .with_label(format!("diamond-{i}"))
                .with_init_args(init_args(&format!("Rentals {i}"))),
        );
    }
    config
}
