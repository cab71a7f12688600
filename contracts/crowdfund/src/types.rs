// contracts/crowdfund/src/types.rs
//
// `Campaign` is the aggregate returned by `get_campaign`. Off-chain readers
// decode it field-by-field from an `ScVal::Map`, so the field names here are
// part of the read interface: `goal`, `total_raised`, `donors`.

use soroban_sdk::{contracttype, Address};

/// Instance storage keys.
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Initialized,
    Admin,
    Goal,
    TotalRaised,
    /// Running total donated by one address.
    Donation(Address),
    /// Number of distinct donor addresses.
    Donors,
}

/// Campaign summary as stored on-chain.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Campaign {
    /// Address that initialized the campaign.
    pub admin: Address,
    /// Funding goal in stroops.
    pub goal: i128,
    /// Sum of all recorded donations in stroops.
    pub total_raised: i128,
    /// Count of unique donors.
    pub donors: u32,
}
