// contracts/crowdfund/src/storage.rs
//
// Storage helpers for CrowdfundContract. Everything lives in instance
// storage: the campaign is a single small record plus one entry per donor.

use soroban_sdk::{panic_with_error, Address, Env};

use crate::{types::DataKey, Error};

// ─────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────

pub fn is_initialized(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Initialized)
}

/// Panics with `Error::NotInitialized` unless `initialize` has run.
pub fn require_initialized(env: &Env) {
    if !is_initialized(env) {
        panic_with_error!(env, Error::NotInitialized);
    }
}

/// Write the initial campaign record with zeroed totals.
pub fn init_campaign(env: &Env, admin: &Address, goal: i128) {
    let storage = env.storage().instance();
    storage.set(&DataKey::Initialized, &true);
    storage.set(&DataKey::Admin, admin);
    storage.set(&DataKey::Goal, &goal);
    storage.set(&DataKey::TotalRaised, &0_i128);
    storage.set(&DataKey::Donors, &0_u32);
}

// ─────────────────────────────────────────────────────────
// Campaign fields
// ─────────────────────────────────────────────────────────

pub fn get_admin(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Admin)
        .unwrap_or_else(|| panic_with_error!(env, Error::NotInitialized))
}

pub fn get_goal(env: &Env) -> i128 {
    env.storage().instance().get(&DataKey::Goal).unwrap_or(0)
}

pub fn get_total_raised(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::TotalRaised)
        .unwrap_or(0)
}

pub fn set_total_raised(env: &Env, total: i128) {
    env.storage().instance().set(&DataKey::TotalRaised, &total);
}

pub fn get_donor_count(env: &Env) -> u32 {
    env.storage().instance().get(&DataKey::Donors).unwrap_or(0)
}

/// Bump the distinct-donor counter. Saturates instead of failing so a full
/// counter never blocks further donations.
pub fn increment_donor_count(env: &Env) {
    let donors = get_donor_count(env);
    env.storage()
        .instance()
        .set(&DataKey::Donors, &donors.saturating_add(1));
}

// ─────────────────────────────────────────────────────────
// Per-donor totals
// ─────────────────────────────────────────────────────────

/// Returns 0 if `donor` has never donated.
pub fn get_donation(env: &Env, donor: &Address) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::Donation(donor.clone()))
        .unwrap_or(0)
}

pub fn set_donation(env: &Env, donor: &Address, total: i128) {
    env.storage()
        .instance()
        .set(&DataKey::Donation(donor.clone()), &total);
}
