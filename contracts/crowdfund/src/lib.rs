#![no_std]

use soroban_sdk::{contract, contracterror, contractimpl, panic_with_error, Address, Env};

pub mod events;
mod storage;
mod types;

#[cfg(test)]
mod test_events;

pub use types::{Campaign, DataKey};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidGoal = 3,
    InvalidAmount = 4,
    Overflow = 5,
}

#[contract]
pub struct CrowdfundContract;

#[contractimpl]
impl CrowdfundContract {
    /// Open the campaign.
    ///
    /// - Can only be called once.
    /// - `goal` is the funding target in stroops (must be > 0).
    pub fn initialize(env: Env, admin: Address, goal: i128) {
        if storage::is_initialized(&env) {
            panic_with_error!(&env, Error::AlreadyInitialized);
        }
        if goal <= 0 {
            panic_with_error!(&env, Error::InvalidGoal);
        }

        storage::init_campaign(&env, &admin, goal);
        events::emit_campaign_initialized(&env, admin, goal);
    }

    /// Record a donation.
    ///
    /// The contract never holds the donated funds; the donor pays the
    /// campaign owner directly and then calls this to account for it.
    /// `donors` grows only on an address's first donation.
    pub fn donate(env: Env, donor: Address, amount: i128) {
        storage::require_initialized(&env);
        if amount <= 0 {
            panic_with_error!(&env, Error::InvalidAmount);
        }

        donor.require_auth();

        let donor_total = storage::get_donation(&env, &donor);
        let updated_donor_total = donor_total
            .checked_add(amount)
            .unwrap_or_else(|| panic_with_error!(&env, Error::Overflow));

        let updated_total = storage::get_total_raised(&env)
            .checked_add(amount)
            .unwrap_or_else(|| panic_with_error!(&env, Error::Overflow));

        if donor_total == 0 {
            storage::increment_donor_count(&env);
        }

        storage::set_donation(&env, &donor, updated_donor_total);
        storage::set_total_raised(&env, updated_total);

        events::emit_donation(&env, donor, amount, updated_total);
    }

    /// Current campaign aggregate.
    pub fn get_campaign(env: Env) -> Campaign {
        storage::require_initialized(&env);
        Campaign {
            admin: storage::get_admin(&env),
            goal: storage::get_goal(&env),
            total_raised: storage::get_total_raised(&env),
            donors: storage::get_donor_count(&env),
        }
    }

    /// Total donated by `donor`, 0 if none.
    pub fn get_donation(env: Env, donor: Address) -> i128 {
        storage::get_donation(&env, &donor)
    }

    pub fn is_goal_reached(env: Env) -> bool {
        storage::get_total_raised(&env) >= storage::get_goal(&env)
    }
}
