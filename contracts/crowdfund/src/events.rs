use soroban_sdk::{contracttype, symbol_short, Address, Env};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CampaignInitialized {
    pub admin: Address,
    pub goal: i128,
}

pub fn emit_campaign_initialized(env: &Env, admin: Address, goal: i128) {
    let topics = (symbol_short!("init"),);
    let data = CampaignInitialized { admin, goal };
    env.events().publish(topics, data);
}

/// Topics `("donation", donor)`, data `(amount, total_raised)`.
pub fn emit_donation(env: &Env, donor: Address, amount: i128, total_raised: i128) {
    let topics = (symbol_short!("donation"), donor);
    env.events().publish(topics, (amount, total_raised));
}
