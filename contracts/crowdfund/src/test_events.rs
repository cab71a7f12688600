extern crate std;

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Events},
    vec, Address, Env, IntoVal, TryIntoVal,
};

use crate::events::CampaignInitialized;
use crate::{CrowdfundContract, CrowdfundContractClient};

fn setup() -> (Env, CrowdfundContractClient<'static>) {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register(CrowdfundContract, ());
    let client = CrowdfundContractClient::new(&env, &contract_id);
    (env, client)
}

#[test]
fn test_initialize_event() {
    let (env, client) = setup();
    let admin = Address::generate(&env);

    client.initialize(&admin, &1_000);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    assert_eq!(last_event.0, client.address);
    let expected_topics = vec![&env, symbol_short!("init").into_val(&env)];
    assert_eq!(last_event.1, expected_topics);

    let event_data: CampaignInitialized = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        CampaignInitialized {
            admin: admin.clone(),
            goal: 1_000,
        }
    );
}

#[test]
fn test_donation_event() {
    let (env, client) = setup();
    let admin = Address::generate(&env);
    let donor = Address::generate(&env);

    client.initialize(&admin, &1_000);
    client.donate(&donor, &300);
    client.donate(&donor, &200);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    // Topic: (symbol_short!("donation"), donor)
    assert_eq!(last_event.0, client.address);
    let expected_topics = vec![
        &env,
        symbol_short!("donation").into_val(&env),
        donor.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    // Data is (amount, running campaign total), not the donor's total.
    let event_data: (i128, i128) = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(event_data, (200, 500));
}
