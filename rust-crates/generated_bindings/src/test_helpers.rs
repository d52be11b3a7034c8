use crate::ids::pad_address;
use serde_json::{
    Value,
    json,
};
use starknet_core::types::Felt;

/// Raw `Beast` model object as the indexer sends it: a healthy, awake pet.
pub fn beast_json(player: Felt) -> Value {
    json!({
        "player": pad_address(&player),
        "life": 100,
        "max_life": 100,
        "hungry": 80,
        "max_hungry": 100,
        "energy": 100,
        "max_energy": 100,
        "happiness": 100,
        "max_happiness": 100,
        "bath": 100,
        "max_bath": 100,
        "level": 1,
        "experience": 0,
        "next_level_experience": 60,
    })
}

/// Same pet with its life drained to zero.
pub fn dead_beast_json(player: Felt) -> Value {
    let mut beast = beast_json(player);
    beast["life"] = json!(0);
    beast
}

pub fn sleeping_beast_json(player: Felt) -> Value {
    let mut beast = beast_json(player);
    beast["is_awake"] = json!(false);
    beast
}
