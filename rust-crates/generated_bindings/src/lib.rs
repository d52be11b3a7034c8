pub mod contracts;
pub mod ids;
pub mod models;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use contracts::{
    ACTIONS_CONTRACT,
    Action,
    ContractCall,
    contract_tag,
};
pub use ids::{
    EntityId,
    ParseFeltError,
    felt_to_hex,
    pad_address,
    parse_felt,
};
pub use models::{
    Beast,
    BeastValue,
    DecodeError,
    Gauge,
    Model,
    ModelSchema,
    Models,
    NAMESPACE,
    Stat,
};
pub use starknet_core::types::Felt;
