use starknet_core::types::Felt;
use std::fmt;

/// Name of the system contract every pet action is routed to.
pub const ACTIONS_CONTRACT: &str = "actions";

pub fn contract_tag(namespace: &str, contract_name: &str) -> String {
    format!("{namespace}-{contract_name}")
}

/// Entrypoints of the `actions` system. None of them take calldata; the
/// contract derives everything from the caller address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Spawn,
    DecreaseStats,
    Feed,
    Sleep,
    Awake,
    Play,
    Clean,
    Revive,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Spawn,
        Action::DecreaseStats,
        Action::Feed,
        Action::Sleep,
        Action::Awake,
        Action::Play,
        Action::Clean,
        Action::Revive,
    ];

    pub fn entrypoint(self) -> &'static str {
        match self {
            Action::Spawn => "spawn",
            Action::DecreaseStats => "decrease_stats",
            Action::Feed => "feed",
            Action::Sleep => "sleep",
            Action::Awake => "awake",
            Action::Play => "play",
            Action::Clean => "clean",
            Action::Revive => "revive",
        }
    }

    pub fn call(self) -> ContractCall {
        ContractCall {
            contract_name: ACTIONS_CONTRACT,
            entrypoint: self.entrypoint(),
            calldata: Vec::new(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entrypoint())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract_name: &'static str,
    pub entrypoint: &'static str,
    pub calldata: Vec<Felt>,
}
