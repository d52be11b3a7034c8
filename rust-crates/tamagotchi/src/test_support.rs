use crate::provider::{
    Signer,
    TransactionError,
};
use deployments::Manifest;
use generated_bindings::Felt;
use starknet_core::types::Call;
use std::sync::Mutex;

pub fn test_manifest() -> Manifest {
    Manifest::from_slice(
        br#"{
            "world": { "address": "0x999" },
            "contracts": [
                { "address": "0x1234", "tag": "dojo_starter-actions", "systems": ["feed"] }
            ],
            "models": [ { "tag": "dojo_starter-Beast" } ]
        }"#,
    )
    .unwrap()
}

/// Signer that records every batch it is asked to submit and answers with a
/// fixed outcome.
pub struct RecordingSigner {
    outcome: Result<Felt, TransactionError>,
    submitted: Mutex<Vec<Vec<Call>>>,
}

impl RecordingSigner {
    pub fn accepting(transaction_hash: Felt) -> Self {
        Self {
            outcome: Ok(transaction_hash),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            outcome: Err(TransactionError::Rejected(reason.to_string())),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<Vec<Call>> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Signer for RecordingSigner {
    fn address(&self) -> Felt {
        Felt::from(0xacc0u64)
    }

    async fn submit(&self, calls: Vec<Call>) -> Result<Felt, TransactionError> {
        self.submitted.lock().unwrap().push(calls);
        self.outcome.clone()
    }
}
