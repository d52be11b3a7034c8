use deployments::Manifest;
use generated_bindings::{
    ContractCall,
    Felt,
    contract_tag,
    felt_to_hex,
};
use starknet_accounts::{
    Account,
    AccountError,
    ExecutionEncoding,
    SingleOwnerAccount,
};
use starknet_core::{
    types::{
        BlockId,
        BlockTag,
        Call,
    },
    utils::get_selector_from_name,
};
use starknet_providers::{
    Provider,
    ProviderError,
    jsonrpc::{
        HttpTransport as RpcTransport,
        JsonRpcClient,
    },
};
use starknet_signers::{
    LocalWallet,
    SigningKey,
};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("failed to submit transaction: {0}")]
    Submission(String),
    #[error("cannot resolve contract: {0}")]
    UnknownContract(String),
    #[error("invalid entrypoint `{entrypoint}`: {reason}")]
    InvalidEntrypoint { entrypoint: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResult {
    pub transaction_hash: Felt,
}

/// The account actions are sent from.
pub trait Signer: Send + Sync {
    fn address(&self) -> Felt;

    /// Signs and broadcasts `calls` as one transaction, returning its hash.
    fn submit(
        &self,
        calls: Vec<Call>,
    ) -> impl Future<Output = Result<Felt, TransactionError>> + Send;
}

type RpcAccount = SingleOwnerAccount<JsonRpcClient<RpcTransport>, LocalWallet>;

pub struct StarknetSigner {
    account: RpcAccount,
}

impl StarknetSigner {
    pub async fn connect(
        rpc_url: Url,
        address: Felt,
        private_key: Felt,
    ) -> Result<Self, TransactionError> {
        let provider = JsonRpcClient::new(RpcTransport::new(rpc_url));
        let chain_id = provider.chain_id().await.map_err(|err| {
            TransactionError::Submission(format!("failed to read chain id: {err}"))
        })?;
        let signer = LocalWallet::from_signing_key(SigningKey::from_secret_scalar(private_key));

        let mut account = SingleOwnerAccount::new(
            provider,
            signer,
            address,
            chain_id,
            ExecutionEncoding::New,
        );
        account.set_block_id(BlockId::Tag(BlockTag::Latest));

        Ok(Self { account })
    }
}

impl Signer for StarknetSigner {
    fn address(&self) -> Felt {
        self.account.address()
    }

    async fn submit(&self, calls: Vec<Call>) -> Result<Felt, TransactionError> {
        match self.account.execute_v3(calls).send().await {
            Ok(result) => Ok(result.transaction_hash),
            Err(err) => {
                let reason = err.to_string();
                Err(match err {
                    AccountError::Provider(ProviderError::StarknetError(_)) => {
                        TransactionError::Rejected(reason)
                    }
                    _ => TransactionError::Submission(reason),
                })
            }
        }
    }
}

/// Resolves contract calls against the world manifest and executes them
/// through a [`Signer`].
pub struct DojoProvider {
    manifest: Manifest,
}

impl DojoProvider {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn resolve(&self, call: &ContractCall, namespace: &str) -> Result<Call, TransactionError> {
        let to = self
            .manifest
            .contract_address(namespace, call.contract_name)
            .map_err(|err| TransactionError::UnknownContract(format!("{err:#}")))?;
        let selector = get_selector_from_name(call.entrypoint).map_err(|err| {
            TransactionError::InvalidEntrypoint {
                entrypoint: call.entrypoint.to_string(),
                reason: err.to_string(),
            }
        })?;

        Ok(Call {
            to,
            selector,
            calldata: call.calldata.clone(),
        })
    }

    pub async fn execute<S: Signer>(
        &self,
        signer: &S,
        call: &ContractCall,
        namespace: &str,
    ) -> Result<TransactionResult, TransactionError> {
        let resolved = self.resolve(call, namespace)?;
        debug!(
            contract = %contract_tag(namespace, call.contract_name),
            address = %felt_to_hex(&resolved.to),
            entrypoint = call.entrypoint,
            "executing contract call"
        );
        let transaction_hash = signer.submit(vec![resolved]).await?;
        Ok(TransactionResult { transaction_hash })
    }
}
