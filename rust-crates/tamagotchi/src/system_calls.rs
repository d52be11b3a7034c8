use crate::provider::{
    DojoProvider,
    Signer,
    TransactionError,
    TransactionResult,
};
use generated_bindings::{
    Action,
    NAMESPACE,
    felt_to_hex,
};
use tracing::{
    error,
    info,
};

/// One transaction per player intent, sent from the account passed in.
/// Nothing here touches the local store: new state arrives through the
/// entity subscription.
pub struct SystemCalls {
    provider: DojoProvider,
    namespace: String,
}

impl SystemCalls {
    pub fn new(provider: DojoProvider) -> Self {
        Self::with_namespace(provider, NAMESPACE)
    }

    pub fn with_namespace(provider: DojoProvider, namespace: impl Into<String>) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
        }
    }

    pub fn provider(&self) -> &DojoProvider {
        &self.provider
    }

    pub async fn dispatch<S: Signer>(
        &self,
        signer: &S,
        action: Action,
    ) -> Result<TransactionResult, TransactionError> {
        let account = felt_to_hex(&signer.address());
        info!(%action, %account, "submitting action");

        match self
            .provider
            .execute(signer, &action.call(), &self.namespace)
            .await
        {
            Ok(result) => {
                info!(
                    %action,
                    tx = %felt_to_hex(&result.transaction_hash),
                    "action submitted"
                );
                Ok(result)
            }
            Err(err) => {
                error!(%action, %account, %err, "action failed");
                Err(err)
            }
        }
    }

    pub async fn spawn<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Spawn).await
    }

    pub async fn decrease_stats<S: Signer>(
        &self,
        signer: &S,
    ) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::DecreaseStats).await
    }

    pub async fn feed<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Feed).await
    }

    pub async fn sleep<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Sleep).await
    }

    pub async fn awake<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Awake).await
    }

    pub async fn play<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Play).await
    }

    pub async fn clean<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Clean).await
    }

    pub async fn revive<S: Signer>(&self, signer: &S) -> Result<TransactionResult, TransactionError> {
        self.dispatch(signer, Action::Revive).await
    }
}
