use crate::{
    pet::{
        PetSnapshot,
        beast_query,
        pet_entity_id,
    },
    provider::{
        Signer,
        StarknetSigner,
        TransactionResult,
    },
    system_calls::SystemCalls,
    wallets::{
        KeystoreDescriptor,
        unlock_keystore,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::DojoConfig;
use entity_sync::{
    EntityStore,
    HttpTransport,
    IndexerTransport,
    QueryClient,
    SyncSession,
};
use generated_bindings::{
    Action,
    Felt,
    felt_to_hex,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tracing::{
    info,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = entity_sync::http_transport::DEFAULT_POLL_INTERVAL;

/// Where the signing key for actions comes from.
#[derive(Clone, Debug)]
pub enum SignerSource {
    /// Read-only: status and watch only.
    None,
    Master,
    Keystore(KeystoreDescriptor),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub dojo: DojoConfig,
    pub account_address: Option<Felt>,
    pub signer: SignerSource,
    pub poll_interval: Duration,
}

impl AppConfig {
    /// The account whose pet is shown: an explicit address wins, then the
    /// master account.
    pub fn player_address(&self) -> Result<Felt> {
        if let Some(address) = self.account_address {
            return Ok(address);
        }
        match (&self.signer, &self.dojo.master_account) {
            (SignerSource::Master, Some(master)) => Ok(master.address),
            (SignerSource::Master, None) => Err(eyre!(
                "--master needs DOJO_MASTER_ADDRESS and DOJO_MASTER_PRIVATE_KEY"
            )),
            _ => Err(eyre!("Specify --account-address or --master")),
        }
    }

    pub async fn connect_signer(&self) -> Result<StarknetSigner> {
        let (address, private_key) = match &self.signer {
            SignerSource::None => {
                return Err(eyre!("Actions need a signer; pass --keystore or --master"));
            }
            SignerSource::Master => {
                let master = self.dojo.master_account.as_ref().ok_or_else(|| {
                    eyre!("--master needs DOJO_MASTER_ADDRESS and DOJO_MASTER_PRIVATE_KEY")
                })?;
                (master.address, master.private_key)
            }
            SignerSource::Keystore(keystore) => {
                let address = self.account_address.ok_or_else(|| {
                    eyre!("--keystore needs the matching --account-address")
                })?;
                (address, unlock_keystore(keystore)?)
            }
        };

        StarknetSigner::connect(self.dojo.rpc_url.clone(), address, private_key)
            .await
            .wrap_err("Failed to connect signer account")
    }
}

/// Wires the indexer session, the store and the player address together.
pub struct App<T> {
    player: Felt,
    session: SyncSession<T>,
}

impl App<HttpTransport> {
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.dojo.torii_url.as_str())
            .wrap_err("Failed to build indexer client")?
            .with_poll_interval(config.poll_interval);
        Ok(Self::new(transport, config.player_address()?))
    }
}

impl<T: IndexerTransport> App<T> {
    pub fn new(transport: T, player: Felt) -> Self {
        let session = SyncSession::new(
            QueryClient::new(transport),
            Arc::new(EntityStore::new()),
            beast_query,
        );
        Self { player, session }
    }

    pub fn player(&self) -> Felt {
        self.player
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        self.session.store()
    }

    pub fn snapshot(&self) -> PetSnapshot {
        PetSnapshot::read(self.store(), self.player)
    }

    /// One-shot load of the player's pet, without a subscription.
    pub async fn refresh(&self) -> Result<PetSnapshot> {
        let query = beast_query(self.player);
        let entities = self
            .session
            .client()
            .fetch_entities(&query)
            .await
            .wrap_err("Failed to query the indexer")?;
        self.store().set_entities_for(&query, entities);
        Ok(self.snapshot())
    }

    pub async fn bind(&mut self) -> Result<PetSnapshot> {
        self.session
            .bind(self.player)
            .await
            .wrap_err("Failed to sync with the indexer")?;
        Ok(self.snapshot())
    }

    /// Calls `on_snapshot` with the current pet and again after every store
    /// change, until `stop` resolves.
    pub async fn watch<F>(
        &mut self,
        stop: impl Future<Output = ()>,
        mut on_snapshot: F,
    ) -> Result<()>
    where
        F: FnMut(&PetSnapshot),
    {
        let mut changes = self.store().changes();
        let mut last = self.bind().await?;
        on_snapshot(&last);

        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = self.snapshot();
                    if snapshot != last {
                        on_snapshot(&snapshot);
                        last = snapshot;
                    }
                }
            }
        }
        self.session.unbind().await;
        Ok(())
    }

    /// Submits `action` unless the current pet state forbids it. With a
    /// non-zero `confirm_within`, also waits for the pet to change.
    pub async fn act<S: Signer>(
        &mut self,
        system_calls: &SystemCalls,
        signer: &S,
        action: Action,
        force: bool,
        confirm_within: Duration,
    ) -> Result<ActionOutcome> {
        let before = if confirm_within.is_zero() {
            self.refresh().await?
        } else {
            self.bind().await?
        };

        if !force && !before.state.allows(action) {
            return Err(eyre!(
                "`{action}` is not available while the pet is {}; use --force to send it anyway",
                before.state
            ));
        }

        let pet_id = pet_entity_id(self.player);
        let previous = self.store().get_entity(&pet_id);
        let submitted = system_calls.dispatch(signer, action).await?;
        if confirm_within.is_zero() {
            return Ok(ActionOutcome {
                submitted,
                confirmed: None,
            });
        }

        let confirmed = self
            .store()
            .wait_for_entity_change(
                &pet_id,
                |entity| previous.as_ref() != Some(entity),
                confirm_within,
            )
            .await
            .map(|_| self.snapshot());
        if confirmed.is_none() {
            warn!(
                tx = %felt_to_hex(&submitted.transaction_hash),
                "no pet update observed before the confirmation timeout"
            );
        }
        self.session.unbind().await;
        info!(%action, confirmed = confirmed.is_some(), "action finished");

        Ok(ActionOutcome {
            submitted,
            confirmed,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub submitted: TransactionResult,
    pub confirmed: Option<PetSnapshot>,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        pet::PetState,
        provider::DojoProvider,
        test_support::{
            RecordingSigner,
            test_manifest,
        },
    };
    use entity_sync::{
        SubscriptionEvent,
        test_helpers::{
            FakeIndexer,
            beast_entity,
            beast_entity_with,
        },
    };
    use generated_bindings::test_helpers::sleeping_beast_json;

    fn system_calls() -> SystemCalls {
        SystemCalls::new(DojoProvider::new(test_manifest()))
    }

    fn signer() -> RecordingSigner {
        RecordingSigner::accepting(Felt::from(0x77u64))
    }

    #[tokio::test]
    async fn refresh__loads_the_players_pet() {
        // given
        let player = Felt::from(0x1001u64);
        let app = App::new(FakeIndexer::with_entities(vec![beast_entity(player)]), player);

        // when
        let snapshot = app.refresh().await.unwrap();

        // then
        assert_eq!(snapshot.state, PetState::Awake);
    }

    #[tokio::test]
    async fn refresh__no_pet_on_chain__is_unspawned() {
        let app = App::new(FakeIndexer::new(), Felt::ONE);

        let snapshot = app.refresh().await.unwrap();

        assert_eq!(snapshot.state, PetState::Unspawned);
    }

    #[tokio::test]
    async fn act__action_not_allowed__is_refused_without_submitting() {
        // given
        let player = Felt::from(0x1002u64);
        let mut app = App::new(FakeIndexer::with_entities(vec![beast_entity(player)]), player);
        let signer = signer();

        // when
        let result = app
            .act(&system_calls(), &signer, Action::Spawn, false, Duration::ZERO)
            .await;

        // then
        assert!(result.is_err());
        assert!(signer.submitted().is_empty());
    }

    #[tokio::test]
    async fn act__forced__submits_anyway() {
        // given
        let player = Felt::from(0x1003u64);
        let mut app = App::new(FakeIndexer::with_entities(vec![beast_entity(player)]), player);
        let signer = signer();

        // when
        let outcome = app
            .act(&system_calls(), &signer, Action::Spawn, true, Duration::ZERO)
            .await
            .unwrap();

        // then
        assert_eq!(outcome.submitted.transaction_hash, Felt::from(0x77u64));
        assert_eq!(outcome.confirmed, None);
        assert_eq!(signer.submitted().len(), 1);
    }

    #[tokio::test]
    async fn act__with_confirmation__returns_state_pushed_after_submit() {
        // given
        let player = Felt::from(0x1004u64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(player)]);
        let mut app = App::new(indexer.clone(), player);
        let signer = signer();
        let pusher = tokio::spawn(async move {
            while indexer.active_subscriptions() == 0 {
                tokio::task::yield_now().await;
            }
            indexer
                .push(SubscriptionEvent::Entities(vec![beast_entity_with(
                    player,
                    sleeping_beast_json(player),
                )]))
                .await;
        });

        // when
        let outcome = app
            .act(&system_calls(), &signer, Action::Sleep, false, Duration::from_secs(2))
            .await
            .unwrap();

        // then
        pusher.await.unwrap();
        assert_eq!(outcome.confirmed.unwrap().state, PetState::Asleep);
        assert_eq!(signer.submitted().len(), 1);
    }
}
