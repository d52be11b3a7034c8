use crate::{
    Result,
    client::QueryClient,
    query::Query,
    store::EntityStore,
    subscription::SubscriptionHandle,
    transport::{
        IndexerTransport,
        SubscriptionEvent,
    },
};
use generated_bindings::{
    Felt,
    felt_to_hex,
};
use std::sync::Arc;
use tracing::{
    debug,
    info,
    warn,
};

type QueryScope = Box<dyn Fn(Felt) -> Query + Send + Sync>;

/// Keeps the store in sync with the entities of one account. At most one
/// subscription is open at any time; rebinding to a different account
/// fully shuts down the previous one before the next is opened.
pub struct SyncSession<T> {
    client: QueryClient<T>,
    store: Arc<EntityStore>,
    scope: QueryScope,
    bound: Option<Felt>,
    subscription: Option<SubscriptionHandle>,
}

impl<T: IndexerTransport> SyncSession<T> {
    pub fn new(
        client: QueryClient<T>,
        store: Arc<EntityStore>,
        scope: impl Fn(Felt) -> Query + Send + Sync + 'static,
    ) -> Self {
        Self {
            client,
            store,
            scope: Box::new(scope),
            bound: None,
            subscription: None,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn client(&self) -> &QueryClient<T> {
        &self.client
    }

    pub fn bound_address(&self) -> Option<Felt> {
        self.bound
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(SubscriptionHandle::is_active)
    }

    /// Subscribes to `address`'s entities, then loads their current state.
    /// The subscription is opened first so no change between the two is
    /// missed. Binding the already bound address with a live subscription
    /// does nothing once its initial fetch has landed; until then the fetch
    /// is retried on the existing subscription.
    pub async fn bind(&mut self, address: Felt) -> Result<()> {
        let query = (self.scope)(address);
        if self.bound == Some(address) && self.is_subscribed() {
            if self.store.is_synced(&query) {
                debug!(address = %felt_to_hex(&address), "already bound");
                return Ok(());
            }
            debug!(address = %felt_to_hex(&address), "retrying initial entity fetch");
        } else {
            self.unbind().await;
            info!(address = %felt_to_hex(&address), model = %query.tag(), "binding entity sync");

            let store = self.store.clone();
            let handle = self
                .client
                .subscribe(&query, move |event| apply_event(&store, event))
                .await?;
            self.subscription = Some(handle);
            self.bound = Some(address);
        }

        let entities = self.client.fetch_entities(&query).await?;
        let written = self.store.set_entities_for(&query, entities);
        info!(written, "initial entity fetch applied");
        Ok(())
    }

    /// Whether the bound address's initial fetch has landed.
    pub fn is_synced(&self) -> bool {
        self.bound
            .is_some_and(|address| self.store.is_synced(&(self.scope)(address)))
    }

    /// Releases the current subscription, if any, and waits until it can no
    /// longer write to the store.
    pub async fn unbind(&mut self) {
        if let Some(previous) = self.bound.take() {
            debug!(address = %felt_to_hex(&previous), "unbinding entity sync");
        }
        if let Some(handle) = self.subscription.take() {
            handle.shutdown().await;
        }
    }
}

fn apply_event(store: &EntityStore, event: SubscriptionEvent) {
    match event {
        SubscriptionEvent::Entities(entities) => {
            for entity in entities {
                let id = entity.entity_id;
                if store.update_entity(entity) {
                    debug!(entity = %id, "entity updated from subscription");
                }
            }
        }
        SubscriptionEvent::Error(err) => {
            warn!(%err, "subscription error; keeping last known state");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        entity::ParsedEntity,
        error::QueryError,
        test_helpers::{
            FakeIndexer,
            beast_entity,
            beast_entity_with,
            beast_query,
        },
    };
    use generated_bindings::{
        Beast,
        EntityId,
        test_helpers::dead_beast_json,
    };
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn session(indexer: &FakeIndexer) -> SyncSession<FakeIndexer> {
        SyncSession::new(
            QueryClient::new(indexer.clone()),
            Arc::new(EntityStore::new()),
            beast_query,
        )
    }

    #[tokio::test]
    async fn bind__loads_initial_state_into_store() {
        // given
        let alice = Felt::from(0xa11cu64);
        let indexer = FakeIndexer::with_entities(vec![
            beast_entity(alice),
            beast_entity(Felt::from(0xb0bu64)),
        ]);
        let mut session = session(&indexer);

        // when
        session.bind(alice).await.unwrap();

        // then
        let store = session.store();
        assert!(store.is_synced(&beast_query(alice)));
        assert!(session.is_synced());
        assert_eq!(store.entities(), vec![beast_entity(alice)]);
        assert_eq!(indexer.active_subscriptions(), 1);
        assert_eq!(indexer.subscribed_queries(), vec![beast_query(alice)]);
    }

    #[tokio::test]
    async fn bind__same_address_twice__keeps_the_single_subscription() {
        // given
        let indexer = FakeIndexer::new();
        let mut session = session(&indexer);
        session.bind(Felt::ONE).await.unwrap();

        // when
        session.bind(Felt::ONE).await.unwrap();

        // then
        assert_eq!(indexer.opened_subscriptions(), 1);
        assert_eq!(indexer.fetch_count(), 1);
    }

    #[tokio::test]
    async fn bind__new_address__never_has_two_subscriptions_open() {
        // given
        let indexer = FakeIndexer::new();
        let mut session = session(&indexer);

        // when
        session.bind(Felt::ONE).await.unwrap();
        session.bind(Felt::TWO).await.unwrap();
        session.bind(Felt::THREE).await.unwrap();

        // then
        assert_eq!(indexer.opened_subscriptions(), 3);
        assert_eq!(indexer.max_active_subscriptions(), 1);
        assert_eq!(indexer.subscribed_queries(), vec![beast_query(Felt::THREE)]);
        assert_eq!(session.bound_address(), Some(Felt::THREE));
    }

    #[tokio::test]
    async fn bind__pushed_update__reaches_the_store() {
        // given
        let player = Felt::from(9u64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(player)]);
        let mut session = session(&indexer);
        session.bind(player).await.unwrap();
        let id = EntityId::from_keys(&[player]);

        // when
        indexer
            .push(SubscriptionEvent::Entities(vec![beast_entity_with(
                player,
                dead_beast_json(player),
            )]))
            .await;

        // then
        let entity = session
            .store()
            .wait_for_entity_change(
                &id,
                |entity| entity.decode::<Beast>().ok().flatten().is_some_and(|b| b.life == 0),
                WAIT,
            )
            .await;
        assert!(entity.is_some());
        assert!(!session.store().select::<Beast>(&id).unwrap().is_alive());
    }

    #[tokio::test]
    async fn bind__zero_id_push__is_ignored() {
        // given
        let indexer = FakeIndexer::new();
        let mut session = session(&indexer);
        session.bind(Felt::ONE).await.unwrap();
        let mut changes = session.store().changes();
        let _ = changes.borrow_and_update();

        // when
        indexer
            .push(SubscriptionEvent::Entities(vec![ParsedEntity::new(EntityId::ZERO)]))
            .await;
        indexer
            .push(SubscriptionEvent::Entities(vec![beast_entity(Felt::ONE)]))
            .await;
        changes.changed().await.unwrap();

        // then
        assert!(session.store().get_entity(&EntityId::ZERO).is_none());
        assert_eq!(session.store().len(), 1);
    }

    #[tokio::test]
    async fn bind__error_event__keeps_last_known_state() {
        // given
        let player = Felt::from(4u64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(player)]);
        let mut session = session(&indexer);
        session.bind(player).await.unwrap();

        // when
        indexer
            .push(SubscriptionEvent::Error(QueryError::Transport("reset".into())))
            .await;
        indexer
            .push(SubscriptionEvent::Entities(vec![beast_entity_with(
                player,
                dead_beast_json(player),
            )]))
            .await;

        // then
        let id = EntityId::from_keys(&[player]);
        let entity = session
            .store()
            .wait_for_entity_change(&id, |entity| entity != &beast_entity(player), WAIT)
            .await;
        assert_eq!(entity, Some(beast_entity_with(player, dead_beast_json(player))));
        assert!(session.is_subscribed());
    }

    #[tokio::test]
    async fn bind__old_address_events_after_rebind__do_not_reach_the_store() {
        // given
        let alice = Felt::from(0xa11cu64);
        let bob = Felt::from(0xb0bu64);
        let indexer = FakeIndexer::new();
        let mut session = session(&indexer);
        session.bind(alice).await.unwrap();

        // when
        session.bind(bob).await.unwrap();
        indexer
            .push(SubscriptionEvent::Entities(vec![beast_entity(bob)]))
            .await;

        // then
        let bob_id = EntityId::from_keys(&[bob]);
        session
            .store()
            .wait_for_entity_change(&bob_id, |_| true, WAIT)
            .await
            .expect("bob's push should land");
        assert!(session.store().get_entity(&EntityId::from_keys(&[alice])).is_none());
    }

    #[tokio::test]
    async fn bind__fetch_failure__is_returned_but_subscription_stays() {
        // given
        let indexer = FakeIndexer::new();
        indexer.fail_fetches(QueryError::Status {
            status: 500,
            body: "boom".into(),
        });
        let mut session = session(&indexer);

        // when
        let result = session.bind(Felt::ONE).await;

        // then
        assert!(result.is_err());
        assert!(session.is_subscribed());
        assert!(!session.is_synced());
        assert!(!session.store().is_synced(&beast_query(Felt::ONE)));
    }

    #[tokio::test]
    async fn bind__same_address_after_failed_fetch__fetches_again() {
        // given
        let player = Felt::from(0x51u64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(player)]);
        indexer.fail_fetches(QueryError::Transport("connection refused".into()));
        let mut session = session(&indexer);
        assert!(session.bind(player).await.is_err());

        // when
        indexer.restore_fetches();
        session.bind(player).await.unwrap();

        // then
        assert_eq!(indexer.fetch_count(), 2);
        assert_eq!(indexer.opened_subscriptions(), 1);
        assert!(session.is_synced());
        assert_eq!(session.store().entities(), vec![beast_entity(player)]);
    }

    #[tokio::test]
    async fn bind__same_address_while_fetch_keeps_failing__reports_the_error_each_time() {
        // given
        let indexer = FakeIndexer::new();
        indexer.fail_fetches(QueryError::Transport("connection refused".into()));
        let mut session = session(&indexer);
        assert!(session.bind(Felt::ONE).await.is_err());

        // when
        let retry = session.bind(Felt::ONE).await;

        // then
        assert!(retry.is_err());
        assert_eq!(indexer.fetch_count(), 2);
        assert_eq!(indexer.max_active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn bind__new_address_fetch_fails__new_address_is_not_synced() {
        // given
        let alice = Felt::from(0xa11cu64);
        let bob = Felt::from(0xb0bu64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(alice)]);
        let mut session = session(&indexer);
        session.bind(alice).await.unwrap();

        // when
        indexer.fail_fetches(QueryError::Status {
            status: 503,
            body: "unavailable".into(),
        });
        let result = session.bind(bob).await;

        // then
        assert!(result.is_err());
        assert_eq!(session.bound_address(), Some(bob));
        assert!(!session.is_synced());
        assert!(!session.store().is_synced(&beast_query(bob)));
        assert!(session.store().is_synced(&beast_query(alice)));
    }

    #[tokio::test]
    async fn unbind__releases_subscription() {
        // given
        let indexer = FakeIndexer::new();
        let mut session = session(&indexer);
        session.bind(Felt::ONE).await.unwrap();

        // when
        session.unbind().await;

        // then
        assert_eq!(indexer.active_subscriptions(), 0);
        assert_eq!(session.bound_address(), None);
        assert!(!session.is_subscribed());
    }
}
