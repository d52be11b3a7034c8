use crate::{
    Result,
    entity::ParsedEntity,
    error::QueryError,
    query::{
        Op,
        Query,
    },
    transport::{
        IndexerTransport,
        SubscriptionEvent,
    },
};
use generated_bindings::{
    EntityId,
    Felt,
    Models,
    NAMESPACE,
    pad_address,
    test_helpers::beast_json,
};
use serde_json::Value;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use tokio::sync::mpsc;

pub fn beast_query(player: Felt) -> Query {
    Query::for_model(Models::Beast).where_field("player", Op::Eq, pad_address(&player))
}

pub fn beast_entity(player: Felt) -> ParsedEntity {
    beast_entity_with(player, beast_json(player))
}

pub fn beast_entity_with(player: Felt, beast: Value) -> ParsedEntity {
    ParsedEntity::new(EntityId::from_keys(&[player])).with_model(NAMESPACE, "Beast", beast)
}

#[derive(Default)]
struct FakeState {
    entities: Vec<ParsedEntity>,
    fetch_error: Option<QueryError>,
    streams: Vec<(Query, mpsc::Sender<SubscriptionEvent>)>,
    fetches: usize,
    opened: usize,
    max_active: usize,
}

impl FakeState {
    fn active(&self) -> usize {
        self.streams.iter().filter(|(_, tx)| !tx.is_closed()).count()
    }
}

/// In-memory indexer. Fetches are answered from a fixed entity list and
/// events are pushed by hand.
#[derive(Clone, Default)]
pub struct FakeIndexer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: Vec<ParsedEntity>) -> Self {
        let indexer = Self::new();
        indexer.set_entities(entities);
        indexer
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_entities(&self, entities: Vec<ParsedEntity>) {
        self.state().entities = entities;
    }

    pub fn fail_fetches(&self, err: QueryError) {
        self.state().fetch_error = Some(err);
    }

    /// Sends `event` to every open subscription and returns how many took it.
    pub async fn push(&self, event: SubscriptionEvent) -> usize {
        let senders: Vec<_> = self
            .state()
            .streams
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();

        let mut delivered = 0;
        for tx in senders {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn restore_fetches(&self) {
        self.state().fetch_error = None;
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state().active()
    }

    pub fn opened_subscriptions(&self) -> usize {
        self.state().opened
    }

    /// Highest number of simultaneously open subscriptions ever observed.
    pub fn max_active_subscriptions(&self) -> usize {
        self.state().max_active
    }

    pub fn subscribed_queries(&self) -> Vec<Query> {
        self.state()
            .streams
            .iter()
            .map(|(query, _)| query.clone())
            .collect()
    }
}

impl IndexerTransport for FakeIndexer {
    async fn fetch(&self, query: &Query) -> Result<Vec<ParsedEntity>> {
        let mut state = self.state();
        state.fetches += 1;
        if let Some(err) = &state.fetch_error {
            return Err(err.clone());
        }
        Ok(state
            .entities
            .iter()
            .filter(|entity| query.matches(entity))
            .cloned()
            .collect())
    }

    async fn subscribe(&self, query: &Query) -> Result<mpsc::Receiver<SubscriptionEvent>> {
        let (tx, rx) = mpsc::channel(16);
        let mut state = self.state();
        state.streams.retain(|(_, tx)| !tx.is_closed());
        state.streams.push((query.clone(), tx));
        state.opened += 1;
        state.max_active = state.max_active.max(state.active());
        Ok(rx)
    }
}
