use crate::{
    Result,
    entity::ParsedEntity,
    error::QueryError,
    query::Query,
};
use tokio::sync::mpsc;

pub const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// Entities that were created or changed since the previous event.
    Entities(Vec<ParsedEntity>),
    Error(QueryError),
}

/// Wire access to the indexer. A subscription stays open until the returned
/// receiver is dropped.
pub trait IndexerTransport: Send + Sync + 'static {
    fn fetch(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<ParsedEntity>>> + Send;

    fn subscribe(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<mpsc::Receiver<SubscriptionEvent>>> + Send;
}
