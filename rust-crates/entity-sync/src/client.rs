use crate::{
    Result,
    entity::ParsedEntity,
    query::Query,
    subscription::SubscriptionHandle,
    transport::{
        IndexerTransport,
        SubscriptionEvent,
    },
};
use std::sync::Arc;
use tracing::{
    debug,
    warn,
};

pub struct QueryClient<T> {
    transport: Arc<T>,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<T: IndexerTransport> QueryClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch_entities(&self, query: &Query) -> Result<Vec<ParsedEntity>> {
        debug!(model = %query.tag(), clauses = query.clauses.len(), "fetching entities");
        self.transport
            .fetch(query)
            .await
            .inspect_err(|err| warn!(%err, model = %query.tag(), "entity fetch failed"))
    }

    /// Opens a push subscription and forwards every event to `on_event`
    /// until the returned handle is cancelled or dropped.
    pub async fn subscribe<F>(&self, query: &Query, on_event: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(SubscriptionEvent) + Send + 'static,
    {
        debug!(model = %query.tag(), "opening entity subscription");
        let stream = self
            .transport
            .subscribe(query)
            .await
            .inspect_err(|err| warn!(%err, model = %query.tag(), "subscription failed"))?;
        Ok(SubscriptionHandle::spawn(stream, on_event))
    }
}
