use crate::{
    Result,
    entity::ParsedEntity,
    error::QueryError,
    query::Query,
    transport::{
        IndexerTransport,
        SUBSCRIPTION_BUFFER,
        SubscriptionEvent,
    },
};
use generated_bindings::EntityId;
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::HashMap,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct EntitiesRequest {
    query: Value,
    limit: u32,
    offset: u32,
}

impl EntitiesRequest {
    fn new(query: &Query) -> Self {
        Self {
            query: query.to_filter_json(),
            limit: query.limit,
            offset: query.offset,
        }
    }
}

/// Talks to the indexer's `/entities` endpoint over HTTP. Subscriptions are
/// served by a polling worker that only forwards entities whose content
/// changed since the last poll. Requests carry no timeout unless one is set
/// with [`HttpTransport::with_request_timeout`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
    poll_interval: Duration,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: None,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_entities(&self, query: &Query) -> Result<Vec<ParsedEntity>> {
        let url = format!("{}/entities", self.base_url);
        let mut request = self.http.post(&url).json(&EntitiesRequest::new(query));
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|err| QueryError::Decode(err.to_string()))
    }
}

impl IndexerTransport for HttpTransport {
    async fn fetch(&self, query: &Query) -> Result<Vec<ParsedEntity>> {
        self.post_entities(query).await
    }

    async fn subscribe(&self, query: &Query) -> Result<mpsc::Receiver<SubscriptionEvent>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(poll_worker(self.clone(), query.clone(), tx));
        Ok(rx)
    }
}

async fn poll_worker(
    transport: HttpTransport,
    query: Query,
    tx: mpsc::Sender<SubscriptionEvent>,
) {
    let mut ticker = time::interval(transport.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seen = HashMap::new();

    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(model = %query.tag(), "subscriber went away; stopping poll worker");
                break;
            }
            _ = ticker.tick() => {
                let event = match transport.post_entities(&query).await {
                    Ok(entities) => {
                        let changed = retain_changed(&mut seen, entities);
                        if changed.is_empty() {
                            continue;
                        }
                        SubscriptionEvent::Entities(changed)
                    }
                    Err(err) => {
                        warn!(%err, model = %query.tag(), "entity poll failed");
                        SubscriptionEvent::Error(err)
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn retain_changed(
    seen: &mut HashMap<EntityId, ParsedEntity>,
    entities: Vec<ParsedEntity>,
) -> Vec<ParsedEntity> {
    entities
        .into_iter()
        .filter(|entity| {
            if seen.get(&entity.entity_id) == Some(entity) {
                return false;
            }
            seen.insert(entity.entity_id, entity.clone());
            true
        })
        .collect()
}
