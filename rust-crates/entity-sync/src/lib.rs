//! Client-side synchronization of world entities: queries and subscriptions
//! against the indexer, and the local store they feed.

pub mod client;
pub mod entity;
pub mod error;
pub mod http_transport;
pub mod query;
pub mod session;
pub mod store;
pub mod subscription;
pub mod transport;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use client::QueryClient;
pub use entity::ParsedEntity;
pub use error::QueryError;
pub use http_transport::HttpTransport;
pub use query::{
    Clause,
    Op,
    Query,
};
pub use session::SyncSession;
pub use store::EntityStore;
pub use subscription::SubscriptionHandle;
pub use transport::{
    IndexerTransport,
    SubscriptionEvent,
};

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
