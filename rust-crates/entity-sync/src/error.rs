#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("indexer request failed: {0}")]
    Transport(String),
    #[error("indexer responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid indexer payload: {0}")]
    Decode(String),
    #[error("indexer closed the subscription channel")]
    ChannelClosed,
}
