use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The subscriber fell behind the broadcast buffer and missed `n` events.
    #[error("subscription lagged behind by {0} events")]
    Lagged(u64),

    #[error("channel disconnected")]
    Disconnected,

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
