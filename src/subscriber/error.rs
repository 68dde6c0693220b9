use crate::messages::CodecError;

#[derive(thiserror::Error, Debug)]
pub enum SubscriberError {
    #[error("Invalid subscriber configuration: {0}")]
    Configuration(String),
    #[error("The subscriber has already been started")]
    AlreadyStarted,
    #[error("The subscriber has not been started")]
    NotStarted,
    #[error("The subscriber has been disposed")]
    Disposed,
    #[error("The subscriber has never been started")]
    InvalidState,
    #[error("Broker operation failed")]
    Transport(#[source] anyhow::Error),
    #[error("Failed to reject an undecodable message on queue {queue_name}")]
    Scan {
        queue_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<crate::transport::Error> for SubscriberError {
    fn from(e: crate::transport::Error) -> Self {
        Self::Transport(e.into())
    }
}

impl From<crate::pool::Error> for SubscriberError {
    fn from(e: crate::pool::Error) -> Self {
        Self::Transport(e.into())
    }
}
