use std::num::ParseIntError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("unhandled topic {0}")]
    UnknownTopic(String),
    #[error("invalid group id in topic {topic}")]
    InvalidGroup {
        topic: String,
        #[source]
        source: ParseIntError,
    },
    #[error("payload carries no device mac")]
    MissingMac,
    #[error("malformed json payload")]
    Json(#[from] serde_json::Error),
}
