use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid seed '{input}': {reason}")]
    SeedFormat { input: String, reason: String },

    #[error("Unknown RNG stream '{name}'")]
    UnknownStream { name: String },

    #[error("Invalid act {act}")]
    InvalidAct { act: u8 },

    #[error("Pool exhausted: {pool}")]
    PoolExhausted { pool: String },

    #[error("Action {action} is not valid in phase {phase}")]
    IllegalAction { phase: String, action: String },

    #[error("Run already complete")]
    RunComplete,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
