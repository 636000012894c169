use thiserror::Error;

pub type LiveResult<T> = Result<T, LiveError>;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("index {index} out of range for series of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("mutation policy failed on cycle {cycle}: {source}")]
    PolicyExecution {
        cycle: u64,
        #[source]
        source: Box<LiveError>,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
