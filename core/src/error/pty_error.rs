use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to spawn {program} in pseudo-terminal")]
    Spawn {
        program: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("pseudo-terminal is not started")]
    NotStarted,

    /// The child side hung up; no more output will arrive.
    #[error("pseudo-terminal closed")]
    Closed,

    #[error("pseudo-terminal io error")]
    Io(#[from] std::io::Error),

    #[error("pseudo-terminal error: {0}")]
    Other(String),
}
