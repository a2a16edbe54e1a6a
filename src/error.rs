use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetpathError {
    #[error("scheduler ingress queue is full (queue capacity is {capacity})")]
    QueueFull { capacity: usize },

    #[error("probe error: {0}")]
    Probe(String),

    #[error("forwarder error: {0}")]
    Forwarder(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetpathError>;
