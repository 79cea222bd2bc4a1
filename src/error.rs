use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ForwardError>;
