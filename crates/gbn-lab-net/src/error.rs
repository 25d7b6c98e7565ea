use gbn_lab_abstract::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("no peer address known to send to")]
    NoPeer,
}
