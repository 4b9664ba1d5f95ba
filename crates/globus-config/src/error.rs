//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while reading or writing `config.ron`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid config.
    #[error("invalid config in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// Tile grids must nest, so every grid size is a power of two.
    #[error("{field} = {value} in {} is not a power of two", path.display())]
    InvalidGrid {
        path: PathBuf,
        field: &'static str,
        value: u32,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] ron::Error),
}
