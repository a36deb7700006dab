use thiserror::Error;

/// Fatal errors raised during configuration parsing and plugin
/// registration. Per-tick soft-skips and numeric degeneracies never
/// surface here — they are validity-bit and `Option` plumbing instead.
#[derive(Error, Debug)]
pub enum FsnavError {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(std::path::PathBuf),

    #[error("configuration exceeds {max} bytes")]
    ConfigTooLarge { max: usize },

    #[error("configuration parse error: {0}")]
    ConfigParse(String),

    #[error("plugin list full (max {max})")]
    PluginListFull { max: usize },

    #[error("cannot schedule plugin after init")]
    AlreadyInitialized,

    #[error("invalid cadence: cycle={cycle} shift={shift}")]
    InvalidCadence { cycle: i64, shift: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type FsnavResult<T> = Result<T, FsnavError>;
