//! Error types for disklayout

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("cannot decode customization {input:?}: {source}")]
    Decode {
        input: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode TOML customization: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("{0}")]
    DataSize(String),

    #[error("{0}")]
    Validation(String),

    #[error(
        "the following errors occurred while setting up custom mountpoints:\n{}",
        .0.join("\n")
    )]
    MountpointPolicy(Vec<String>),

    #[error("partition table does not fit: {required} bytes required, {requested} bytes requested")]
    Geometry { required: u64, requested: u64 },

    #[error("invalid sector size {0}: must be a power of two dividing the 1 MiB grain")]
    InvalidSectorSize(u64),

    #[error("cannot find mountpoint {0}")]
    MountpointNotFound(String),

    #[error("partition table has already been finalized")]
    AlreadyFinalized,

    #[error("no root filesystem found in partition table")]
    MissingRoot,

    #[error("{0} has no identifier; generate identifiers first")]
    MissingIdentifier(String),

    #[error("error generating partition table: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LayoutError {
    /// Byte arithmetic on `requested` overflowed; no table can hold it
    pub(crate) fn size_overflow(requested: u64) -> Self {
        LayoutError::Geometry {
            required: u64::MAX,
            requested,
        }
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;
