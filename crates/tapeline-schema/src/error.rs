use thiserror::Error;

use crate::parameter::ParamError;
use crate::typespec::TypeParseError;

/// Error taxonomy for the schema engine. Lookup failures are hard errors
/// carrying the offending keypath; locked or clobber-refused mutations are
/// not errors at all (those return `Ok(false)` from the mutators).
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("invalid keypath [{keypath}]")]
    InvalidKeypath { keypath: String },
    #[error("[{keypath}] is not a parameter")]
    NotAParameter { keypath: String },
    #[error("[{keypath}]: {source}")]
    Param {
        keypath: String,
        #[source]
        source: ParamError,
    },
    #[error("[{keypath}] already exists")]
    KeyExists { keypath: String },
    #[error("schema name is already set to '{name}'")]
    NameAlreadySet { name: String },
    #[error("dependency object carries no name")]
    DependencyUnnamed,
    #[error("dependency '{name}' not found")]
    DependencyNotFound { name: String },
    #[error(transparent)]
    TypeParse(#[from] TypeParseError),
    #[error("manifest error: {0}")]
    Manifest(String),
}

impl SchemaError {
    pub(crate) fn join(keypath: &[&str]) -> String {
        keypath.join(",")
    }

    pub(crate) fn invalid_keypath(keypath: &[&str]) -> Self {
        SchemaError::InvalidKeypath {
            keypath: Self::join(keypath),
        }
    }

    pub(crate) fn not_a_parameter(keypath: &[&str]) -> Self {
        SchemaError::NotAParameter {
            keypath: Self::join(keypath),
        }
    }

    pub(crate) fn param(keypath: &[&str], source: ParamError) -> Self {
        SchemaError::Param {
            keypath: Self::join(keypath),
            source,
        }
    }
}
