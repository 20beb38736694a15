//! Top-level error wrapper types.

use crate::{CacheError, ConfigError, MediaError, StorageError};

/// Every error the media layer can surface to its callers.
///
/// # Examples
///
/// ```
/// use vouch_error::{ConfigError, VouchError};
///
/// let err: VouchError = ConfigError::new("bad backend").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum VouchErrorKind {
    /// Remote blob store error
    #[from(StorageError)]
    Storage(StorageError),
    /// Local video cache error
    #[from(CacheError)]
    Cache(CacheError),
    /// Ingest or thumbnail error
    #[from(MediaError)]
    Media(MediaError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Vouch error with kind discrimination.
///
/// # Examples
///
/// ```
/// use vouch_error::{ConfigError, VouchResult};
///
/// fn might_fail() -> VouchResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Vouch Error: {}", _0)]
pub struct VouchError(Box<VouchErrorKind>);

impl VouchError {
    /// Create a new error from a kind.
    pub fn new(kind: VouchErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &VouchErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to VouchErrorKind
impl<T> From<T> for VouchError
where
    T: Into<VouchErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Vouch operations.
pub type VouchResult<T> = std::result::Result<T, VouchError>;
