//! Error taxonomy surfaced to the host UI.

/// Why an asset could not be turned into scene geometry.
///
/// `NotFound` is a data state (render the "no 3D model available"
/// placeholder), the other variants are hard load errors.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AssetError {
    #[error("no 3D model available for {0}")]
    NotFound(String),
    #[error("access to {0} was denied: the storage link could not be authorized")]
    Forbidden(String),
    #[error("the 3D model at {path} is corrupt or uses an unsupported format: {reason}")]
    ParseFailure { path: String, reason: String },
    #[error("network error while fetching {path}: {reason}")]
    Network { path: String, reason: String },
}

impl AssetError {
    /// Whether the host should show an error panel rather than a placeholder.
    pub fn is_hard(&self) -> bool {
        !matches!(self, AssetError::NotFound(_))
    }
}

/// Failure of a single byte fetch, before the loader interprets it.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
