use thiserror::Error;

/// Failure while reading or writing the on-disk key file.
///
/// Never crosses the crate boundary: the store logs and degrades instead of
/// surfacing I/O problems to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
