use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    /// Zero-area input; fatal for the run and never retried
    #[error("Invalid image: {width}x{height} has no pixels")]
    InvalidImage { width: u32, height: u32 },

    /// A classifier call failed for one card; other cards are unaffected
    #[error("Classification failed for card {ordinal}: {message}")]
    Classification { ordinal: usize, message: String },

    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

impl DetectError {
    /// Recover a typed error that a pipeline step raised through `anyhow`
    pub fn from_pipeline(err: anyhow::Error) -> Self {
        err.downcast::<DetectError>().unwrap_or_else(DetectError::Pipeline)
    }
}
