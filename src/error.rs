use thiserror::Error;

/// Errors that end a search invocation
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Could not find the location \"{0}\". Check the spelling or try a nearby town.")]
    LocationNotFound(String),

    #[error("Search radius must be a positive number of kilometres, got {0}")]
    InvalidRadius(f64),

    #[error("Search was cancelled")]
    Cancelled,
}

/// Errors raised by a single data source. The pipeline never propagates these.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{source_name} returned status {status}")]
    Unavailable { source_name: &'static str, status: u16 },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{source_name} sent a response that could not be parsed: {reason}")]
    Malformed { source_name: &'static str, reason: String },
}

impl SourceError {
    pub fn malformed(source_name: &'static str, reason: impl ToString) -> Self {
        SourceError::Malformed {
            source_name,
            reason: reason.to_string(),
        }
    }
}
