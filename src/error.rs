use thiserror::Error;

/// Messages GitHub returns alongside a 401.
const BAD_CREDENTIAL_MESSAGES: &[&str] = &["Bad credentials", "Requires authentication"];

#[derive(Debug, Error)]
pub enum ReputationError {
    /// Missing or rejected credential. Fatal for the whole invocation.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The host answered with a non-success status, or not at all.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Negative or otherwise unusable statistics for one contributor.
    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),

    /// The score store could not be read or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Bad options or a malformed trigger payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ReputationError {
    /// Stable tag echoed back to callers for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReputationError::Unauthenticated(_) => "unauthenticated",
            ReputationError::UpstreamUnavailable(_) => "upstream_unavailable",
            ReputationError::InvalidAggregate(_) => "invalid_aggregate",
            ReputationError::StoreUnavailable(_) => "store_unavailable",
            ReputationError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReputationError::Unauthenticated(_) | ReputationError::StoreUnavailable(_)
        )
    }
}

impl From<octocrab::Error> for ReputationError {
    fn from(err: octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { source, .. } = &err {
            if BAD_CREDENTIAL_MESSAGES
                .iter()
                .any(|m| source.message.eq_ignore_ascii_case(m))
            {
                return ReputationError::Unauthenticated(source.message.clone());
            }
            return ReputationError::UpstreamUnavailable(source.message.clone());
        }
        ReputationError::UpstreamUnavailable(upstream_detail(&err))
    }
}

/// octocrab's `Display` appends a captured backtrace; keep the first line of
/// the underlying cause only.
fn upstream_detail(err: &octocrab::Error) -> String {
    let detail = std::error::Error::source(err)
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string());
    detail.lines().next().unwrap_or_default().trim().to_string()
}

impl From<rusqlite::Error> for ReputationError {
    fn from(err: rusqlite::Error) -> Self {
        ReputationError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReputationError>;
