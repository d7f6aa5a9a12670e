//! Error taxonomy for the ingestion pipeline
//!
//! Every stage has its own error enum; `PipelineError` wraps them and knows
//! how to present itself to a caller without leaking internals.

use std::time::Duration;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The submitted request was malformed. Terminal, never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid YouTube URL")]
    InvalidUrl,

    #[error("Start time cannot be negative")]
    NegativeStart,

    #[error("End time must be greater than start time")]
    InvalidTimeRange,

    #[error("Intro duration cannot exceed {max} seconds")]
    DurationExceeded { max: u32 },

    #[error("{0}")]
    Invalid(String),
}

/// The clip could not be fetched after the whole strategy chain ran.
#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("Download timeout - video too large or slow connection")]
    Timeout,

    #[error("Video unavailable (private, deleted, or region-blocked)")]
    Unavailable,

    #[error("Video requires sign-in (age-restricted)")]
    Restricted,

    #[error("Download failed: {0}")]
    Unknown(String),

    #[error("Scratch directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// The remote model could not produce a usable analysis.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read clip: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model response as JSON: {0}")]
    MalformedResponse(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("Gemini API quota exceeded. Please try again later.")]
    QuotaExceeded,

    #[error("Invalid Gemini API key")]
    InvalidCredential,

    #[error("AI analysis failed: {0}")]
    Generic(String),
}

/// Persistence collaborator failure, propagated as-is.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(u64),
}

/// Failure of one external tool invocation inside a strategy.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .limit.as_secs())]
    TimedOut { program: String, limit: Duration },

    #[error("{program} exceeded output limit of {limit} bytes")]
    OutputLimit { program: String, limit: usize },

    #[error("{program} exited with {status}: {diagnostics}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        diagnostics: String,
    },

    #[error("{program} I/O error: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// "your input was invalid"
    InvalidInput,
    /// "the source could not be fetched"
    SourceFetch,
    /// "analysis failed"
    Analysis,
    Persistence,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::InvalidInput,
            PipelineError::Acquisition(_) => ErrorKind::SourceFetch,
            PipelineError::Analysis(_) => ErrorKind::Analysis,
            PipelineError::Store(_) => ErrorKind::Persistence,
        }
    }

    /// Caller-facing message. Raw tool output, provider bodies and storage
    /// details stay internal; `Display` keeps them for the logs.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Store(_) => "Internal server error".to_string(),
            PipelineError::Acquisition(AcquisitionError::Io(_) | AcquisitionError::Unknown(_)) => {
                "Download failed".to_string()
            }
            PipelineError::Analysis(AnalysisError::Io(_) | AnalysisError::Generic(_)) => {
                "AI analysis failed".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: PipelineError = ValidationError::InvalidTimeRange.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: PipelineError = AcquisitionError::Restricted.into();
        assert_eq!(err.kind(), ErrorKind::SourceFetch);
        assert_eq!(err.user_message(), "Video requires sign-in (age-restricted)");

        let err: PipelineError = AnalysisError::MissingField("mood".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Analysis);
        assert_eq!(err.to_string(), "missing field: mood");
    }

    #[test]
    fn test_store_errors_hide_details() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/data/intros.json");
        let err: PipelineError = StoreError::Io(io).into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!err.user_message().contains("/srv"));
    }

    #[test]
    fn test_tool_and_provider_output_hidden() {
        let err: PipelineError = AcquisitionError::Unknown(
            "ffmpeg exited with exit status: 1: /srv/app/temp/abc_1_0_f18.mp4: Invalid data".to_string(),
        )
        .into();
        assert_eq!(err.user_message(), "Download failed");
        assert!(err.to_string().contains("/srv/app/temp"));

        let err: PipelineError = AnalysisError::Generic("HTTP 500: {\"error\": \"backend\"}".to_string()).into();
        assert_eq!(err.user_message(), "AI analysis failed");

        let err: PipelineError = AcquisitionError::Unavailable.into();
        assert_eq!(err.user_message(), err.to_string());
    }
}
