//! Classified pipeline failures.
//!
//! Everything in the crate returns `anyhow::Result`. Failures the caller may
//! want to tell apart are raised as a `PipelineError` inside the
//! `anyhow::Error`, so outer layers can `downcast_ref::<PipelineError>()`.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// The frame source cannot supply another frame.
    SourceExhausted { source: String },
    /// The encoder could not serialize the annotated frame.
    Encoding(String),
    /// `BackgroundModel::diff` was called before a reference was captured.
    UninitializedBackground,
    /// A frame does not match the reference frame geometry.
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::SourceExhausted { .. } => "SOURCE_EXHAUSTED",
            PipelineError::Encoding(_) => "ENCODING_FAILED",
            PipelineError::UninitializedBackground => "BACKGROUND_UNINITIALIZED",
            PipelineError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::SourceExhausted { source } => {
                write!(f, "{}: frame source {} has no more frames", self.code(), source)
            }
            PipelineError::Encoding(message) => write!(f, "{}: {}", self.code(), message),
            PipelineError::UninitializedBackground => write!(
                f,
                "{}: background reference queried before initialization",
                self.code()
            ),
            PipelineError::DimensionMismatch { expected, actual } => write!(
                f,
                "{}: expected {}x{} frame, got {}x{}",
                self.code(),
                expected.0,
                expected.1,
                actual.0,
                actual.1
            ),
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_survives_anyhow_round_trip() {
        let err: anyhow::Error = PipelineError::SourceExhausted {
            source: "dir:///tmp/frames".to_string(),
        }
        .into();
        let classified = err.downcast_ref::<PipelineError>().expect("typed error");
        assert_eq!(classified.code(), "SOURCE_EXHAUSTED");
        assert!(err.to_string().contains("dir:///tmp/frames"));
    }

    #[test]
    fn dimension_mismatch_names_both_sizes() {
        let err = PipelineError::DimensionMismatch {
            expected: (800, 608),
            actual: (640, 480),
        };
        assert_eq!(
            err.to_string(),
            "DIMENSION_MISMATCH: expected 800x608 frame, got 640x480"
        );
    }
}
