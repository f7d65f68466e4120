//! Error taxonomy for the shot-boundary-detection core.
//!
//! Every fallible top-level operation returns exactly one of a success value
//! or a single [`CoreError`]; no panic-based control flow crosses the crate
//! boundary in non-test code.

use thiserror::Error;

/// A single error record: a kind tag plus a human-readable message and,
/// where applicable, the offending frame index or cache key.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input error: {message}")]
    Input { message: String },

    #[error("source error: {message}{}", frame_suffix(*frame_index))]
    Source {
        message: String,
        frame_index: Option<usize>,
    },

    #[error("detector init error ({detector}): {message}")]
    DetectorInit { detector: String, message: String },

    #[error("processing error ({detector}): {message}{}", frame_suffix(*frame_index))]
    Processing {
        detector: String,
        message: String,
        frame_index: Option<usize>,
    },

    #[error("fusion error: inconsistent input ({message})")]
    FusionInconsistentInput { message: String },

    #[error("cache error: corrupt entry {key}")]
    CacheCorrupt { key: String },

    #[error("cache error: {message}")]
    CacheIo { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("cancellation not observed within {timeout_ms}ms")]
    CancellationTimedOut { timeout_ms: u64 },
}

fn frame_suffix(frame_index: Option<usize>) -> String {
    match frame_index {
        Some(idx) => format!(" (frame {idx})"),
        None => String::new(),
    }
}

impl CoreError {
    /// Short, stable tag naming the error kind, independent of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Input { .. } => "InputError",
            CoreError::Source { .. } => "SourceError",
            CoreError::DetectorInit { .. } => "DetectorInitError",
            CoreError::Processing { .. } => "ProcessingError",
            CoreError::FusionInconsistentInput { .. } => "FusionError.InconsistentInput",
            CoreError::CacheCorrupt { .. } => "CacheError.Corrupt",
            CoreError::CacheIo { .. } => "CacheError.IO",
            CoreError::Cancelled => "Cancelled",
            CoreError::CancellationTimedOut { .. } => "CancellationTimedOut",
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        CoreError::Input {
            message: message.into(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        CoreError::Source {
            message: message.into(),
            frame_index: None,
        }
    }

    pub fn source_at(message: impl Into<String>, frame_index: usize) -> Self {
        CoreError::Source {
            message: message.into(),
            frame_index: Some(frame_index),
        }
    }

    pub fn detector_init(detector: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::DetectorInit {
            detector: detector.into(),
            message: message.into(),
        }
    }

    pub fn processing(detector: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Processing {
            detector: detector.into(),
            message: message.into(),
            frame_index: None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
