//! Error types for the `framegrab` crate.
//!
//! This module defines [`FrameGrabError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry the diagnostic text of
//! the stage that failed (decoder stderr, probe output, parameter-set
//! decoding reason) so they can be diagnosed without additional logging at
//! the call site.

use std::{io::Error as IoError, process::ExitStatus, time::Duration};

use image::ImageError;
use thiserror::Error;

use crate::configuration::ParameterSetKind;

/// Exit information of an external process.
///
/// `code` is `None` when the process was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Numeric exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Whether the process reported success.
    pub success: bool,
}

impl ExitInfo {
    /// A successful exit with code 0.
    pub const SUCCESS: ExitInfo = ExitInfo {
        code: Some(0),
        success: true,
    };

    /// A failed exit with the given code.
    pub fn failure(code: i32) -> Self {
        Self {
            code: Some(code),
            success: false,
        }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// The unified error type for all `framegrab` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameGrabError {
    /// A configured SPS or PPS could not be decoded from its stored encoding.
    #[error("Invalid {kind} parameter set: {reason}")]
    InvalidParameterSet {
        /// Which parameter set was rejected.
        kind: ParameterSetKind,
        /// Why decoding failed.
        reason: String,
    },

    /// The external decoder exited with a non-zero status.
    #[error("Decoder failed ({status}): {stderr}")]
    DecodeFailed {
        /// How the decoder process exited.
        status: ExitInfo,
        /// Captured standard error of the decoder.
        stderr: String,
    },

    /// An external program (decoder or probe) could not be started.
    #[error("Program `{program}` is unavailable: {reason}")]
    ToolUnavailable {
        /// Program name or path that was spawned.
        program: String,
        /// Underlying spawn error.
        reason: String,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The decoded output contained no complete JPEG image.
    #[error("No frames found in decoder output")]
    NoFramesFound,

    /// The duration probe did not produce a usable number.
    #[error("Duration probe failed: {0}")]
    ProbeFailed(String),

    /// The probed video is too short to yield a frame at the configured rate.
    #[error("Video too short or invalid (duration {duration:?})")]
    VideoTooShort {
        /// The probed duration.
        duration: Duration,
    },

    /// The demux worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// A base64-encoded frame could not be decoded.
    #[error("Frame {index} is not valid base64: {reason}")]
    InvalidFrameEncoding {
        /// Position of the rejected frame in the input.
        index: usize,
        /// Why decoding failed.
        reason: String,
    },

    /// [`StreamExtractor::start`](crate::StreamExtractor::start) was called on
    /// an extractor that is not idle.
    #[error("Extraction session already started")]
    SessionAlreadyStarted,

    /// An I/O error occurred while reading a source or handling temp files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate while inspecting a frame.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}
