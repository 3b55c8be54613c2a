//! Handing extracted frames to a downstream analyzer.
//!
//! The crate does not talk to any model service itself. [`FrameAnalyzer`] is
//! the seam where a caller plugs in their client: it receives a prompt, the
//! extracted JPEG frames, and sampling options, and returns whatever the
//! client produces.
//!
//! # Example
//!
//! ```
//! use framegrab::{AnalysisRequest, FrameAnalyzer};
//!
//! struct CountFrames;
//!
//! impl FrameAnalyzer for CountFrames {
//!     type Output = usize;
//!     type Error = std::convert::Infallible;
//!
//!     fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<usize, Self::Error> {
//!         Ok(request.frames.len())
//!     }
//! }
//!
//! let frames = vec![vec![0xFF, 0xD8, 0xFF, 0xD9]];
//! let request = AnalysisRequest::new("Describe the scene", &frames);
//! assert_eq!(CountFrames.analyze(&request), Ok(1));
//! ```

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::cancellation::CancellationToken;
use crate::error::FrameGrabError;
use crate::frames::data_uri;
use crate::processor::FrameProcessor;

/// Sampling options forwarded to the analyzer. Unset fields are left to the
/// analyzer's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOptions {
    /// Sampling temperature, usually in `0.0..=1.0`.
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold, usually in `0.0..=1.0`.
    pub top_p: Option<f64>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Whether the analyzer should stream its answer.
    pub stream: bool,
}

impl AnalysisOptions {
    /// Render the set fields as a JSON object, omitting unset ones.
    ///
    /// ```
    /// use framegrab::AnalysisOptions;
    ///
    /// let options = AnalysisOptions { temperature: Some(0.2), ..Default::default() };
    /// assert_eq!(options.to_json().to_string(), r#"{"temperature":0.2}"#);
    /// ```
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(temperature) = self.temperature {
            object.insert("temperature".into(), Value::from(temperature));
        }
        if let Some(top_p) = self.top_p {
            object.insert("top_p".into(), Value::from(top_p));
        }
        if let Some(max_tokens) = self.max_tokens {
            object.insert("max_tokens".into(), Value::from(max_tokens));
        }
        if self.stream {
            object.insert("stream".into(), Value::Bool(true));
        }
        Value::Object(object)
    }
}

/// Input to a [`FrameAnalyzer`].
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    /// Instruction for the analyzer.
    pub prompt: &'a str,
    /// JPEG frames in extraction order.
    pub frames: &'a [Vec<u8>],
    /// Sampling options.
    pub options: AnalysisOptions,
}

impl<'a> AnalysisRequest<'a> {
    /// A request with default options.
    pub fn new(prompt: &'a str, frames: &'a [Vec<u8>]) -> Self {
        Self {
            prompt,
            frames,
            options: AnalysisOptions::default(),
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// The frames as `data:image/jpeg;base64,` URIs.
    pub fn frame_data_uris(&self) -> Vec<String> {
        self.frames.iter().map(|frame| data_uri(frame)).collect()
    }
}

/// A consumer of extracted frames, such as a vision-model client.
pub trait FrameAnalyzer {
    /// What the analyzer produces.
    type Output;
    /// What the analyzer fails with.
    type Error;

    /// Analyze the frames in `request`.
    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Self::Output, Self::Error>;
}

/// Failure of an extract-then-analyze call.
#[derive(Debug, Error)]
pub enum AnalysisError<E> {
    /// Frames could not be extracted.
    #[error("Frame extraction failed: {0}")]
    Extraction(#[from] FrameGrabError),
    /// The analyzer rejected the frames.
    #[error("Analyzer failed: {0}")]
    Analyzer(E),
}

impl FrameProcessor {
    /// Extract frames from the container at `path` and pass them to
    /// `analyzer`.
    pub fn analyze_file<A, P>(
        &self,
        analyzer: &A,
        path: P,
        prompt: &str,
        options: AnalysisOptions,
    ) -> Result<A::Output, AnalysisError<A::Error>>
    where
        A: FrameAnalyzer,
        P: AsRef<Path>,
    {
        let frames = self.extract_frames_from_file(path)?;
        log::debug!("Analyzing {} frames", frames.len());
        let request = AnalysisRequest::new(prompt, &frames).with_options(options);
        analyzer.analyze(&request).map_err(AnalysisError::Analyzer)
    }

    /// Extract frames from raw H.264 `data` and pass them to `analyzer`.
    pub fn analyze_h264<A>(
        &self,
        analyzer: &A,
        data: &[u8],
        prompt: &str,
        options: AnalysisOptions,
        cancellation: &CancellationToken,
    ) -> Result<A::Output, AnalysisError<A::Error>>
    where
        A: FrameAnalyzer,
    {
        let frames = self.extract_from_h264_with_cancellation(data, cancellation)?;
        log::debug!("Analyzing {} frames", frames.len());
        let request = AnalysisRequest::new(prompt, &frames).with_options(options);
        analyzer.analyze(&request).map_err(AnalysisError::Analyzer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_json_omits_unset_fields() {
        assert_eq!(AnalysisOptions::default().to_json().to_string(), "{}");

        let options = AnalysisOptions {
            temperature: Some(0.5),
            top_p: Some(0.9),
            max_tokens: Some(512),
            stream: true,
        };
        let json = options.to_json();
        assert_eq!(json["top_p"], 0.9);
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn request_builds_data_uris() {
        let frames = vec![vec![0xFF, 0xD8, 0xFF, 0xE0]];
        let request = AnalysisRequest::new("What happens?", &frames);
        assert_eq!(
            request.frame_data_uris(),
            vec!["data:image/jpeg;base64,/9j/4A==".to_string()],
        );
    }
}
