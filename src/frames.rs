//! Helpers for extracted frames.
//!
//! Frames leave the pipeline as raw JPEG bytes. Vision-model APIs usually
//! want them base64-encoded inside `data:` URIs and expect dimensions that
//! are multiples of 28; this module converts frames to those forms and
//! summarizes a frame sequence as [`FrameMetadata`].

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, ImageReader};
use serde_json::{Value, json};

use crate::configuration::DIMENSION_MULTIPLE;
use crate::error::FrameGrabError;

/// Encode each frame as standard base64.
pub fn encode_frames_base64(frames: &[Vec<u8>]) -> Vec<String> {
    frames.iter().map(|frame| STANDARD.encode(frame)).collect()
}

/// Decode base64-encoded frames back into JPEG bytes.
pub fn decode_frames_base64(frames: &[String]) -> Result<Vec<Vec<u8>>, FrameGrabError> {
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            STANDARD
                .decode(frame)
                .map_err(|error| FrameGrabError::InvalidFrameEncoding {
                    index,
                    reason: error.to_string(),
                })
        })
        .collect()
}

/// Wrap a JPEG frame in a `data:image/jpeg;base64,` URI.
pub fn data_uri(frame: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(frame))
}

/// Read the pixel dimensions from a JPEG frame's header.
pub fn frame_dimensions(frame: &[u8]) -> Result<(u32, u32), FrameGrabError> {
    Ok(ImageReader::with_format(Cursor::new(frame), ImageFormat::Jpeg).into_dimensions()?)
}

/// Summary of an extracted frame sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    /// Number of frames in the sequence.
    pub total_frames: usize,
    /// Sampling rate the frames were extracted at.
    pub frames_per_second: u32,
    /// Span of video the frames cover (`total_frames / frames_per_second`).
    pub duration: Duration,
    /// Width of the first frame.
    pub width: u32,
    /// Height of the first frame.
    pub height: u32,
    /// Whether both dimensions are positive multiples of 28.
    pub valid_dimension: bool,
}

impl FrameMetadata {
    /// Render as a JSON object.
    pub fn to_json(&self) -> Value {
        json!({
            "total_frames": self.total_frames,
            "fps": self.frames_per_second,
            "duration": self.duration.as_secs_f64(),
            "width": self.width,
            "height": self.height,
            "valid_dimension": self.valid_dimension,
        })
    }
}

/// Summarize `frames` extracted at `frames_per_second`.
///
/// Dimensions come from the first frame; the decoder pads every frame to
/// the same size.
///
/// # Errors
///
/// - [`FrameGrabError::NoFramesFound`] if `frames` is empty.
/// - [`FrameGrabError::Image`] if the first frame's header cannot be read.
pub fn inspect_frames(
    frames: &[Vec<u8>],
    frames_per_second: u32,
) -> Result<FrameMetadata, FrameGrabError> {
    let first = frames.first().ok_or(FrameGrabError::NoFramesFound)?;
    let (width, height) = frame_dimensions(first)?;
    let frames_per_second = frames_per_second.max(1);

    Ok(FrameMetadata {
        total_frames: frames.len(),
        frames_per_second,
        duration: Duration::from_secs_f64(frames.len() as f64 / f64::from(frames_per_second)),
        width,
        height,
        valid_dimension: is_valid_dimension(width) && is_valid_dimension(height),
    })
}

fn is_valid_dimension(value: u32) -> bool {
    value > 0 && value % DIMENSION_MULTIPLE == 0
}
