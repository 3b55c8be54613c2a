//! Processor configuration.
//!
//! [`ProcessorConfig`] is a value object that parameterizes frame sampling,
//! output geometry, JPEG quality, the H.264 parameter sets injected into raw
//! streams, and concurrency limits. It is built once through chained
//! `with_*` setters that normalize their inputs, then handed to a
//! [`FrameProcessor`](crate::FrameProcessor).
//!
//! # Example
//!
//! ```
//! use framegrab::ProcessorConfig;
//!
//! let config = ProcessorConfig::new()
//!     .with_frame_rate(1)
//!     .with_resolution(100, 50)
//!     .with_quality(150);
//!
//! assert_eq!((config.target_width(), config.target_height()), (112, 56));
//! assert_eq!(config.quality(), 100);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::FrameGrabError;

/// Output dimensions must be multiples of this value.
pub const DIMENSION_MULTIPLE: u32 = 28;

/// Default SPS, base64-encoded.
pub const DEFAULT_SPS: &str = "Z0LADJoFAAABMA==";
/// Default PPS, base64-encoded.
pub const DEFAULT_PPS: &str = "aM48gA==";

const DEFAULT_FRAME_RATE: u32 = 2;
const DEFAULT_DIMENSION: u32 = 1120;
const DEFAULT_QUALITY: u8 = 90;
const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Which of the two H.264 parameter sets an item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    /// Sequence Parameter Set.
    Sps,
    /// Picture Parameter Set.
    Pps,
}

impl Display for ParameterSetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ParameterSetKind::Sps => write!(f, "SPS"),
            ParameterSetKind::Pps => write!(f, "PPS"),
        }
    }
}

/// The SPS/PPS pair injected in front of raw H.264 data.
///
/// Stored in base64 text form and decoded on use, so a malformed value is
/// reported as [`FrameGrabError::InvalidParameterSet`] by the extraction
/// that needs it rather than at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSets {
    sps: String,
    pps: String,
}

impl Default for ParameterSets {
    fn default() -> Self {
        Self {
            sps: DEFAULT_SPS.to_string(),
            pps: DEFAULT_PPS.to_string(),
        }
    }
}

impl ParameterSets {
    /// Create a pair from base64-encoded SPS and PPS strings.
    pub fn from_base64(sps: impl Into<String>, pps: impl Into<String>) -> Self {
        Self {
            sps: sps.into(),
            pps: pps.into(),
        }
    }

    /// Create a pair from raw SPS and PPS NAL unit payloads.
    pub fn from_raw(sps: &[u8], pps: &[u8]) -> Self {
        Self {
            sps: STANDARD.encode(sps),
            pps: STANDARD.encode(pps),
        }
    }

    /// The SPS in its stored base64 form.
    pub fn sps_base64(&self) -> &str {
        &self.sps
    }

    /// The PPS in its stored base64 form.
    pub fn pps_base64(&self) -> &str {
        &self.pps
    }

    /// Decode the SPS payload.
    pub fn sps(&self) -> Result<Vec<u8>, FrameGrabError> {
        decode_parameter_set(ParameterSetKind::Sps, &self.sps)
    }

    /// Decode the PPS payload.
    pub fn pps(&self) -> Result<Vec<u8>, FrameGrabError> {
        decode_parameter_set(ParameterSetKind::Pps, &self.pps)
    }
}

fn decode_parameter_set(
    kind: ParameterSetKind,
    encoded: &str,
) -> Result<Vec<u8>, FrameGrabError> {
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|error| FrameGrabError::InvalidParameterSet {
            kind,
            reason: error.to_string(),
        })?;

    if decoded.is_empty() {
        return Err(FrameGrabError::InvalidParameterSet {
            kind,
            reason: "decoded payload is empty".to_string(),
        });
    }

    Ok(decoded)
}

/// Round `value` up to the nearest multiple of [`DIMENSION_MULTIPLE`].
///
/// Zero rounds up to one full multiple so the result is always positive.
pub fn round_to_dimension_multiple(value: u32) -> u32 {
    let value = value.max(1);
    value.div_ceil(DIMENSION_MULTIPLE).saturating_mul(DIMENSION_MULTIPLE)
}

/// Configuration for a [`FrameProcessor`](crate::FrameProcessor).
///
/// All setters normalize instead of failing: resolution rounds up to a
/// multiple of 28, quality clamps to `1..=100`, and counts clamp to at
/// least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    frame_rate: u32,
    target_width: u32,
    target_height: u32,
    quality: u8,
    parameter_sets: ParameterSets,
    max_workers: usize,
    buffer_capacity: usize,
    hardware_acceleration: bool,
    decoder_program: String,
    probe_program: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorConfig {
    /// Create a configuration with default settings.
    ///
    /// Defaults: 2 fps, 1120x1120, quality 90, the built-in parameter sets,
    /// one worker per available CPU, buffer capacity 100, no hardware
    /// acceleration, `ffmpeg` and `ffprobe` looked up on `PATH`.
    pub fn new() -> Self {
        let max_workers = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);

        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            target_width: DEFAULT_DIMENSION,
            target_height: DEFAULT_DIMENSION,
            quality: DEFAULT_QUALITY,
            parameter_sets: ParameterSets::default(),
            max_workers,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            hardware_acceleration: false,
            decoder_program: "ffmpeg".to_string(),
            probe_program: "ffprobe".to_string(),
        }
    }

    /// Set how many frames per second are sampled. Clamped to at least 1.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate.max(1);
        self
    }

    /// Set the output resolution.
    ///
    /// Each dimension is rounded up to the nearest multiple of 28.
    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.target_width = round_to_dimension_multiple(width);
        self.target_height = round_to_dimension_multiple(height);
        self
    }

    /// Set the JPEG quality on a 1-100 "higher is better" scale.
    #[must_use]
    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality.clamp(1, 100) as u8;
        self
    }

    /// Replace the SPS/PPS pair injected into raw H.264 streams.
    #[must_use]
    pub fn with_parameter_sets(mut self, parameter_sets: ParameterSets) -> Self {
        self.parameter_sets = parameter_sets;
        self
    }

    /// Set the worker count used by the concurrent demuxer and passed to
    /// the decoder as its thread count. Clamped to at least 1.
    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Set how many located frames a demux worker copies per work item in
    /// container-file extraction. Clamped to at least 1.
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Ask the decoder to pick a hardware decoder when one is available.
    #[must_use]
    pub fn with_hardware_acceleration(mut self, enabled: bool) -> Self {
        self.hardware_acceleration = enabled;
        self
    }

    /// Use a specific decoder executable instead of `ffmpeg` on `PATH`.
    #[must_use]
    pub fn with_decoder_program(mut self, program: impl Into<String>) -> Self {
        self.decoder_program = program.into();
        self
    }

    /// Use a specific probe executable instead of `ffprobe` on `PATH`.
    #[must_use]
    pub fn with_probe_program(mut self, program: impl Into<String>) -> Self {
        self.probe_program = program.into();
        self
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn parameter_sets(&self) -> &ParameterSets {
        &self.parameter_sets
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn hardware_acceleration(&self) -> bool {
        self.hardware_acceleration
    }

    pub fn decoder_program(&self) -> &str {
        &self.decoder_program
    }

    pub fn probe_program(&self) -> &str {
        &self.probe_program
    }

    /// The decoder's `-q:v` value for the configured quality.
    ///
    /// Maps 1..=100 (higher is better) linearly onto 31..=2 (lower is
    /// better): `clamp(round(31 - (quality - 1) / 99 * 29), 2, 31)`.
    pub fn qscale(&self) -> u8 {
        quality_to_qscale(self.quality)
    }
}

/// Convert a 1-100 quality to the MJPEG encoder's 2-31 qscale.
pub fn quality_to_qscale(quality: u8) -> u8 {
    let quality = f64::from(quality.clamp(1, 100));
    let qscale = (31.0 - (quality - 1.0) / 99.0 * 29.0).round();
    qscale.clamp(2.0, 31.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_examples() {
        assert_eq!(round_to_dimension_multiple(0), 28);
        assert_eq!(round_to_dimension_multiple(1), 28);
        assert_eq!(round_to_dimension_multiple(28), 28);
        assert_eq!(round_to_dimension_multiple(29), 56);
        assert_eq!(round_to_dimension_multiple(1120), 1120);
    }

    #[test]
    fn qscale_midpoint() {
        // 31 - 49/99*29 = 16.646...
        assert_eq!(quality_to_qscale(50), 17);
        assert_eq!(quality_to_qscale(90), 5);
    }

    #[test]
    fn decode_rejects_empty_payload() {
        let sets = ParameterSets::from_base64("", DEFAULT_PPS);
        assert!(matches!(
            sets.sps(),
            Err(FrameGrabError::InvalidParameterSet {
                kind: ParameterSetKind::Sps,
                ..
            })
        ));
        assert!(sets.pps().is_ok());
    }
}
