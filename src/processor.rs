//! The frame extraction entry point.
//!
//! [`FrameProcessor`] owns a [`ProcessorConfig`], a [`CommandRunner`], and a
//! lazily created temporary directory. It offers three kinds of extraction:
//!
//! - **Raw H.264** ([`extract_from_h264`](FrameProcessor::extract_from_h264)):
//!   inject parameter sets, write the repaired stream to a per-call temp
//!   file, decode with the input format forced to H.264, demux.
//! - **Container file** ([`extract_frames_from_file`](FrameProcessor::extract_frames_from_file)):
//!   probe duration, decode with format detection, demux on a worker pool.
//! - **Container bytes** ([`extract_frames_from_bytes`](FrameProcessor::extract_frames_from_bytes)):
//!   pipe the bytes to the decoder's standard input, demux.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{FrameProcessor, ProcessorConfig};
//!
//! let processor = FrameProcessor::new(ProcessorConfig::new().with_frame_rate(1));
//! let h264 = std::fs::read("capture.h264")?;
//! let frames = processor.extract_from_h264(&h264)?;
//! println!("{} frames", frames.len());
//! processor.cleanup()?;
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cancellation::CancellationToken;
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::configuration::ProcessorConfig;
use crate::decode::{DecodeRequest, decode_to_mjpeg};
use crate::demux::{split_frames, split_frames_concurrent};
use crate::error::FrameGrabError;
use crate::frames::encode_frames_base64;
use crate::nal::inject_parameter_sets;
use crate::probe::probe_duration;

const TEMPORARY_DIRECTORY_PREFIX: &str = "h264stream-";

struct SharedState {
    config: ProcessorConfig,
    temporary_directory: Option<PathBuf>,
}

/// Extracts JPEG frames from H.264 streams and video files.
///
/// A processor may be shared between threads (`Arc<FrameProcessor>`).
/// Configuration and temp-directory setup are serialized by an internal
/// mutex; decoding and demuxing run outside it, so concurrent extractions
/// on one processor proceed in parallel.
///
/// The temporary directory used by raw H.264 extraction is created on first
/// use and removed only by [`cleanup`](FrameProcessor::cleanup).
pub struct FrameProcessor {
    runner: Arc<dyn CommandRunner>,
    shared: Mutex<SharedState>,
}

impl Debug for FrameProcessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let shared = self.shared();
        f.debug_struct("FrameProcessor")
            .field("config", &shared.config)
            .field("temporary_directory", &shared.temporary_directory)
            .finish_non_exhaustive()
    }
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl FrameProcessor {
    /// Create a processor that runs real `ffmpeg`/`ffprobe` binaries.
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemCommandRunner::new()))
    }

    /// Create a processor that launches programs through `runner`.
    pub fn with_runner(config: ProcessorConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            shared: Mutex::new(SharedState {
                config,
                temporary_directory: None,
            }),
        }
    }

    fn shared(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A snapshot of the current configuration.
    pub fn config(&self) -> ProcessorConfig {
        self.shared().config.clone()
    }

    /// Replace the configuration.
    ///
    /// Extractions already in flight keep the snapshot they started with.
    pub fn set_config(&self, config: ProcessorConfig) {
        self.shared().config = config;
    }

    /// Derive a new configuration from the current one.
    ///
    /// ```
    /// use framegrab::FrameProcessor;
    ///
    /// let processor = FrameProcessor::default();
    /// processor.update_config(|config| config.with_quality(75));
    /// assert_eq!(processor.config().quality(), 75);
    /// ```
    pub fn update_config(&self, update: impl FnOnce(ProcessorConfig) -> ProcessorConfig) {
        let mut shared = self.shared();
        let current = shared.config.clone();
        shared.config = update(current);
    }

    /// The temporary directory, if one has been created.
    pub fn temporary_directory(&self) -> Option<PathBuf> {
        self.shared().temporary_directory.clone()
    }

    /// Snapshot the configuration and make sure the temporary directory
    /// exists, in one critical section.
    fn prepare_stream_call(&self) -> Result<(ProcessorConfig, PathBuf), FrameGrabError> {
        let mut shared = self.shared();

        let directory = match shared.temporary_directory.clone() {
            Some(directory) => directory,
            None => {
                let directory = tempfile::Builder::new()
                    .prefix(TEMPORARY_DIRECTORY_PREFIX)
                    .tempdir()?
                    .keep();
                log::debug!("Created temporary directory {}", directory.display());
                shared.temporary_directory = Some(directory.clone());
                directory
            }
        };

        Ok((shared.config.clone(), directory))
    }

    /// Extract frames from raw H.264 data.
    ///
    /// Equivalent to [`extract_from_h264_with_cancellation`](FrameProcessor::extract_from_h264_with_cancellation)
    /// with a token that never fires.
    pub fn extract_from_h264(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        self.extract_from_h264_with_cancellation(data, &CancellationToken::new())
    }

    /// Extract frames from raw H.264 data.
    ///
    /// The configured SPS/PPS are prepended to `data`, the result is written
    /// to a temp file that is removed when the call returns, and the decoder
    /// is run with its input format forced to raw H.264.
    ///
    /// # Errors
    ///
    /// - [`FrameGrabError::InvalidParameterSet`] if the configured SPS/PPS
    ///   cannot be decoded.
    /// - [`FrameGrabError::Io`] if the temp directory or file cannot be
    ///   written.
    /// - [`FrameGrabError::DecodeFailed`] if the decoder exits unsuccessfully.
    /// - [`FrameGrabError::Cancelled`] if `cancellation` fires mid-decode.
    /// - [`FrameGrabError::NoFramesFound`] if the decoder output holds no
    ///   complete JPEG.
    pub fn extract_from_h264_with_cancellation(
        &self,
        data: &[u8],
        cancellation: &CancellationToken,
    ) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        let (config, directory) = self.prepare_stream_call()?;

        let repaired = inject_parameter_sets(data, config.parameter_sets())?;

        let mut input_file = tempfile::Builder::new()
            .prefix("stream_")
            .suffix(".h264")
            .tempfile_in(&directory)?;
        input_file.write_all(&repaired)?;
        input_file.flush()?;

        let request = DecodeRequest::raw_h264_file(input_file.path());
        let output = decode_to_mjpeg(self.runner.as_ref(), request, &config, cancellation)?;

        split_frames(&output)
    }

    /// Extract frames from raw H.264 data and return them base64-encoded.
    pub fn extract_from_h264_base64(
        &self,
        data: &[u8],
        cancellation: &CancellationToken,
    ) -> Result<Vec<String>, FrameGrabError> {
        let frames = self.extract_from_h264_with_cancellation(data, cancellation)?;
        Ok(encode_frames_base64(&frames))
    }

    /// Read `reader` to its end, then extract frames from the raw H.264 it
    /// produced.
    pub fn extract_from_h264_reader<R: Read>(
        &self,
        mut reader: R,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.extract_from_h264_with_cancellation(&data, cancellation)
    }

    /// Extract frames from a container file (MP4, MKV, ...).
    pub fn extract_frames_from_file<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        self.extract_frames_from_file_with_cancellation(path, &CancellationToken::new())
    }

    /// Extract frames from a container file.
    ///
    /// The container duration is probed first; if it would yield zero
    /// frames at the configured rate the call fails with
    /// [`FrameGrabError::VideoTooShort`] without running the decoder.
    ///
    /// # Errors
    ///
    /// Additionally to the decoder errors listed on
    /// [`extract_from_h264_with_cancellation`](FrameProcessor::extract_from_h264_with_cancellation):
    /// [`FrameGrabError::ToolUnavailable`] if the decoder cannot be launched
    /// and [`FrameGrabError::ProbeFailed`] if the duration is unreadable.
    pub fn extract_frames_from_file_with_cancellation<P: AsRef<Path>>(
        &self,
        path: P,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        let path = path.as_ref();
        let config = self.config();

        self.runner.check_available(config.decoder_program())?;

        let duration = probe_duration(
            self.runner.as_ref(),
            config.probe_program(),
            path,
            cancellation,
        )?;

        let expected_frames = duration.as_secs().saturating_mul(u64::from(config.frame_rate()));
        if expected_frames == 0 {
            return Err(FrameGrabError::VideoTooShort { duration });
        }

        log::info!(
            "Extracting ~{} frames from {} ({:?} at {} fps)",
            expected_frames,
            path.display(),
            duration,
            config.frame_rate(),
        );

        let request = DecodeRequest::container_file(path, config.max_workers());
        let output = decode_to_mjpeg(self.runner.as_ref(), request, &config, cancellation)?;

        split_frames_concurrent(&output, config.max_workers(), config.buffer_capacity())
    }

    /// Extract frames from in-memory container bytes.
    pub fn extract_frames_from_bytes(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        self.extract_frames_from_bytes_with_cancellation(data, &CancellationToken::new())
    }

    /// Extract frames from in-memory container bytes, piped to the decoder's
    /// standard input.
    pub fn extract_frames_from_bytes_with_cancellation(
        &self,
        data: &[u8],
        cancellation: &CancellationToken,
    ) -> Result<Vec<Vec<u8>>, FrameGrabError> {
        let config = self.config();
        let request = DecodeRequest::container_bytes(data.to_vec());
        let output = decode_to_mjpeg(self.runner.as_ref(), request, &config, cancellation)?;
        split_frames(&output)
    }

    /// Remove the temporary directory, if one was created.
    ///
    /// Safe to call repeatedly; a later raw H.264 extraction creates a new
    /// directory.
    pub fn cleanup(&self) -> Result<(), FrameGrabError> {
        let Some(directory) = self.shared().temporary_directory.take() else {
            return Ok(());
        };

        log::debug!("Removing temporary directory {}", directory.display());
        match fs::remove_dir_all(&directory) {
            Err(error) if error.kind() != ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}
