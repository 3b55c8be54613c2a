//! Decoder invocation.
//!
//! Builds the external decoder's argument list from a [`DecodeRequest`] and
//! a [`ProcessorConfig`], runs it through a [`CommandRunner`], and returns
//! the decoder's standard output: a concatenated MJPEG byte stream ready for
//! [`demux`](crate::demux).
//!
//! The argument list is deterministic. For a raw H.264 file at the default
//! configuration it is:
//!
//! ```text
//! -f h264 -i <path>
//! -vf fps=2,scale=1120:1120:force_original_aspect_ratio=decrease,pad=1120:1120:(ow-iw)/2:(oh-ih)/2
//! -f image2pipe -vcodec mjpeg -q:v 5 -
//! ```

use std::path::PathBuf;

use crate::cancellation::CancellationToken;
use crate::command::{CommandRunner, Invocation};
use crate::configuration::ProcessorConfig;
use crate::error::FrameGrabError;

/// Where the decoder reads its input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeInput {
    /// A file on disk, passed with `-i <path>`.
    File(PathBuf),
    /// Bytes piped on standard input, passed with `-i pipe:0`.
    Pipe(Vec<u8>),
}

/// How the decoder should interpret its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Force raw Annex B H.264 (`-f h264`).
    RawH264,
    /// Let the decoder detect the container format.
    Auto,
}

/// One decode job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    pub input: DecodeInput,
    pub format: InputFormat,
    /// Decoder thread count (`-threads`), if it should be set explicitly.
    pub threads: Option<usize>,
}

impl DecodeRequest {
    /// Decode a raw H.264 file.
    pub fn raw_h264_file(path: impl Into<PathBuf>) -> Self {
        Self {
            input: DecodeInput::File(path.into()),
            format: InputFormat::RawH264,
            threads: None,
        }
    }

    /// Decode raw H.264 bytes piped on standard input.
    pub fn raw_h264_bytes(data: Vec<u8>) -> Self {
        Self {
            input: DecodeInput::Pipe(data),
            format: InputFormat::RawH264,
            threads: None,
        }
    }

    /// Decode a container file with an explicit decoder thread count.
    pub fn container_file(path: impl Into<PathBuf>, threads: usize) -> Self {
        Self {
            input: DecodeInput::File(path.into()),
            format: InputFormat::Auto,
            threads: Some(threads.max(1)),
        }
    }

    /// Decode container bytes piped on standard input.
    pub fn container_bytes(data: Vec<u8>) -> Self {
        Self {
            input: DecodeInput::Pipe(data),
            format: InputFormat::Auto,
            threads: None,
        }
    }
}

/// The `-vf` filter chain: sample at the frame rate, scale to fit the
/// target box preserving aspect ratio, then letterbox-pad to exactly the
/// target size.
pub fn filter_chain(config: &ProcessorConfig) -> String {
    let (width, height) = (config.target_width(), config.target_height());
    format!(
        "fps={},scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2",
        config.frame_rate(),
    )
}

/// Build the decoder argument list for `request` under `config`.
pub fn build_decode_arguments(
    request: &DecodeRequest,
    config: &ProcessorConfig,
) -> Vec<String> {
    let mut args: Vec<String> = Vec::with_capacity(20);

    if config.hardware_acceleration() {
        args.extend(["-hwaccel", "auto"].map(String::from));
    }

    if request.format == InputFormat::RawH264 {
        args.extend(["-f", "h264"].map(String::from));
    }

    args.push("-i".to_string());
    args.push(match &request.input {
        DecodeInput::File(path) => path.to_string_lossy().into_owned(),
        DecodeInput::Pipe(_) => "pipe:0".to_string(),
    });

    args.push("-vf".to_string());
    args.push(filter_chain(config));

    args.extend(["-f", "image2pipe", "-vcodec", "mjpeg", "-q:v"].map(String::from));
    args.push(config.qscale().to_string());

    if let Some(threads) = request.threads {
        args.push("-threads".to_string());
        args.push(threads.to_string());
    }

    args.push("-".to_string());
    args
}

/// Build the complete [`Invocation`] for `request`, moving piped input
/// bytes into it.
pub fn build_decode_invocation(
    request: DecodeRequest,
    config: &ProcessorConfig,
) -> Invocation {
    let args = build_decode_arguments(&request, config);
    let invocation = Invocation::new(config.decoder_program(), args);
    match request.input {
        DecodeInput::Pipe(data) => invocation.with_stdin(data),
        DecodeInput::File(_) => invocation,
    }
}

/// Run the decoder and return its concatenated MJPEG output.
///
/// # Errors
///
/// - [`FrameGrabError::Cancelled`] if `cancellation` fires while the decoder
///   runs (the process is terminated).
/// - [`FrameGrabError::DecodeFailed`] if the decoder exits unsuccessfully;
///   the error carries its captured standard error.
/// - [`FrameGrabError::ToolUnavailable`] if the decoder cannot be started.
pub fn decode_to_mjpeg(
    runner: &dyn CommandRunner,
    request: DecodeRequest,
    config: &ProcessorConfig,
    cancellation: &CancellationToken,
) -> Result<Vec<u8>, FrameGrabError> {
    let invocation = build_decode_invocation(request, config);
    let output = runner.run(&invocation, cancellation)?;

    if !output.status.success {
        let stderr = output.stderr_text();
        log::warn!("Decoder exited with {}: {}", output.status, stderr);
        return Err(FrameGrabError::DecodeFailed {
            status: output.status,
            stderr,
        });
    }

    log::debug!("Decoder produced {} bytes of MJPEG", output.stdout.len());
    Ok(output.stdout)
}
