//! # framegrab
//!
//! Extract JPEG frames from raw H.264 streams and video files.
//!
//! `framegrab` turns H.264 elementary streams (for example from an RTP or
//! camera feed that lost its parameter sets) and ordinary container files
//! into a sequence of JPEG images sampled at a fixed rate, scaled and padded
//! to a fixed resolution. Decoding is delegated to an external `ffmpeg`
//! process; the crate repairs the input, drives the decoder, and splits its
//! MJPEG output into frames.
//!
//! ## Quick Start
//!
//! ### Frames from raw H.264
//!
//! ```no_run
//! use framegrab::{FrameProcessor, ProcessorConfig};
//!
//! let processor = FrameProcessor::new(ProcessorConfig::new());
//! let data = std::fs::read("camera.h264")?;
//! let frames = processor.extract_from_h264(&data)?;
//! std::fs::write("first.jpg", &frames[0])?;
//! processor.cleanup()?;
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```
//!
//! ### Frames from a video file
//!
//! ```no_run
//! use framegrab::{FrameProcessor, ProcessorConfig, inspect_frames};
//!
//! let config = ProcessorConfig::new().with_frame_rate(1).with_resolution(560, 560);
//! let processor = FrameProcessor::new(config);
//! let frames = processor.extract_frames_from_file("input.mp4")?;
//! println!("{}", inspect_frames(&frames, 1)?.to_json());
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```
//!
//! ### Continuous extraction
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! use framegrab::{FrameProcessor, StreamExtractor};
//!
//! let processor = Arc::new(FrameProcessor::default());
//! let mut extractor = StreamExtractor::new(processor);
//! let source = std::fs::File::open("/dev/video-feed")?;
//! extractor.start_with_deadline(source, Instant::now() + Duration::from_secs(30))?;
//!
//! let mut frames = extractor.take_frames().expect("started");
//! while let Some(frame) = frames.blocking_recv() {
//!     println!("{} bytes", frame.data.len());
//! }
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```
//!
//! ## Features
//!
//! - **Parameter-set injection**: prepend configured SPS/PPS NAL units so
//!   headerless streams decode
//! - **Sampling, scaling, padding**: fixed frame rate and letterboxed output
//!   resolution rounded to a multiple of 28
//! - **JPEG demuxing**: sequential or on a bounded rayon pool, with identical
//!   results
//! - **Cancellation**: `CancellationToken` with optional deadline, honored
//!   while the decoder runs
//! - **Streaming**: chunked extraction from any `Read` source with bounded
//!   frame and error queues that implement `Stream`
//! - **Pluggable process runner**: `CommandRunner` lets tests and embedders
//!   replace the real decoder
//!
//! ## Requirements
//!
//! `ffmpeg` (and `ffprobe` for container files) must be on `PATH`, or their
//! locations set with [`ProcessorConfig::with_decoder_program`] and
//! [`ProcessorConfig::with_probe_program`].

pub mod analysis;
pub mod cancellation;
pub mod command;
pub mod configuration;
pub mod decode;
pub mod demux;
pub mod error;
pub mod frames;
pub mod nal;
pub mod probe;
pub mod processor;
pub mod stream;

pub use analysis::{AnalysisError, AnalysisOptions, AnalysisRequest, FrameAnalyzer};
pub use cancellation::CancellationToken;
pub use command::{CommandOutput, CommandRunner, Invocation, SystemCommandRunner};
pub use configuration::{ParameterSetKind, ParameterSets, ProcessorConfig};
pub use decode::{DecodeInput, DecodeRequest, InputFormat};
pub use demux::{split_frames, split_frames_concurrent};
pub use error::{ExitInfo, FrameGrabError};
pub use frames::{FrameMetadata, data_uri, inspect_frames};
pub use nal::inject_parameter_sets;
pub use processor::FrameProcessor;
pub use stream::{
    ChunkFailure, ErrorEvents, FrameEvents, SessionState, StreamExtractor, StreamFrame,
};
