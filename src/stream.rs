//! Continuous frame extraction from a live byte source.
//!
//! [`StreamExtractor`] reads an open source (a socket, a pipe, a growing
//! file) in 64 KiB chunks on a background thread. Each chunk is treated as
//! an independent raw H.264 segment: parameter sets are injected, the
//! decoder runs, and the resulting frames are published on a bounded frame
//! queue. A chunk that fails is reported on a separate bounded error queue
//! and extraction continues with the next chunk.
//!
//! Both queues are `tokio` bounded channels. [`FrameEvents`] and
//! [`ErrorEvents`] implement [`tokio_stream::Stream`] for async consumers and
//! offer `blocking_recv` for plain threads. A full frame queue blocks the
//! worker, which in turn stops reading the source.
//!
//! Chunks do not share decoder state. A picture split across a chunk
//! boundary is not recovered; such a chunk may report
//! [`FrameGrabError::NoFramesFound`].
//!
//! # Example
//!
//! ```no_run
//! use std::net::TcpStream;
//! use std::sync::Arc;
//!
//! use framegrab::{FrameProcessor, ProcessorConfig, StreamExtractor};
//!
//! let processor = Arc::new(FrameProcessor::new(ProcessorConfig::new()));
//! let camera = TcpStream::connect("192.168.1.20:5000")?;
//!
//! let mut extractor = StreamExtractor::new(Arc::clone(&processor));
//! extractor.start(camera)?;
//!
//! let mut frames = extractor.take_frames().expect("frames are available once started");
//! while let Some(frame) = frames.blocking_recv() {
//!     println!(
//!         "chunk {} frame {}: {} bytes",
//!         frame.chunk_index,
//!         frame.frame_index,
//!         frame.data.len(),
//!     );
//! }
//!
//! extractor.stop();
//! processor.cleanup()?;
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```

use std::io::{ErrorKind, Read};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_stream::Stream;

use crate::cancellation::CancellationToken;
use crate::error::FrameGrabError;
use crate::processor::FrameProcessor;

/// Bytes read from the source per chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;
/// Capacity of the frame queue.
pub const FRAME_QUEUE_CAPACITY: usize = 100;
/// Capacity of the error queue.
pub const ERROR_QUEUE_CAPACITY: usize = 10;

/// Lifecycle of a [`StreamExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// The background worker is reading the source.
    Running,
    /// [`stop`](StreamExtractor::stop) is waiting for the worker to exit.
    Stopping,
    /// The worker has exited and both queues are closed.
    Stopped,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Running,
            2 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }
}

/// One frame published by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Zero-based index of the source chunk the frame was decoded from.
    pub chunk_index: u64,
    /// Position of the frame within its chunk.
    pub frame_index: usize,
    /// The JPEG bytes.
    pub data: Vec<u8>,
}

/// A failure published by a running session.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Zero-based index of the chunk that failed.
    pub chunk_index: u64,
    /// What went wrong.
    pub error: FrameGrabError,
}

/// Receiving side of the frame queue.
#[derive(Debug)]
pub struct FrameEvents {
    receiver: Receiver<StreamFrame>,
}

impl FrameEvents {
    /// Wait for the next frame. Returns `None` once the session has ended
    /// and every queued frame was received.
    pub async fn recv(&mut self) -> Option<StreamFrame> {
        self.receiver.recv().await
    }

    /// Blocking variant of [`recv`](FrameEvents::recv) for use outside an
    /// async runtime.
    pub fn blocking_recv(&mut self) -> Option<StreamFrame> {
        self.receiver.blocking_recv()
    }
}

impl Stream for FrameEvents {
    type Item = StreamFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Receiving side of the error queue.
#[derive(Debug)]
pub struct ErrorEvents {
    receiver: Receiver<ChunkFailure>,
}

impl ErrorEvents {
    /// Wait for the next failure. Returns `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<ChunkFailure> {
        self.receiver.recv().await
    }

    /// Blocking variant of [`recv`](ErrorEvents::recv).
    pub fn blocking_recv(&mut self) -> Option<ChunkFailure> {
        self.receiver.blocking_recv()
    }
}

impl Stream for ErrorEvents {
    type Item = ChunkFailure;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Continuous, cancellable extraction session over a byte source.
///
/// Call [`start`](StreamExtractor::start) once, consume the queues obtained
/// from [`take_frames`](StreamExtractor::take_frames) and
/// [`take_errors`](StreamExtractor::take_errors), then call
/// [`stop`](StreamExtractor::stop). `stop` is also run on drop.
pub struct StreamExtractor {
    processor: Arc<FrameProcessor>,
    cancellation: CancellationToken,
    state: Arc<AtomicU8>,
    frames: Option<FrameEvents>,
    errors: Option<ErrorEvents>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StreamExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamExtractor")
            .field("state", &self.state())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StreamExtractor {
    /// Create an idle extractor that will decode with `processor`.
    pub fn new(processor: Arc<FrameProcessor>) -> Self {
        Self {
            processor,
            cancellation: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(SessionState::Idle as u8)),
            frames: None,
            errors: None,
            worker: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The session's cancellation token.
    ///
    /// Cancelling it has the same effect on the worker as
    /// [`stop`](StreamExtractor::stop), without waiting for it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Start reading `source` on a background thread.
    ///
    /// # Errors
    ///
    /// - [`FrameGrabError::SessionAlreadyStarted`] if the extractor is not
    ///   idle.
    /// - [`FrameGrabError::Io`] if the worker thread cannot be spawned.
    pub fn start<R: Read + Send + 'static>(&mut self, source: R) -> Result<(), FrameGrabError> {
        let token = self.cancellation.clone();
        self.spawn_worker(source, token)
    }

    /// Start reading `source`, ending the session automatically at
    /// `deadline`.
    pub fn start_with_deadline<R: Read + Send + 'static>(
        &mut self,
        source: R,
        deadline: Instant,
    ) -> Result<(), FrameGrabError> {
        let token = self.cancellation.with_deadline(deadline);
        self.spawn_worker(source, token)
    }

    fn spawn_worker<R: Read + Send + 'static>(
        &mut self,
        source: R,
        token: CancellationToken,
    ) -> Result<(), FrameGrabError> {
        self.state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| FrameGrabError::SessionAlreadyStarted)?;

        let (frame_sender, frame_receiver) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let (error_sender, error_receiver) = mpsc::channel(ERROR_QUEUE_CAPACITY);

        let processor = Arc::clone(&self.processor);
        let state = Arc::clone(&self.state);

        let spawned = thread::Builder::new()
            .name("framegrab-stream".to_string())
            .spawn(move || {
                run_session(&processor, source, &token, &frame_sender, &error_sender);
                state.store(SessionState::Stopped as u8, Ordering::Release);
                log::info!("Stream extraction session ended");
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(error) => {
                self.state.store(SessionState::Stopped as u8, Ordering::Release);
                return Err(error.into());
            }
        };

        log::info!("Stream extraction session started");
        self.frames = Some(FrameEvents {
            receiver: frame_receiver,
        });
        self.errors = Some(ErrorEvents {
            receiver: error_receiver,
        });
        self.worker = Some(worker);
        Ok(())
    }

    /// Take the frame queue. Returns `None` before `start` or if already
    /// taken.
    pub fn take_frames(&mut self) -> Option<FrameEvents> {
        self.frames.take()
    }

    /// Take the error queue. Returns `None` before `start` or if already
    /// taken.
    pub fn take_errors(&mut self) -> Option<ErrorEvents> {
        self.errors.take()
    }

    /// Cancel the session and wait for the background worker to exit.
    ///
    /// After `stop` returns no further items are written to either queue;
    /// items already queued can still be received. Calling `stop` on an idle
    /// or stopped extractor only marks it stopped.
    pub fn stop(&mut self) {
        let _ = self.state.compare_exchange(
            SessionState::Running as u8,
            SessionState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.cancellation.cancel();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Stream extraction worker panicked");
            }
        }

        self.state.store(SessionState::Stopped as u8, Ordering::Release);
    }
}

impl Drop for StreamExtractor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Worker loop. Returns when the source ends, fails, the frame receiver is
/// dropped, or `token` fires. Dropping the senders on return closes both
/// queues.
fn run_session<R: Read>(
    processor: &FrameProcessor,
    mut source: R,
    token: &CancellationToken,
    frames: &Sender<StreamFrame>,
    errors: &Sender<ChunkFailure>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            let _ = errors.try_send(ChunkFailure {
                chunk_index: 0,
                error: error.into(),
            });
            return;
        }
    };

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut chunk_index: u64 = 0;

    loop {
        if token.is_cancelled() {
            return;
        }

        let read = match source.read(&mut buffer) {
            Ok(0) => return,
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => {
                log::warn!("Stream source read failed: {error}");
                let failure = ChunkFailure {
                    chunk_index,
                    error: error.into(),
                };
                runtime.block_on(publish(errors, failure, token));
                return;
            }
        };

        match processor.extract_from_h264_with_cancellation(&buffer[..read], token) {
            Ok(decoded) => {
                for (frame_index, data) in decoded.into_iter().enumerate() {
                    let frame = StreamFrame {
                        chunk_index,
                        frame_index,
                        data,
                    };
                    if !runtime.block_on(publish(frames, frame, token)) {
                        return;
                    }
                }
            }
            Err(FrameGrabError::Cancelled) => return,
            Err(error) => {
                log::warn!("Chunk {chunk_index} failed: {error}");
                let failure = ChunkFailure { chunk_index, error };
                // A dropped error receiver only loses diagnostics.
                runtime.block_on(publish(errors, failure, token));
            }
        }

        chunk_index += 1;
    }
}

/// Send `item`, waiting for queue capacity unless `token` fires first.
///
/// Returns `false` if the item was not delivered.
async fn publish<T>(sender: &Sender<T>, item: T, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = sender.send(item) => sent.is_ok(),
    }
}
