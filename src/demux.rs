//! Splitting concatenated JPEG output into frames.
//!
//! The decoder writes every sampled frame as a complete JPEG image, one after
//! another, to a single pipe. Each image starts with a Start-Of-Image marker
//! (`FF D8`) and ends with an End-Of-Image marker (`FF D9`). This module
//! finds those boundaries and slices the buffer into one owned `Vec<u8>` per
//! frame, in the order the frames appear.
//!
//! Scanning always happens on the calling thread because frame order depends
//! on it. [`split_frames_concurrent`] then copies the located ranges on a
//! bounded rayon pool in batches, writing each copy into a slot reserved for
//! its index, so both variants return byte-identical results.
//!
//! # Example
//!
//! ```
//! use framegrab::demux;
//!
//! let stream = [0xFF, 0xD8, 0x01, 0xFF, 0xD9, 0x00, 0xFF, 0xD8, 0xFF, 0xD9];
//! let frames = demux::split_frames(&stream)?;
//! assert_eq!(frames, vec![vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9], vec![0xFF, 0xD8, 0xFF, 0xD9]]);
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```

use std::ops::Range;

use rayon::ThreadPoolBuilder;
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};

use crate::error::FrameGrabError;

/// JPEG Start-Of-Image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG End-Of-Image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Location of one complete JPEG inside a larger buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FramePosition {
    /// Offset of the SOI marker.
    pub(crate) start: usize,
    /// Offset one past the EOI marker.
    pub(crate) end: usize,
    /// Appearance order, starting at 0.
    pub(crate) index: usize,
}

impl FramePosition {
    fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

fn find_marker(data: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|window| window == marker)
        .map(|offset| from + offset)
}

/// Locate every complete SOI..EOI range in `data`, in order.
///
/// Each range starts at the next SOI at or after the cursor and ends at the
/// first EOI after that SOI, inclusive. Scanning stops at the first missing
/// marker; trailing incomplete data is ignored.
pub(crate) fn scan_frame_positions(data: &[u8]) -> Vec<FramePosition> {
    let mut positions = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_marker(data, cursor, SOI) {
        let Some(eoi) = find_marker(data, start + SOI.len(), EOI) else {
            break;
        };
        let end = eoi + EOI.len();

        positions.push(FramePosition {
            start,
            end,
            index: positions.len(),
        });
        cursor = end;
    }

    positions
}

/// Split `data` into JPEG frames on the calling thread.
///
/// # Errors
///
/// Returns [`FrameGrabError::NoFramesFound`] if `data` contains no complete
/// SOI..EOI pair.
pub fn split_frames(data: &[u8]) -> Result<Vec<Vec<u8>>, FrameGrabError> {
    let positions = scan_frame_positions(data);
    if positions.is_empty() {
        return Err(FrameGrabError::NoFramesFound);
    }

    let frames: Vec<Vec<u8>> = positions
        .iter()
        .map(|position| data[position.range()].to_vec())
        .collect();

    log::debug!("Split {} bytes into {} frames", data.len(), frames.len());
    Ok(frames)
}

/// Split `data` into JPEG frames, copying frame bytes on up to
/// `max_workers` threads.
///
/// Located frames are handed to the workers in batches of `batch_size`, so
/// the pool never runs more threads than there are batches. The pool lives
/// only for the duration of the call. The result is identical to
/// [`split_frames`] for every `max_workers` and `batch_size`.
///
/// # Errors
///
/// - [`FrameGrabError::NoFramesFound`] if `data` contains no complete frame.
/// - [`FrameGrabError::WorkerPool`] if the worker threads cannot be created.
pub fn split_frames_concurrent(
    data: &[u8],
    max_workers: usize,
    batch_size: usize,
) -> Result<Vec<Vec<u8>>, FrameGrabError> {
    let positions = scan_frame_positions(data);
    if positions.is_empty() {
        return Err(FrameGrabError::NoFramesFound);
    }

    let batch_size = batch_size.clamp(1, positions.len());
    let workers = pool_size(positions.len(), max_workers, batch_size);
    if workers == 1 {
        return Ok(positions
            .iter()
            .map(|position| data[position.range()].to_vec())
            .collect());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("framegrab-demux-{index}"))
        .build()
        .map_err(|error| FrameGrabError::WorkerPool(error.to_string()))?;

    let mut frames: Vec<Vec<u8>> = vec![Vec::new(); positions.len()];
    pool.install(|| {
        frames
            .par_chunks_mut(batch_size)
            .zip(positions.par_chunks(batch_size))
            .for_each(|(slots, batch)| {
                for (slot, position) in slots.iter_mut().zip(batch) {
                    *slot = data[position.range()].to_vec();
                }
            });
    });

    log::debug!(
        "Split {} bytes into {} frames on {} workers (batches of {})",
        data.len(),
        frames.len(),
        workers,
        batch_size,
    );
    Ok(frames)
}

/// Threads worth starting for `frame_count` frames copied in batches of
/// `batch_size`, capped at `max_workers`.
fn pool_size(frame_count: usize, max_workers: usize, batch_size: usize) -> usize {
    let batches = frame_count.div_ceil(batch_size.max(1));
    max_workers.max(1).min(batches).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_ordered_and_cover_markers() {
        let data = [0x00, 0xFF, 0xD8, 0xAA, 0xFF, 0xD9, 0xFF, 0xD8, 0xFF, 0xD9];
        let positions = scan_frame_positions(&data);
        assert_eq!(
            positions,
            vec![
                FramePosition { start: 1, end: 6, index: 0 },
                FramePosition { start: 6, end: 10, index: 1 },
            ]
        );
        for position in &positions {
            assert!(position.end > position.start);
        }
    }

    #[test]
    fn repeated_soi_belongs_to_open_frame() {
        let data = [0xFF, 0xD8, 0xFF, 0xD8, 0x01, 0xFF, 0xD9, 0x00];
        let positions = scan_frame_positions(&data);
        assert_eq!(positions, vec![FramePosition { start: 0, end: 7, index: 0 }]);
    }

    #[test]
    fn incomplete_trailing_frame_is_dropped() {
        let data = [0xFF, 0xD8, 0xFF, 0xD9, 0xFF, 0xD8, 0x01, 0x02];
        assert_eq!(scan_frame_positions(&data).len(), 1);
    }

    #[test]
    fn pool_never_exceeds_batches() {
        assert_eq!(pool_size(10, 8, 1), 8);
        assert_eq!(pool_size(10, 8, 4), 3);
        assert_eq!(pool_size(10, 8, 10), 1);
        assert_eq!(pool_size(10, 0, 1), 1);
        assert_eq!(pool_size(1, 8, 100), 1);
    }

    #[test]
    fn batch_size_does_not_change_result() {
        let data: Vec<u8> = (0..9u8)
            .flat_map(|tag| [0xFF, 0xD8, tag, 0xFF, 0xD9, 0x00])
            .collect();
        let sequential = split_frames(&data).unwrap();
        for batch_size in [0, 1, 2, 4, 9, 100] {
            assert_eq!(split_frames_concurrent(&data, 3, batch_size).unwrap(), sequential);
        }
    }

    #[test]
    fn empty_and_tiny_inputs() {
        assert!(scan_frame_positions(&[]).is_empty());
        assert!(scan_frame_positions(&[0xFF]).is_empty());
    }
}
