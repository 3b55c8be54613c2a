//! H.264 parameter-set injection.
//!
//! Live H.264 sources usually transmit SPS and PPS NAL units only once, at
//! the start of the stream. A decoder that joins later cannot establish the
//! picture geometry, so every stream-mode extraction prepends the configured
//! pair in Annex B form:
//!
//! ```text
//! 00 00 00 01 | SPS | 00 00 00 01 | PPS | original bytes
//! ```

use crate::configuration::ParameterSets;
use crate::error::FrameGrabError;

/// Annex B start code preceding every injected NAL unit.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Prepend the SPS and PPS from `parameter_sets` to `data`.
///
/// The result is always `START_CODE ++ SPS ++ START_CODE ++ PPS ++ data`,
/// `8 + sps.len() + pps.len() + data.len()` bytes long.
///
/// # Errors
///
/// Returns [`FrameGrabError::InvalidParameterSet`] if either stored
/// parameter set cannot be decoded.
///
/// # Example
///
/// ```
/// use framegrab::{ParameterSets, nal};
///
/// let sets = ParameterSets::from_raw(&[0x67, 0x42], &[0x68, 0xce]);
/// let repaired = nal::inject_parameter_sets(&[0x65, 0x88], &sets)?;
/// assert_eq!(
///     repaired,
///     [0, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x68, 0xce, 0x65, 0x88],
/// );
/// # Ok::<(), framegrab::FrameGrabError>(())
/// ```
pub fn inject_parameter_sets(
    data: &[u8],
    parameter_sets: &ParameterSets,
) -> Result<Vec<u8>, FrameGrabError> {
    let sps = parameter_sets.sps()?;
    let pps = parameter_sets.pps()?;

    let mut repaired =
        Vec::with_capacity(2 * START_CODE.len() + sps.len() + pps.len() + data.len());
    repaired.extend_from_slice(&START_CODE);
    repaired.extend_from_slice(&sps);
    repaired.extend_from_slice(&START_CODE);
    repaired.extend_from_slice(&pps);
    repaired.extend_from_slice(data);

    Ok(repaired)
}
