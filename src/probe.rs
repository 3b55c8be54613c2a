//! Container duration probing.
//!
//! Container-file extraction asks an external probe (`ffprobe` by default)
//! for the container duration before decoding, so obviously empty or
//! truncated inputs are rejected without running the decoder. The probe
//! prints the duration in seconds as a plain decimal string.

use std::path::Path;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::command::{CommandRunner, Invocation};
use crate::error::FrameGrabError;

/// Build the probe argument list for `path`.
///
/// ```text
/// -v error -show_entries format=duration -of default=noprint_wrappers=1:nokey=1 <path>
/// ```
pub fn build_probe_arguments(path: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .map(String::from)
    .to_vec();
    args.push(path.to_string_lossy().into_owned());
    args
}

/// Parse the probe's standard output into a [`Duration`].
///
/// # Errors
///
/// Returns [`FrameGrabError::ProbeFailed`] if the text is not a finite,
/// non-negative number of seconds that fits in a [`Duration`].
pub fn parse_duration(output: &str) -> Result<Duration, FrameGrabError> {
    let text = output.trim();
    let seconds: f64 = text
        .parse()
        .map_err(|_| FrameGrabError::ProbeFailed(format!("not a number: {text:?}")))?;

    Duration::try_from_secs_f64(seconds).map_err(|error| {
        FrameGrabError::ProbeFailed(format!("not a valid duration: {text:?} ({error})"))
    })
}

/// Probe the duration of the container at `path`.
///
/// # Errors
///
/// - [`FrameGrabError::ProbeFailed`] if the probe exits unsuccessfully or
///   prints something other than a number.
/// - [`FrameGrabError::Cancelled`] if `cancellation` fires first.
/// - [`FrameGrabError::ToolUnavailable`] if the probe cannot be started.
pub fn probe_duration(
    runner: &dyn CommandRunner,
    program: &str,
    path: &Path,
    cancellation: &CancellationToken,
) -> Result<Duration, FrameGrabError> {
    let invocation = Invocation::new(program, build_probe_arguments(path));
    let output = runner.run(&invocation, cancellation)?;

    if !output.status.success {
        return Err(FrameGrabError::ProbeFailed(format!(
            "{} ({}): {}",
            program,
            output.status,
            output.stderr_text()
        )));
    }

    let duration = parse_duration(&String::from_utf8_lossy(&output.stdout))?;
    log::debug!("Probed {}: {:?}", path.display(), duration);
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_seconds() {
        assert_eq!(parse_duration("12.500000\n").unwrap(), Duration::from_millis(12_500));
    }

    #[test]
    fn rejects_non_numeric_output() {
        assert!(matches!(parse_duration("N/A"), Err(FrameGrabError::ProbeFailed(_))));
        assert!(matches!(parse_duration(""), Err(FrameGrabError::ProbeFailed(_))));
        assert!(matches!(parse_duration("-1"), Err(FrameGrabError::ProbeFailed(_))));
        assert!(matches!(parse_duration("inf"), Err(FrameGrabError::ProbeFailed(_))));
        assert!(matches!(parse_duration("NaN"), Err(FrameGrabError::ProbeFailed(_))));
    }

    #[test]
    fn rejects_durations_out_of_range() {
        assert!(matches!(parse_duration("1e20"), Err(FrameGrabError::ProbeFailed(_))));
        assert!(matches!(parse_duration("1e300"), Err(FrameGrabError::ProbeFailed(_))));
    }
}
