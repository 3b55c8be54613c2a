//! Parameter-set injection integration tests.

mod common;

use std::sync::{Arc, Mutex};

use common::FakeRunner;
use framegrab::{
    FrameGrabError, FrameProcessor, ParameterSetKind, ParameterSets, ProcessorConfig,
    inject_parameter_sets, nal::START_CODE,
};

#[test]
fn injected_layout_with_default_sets() {
    let sets = ParameterSets::default();
    let sps = sets.sps().unwrap();
    let pps = sets.pps().unwrap();
    let data = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84];

    let repaired = inject_parameter_sets(&data, &sets).unwrap();

    assert_eq!(repaired.len(), 8 + sps.len() + pps.len() + data.len());
    assert_eq!(&repaired[..4], &START_CODE);
    assert_eq!(&repaired[4..4 + sps.len()], sps.as_slice());
    let pps_start = 8 + sps.len();
    assert_eq!(&repaired[4 + sps.len()..pps_start], &START_CODE);
    assert_eq!(&repaired[pps_start..pps_start + pps.len()], pps.as_slice());
    assert_eq!(&repaired[pps_start + pps.len()..], &data);
}

#[test]
fn empty_input_yields_only_parameter_sets() {
    let sets = ParameterSets::from_raw(&[0x67], &[0x68]);
    let repaired = inject_parameter_sets(&[], &sets).unwrap();
    assert_eq!(repaired, vec![0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x68]);
}

#[test]
fn invalid_sps_is_reported() {
    let sets = ParameterSets::from_base64("not base64!", "aM48gA==");
    let result = inject_parameter_sets(&[0x65], &sets);
    assert!(matches!(
        result,
        Err(FrameGrabError::InvalidParameterSet {
            kind: ParameterSetKind::Sps,
            ..
        })
    ));
}

#[test]
fn invalid_pps_is_reported() {
    let sets = ParameterSets::from_base64("Z0LADJoFAAABMA==", "%%%");
    let error = inject_parameter_sets(&[0x65], &sets).unwrap_err();
    assert!(matches!(
        error,
        FrameGrabError::InvalidParameterSet {
            kind: ParameterSetKind::Pps,
            ..
        }
    ));
    assert!(error.to_string().contains("PPS"), "{error}");
}

#[test]
fn invalid_parameter_sets_stop_extraction_before_decoding() {
    let runner = Arc::new(FakeRunner::emitting(vec![common::jpeg_like(1)]));
    let config =
        ProcessorConfig::new().with_parameter_sets(ParameterSets::from_base64("???", "???"));
    let processor = FrameProcessor::with_runner(config, runner.clone());

    let result = processor.extract_from_h264(&[0x65, 0x88]);

    assert!(matches!(result, Err(FrameGrabError::InvalidParameterSet { .. })));
    assert!(runner.invocations().is_empty());
    processor.cleanup().unwrap();
}

#[test]
fn decoder_receives_repaired_stream() {
    // The temp file is removed once extraction returns, so capture what the
    // decoder read while it ran.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_decoder = Arc::clone(&seen);
    let runner = Arc::new(FakeRunner::new(move |_, input| {
        *seen_by_decoder.lock().unwrap() = input.to_vec();
        common::success(common::jpeg_like(1))
    }));
    let processor = FrameProcessor::with_runner(ProcessorConfig::new(), runner.clone());
    let data = [0x00, 0x00, 0x00, 0x01, 0x65, 0xAB];

    processor.extract_from_h264(&data).unwrap();

    let expected = inject_parameter_sets(&data, &ParameterSets::default()).unwrap();
    assert_eq!(*seen.lock().unwrap(), expected);
    let invocation = &runner.invocations()[0];
    assert_eq!(common::argument_after(invocation, "-f"), Some("h264"));

    processor.cleanup().unwrap();
}
