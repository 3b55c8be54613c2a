//! Configuration integration tests.
//!
//! These tests verify defaults, normalization of out-of-range settings, and
//! the quality-to-qscale mapping.

use framegrab::{
    FrameProcessor, ParameterSets, ProcessorConfig,
    configuration::{DEFAULT_PPS, DEFAULT_SPS, quality_to_qscale, round_to_dimension_multiple},
};

// ── Defaults ───────────────────────────────────────────────────────

#[test]
fn default_configuration() {
    let config = ProcessorConfig::new();

    assert_eq!(config.frame_rate(), 2);
    assert_eq!(config.target_width(), 1120);
    assert_eq!(config.target_height(), 1120);
    assert_eq!(config.quality(), 90);
    assert_eq!(config.qscale(), 5);
    assert_eq!(config.buffer_capacity(), 100);
    assert!(config.max_workers() >= 1);
    assert!(!config.hardware_acceleration());
    assert_eq!(config.decoder_program(), "ffmpeg");
    assert_eq!(config.probe_program(), "ffprobe");
    assert_eq!(config.parameter_sets().sps_base64(), DEFAULT_SPS);
    assert_eq!(config.parameter_sets().pps_base64(), DEFAULT_PPS);
    assert_eq!(config, ProcessorConfig::default());
}

#[test]
fn default_parameter_sets_decode() {
    let sets = ParameterSets::default();
    assert_eq!(
        sets.sps().unwrap(),
        vec![0x67, 0x42, 0xC0, 0x0C, 0x9A, 0x05, 0x00, 0x00, 0x01, 0x30],
    );
    assert_eq!(sets.pps().unwrap(), vec![0x68, 0xCE, 0x3C, 0x80]);
}

// ── Resolution rounding ────────────────────────────────────────────

#[test]
fn resolution_rounds_up_to_multiple_of_28() {
    let config = ProcessorConfig::new().with_resolution(100, 50);
    assert_eq!(config.target_width(), 112);
    assert_eq!(config.target_height(), 56);

    let config = ProcessorConfig::new().with_resolution(1120, 560);
    assert_eq!(config.target_width(), 1120);
    assert_eq!(config.target_height(), 560);
}

#[test]
fn zero_resolution_becomes_one_multiple() {
    let config = ProcessorConfig::new().with_resolution(0, 0);
    assert_eq!(config.target_width(), 28);
    assert_eq!(config.target_height(), 28);
}

#[test]
fn rounding_is_idempotent() {
    for value in [1, 27, 28, 29, 100, 1000, 1119, 1121] {
        let once = round_to_dimension_multiple(value);
        assert_eq!(once % 28, 0, "{value} rounded to {once}");
        assert!(once >= value);
        assert!(once - value < 28);
        assert_eq!(round_to_dimension_multiple(once), once);
    }
}

// ── Quality and qscale ─────────────────────────────────────────────

#[test]
fn quality_is_clamped() {
    assert_eq!(ProcessorConfig::new().with_quality(0).quality(), 1);
    assert_eq!(ProcessorConfig::new().with_quality(-20).quality(), 1);
    assert_eq!(ProcessorConfig::new().with_quality(150).quality(), 100);
    assert_eq!(ProcessorConfig::new().with_quality(90).quality(), 90);
}

#[test]
fn qscale_endpoints() {
    assert_eq!(quality_to_qscale(1), 31);
    assert_eq!(quality_to_qscale(100), 2);
    assert_eq!(quality_to_qscale(50), 17);
    assert_eq!(quality_to_qscale(90), 5);
}

#[test]
fn qscale_is_monotonic_and_bounded() {
    let mut previous = quality_to_qscale(1);
    for quality in 2..=100 {
        let qscale = quality_to_qscale(quality);
        assert!((2..=31).contains(&qscale));
        assert!(qscale <= previous, "qscale rose at quality {quality}");
        previous = qscale;
    }
}

// ── Counts ─────────────────────────────────────────────────────────

#[test]
fn counts_clamp_to_one() {
    let config = ProcessorConfig::new()
        .with_frame_rate(0)
        .with_max_workers(0)
        .with_buffer_capacity(0);
    assert_eq!(config.frame_rate(), 1);
    assert_eq!(config.max_workers(), 1);
    assert_eq!(config.buffer_capacity(), 1);
}

// ── Processor configuration updates ────────────────────────────────

#[test]
fn processor_config_can_be_replaced_and_updated() {
    let processor = FrameProcessor::new(ProcessorConfig::new());

    processor.set_config(ProcessorConfig::new().with_frame_rate(5));
    assert_eq!(processor.config().frame_rate(), 5);

    processor.update_config(|config| config.with_resolution(100, 100));
    let config = processor.config();
    assert_eq!(config.frame_rate(), 5);
    assert_eq!(config.target_width(), 112);
}
