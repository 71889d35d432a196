//! Receive DSP stage tests: decimation shape invariants, the
//! convolution band-pass response, and mask-rebuild determinism.

use core::f32::consts::PI;

use phoenix_sdr_core::config::{DF, READ_BUFFER_SIZE, SAMPLE_RATE_HZ};
use phoenix_sdr_core::dsp::block::SampleBlock;
use phoenix_sdr_core::dsp::filter_bank::FilterBank;
use phoenix_sdr_core::dsp::receive::ReceiveChain;

/// Complex tone generator with continuous phase across blocks
fn fill_iq_tone(block: &mut SampleBlock, tone_hz: f32, amplitude: f32, phase_index: &mut u32) {
    let fs = block.sample_rate_hz() as f32;
    for k in 0..block.len() {
        let theta = 2.0 * PI * tone_hz * (*phase_index + k as u32) as f32 / fs;
        block.i[k] = amplitude * theta.cos();
        block.q[k] = amplitude * theta.sin();
    }
    *phase_index += block.len() as u32;
}

#[test]
fn decimation_shape_invariants() {
    let mut bank = FilterBank::new(0, -3000.0, -200.0);
    let mut chain = ReceiveChain::new();
    let mut block = SampleBlock::new(READ_BUFFER_SIZE, SAMPLE_RATE_HZ);

    chain.decimate_by_4(&mut block, &mut bank).unwrap();
    assert_eq!(block.len(), READ_BUFFER_SIZE / 4);
    assert_eq!(block.sample_rate_hz(), SAMPLE_RATE_HZ / 4);

    chain.decimate_by_2(&mut block, &mut bank).unwrap();
    assert_eq!(block.len(), READ_BUFFER_SIZE / 8);
    assert_eq!(block.sample_rate_hz(), SAMPLE_RATE_HZ / 8);
}

#[test]
fn interpolation_shape_invariants() {
    let mut bank = FilterBank::new(0, -3000.0, -200.0);
    let mut chain = ReceiveChain::new();
    let mut block = SampleBlock::new(READ_BUFFER_SIZE / DF, SAMPLE_RATE_HZ / DF as u32);

    chain.interpolate(&mut block, &mut bank).unwrap();
    assert_eq!(block.len(), READ_BUFFER_SIZE);
    assert_eq!(block.sample_rate_hz(), SAMPLE_RATE_HZ);
}

#[test]
fn decimated_tone_survives_with_unit_gain() {
    let mut bank = FilterBank::new(0, -3000.0, -200.0);
    let mut chain = ReceiveChain::new();
    let mut phase = 0;

    let mut peak: f32 = 0.0;
    for rep in 0..4 {
        let mut block = SampleBlock::new(READ_BUFFER_SIZE, SAMPLE_RATE_HZ);
        fill_iq_tone(&mut block, -1000.0, 0.5, &mut phase);
        chain.decimate_by_4(&mut block, &mut bank).unwrap();
        chain.decimate_by_2(&mut block, &mut bank).unwrap();
        if rep == 3 {
            peak = block.i_samples().iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        }
    }
    assert!((peak - 0.5).abs() < 0.03, "post-decimation peak {peak}");
}

/// Feed a tone through the convolution filter with warm history and
/// return the final block's peak |I|
fn convolution_peak(tone_hz: f32) -> f32 {
    let bank = FilterBank::new(0, -3000.0, -200.0);
    let mut chain = ReceiveChain::new();
    let mut phase = 0;
    let mut peak = 0.0;
    for rep in 0..6 {
        let mut block = SampleBlock::new(256, 24_000);
        fill_iq_tone(&mut block, tone_hz, 1.0, &mut phase);
        chain.convolution_filter(&mut block, &bank).unwrap();
        if rep == 5 {
            peak = block.i_samples().iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        }
    }
    peak
}

#[test]
fn convolution_passband_near_unity() {
    // Unit tone inside the design pass-band
    for tone in [-2500.0, -1500.0, -600.0] {
        let peak = convolution_peak(tone);
        assert!(
            (0.94..=1.0).contains(&peak),
            "passband peak at {tone} Hz: {peak}"
        );
    }
}

#[test]
fn convolution_stopband_floor() {
    // Well outside the stop-band edge the leakage is below 1e-5
    for tone in [2000.0, 5000.0, -9000.0] {
        let peak = convolution_peak(tone);
        assert!(peak < 1e-5, "stopband peak at {tone} Hz: {peak}");
    }
}

#[test]
fn mask_rebuild_with_same_passband_is_bit_identical() {
    let bank_a = FilterBank::new(0, -3000.0, -200.0);
    let mut bank_b = FilterBank::new(0, -3000.0, -200.0);
    let mut chain_a = ReceiveChain::new();
    let mut chain_b = ReceiveChain::new();
    let mut phase_a = 0;
    let mut phase_b = 0;

    for rep in 0..6 {
        if rep == 3 {
            // Rebuild B's mask with the unchanged pass-band mid-run
            bank_b.refresh_mask(-3000.0, -200.0);
            bank_b.commit_mask();
        }
        let mut block_a = SampleBlock::new(256, 24_000);
        let mut block_b = SampleBlock::new(256, 24_000);
        fill_iq_tone(&mut block_a, -700.0, 0.8, &mut phase_a);
        fill_iq_tone(&mut block_b, -700.0, 0.8, &mut phase_b);
        chain_a.convolution_filter(&mut block_a, &bank_a).unwrap();
        chain_b.convolution_filter(&mut block_b, &bank_b).unwrap();
        assert_eq!(block_a.i_samples(), block_b.i_samples(), "rep {rep}");
        assert_eq!(block_a.q_samples(), block_b.q_samples(), "rep {rep}");
    }
}

#[test]
fn shape_mismatch_is_rejected_without_touching_block() {
    let bank = FilterBank::new(0, -3000.0, -200.0);
    let mut chain = ReceiveChain::new();
    let mut block = SampleBlock::new(128, 24_000);
    block.i[..128].fill(0.25);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        chain.convolution_filter(&mut block, &bank)
    }));
    // Debug builds assert on shape bugs; release builds return the error
    if let Ok(status) = result {
        assert!(status.is_err());
        assert_eq!(block.i[5], 0.25);
    }
}
