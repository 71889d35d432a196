//! Demodulators and SSB generation kernels
//!
//! Receive side: per-mode demodulation of the band-passed I/Q block into
//! mono audio. Transmit side: the Hilbert phase-split pair that turns mono
//! microphone audio into an analytic signal, and the sideband selector.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::HILBERT_TAPS;
use crate::dsp::block::SampleBlock;
use crate::dsp::filter::{design_hilbert, design_hilbert_delay, BiquadCascade, FirFilter};
use crate::dsp::filter_bank::FilterBank;
use crate::types::Mode;

/// SSB demodulation.
///
/// The convolution band-pass has already selected the sideband, so the
/// audio is simply the in-phase channel; Q becomes the scratch copy.
pub fn demodulate_ssb(block: &mut SampleBlock) {
    block.copy_i_to_q();
}

/// AM envelope demodulation: magnitude, audio low-pass, copy to both
/// channels.
pub fn demodulate_am(block: &mut SampleBlock, lowpass: &mut BiquadCascade<1>) {
    let n = block.len();
    for k in 0..n {
        let mag = (block.i[k] * block.i[k] + block.q[k] * block.q[k]).sqrt();
        block.i[k] = lowpass.process(mag);
    }
    block.copy_i_to_q();
}

/// Synchronous AM demodulator.
///
/// A second-order PLL locks to the carrier; the block is derotated by the
/// recovered phase and the in-phase channel, low-passed, becomes the
/// audio. Survives moderate carrier offsets where the envelope detector
/// distorts.
#[derive(Clone, Copy, Debug, Default)]
pub struct SamDemod {
    phase: f32,
    freq: f32,
}

impl SamDemod {
    /// Loop damping and bandwidth (per-sample radian units at 24 ksps)
    const ALPHA: f32 = 0.04;
    const BETA: f32 = 0.000_4;
    /// Pull-in limit, about +-1 kHz at 24 ksps
    const FREQ_LIMIT: f32 = 0.26;

    /// Create an unlocked demodulator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: 0.0,
            freq: 0.0,
        }
    }

    /// Demodulate one block in place
    pub fn process(&mut self, block: &mut SampleBlock, lowpass: &mut BiquadCascade<1>) {
        let n = block.len();
        for k in 0..n {
            let (sin_p, cos_p) = (self.phase.sin(), self.phase.cos());
            // Derotate by the recovered carrier phase
            let ai = block.i[k] * cos_p + block.q[k] * sin_p;
            let aq = block.q[k] * cos_p - block.i[k] * sin_p;

            let err = aq.atan2(ai.abs().max(1e-9));
            self.freq = (self.freq + Self::BETA * err).clamp(-Self::FREQ_LIMIT, Self::FREQ_LIMIT);
            self.phase += self.freq + Self::ALPHA * err;
            // Keep the phase accumulator bounded
            if self.phase > core::f32::consts::PI {
                self.phase -= 2.0 * core::f32::consts::PI;
            } else if self.phase < -core::f32::consts::PI {
                self.phase += 2.0 * core::f32::consts::PI;
            }

            block.i[k] = lowpass.process(ai);
        }
        block.copy_i_to_q();
    }

    /// Drop lock and recenter
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.freq = 0.0;
    }
}

/// CW receive audio filter: run the selected band filter, Q carrying the
/// filtered audio, then copy back to I. Index past the table bypasses.
pub fn cw_audio_filter(block: &mut SampleBlock, bank: &mut FilterBank, filter_index: usize) {
    let n = block.len();
    if filter_index >= bank.cw_audio.len() {
        return;
    }
    let cascade = &mut bank.cw_audio[filter_index];
    for k in 0..n {
        block.q[k] = cascade.process(block.i[k]);
    }
    let (i, q) = (&mut block.i[..n], &block.q[..n]);
    i.copy_from_slice(q);
}

/// Hilbert phase-split pair for SSB generation.
///
/// The I branch is the matched-delay filter and the Q branch the 90
/// degree shifter; after `process` the two channels form an analytic
/// signal (Q lags I by 90 degrees across the audio band).
pub struct HilbertPair {
    fir_i: FirFilter<HILBERT_TAPS>,
    fir_q: FirFilter<HILBERT_TAPS>,
}

impl HilbertPair {
    /// Design both branches
    #[must_use]
    pub fn new() -> Self {
        let mut delay_taps = [0.0f32; HILBERT_TAPS];
        let mut hilbert_taps = [0.0f32; HILBERT_TAPS];
        design_hilbert_delay(&mut delay_taps);
        design_hilbert(&mut hilbert_taps);
        Self {
            fir_i: FirFilter::new(delay_taps),
            fir_q: FirFilter::new(hilbert_taps),
        }
    }

    /// Split mono audio (in I) into the analytic pair, in place
    pub fn process(&mut self, block: &mut SampleBlock) {
        let n = block.len();
        block.copy_i_to_q();
        self.fir_i.process_in_place(&mut block.i[..n]);
        self.fir_q.process_in_place(&mut block.q[..n]);
    }

    /// Zero both delay lines
    pub fn reset(&mut self) {
        self.fir_i.reset();
        self.fir_q.reset();
    }
}

impl Default for HilbertPair {
    fn default() -> Self {
        Self::new()
    }
}

/// Sideband selection after the Hilbert pair.
///
/// The phase arithmetic produces LSB by default; USB negates I.
pub fn sideband_select(block: &mut SampleBlock, mode: Mode) {
    if mode == Mode::Usb {
        let n = block.len();
        for v in &mut block.i[..n] {
            *v = -*v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f32::consts::PI;

    #[test]
    fn ssb_demod_copies_i_to_q() {
        let mut block = SampleBlock::new(256, 24_000);
        for k in 0..256 {
            block.i[k] = (k as f32).sin();
            block.q[k] = 7.0;
        }
        demodulate_ssb(&mut block);
        assert_eq!(block.i[..256], block.q[..256]);
    }

    #[test]
    fn am_demod_recovers_envelope() {
        use crate::dsp::filter::BiquadCoeffs;
        let mut lowpass =
            BiquadCascade::new([BiquadCoeffs::lowpass(3000.0 / 24_000.0, 1.3)]);
        let mut block = SampleBlock::new(256, 24_000);
        // Carrier at 5 kHz, 60% modulated by 500 Hz
        let mut peak: f32 = 0.0;
        let mut trough: f32 = 10.0;
        for rep in 0..8 {
            for k in 0..256 {
                let t = (rep * 256 + k) as f32;
                let env = 1.0 + 0.6 * (2.0 * PI * 500.0 * t / 24_000.0).sin();
                let theta = 2.0 * PI * 5000.0 * t / 24_000.0;
                block.i[k] = env * theta.cos();
                block.q[k] = env * theta.sin();
            }
            demodulate_am(&mut block, &mut lowpass);
            if rep > 4 {
                for &v in block.i_samples() {
                    peak = peak.max(v);
                    trough = trough.min(v);
                }
            }
        }
        assert_relative_eq!(peak, 1.6, epsilon = 0.1);
        assert_relative_eq!(trough, 0.4, epsilon = 0.1);
    }

    #[test]
    fn sam_locks_to_offset_carrier() {
        use crate::dsp::filter::BiquadCoeffs;
        let mut lowpass =
            BiquadCascade::new([BiquadCoeffs::lowpass(3000.0 / 24_000.0, 1.3)]);
        let mut sam = SamDemod::new();
        let mut block = SampleBlock::new(256, 24_000);
        // Carrier 80 Hz off nominal
        let mut peak: f32 = 0.0;
        for rep in 0..40 {
            for k in 0..256 {
                let t = (rep * 256 + k) as f32;
                let env = 1.0 + 0.5 * (2.0 * PI * 400.0 * t / 24_000.0).sin();
                let theta = 2.0 * PI * 80.0 * t / 24_000.0;
                block.i[k] = env * theta.cos();
                block.q[k] = env * theta.sin();
            }
            sam.process(&mut block, &mut lowpass);
            if rep > 35 {
                for &v in block.i_samples() {
                    peak = peak.max(v);
                }
            }
        }
        // Locked SAM recovers the full envelope, not a beat product
        assert_relative_eq!(peak, 1.5, epsilon = 0.15);
    }

    #[test]
    fn hilbert_pair_quadrature() {
        let mut pair = HilbertPair::new();
        let mut block = SampleBlock::new(128, 12_000);
        // 1 kHz tone through several blocks, then correlate I and Q
        let mut dot = 0.0f32;
        let mut pi = 0.0f32;
        let mut pq = 0.0f32;
        for rep in 0..12 {
            for k in 0..128 {
                let t = (rep * 128 + k) as f32;
                block.i[k] = (2.0 * PI * 1000.0 * t / 12_000.0).sin();
            }
            pair.process(&mut block);
            if rep > 8 {
                for k in 0..128 {
                    dot += block.i[k] * block.q[k];
                    pi += block.i[k] * block.i[k];
                    pq += block.q[k] * block.q[k];
                }
            }
        }
        // Orthogonal and equal-power: the definition of a 90 degree pair
        let corr = dot / (pi.sqrt() * pq.sqrt());
        assert!(corr.abs() < 0.05, "I/Q correlation {corr}");
        let power_ratio = pq / pi;
        assert!((0.8..1.2).contains(&power_ratio), "power ratio {power_ratio}");
    }

    #[test]
    fn usb_negates_i_lsb_is_default() {
        let mut block = SampleBlock::new(8, 12_000);
        for k in 0..8 {
            block.i[k] = k as f32;
        }
        sideband_select(&mut block, Mode::Lsb);
        assert_eq!(block.i[3], 3.0);
        sideband_select(&mut block, Mode::Usb);
        assert_eq!(block.i[3], -3.0);
    }
}
