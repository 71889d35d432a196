//! 14-band graphic equalizer
//!
//! Fourteen parallel band-pass biquad cascades per path. Each band filters
//! the mono audio into a scratch buffer, scales it by the user gain
//! (percent, -100..=100), and adds it into an accumulator which replaces
//! the input after the last band. Adjacent bands were designed with
//! alternating polarity, so even-indexed bands are summed with flipped
//! sign. Receive and transmit use separate instances with separate state.

use crate::config::{DECIMATED_BLOCK, EQ_BANDS, EQ_STAGES};
use crate::dsp::filter::{BiquadCascade, BiquadCoeffs};

/// Band center frequencies (Hz)
pub const EQ_CENTERS_HZ: [f32; EQ_BANDS] = [
    100.0, 200.0, 300.0, 400.0, 600.0, 800.0, 1000.0, 1300.0, 1600.0, 2000.0, 2500.0, 3000.0,
    3500.0, 4000.0,
];

/// One equalizer path: 14 band filters plus the working buffers
pub struct EqBank {
    bands: [BiquadCascade<EQ_STAGES>; EQ_BANDS],
    /// Per-band filter output
    filt: [f32; DECIMATED_BLOCK],
    /// Accumulator across bands
    sum: [f32; DECIMATED_BLOCK],
}

impl EqBank {
    /// Build a bank for the given audio sample rate
    #[must_use]
    pub fn new(fs_hz: f32) -> Self {
        let mut bands = [BiquadCascade::identity(); EQ_BANDS];
        for (b, cascade) in bands.iter_mut().enumerate() {
            let fc = EQ_CENTERS_HZ[b];
            // Constant-Q bands, roughly a third of an octave wide
            let q = 2.86;
            let coeffs = [BiquadCoeffs::bandpass(fc / fs_hz, q); EQ_STAGES];
            cascade.set_coeffs(coeffs);
        }
        Self {
            bands,
            filt: [0.0; DECIMATED_BLOCK],
            sum: [0.0; DECIMATED_BLOCK],
        }
    }

    /// Apply the equalizer to `audio[..n]` with the given percent gains
    pub fn process(&mut self, audio: &mut [f32], n: usize, gains_percent: &[i32; EQ_BANDS]) {
        debug_assert!(n <= DECIMATED_BLOCK);
        self.sum[..n].fill(0.0);
        for b in 0..EQ_BANDS {
            let sign = if b % 2 == 0 { -1.0 } else { 1.0 };
            let scale = sign * gains_percent[b] as f32 / 100.0;
            self.bands[b].process_block(&audio[..n], &mut self.filt[..n]);
            for k in 0..n {
                self.sum[k] += scale * self.filt[k];
            }
        }
        audio[..n].copy_from_slice(&self.sum[..n]);
    }

    /// Zero all band filter state
    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn run_tone(bank: &mut EqBank, gains: &[i32; EQ_BANDS], tone_hz: f32, fs: f32) -> f32 {
        let mut peak: f32 = 0.0;
        let mut audio = [0.0f32; DECIMATED_BLOCK];
        for rep in 0..12 {
            for (k, v) in audio.iter_mut().enumerate() {
                let n = (rep * DECIMATED_BLOCK + k) as f32;
                *v = (2.0 * PI * tone_hz * n / fs).sin();
            }
            bank.process(&mut audio, DECIMATED_BLOCK, gains);
            if rep > 8 {
                peak = peak.max(audio.iter().fold(0.0f32, |m, &v| m.max(v.abs())));
            }
        }
        peak
    }

    #[test]
    fn single_band_selects_its_center() {
        let mut bank = EqBank::new(24_000.0);
        let mut gains = [0i32; EQ_BANDS];
        gains[6] = -100; // 1000 Hz band (even gains flip sign; index 6 flips)
        let in_band = run_tone(&mut bank, &gains, 1000.0, 24_000.0);
        let mut bank = EqBank::new(24_000.0);
        let out_of_band = run_tone(&mut bank, &gains, 4000.0, 24_000.0);
        assert!(in_band > 0.5, "in-band peak {in_band}");
        assert!(out_of_band < 0.2, "out-of-band peak {out_of_band}");
    }

    #[test]
    fn zero_gains_silence_output() {
        let mut bank = EqBank::new(24_000.0);
        let gains = [0i32; EQ_BANDS];
        let peak = run_tone(&mut bank, &gains, 1000.0, 24_000.0);
        assert!(peak < 1e-6);
    }

    #[test]
    fn flat_gains_pass_midband() {
        // All bands at full gain (with the alternating-sign convention the
        // stored gains alternate too) approximates a flat response.
        let mut bank = EqBank::new(24_000.0);
        let mut gains = [0i32; EQ_BANDS];
        for (b, g) in gains.iter_mut().enumerate() {
            *g = if b % 2 == 0 { -100 } else { 100 };
        }
        let peak = run_tone(&mut bank, &gains, 1000.0, 24_000.0);
        assert!(peak > 0.4 && peak < 2.0, "midband peak {peak}");
    }
}
