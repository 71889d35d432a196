//! Spectrum engine
//!
//! Computes the 512-point power spectral density for the display, with a
//! zoom-FFT front end (IIR low-pass, integer-stride decimation, ring
//! buffer) for magnified views, plus the two frequency-translation
//! kernels used by the receive pipeline: the multiplier-free Fs/4
//! rotation and the NCO fine-tune shift.
//!
//! PSD units are log10(I² + Q²) after a Hann window and a first-order
//! smoother across successive spectra.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::{
    READ_BUFFER_SIZE, SPECTRUM_LPF_COEFF, SPECTRUM_RES, ZOOM_MULTIPLIER_COEFF,
};
use crate::dsp::block::SampleBlock;
use crate::dsp::fft::{log10_fast, Cfft};
use crate::dsp::filter_bank::FilterBank;

/// Spectrum computation state
pub struct SpectrumState {
    /// Latest PSD (log10 power per bin, positive-frequency-first order)
    pub psdnew: [f32; SPECTRUM_RES],
    /// Previous PSD, for display decay effects
    pub psdold: [f32; SPECTRUM_RES],
    spec: [f32; SPECTRUM_RES],
    spec_old: [f32; SPECTRUM_RES],
    ring_x: [f32; SPECTRUM_RES],
    ring_y: [f32; SPECTRUM_RES],
    zoom_sample_ptr: usize,
    window: [f32; SPECTRUM_RES],
    interleaved: [f32; SPECTRUM_RES * 2],
    scratch_x: [f32; READ_BUFFER_SIZE],
    scratch_y: [f32; READ_BUFFER_SIZE],
    fft: Cfft,
}

impl SpectrumState {
    /// Create a spectrum engine with precomputed Hann window
    #[must_use]
    pub fn new() -> Self {
        let mut window = [0.0; SPECTRUM_RES];
        for (i, w) in window.iter_mut().enumerate() {
            *w = 0.5
                - 0.5 * (2.0 * core::f32::consts::PI * i as f32 / SPECTRUM_RES as f32).cos();
        }
        Self {
            psdnew: [0.0; SPECTRUM_RES],
            psdold: [0.0; SPECTRUM_RES],
            spec: [0.0; SPECTRUM_RES],
            spec_old: [0.0; SPECTRUM_RES],
            ring_x: [0.0; SPECTRUM_RES],
            ring_y: [0.0; SPECTRUM_RES],
            zoom_sample_ptr: 0,
            window,
            interleaved: [0.0; SPECTRUM_RES * 2],
            scratch_x: [0.0; READ_BUFFER_SIZE],
            scratch_y: [0.0; READ_BUFFER_SIZE],
            fft: Cfft::new(SPECTRUM_RES),
        }
    }

    /// Zero the PSD arrays and smoother state
    pub fn reset_psd(&mut self) {
        self.psdnew.fill(0.0);
        self.psdold.fill(0.0);
        self.spec.fill(0.0);
        self.spec_old.fill(0.0);
        self.zoom_sample_ptr = 0;
    }

    /// Compute a 512-point PSD from `i`/`q` (at least 512 samples each).
    ///
    /// Applies the Hann window, runs the complex FFT, reorders into
    /// positive-frequency-first order, smooths across calls, and writes
    /// `psdnew` (shifting the prior spectrum into `psdold`).
    pub fn calc_psd512(&mut self, i: &[f32], q: &[f32]) {
        debug_assert!(i.len() >= SPECTRUM_RES && q.len() >= SPECTRUM_RES);
        for k in 0..SPECTRUM_RES {
            self.interleaved[2 * k] = i[k] * self.window[k];
            self.interleaved[2 * k + 1] = q[k] * self.window[k];
        }
        self.fft.forward(&mut self.interleaved);

        // Magnitude squared, reordered so bin 0 is the most negative
        // frequency: output bin i <- FFT bin (i + N/2) mod N
        let half = SPECTRUM_RES / 2;
        for k in 0..half {
            let lo = 2 * k;
            let hi = 2 * (k + half);
            self.spec[k + half] =
                self.interleaved[lo] * self.interleaved[lo]
                    + self.interleaved[lo + 1] * self.interleaved[lo + 1];
            self.spec[k] = self.interleaved[hi] * self.interleaved[hi]
                + self.interleaved[hi + 1] * self.interleaved[hi + 1];
        }

        for k in 0..SPECTRUM_RES {
            self.spec[k] =
                SPECTRUM_LPF_COEFF * self.spec[k] + (1.0 - SPECTRUM_LPF_COEFF) * self.spec_old[k];
            self.spec_old[k] = self.spec[k];
        }

        for k in 0..SPECTRUM_RES {
            self.psdold[k] = self.psdnew[k];
            self.psdnew[k] = log10_fast(self.spec[k]);
        }
    }

    /// Zoom-FFT step for one block.
    ///
    /// At zoom 1 the raw block feeds the PSD directly and every call
    /// produces a spectrum. At higher zooms the block is low-passed,
    /// stride-decimated, and accumulated in a ring; a spectrum is produced
    /// only on the call that fills the ring. Returns whether `psdnew` was
    /// updated.
    pub fn zoom_fft_exe(&mut self, block: &SampleBlock, zoom: u32, bank: &mut FilterBank) -> bool {
        if zoom == 0 {
            self.calc_psd512(block.i_samples(), block.q_samples());
            return true;
        }

        let n = block.len();
        bank.zoom_iir_i
            .process_block(&block.i[..n], &mut self.scratch_x[..n]);
        bank.zoom_iir_q
            .process_block(&block.q[..n], &mut self.scratch_y[..n]);

        // Integer-stride decimation; the IIR above is the anti-alias filter
        let m = bank.zoom_m;
        let mut n_dec = 0;
        for k in (0..n).step_by(m) {
            self.scratch_x[n_dec] = self.scratch_x[k];
            self.scratch_y[n_dec] = self.scratch_y[k];
            n_dec += 1;
        }

        let n_keep = n_dec.min(SPECTRUM_RES);
        let multiplier = ZOOM_MULTIPLIER_COEFF[zoom as usize];
        for k in 0..n_keep {
            if self.zoom_sample_ptr >= SPECTRUM_RES {
                break;
            }
            self.ring_x[self.zoom_sample_ptr] = multiplier * self.scratch_x[k];
            self.ring_y[self.zoom_sample_ptr] = multiplier * self.scratch_y[k];
            self.zoom_sample_ptr += 1;
        }

        if self.zoom_sample_ptr < SPECTRUM_RES {
            return false;
        }
        self.zoom_sample_ptr = 0;
        let (ring_x, ring_y) = (self.ring_x, self.ring_y);
        self.calc_psd512(&ring_x, &ring_y);
        true
    }
}

impl Default for SpectrumState {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency translation by +Fs/4 without multiplications.
///
/// Rotates the I/Q vector 90 degrees per sample: identity, swap with sign
/// flip, negate both, reverse swap. Applied twice it is sample negation
/// (a pi rotation).
pub fn freq_shift_fs4(block: &mut SampleBlock) {
    let n = block.len();
    debug_assert!(n % 4 == 0);
    let mut k = 0;
    while k < n {
        let hh1 = -block.q[k + 1];
        let hh2 = block.i[k + 1];
        block.i[k + 1] = hh1;
        block.q[k + 1] = hh2;
        let hh1 = -block.i[k + 2];
        let hh2 = -block.q[k + 2];
        block.i[k + 2] = hh1;
        block.q[k + 2] = hh2;
        let hh1 = block.q[k + 3];
        let hh2 = -block.i[k + 3];
        block.i[k + 3] = hh1;
        block.q[k + 3] = hh2;
        k += 4;
    }
}

/// NCO frequency shifter with a wrapping phase counter.
///
/// The counter resets when it reaches the sample rate (one full cycle of
/// accumulated phase per hertz), so phase error cannot accumulate across
/// long runs while adjacent blocks stay continuous.
#[derive(Clone, Copy, Debug, Default)]
pub struct NcoShifter {
    phase_index: u32,
}

impl NcoShifter {
    /// Create a shifter with zero phase
    #[must_use]
    pub const fn new() -> Self {
        Self { phase_index: 0 }
    }

    /// Shift the block by `freq_shift_hz`, in place
    pub fn shift(&mut self, block: &mut SampleBlock, freq_shift_hz: f32) {
        let n = block.len();
        let rate = block.sample_rate_hz();
        let nco_inc =
            2.0 * core::f32::consts::PI * freq_shift_hz / rate as f32;
        for k in 0..n {
            let theta = nco_inc * self.phase_index as f32;
            let (osc_sin, osc_cos) = (theta.sin(), theta.cos());
            let ip = block.i[k];
            let qp = block.q[k];
            block.i[k] = ip * osc_cos - qp * osc_sin;
            block.q[k] = qp * osc_cos + ip * osc_sin;
            self.phase_index += 1;
            if self.phase_index == rate {
                self.phase_index = 0;
            }
        }
    }

    /// Reset the phase counter
    pub fn reset(&mut self) {
        self.phase_index = 0;
    }
}
