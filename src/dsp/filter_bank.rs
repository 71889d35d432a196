//! Filter bank: owner of all long-lived DSP filter state
//!
//! One instance is built at initialization and lives for the whole
//! process. It owns the zoom-FFT pre-decimation IIRs, the two receive
//! decimation FIR stages, the complex frequency-domain band-pass mask for
//! the convolution filter, the post-demodulation audio low-pass, the CW
//! audio filters, both equalizer banks, and the receive interpolators.
//!
//! The mask is double-buffered: `refresh_mask` builds into scratch from
//! the control plane, `commit_mask` swaps it in at a block boundary so the
//! real-time loop never sees a half-built mask.

use crate::config::{
    DECIM1_BW_HZ, DECIM1_FIR_TAPS, DECIM_ATT_DB, DECIM_BW_HZ, DECIM_FIR_TAPS, DF, DF1, DF2,
    FFT_LENGTH, SAMPLE_RATE_HZ, CW_FILTER_CUTOFFS_HZ,
};
use crate::dsp::equalizer::EqBank;
use crate::dsp::fft::Cfft;
use crate::dsp::filter::{
    butterworth_lowpass, design_complex_bandpass, design_lowpass, BiquadCascade, BiquadCoeffs,
    FirDecimator, FirInterpolator,
};

/// Stages in the zoom-FFT anti-alias IIR
pub const ZOOM_IIR_STAGES: usize = 4;

/// Stages in each CW audio filter cascade
pub const CW_AUDIO_STAGES: usize = 3;

/// Tap count of the complex band-pass prototype (FFT/2 + 1)
pub const MASK_PROTOTYPE_TAPS: usize = FFT_LENGTH / 2 + 1;

/// Number of selectable CW audio filters (a sixth selection bypasses)
pub const CW_AUDIO_FILTERS: usize = CW_FILTER_CUTOFFS_HZ.len();

/// All long-lived filter state for one transceiver
pub struct FilterBank {
    /// Zoom-FFT pre-decimation IIR, I channel
    pub zoom_iir_i: BiquadCascade<ZOOM_IIR_STAGES>,
    /// Zoom-FFT pre-decimation IIR, Q channel
    pub zoom_iir_q: BiquadCascade<ZOOM_IIR_STAGES>,
    /// Current zoom decimation factor (2^zoom)
    pub zoom_m: usize,

    /// Receive decimation stage 1 (by 4), I channel
    pub decim1_i: FirDecimator<DECIM1_FIR_TAPS>,
    /// Receive decimation stage 1 (by 4), Q channel
    pub decim1_q: FirDecimator<DECIM1_FIR_TAPS>,
    /// Receive decimation stage 2 (by 2), I channel
    pub decim2_i: FirDecimator<DECIM_FIR_TAPS>,
    /// Receive decimation stage 2 (by 2), Q channel
    pub decim2_q: FirDecimator<DECIM_FIR_TAPS>,

    /// Receive interpolation stage 1 (by 2), I channel
    pub interp1_i: FirInterpolator<DECIM_FIR_TAPS>,
    /// Receive interpolation stage 1 (by 2), Q channel
    pub interp1_q: FirInterpolator<DECIM_FIR_TAPS>,
    /// Receive interpolation stage 2 (by 4), I channel
    pub interp2_i: FirInterpolator<32>,
    /// Receive interpolation stage 2 (by 4), Q channel
    pub interp2_q: FirInterpolator<32>,

    /// Post-demodulation audio low-pass (AM/SAM)
    pub audio_lowpass: BiquadCascade<1>,

    /// Selectable CW audio band filters
    pub cw_audio: [BiquadCascade<CW_AUDIO_STAGES>; CW_AUDIO_FILTERS],

    /// Receive-path equalizer
    pub eq_rx: EqBank,
    /// Transmit-path equalizer
    pub eq_tx: EqBank,

    mask: [f32; FFT_LENGTH * 2],
    mask_scratch: [f32; FFT_LENGTH * 2],
    mask_pending: bool,
    fft: Cfft,
}

impl FilterBank {
    /// Build the bank for the configured base sample rate.
    ///
    /// `spectrum_zoom` selects the initial zoom IIR coefficients;
    /// `f_lo_hz`/`f_hi_hz` are the current band's pass-band edges for the
    /// initial mask and audio low-pass.
    #[must_use]
    pub fn new(spectrum_zoom: u32, f_lo_hz: f32, f_hi_hz: f32) -> Self {
        let fs = SAMPLE_RATE_HZ as f32;
        let mut stage1 = [0.0f32; DECIM1_FIR_TAPS];
        design_lowpass(&mut stage1, DECIM1_BW_HZ, DECIM_ATT_DB, fs);
        let mut stage2 = [0.0f32; DECIM_FIR_TAPS];
        design_lowpass(&mut stage2, DECIM_BW_HZ, DECIM_ATT_DB, fs / DF1 as f32);

        // Interpolators run at their output rates
        let mut int1_taps = [0.0f32; DECIM_FIR_TAPS];
        design_lowpass(&mut int1_taps, DECIM_BW_HZ, DECIM_ATT_DB, fs / DF1 as f32);
        let mut int2_taps = [0.0f32; 32];
        design_lowpass(&mut int2_taps, DECIM_BW_HZ, DECIM_ATT_DB, fs);

        let audio_fs = fs / DF as f32;
        let mut cw_audio = [BiquadCascade::identity(); CW_AUDIO_FILTERS];
        for (k, cascade) in cw_audio.iter_mut().enumerate() {
            cascade.set_coeffs(butterworth_lowpass(CW_FILTER_CUTOFFS_HZ[k] / audio_fs));
        }

        let mut bank = Self {
            zoom_iir_i: BiquadCascade::identity(),
            zoom_iir_q: BiquadCascade::identity(),
            zoom_m: 1,
            decim1_i: FirDecimator::new(stage1, DF1),
            decim1_q: FirDecimator::new(stage1, DF1),
            decim2_i: FirDecimator::new(stage2, DF2),
            decim2_q: FirDecimator::new(stage2, DF2),
            interp1_i: FirInterpolator::new(int1_taps, DF2),
            interp1_q: FirInterpolator::new(int1_taps, DF2),
            interp2_i: FirInterpolator::new(int2_taps, DF1),
            interp2_q: FirInterpolator::new(int2_taps, DF1),
            audio_lowpass: BiquadCascade::identity(),
            cw_audio,
            eq_rx: EqBank::new(audio_fs),
            eq_tx: EqBank::new(audio_fs / 2.0),
            mask: [0.0; FFT_LENGTH * 2],
            mask_scratch: [0.0; FFT_LENGTH * 2],
            mask_pending: false,
            fft: Cfft::new(FFT_LENGTH),
        };
        bank.prepare_zoom(spectrum_zoom);
        bank.set_audio_lowpass(f_lo_hz, f_hi_hz);
        bank.refresh_mask(f_lo_hz, f_hi_hz);
        bank.commit_mask();
        bank
    }

    /// Select the zoom level: updates the decimation factor and the
    /// anti-alias IIR coefficients, and zeroes the IIR state
    pub fn prepare_zoom(&mut self, spectrum_zoom: u32) {
        self.zoom_m = 1 << spectrum_zoom;
        if spectrum_zoom == 0 {
            // Raw samples feed the spectrum engine at zoom 1
            self.zoom_iir_i = BiquadCascade::identity();
            self.zoom_iir_q = BiquadCascade::identity();
            return;
        }
        // Cut at 85% of the post-decimation Nyquist
        let fc_norm = 0.85 / (2.0 * self.zoom_m as f32);
        let coeffs = butterworth_lowpass::<ZOOM_IIR_STAGES>(fc_norm);
        self.zoom_iir_i = BiquadCascade::new(coeffs);
        self.zoom_iir_q = BiquadCascade::new(coeffs);
    }

    /// Rebuild the post-demodulation audio low-pass for a pass-band.
    ///
    /// AM carries both sidebands, so the effective audio cutoff is the
    /// narrower of the two edges.
    pub fn set_audio_lowpass(&mut self, f_lo_hz: f32, f_hi_hz: f32) {
        let cutoff = f_hi_hz.min(-f_lo_hz).abs().max(100.0);
        let audio_fs = SAMPLE_RATE_HZ as f32 / DF as f32;
        self.audio_lowpass
            .set_coeffs([BiquadCoeffs::lowpass(cutoff / audio_fs, 1.3)]);
    }

    /// Build a new convolution mask into scratch for the given pass-band.
    ///
    /// Must be called after any change to the band edges; takes effect at
    /// the next `commit_mask`. All other bank state survives.
    pub fn refresh_mask(&mut self, f_lo_hz: f32, f_hi_hz: f32) {
        let fs = SAMPLE_RATE_HZ as f32 / DF as f32;
        let mut proto_i = [0.0f32; MASK_PROTOTYPE_TAPS];
        let mut proto_q = [0.0f32; MASK_PROTOTYPE_TAPS];
        design_complex_bandpass(&mut proto_i, &mut proto_q, f_lo_hz, f_hi_hz, fs);

        self.mask_scratch.fill(0.0);
        for k in 0..MASK_PROTOTYPE_TAPS {
            self.mask_scratch[2 * k] = proto_i[k];
            self.mask_scratch[2 * k + 1] = proto_q[k];
        }
        self.fft.forward(&mut self.mask_scratch);
        self.mask_pending = true;
    }

    /// Swap a pending mask in; called at a block boundary only
    pub fn commit_mask(&mut self) {
        if self.mask_pending {
            self.mask.copy_from_slice(&self.mask_scratch);
            self.mask_pending = false;
        }
    }

    /// True when a rebuilt mask is waiting for the next block boundary
    #[must_use]
    pub const fn mask_pending(&self) -> bool {
        self.mask_pending
    }

    /// The active frequency-domain mask (interleaved complex)
    #[must_use]
    pub fn mask(&self) -> &[f32; FFT_LENGTH * 2] {
        &self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_passband_is_unity_stopband_zero() {
        // LSB pass-band -3000..-200 Hz at 24 ksps maps to upper FFT bins
        let bank = FilterBank::new(0, -3000.0, -200.0);
        let mask = bank.mask();
        for bin in 460..500 {
            let mag = (mask[2 * bin].powi(2) + mask[2 * bin + 1].powi(2)).sqrt();
            assert!((mag - 1.0).abs() < 0.02, "bin {bin}: {mag}");
        }
        for bin in 10..400 {
            let mag = (mask[2 * bin].powi(2) + mask[2 * bin + 1].powi(2)).sqrt();
            assert!(mag < 0.001, "bin {bin}: {mag}");
        }
    }

    #[test]
    fn refresh_waits_for_commit() {
        let mut bank = FilterBank::new(0, -3000.0, -200.0);
        let before = *bank.mask();
        bank.refresh_mask(200.0, 3000.0);
        assert!(bank.mask_pending());
        assert_eq!(&before[..8], &bank.mask()[..8]);
        bank.commit_mask();
        assert!(!bank.mask_pending());
        let after = bank.mask();
        // USB mask occupies the low bins instead
        let mag_low = (after[2 * 30].powi(2) + after[2 * 30 + 1].powi(2)).sqrt();
        assert!((mag_low - 1.0).abs() < 0.02);
    }

    #[test]
    fn rebuilding_same_passband_reproduces_mask() {
        let mut bank = FilterBank::new(0, -3000.0, -200.0);
        let before = *bank.mask();
        bank.refresh_mask(-3000.0, -200.0);
        bank.commit_mask();
        assert_eq!(&before[..], &bank.mask()[..]);
    }

    #[test]
    fn zoom_prepare_sets_factor() {
        let mut bank = FilterBank::new(0, -3000.0, -200.0);
        bank.prepare_zoom(4);
        assert_eq!(bank.zoom_m, 16);
        bank.prepare_zoom(0);
        assert_eq!(bank.zoom_m, 1);
    }
}
