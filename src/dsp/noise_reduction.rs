//! Noise reduction
//!
//! Three independently selectable algorithms; at most one runs per block:
//!
//! - **Kim** - normalized block-LMS that subtracts an adaptive
//!   narrow-band estimate from the wide-band input
//! - **Spectral** - frame-wise spectral subtraction with a running noise
//!   floor and overlap-add reconstruction
//! - **Xanr** - one adaptive LMS core used two ways: noise mode outputs
//!   the adaptive (correlated) estimate, notch mode subtracts it
//!
//! Every algorithm preserves block length and sample rate; `Off` bypasses.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::DECIMATED_BLOCK;
use crate::dsp::block::SampleBlock;
use crate::dsp::fft::Cfft;
use crate::types::NrSelection;

/// Kim LMS filter length
const KIM_TAPS: usize = 64;
/// Kim decorrelation delay in samples
const KIM_DELAY: usize = 32;

/// Normalized block-LMS noise reduction (Kim variant)
pub struct KimNr {
    weights: [f32; KIM_TAPS],
    delay: [f32; KIM_TAPS + KIM_DELAY],
    pos: usize,
    mu: f32,
}

impl KimNr {
    /// Create with the default adaptation rate
    #[must_use]
    pub const fn new() -> Self {
        Self {
            weights: [0.0; KIM_TAPS],
            delay: [0.0; KIM_TAPS + KIM_DELAY],
            pos: 0,
            mu: 0.02,
        }
    }

    /// Process mono audio in place
    pub fn process(&mut self, audio: &mut [f32]) {
        let len = KIM_TAPS + KIM_DELAY;
        for x in audio.iter_mut() {
            let d = *x;
            self.delay[self.pos] = d;

            // Estimate the narrow-band (predictable) component from the
            // decorrelated history
            let mut y = 0.0;
            let mut power = 1e-6;
            let mut idx = (self.pos + len - KIM_DELAY) % len;
            for w in &self.weights {
                let u = self.delay[idx];
                y += w * u;
                power += u * u;
                idx = if idx == 0 { len - 1 } else { idx - 1 };
            }

            let e = d - y;
            let step = 2.0 * self.mu * e / power;
            let mut idx = (self.pos + len - KIM_DELAY) % len;
            for w in &mut self.weights {
                *w += step * self.delay[idx];
                idx = if idx == 0 { len - 1 } else { idx - 1 };
            }

            self.pos = (self.pos + 1) % len;
            *x = e;
        }
    }

    /// Zero weights and history
    pub fn reset(&mut self) {
        self.weights = [0.0; KIM_TAPS];
        self.delay = [0.0; KIM_TAPS + KIM_DELAY];
        self.pos = 0;
    }
}

impl Default for KimNr {
    fn default() -> Self {
        Self::new()
    }
}

/// Spectral-subtraction frame length
const SPEC_FRAME: usize = 256;
/// Hop size (50% overlap)
const SPEC_HOP: usize = SPEC_FRAME / 2;

/// Frame-wise spectral subtraction with overlap-add
pub struct SpectralNr {
    fft: Cfft,
    window: [f32; SPEC_FRAME],
    /// Input history: previous hop joined with the current one
    in_hist: [f32; SPEC_FRAME],
    /// Overlap-add tail carried to the next hop
    ola_tail: [f32; SPEC_HOP],
    noise_floor: [f32; SPEC_FRAME],
    frame: [f32; SPEC_FRAME * 2],
    warm: bool,
}

impl SpectralNr {
    /// Subtraction depth (multiples of the noise floor)
    const BETA: f32 = 2.0;
    /// Gain floor applied to fully-subtracted bins
    const GAIN_FLOOR: f32 = 0.15;

    /// Create with a sqrt-Hann analysis/synthesis window
    #[must_use]
    pub fn new() -> Self {
        let mut window = [0.0; SPEC_FRAME];
        for (i, w) in window.iter_mut().enumerate() {
            let hann =
                0.5 - 0.5 * (2.0 * core::f32::consts::PI * i as f32 / SPEC_FRAME as f32).cos();
            *w = hann.sqrt();
        }
        Self {
            fft: Cfft::new(SPEC_FRAME),
            window,
            in_hist: [0.0; SPEC_FRAME],
            ola_tail: [0.0; SPEC_HOP],
            noise_floor: [1.0; SPEC_FRAME],
            frame: [0.0; SPEC_FRAME * 2],
            warm: false,
        }
    }

    fn process_hop(&mut self, hop: &mut [f32]) {
        debug_assert_eq!(hop.len(), SPEC_HOP);
        self.in_hist.copy_within(SPEC_HOP.., 0);
        self.in_hist[SPEC_HOP..].copy_from_slice(hop);

        for k in 0..SPEC_FRAME {
            self.frame[2 * k] = self.in_hist[k] * self.window[k];
            self.frame[2 * k + 1] = 0.0;
        }
        self.fft.forward(&mut self.frame);

        for b in 0..SPEC_FRAME {
            let re = self.frame[2 * b];
            let im = self.frame[2 * b + 1];
            let mag = (re * re + im * im).sqrt().max(1e-9);

            // The floor rises slowly and snaps down fast, tracking the
            // quietest recent excursion of each bin
            let nf = &mut self.noise_floor[b];
            if self.warm {
                *nf = (*nf * 1.005).min(mag.max(1e-6));
            } else {
                *nf = mag.max(1e-6);
            }

            let gain = ((mag - Self::BETA * *nf) / mag).max(Self::GAIN_FLOOR);
            self.frame[2 * b] = re * gain;
            self.frame[2 * b + 1] = im * gain;
        }
        self.warm = true;

        self.fft.inverse(&mut self.frame);
        for k in 0..SPEC_HOP {
            hop[k] = self.frame[2 * k] * self.window[k] + self.ola_tail[k];
            self.ola_tail[k] =
                self.frame[2 * (k + SPEC_HOP)] * self.window[k + SPEC_HOP];
        }
    }

    /// Process mono audio in place (length must divide into hops)
    pub fn process(&mut self, audio: &mut [f32]) {
        debug_assert!(audio.len() % SPEC_HOP == 0);
        let mut start = 0;
        while start < audio.len() {
            let (_, rest) = audio.split_at_mut(start);
            self.process_hop(&mut rest[..SPEC_HOP]);
            start += SPEC_HOP;
        }
    }

    /// Reset history and noise floor
    pub fn reset(&mut self) {
        self.in_hist = [0.0; SPEC_FRAME];
        self.ola_tail = [0.0; SPEC_HOP];
        self.noise_floor = [1.0; SPEC_FRAME];
        self.warm = false;
    }
}

impl Default for SpectralNr {
    fn default() -> Self {
        Self::new()
    }
}

/// Xanr filter length
const XANR_TAPS: usize = 64;
/// Xanr decorrelation delay
const XANR_DELAY: usize = 16;

/// Output selection for the Xanr adaptive core
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XanrMode {
    /// Output the adaptive estimate (noise-reduction use)
    Noise,
    /// Subtract the estimate (automatic notch filter)
    Notch,
}

/// Adaptive LMS core shared by the auto-notch and auto-noise functions
pub struct Xanr {
    weights: [f32; XANR_TAPS],
    delay: [f32; XANR_TAPS + XANR_DELAY],
    pos: usize,
    two_mu: f32,
    gamma: f32,
}

impl Xanr {
    /// Create with the reference adaptation constants
    #[must_use]
    pub const fn new() -> Self {
        Self {
            weights: [0.0; XANR_TAPS],
            delay: [0.0; XANR_TAPS + XANR_DELAY],
            pos: 0,
            two_mu: 0.02,
            gamma: 0.999_9,
        }
    }

    /// Process mono audio in place in the given mode
    pub fn process(&mut self, audio: &mut [f32], mode: XanrMode) {
        let len = XANR_TAPS + XANR_DELAY;
        for x in audio.iter_mut() {
            let d = *x;
            self.delay[self.pos] = d;

            let mut y = 0.0;
            let mut power = 1e-6;
            let mut idx = (self.pos + len - XANR_DELAY) % len;
            for w in &self.weights {
                let u = self.delay[idx];
                y += w * u;
                power += u * u;
                idx = if idx == 0 { len - 1 } else { idx - 1 };
            }

            let e = d - y;
            let step = self.two_mu * e / power;
            let mut idx = (self.pos + len - XANR_DELAY) % len;
            for w in &mut self.weights {
                *w = self.gamma * *w + step * self.delay[idx];
                idx = if idx == 0 { len - 1 } else { idx - 1 };
            }

            self.pos = (self.pos + 1) % len;
            *x = match mode {
                XanrMode::Noise => y,
                XanrMode::Notch => e,
            };
        }
    }

    /// Zero weights and history
    pub fn reset(&mut self) {
        self.weights = [0.0; XANR_TAPS];
        self.delay = [0.0; XANR_TAPS + XANR_DELAY];
        self.pos = 0;
    }
}

impl Default for Xanr {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of all three algorithms; dispatches on the user selection
pub struct NoiseReducer {
    kim: KimNr,
    spectral: SpectralNr,
    xanr: Xanr,
    /// The notch keeps its own weights so it never shares adaptation
    /// state with the LMS noise selection
    notch: Xanr,
    /// Auto-notch rides on top of the selected reduction when enabled
    pub auto_notch: bool,
}

impl NoiseReducer {
    /// Create all algorithm states
    #[must_use]
    pub fn new() -> Self {
        Self {
            kim: KimNr::new(),
            spectral: SpectralNr::new(),
            xanr: Xanr::new(),
            notch: Xanr::new(),
            auto_notch: false,
        }
    }

    /// Run the selected algorithm on the demodulated audio (I channel),
    /// then refresh the Q scratch copy. Never fails after construction.
    pub fn process(&mut self, block: &mut SampleBlock, selection: NrSelection) {
        debug_assert!(block.len() <= DECIMATED_BLOCK);
        let n = block.len();
        match selection {
            NrSelection::Off => {}
            NrSelection::Kim => self.kim.process(&mut block.i[..n]),
            NrSelection::Spectral => self.spectral.process(&mut block.i[..n]),
            NrSelection::Lms => self.xanr.process(&mut block.i[..n], XanrMode::Noise),
        }
        if self.auto_notch {
            self.notch.process(&mut block.i[..n], XanrMode::Notch);
        }
        block.copy_i_to_q();
    }

    /// Reset every algorithm's state
    pub fn reset(&mut self) {
        self.kim.reset();
        self.spectral.reset();
        self.xanr.reset();
        self.notch.reset();
    }
}

impl Default for NoiseReducer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn tone(buf: &mut [f32], f_norm: f32, offset: usize) {
        for (k, v) in buf.iter_mut().enumerate() {
            *v = (2.0 * PI * f_norm * (offset + k) as f32).sin();
        }
    }

    #[test]
    fn xanr_notch_removes_steady_tone() {
        let mut xanr = Xanr::new();
        let mut buf = [0.0f32; 256];
        let mut residual = 0.0;
        for rep in 0..40 {
            tone(&mut buf, 750.0 / 24_000.0, rep * 256);
            xanr.process(&mut buf, XanrMode::Notch);
            if rep == 39 {
                residual = buf.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
            }
        }
        assert!(residual < 0.1, "tone residual {residual}");
    }

    #[test]
    fn xanr_noise_mode_keeps_steady_tone() {
        let mut xanr = Xanr::new();
        let mut buf = [0.0f32; 256];
        let mut peak = 0.0;
        for rep in 0..40 {
            tone(&mut buf, 750.0 / 24_000.0, rep * 256);
            xanr.process(&mut buf, XanrMode::Noise);
            if rep == 39 {
                peak = buf.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
            }
        }
        assert!(peak > 0.7, "tone peak after adaptation {peak}");
    }

    #[test]
    fn block_length_is_preserved() {
        let mut nr = NoiseReducer::new();
        for sel in [
            NrSelection::Off,
            NrSelection::Kim,
            NrSelection::Spectral,
            NrSelection::Lms,
        ] {
            let mut block = SampleBlock::new(256, 24_000);
            tone(&mut block.i[..256], 0.05, 0);
            nr.process(&mut block, sel);
            assert_eq!(block.len(), 256);
            assert_eq!(block.sample_rate_hz(), 24_000);
            for k in 0..256 {
                assert!(block.i[k].is_finite());
            }
        }
    }

    #[test]
    fn lms_with_auto_notch_uses_independent_state() {
        // LMS noise mode passes the steady tone as its adaptive
        // estimate; the notch, adapting its own weights on that output,
        // then takes the tone back out
        let mut nr = NoiseReducer::new();
        nr.auto_notch = true;
        let mut residual = 0.0;
        for rep in 0..60 {
            let mut block = SampleBlock::new(256, 24_000);
            tone(&mut block.i[..256], 750.0 / 24_000.0, rep * 256);
            nr.process(&mut block, NrSelection::Lms);
            if rep == 59 {
                residual = block
                    .i_samples()
                    .iter()
                    .fold(0.0f32, |m, &v| m.max(v.abs()));
            }
            for &v in block.i_samples() {
                assert!(v.is_finite());
            }
        }
        assert!(residual < 0.15, "combined residual {residual}");
    }

    #[test]
    fn off_is_bit_exact_bypass() {
        let mut nr = NoiseReducer::new();
        let mut block = SampleBlock::new(256, 24_000);
        tone(&mut block.i[..256], 0.03, 0);
        let before = block.i;
        nr.process(&mut block, NrSelection::Off);
        assert_eq!(&before[..256], &block.i[..256]);
    }
}
