//! Digital filter primitives
//!
//! Biquad sections and cascades, streaming FIR filters, and the
//! integer-ratio FIR decimator / interpolator used throughout both
//! pipelines. Design helpers synthesize windowed-sinc coefficient sets at
//! initialization time; everything here operates on `f32` samples.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use core::f32::consts::PI;

/// Biquad (second-order IIR) filter coefficients
#[derive(Clone, Copy, Debug)]
pub struct BiquadCoeffs {
    /// Numerator coefficients (b0, b1, b2)
    b: [f32; 3],
    /// Denominator coefficients (a1, a2) - a0 is always 1
    a: [f32; 2],
}

impl BiquadCoeffs {
    /// Identity section (passes input unchanged)
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            b: [1.0, 0.0, 0.0],
            a: [0.0, 0.0],
        }
    }

    /// Create lowpass biquad filter
    ///
    /// `freq_normalized` is cutoff / sample-rate.
    #[must_use]
    pub fn lowpass(freq_normalized: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq_normalized;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b: [b0 / a0, b1 / a0, b2 / a0],
            a: [a1 / a0, a2 / a0],
        }
    }

    /// Create highpass biquad filter
    #[must_use]
    pub fn highpass(freq_normalized: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq_normalized;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b: [b0 / a0, b1 / a0, b2 / a0],
            a: [a1 / a0, a2 / a0],
        }
    }

    /// Create constant-peak-gain bandpass biquad filter
    #[must_use]
    pub fn bandpass(freq_normalized: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq_normalized;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);

        let b0 = alpha;
        let b1 = 0.0;
        let b2 = -alpha;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b: [b0 / a0, b1 / a0, b2 / a0],
            a: [a1 / a0, a2 / a0],
        }
    }

    /// Create notch filter
    #[must_use]
    pub fn notch(freq_normalized: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq_normalized;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);

        let b0 = 1.0;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b: [b0 / a0, b1 / a0, b2 / a0],
            a: [a1 / a0, a2 / a0],
        }
    }
}

/// Cascade of `S` biquad sections (Direct Form II Transposed)
#[derive(Clone, Copy, Debug)]
pub struct BiquadCascade<const S: usize> {
    coeffs: [BiquadCoeffs; S],
    /// Per-stage state variables
    z: [[f32; 2]; S],
}

impl<const S: usize> BiquadCascade<S> {
    /// Create a cascade from a coefficient set, state zeroed
    #[must_use]
    pub const fn new(coeffs: [BiquadCoeffs; S]) -> Self {
        Self {
            coeffs,
            z: [[0.0; 2]; S],
        }
    }

    /// Identity cascade
    #[must_use]
    pub const fn identity() -> Self {
        Self::new([BiquadCoeffs::identity(); S])
    }

    /// Replace the coefficients, preserving state
    pub fn set_coeffs(&mut self, coeffs: [BiquadCoeffs; S]) {
        self.coeffs = coeffs;
    }

    /// Process a single sample through all stages
    pub fn process(&mut self, input: f32) -> f32 {
        let mut x = input;
        for s in 0..S {
            let c = &self.coeffs[s];
            let y = c.b[0] * x + self.z[s][0];
            self.z[s][0] = c.b[1] * x - c.a[0] * y + self.z[s][1];
            self.z[s][1] = c.b[2] * x - c.a[1] * y;
            x = y;
        }
        x
    }

    /// Filter `input` into `output` (slices must be equal length)
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.process(*x);
        }
    }

    /// Filter a buffer in place
    pub fn process_in_place(&mut self, buf: &mut [f32]) {
        for x in buf.iter_mut() {
            *x = self.process(*x);
        }
    }

    /// Zero all state variables
    pub fn reset(&mut self) {
        self.z = [[0.0; 2]; S];
    }
}

/// Butterworth lowpass as a cascade of `S` biquads (order 2·S).
///
/// Section Q values follow the Butterworth pole positions.
#[must_use]
pub fn butterworth_lowpass<const S: usize>(freq_normalized: f32) -> [BiquadCoeffs; S] {
    let mut coeffs = [BiquadCoeffs::identity(); S];
    for (k, c) in coeffs.iter_mut().enumerate() {
        let q = 1.0 / (2.0 * ((2 * k + 1) as f32 * PI / (4 * S) as f32).sin());
        *c = BiquadCoeffs::lowpass(freq_normalized, q);
    }
    coeffs
}

/// Streaming FIR filter with `N` taps
#[derive(Clone)]
pub struct FirFilter<const N: usize> {
    taps: [f32; N],
    delay: [f32; N],
    pos: usize,
}

impl<const N: usize> FirFilter<N> {
    /// Create a filter from a coefficient array
    #[must_use]
    pub const fn new(taps: [f32; N]) -> Self {
        Self {
            taps,
            delay: [0.0; N],
            pos: 0,
        }
    }

    /// Process a single sample
    pub fn process(&mut self, input: f32) -> f32 {
        self.delay[self.pos] = input;
        let mut acc = 0.0;
        let mut idx = self.pos;
        for t in 0..N {
            acc += self.delay[idx] * self.taps[t];
            idx = if idx == 0 { N - 1 } else { idx - 1 };
        }
        self.pos = (self.pos + 1) % N;
        acc
    }

    /// Filter `input` into `output`
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.process(*x);
        }
    }

    /// Filter a buffer in place
    pub fn process_in_place(&mut self, buf: &mut [f32]) {
        for x in buf.iter_mut() {
            *x = self.process(*x);
        }
    }

    /// Zero the delay line
    pub fn reset(&mut self) {
        self.delay = [0.0; N];
        self.pos = 0;
    }
}

/// FIR decimator: lowpass FIR followed by keep-every-Mth
///
/// Decimates in place; the output occupies the first N/M slots of the
/// buffer. State carries across blocks.
#[derive(Clone)]
pub struct FirDecimator<const TAPS: usize> {
    taps: [f32; TAPS],
    delay: [f32; TAPS],
    pos: usize,
    factor: usize,
}

impl<const TAPS: usize> FirDecimator<TAPS> {
    /// Create a decimator with the given taps and integer factor
    #[must_use]
    pub const fn new(taps: [f32; TAPS], factor: usize) -> Self {
        Self {
            taps,
            delay: [0.0; TAPS],
            pos: 0,
            factor,
        }
    }

    /// Decimation factor
    #[must_use]
    pub const fn factor(&self) -> usize {
        self.factor
    }

    /// Decimate `n` samples in place; returns the output length n / M.
    ///
    /// Output index k is written only after input index k·M has been
    /// consumed, so aliasing input and output is safe.
    pub fn process_in_place(&mut self, buf: &mut [f32], n: usize) -> usize {
        debug_assert!(n % self.factor == 0);
        let mut out = 0;
        let mut phase = 0;
        for j in 0..n {
            self.delay[self.pos] = buf[j];
            phase += 1;
            if phase == self.factor {
                phase = 0;
                let mut acc = 0.0;
                let mut idx = self.pos;
                for t in 0..TAPS {
                    acc += self.delay[idx] * self.taps[t];
                    idx = if idx == 0 { TAPS - 1 } else { idx - 1 };
                }
                buf[out] = acc;
                out += 1;
            }
            self.pos = (self.pos + 1) % TAPS;
        }
        out
    }

    /// Zero the delay line
    pub fn reset(&mut self) {
        self.delay = [0.0; TAPS];
        self.pos = 0;
    }
}

/// Maximum input history an interpolator keeps (taps / factor)
const INTERP_HISTORY: usize = 64;

/// Polyphase FIR interpolator by integer factor L
///
/// Equivalent to zero-stuffing by L followed by the lowpass FIR; output
/// amplitude is therefore 1/L of the input unless the caller rescales.
#[derive(Clone)]
pub struct FirInterpolator<const TAPS: usize> {
    taps: [f32; TAPS],
    delay: [f32; INTERP_HISTORY],
    pos: usize,
    factor: usize,
}

impl<const TAPS: usize> FirInterpolator<TAPS> {
    /// Create an interpolator with the given taps and integer factor
    #[must_use]
    pub fn new(taps: [f32; TAPS], factor: usize) -> Self {
        debug_assert!(TAPS % factor == 0);
        debug_assert!(TAPS / factor <= INTERP_HISTORY);
        Self {
            taps,
            delay: [0.0; INTERP_HISTORY],
            pos: 0,
            factor,
        }
    }

    /// Interpolation factor
    #[must_use]
    pub const fn factor(&self) -> usize {
        self.factor
    }

    /// Interpolate `input` into `output`; `output.len() == input.len() * L`
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert!(output.len() >= input.len() * self.factor);
        let hist = TAPS / self.factor;
        let mut out = 0;
        for &x in input {
            self.delay[self.pos] = x;
            for p in 0..self.factor {
                let mut acc = 0.0;
                let mut idx = self.pos;
                for k in 0..hist {
                    acc += self.taps[p + k * self.factor] * self.delay[idx];
                    idx = if idx == 0 { hist - 1 } else { idx - 1 };
                }
                output[out] = acc;
                out += 1;
            }
            self.pos = (self.pos + 1) % hist;
        }
    }

    /// Zero the delay line
    pub fn reset(&mut self) {
        self.delay = [0.0; INTERP_HISTORY];
        self.pos = 0;
    }
}

/// Zeroth-order modified Bessel function of the first kind (series sum)
fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half_x = x / 2.0;
    for k in 1..32 {
        term *= (half_x / k as f32) * (half_x / k as f32);
        sum += term;
        if term < 1e-9 * sum {
            break;
        }
    }
    sum
}

/// Kaiser window beta for a given stop-band attenuation
fn kaiser_beta(att_db: f32) -> f32 {
    if att_db > 50.0 {
        0.1102 * (att_db - 8.7)
    } else if att_db >= 21.0 {
        0.5842 * (att_db - 21.0).powf(0.4) + 0.078_86 * (att_db - 21.0)
    } else {
        0.0
    }
}

/// Design a Kaiser-windowed-sinc lowpass into `coeffs`.
///
/// `fc_hz` is the cutoff, `att_db` the stop-band attenuation target. The
/// result is normalized to unit DC gain.
pub fn design_lowpass(coeffs: &mut [f32], fc_hz: f32, att_db: f32, fs_hz: f32) {
    let n = coeffs.len();
    let m = (n - 1) as f32;
    let fc = (fc_hz / fs_hz).clamp(0.0, 0.5);
    let beta = kaiser_beta(att_db);
    let i0_beta = bessel_i0(beta);

    for (i, c) in coeffs.iter_mut().enumerate() {
        let x = i as f32 - m / 2.0;
        let sinc = if x.abs() < 1e-4 {
            2.0 * fc
        } else {
            (2.0 * PI * fc * x).sin() / (PI * x)
        };
        let r = 2.0 * i as f32 / m - 1.0;
        let window = bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / i0_beta;
        *c = sinc * window;
    }

    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-4 {
        for c in coeffs.iter_mut() {
            *c /= sum;
        }
    }
}

/// Design a real windowed-sinc band-pass (difference of two lowpasses)
pub fn design_bandpass(coeffs: &mut [f32], f_lo_hz: f32, f_hi_hz: f32, att_db: f32, fs_hz: f32) {
    let n = coeffs.len();
    let m = (n - 1) as f32;
    let fl = (f_lo_hz / fs_hz).clamp(0.0, 0.5);
    let fh = (f_hi_hz / fs_hz).clamp(0.0, 0.5);
    let beta = kaiser_beta(att_db);
    let i0_beta = bessel_i0(beta);

    for (i, c) in coeffs.iter_mut().enumerate() {
        let x = i as f32 - m / 2.0;
        let sinc = if x.abs() < 1e-4 {
            2.0 * (fh - fl)
        } else {
            ((2.0 * PI * fh * x).sin() - (2.0 * PI * fl * x).sin()) / (PI * x)
        };
        let r = 2.0 * i as f32 / m - 1.0;
        let window = bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / i0_beta;
        *c = sinc * window;
    }
}

/// Design the complex band-pass prototype used by the convolution mask.
///
/// A lowpass of half the pass-band width is modulated to the band center;
/// the result is a complex coefficient pair (I = cosine branch,
/// Q = sine branch). `f_lo_hz` and `f_hi_hz` are signed, so a negative
/// band selects the lower sideband.
pub fn design_complex_bandpass(
    coeffs_i: &mut [f32],
    coeffs_q: &mut [f32],
    f_lo_hz: f32,
    f_hi_hz: f32,
    fs_hz: f32,
) {
    debug_assert_eq!(coeffs_i.len(), coeffs_q.len());
    let n = coeffs_i.len();
    let m = (n - 1) as f32;
    let center = (f_lo_hz + f_hi_hz) / 2.0 / fs_hz;
    design_lowpass(coeffs_i, (f_hi_hz - f_lo_hz).abs() / 2.0, 110.0, fs_hz);

    for i in 0..n {
        let x = i as f32 - m / 2.0;
        let lp = coeffs_i[i];
        let theta = 2.0 * PI * center * x;
        coeffs_i[i] = lp * theta.cos();
        coeffs_q[i] = lp * theta.sin();
    }
}

/// Design a type-III Hilbert transformer (odd length recommended via even
/// taps with center skip handled below; here taps.len() is even and the
/// transformer is windowed around the center)
pub fn design_hilbert(coeffs: &mut [f32]) {
    let n = coeffs.len();
    let m = (n - 1) as f32;
    for (i, c) in coeffs.iter_mut().enumerate() {
        let x = i as f32 - m / 2.0;
        // Ideal Hilbert impulse response 2 sin^2(pi x / 2) / (pi x)
        let h = if x.abs() < 1e-4 {
            0.0
        } else {
            2.0 * (PI * x / 2.0).sin().powi(2) / (PI * x)
        };
        let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / m).cos();
        *c = h * window;
    }
}

/// Design the matched-delay branch for the Hilbert pair.
///
/// With an even tap count the group delay is fractional ((N-1)/2 samples),
/// so the companion branch is a windowed fractional-delay sinc rather than
/// a unit impulse. Both branches then share one group delay and differ by
/// 90 degrees across the band.
pub fn design_hilbert_delay(coeffs: &mut [f32]) {
    let n = coeffs.len();
    let m = (n - 1) as f32;
    for (i, c) in coeffs.iter_mut().enumerate() {
        let x = i as f32 - m / 2.0;
        let s = if x.abs() < 1e-4 {
            1.0
        } else {
            (PI * x).sin() / (PI * x)
        };
        let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / m).cos();
        *c = s * window;
    }
    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-6 {
        for c in coeffs.iter_mut() {
            *c /= sum;
        }
    }
}
