//! System configuration and DSP constants
//!
//! Compile-time constants for the transceiver core: sample rates, block
//! sizes, FFT lengths, decimation factors, and the CW decoder tuning
//! values. All rate-dependent DSP state is sized from these.

/// Base I/Q sample rate delivered by the codec ADC (Hz)
pub const SAMPLE_RATE_HZ: u32 = 192_000;

/// Samples per codec block at the base rate
pub const READ_BUFFER_SIZE: usize = 2048;

/// First receive decimation factor (192 kHz -> 48 kHz)
pub const DF1: usize = 4;

/// Second receive decimation factor (48 kHz -> 24 kHz)
pub const DF2: usize = 2;

/// Overall receive decimation factor
pub const DF: usize = DF1 * DF2;

/// Block length after full decimation (256 samples @ 24 kHz)
pub const DECIMATED_BLOCK: usize = READ_BUFFER_SIZE / DF;

/// FFT length for the overlap-and-save convolution filter
pub const FFT_LENGTH: usize = 512;

/// Power-spectrum resolution (bins)
pub const SPECTRUM_RES: usize = 512;

/// First-order smoother coefficient applied across successive spectra
pub const SPECTRUM_LPF_COEFF: f32 = 0.7;

/// Zoom-FFT amplitude compensation per zoom level.
///
/// Measured behavior of the reference hardware; all unity.
pub const ZOOM_MULTIPLIER_COEFF: [f32; 5] = [1.0, 1.0, 1.0, 1.0, 1.0];

/// Minimum spectrum zoom exponent (zoom = 2^k)
pub const SPECTRUM_ZOOM_MIN: u32 = 0;

/// Maximum spectrum zoom exponent
pub const SPECTRUM_ZOOM_MAX: u32 = 4;

/// Number of taps in the second-stage and interpolation FIRs
pub const DECIM_FIR_TAPS: usize = 48;

/// Taps in the first receive decimation FIR; the narrower transition
/// keeps the quarter-rate-offset signal inside the pass-band while
/// still stopping before the 24 kHz fold-over
pub const DECIM1_FIR_TAPS: usize = 128;

/// Stop-band attenuation target for the decimation FIRs (dB)
pub const DECIM_ATT_DB: f32 = 90.0;

/// Pass-band width target for the second decimation stage and the
/// interpolators (Hz)
pub const DECIM_BW_HZ: f32 = 9_000.0;

/// Pass-band width target for the first decimation stage (Hz); must
/// cover the tuned signal at 12 kHz plus the widest audio pass-band
pub const DECIM1_BW_HZ: f32 = 18_000.0;

/// Taps in each half of the Hilbert phase-split pair
pub const HILBERT_TAPS: usize = 100;

/// Number of graphic-equalizer bands per path
pub const EQ_BANDS: usize = 14;

/// Biquad stages per equalizer band filter
pub const EQ_STAGES: usize = 2;

/// Audio output volume range
pub const VOLUME_MAX: i32 = 100;

/// CW decode histogram length; bins are milliseconds of mark/gap time.
/// The range covers 5 wpm (240 ms dah) with margin.
pub const HISTOGRAM_ELEMENTS: usize = 750;

/// Shortest mark accepted as a real CW element (ms); anything quicker
/// is treated as a noise hiccup
pub const LOWEST_ATOM_TIME_MS: i64 = 20;

/// Starting value of the Morse tree dash jump (tree is 128 entries)
pub const DECODER_TREE_JUMP: u8 = 128;

/// Histogram bin count above which the adaptive decay kicks in
pub const SCALE_CONSTANT: i32 = 25;

/// Decay multiplier applied to the signal histogram when it saturates
pub const ADAPTIVE_SCALE_FACTOR: f32 = 0.8;

/// Selectable CW tone offsets (Hz); index stored in configuration
pub const CW_TONE_OFFSETS_HZ: [f32; 5] = [562.5, 656.25, 750.0, 843.75, 937.5];

/// Default CW tone index (750 Hz)
pub const DEFAULT_CW_TONE_INDEX: usize = 2;

/// CW audio band-pass filter cutoffs (Hz); a sixth selection is Off
pub const CW_FILTER_CUTOFFS_HZ: [f32; 5] = [840.0, 1080.0, 1320.0, 1800.0, 2000.0];

/// Sidetone oscillator frequency during CW transmit (Hz)
pub const SIDETONE_FREQUENCY_HZ: f32 = 600.0;

/// PTT release debounce (ms)
pub const PTT_DEBOUNCE_MS: u64 = 250;

/// CW lock drop-out time: continuous no-tone time before `cw_locked`
/// deasserts (ms)
pub const CW_LOCK_DROPOUT_MS: u64 = 2000;

/// Capacity of the control-plane -> real-time-loop event queue
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Normalized AGC output target for all engaged profiles
pub const AGC_OUT_TARGET: f32 = 0.8985;

/// Audio volume to output amplification.
///
/// Quadratic taper: 0 -> 0.0, 100 -> 5.0, strictly monotone between.
#[must_use]
pub fn volume_to_amplification(volume: i32) -> f32 {
    let v = volume.clamp(0, VOLUME_MAX) as f32 / VOLUME_MAX as f32;
    5.0 * v * v
}
