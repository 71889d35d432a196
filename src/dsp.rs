//! Digital signal processing modules

/// Sample-block carrier shared by every pipeline stage
pub mod block;

/// Portable complex FFT kernels (256/512 point) and fast log10
pub mod fft;

/// Biquad and FIR primitives plus filter design helpers
pub mod filter;

/// Owner of all long-lived filter state, including the convolution mask
pub mod filter_bank;

/// Power-spectrum computation with the zoom-FFT front end
pub mod spectrum;

/// Five-profile automatic gain control
pub mod agc;

/// Selectable noise-reduction algorithms
pub mod noise_reduction;

/// 14-band graphic equalizer (receive and transmit paths)
pub mod equalizer;

/// Demodulators and the SSB generation kernels
pub mod modulation;

/// CW tone detection and Morse decoding
pub mod cw_decode;

/// Receive pipeline (ADC block in, speaker block out)
pub mod receive;

/// Transmit pipeline (microphone block in, exciter I/Q out)
pub mod exciter;
