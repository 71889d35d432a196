//! Phoenix SDR Transceiver Core Library
//!
//! This library implements the signal-processing core of a Phoenix-class
//! software-defined amateur radio transceiver: the receive and transmit
//! DSP pipelines, the CW (Morse) decoder, the operating-mode state
//! machine, and the audio routing layer that ties them to the codec.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CONTROL LAYER                             │
//! │  Mode State Machine  │  CAT Protocol  │  Configuration       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      DSP LAYER                               │
//! │  Decimation │ Convolution Filter │ Demod │ AGC │ NR │ EQ     │
//! │  Spectrum (zoom FFT) │ CW Decode │ SSB Exciter               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    AUDIO I/O LAYER                           │
//! │  Codec Queues │ 4:1 Mixers │ Sidetone │ I²S Clock Math       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hardware drivers (codec init, GPIO, filter-board relays) live outside
//! this crate; the core talks to them only through the audio queues and
//! the hardware mask emitted by the mode state machine.
//!
//! # Design Principles
//!
//! - **Block-oriented**: one input block in, one output block out, per tick
//! - **Single owner**: every long-lived DSP state has exactly one owner
//! - **Events, not shared mutation**: the control plane posts events to a
//!   lock-free SPSC queue drained at block boundaries
//! - **Explicit error handling**: all fallible operations return `Result`

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

/// Digital Signal Processing
///
/// Filters, spectrum analysis, demodulation, AGC, noise reduction,
/// the CW decoder, and the receive/transmit pipelines.
pub mod dsp;

/// Radio Control Logic
///
/// Band table, VFO bookkeeping, and the operating-mode state machine.
pub mod radio;

/// Audio I/O Router
///
/// Codec sample queues, 4:1 mixer selection per mode, sidetone gating,
/// and the I²S sample-rate divider math.
pub mod audio_io;

/// Communication Protocols
///
/// CAT command parser and response formatting.
pub mod protocol;

/// Persisted configuration schema (JSON document)
#[cfg(feature = "std")]
pub mod storage;

/// Root transceiver object and the block-rate entry points
pub mod transceiver;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Monotonic millisecond clock abstraction
pub mod time;
