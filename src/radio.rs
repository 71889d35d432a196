//! Radio control logic

/// Amateur band table with per-band operating settings
pub mod bands;

/// Dual-VFO bookkeeping
pub mod vfo;

/// Operating-mode state machine, audio routing and RF hardware masks
pub mod state;
