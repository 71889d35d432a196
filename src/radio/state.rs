//! Operating-mode state machine
//!
//! Fourteen states covering receive, SSB transmit, the CW transmit
//! sub-states (straight key and keyer element timing), and the
//! calibration modes. Events arrive from the control plane (PTT, key
//! line, paddles, CAT, front panel) and are applied at block boundaries;
//! every transition yields the audio routing selection (the 6.3 truth
//! table) and the RF hardware mask for the new state.
//!
//! The machine never terminates; INIT hands over to SSB receive once
//! initialization completes.

use crate::config::PTT_DEBOUNCE_MS;

/// Operating-mode states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ModeState {
    /// Power-up state, everything muted
    #[default]
    Init,
    /// Receiving, SSB/AM family
    SsbReceive,
    /// Transmitting voice
    SsbTransmit,
    /// Receiving, CW
    CwReceive,
    /// Straight-key mark (key closed)
    CwTransmitMark,
    /// Straight-key space (key open, hang not yet elapsed)
    CwTransmitSpace,
    /// Keyer is sounding a dit
    CwTransmitDitMark,
    /// Keyer is sounding a dah
    CwTransmitDahMark,
    /// Keyer inter-element space
    CwTransmitKeyerSpace,
    /// Keyer waiting for the next paddle decision
    CwTransmitKeyerWait,
    /// Reference-frequency calibration
    CalibrateFrequency,
    /// Receive IQ balance calibration
    CalibrateRxIq,
    /// Transmit IQ calibration, carrier keyed
    CalibrateTxIqMark,
    /// Transmit IQ calibration, carrier off
    CalibrateTxIqSpace,
}

impl ModeState {
    /// True in any state that keys the transmitter
    #[must_use]
    pub const fn is_transmit(self) -> bool {
        matches!(
            self,
            Self::SsbTransmit
                | Self::CwTransmitMark
                | Self::CwTransmitDitMark
                | Self::CwTransmitDahMark
                | Self::CalibrateTxIqMark
        )
    }

    /// True in any CW state (receive or transmit)
    #[must_use]
    pub const fn is_cw(self) -> bool {
        matches!(
            self,
            Self::CwReceive
                | Self::CwTransmitMark
                | Self::CwTransmitSpace
                | Self::CwTransmitDitMark
                | Self::CwTransmitDahMark
                | Self::CwTransmitKeyerSpace
                | Self::CwTransmitKeyerWait
        )
    }

    /// True while plain receive processing should run
    #[must_use]
    pub const fn is_receive(self) -> bool {
        matches!(
            self,
            Self::SsbReceive | Self::CwReceive | Self::CalibrateRxIq | Self::CalibrateFrequency
        )
    }
}

/// Calibration procedure selector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalKind {
    /// Reference-frequency calibration
    Frequency,
    /// Receive IQ balance
    RxIq,
    /// Transmit IQ balance
    TxIq,
}

/// Externally-delivered events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeEvent {
    /// Initialization complete
    InitDone,
    /// PTT switch closed
    PttPressed,
    /// PTT switch opened
    PttReleased,
    /// Straight key closed
    KeyDown,
    /// Straight key opened
    KeyUp,
    /// Dit paddle closed
    KeyerDit,
    /// Dah paddle closed
    KeyerDah,
    /// Switch to CW operation
    ToCwMode,
    /// Switch to SSB operation
    ToSsbMode,
    /// Tuning changed (frequency or band)
    TuneChanged,
    /// Begin a calibration procedure
    CalStart(CalKind),
    /// Advance a calibration procedure
    CalStep,
    /// Calibration finished
    CalDone,
    /// State-specific timer expired
    Timeout,
}

/// Audio routing selection (the mode -> mixer truth table)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AudioRouting {
    /// Microphone input mixer channel, `None` = muted + queues stopped
    pub mic_input: Option<u8>,
    /// Receive IQ input mixer channel
    pub rx_iq_input: Option<u8>,
    /// Transmit IQ output mixer channel
    pub tx_output: Option<u8>,
    /// Speaker output mixer channel
    pub speaker: Option<u8>,
    /// Sidetone oscillator gate
    pub sidetone_on: bool,
}

/// RF hardware control mask emitted on every transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct HardwareMask {
    /// Transmit/receive relay (true = transmit)
    pub transmit: bool,
    /// Band-pass filter board selector
    pub bpf_band: u8,
    /// Low-pass filter board selector
    pub lpf_band: u8,
    /// Bypass the 100 W amplifier
    pub pa100_bypass: bool,
    /// Antenna selector
    pub antenna: u8,
}

/// Audio routing for a state, per the routing truth table
#[must_use]
pub fn audio_routing(state: ModeState) -> AudioRouting {
    match state {
        ModeState::SsbReceive
        | ModeState::CwReceive
        | ModeState::CalibrateRxIq
        | ModeState::CalibrateFrequency
        | ModeState::CalibrateTxIqSpace => AudioRouting {
            mic_input: None,
            rx_iq_input: Some(0),
            tx_output: None,
            speaker: Some(0),
            sidetone_on: false,
        },
        ModeState::SsbTransmit => AudioRouting {
            mic_input: Some(0),
            rx_iq_input: None,
            tx_output: Some(0),
            speaker: None,
            sidetone_on: false,
        },
        ModeState::CalibrateTxIqMark => AudioRouting {
            mic_input: Some(1),
            rx_iq_input: None,
            tx_output: Some(0),
            speaker: None,
            sidetone_on: false,
        },
        ModeState::CwTransmitMark
        | ModeState::CwTransmitDitMark
        | ModeState::CwTransmitDahMark => AudioRouting {
            mic_input: None,
            rx_iq_input: None,
            tx_output: None,
            speaker: Some(2),
            sidetone_on: true,
        },
        _ => AudioRouting::default(),
    }
}

/// RF hardware mask for a state and the active band
#[must_use]
pub fn hardware_mask(state: ModeState, band_index: usize) -> HardwareMask {
    HardwareMask {
        transmit: state.is_transmit(),
        bpf_band: band_index as u8,
        lpf_band: band_index as u8,
        pa100_bypass: !state.is_transmit(),
        antenna: 0,
    }
}

/// The mode state machine
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeSm {
    state: ModeState,
    last_ptt_change_ms: u64,
}

/// Result of dispatching one event
#[derive(Clone, Copy, Debug)]
pub struct Transition {
    /// State after the event
    pub state: ModeState,
    /// Whether the state changed (entry actions should run)
    pub changed: bool,
    /// Audio routing for the new state
    pub routing: AudioRouting,
}

impl ModeSm {
    /// Create the machine in INIT
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ModeState::Init,
            last_ptt_change_ms: 0,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ModeState {
        self.state
    }

    /// Dispatch one event. Unguarded events leave the state unchanged.
    pub fn dispatch(&mut self, event: ModeEvent, now_ms: u64) -> Transition {
        use ModeEvent as E;
        use ModeState as S;

        let next = match (self.state, event) {
            (S::Init, E::InitDone) => S::SsbReceive,

            (S::SsbReceive, E::PttPressed) => {
                self.last_ptt_change_ms = now_ms;
                S::SsbTransmit
            }
            // PTT release honors the debounce interval
            (S::SsbTransmit, E::PttReleased) => {
                if now_ms.saturating_sub(self.last_ptt_change_ms) >= PTT_DEBOUNCE_MS {
                    self.last_ptt_change_ms = now_ms;
                    S::SsbReceive
                } else {
                    S::SsbTransmit
                }
            }

            (S::SsbReceive, E::ToCwMode) => S::CwReceive,
            (S::CwReceive, E::ToSsbMode) => S::SsbReceive,

            // Straight key
            (S::CwReceive | S::CwTransmitSpace, E::KeyDown) => S::CwTransmitMark,
            (S::CwTransmitMark, E::KeyUp) => S::CwTransmitSpace,
            (S::CwTransmitSpace, E::Timeout) => S::CwReceive,

            // Keyer elements: marks end on their element timer, the
            // inter-element space ends on its own timer, then the wait
            // state accepts the next paddle or falls back to receive
            (S::CwReceive | S::CwTransmitKeyerWait, E::KeyerDit) => S::CwTransmitDitMark,
            (S::CwReceive | S::CwTransmitKeyerWait, E::KeyerDah) => S::CwTransmitDahMark,
            (S::CwTransmitDitMark | S::CwTransmitDahMark, E::Timeout) => S::CwTransmitKeyerSpace,
            (S::CwTransmitKeyerSpace, E::KeyerDit) => S::CwTransmitDitMark,
            (S::CwTransmitKeyerSpace, E::KeyerDah) => S::CwTransmitDahMark,
            (S::CwTransmitKeyerSpace, E::Timeout) => S::CwTransmitKeyerWait,
            (S::CwTransmitKeyerWait, E::Timeout) => S::CwReceive,

            // Calibration runs only from SSB receive
            (S::SsbReceive, E::CalStart(CalKind::Frequency)) => S::CalibrateFrequency,
            (S::SsbReceive, E::CalStart(CalKind::RxIq)) => S::CalibrateRxIq,
            (S::SsbReceive, E::CalStart(CalKind::TxIq)) => S::CalibrateTxIqMark,
            (S::CalibrateTxIqMark, E::CalStep) => S::CalibrateTxIqSpace,
            (S::CalibrateTxIqSpace, E::CalStep) => S::CalibrateTxIqMark,
            (
                S::CalibrateFrequency
                | S::CalibrateRxIq
                | S::CalibrateTxIqMark
                | S::CalibrateTxIqSpace,
                E::CalDone | E::Timeout,
            ) => S::SsbReceive,

            // Everything else is unguarded in this state
            _ => self.state,
        };

        let changed = next != self.state;
        self.state = next;
        Transition {
            state: next,
            changed,
            routing: audio_routing(next),
        }
    }
}
