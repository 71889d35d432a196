//! Transceiver root object
//!
//! One initialization-time-allocated object owns every subsystem and is
//! passed by reference into each; there is no other shared state. The
//! host drives it through four entry points: `initialize_all`,
//! `step_block` (the real-time loop body), `handle_event` (control-plane
//! side of the lock-free event queue), and `shutdown`.
//!
//! Events are drained only at the top of `step_block`, so mode
//! transitions, mask swaps, and routing changes all land on block
//! boundaries; nothing inside a block can observe a half-applied change.

use heapless::spsc::Queue;

use crate::audio_io::AudioRouter;
use crate::config::{
    CW_TONE_OFFSETS_HZ, DF, EVENT_QUEUE_DEPTH, READ_BUFFER_SIZE, SAMPLE_RATE_HZ,
};
use crate::dsp::agc::Agc;
use crate::dsp::block::SampleBlock;
use crate::dsp::cw_decode::CwDecoder;
use crate::dsp::exciter::{ExciterChain, TransmitSettings};
use crate::dsp::filter_bank::FilterBank;
use crate::dsp::noise_reduction::NoiseReducer;
use crate::dsp::receive::{ReceiveChain, ReceiveSettings};
use crate::dsp::spectrum::{freq_shift_fs4, SpectrumState};
use crate::protocol::{CatContext, CatParser, CatResponse};
use crate::radio::bands::{BandInfo, NUMBER_OF_BANDS};
use crate::radio::state::{hardware_mask, HardwareMask, ModeEvent, ModeSm};
use crate::radio::vfo::VfoState;
use crate::time::BlockClock;
use crate::types::{Mode, ProcessError, RadioSettings};

/// What one block tick produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Receive path ran; a character may have been decoded and the PSD
    /// may have been refreshed
    Received {
        /// A new spectrum is available in `spectrum.psdnew`
        psd_ready: bool,
        /// Character completed by the CW decoder
        decoded: Option<char>,
    },
    /// Transmit path ran
    Transmitted,
    /// A CW transmit or idle state: only the sidetone/silence was fed
    Idle,
}

/// Presence flags for the external filter boards.
///
/// A board that fails to answer at init stays absent for the life of the
/// process; DSP continues, band switching for that path is held, and the
/// UI reads these flags from status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardStatus {
    /// Band-pass filter board answered at init
    pub bpf_present: bool,
    /// Low-pass filter board answered at init
    pub lpf_present: bool,
}

impl Default for BoardStatus {
    fn default() -> Self {
        Self {
            bpf_present: true,
            lpf_present: true,
        }
    }
}

/// The whole radio core
pub struct Transceiver {
    /// Runtime settings (the persisted-configuration root)
    pub settings: RadioSettings,
    /// Band table
    pub bands: [BandInfo; NUMBER_OF_BANDS],
    /// VFO state
    pub vfo: VfoState,
    /// Mode state machine
    pub mode_sm: ModeSm,
    /// All long-lived filter state
    pub bank: FilterBank,
    /// Spectrum engine
    pub spectrum: SpectrumState,
    /// Receive AGC
    pub agc: Agc,
    /// Noise reduction
    pub nr: NoiseReducer,
    /// CW detector/decoder
    pub cw: CwDecoder,
    /// Receive chain
    pub rx: ReceiveChain,
    /// Transmit chain
    pub tx: ExciterChain,
    /// Audio router
    pub router: AudioRouter,
    /// Block-driven clock
    pub clock: BlockClock,
    /// RF hardware mask for the current state
    pub hardware: HardwareMask,
    /// CAT byte parser
    pub cat: CatParser,
    /// Filter-board presence, reported by the hardware layer at init
    pub boards: BoardStatus,
    events: Queue<ModeEvent, EVENT_QUEUE_DEPTH>,
    block: SampleBlock,
    tap: SampleBlock,
}

impl Transceiver {
    /// Build and wire every subsystem; ends in SSB receive with the
    /// audio router applied.
    #[must_use]
    pub fn initialize_all() -> Self {
        let settings = RadioSettings::default();
        Self::from_settings(settings, crate::radio::bands::default_bands())
    }

    /// Build from restored settings and band table
    #[must_use]
    pub fn from_settings(settings: RadioSettings, bands: [BandInfo; NUMBER_OF_BANDS]) -> Self {
        let vfo = VfoState::new(&bands);
        let band = &bands[vfo.active_band()];
        let bank = FilterBank::new(
            settings.spectrum_zoom,
            band.f_lo_cut_hz as f32,
            band.f_hi_cut_hz as f32,
        );
        let audio_rate = SAMPLE_RATE_HZ / DF as u32;
        let mut agc = Agc::new();
        agc.init(settings.agc_profile, audio_rate);
        let cw = CwDecoder::new(settings.keyer_wpm, settings.cw_tone_index, audio_rate);
        let mut router = AudioRouter::new();
        router.mic_gain_db = settings.mic_gain_db;
        router.sidetone.amplitude = settings.sidetone_volume as f32 / 500.0;

        let mut radio = Self {
            settings,
            bands,
            vfo,
            mode_sm: ModeSm::new(),
            bank,
            spectrum: SpectrumState::new(),
            agc,
            nr: NoiseReducer::new(),
            cw,
            rx: ReceiveChain::new(),
            tx: ExciterChain::new(),
            router,
            clock: BlockClock::new(SAMPLE_RATE_HZ),
            hardware: HardwareMask::default(),
            cat: CatParser::new(),
            boards: BoardStatus::default(),
            events: Queue::new(),
            block: SampleBlock::new(READ_BUFFER_SIZE, SAMPLE_RATE_HZ),
            tap: SampleBlock::new(READ_BUFFER_SIZE, SAMPLE_RATE_HZ),
        };
        radio.nr.auto_notch = radio.settings.auto_notch;
        radio.apply_transition(ModeEvent::InitDone);
        radio
    }

    /// Restore from a persisted configuration document
    #[cfg(feature = "std")]
    #[must_use]
    pub fn from_config(doc: &crate::storage::ConfigDocument) -> Self {
        let mut settings = RadioSettings::default();
        let mut bands = crate::radio::bands::default_bands();
        let mut vfo = VfoState::new(&bands);
        doc.restore(&mut settings, &mut bands, &mut vfo);
        let mut radio = Self::from_settings(settings, bands);
        radio.vfo = vfo;
        radio.retune();
        radio
    }

    /// Post an event from the control plane. Events apply at the next
    /// block boundary; a full queue drops the event (and reports it).
    ///
    /// # Errors
    /// `DeadlineMissed` when the queue is full, which means the
    /// real-time loop has not run for many block periods.
    pub fn handle_event(&mut self, event: ModeEvent) -> Result<(), ProcessError> {
        self.events
            .enqueue(event)
            .map_err(|_| ProcessError::DeadlineMissed)
    }

    /// Feed one CAT byte; returns a response when a command completed
    pub fn cat_byte(&mut self, byte: u8) -> Option<CatResponse> {
        let mut parser = core::mem::take(&mut self.cat);
        let mut ctx = CatContext {
            settings: &mut self.settings,
            bands: &mut self.bands,
            vfo: &mut self.vfo,
            mode_sm: &mut self.mode_sm,
            now_ms: self.clock.now_ms(),
            tune_changed: false,
            mode_changed: false,
        };
        let response = parser.feed(byte, &mut ctx);
        let retune = ctx.tune_changed || ctx.mode_changed;
        self.cat = parser;
        if retune {
            self.retune();
        }
        response
    }

    /// Rebuild the pass-band-dependent filters after a tuning or mode
    /// change; the mask itself swaps in at the next block boundary.
    pub fn retune(&mut self) {
        let band = &self.bands[self.vfo.active_band()];
        let (lo, hi) = (band.f_lo_cut_hz as f32, band.f_hi_cut_hz as f32);
        self.bank.refresh_mask(lo, hi);
        self.bank.set_audio_lowpass(lo, hi);
        self.router.mic_gain_db = self.settings.mic_gain_db;
        self.router.sidetone.amplitude = self.settings.sidetone_volume as f32 / 500.0;
        self.nr.auto_notch = self.settings.auto_notch;
        let audio_rate = SAMPLE_RATE_HZ / DF as u32;
        self.agc.init(self.settings.agc_profile, audio_rate);
    }

    /// Record a filter board that did not answer at init.
    ///
    /// Sticky for the life of the process; DSP continues, the selector in
    /// the hardware mask holds its last value for that path.
    pub fn report_bus_absent(&mut self, bpf: bool, lpf: bool) -> ProcessError {
        if bpf {
            self.boards.bpf_present = false;
        }
        if lpf {
            self.boards.lpf_present = false;
        }
        ProcessError::BusAbsent
    }

    fn apply_transition(&mut self, event: ModeEvent) {
        let transition = self.mode_sm.dispatch(event, self.clock.now_ms());
        if transition.changed {
            self.router.apply(transition.routing);
            let mut mask = hardware_mask(transition.state, self.vfo.active_band());
            if !self.boards.bpf_present {
                mask.bpf_band = self.hardware.bpf_band;
            }
            if !self.boards.lpf_present {
                mask.lpf_band = self.hardware.lpf_band;
            }
            self.hardware = mask;
        }
    }

    fn receive_settings(&self) -> ReceiveSettings {
        let band = &self.bands[self.vfo.active_band()];
        let cw = self.mode_sm.state().is_cw();
        ReceiveSettings {
            mode: if cw { Mode::Cw } else { band.mode },
            rf_gain_db: (self.settings.rf_gain_db + band.rf_gain_db) as f32,
            iq_amp_correction: 1.0,
            iq_phase_correction: 0.0,
            fine_tune_hz: self.vfo.fine_tune_hz[self.vfo.active.index()] as f32,
            offset_hz: if cw {
                let idx = self.settings.cw_tone_index.min(CW_TONE_OFFSETS_HZ.len() - 1);
                CW_TONE_OFFSETS_HZ[idx]
            } else {
                0.0
            },
            nr: self.settings.nr_selection,
            eq_enabled: self.settings.eq_rx_on,
            eq_gains: self.settings.eq_rx_gains,
            cw_filter_index: self.settings.cw_filter_index,
            decoder_enabled: self.settings.decoder_flag,
            volume: self.settings.audio_volume,
        }
    }

    fn transmit_settings(&self) -> TransmitSettings {
        let band = &self.bands[self.vfo.active_band()];
        TransmitSettings {
            mode: band.mode,
            eq_enabled: self.settings.eq_tx_on,
            eq_gains: self.settings.eq_tx_gains,
            iq_amp_correction: 1.0,
            iq_phase_correction: 0.0,
        }
    }

    /// Run one block tick: drain events, commit any pending mask, then
    /// run whichever pipeline the current state calls for.
    ///
    /// # Errors
    /// `NoInput` when the active input queues cannot supply a block; the
    /// tick is lost (about 10.7 ms of audio) and the next one proceeds
    /// normally.
    pub fn step_block(&mut self) -> Result<StepOutcome, ProcessError> {
        while let Some(event) = self.events.dequeue() {
            self.apply_transition(event);
        }
        self.bank.commit_mask();

        let state = self.mode_sm.state();
        // Time advances with the codec whether or not we get samples
        self.clock.advance_samples(READ_BUFFER_SIZE as u64);

        if state.is_receive() {
            self.block.set_shape(READ_BUFFER_SIZE, SAMPLE_RATE_HZ);
            self.router.pull_rx_block(&mut self.block)?;

            // Spectrum tap ahead of decimation, centered for display
            self.tap.set_shape(READ_BUFFER_SIZE, SAMPLE_RATE_HZ);
            self.tap.i.copy_from_slice(&self.block.i);
            self.tap.q.copy_from_slice(&self.block.q);
            freq_shift_fs4(&mut self.tap);
            let psd_ready =
                self.spectrum
                    .zoom_fft_exe(&self.tap, self.settings.spectrum_zoom, &mut self.bank);

            let settings = self.receive_settings();
            let decoded = self.rx.process(
                &mut self.block,
                &mut self.bank,
                &mut self.agc,
                &mut self.nr,
                Some(&mut self.cw),
                &settings,
                self.clock.now_ms(),
            )?;
            self.router.push_speaker_block(&self.block);
            return Ok(StepOutcome::Received { psd_ready, decoded });
        }

        if matches!(
            state,
            crate::radio::state::ModeState::SsbTransmit
                | crate::radio::state::ModeState::CalibrateTxIqMark
        ) {
            self.block.set_shape(READ_BUFFER_SIZE, SAMPLE_RATE_HZ);
            self.router.pull_mic_block(&mut self.block)?;
            let settings = self.transmit_settings();
            self.tx.process(&mut self.block, &mut self.bank, &settings)?;
            self.router.push_tx_block(&self.block);
            return Ok(StepOutcome::Transmitted);
        }

        // CW transmit marks and idle states: the speaker path carries
        // sidetone (or silence); RF keying is the hardware mask's job
        self.block.set_shape(READ_BUFFER_SIZE, SAMPLE_RATE_HZ);
        self.router.push_speaker_block(&self.block);
        Ok(StepOutcome::Idle)
    }

    /// Persist and stop. Returns 0 on success per the host contract.
    #[cfg(feature = "std")]
    #[must_use]
    pub fn shutdown(&self) -> i32 {
        match self.capture_config().save() {
            Ok(_) => 0,
            Err(_) => 1,
        }
    }

    /// Snapshot the current configuration for persistence
    #[cfg(feature = "std")]
    #[must_use]
    pub fn capture_config(&self) -> crate::storage::ConfigDocument {
        crate::storage::ConfigDocument::capture(&self.settings, &self.bands, &self.vfo)
    }
}

impl Default for Transceiver {
    fn default() -> Self {
        Self::initialize_all()
    }
}
