//! Audio I/O router
//!
//! The codec exposes four input channels (mic L/R, RX I/Q) and four
//! output channels (TX I/Q, speaker L/R). Each passes through a 4:1
//! mixer the core drives in a one-hot pattern: exactly one channel at
//! gain 1.0, the rest muted, or all four muted. Sample queues decouple
//! the codec interrupt from the block-rate loop; `begin`/`end` start and
//! stop flow per mode. The sidetone oscillator feeds mixer channel 2 of
//! the speaker path during CW transmit.
//!
//! Also here: the I²S sample-rate divider math for the codec clock.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use fixed::types::I1F15;
use heapless::Deque;

use crate::config::{READ_BUFFER_SIZE, SIDETONE_FREQUENCY_HZ};
use crate::dsp::block::SampleBlock;
use crate::radio::state::AudioRouting;
use crate::types::ProcessError;

/// Codec sample in Q1.15
pub type CodecSample = I1F15;

/// Convert a codec sample to float
#[must_use]
pub fn sample_to_f32(sample: CodecSample) -> f32 {
    sample.to_num::<f32>()
}

/// Convert a float to a codec sample, saturating
#[must_use]
pub fn f32_to_sample(value: f32) -> CodecSample {
    CodecSample::saturating_from_num(value)
}

/// 4:1 audio mixer modeled as four channel gains
#[derive(Clone, Copy, Debug, Default)]
pub struct Mixer4 {
    gains: [f32; 4],
}

impl Mixer4 {
    /// Select exactly one channel (gain 1.0), muting the other three
    pub fn select_channel(&mut self, channel: u8) {
        for (k, g) in self.gains.iter_mut().enumerate() {
            *g = if k == usize::from(channel) { 1.0 } else { 0.0 };
        }
    }

    /// Mute all four channels
    pub fn mute_all(&mut self) {
        self.gains = [0.0; 4];
    }

    /// Gain of one channel
    #[must_use]
    pub fn gain(&self, channel: u8) -> f32 {
        self.gains[usize::from(channel)]
    }
}

/// Queue depth in samples (two codec blocks)
const QUEUE_DEPTH: usize = 2 * READ_BUFFER_SIZE;

/// One direction of one codec channel
pub struct SampleQueue {
    samples: Deque<i16, QUEUE_DEPTH>,
    enabled: bool,
}

impl SampleQueue {
    /// Create a stopped, empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: Deque::new(),
            enabled: false,
        }
    }

    /// Start sample flow (clears any stale samples)
    pub fn begin(&mut self) {
        self.samples.clear();
        self.enabled = true;
    }

    /// Stop sample flow
    pub fn end(&mut self) {
        self.enabled = false;
    }

    /// Whether the queue is running
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Samples currently queued
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples are queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Enqueue raw codec samples (interrupt side). Disabled queues drop.
    pub fn push_samples(&mut self, samples: &[i16]) {
        if !self.enabled {
            return;
        }
        for &s in samples {
            // A full queue drops the oldest; the block loop missed its slot
            if self.samples.is_full() {
                let _ = self.samples.pop_front();
            }
            let _ = self.samples.push_back(s);
        }
    }

    /// Dequeue one block into floats scaled to [-1, +1)
    ///
    /// # Errors
    /// `NoInput` when fewer than `out.len()` samples are queued.
    pub fn pop_block(&mut self, out: &mut [f32]) -> Result<(), ProcessError> {
        if !self.enabled || self.samples.len() < out.len() {
            return Err(ProcessError::NoInput);
        }
        for v in out.iter_mut() {
            let s = self.samples.pop_front().unwrap_or(0);
            *v = sample_to_f32(CodecSample::from_bits(s));
        }
        Ok(())
    }

    /// Enqueue one block of floats as codec samples, saturating
    pub fn push_block(&mut self, input: &[f32]) {
        if !self.enabled {
            return;
        }
        for &v in input {
            if self.samples.is_full() {
                let _ = self.samples.pop_front();
            }
            let _ = self.samples.push_back(f32_to_sample(v).to_bits());
        }
    }

    /// Dequeue raw codec samples (host/DAC side)
    pub fn pop_samples(&mut self, out: &mut [i16]) -> usize {
        let mut n = 0;
        for v in out.iter_mut() {
            match self.samples.pop_front() {
                Some(s) => {
                    *v = s;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sidetone sine generator, gated by the CW transmit states
#[derive(Clone, Copy, Debug)]
pub struct SidetoneOscillator {
    phase: f32,
    /// Amplitude 0.0..=1.0
    pub amplitude: f32,
    gated_on: bool,
}

impl SidetoneOscillator {
    /// Create a muted oscillator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: 0.0,
            amplitude: 0.0,
            gated_on: false,
        }
    }

    /// Open or close the gate
    pub fn set_gate(&mut self, on: bool) {
        self.gated_on = on;
    }

    /// Whether the gate is open
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.gated_on
    }

    /// Fill `out` with sidetone (or silence when gated off)
    pub fn fill(&mut self, out: &mut [f32], sample_rate_hz: u32) {
        if !self.gated_on || self.amplitude <= 0.0 {
            out.fill(0.0);
            return;
        }
        let inc = 2.0 * core::f32::consts::PI * SIDETONE_FREQUENCY_HZ / sample_rate_hz as f32;
        for v in out.iter_mut() {
            *v = self.amplitude * self.phase.sin();
            self.phase += inc;
            if self.phase > 2.0 * core::f32::consts::PI {
                self.phase -= 2.0 * core::f32::consts::PI;
            }
        }
    }
}

impl Default for SidetoneOscillator {
    fn default() -> Self {
        Self::new()
    }
}

/// The full router: eight mixers, eight queues, and the sidetone
pub struct AudioRouter {
    /// Mic input mixers (exciter path), L/R
    pub mix_in_ex_l: Mixer4,
    /// Mic input mixer, right
    pub mix_in_ex_r: Mixer4,
    /// RX IQ input mixers, L/R
    pub mix_in_l: Mixer4,
    /// RX IQ input mixer, right
    pub mix_in_r: Mixer4,
    /// Speaker output mixers, L/R
    pub mix_out_l: Mixer4,
    /// Speaker output mixer, right
    pub mix_out_r: Mixer4,
    /// TX IQ output mixers, L/R
    pub mix_out_ex_l: Mixer4,
    /// TX IQ output mixer, right
    pub mix_out_ex_r: Mixer4,

    /// RX I input queue
    pub q_in_l: SampleQueue,
    /// RX Q input queue
    pub q_in_r: SampleQueue,
    /// Mic L input queue
    pub q_in_l_ex: SampleQueue,
    /// Mic R input queue
    pub q_in_r_ex: SampleQueue,
    /// Speaker L output queue
    pub q_out_l: SampleQueue,
    /// Speaker R output queue
    pub q_out_r: SampleQueue,
    /// TX I output queue
    pub q_out_l_ex: SampleQueue,
    /// TX Q output queue
    pub q_out_r_ex: SampleQueue,

    /// Sidetone generator on speaker mixer channel 2
    pub sidetone: SidetoneOscillator,
    /// Microphone gain (dB) applied on the mic pull
    pub mic_gain_db: i32,
}

impl AudioRouter {
    /// Create the router with everything muted and stopped
    #[must_use]
    pub fn new() -> Self {
        Self {
            mix_in_ex_l: Mixer4::default(),
            mix_in_ex_r: Mixer4::default(),
            mix_in_l: Mixer4::default(),
            mix_in_r: Mixer4::default(),
            mix_out_l: Mixer4::default(),
            mix_out_r: Mixer4::default(),
            mix_out_ex_l: Mixer4::default(),
            mix_out_ex_r: Mixer4::default(),
            q_in_l: SampleQueue::new(),
            q_in_r: SampleQueue::new(),
            q_in_l_ex: SampleQueue::new(),
            q_in_r_ex: SampleQueue::new(),
            q_out_l: SampleQueue::new(),
            q_out_r: SampleQueue::new(),
            q_out_l_ex: SampleQueue::new(),
            q_out_r_ex: SampleQueue::new(),
            sidetone: SidetoneOscillator::new(),
            mic_gain_db: 10,
        }
    }

    /// Apply a routing selection: start/stop queues, select or mute
    /// mixer channels, gate the sidetone. Idempotent.
    pub fn apply(&mut self, routing: AudioRouting) {
        match routing.rx_iq_input {
            Some(ch) => {
                if !self.q_in_l.is_enabled() {
                    self.q_in_l.begin();
                    self.q_in_r.begin();
                }
                self.mix_in_l.select_channel(ch);
                self.mix_in_r.select_channel(ch);
            }
            None => {
                self.q_in_l.end();
                self.q_in_r.end();
                self.mix_in_l.mute_all();
                self.mix_in_r.mute_all();
            }
        }

        match routing.mic_input {
            Some(ch) => {
                if !self.q_in_l_ex.is_enabled() {
                    self.q_in_l_ex.begin();
                    self.q_in_r_ex.begin();
                }
                self.mix_in_ex_l.select_channel(ch);
                self.mix_in_ex_r.select_channel(ch);
            }
            None => {
                self.q_in_l_ex.end();
                self.q_in_r_ex.end();
                self.mix_in_ex_l.mute_all();
                self.mix_in_ex_r.mute_all();
            }
        }

        match routing.speaker {
            Some(ch) => {
                if !self.q_out_l.is_enabled() {
                    self.q_out_l.begin();
                    self.q_out_r.begin();
                }
                self.mix_out_l.select_channel(ch);
                self.mix_out_r.select_channel(ch);
            }
            None => {
                self.mix_out_l.mute_all();
                self.mix_out_r.mute_all();
            }
        }

        match routing.tx_output {
            Some(ch) => {
                if !self.q_out_l_ex.is_enabled() {
                    self.q_out_l_ex.begin();
                    self.q_out_r_ex.begin();
                }
                self.mix_out_ex_l.select_channel(ch);
                self.mix_out_ex_r.select_channel(ch);
            }
            None => {
                self.mix_out_ex_l.mute_all();
                self.mix_out_ex_r.mute_all();
            }
        }

        self.sidetone.set_gate(routing.sidetone_on);
    }

    /// Pull one RX I/Q block from the codec queues
    ///
    /// # Errors
    /// `NoInput` when either queue cannot supply a full block.
    pub fn pull_rx_block(&mut self, block: &mut SampleBlock) -> Result<(), ProcessError> {
        let n = block.len();
        // Check both channels first so a short queue never leaves the
        // pair desynchronized
        if self.q_in_l.len() < n || self.q_in_r.len() < n {
            return Err(ProcessError::NoInput);
        }
        self.q_in_l.pop_block(&mut block.i[..n])?;
        self.q_in_r.pop_block(&mut block.q[..n])?;
        Ok(())
    }

    /// Pull one microphone block (mono, left channel) into I, zeroing Q,
    /// with the mic gain applied
    ///
    /// # Errors
    /// `NoInput` when the mic queue cannot supply a full block.
    pub fn pull_mic_block(&mut self, block: &mut SampleBlock) -> Result<(), ProcessError> {
        let n = block.len();
        self.q_in_l_ex.pop_block(&mut block.i[..n])?;
        let gain = 10.0f32.powf(self.mic_gain_db as f32 / 20.0);
        for v in &mut block.i[..n] {
            *v *= gain;
        }
        block.q[..n].fill(0.0);
        // Drain the unused right channel to keep the queues in step
        let mut discard = [0.0f32; 64];
        while !self.q_in_r_ex.is_empty() {
            let take = self.q_in_r_ex.len().min(discard.len());
            let _ = self.q_in_r_ex.pop_block(&mut discard[..take]);
        }
        Ok(())
    }

    /// Push speaker audio, or the sidetone when the speaker mixer has
    /// channel 2 selected
    pub fn push_speaker_block(&mut self, block: &SampleBlock) {
        let n = block.len();
        if self.sidetone.is_on() && self.mix_out_l.gain(2) > 0.0 {
            let mut tone = [0.0f32; READ_BUFFER_SIZE];
            self.sidetone.fill(&mut tone[..n], block.sample_rate_hz());
            self.q_out_l.push_block(&tone[..n]);
            self.q_out_r.push_block(&tone[..n]);
            return;
        }
        let gain = self.mix_out_l.gain(0);
        if gain > 0.0 {
            self.q_out_l.push_block(&block.i[..n]);
            self.q_out_r.push_block(&block.q[..n]);
        }
    }

    /// Push transmit I/Q
    pub fn push_tx_block(&mut self, block: &SampleBlock) {
        if self.mix_out_ex_l.gain(0) > 0.0 {
            let n = block.len();
            self.q_out_l_ex.push_block(&block.i[..n]);
            self.q_out_r_ex.push_block(&block.q[..n]);
        }
    }
}

impl Default for AudioRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// I²S clock programming for one sample rate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct I2sClockConfig {
    /// Integer part of the PLL multiplier
    pub c0: u32,
    /// Fractional numerator (denominator `c2`)
    pub c1: u32,
    /// Fractional denominator (10000)
    pub c2: u32,
    /// SAI pre-divider register value (n1 - 1)
    pub pre_divider: u32,
    /// SAI post-divider register value (n2 - 1)
    pub post_divider: u32,
}

/// The SAI divider pair for a sample rate
#[must_use]
pub const fn i2s_dividers(freq_hz: u32) -> (u32, u32) {
    // The PLL wants n1*n2 to be a multiple of 4; low rates need the
    // larger prescaler
    let n1 = if freq_hz > 8000 { 4 } else { 8 };
    let n2 = 1 + (24_000_000 * 27) / (freq_hz * 256 * n1);
    (n1, n2)
}

/// Compute the audio-clock configuration for a sample rate.
///
/// Returns `None` when the post-divider cannot fit its 6-bit field.
#[must_use]
pub fn set_i2s_freq(freq_hz: u32) -> Option<I2sClockConfig> {
    let (n1, n2) = i2s_dividers(freq_hz);
    if n2 > 63 {
        return None;
    }
    // C = freq*256*n1*n2 / 24 MHz, carried as an exact integer ratio
    let num = u64::from(freq_hz) * 256 * u64::from(n1) * u64::from(n2);
    let den = 24_000_000u64;
    let c0 = num / den;
    let c2 = 10_000u64;
    let c1 = (num * c2 + den / 2) / den - c0 * c2;
    Some(I2sClockConfig {
        c0: c0 as u32,
        c1: c1 as u32,
        c2: c2 as u32,
        pre_divider: n1 - 1,
        post_divider: n2 - 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::state::{audio_routing, ModeState};

    #[test]
    fn mixer_one_hot() {
        let mut mixer = Mixer4::default();
        mixer.select_channel(2);
        assert_eq!(mixer.gain(0), 0.0);
        assert_eq!(mixer.gain(2), 1.0);
        mixer.mute_all();
        assert_eq!(mixer.gain(2), 0.0);
    }

    #[test]
    fn queue_round_trip() {
        let mut queue = SampleQueue::new();
        queue.begin();
        let samples: [i16; 8] = [0, 8192, 16384, -16384, 32767, -32768, 1, -1];
        queue.push_samples(&samples);
        let mut out = [0.0f32; 8];
        queue.pop_block(&mut out).unwrap();
        assert!((out[1] - 0.25).abs() < 1e-4);
        assert!((out[2] - 0.5).abs() < 1e-4);
        assert!((out[3] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn empty_queue_reports_no_input() {
        let mut queue = SampleQueue::new();
        queue.begin();
        let mut out = [0.0f32; 4];
        assert_eq!(queue.pop_block(&mut out), Err(ProcessError::NoInput));
    }

    #[test]
    fn disabled_queue_drops_pushes() {
        let mut queue = SampleQueue::new();
        queue.push_samples(&[1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn routing_apply_receive_vs_transmit() {
        let mut router = AudioRouter::new();
        router.apply(audio_routing(ModeState::SsbReceive));
        assert!(router.q_in_l.is_enabled());
        assert!(!router.q_in_l_ex.is_enabled());
        assert_eq!(router.mix_out_l.gain(0), 1.0);
        assert_eq!(router.mix_out_ex_l.gain(0), 0.0);

        router.apply(audio_routing(ModeState::SsbTransmit));
        assert!(!router.q_in_l.is_enabled());
        assert!(router.q_in_l_ex.is_enabled());
        assert_eq!(router.mix_out_ex_l.gain(0), 1.0);
        assert_eq!(router.mix_out_l.gain(0), 0.0);
    }

    #[test]
    fn sidetone_gated_by_cw_mark() {
        let mut router = AudioRouter::new();
        router.apply(audio_routing(ModeState::SsbReceive));
        router.sidetone.amplitude = 0.2;
        router.apply(audio_routing(ModeState::CwTransmitMark));
        assert!(router.sidetone.is_on());
        assert_eq!(router.mix_out_l.gain(2), 1.0);

        let block = SampleBlock::new(256, 192_000);
        router.push_speaker_block(&block);
        let mut out = [0i16; 256];
        assert_eq!(router.q_out_l.pop_samples(&mut out), 256);
        let peak = out.iter().map(|v| v.abs()).max().unwrap();
        assert!(peak > 3000, "sidetone peak {peak}");
    }

    #[test]
    fn i2s_divider_boundaries() {
        assert_eq!(i2s_dividers(8000).0, 8);
        assert_eq!(i2s_dividers(8001).0, 4);
        // 8001 Hz with n1 = 4 needs n2 > 63, so programming fails
        assert!(set_i2s_freq(8001).is_none());
        let cfg = set_i2s_freq(192_000).unwrap();
        assert_eq!(cfg.pre_divider, 3);
        assert_eq!(cfg.c2, 10_000);
    }

    #[test]
    fn i2s_192k_values() {
        let (n1, n2) = i2s_dividers(192_000);
        assert_eq!((n1, n2), (4, 4));
        let cfg = set_i2s_freq(192_000).unwrap();
        // C = 192000*256*16/24e6 = 32.768
        assert_eq!(cfg.c0, 32);
        assert_eq!(cfg.c1, 7680);
    }
}
