//! CW tone detection and Morse decoding
//!
//! The detector runs per 256-sample block at the decimated audio rate:
//! a band-pass FIR around the configured tone, then two independent
//! measures - the maximum of a cross-correlation against a reference
//! sinusoid, and the Goertzel magnitude at the tone frequency. Their
//! product gates a logical keyed/unkeyed level that drives the decoder.
//!
//! The decoder is a six-state machine timing marks and gaps in
//! milliseconds. Two histograms (mark lengths, gap lengths) adapt the
//! dit/dah classification threshold to the sender's fist; the character
//! lookup walks a flat binary-tree prefix table (dit steps one entry,
//! dah jumps by a halving stride).

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::{
    ADAPTIVE_SCALE_FACTOR, CW_LOCK_DROPOUT_MS, CW_TONE_OFFSETS_HZ, DECIMATED_BLOCK,
    DECODER_TREE_JUMP, HISTOGRAM_ELEMENTS, LOWEST_ATOM_TIME_MS, SCALE_CONSTANT,
};
use crate::dsp::block::SampleBlock;
use crate::dsp::filter::{design_bandpass, FirFilter};

/// Flat binary-tree prefix encoding of the Morse alphabet. Dit descends
/// by one entry, dah by the current jump (halved per level).
const MORSE_TREE: &[u8; 129] =
    b"-EISH5--4--V---3--UF--------?-2--ARL---------.--.WP------J---1--TNDB6--.--X/-----KC------Y------MGZ7----,Q------O-8------9--0----";

/// Detector FIR length
const DECODE_FIR_TAPS: usize = 64;

/// Decoder states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum DecodeState {
    /// Waiting for a signal edge; also times gaps
    #[default]
    Idle,
    /// Signal present, timing the mark
    TimingMark,
    /// A timed mark is ready to classify as dit or dah
    Classify,
    /// Character gap elapsed; emit the looked-up character
    EmitChar,
    /// Word gap elapsed; emit a blank
    EmitBlank,
}

/// CW detector + decoder state
pub struct CwDecoder {
    fir: FirFilter<DECODE_FIR_TAPS>,
    sin_buffer: [f32; DECIMATED_BLOCK],
    filt_buffer: [f32; DECIMATED_BLOCK],
    tone_hz: f32,
    ave_corr: f32,
    last_tone_ms: u64,
    /// Tone detector lock indicator
    pub cw_locked: bool,

    state: DecodeState,
    signal_start: i64,
    signal_end: i64,
    gap_length: i64,
    signal_elapsed: i64,
    dash_jump: u8,
    decoder_index: u8,
    char_in_progress: bool,
    blank_printed: bool,

    /// Current dit length estimate (ms)
    pub dit_length: i64,
    /// Current dah length estimate (ms)
    pub dah_length: i64,
    threshold_geometric_mean: f32,
    ave_dit: i64,
    ave_dah: i64,
    signal_histogram: [i32; HISTOGRAM_ELEMENTS],
    gap_histogram: [i32; HISTOGRAM_ELEMENTS],
    gap_atom: i64,
    gap_char: i64,
    histogram_time_ms: i64,
    val_flag: bool,
    val_ref1: i64,
    val_ref2: i64,
    gap_ref1: i64,
    signal_start_old: i64,
}

impl CwDecoder {
    /// Create a decoder for the given sending speed and tone selection.
    ///
    /// `sample_rate_hz` is the decimated audio rate the detector sees.
    #[must_use]
    pub fn new(wpm: u32, tone_index: usize, sample_rate_hz: u32) -> Self {
        let tone_hz = CW_TONE_OFFSETS_HZ[tone_index.min(CW_TONE_OFFSETS_HZ.len() - 1)];
        let mut sin_buffer = [0.0; DECIMATED_BLOCK];
        let phs = 2.0 * core::f32::consts::PI * tone_hz / sample_rate_hz as f32;
        for (k, v) in sin_buffer.iter_mut().enumerate() {
            *v = (k as f32 * phs).sin();
        }

        let mut taps = [0.0f32; DECODE_FIR_TAPS];
        design_bandpass(
            &mut taps,
            tone_hz - 150.0,
            tone_hz + 150.0,
            60.0,
            sample_rate_hz as f32,
        );

        let mut decoder = Self {
            fir: FirFilter::new(taps),
            sin_buffer,
            filt_buffer: [0.0; DECIMATED_BLOCK],
            tone_hz,
            ave_corr: 0.0,
            last_tone_ms: 0,
            cw_locked: false,
            state: DecodeState::Idle,
            signal_start: 0,
            signal_end: 0,
            gap_length: 0,
            signal_elapsed: 0,
            dash_jump: DECODER_TREE_JUMP,
            decoder_index: 0,
            char_in_progress: false,
            blank_printed: false,
            dit_length: 80,
            dah_length: 240,
            threshold_geometric_mean: 160.0,
            ave_dit: 80,
            ave_dah: 240,
            signal_histogram: [0; HISTOGRAM_ELEMENTS],
            gap_histogram: [0; HISTOGRAM_ELEMENTS],
            gap_atom: 80,
            gap_char: 240,
            histogram_time_ms: 0,
            val_flag: false,
            val_ref1: 0,
            val_ref2: 0,
            gap_ref1: 0,
            signal_start_old: 0,
        };
        decoder.reset_histograms();
        decoder.set_dit_length(wpm);
        decoder
    }

    /// Reference sinusoid (exposed for verification)
    #[must_use]
    pub fn sin_buffer(&self) -> &[f32; DECIMATED_BLOCK] {
        &self.sin_buffer
    }

    /// Seed the dit length from a words-per-minute setting
    pub fn set_dit_length(&mut self, wpm: u32) {
        if wpm > 0 {
            self.dit_length = i64::from(1200 / wpm);
        }
    }

    /// Current speed estimate in words per minute
    #[must_use]
    pub fn current_wpm(&self) -> u32 {
        (1200 / self.dit_length.max(1)) as u32
    }

    /// Restore the 15 wpm starting estimates and clear both histograms
    pub fn reset_histograms(&mut self) {
        self.gap_atom = 80;
        self.dit_length = 80;
        self.gap_char = 240;
        self.dah_length = 240;
        // Simple mean to start so the threshold is never zero
        self.threshold_geometric_mean = 160.0;
        self.ave_dit = self.dit_length;
        self.ave_dah = self.dah_length;
        self.val_ref1 = 0;
        self.val_ref2 = 0;
        self.signal_histogram = [0; HISTOGRAM_ELEMENTS];
        self.gap_histogram = [0; HISTOGRAM_ELEMENTS];
    }

    /// Run the tone detector over one demodulated block and, when the
    /// decoder is enabled, advance the decode state machine. Returns a
    /// character when one is completed.
    pub fn process_block(
        &mut self,
        block: &SampleBlock,
        now_ms: u64,
        decoder_enabled: bool,
    ) -> Option<char> {
        let n = block.len().min(DECIMATED_BLOCK);
        self.fir
            .process_block(&block.i[..n], &mut self.filt_buffer[..n]);

        if !decoder_enabled {
            return None;
        }

        let corr = self.correlation_max(n);
        self.ave_corr = 0.7 * corr + 0.3 * self.ave_corr;
        let goertzel = goertzel_mag(
            &self.filt_buffer[..n],
            self.tone_hz,
            block.sample_rate_hz(),
        );
        let combined = 10.0 * self.ave_corr * 100.0 * goertzel;

        let audio_level = if combined > 50.0 {
            self.cw_locked = true;
            self.last_tone_ms = now_ms;
            1u8
        } else {
            if now_ms.saturating_sub(self.last_tone_ms) > CW_LOCK_DROPOUT_MS {
                self.cw_locked = false;
            }
            0u8
        };

        self.decode(audio_level, now_ms as i64)
    }

    /// Cross-correlation of the filtered buffer against the reference
    /// sinusoid; returns the maximum over all lags
    fn correlation_max(&self, n: usize) -> f32 {
        let mut best = 0.0f32;
        for lag in 0..(2 * n - 1) {
            // Standard full correlation indexing: output lag k sums
            // a[j] * b[j + n - 1 - k] over the overlap
            let shift = lag as isize - (n as isize - 1);
            let mut acc = 0.0;
            for j in 0..n {
                let bj = j as isize - shift;
                if bj >= 0 && (bj as usize) < n {
                    acc += self.filt_buffer[j] * self.sin_buffer[bj as usize];
                }
            }
            if acc > best {
                best = acc;
            }
        }
        best
    }

    /// One step of the decode state machine
    #[allow(clippy::too_many_lines)]
    fn decode(&mut self, audio_value: u8, now: i64) -> Option<char> {
        match self.state {
            DecodeState::Idle => {
                if audio_value == 1 {
                    // Time-stamp the mark and map the preceding gap
                    self.signal_start = now;
                    self.state = DecodeState::TimingMark;
                    self.gap_length = self.signal_start - self.signal_end;
                    if self.gap_length > LOWEST_ATOM_TIME_MS
                        && (self.gap_length as f32) < self.threshold_geometric_mean * 3.0
                        && self.signal_start - self.histogram_time_ms > 5000
                    {
                        self.do_gap_histogram(self.gap_length);
                        self.histogram_time_ms = self.signal_start;
                    }
                    return None;
                }
                let inter_element_gap = now - self.signal_end;
                if inter_element_gap as f32 > self.dit_length as f32 * 1.95
                    && self.char_in_progress
                {
                    self.state = DecodeState::EmitChar;
                    return self.decode(audio_value, now);
                }
                if inter_element_gap as f32 > self.dit_length as f32 * 4.5
                    && !self.blank_printed
                    && !self.char_in_progress
                {
                    self.state = DecodeState::EmitBlank;
                    return self.decode(audio_value, now);
                }
                None
            }

            DecodeState::TimingMark => {
                if audio_value == 0 {
                    self.signal_elapsed = now - self.signal_start;
                    if self.signal_elapsed < LOWEST_ATOM_TIME_MS {
                        // A hiccup, not a mark
                        self.state = DecodeState::Idle;
                        return None;
                    }
                    if self.signal_elapsed < HISTOGRAM_ELEMENTS as i64
                        && now - self.histogram_time_ms > 5000
                    {
                        self.do_signal_histogram(self.signal_elapsed, now);
                        self.histogram_time_ms = now;
                    }
                    self.signal_end = now;
                    self.state = DecodeState::Classify;
                    return self.decode(audio_value, now);
                }
                None
            }

            DecodeState::Classify => {
                if self.signal_elapsed as f32 > 0.5 * self.dit_length as f32 {
                    self.dash_jump >>= 1;
                    if (self.signal_elapsed as f32) < self.threshold_geometric_mean {
                        self.decoder_index += 1;
                    } else {
                        self.decoder_index =
                            self.decoder_index.saturating_add(self.dash_jump);
                    }
                    self.char_in_progress = true;
                }
                self.state = DecodeState::Idle;
                None
            }

            DecodeState::EmitChar => {
                let ch = MORSE_TREE[usize::from(self.decoder_index) % MORSE_TREE.len()];
                self.decoder_index = 0;
                self.dash_jump = DECODER_TREE_JUMP;
                self.char_in_progress = false;
                self.blank_printed = false;
                self.state = DecodeState::Idle;
                Some(ch as char)
            }

            DecodeState::EmitBlank => {
                self.blank_printed = true;
                self.state = DecodeState::Idle;
                Some(' ')
            }
        }
    }

    /// Map a gap duration into the tri-modal gap histogram and refresh
    /// the gap cluster estimates
    fn do_gap_histogram(&mut self, gap_len: i64) {
        let bin = gap_len as usize;
        if bin >= HISTOGRAM_ELEMENTS {
            return;
        }
        if self.gap_histogram[bin] > 10 {
            for v in &mut self.gap_histogram {
                *v = (0.8 * *v as f32) as i32;
            }
        }
        self.gap_histogram[bin] += 1;

        let threshold = self.threshold_geometric_mean as usize;
        if gap_len as f32 <= self.threshold_geometric_mean {
            let (_, atom_index) =
                clustered_array_max(&self.gap_histogram[..threshold.min(HISTOGRAM_ELEMENTS)], 1);
            if atom_index > 0 {
                self.gap_atom = atom_index as i64;
            }
        } else if gap_len as f32 <= self.threshold_geometric_mean * 2.0 {
            let hi = (threshold * 3).min(HISTOGRAM_ELEMENTS);
            let (_, char_index) =
                clustered_array_max(&self.gap_histogram[threshold + 1..hi], 3);
            if char_index > 0 {
                self.gap_char = (char_index + threshold + 1) as i64;
            }
        }
    }

    /// Map a mark duration into the bi-modal mark histogram, refresh the
    /// dit/dah estimates, and adapt the geometric-mean threshold
    fn do_signal_histogram(&mut self, val: i64, now: i64) {
        let compare_factor = 2.0f32;

        if !self.val_flag {
            self.val_ref1 = self.signal_elapsed;
            self.signal_start_old = now;
            self.val_flag = true;
        } else if now - self.signal_start_old > LOWEST_ATOM_TIME_MS {
            self.gap_ref1 = self.gap_length;
            self.val_ref2 = self.signal_elapsed;
            self.val_flag = false;
        }

        // Consecutive marks in roughly dit:dah ratio refine the averages
        let v1 = self.val_ref1 as f32;
        let v2 = self.val_ref2 as f32;
        let g1 = self.gap_ref1 as f32;
        if (v2 >= v1 * compare_factor && g1 <= v1 * compare_factor)
            || (v1 >= v2 * compare_factor && g1 <= v2 * compare_factor)
        {
            if self.val_ref2 >= self.val_ref1 {
                self.ave_dit = (0.9 * self.ave_dit as f32 + 0.1 * v1) as i64;
                self.ave_dah = (0.9 * self.ave_dah as f32 + 0.1 * v2) as i64;
            } else {
                self.ave_dit = (0.9 * self.ave_dit as f32 + 0.1 * v2) as i64;
                self.ave_dah = (0.9 * self.ave_dah as f32 + 0.1 * v1) as i64;
            }
        }
        self.threshold_geometric_mean = ((self.ave_dit * self.ave_dah) as f32).sqrt();

        let bin = (val as usize).min(HISTOGRAM_ELEMENTS - 1);
        self.signal_histogram[bin] += 1;

        let offset = (self.threshold_geometric_mean as usize - 1).min(HISTOGRAM_ELEMENTS - 1);

        // Dits cluster below the geometric mean, dahs above it; the dah
        // search uses the wider spread for its higher variance
        let (temp_dit, dit_index) = clustered_array_max(&self.signal_histogram[..offset], 1);
        if dit_index > 0 {
            self.dit_length = dit_index as i64;
        }
        let (temp_dah, dah_index) = clustered_array_max(&self.signal_histogram[offset..], 3);
        if dah_index > 0 {
            self.dah_length = (dah_index + offset) as i64;
        }

        if temp_dit > SCALE_CONSTANT && temp_dah > SCALE_CONSTANT {
            for v in &mut self.signal_histogram {
                *v = (ADAPTIVE_SCALE_FACTOR * *v as f32) as i32;
            }
        }
    }
}

/// Clustered maximum search: each candidate bin scores the sum of itself
/// and `spread` neighbours on each side; returns (bin value, index) of
/// the best cluster center, or (0, 0) when nothing qualifies.
fn clustered_array_max(array: &[i32], spread: usize) -> (i32, usize) {
    let mut clustered_max = 0;
    let mut clustered_index = 0usize;
    if array.len() <= 2 * spread {
        return (0, 0);
    }
    for i in spread..array.len() - spread {
        let mut temp = 0;
        for j in i - spread..=i + spread {
            temp += array[j];
        }
        if temp >= clustered_max && temp > 0 {
            clustered_max = temp;
            clustered_index = i;
        }
    }
    if clustered_index > 0 {
        (array[clustered_index], clustered_index)
    } else {
        (0, 0)
    }
}

/// Goertzel magnitude of `data` at `target_hz`.
///
/// Single-bin DFT with the conventional N/2 scaling, so a unit sinusoid
/// at the target frequency reports magnitude about 1.
#[must_use]
pub fn goertzel_mag(data: &[f32], target_hz: f32, sampling_rate_hz: u32) -> f32 {
    let num_samples = data.len() as f32;
    let scaling_factor = num_samples / 2.0;
    let k = (0.5 + num_samples * target_hz / sampling_rate_hz as f32) as i32;
    let omega = 2.0 * core::f32::consts::PI * k as f32 / num_samples;
    let sine = omega.sin();
    let cosine = omega.cos();
    let coeff = 2.0 * cosine;
    let mut q0;
    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;
    for &x in data {
        q0 = coeff * q1 - q2 + x;
        q2 = q1;
        q1 = q0;
    }
    let real = (q1 - q2 * cosine) / scaling_factor;
    let imag = (q2 * sine) / scaling_factor;
    (real * real + imag * imag).sqrt()
}
