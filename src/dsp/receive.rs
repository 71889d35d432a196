//! Receive pipeline
//!
//! Ordered stage chain over one codec block: RF gain, IQ correction,
//! decimation by 4, quarter-rate translation, decimation by 2, fine-tune
//! NCO shift, overlap-and-save convolution band-pass, per-mode
//! demodulation, AGC, noise reduction, receive EQ, interpolation back to
//! the DAC rate, and the volume law.
//!
//! The quarter-rate translation sits between the two decimation stages,
//! so the rotation is a quarter of the stage-1 output rate (+12 kHz).
//! The tuned signal is parked 12 kHz below baseband center and the
//! stage-1 decimation filter's pass-band is sized to carry it.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::{
    volume_to_amplification, DECIMATED_BLOCK, DF, DF1, DF2, FFT_LENGTH, READ_BUFFER_SIZE,
};
use crate::dsp::agc::Agc;
use crate::dsp::block::SampleBlock;
use crate::dsp::cw_decode::CwDecoder;
use crate::dsp::fft::Cfft;
use crate::dsp::filter_bank::FilterBank;
use crate::dsp::modulation::{
    cw_audio_filter, demodulate_am, demodulate_ssb, SamDemod,
};
use crate::dsp::noise_reduction::NoiseReducer;
use crate::dsp::spectrum::{freq_shift_fs4, NcoShifter};
use crate::types::{Mode, NrSelection, ProcessError};

/// Tunable settings consumed by the receive chain each block
#[derive(Clone, Copy, Debug)]
pub struct ReceiveSettings {
    /// Demodulation mode
    pub mode: Mode,
    /// RF input gain in dB
    pub rf_gain_db: f32,
    /// IQ amplitude correction applied to I
    pub iq_amp_correction: f32,
    /// IQ phase correction mixed from I into Q
    pub iq_phase_correction: f32,
    /// Fine-tune offset (Hz)
    pub fine_tune_hz: f32,
    /// Mode-dependent audio offset (Hz), e.g. the CW tone
    pub offset_hz: f32,
    /// Noise-reduction selection
    pub nr: NrSelection,
    /// Receive equalizer engaged
    pub eq_enabled: bool,
    /// Receive equalizer gains (percent)
    pub eq_gains: [i32; crate::config::EQ_BANDS],
    /// CW audio filter index (past the table = off)
    pub cw_filter_index: usize,
    /// CW decoder enable
    pub decoder_enabled: bool,
    /// Audio volume 0..=100
    pub volume: i32,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Lsb,
            rf_gain_db: 0.0,
            iq_amp_correction: 1.0,
            iq_phase_correction: 0.0,
            fine_tune_hz: 0.0,
            offset_hz: 0.0,
            nr: NrSelection::Off,
            eq_enabled: false,
            eq_gains: [100; crate::config::EQ_BANDS],
            cw_filter_index: usize::MAX,
            decoder_enabled: false,
            volume: 50,
        }
    }
}

/// Receive chain state that persists across blocks
pub struct ReceiveChain {
    nco: NcoShifter,
    sam: SamDemod,
    fft: Cfft,
    last_i: [f32; DECIMATED_BLOCK],
    last_q: [f32; DECIMATED_BLOCK],
    conv_in: [f32; FFT_LENGTH * 2],
    conv_out: [f32; FFT_LENGTH * 2],
    scratch_a: [f32; READ_BUFFER_SIZE],
    scratch_b: [f32; READ_BUFFER_SIZE],
}

impl ReceiveChain {
    /// Create a chain with cold filter history
    #[must_use]
    pub fn new() -> Self {
        Self {
            nco: NcoShifter::new(),
            sam: SamDemod::new(),
            fft: Cfft::new(FFT_LENGTH),
            last_i: [0.0; DECIMATED_BLOCK],
            last_q: [0.0; DECIMATED_BLOCK],
            conv_in: [0.0; FFT_LENGTH * 2],
            conv_out: [0.0; FFT_LENGTH * 2],
            scratch_a: [0.0; READ_BUFFER_SIZE],
            scratch_b: [0.0; READ_BUFFER_SIZE],
        }
    }

    /// Run the full chain over one block in place.
    ///
    /// On entry the block holds one codec block of I/Q at the base rate;
    /// on success it holds speaker audio at the base rate. The CW decoder
    /// taps the demodulated audio when the mode is CW.
    ///
    /// # Errors
    /// `ShapeMismatch` when the block does not hold a full codec block.
    pub fn process(
        &mut self,
        block: &mut SampleBlock,
        bank: &mut FilterBank,
        agc: &mut Agc,
        nr: &mut NoiseReducer,
        cw: Option<&mut CwDecoder>,
        settings: &ReceiveSettings,
        now_ms: u64,
    ) -> Result<Option<char>, ProcessError> {
        block.expect_len(READ_BUFFER_SIZE)?;

        // RF gain and IQ correction
        let gain = 10.0f32.powf(settings.rf_gain_db / 20.0);
        let n = block.len();
        for k in 0..n {
            let i = block.i[k] * gain * settings.iq_amp_correction;
            let q = block.q[k] * gain + settings.iq_phase_correction * i;
            block.i[k] = i;
            block.q[k] = q;
        }

        // Decimate by 4, rotate by a quarter of the 48 kHz stage rate
        // (lands the tuned signal at DC), then decimate by 2
        self.decimate_by_4(block, bank)?;
        freq_shift_fs4(block);
        self.decimate_by_2(block, bank)?;

        // Fine tuning
        self.nco
            .shift(block, -(settings.fine_tune_hz + settings.offset_hz));

        // Band-pass by FFT convolution
        self.convolution_filter(block, bank)?;

        // Demodulate
        let mut decoded = None;
        match settings.mode {
            Mode::Lsb | Mode::Usb => demodulate_ssb(block),
            Mode::Am => demodulate_am(block, &mut bank.audio_lowpass),
            Mode::Sam => self.sam.process(block, &mut bank.audio_lowpass),
            Mode::Cw => {
                demodulate_ssb(block);
                if let Some(cw) = cw {
                    decoded = cw.process_block(block, now_ms, settings.decoder_enabled);
                }
                cw_audio_filter(block, bank, settings.cw_filter_index);
            }
        }

        // Gain management and audio shaping
        agc.process(block);
        nr.process(block, settings.nr);
        if settings.eq_enabled {
            let n = block.len();
            bank.eq_rx.process(&mut block.i[..n], n, &settings.eq_gains);
            block.copy_i_to_q();
        }

        // Back to the DAC rate
        self.interpolate(block, bank)?;

        // Volume law; the factor of DF makes up the interpolators'
        // zero-stuffing loss
        block.scale(DF as f32 * volume_to_amplification(settings.volume));
        Ok(decoded)
    }

    /// Receive decimation stage 1 (by 4)
    ///
    /// # Errors
    /// `ShapeMismatch` unless the block is a full codec block.
    pub fn decimate_by_4(
        &mut self,
        block: &mut SampleBlock,
        bank: &mut FilterBank,
    ) -> Result<(), ProcessError> {
        block.expect_len(READ_BUFFER_SIZE)?;
        let n = block.len();
        bank.decim1_i.process_in_place(&mut block.i, n);
        bank.decim1_q.process_in_place(&mut block.q, n);
        block.decimated(DF1);
        Ok(())
    }

    /// Receive decimation stage 2 (by 2)
    ///
    /// # Errors
    /// `ShapeMismatch` unless the block was decimated by stage 1.
    pub fn decimate_by_2(
        &mut self,
        block: &mut SampleBlock,
        bank: &mut FilterBank,
    ) -> Result<(), ProcessError> {
        block.expect_len(READ_BUFFER_SIZE / DF1)?;
        let n = block.len();
        bank.decim2_i.process_in_place(&mut block.i, n);
        bank.decim2_q.process_in_place(&mut block.q, n);
        block.decimated(DF2);
        Ok(())
    }

    /// Overlap-and-save convolution with the bank's frequency mask
    ///
    /// # Errors
    /// `ShapeMismatch` unless the block is fully decimated.
    pub fn convolution_filter(
        &mut self,
        block: &mut SampleBlock,
        bank: &FilterBank,
    ) -> Result<(), ProcessError> {
        block.expect_len(DECIMATED_BLOCK)?;
        let n = DECIMATED_BLOCK;

        // First half: previous block; second half: this block
        for k in 0..n {
            self.conv_in[2 * k] = self.last_i[k];
            self.conv_in[2 * k + 1] = self.last_q[k];
            self.conv_in[2 * (n + k)] = block.i[k];
            self.conv_in[2 * (n + k) + 1] = block.q[k];
        }
        self.last_i.copy_from_slice(&block.i[..n]);
        self.last_q.copy_from_slice(&block.q[..n]);

        self.fft.forward(&mut self.conv_in);

        let mask = bank.mask();
        for k in 0..FFT_LENGTH {
            let (ar, ai) = (self.conv_in[2 * k], self.conv_in[2 * k + 1]);
            let (br, bi) = (mask[2 * k], mask[2 * k + 1]);
            self.conv_out[2 * k] = ar * br - ai * bi;
            self.conv_out[2 * k + 1] = ar * bi + ai * br;
        }

        self.fft.inverse(&mut self.conv_out);

        // Keep the second half, discard the wrap-around
        for k in 0..n {
            block.i[k] = self.conv_out[2 * (n + k)];
            block.q[k] = self.conv_out[2 * (n + k) + 1];
        }
        Ok(())
    }

    /// Interpolate by 2 then 4 back to the DAC rate
    ///
    /// # Errors
    /// `ShapeMismatch` unless the block is fully decimated.
    pub fn interpolate(
        &mut self,
        block: &mut SampleBlock,
        bank: &mut FilterBank,
    ) -> Result<(), ProcessError> {
        block.expect_len(DECIMATED_BLOCK)?;
        let n = block.len();
        bank.interp1_i
            .process_block(&block.i[..n], &mut self.scratch_a[..n * DF2]);
        bank.interp1_q
            .process_block(&block.q[..n], &mut self.scratch_b[..n * DF2]);
        block.interpolated(DF2);

        let n = block.len();
        bank.interp2_i
            .process_block(&self.scratch_a[..n], &mut block.i[..n * DF1]);
        bank.interp2_q
            .process_block(&self.scratch_b[..n], &mut block.q[..n * DF1]);
        block.interpolated(DF1);
        Ok(())
    }

    /// Reset all cross-block state (overlap history, NCO phase, SAM PLL)
    pub fn reset(&mut self) {
        self.nco.reset();
        self.sam.reset();
        self.last_i = [0.0; DECIMATED_BLOCK];
        self.last_q = [0.0; DECIMATED_BLOCK];
    }
}

impl Default for ReceiveChain {
    fn default() -> Self {
        Self::new()
    }
}
