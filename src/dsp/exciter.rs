//! Transmit (exciter) pipeline
//!
//! Microphone audio in, exciter I/Q out: three decimation stages down to
//! 12 ksps, transmit EQ, the Hilbert phase-split pair, sideband
//! selection, then three interpolation stages back up to the DAC rate
//! with explicit amplitude restoration, and finally the TX IQ
//! calibration mirror of the receive correction.

use crate::config::{DF1, DF2, EQ_BANDS, READ_BUFFER_SIZE, SAMPLE_RATE_HZ};
use crate::dsp::block::SampleBlock;
use crate::dsp::filter::{design_lowpass, FirDecimator, FirInterpolator};
use crate::dsp::filter_bank::FilterBank;
use crate::dsp::modulation::{sideband_select, HilbertPair};
use crate::types::{Mode, ProcessError};

/// Tunable settings consumed by the exciter each block
#[derive(Clone, Copy, Debug)]
pub struct TransmitSettings {
    /// Sideband selection (LSB is the arithmetic default)
    pub mode: Mode,
    /// Transmit equalizer engaged
    pub eq_enabled: bool,
    /// Transmit equalizer gains (percent)
    pub eq_gains: [i32; EQ_BANDS],
    /// TX IQ amplitude calibration applied to I
    pub iq_amp_correction: f32,
    /// TX IQ phase calibration mixed from I into Q
    pub iq_phase_correction: f32,
}

impl Default for TransmitSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Lsb,
            eq_enabled: false,
            eq_gains: [100; EQ_BANDS],
            iq_amp_correction: 1.0,
            iq_phase_correction: 0.0,
        }
    }
}

/// Exciter chain state that persists across blocks
pub struct ExciterChain {
    dec1_i: FirDecimator<48>,
    dec1_q: FirDecimator<48>,
    dec2_i: FirDecimator<48>,
    dec2_q: FirDecimator<48>,
    dec3_i: FirDecimator<48>,
    dec3_q: FirDecimator<48>,
    hilbert: HilbertPair,
    int3_i: FirInterpolator<48>,
    int3_q: FirInterpolator<48>,
    int1_i: FirInterpolator<48>,
    int1_q: FirInterpolator<48>,
    int2_i: FirInterpolator<48>,
    int2_q: FirInterpolator<48>,
    scratch_a: [f32; READ_BUFFER_SIZE],
    scratch_b: [f32; READ_BUFFER_SIZE],
}

impl ExciterChain {
    /// Design all six FIR stages for the base sample rate
    #[must_use]
    pub fn new() -> Self {
        let fs = SAMPLE_RATE_HZ as f32;
        let mut t = [0.0f32; 48];

        design_lowpass(&mut t, 10_000.0, 90.0, fs);
        let dec1 = t;
        design_lowpass(&mut t, 8_000.0, 90.0, fs / 4.0);
        let dec2 = t;
        design_lowpass(&mut t, 8_000.0, 90.0, fs / 8.0);
        let dec3 = t;
        design_lowpass(&mut t, 2_700.0, 90.0, fs / 8.0);
        let int3 = t;
        design_lowpass(&mut t, 8_000.0, 90.0, fs / 4.0);
        let int1 = t;
        design_lowpass(&mut t, 10_000.0, 90.0, fs);
        let int2 = t;

        Self {
            dec1_i: FirDecimator::new(dec1, DF1),
            dec1_q: FirDecimator::new(dec1, DF1),
            dec2_i: FirDecimator::new(dec2, DF2),
            dec2_q: FirDecimator::new(dec2, DF2),
            dec3_i: FirDecimator::new(dec3, DF2),
            dec3_q: FirDecimator::new(dec3, DF2),
            hilbert: HilbertPair::new(),
            int3_i: FirInterpolator::new(int3, DF2),
            int3_q: FirInterpolator::new(int3, DF2),
            int1_i: FirInterpolator::new(int1, DF2),
            int1_q: FirInterpolator::new(int1, DF2),
            int2_i: FirInterpolator::new(int2, DF1),
            int2_q: FirInterpolator::new(int2, DF1),
            scratch_a: [0.0; READ_BUFFER_SIZE],
            scratch_b: [0.0; READ_BUFFER_SIZE],
        }
    }

    /// Run the exciter over one block in place.
    ///
    /// On entry the block holds mono microphone audio in I at the base
    /// rate; on success it holds the transmit I/Q pair at the base rate.
    ///
    /// # Errors
    /// `ShapeMismatch` when the block does not hold a full codec block.
    pub fn process(
        &mut self,
        block: &mut SampleBlock,
        bank: &mut FilterBank,
        settings: &TransmitSettings,
    ) -> Result<(), ProcessError> {
        block.expect_len(READ_BUFFER_SIZE)?;

        // Down to 48 kHz, 24 kHz, then 12 kHz
        let n = block.len();
        self.dec1_i.process_in_place(&mut block.i, n);
        self.dec1_q.process_in_place(&mut block.q, n);
        block.decimated(DF1);

        let n = block.len();
        self.dec2_i.process_in_place(&mut block.i, n);
        self.dec2_q.process_in_place(&mut block.q, n);
        block.decimated(DF2);

        let n = block.len();
        self.dec3_i.process_in_place(&mut block.i, n);
        self.dec3_q.process_in_place(&mut block.q, n);
        block.decimated(DF2);

        // Voice shaping, then the analytic split and sideband choice
        if settings.eq_enabled {
            let n = block.len();
            bank.eq_tx.process(&mut block.i[..n], n, &settings.eq_gains);
        }
        self.hilbert.process(block);
        sideband_select(block, settings.mode);

        // Back up: 24 kHz, 48 kHz, 192 kHz, restoring amplitude at each hop
        let n = block.len();
        self.int3_i
            .process_block(&block.i[..n], &mut self.scratch_a[..n * DF2]);
        self.int3_q
            .process_block(&block.q[..n], &mut self.scratch_b[..n * DF2]);
        block.interpolated(DF2);
        let n = block.len();
        for k in 0..n {
            block.i[k] = self.scratch_a[k] * 2.0;
            block.q[k] = self.scratch_b[k] * 2.0;
        }

        self.int1_i
            .process_block(&block.i[..n], &mut self.scratch_a[..n * DF2]);
        self.int1_q
            .process_block(&block.q[..n], &mut self.scratch_b[..n * DF2]);
        block.interpolated(DF2);
        let n = block.len();
        for k in 0..n {
            block.i[k] = self.scratch_a[k] * 2.0;
            block.q[k] = self.scratch_b[k] * 2.0;
        }

        self.int2_i
            .process_block(&block.i[..n], &mut self.scratch_a[..n * DF1]);
        self.int2_q
            .process_block(&block.q[..n], &mut self.scratch_b[..n * DF1]);
        block.interpolated(DF1);
        let n = block.len();
        for k in 0..n {
            block.i[k] = self.scratch_a[k] * 4.0;
            block.q[k] = self.scratch_b[k] * 4.0;
        }

        // TX IQ calibration, mirror of the receive correction
        for k in 0..n {
            let i = block.i[k] * settings.iq_amp_correction;
            block.i[k] = i;
            block.q[k] += settings.iq_phase_correction * i;
        }
        Ok(())
    }

    /// Reset all delay lines
    pub fn reset(&mut self) {
        self.dec1_i.reset();
        self.dec1_q.reset();
        self.dec2_i.reset();
        self.dec2_q.reset();
        self.dec3_i.reset();
        self.dec3_q.reset();
        self.hilbert.reset();
        self.int3_i.reset();
        self.int3_q.reset();
        self.int1_i.reset();
        self.int1_q.reset();
        self.int2_i.reset();
        self.int2_q.reset();
    }
}

impl Default for ExciterChain {
    fn default() -> Self {
        Self::new()
    }
}
