//! Dual-VFO bookkeeping
//!
//! Two independent tuners (A and B), each holding a center frequency and
//! a fine-tune offset, plus a per-band memory of the last (center, fine)
//! pair so band changes restore where the operator left off. The center
//! frequency carries the control protocol's quarter-rate offset
//! convention: `center = dial + sample_rate / 4`.

use crate::config::SAMPLE_RATE_HZ;
use crate::radio::bands::{band_for_frequency, BandInfo, NUMBER_OF_BANDS};
use crate::types::VfoId;

/// Per-VFO tuning state plus the band memories
#[derive(Clone, Copy, Debug)]
pub struct VfoState {
    /// Center frequency per VFO (Hz, includes the Fs/4 offset)
    pub center_hz: [i64; 2],
    /// Fine-tune offset per VFO (Hz)
    pub fine_tune_hz: [i64; 2],
    /// Band index per VFO
    pub band: [usize; 2],
    /// Last (center, fine) pair per band
    pub last_frequencies: [[i64; 2]; NUMBER_OF_BANDS],
    /// Which VFO the operator is using
    pub active: VfoId,
}

impl VfoState {
    /// Default 40m setup on both VFOs
    #[must_use]
    pub fn new(bands: &[BandInfo]) -> Self {
        let dial = 7_200_000i64;
        let center = dial + i64::from(SAMPLE_RATE_HZ / 4);
        let band = band_for_frequency(bands, dial as u32);
        let mut last_frequencies = [[0i64; 2]; NUMBER_OF_BANDS];
        for (k, slot) in last_frequencies.iter_mut().enumerate() {
            slot[0] = i64::from(bands[k].low_edge_hz) + i64::from(SAMPLE_RATE_HZ / 4);
            slot[1] = 0;
        }
        Self {
            center_hz: [center; 2],
            fine_tune_hz: [0; 2],
            band: [band; 2],
            last_frequencies,
            active: VfoId::A,
        }
    }

    /// Tune one VFO to a dial frequency: remembers the outgoing band's
    /// settings, re-derives the band, applies the Fs/4 center offset,
    /// and zeroes the fine tune.
    pub fn set_vfo(&mut self, bands: &[BandInfo], freq_hz: i64, vfo: VfoId) {
        let v = vfo.index();
        self.last_frequencies[self.band[v]][0] = self.center_hz[v];
        self.last_frequencies[self.band[v]][1] = self.fine_tune_hz[v];
        self.band[v] = band_for_frequency(bands, freq_hz.max(0) as u32);
        self.center_hz[v] = freq_hz + i64::from(SAMPLE_RATE_HZ / 4);
        self.fine_tune_hz[v] = 0;
    }

    /// Dial frequency of a VFO (center without the Fs/4 offset)
    #[must_use]
    pub fn dial_hz(&self, vfo: VfoId) -> i64 {
        self.center_hz[vfo.index()] - i64::from(SAMPLE_RATE_HZ / 4)
            + self.fine_tune_hz[vfo.index()]
    }

    /// Band index of the active VFO
    #[must_use]
    pub const fn active_band(&self) -> usize {
        self.band[self.active.index()]
    }

    /// Move the active VFO to an adjacent band, restoring that band's
    /// remembered frequencies
    pub fn step_band(&mut self, bands: &[BandInfo], up: bool) {
        let v = self.active.index();
        self.last_frequencies[self.band[v]][0] = self.center_hz[v];
        self.last_frequencies[self.band[v]][1] = self.fine_tune_hz[v];
        let next = if up {
            (self.band[v] + 1) % bands.len()
        } else {
            (self.band[v] + bands.len() - 1) % bands.len()
        };
        self.band[v] = next;
        self.center_hz[v] = self.last_frequencies[next][0];
        self.fine_tune_hz[v] = self.last_frequencies[next][1];
    }
}
