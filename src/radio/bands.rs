//! Amateur band table
//!
//! Per-band operating state: display label, band edges, the audio
//! pass-band (signed edges - negative bounds select the lower sideband),
//! demodulation mode, and gain settings. The pass-band edges feed the
//! convolution mask builder; `f_hi_cut >= f_lo_cut` always holds.

use crate::types::Mode;

/// Number of bands in the table
pub const NUMBER_OF_BANDS: usize = 7;

/// Index of the 30m band; CW mode defaults flip from LSB to USB here
pub const BAND_30M: usize = 3;

/// One band's operating state
#[derive(Clone, Copy, Debug)]
pub struct BandInfo {
    /// Display label
    pub name: &'static str,
    /// Lower band edge (Hz)
    pub low_edge_hz: u32,
    /// Upper band edge (Hz)
    pub high_edge_hz: u32,
    /// Audio pass-band low cut (Hz, signed)
    pub f_lo_cut_hz: i32,
    /// Audio pass-band high cut (Hz, signed)
    pub f_hi_cut_hz: i32,
    /// Demodulation mode
    pub mode: Mode,
    /// RF gain setting (dB)
    pub rf_gain_db: i32,
}

impl BandInfo {
    /// Pass-band invariant check
    #[must_use]
    pub const fn passband_valid(&self) -> bool {
        self.f_hi_cut_hz >= self.f_lo_cut_hz
    }
}

/// Construct the default band table
#[must_use]
pub fn default_bands() -> [BandInfo; NUMBER_OF_BANDS] {
    [
        BandInfo {
            name: "80M",
            low_edge_hz: 3_500_000,
            high_edge_hz: 4_000_000,
            f_lo_cut_hz: -3000,
            f_hi_cut_hz: -200,
            mode: Mode::Lsb,
            rf_gain_db: 0,
        },
        BandInfo {
            name: "60M",
            low_edge_hz: 5_330_000,
            high_edge_hz: 5_410_000,
            f_lo_cut_hz: -3000,
            f_hi_cut_hz: -200,
            mode: Mode::Lsb,
            rf_gain_db: 0,
        },
        BandInfo {
            name: "40M",
            low_edge_hz: 7_000_000,
            high_edge_hz: 7_300_000,
            f_lo_cut_hz: -3000,
            f_hi_cut_hz: -200,
            mode: Mode::Lsb,
            rf_gain_db: 0,
        },
        BandInfo {
            name: "30M",
            low_edge_hz: 10_100_000,
            high_edge_hz: 10_150_000,
            f_lo_cut_hz: 200,
            f_hi_cut_hz: 3000,
            mode: Mode::Usb,
            rf_gain_db: 0,
        },
        BandInfo {
            name: "20M",
            low_edge_hz: 14_000_000,
            high_edge_hz: 14_350_000,
            f_lo_cut_hz: 200,
            f_hi_cut_hz: 3000,
            mode: Mode::Usb,
            rf_gain_db: 0,
        },
        BandInfo {
            name: "17M",
            low_edge_hz: 18_068_000,
            high_edge_hz: 18_168_000,
            f_lo_cut_hz: 200,
            f_hi_cut_hz: 3000,
            mode: Mode::Usb,
            rf_gain_db: 0,
        },
        BandInfo {
            name: "15M",
            low_edge_hz: 21_000_000,
            high_edge_hz: 21_450_000,
            f_lo_cut_hz: 200,
            f_hi_cut_hz: 3000,
            mode: Mode::Usb,
            rf_gain_db: 0,
        },
    ]
}

/// Find the band index containing a frequency; out-of-band frequencies
/// snap to the nearest band
#[must_use]
pub fn band_for_frequency(bands: &[BandInfo], freq_hz: u32) -> usize {
    for (k, band) in bands.iter().enumerate() {
        if freq_hz >= band.low_edge_hz && freq_hz <= band.high_edge_hz {
            return k;
        }
    }
    // Nearest band by edge distance
    let mut best = 0;
    let mut best_dist = u32::MAX;
    for (k, band) in bands.iter().enumerate() {
        let dist = if freq_hz < band.low_edge_hz {
            band.low_edge_hz - freq_hz
        } else {
            freq_hz - band.high_edge_hz
        };
        if dist < best_dist {
            best_dist = dist;
            best = k;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passbands_are_valid() {
        for band in default_bands() {
            assert!(band.passband_valid(), "{} pass-band inverted", band.name);
        }
    }

    #[test]
    fn frequency_lookup() {
        let bands = default_bands();
        assert_eq!(bands[band_for_frequency(&bands, 7_250_000)].name, "40M");
        assert_eq!(bands[band_for_frequency(&bands, 14_100_000)].name, "20M");
        // Out of band snaps to the nearest
        assert_eq!(bands[band_for_frequency(&bands, 6_900_000)].name, "40M");
    }

    #[test]
    fn lsb_below_30m_usb_above() {
        let bands = default_bands();
        for (k, band) in bands.iter().enumerate() {
            if k < BAND_30M {
                assert_eq!(band.mode, Mode::Lsb);
            } else {
                assert_eq!(band.mode, Mode::Usb);
            }
        }
    }
}
