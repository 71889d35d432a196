//! Persisted configuration
//!
//! The radio's state is persisted as a JSON key/value document: restored
//! at boot, written back on change. Absent fields take their documented
//! defaults; a document that fails to parse is replaced wholesale by the
//! defaults and the failure is reported as `ConfigInvalid`.

use serde::{Deserialize, Serialize};

use crate::radio::bands::{BandInfo, NUMBER_OF_BANDS};
use crate::radio::vfo::VfoState;
use crate::types::{Mode, ProcessError, RadioSettings, VfoId};

/// The complete persisted document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// User settings
    pub settings: RadioSettings,
    /// Center frequency per VFO (Hz, includes the Fs/4 offset)
    pub center_freq_hz: [i64; 2],
    /// Fine-tune offset per VFO (Hz)
    pub fine_tune_hz: [i64; 2],
    /// Active VFO index (0 = A, 1 = B)
    pub active_vfo: u8,
    /// Last (center, fine) pair per band
    pub last_frequencies: [[i64; 2]; NUMBER_OF_BANDS],
    /// Demodulation mode per band
    pub band_modes: [Mode; NUMBER_OF_BANDS],
    /// Audio pass-band per band: (low cut, high cut) in signed Hz
    pub band_passbands: [[i32; 2]; NUMBER_OF_BANDS],
}

impl Default for ConfigDocument {
    fn default() -> Self {
        let bands = crate::radio::bands::default_bands();
        let vfo = VfoState::new(&bands);
        let mut band_modes = [Mode::Lsb; NUMBER_OF_BANDS];
        let mut band_passbands = [[0i32; 2]; NUMBER_OF_BANDS];
        for (k, band) in bands.iter().enumerate() {
            band_modes[k] = band.mode;
            band_passbands[k] = [band.f_lo_cut_hz, band.f_hi_cut_hz];
        }
        Self {
            settings: RadioSettings::default(),
            center_freq_hz: vfo.center_hz,
            fine_tune_hz: vfo.fine_tune_hz,
            active_vfo: 0,
            last_frequencies: vfo.last_frequencies,
            band_modes,
            band_passbands,
        }
    }
}

impl ConfigDocument {
    /// Capture the current runtime state into a document
    #[must_use]
    pub fn capture(settings: &RadioSettings, bands: &[BandInfo], vfo: &VfoState) -> Self {
        let mut doc = Self::default();
        doc.settings = *settings;
        doc.center_freq_hz = vfo.center_hz;
        doc.fine_tune_hz = vfo.fine_tune_hz;
        doc.active_vfo = vfo.active.index() as u8;
        doc.last_frequencies = vfo.last_frequencies;
        for (k, band) in bands.iter().enumerate().take(NUMBER_OF_BANDS) {
            doc.band_modes[k] = band.mode;
            doc.band_passbands[k] = [band.f_lo_cut_hz, band.f_hi_cut_hz];
        }
        doc
    }

    /// Apply a document back onto the runtime state
    pub fn restore(
        &self,
        settings: &mut RadioSettings,
        bands: &mut [BandInfo],
        vfo: &mut VfoState,
    ) {
        *settings = self.settings;
        vfo.center_hz = self.center_freq_hz;
        vfo.fine_tune_hz = self.fine_tune_hz;
        vfo.active = if self.active_vfo == 1 { VfoId::B } else { VfoId::A };
        vfo.last_frequencies = self.last_frequencies;
        for (k, band) in bands.iter_mut().enumerate().take(NUMBER_OF_BANDS) {
            band.mode = self.band_modes[k];
            band.f_lo_cut_hz = self.band_passbands[k][0];
            band.f_hi_cut_hz = self.band_passbands[k][1].max(self.band_passbands[k][0]);
        }
    }

    /// Serialize to the JSON document
    ///
    /// # Errors
    /// `ConfigInvalid` when serialization fails (it should not for a
    /// well-formed document).
    pub fn save(&self) -> Result<std::string::String, ProcessError> {
        serde_json::to_string_pretty(self).map_err(|_| ProcessError::ConfigInvalid)
    }

    /// Parse a JSON document; absent fields take defaults.
    ///
    /// # Errors
    /// `ConfigInvalid` when the document is not valid JSON or fails
    /// schema validation; the caller substitutes defaults.
    pub fn load(json: &str) -> Result<Self, ProcessError> {
        serde_json::from_str(json).map_err(|_| ProcessError::ConfigInvalid)
    }
}
