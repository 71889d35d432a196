//! Automatic Gain Control
//!
//! Five-profile hang-and-decay AGC with look-ahead. A short delay ring
//! lets the gain drop before a loud edge reaches the output; after a peak
//! the gain is held for the profile's hang time before the decay tracker
//! is allowed to raise it again. All engaged profiles settle a sustained
//! input to the same normalized target.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::AGC_OUT_TARGET;
use crate::dsp::block::SampleBlock;
use crate::types::AgcProfile;

/// Look-ahead depth in samples at the decimated audio rate
const LOOKAHEAD: usize = 64;

/// Upper gain bound (60 dB)
const MAX_GAIN: f32 = 1000.0;

/// Per-profile time constants
#[derive(Clone, Copy, Debug)]
struct ProfileParams {
    tau_attack_s: f32,
    tau_decay_s: f32,
    hangtime_s: f32,
    hang_thresh: f32,
    slope: f32,
}

const fn params_for(profile: AgcProfile) -> ProfileParams {
    match profile {
        // Off keeps placeholders; only fixed_gain is used
        AgcProfile::Off => ProfileParams {
            tau_attack_s: 0.001,
            tau_decay_s: 0.05,
            hangtime_s: 0.0,
            hang_thresh: 1.0,
            slope: 0.0,
        },
        AgcProfile::Long => ProfileParams {
            tau_attack_s: 0.001,
            tau_decay_s: 0.02,
            hangtime_s: 2.0,
            hang_thresh: 0.95,
            slope: 0.003,
        },
        AgcProfile::Slow => ProfileParams {
            tau_attack_s: 0.001,
            tau_decay_s: 0.03,
            hangtime_s: 1.0,
            hang_thresh: 0.95,
            slope: 0.003,
        },
        AgcProfile::Med => ProfileParams {
            tau_attack_s: 0.001,
            tau_decay_s: 0.03,
            hangtime_s: 0.0,
            hang_thresh: 0.95,
            slope: 0.003,
        },
        AgcProfile::Fast => ProfileParams {
            tau_attack_s: 0.0005,
            tau_decay_s: 0.3,
            hangtime_s: 0.1,
            hang_thresh: 0.95,
            slope: 0.003,
        },
    }
}

/// AGC state for one receive chain
pub struct Agc {
    profile: AgcProfile,
    /// Hang time in seconds (profile-dependent after `init`)
    pub hangtime: f32,
    /// Gain applied verbatim when the profile is Off
    pub fixed_gain: f32,
    attack_mult: f32,
    decay_mult: f32,
    hang_thresh: f32,
    slope: f32,
    hang_samples: u32,
    hang_counter: u32,
    gain: f32,
    ring_i: [f32; LOOKAHEAD],
    ring_q: [f32; LOOKAHEAD],
    abs_ring: [f32; LOOKAHEAD],
    pos: usize,
}

impl Agc {
    /// Create an AGC with pre-init defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: AgcProfile::Off,
            hangtime: 0.25,
            fixed_gain: 1.0,
            attack_mult: 1.0,
            decay_mult: 1.0,
            hang_thresh: 1.0,
            slope: 0.0,
            hang_samples: 0,
            hang_counter: 0,
            gain: 1.0,
            ring_i: [0.0; LOOKAHEAD],
            ring_q: [0.0; LOOKAHEAD],
            abs_ring: [0.0; LOOKAHEAD],
            pos: 0,
        }
    }

    /// Load profile parameters scaled to the block sample rate
    pub fn init(&mut self, profile: AgcProfile, sample_rate_hz: u32) {
        let p = params_for(profile);
        let fs = sample_rate_hz as f32;
        self.profile = profile;
        self.hangtime = p.hangtime_s;
        self.hang_thresh = p.hang_thresh;
        self.slope = p.slope;
        self.attack_mult = 1.0 - (-1.0 / (fs * p.tau_attack_s)).exp();
        self.decay_mult = 1.0 - (-1.0 / (fs * p.tau_decay_s)).exp();
        self.hang_samples = (p.hangtime_s * fs) as u32;
        self.hang_counter = 0;
        self.gain = 1.0;
        self.ring_i = [0.0; LOOKAHEAD];
        self.ring_q = [0.0; LOOKAHEAD];
        self.abs_ring = [0.0; LOOKAHEAD];
        self.pos = 0;
    }

    /// Active profile
    #[must_use]
    pub const fn profile(&self) -> AgcProfile {
        self.profile
    }

    /// Current loop gain (for metering)
    #[must_use]
    pub const fn gain(&self) -> f32 {
        self.gain
    }

    /// Process one block in place. Never fails after `init`.
    pub fn process(&mut self, block: &mut SampleBlock) {
        if self.profile == AgcProfile::Off {
            block.scale(self.fixed_gain);
            return;
        }

        let n = block.len();
        for k in 0..n {
            // Exchange the incoming sample with the delayed one
            let out_i = self.ring_i[self.pos];
            let out_q = self.ring_q[self.pos];
            self.ring_i[self.pos] = block.i[k];
            self.ring_q[self.pos] = block.q[k];
            self.abs_ring[self.pos] = block.i[k].abs().max(block.q[k].abs());
            self.pos = (self.pos + 1) % LOOKAHEAD;

            // Peak over the look-ahead window drives the gain tracker
            let mut peak = 1e-6f32;
            for &a in &self.abs_ring {
                peak = peak.max(a);
            }
            let desired = (AGC_OUT_TARGET * peak.powf(self.slope) / peak).min(MAX_GAIN);

            if desired < self.gain {
                if desired < self.gain * self.hang_thresh {
                    self.hang_counter = self.hang_samples;
                }
                self.gain += self.attack_mult * (desired - self.gain);
            } else if self.hang_counter > 0 {
                self.hang_counter -= 1;
            } else {
                self.gain += self.decay_mult * (desired - self.gain);
            }

            block.i[k] = out_i * self.gain;
            block.q[k] = out_q * self.gain;
        }
    }
}

impl Default for Agc {
    fn default() -> Self {
        Self::new()
    }
}
