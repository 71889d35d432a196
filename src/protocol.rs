//! CAT (Computer Aided Transceiver) protocol
//!
//! Kenwood TS-2000 style byte protocol: a two-letter command, an ASCII
//! payload, a ';' terminator, case sensitive. Each supported command
//! declares a write length and a read length; the terminator's position
//! decides which handler runs, anything else answers `?;`.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::radio::bands::{BandInfo, BAND_30M};
use crate::radio::state::{ModeEvent, ModeSm, ModeState};
use crate::radio::vfo::VfoState;
use crate::types::{Mode, NrSelection, RadioSettings, VfoId};

/// Maximum command length
pub const MAX_CMD_LEN: usize = 64;

/// Response buffer type
pub type CatResponse = String<MAX_CMD_LEN>;

/// Everything a CAT handler may touch
pub struct CatContext<'a> {
    /// Runtime settings
    pub settings: &'a mut RadioSettings,
    /// Band table
    pub bands: &'a mut [BandInfo],
    /// VFO state
    pub vfo: &'a mut VfoState,
    /// Mode state machine
    pub mode_sm: &'a mut ModeSm,
    /// Clock reading for state-machine dispatch
    pub now_ms: u64,
    /// Set when a handler changed the tuning; the caller reprograms the
    /// LO and rebuilds the filter mask at the next block boundary
    pub tune_changed: bool,
    /// Set when a handler changed the operating mode or pass-band
    pub mode_changed: bool,
}

type Handler = fn(&mut CatContext<'_>, &[u8]) -> CatResponse;

struct CatCommand {
    name: [u8; 2],
    set_len: usize,
    read_len: usize,
    write: Handler,
    read: Handler,
}

const COMMANDS: &[CatCommand] = &[
    CatCommand { name: *b"AG", set_len: 7, read_len: 4, write: ag_write, read: ag_read },
    CatCommand { name: *b"BD", set_len: 3, read_len: 0, write: bd_write, read: unsupported },
    CatCommand { name: *b"BU", set_len: 3, read_len: 0, write: bu_write, read: unsupported },
    CatCommand { name: *b"FA", set_len: 14, read_len: 3, write: fa_write, read: fa_read },
    CatCommand { name: *b"FB", set_len: 14, read_len: 3, write: fb_write, read: fb_read },
    CatCommand { name: *b"FR", set_len: 14, read_len: 3, write: fr_write, read: fr_read },
    CatCommand { name: *b"FT", set_len: 14, read_len: 3, write: ft_write, read: ft_read },
    CatCommand { name: *b"ID", set_len: 0, read_len: 3, write: unsupported, read: id_read },
    CatCommand { name: *b"IF", set_len: 0, read_len: 3, write: unsupported, read: if_read },
    CatCommand { name: *b"MD", set_len: 4, read_len: 3, write: md_write, read: md_read },
    CatCommand { name: *b"MG", set_len: 6, read_len: 3, write: mg_write, read: mg_read },
    CatCommand { name: *b"NR", set_len: 4, read_len: 3, write: nr_write, read: nr_read },
    CatCommand { name: *b"NT", set_len: 4, read_len: 3, write: nt_write, read: nt_read },
];

fn error_response() -> CatResponse {
    let mut s = CatResponse::new();
    let _ = s.push_str("?;");
    s
}

fn empty_response() -> CatResponse {
    CatResponse::new()
}

fn unsupported(_ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    error_response()
}

/// Parse an ASCII integer from the payload (stops at the terminator)
fn parse_int(payload: &[u8]) -> i64 {
    let mut value: i64 = 0;
    let mut negative = false;
    for (k, &b) in payload.iter().enumerate() {
        match b {
            b'-' if k == 0 => negative = true,
            b'0'..=b'9' => value = value * 10 + i64::from(b - b'0'),
            _ => break,
        }
    }
    if negative {
        -value
    } else {
        value
    }
}

fn ag_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    let raw = parse_int(&cmd[3..]);
    ctx.settings.audio_volume = ((raw as f32 * 100.0) / 255.0) as i32;
    ctx.settings.audio_volume = ctx.settings.audio_volume.clamp(0, 100);
    empty_response()
}

fn ag_read(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let raw = ((ctx.settings.audio_volume as f32 * 255.0) / 100.0) as i32;
    let _ = write!(s, "AG{}{raw:03};", cmd[2] as char);
    s
}

fn bu_write(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    ctx.vfo.step_band(ctx.bands, true);
    ctx.tune_changed = true;
    empty_response()
}

fn bd_write(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    ctx.vfo.step_band(ctx.bands, false);
    ctx.tune_changed = true;
    empty_response()
}

fn set_vfo_response(ctx: &mut CatContext<'_>, cmd: &[u8], vfo: VfoId) -> CatResponse {
    let freq = parse_int(&cmd[2..]);
    ctx.vfo.set_vfo(ctx.bands, freq, vfo);
    ctx.tune_changed = true;
    let mut s = CatResponse::new();
    let prefix = &cmd[..2];
    let _ = write!(
        s,
        "{}{}{freq:011};",
        prefix[0] as char,
        prefix[1] as char
    );
    s
}

fn fa_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    set_vfo_response(ctx, cmd, VfoId::A)
}

fn fa_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "FA{:011};", ctx.vfo.center_hz[VfoId::A.index()]);
    s
}

fn fb_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    set_vfo_response(ctx, cmd, VfoId::B)
}

fn fb_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "FB{:011};", ctx.vfo.center_hz[VfoId::B.index()]);
    s
}

fn ft_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    let active = ctx.vfo.active;
    set_vfo_response(ctx, cmd, active)
}

fn ft_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "FT{:011};", ctx.vfo.dial_hz(ctx.vfo.active));
    s
}

fn fr_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    let active = ctx.vfo.active;
    set_vfo_response(ctx, cmd, active)
}

fn fr_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "FR{:011};", ctx.vfo.dial_hz(ctx.vfo.active));
    s
}

fn id_read(_ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = s.push_str("ID019;");
    s
}

fn mode_code(ctx: &CatContext<'_>) -> u8 {
    if ctx.mode_sm.state().is_cw() {
        b'3'
    } else {
        ctx.bands[ctx.vfo.active_band()].mode.cat_code()
    }
}

fn if_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let rxtx = u8::from(!matches!(
        ctx.mode_sm.state(),
        ModeState::CwReceive | ModeState::SsbReceive
    ));
    let mut s = CatResponse::new();
    let _ = write!(
        s,
        "IF{:011}{:04}{:+06}{}{}{}{:02}{}{}{}{}{}{}{:02}{};",
        ctx.vfo.center_hz[ctx.vfo.active.index()],
        10,   // tuning increment
        0,    // RIT offset
        0,    // RIT enabled
        0,    // XIT enabled
        0, 0, // channel bank
        rxtx,
        mode_code(ctx) as char,
        0, // RX VFO
        0, // scan status
        0, // split
        0, // CTCSS enabled
        0, // CTCSS tone
        0
    );
    s
}

fn md_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    let band = ctx.vfo.active_band();
    match cmd[2] {
        b'1' => {
            ctx.bands[band].mode = Mode::Lsb;
            ctx.mode_changed = true;
        }
        b'2' => {
            ctx.bands[band].mode = Mode::Usb;
            ctx.mode_changed = true;
        }
        b'3' => {
            // CW entry is only legal from SSB receive; otherwise ignore
            if ctx.mode_sm.state() == ModeState::SsbReceive {
                ctx.bands[band].mode = if band < BAND_30M { Mode::Lsb } else { Mode::Usb };
                ctx.mode_sm.dispatch(ModeEvent::ToCwMode, ctx.now_ms);
                ctx.mode_changed = true;
            }
        }
        b'5' => {
            // AM requests select the synchronous detector
            ctx.bands[band].mode = Mode::Sam;
            ctx.mode_changed = true;
        }
        _ => {}
    }
    empty_response()
}

fn md_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "MD{};", mode_code(ctx) as char);
    s
}

fn mg_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    let g = parse_int(&cmd[2..]);
    // 0..100 maps onto -40..+30 dB
    ctx.settings.mic_gain_db = ((g as f64 * 70.0 / 100.0) - 40.0) as i32;
    empty_response()
}

fn mg_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let g = ((f64::from(ctx.settings.mic_gain_db) + 40.0) * 100.0 / 70.0) as i32;
    let mut s = CatResponse::new();
    let _ = write!(s, "MG{g:03};");
    s
}

fn nr_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    ctx.settings.nr_selection = if cmd[2] == b'0' {
        NrSelection::Off
    } else {
        NrSelection::from_cat_code(parse_int(&cmd[2..]) as u8)
    };
    empty_response()
}

fn nr_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "NR{};", ctx.settings.nr_selection.cat_code());
    s
}

fn nt_write(ctx: &mut CatContext<'_>, cmd: &[u8]) -> CatResponse {
    ctx.settings.auto_notch = cmd[2] != b'0';
    empty_response()
}

fn nt_read(ctx: &mut CatContext<'_>, _cmd: &[u8]) -> CatResponse {
    let mut s = CatResponse::new();
    let _ = write!(s, "NT{};", u8::from(ctx.settings.auto_notch));
    s
}

/// Execute one complete command (terminator included)
pub fn execute(ctx: &mut CatContext<'_>, command: &[u8]) -> CatResponse {
    if command.len() < 2 {
        return error_response();
    }
    for entry in COMMANDS {
        if command[..2] == entry.name {
            // The terminator's position selects write vs read
            if entry.set_len > 0
                && command.len() >= entry.set_len
                && command[entry.set_len - 1] == b';'
            {
                return (entry.write)(ctx, command);
            }
            if entry.read_len > 0
                && command.len() >= entry.read_len
                && command[entry.read_len - 1] == b';'
            {
                return (entry.read)(ctx, command);
            }
            return error_response();
        }
    }
    error_response()
}

/// Byte-at-a-time command accumulator
pub struct CatParser {
    buffer: Vec<u8, MAX_CMD_LEN>,
}

impl CatParser {
    /// Create an empty parser
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed one byte; on a terminator, execute the buffered command and
    /// return its response
    pub fn feed(&mut self, byte: u8, ctx: &mut CatContext<'_>) -> Option<CatResponse> {
        if byte == b'\r' || byte == b'\n' {
            return None;
        }
        if self.buffer.push(byte).is_err() {
            // Overflowed command; drop it
            self.buffer.clear();
            return None;
        }
        if byte == b';' {
            let response = execute(ctx, &self.buffer);
            self.buffer.clear();
            return Some(response);
        }
        None
    }

    /// Discard any buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for CatParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::bands::default_bands;

    struct Fixture {
        settings: RadioSettings,
        bands: [BandInfo; crate::radio::bands::NUMBER_OF_BANDS],
        vfo: VfoState,
        mode_sm: ModeSm,
    }

    impl Fixture {
        fn new() -> Self {
            let bands = default_bands();
            let vfo = VfoState::new(&bands);
            let mut mode_sm = ModeSm::new();
            mode_sm.dispatch(ModeEvent::InitDone, 0);
            Self {
                settings: RadioSettings::default(),
                bands,
                vfo,
                mode_sm,
            }
        }

        fn run(&mut self, cmd: &str) -> CatResponse {
            let mut ctx = CatContext {
                settings: &mut self.settings,
                bands: &mut self.bands,
                vfo: &mut self.vfo,
                mode_sm: &mut self.mode_sm,
                now_ms: 0,
                tune_changed: false,
                mode_changed: false,
            };
            execute(&mut ctx, cmd.as_bytes())
        }
    }

    #[test]
    fn id_reads_radio_identity() {
        let mut f = Fixture::new();
        assert_eq!(f.run("ID;").as_str(), "ID019;");
    }

    #[test]
    fn fa_write_sets_vfo_and_band() {
        let mut f = Fixture::new();
        let response = f.run("FA00007250000;");
        assert_eq!(response.as_str(), "FA00007250000;");
        assert_eq!(f.bands[f.vfo.active_band()].name, "40M");
        assert_eq!(f.vfo.center_hz[0], 7_250_000 + 48_000);
    }

    #[test]
    fn ag_write_scales_0_255_to_0_100() {
        let mut f = Fixture::new();
        let response = f.run("AG0128;");
        assert!(response.is_empty());
        assert_eq!(f.settings.audio_volume, 50);
    }

    #[test]
    fn unknown_command_answers_question() {
        let mut f = Fixture::new();
        assert_eq!(f.run("ZZ1;").as_str(), "?;");
    }

    #[test]
    fn wrong_length_answers_question() {
        let mut f = Fixture::new();
        assert_eq!(f.run("FA123;").as_str(), "?;");
    }

    #[test]
    fn md_cw_only_from_ssb_receive() {
        let mut f = Fixture::new();
        f.run("MD3;");
        assert!(f.mode_sm.state().is_cw());
        assert_eq!(f.run("MD;").as_str(), "MD3;");
    }

    #[test]
    fn md_cw_picks_sideband_by_band() {
        let mut f = Fixture::new();
        f.run("FA00007100000;"); // 40m, below 30m
        f.run("MD3;");
        assert_eq!(f.bands[f.vfo.active_band()].mode, Mode::Lsb);

        let mut f = Fixture::new();
        f.run("FA00014100000;"); // 20m, above
        f.run("MD3;");
        assert_eq!(f.bands[f.vfo.active_band()].mode, Mode::Usb);
    }

    #[test]
    fn mg_round_trip() {
        let mut f = Fixture::new();
        f.run("MG050;");
        assert_eq!(f.settings.mic_gain_db, -5);
        let response = f.run("MG;");
        assert_eq!(response.as_str(), "MG050;");
    }

    #[test]
    fn nr_selects_algorithm() {
        let mut f = Fixture::new();
        f.run("NR2;");
        assert_eq!(f.settings.nr_selection, NrSelection::Spectral);
        assert_eq!(f.run("NR;").as_str(), "NR2;");
        f.run("NR0;");
        assert_eq!(f.settings.nr_selection, NrSelection::Off);
    }

    #[test]
    fn if_status_has_fixed_layout() {
        let mut f = Fixture::new();
        let response = f.run("IF;");
        let s = response.as_str();
        assert_eq!(s.len(), 38, "IF response {s:?}");
        assert!(s.starts_with("IF"));
        assert!(s.ends_with(';'));
        // Mode digit sits at offset 29 (LSB on the default 40 m band)
        assert_eq!(s.as_bytes()[29], b'1');
        // RX flag one position earlier
        assert_eq!(s.as_bytes()[28], b'0');
    }

    #[test]
    fn ag_read_echoes_p1_and_rescales() {
        let mut f = Fixture::new();
        f.settings.audio_volume = 50;
        let response = f.run("AG0;");
        assert_eq!(response.as_str(), "AG0127;");
    }

    #[test]
    fn parser_accumulates_bytes() {
        let mut f = Fixture::new();
        let mut parser = CatParser::new();
        let mut ctx = CatContext {
            settings: &mut f.settings,
            bands: &mut f.bands,
            vfo: &mut f.vfo,
            mode_sm: &mut f.mode_sm,
            now_ms: 0,
            tune_changed: false,
            mode_changed: false,
        };
        let mut out = None;
        for b in b"ID;" {
            out = parser.feed(*b, &mut ctx);
        }
        assert_eq!(out.unwrap().as_str(), "ID019;");
    }
}
