//! Whole-radio tests: CAT scenarios against the root object, the full
//! receive chain end to end, transmit output, and the no-input path.

use core::f32::consts::PI;

use phoenix_sdr_core::config::{volume_to_amplification, AGC_OUT_TARGET, READ_BUFFER_SIZE};
use phoenix_sdr_core::radio::state::{ModeEvent, ModeState};
use phoenix_sdr_core::transceiver::{StepOutcome, Transceiver};
use phoenix_sdr_core::types::ProcessError;

fn cat(radio: &mut Transceiver, command: &str) -> String {
    let mut response = String::new();
    for &b in command.as_bytes() {
        if let Some(r) = radio.cat_byte(b) {
            response.push_str(r.as_str());
        }
    }
    response
}

/// Queue one block of a complex RF tone into the receive input queues
fn feed_rx_tone(radio: &mut Transceiver, tone_hz: f32, amplitude: f32, phase_index: &mut u32) {
    let mut i_samples = [0i16; READ_BUFFER_SIZE];
    let mut q_samples = [0i16; READ_BUFFER_SIZE];
    for k in 0..READ_BUFFER_SIZE {
        let theta = 2.0 * PI * tone_hz * (*phase_index + k as u32) as f32 / 192_000.0;
        i_samples[k] = (amplitude * theta.cos() * 32767.0) as i16;
        q_samples[k] = (amplitude * theta.sin() * 32767.0) as i16;
    }
    *phase_index += READ_BUFFER_SIZE as u32;
    radio.router.q_in_l.push_samples(&i_samples);
    radio.router.q_in_r.push_samples(&q_samples);
}

#[test]
fn cat_fa_sets_vfo_and_band() {
    // S1: FA write tunes VFO-A, echoes, and lands on 40 m
    let mut radio = Transceiver::initialize_all();
    let response = cat(&mut radio, "FA00007250000;");
    assert_eq!(response, "FA00007250000;");
    assert_eq!(radio.bands[radio.vfo.active_band()].name, "40M");
    assert_eq!(radio.vfo.dial_hz(radio.vfo.active), 7_250_000);
}

#[test]
fn cat_ag_scales_volume() {
    // S2: AG0128 -> volume 50, empty response
    let mut radio = Transceiver::initialize_all();
    let response = cat(&mut radio, "AG0128;");
    assert!(response.is_empty());
    assert_eq!(radio.settings.audio_volume, 50);
}

#[test]
fn cat_id_reports_identity() {
    // S3
    let mut radio = Transceiver::initialize_all();
    assert_eq!(cat(&mut radio, "ID;"), "ID019;");
}

#[test]
fn cat_md_cw_is_noop_while_transmitting() {
    let mut radio = Transceiver::initialize_all();
    radio.handle_event(ModeEvent::PttPressed).unwrap();
    let _ = radio.step_block(); // drains the event; no input is fine
    assert_eq!(radio.mode_sm.state(), ModeState::SsbTransmit);

    cat(&mut radio, "MD3;");
    assert_eq!(radio.mode_sm.state(), ModeState::SsbTransmit);
    assert!(!radio.mode_sm.state().is_cw());
}

#[test]
fn cat_md_cw_from_receive_enters_cw() {
    let mut radio = Transceiver::initialize_all();
    cat(&mut radio, "MD3;");
    assert_eq!(radio.mode_sm.state(), ModeState::CwReceive);
    assert_eq!(cat(&mut radio, "MD;"), "MD3;");
}

#[test]
fn step_without_input_reports_no_input_and_recovers() {
    let mut radio = Transceiver::initialize_all();
    assert_eq!(radio.step_block().unwrap_err(), ProcessError::NoInput);

    // The next tick with data proceeds normally
    let mut phase = 0;
    feed_rx_tone(&mut radio, -12_750.0, 0.05, &mut phase);
    assert!(matches!(
        radio.step_block().unwrap(),
        StepOutcome::Received { .. }
    ));
}

#[test]
fn full_receive_chain_recovers_audio_at_agc_target() {
    // S4: a -12.75 kHz baseband tone (750 Hz below the quarter-rate
    // tuning point of the decimated stream) in LSB with pass-band
    // [-3000, -200] comes out as 750 Hz audio pegged to the AGC target
    let mut radio = Transceiver::initialize_all();
    radio.settings.audio_volume = 45;

    let mut phase = 0;
    let mut peak: f32 = 0.0;
    let mut drain = [0i16; READ_BUFFER_SIZE];
    for rep in 0..80 {
        feed_rx_tone(&mut radio, -12_750.0, 0.05, &mut phase);
        let outcome = radio.step_block().unwrap();
        assert!(matches!(outcome, StepOutcome::Received { .. }));
        let got = radio.router.q_out_l.pop_samples(&mut drain);
        assert_eq!(got, READ_BUFFER_SIZE);
        if rep >= 70 {
            for &s in &drain {
                peak = peak.max((f32::from(s) / 32768.0).abs());
            }
        }
    }
    let expected = AGC_OUT_TARGET * volume_to_amplification(45);
    assert!(
        (peak - expected).abs() < 0.02,
        "audio peak {peak}, expected {expected}"
    );
}

#[test]
fn receive_audio_is_at_750_hz() {
    // Zero crossings of the recovered audio confirm the tone frequency
    let mut radio = Transceiver::initialize_all();
    let mut phase = 0;
    let mut drain = [0i16; READ_BUFFER_SIZE];
    for _ in 0..40 {
        feed_rx_tone(&mut radio, -12_750.0, 0.05, &mut phase);
        radio.step_block().unwrap();
        radio.router.q_out_l.pop_samples(&mut drain);
    }
    let mut crossings = 0;
    for pair in drain.windows(2) {
        if (pair[0] >= 0) != (pair[1] >= 0) {
            crossings += 1;
        }
    }
    // 750 Hz over 10.67 ms is 8 cycles -> 16 crossings
    assert!(
        (14..=18).contains(&crossings),
        "zero crossings {crossings}"
    );
}

#[test]
fn transmit_produces_quadrature_iq() {
    let mut radio = Transceiver::initialize_all();
    radio.handle_event(ModeEvent::PttPressed).unwrap();
    let _ = radio.step_block();
    assert_eq!(radio.mode_sm.state(), ModeState::SsbTransmit);

    let mut i_out = [0i16; READ_BUFFER_SIZE];
    let mut q_out = [0i16; READ_BUFFER_SIZE];
    let mut mic = [0i16; READ_BUFFER_SIZE];
    for rep in 0..8u32 {
        for (k, v) in mic.iter_mut().enumerate() {
            let n = (rep * READ_BUFFER_SIZE as u32 + k as u32) as f32;
            *v = (0.2 * (2.0 * PI * 1000.0 * n / 192_000.0).sin() * 32767.0) as i16;
        }
        radio.router.q_in_l_ex.push_samples(&mic);
        radio.router.q_in_r_ex.push_samples(&mic);
        assert_eq!(radio.step_block().unwrap(), StepOutcome::Transmitted);
        radio.router.q_out_l_ex.pop_samples(&mut i_out);
        radio.router.q_out_r_ex.pop_samples(&mut q_out);
    }

    // Both channels carry signal, orthogonal to each other (analytic pair)
    let mut dot = 0.0f64;
    let mut pi_pow = 0.0f64;
    let mut pq_pow = 0.0f64;
    for k in 0..READ_BUFFER_SIZE {
        let i = f64::from(i_out[k]);
        let q = f64::from(q_out[k]);
        dot += i * q;
        pi_pow += i * i;
        pq_pow += q * q;
    }
    assert!(pi_pow > 0.0 && pq_pow > 0.0, "transmit output silent");
    let corr = dot / (pi_pow.sqrt() * pq_pow.sqrt());
    assert!(corr.abs() < 0.1, "I/Q correlation {corr}");
    let ratio = pq_pow / pi_pow;
    assert!((0.7..1.4).contains(&ratio), "I/Q power ratio {ratio}");
}

#[test]
fn cw_mark_routes_sidetone_to_speaker() {
    let mut radio = Transceiver::initialize_all();
    radio.settings.sidetone_volume = 50;
    cat(&mut radio, "MD3;");
    radio.retune();
    radio.handle_event(ModeEvent::KeyDown).unwrap();
    let outcome = {
        let _ = radio.step_block();
        radio.step_block()
    };
    assert_eq!(radio.mode_sm.state(), ModeState::CwTransmitMark);
    assert_eq!(outcome.unwrap(), StepOutcome::Idle);

    let mut out = [0i16; READ_BUFFER_SIZE];
    let got = radio.router.q_out_l.pop_samples(&mut out);
    assert!(got > 0);
    let peak = out.iter().map(|v| v.abs()).max().unwrap();
    assert!(peak > 1000, "sidetone peak {peak}");
}

#[test]
fn event_queue_applies_at_block_boundary_only() {
    let mut radio = Transceiver::initialize_all();
    radio.handle_event(ModeEvent::PttPressed).unwrap();
    // Not yet applied
    assert_eq!(radio.mode_sm.state(), ModeState::SsbReceive);
    let _ = radio.step_block();
    assert_eq!(radio.mode_sm.state(), ModeState::SsbTransmit);
}

#[cfg(feature = "std")]
#[test]
fn shutdown_persists_and_returns_zero() {
    let mut radio = Transceiver::initialize_all();
    cat(&mut radio, "FA00014200000;");
    cat(&mut radio, "AG0255;");
    assert_eq!(radio.shutdown(), 0);

    let doc = radio.capture_config();
    let json = doc.save().unwrap();
    let reloaded = phoenix_sdr_core::storage::ConfigDocument::load(&json).unwrap();
    assert_eq!(doc, reloaded);

    let restored = Transceiver::from_config(&reloaded);
    assert_eq!(restored.settings.audio_volume, 100);
    assert_eq!(restored.vfo.dial_hz(restored.vfo.active), 14_200_000);
}
