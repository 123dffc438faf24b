mod support;

use bridge_core::cellular::{CellState, HfpCommand, HfpIndication};
use bridge_core::events::{CellEvent, DisplayEvent};
use bridge_core::gain::{GainTarget, bt_to_db, db_to_bt, db_to_codec};
use bridge_core::orchestrator::CallState;
use bridge_core::pots::ToneState;
use bridge_core::ticks::POTS_TICK_MS;
use heapless::Vec;

use support::Bench;

const EUROPE: u8 = 1;

/// Answers an incoming call and waits for voice on the line.
fn active_call() -> Bench {
    let mut bench = Bench::connected(EUROPE);
    bench.indicate(HfpIndication::Ring);
    bench.run_ms(100);
    bench.lift();
    bench.indicate(HfpIndication::Call(true));
    bench.indicate(HfpIndication::AudioOpened { wideband: false });
    bench.run_ms(100);
    assert_eq!(bench.call.state(), CallState::CallActiveVoice);
    assert_eq!(bench.link.state(), CellState::CallActive);
    bench.radio.sent.clear();
    bench
}

#[test]
fn repeated_keypad_presses_each_send_one_dtmf() {
    let mut bench = active_call();
    for _ in 0..8 {
        bench.bus.post_ui_digit('5');
        bench.run_ms(150);
    }
    assert_eq!(bench.radio.count(&HfpCommand::Dtmf('5')), 8);
    assert_eq!(bench.radio.sent.len(), 8);
    // The far end plays the tones; the line stays on voice.
    assert_eq!(bench.pots.tone_state(), ToneState::Voice);
}

#[test]
fn repeated_keypad_presses_while_dialing_are_separate_bursts() {
    let mut bench = Bench::connected(EUROPE);
    bench.lift();
    assert_eq!(bench.pots.tone_state(), ToneState::Dial);

    // (state, ticks spent in it) for every run of identical states.
    let mut runs: Vec<(ToneState, u32), 32> = Vec::new();
    let mut presses = 0;
    for tick in 0..300 {
        if tick % 5 == 0 && presses < 8 {
            bench.bus.post_ui_digit('5');
            presses += 1;
        }
        bench.tick();
        let state = bench.pots.tone_state();
        match runs.last_mut() {
            Some((previous, ticks)) if *previous == state => *ticks += 1,
            _ => runs.push((state, 1)).expect("bounded transitions"),
        }
    }

    let bursts: Vec<u32, 8> = runs
        .iter()
        .filter(|(state, _)| *state == ToneState::Dtmf)
        .map(|(_, ticks)| *ticks)
        .collect();
    assert_eq!(bursts.len(), 8);
    assert!(bursts.iter().all(|ticks| ticks * POTS_TICK_MS <= 110), "{bursts:?}");

    // Every burst is followed by its own flush before anything else plays.
    for pair in runs.windows(2) {
        if pair[0].0 == ToneState::Dtmf {
            assert_eq!(pair[1].0, ToneState::DtmfFlush);
        }
        if pair[1].0 == ToneState::Dtmf {
            assert!(matches!(pair[0].0, ToneState::DtmfFlush | ToneState::Dial));
        }
    }
    assert_eq!(bench.pots.tone_state(), ToneState::DialQuiet);
    assert_eq!(bench.bus.dial.number().as_str(), "55555555");
}

#[test]
fn handset_volume_reaches_codec_and_display_only() {
    let mut bench = active_call();
    bench.bus.display.take();
    bench.indicate(HfpIndication::Volume {
        target: GainTarget::Speaker,
        level: 12,
    });
    bench.run_ms(100);

    let db = bt_to_db(GainTarget::Speaker, 12);
    assert_eq!(bench.codec.speaker, Some(db_to_codec(GainTarget::Speaker, db)));
    assert!(bench.bus.display.take().contains(DisplayEvent::SpeakerGainChanged));
    assert!(bench.radio.sent.is_empty());
}

#[test]
fn display_volume_reaches_codec_and_handset_only() {
    let mut bench = active_call();
    bench.bus.display.take();
    bench.bus.post_ui_gain(GainTarget::Mic, -6.0);
    bench.run_ms(100);

    assert_eq!(bench.codec.mic, Some(db_to_codec(GainTarget::Mic, -6.0)));
    assert_eq!(
        bench.radio.sent.as_slice(),
        &[HfpCommand::Volume {
            target: GainTarget::Mic,
            level: db_to_bt(GainTarget::Mic, -6.0),
        }]
    );
    assert!(!bench.bus.display.take().contains(DisplayEvent::MicGainChanged));
}

#[test]
fn hanging_up_waits_for_the_handset() {
    let mut bench = active_call();
    bench.hang_up();
    assert_eq!(bench.call.state(), CallState::CallEnding);
    assert_eq!(bench.link.state(), CellState::WaitEnd);
    assert_eq!(bench.radio.count(&HfpCommand::Hangup), 1);

    bench.indicate(HfpIndication::AudioClosed);
    bench.indicate(HfpIndication::Call(false));
    bench.run_ms(100);
    assert_eq!(bench.call.state(), CallState::Idle);
    assert_eq!(bench.link.state(), CellState::ConnectedIdle);
}

#[test]
fn losing_the_handset_ends_the_call_everywhere() {
    let mut bench = active_call();
    bench.indicate(HfpIndication::SlcDisconnected);
    bench.run_ms(100);

    assert_eq!(bench.link.state(), CellState::Disconnected);
    assert_eq!(bench.call.state(), CallState::ServiceLost);
    // The call audio is gone; the line waits for the phone to be hung up.
    assert_eq!(bench.pots.tone_state(), ToneState::VoiceWaitHangup);
    assert!(bench.radio.sent.contains(&HfpCommand::Connect));

    bench.bus.cell.raise(CellEvent::PowerDown);
    bench.run_ms(40);
    assert!(!bench.radio.sent.contains(&HfpCommand::Disconnect));
}
