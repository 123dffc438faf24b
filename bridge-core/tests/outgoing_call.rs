mod support;

use bridge_core::audio::AudioSource;
use bridge_core::bus::OutgoingNumber;
use bridge_core::cellular::{CallSetup, CellState, HfpCommand, HfpIndication};
use bridge_core::events::CallEvent;
use bridge_core::orchestrator::CallState;
use bridge_core::pots::ToneState;

use support::Bench;

const EUROPE: u8 = 1;

fn dial_command(digits: &str) -> HfpCommand {
    HfpCommand::Dial(OutgoingNumber::try_from(digits).expect("fits"))
}

#[test]
fn off_hook_without_service_plays_reorder_until_on_hook() {
    let mut bench = Bench::new(EUROPE);
    assert_eq!(bench.call.state(), CallState::ServiceLost);

    bench.set_off_hook(true);
    for _ in 0..300 {
        bench.tick();
        assert_ne!(bench.pots.tone_state(), ToneState::Dial);
    }
    assert_eq!(bench.pots.tone_state(), ToneState::NoService);
    assert_eq!(bench.pipeline.source(), AudioSource::Tone);
    assert_eq!(bench.call.state(), CallState::ServiceLost);

    bench.hang_up();
    assert_eq!(bench.pots.tone_state(), ToneState::Idle);
    assert_eq!(bench.pipeline.source(), AudioSource::Disabled);
}

#[test]
fn rotary_number_is_dialed_after_four_quiet_seconds() {
    let mut bench = Bench::connected(EUROPE);
    bench.lift();
    assert_eq!(bench.call.state(), CallState::UserDialing);
    assert_eq!(bench.pots.tone_state(), ToneState::Dial);

    for pulses in [5, 5, 1, 2] {
        bench.dial_rotary(pulses);
    }
    assert_eq!(bench.bus.dial.number().as_str(), "5512");
    assert_eq!(bench.pots.tone_state(), ToneState::DialQuiet);

    bench.run_ms(3_000);
    assert_eq!(bench.call.state(), CallState::UserDialing);
    assert!(bench.radio.sent.is_empty());

    bench
        .run_until(1_500, |bench| bench.call.state() == CallState::CallInitiating)
        .expect("auto dial");
    bench.run_ms(60);
    assert_eq!(bench.link.state(), CellState::CallInitiated);
    assert_eq!(bench.radio.count(&dial_command("5512")), 1);
}

#[test]
fn dial_button_sends_the_number_at_once() {
    let mut bench = Bench::connected(EUROPE);
    bench.lift();
    bench.dial_rotary(7);
    bench.bus.call.raise(CallEvent::UiDial);
    bench.run_ms(100);

    assert_eq!(bench.call.state(), CallState::CallInitiating);
    assert_eq!(bench.radio.count(&dial_command("7")), 1);

    bench.indicate(HfpIndication::CallSetup(CallSetup::Idle));
    bench.indicate(HfpIndication::Call(true));
    bench.indicate(HfpIndication::AudioOpened { wideband: false });
    bench.run_ms(100);
    assert_eq!(bench.call.state(), CallState::CallActiveVoice);
}

#[test]
fn lone_assistant_digit_starts_voice_recognition() {
    let mut bench = Bench::connected(EUROPE);
    bench.lift();
    bench.dial_rotary(10);
    assert_eq!(bench.bus.dial.number().as_str(), "0");

    bench.run_ms(4_500);
    assert_eq!(bench.call.state(), CallState::CallInitiating);
    assert_eq!(bench.radio.count(&HfpCommand::VoiceRecognition(true)), 1);
    assert!(!bench.radio.sent.iter().any(|sent| matches!(sent, HfpCommand::Dial(_))));
}

#[test]
fn ui_digits_are_not_auto_dialed() {
    let mut bench = Bench::connected(EUROPE);
    bench.lift();
    for digit in ['1', '2', '3'] {
        bench.bus.post_ui_digit(digit);
        bench.run_ms(200);
    }
    assert_eq!(bench.bus.dial.number().as_str(), "123");

    bench.bus.call.raise(CallEvent::UiDelete);
    bench.run_ms(5_000);
    assert_eq!(bench.bus.dial.number().as_str(), "12");
    assert_eq!(bench.call.state(), CallState::UserDialing);
}

#[test]
fn hanging_up_while_dialing_returns_to_idle() {
    let mut bench = Bench::connected(EUROPE);
    bench.lift();
    bench.dial_rotary(3);
    bench.hang_up();
    assert_eq!(bench.call.state(), CallState::Idle);
    assert!(bench.bus.dial.is_empty());
}
