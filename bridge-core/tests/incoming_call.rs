mod support;

use bridge_core::audio::AudioSource;
use bridge_core::callerid::CallerNumber;
use bridge_core::cellular::{CallSetup, CellState, HfpCommand, HfpIndication};
use bridge_core::orchestrator::CallState;
use bridge_core::pots::{CidState, RingState, ToneState};

use support::Bench;

const EUROPE: u8 = 1;
const UNITED_STATES: u8 = 5;

fn number(digits: &str) -> CallerNumber {
    CallerNumber::try_from(digits).expect("fits")
}

#[test]
fn after_ring_caller_id_follows_the_first_cadence() {
    let mut bench = Bench::connected(UNITED_STATES);
    bench.indicate(HfpIndication::CallerNumber(number("5551234")));
    bench.indicate(HfpIndication::Ring);
    bench.run_ms(60);

    assert_eq!(bench.call.state(), CallState::CallReceiving);
    assert_ne!(bench.pots.ring_state(), RingState::Idle);
    assert!(bench.line().ring_mode);
    assert_eq!(bench.line().ring_starts, 1);
    assert_eq!(bench.pots.caller_id_state(), CidState::Idle);

    let waited = bench
        .run_until(3_000, |bench| bench.pots.caller_id_state() != CidState::Idle)
        .expect("caller id after the first ring");
    assert!(waited >= 1_900, "caller id started {waited} ms into the ring");
    assert_eq!(bench.pots.ring_count(), 1);
    assert!(!bench.line().ring_mode);

    bench
        .run_until(1_000, |bench| bench.pots.tone_state() == ToneState::CallerIdPlaying)
        .expect("message on the line");
    assert_eq!(bench.pipeline.source(), AudioSource::Tone);

    // A ring request while the message plays must wait for it.
    bench.indicate(HfpIndication::Ring);
    bench.run_ms(50);
    assert_eq!(bench.line().ring_starts, 1);
}

#[test]
fn before_ring_caller_id_holds_the_first_ring() {
    let mut bench = Bench::connected(EUROPE);
    bench.indicate(HfpIndication::CallerNumber(number("0612345678")));
    bench.indicate(HfpIndication::Ring);
    bench.run_ms(60);

    assert_eq!(bench.call.state(), CallState::CallReceiving);
    assert_eq!(bench.pots.caller_id_state(), CidState::AlertTone);
    assert_eq!(bench.pots.tone_state(), ToneState::CallerIdPlaying);
    assert!(!bench.line().ring_mode);

    bench
        .run_until(3_000, |bench| bench.line().ring_mode)
        .expect("ring released after the message");
    assert_eq!(bench.pots.caller_id_state(), CidState::Idle);
    assert_eq!(bench.line().ring_starts, 1);
}

#[test]
fn unanswered_call_times_out_to_idle() {
    let mut bench = Bench::connected(UNITED_STATES);
    bench.indicate(HfpIndication::Ring);
    bench.run_ms(100);
    assert_eq!(bench.call.state(), CallState::CallReceiving);

    let waited = bench
        .run_until(10_000, |bench| bench.call.state() == CallState::Idle)
        .expect("ring timeout");
    assert!(waited >= 6_900, "gave up after {waited} ms");
    bench.run_ms(20);
    assert_eq!(bench.pots.ring_count(), 0);
    assert_eq!(bench.call.ring_count(), 0);
}

/// Indicator order a handset reports for a call ringing on it.
fn incoming_call(bench: &mut Bench, caller: &str) {
    bench.indicate(HfpIndication::CallSetup(CallSetup::Incoming));
    bench.run_ms(60);
    bench.indicate(HfpIndication::CallerNumber(number(caller)));
    bench.indicate(HfpIndication::Ring);
}

#[test]
fn lifting_the_phone_answers_and_routes_voice() {
    let mut bench = Bench::connected(UNITED_STATES);
    incoming_call(&mut bench, "5551234");
    bench.run_ms(300);
    assert_eq!(bench.link.state(), CellState::ConnectedIdle);
    assert_eq!(bench.call.state(), CallState::CallReceiving);

    bench.lift();
    assert!(!bench.line().ring_mode);
    assert_eq!(bench.call.state(), CallState::CallAnswering);
    assert_eq!(bench.radio.count(&HfpCommand::Answer), 1);

    bench.indicate(HfpIndication::CallSetup(CallSetup::Idle));
    bench.indicate(HfpIndication::Call(true));
    bench.indicate(HfpIndication::AudioOpened { wideband: false });
    bench.run_ms(100);

    assert_eq!(bench.link.state(), CellState::CallActive);
    assert_eq!(bench.call.state(), CallState::CallActiveVoice);
    assert_eq!(bench.pots.tone_state(), ToneState::Voice);
    assert_eq!(bench.pipeline.source(), AudioSource::Voice8k);
}

#[test]
fn incoming_setup_with_caller_id_is_answered_once() {
    let mut bench = Bench::connected(UNITED_STATES);
    incoming_call(&mut bench, "5551234");
    bench.run_ms(200);
    assert_eq!(bench.call.state(), CallState::CallReceiving);
    assert!(bench.line().ring_mode);
    assert_eq!(
        bench.bus.caller_number().as_ref().map(CallerNumber::as_str),
        Some("5551234")
    );

    bench.lift();
    bench.run_ms(500);
    assert_eq!(bench.call.state(), CallState::CallAnswering);
    assert_eq!(bench.link.state(), CellState::ConnectedIdle);
    assert_eq!(bench.radio.count(&HfpCommand::Answer), 1);
    assert_eq!(
        bench.call_history.as_slice(),
        &[CallState::Idle, CallState::CallReceiving, CallState::CallAnswering]
    );

    bench.indicate(HfpIndication::Call(true));
    bench.indicate(HfpIndication::CallSetup(CallSetup::Idle));
    bench.run_ms(100);
    assert_eq!(bench.call.state(), CallState::CallActive);
    assert_eq!(bench.radio.count(&HfpCommand::Answer), 1);
}

#[test]
fn handset_reject_of_incoming_setup_returns_to_idle() {
    let mut bench = Bench::connected(UNITED_STATES);
    incoming_call(&mut bench, "5551234");
    bench.run_ms(200);
    assert_eq!(bench.call.state(), CallState::CallReceiving);

    bench.indicate(HfpIndication::CallSetup(CallSetup::Idle));
    bench
        .run_until(10_000, |bench| bench.call.state() == CallState::Idle)
        .expect("ring timeout");
    assert_eq!(bench.link.state(), CellState::ConnectedIdle);
    assert_eq!(bench.radio.count(&HfpCommand::Answer), 0);
}

#[test]
fn far_end_hang_up_waits_for_the_handset_to_go_down() {
    let mut bench = Bench::connected(UNITED_STATES);
    incoming_call(&mut bench, "5551234");
    bench.run_ms(100);
    bench.lift();
    bench.indicate(HfpIndication::CallSetup(CallSetup::Idle));
    bench.indicate(HfpIndication::Call(true));
    bench.indicate(HfpIndication::AudioOpened { wideband: true });
    bench.run_ms(100);
    assert_eq!(bench.pipeline.source(), AudioSource::Voice16k);

    bench.indicate(HfpIndication::AudioClosed);
    bench.indicate(HfpIndication::Call(false));
    bench.run_ms(100);
    assert_eq!(bench.call.state(), CallState::CallEndingWaitOnHook);
    assert_eq!(bench.pots.tone_state(), ToneState::VoiceWaitHangup);

    bench.hang_up();
    assert_eq!(bench.call.state(), CallState::Idle);
    assert_eq!(bench.pots.tone_state(), ToneState::Idle);
}
