mod common;

use common::*;
use exchange_core::mocks::SinkCmd;
use exchange_core::{AlarmSource, LineState};
use exchange_traits::Route;

const TIMER_RINGTONE: &str = "/ringtones/standard_ringtone.wav";

#[test]
fn out_of_range_timer_is_rejected_with_maximum() {
    let mut rig = Rig::new();
    rig.dial("501");
    assert_eq!(
        rig.ex.status().state,
        LineState::OnHookCollectingTimerDigits
    );
    rig.advance(2001);
    assert!(rig.ex.status().timer.is_none());
    rig.finish_all();
    assert_eq!(
        rig.played(),
        vec![
            spoken("timer_invalid"),
            spoken("timer_max"),
            number_clip(500),
            spoken("minutes"),
        ]
    );
    assert!(rig.ex.status().timer.is_none());
}

#[test]
fn maximum_timer_is_accepted() {
    let mut rig = Rig::new();
    rig.call("500");
    let timer = rig.ex.status().timer.expect("timer armed");
    assert_eq!(timer.minutes, 500);
    assert!(timer.announcement_pending);
    rig.finish_all();
    assert_eq!(
        rig.played(),
        vec![spoken("timer_confirm"), number_clip(500), spoken("minutes")]
    );
    assert!(!rig.ex.status().timer.expect("timer").announcement_pending);
}

#[test]
fn four_digit_timer_is_rejected() {
    let mut rig = Rig::new();
    rig.call("0005");
    assert!(rig.ex.status().timer.is_none());
    assert_eq!(rig.sink.current(), Some(spoken("timer_invalid")));
}

#[test]
fn zero_minutes_is_rejected() {
    let mut rig = Rig::new();
    rig.call("0");
    assert!(rig.ex.status().timer.is_none());
}

#[test]
fn timer_rings_on_speaker_and_stops_after_ring_time() {
    let mut rig = Rig::new();
    rig.call("1");
    rig.finish_all();
    rig.advance(59_000);
    assert!(rig.ex.status().alarm.is_none());
    rig.advance(1_000);
    let alarm = rig.ex.status().alarm.expect("ringing");
    assert_eq!(alarm.source, AlarmSource::Timer);
    assert_eq!(rig.sink.current().as_deref(), Some(TIMER_RINGTONE));
    assert_eq!(rig.ex.status().effective_route, Route::Speaker);

    // The ringtone loops while the alarm lasts.
    rig.finish();
    assert_eq!(rig.count(TIMER_RINGTONE), 2);

    rig.advance(180_000);
    assert!(rig.ex.status().alarm.is_none());
    assert_eq!(rig.sink.current(), None);
}

#[test]
fn stalled_alarm_playback_is_retried() {
    let mut rig = Rig::new();
    rig.call("1");
    rig.finish_all();
    rig.advance(60_000);
    assert_eq!(rig.count(TIMER_RINGTONE), 1);
    rig.sink.stall();
    rig.advance(100);
    rig.advance(2_000);
    assert_eq!(rig.count(TIMER_RINGTONE), 2);
}

#[test]
fn pickup_during_timer_alarm_deletes_it_on_speaker_then_restores_handset() {
    let mut rig = Rig::new();
    rig.call("1");
    rig.finish_all();
    rig.advance(60_000);
    assert!(rig.ex.status().alarm.is_some());
    rig.sink.clear_log();

    rig.pickup();
    let st = rig.ex.status();
    assert!(st.alarm.is_none());
    assert!(st.timer.is_none());
    assert_eq!(st.requested_route, Route::Handset);
    assert_eq!(st.effective_route, Route::Speaker);
    assert_eq!(rig.sink.current(), Some(spoken("timer_deleted")));

    rig.finish();
    assert_eq!(rig.ex.status().effective_route, Route::Handset);
    assert_eq!(rig.sink.current().as_deref(), Some(DIAL_TONE));
    let cmds = rig.sink.commands();
    let deleted = cmds
        .iter()
        .position(|c| *c == SinkCmd::Play(spoken("timer_deleted")))
        .expect("deleted");
    let to_handset = cmds
        .iter()
        .position(|c| *c == SinkCmd::Route(Route::Handset))
        .expect("handset");
    assert!(deleted < to_handset);
}

#[test]
fn button_dismisses_timer_alarm() {
    let mut rig = Rig::new();
    rig.call("1");
    rig.finish_all();
    rig.advance(60_000);
    rig.button();
    let st = rig.ex.status();
    assert!(st.alarm.is_none());
    assert!(st.timer.is_none());
    assert!(rig.sink.commands().contains(&SinkCmd::Stop));
}
