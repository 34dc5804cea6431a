mod common;

use common::*;
use exchange_config::FileAlarmStore;
use exchange_core::AlarmSource;
use exchange_traits::{AlarmStore, DayAlarm, Route, VolumeStore};

const FALLBACK: &str = "/system/fallback_alarm.wav";

fn monday_seven(ramp: bool) -> Rig {
    let mut store = FileAlarmStore::in_memory();
    store
        .set(
            1,
            DayAlarm {
                hour: 7,
                minute: 0,
                active: true,
                ramp_enabled: ramp,
                use_random_message: false,
                ringtone: String::new(),
            },
        )
        .expect("store");
    Rig::with(Options {
        alarms: store,
        wall: Some(monday(6, 59)),
        ..Options::default()
    })
}

#[test]
fn daily_alarm_fades_in_and_fires_once_per_day() {
    let mut rig = monday_seven(true);
    let targets = rig.ex.gain_targets();
    rig.advance(1000);
    assert!(rig.ex.status().alarm.is_none());

    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    let alarm = rig.ex.status().alarm.expect("ringing");
    assert_eq!(alarm.source, AlarmSource::Daily);
    assert_eq!(rig.sink.current().as_deref(), Some(FALLBACK));
    let mut last = targets.get().1;
    assert!((last - 0.5 * 0.05).abs() < 1e-6, "starts at the floor, got {last}");

    for _ in 0..12 {
        rig.advance(10_000);
        let r = targets.get().1;
        assert!(r >= last, "gain dropped from {last} to {r}");
        last = r;
    }
    assert!((last - 0.5).abs() < 1e-6);

    // Ring bound ends it; the same minute does not fire again.
    rig.advance(180_000);
    assert!(rig.ex.status().alarm.is_none());
    rig.advance(1000);
    assert!(rig.ex.status().alarm.is_none());
    assert_eq!(rig.count(FALLBACK), 1);
}

#[test]
fn daily_alarm_without_ramp_rings_at_full_gain() {
    let mut rig = monday_seven(false);
    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    let alarm = rig.ex.status().alarm.expect("ringing");
    assert!((alarm.fade - 1.0).abs() < f32::EPSILON);
    assert!((rig.ex.gain_targets().get().1 - 0.5).abs() < 1e-6);
}

#[test]
fn pickup_snoozes_daily_alarm_and_snooze_rings_again() {
    let mut rig = monday_seven(false);
    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    rig.pickup();
    let st = rig.ex.status();
    assert!(st.alarm.is_none());
    let snooze = st.timer.expect("snooze armed");
    assert!(snooze.snooze);
    assert_eq!(snooze.minutes, 5);
    assert_eq!(st.effective_route, Route::Handset);

    // No busy tone while the snooze is pending.
    rig.advance(10_000);
    assert_ne!(rig.sink.current().as_deref(), Some(BUSY_TONE));

    rig.hang_up();
    assert!(rig.ex.status().timer.is_none(), "hang-up cancels the snooze");
}

#[test]
fn snooze_alarm_pickup_announces_alarm_stopped() {
    let mut rig = monday_seven(false);
    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    rig.pickup();
    rig.advance(5 * 60_000);
    let alarm = rig.ex.status().alarm.expect("snooze rings");
    assert!(alarm.snooze_origin);
    assert_eq!(alarm.source, AlarmSource::Timer);
    assert_eq!(rig.ex.status().effective_route, Route::Speaker);

    // Hanging up does not silence an alarm; the next pickup does.
    rig.hang_up();
    assert!(rig.ex.status().alarm.is_some());
    rig.pickup();
    assert!(rig.ex.status().alarm.is_none());
    assert_eq!(rig.sink.current(), Some(spoken("alarm_stopped")));
    rig.finish();
    assert_eq!(rig.sink.current().as_deref(), Some(DIAL_TONE));
}

#[test]
fn disabled_alarms_do_not_fire() {
    let mut rig = monday_seven(false);
    rig.pickup();
    rig.call("90");
    rig.hang_up();
    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    assert!(rig.ex.status().alarm.is_none());
}

#[test]
fn skip_next_suppresses_one_alarm() {
    let mut rig = monday_seven(false);
    rig.pickup();
    rig.call("91");
    rig.hang_up();
    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    let st = rig.ex.status();
    assert!(st.alarm.is_none());
    assert!(!st.skip_next_alarm);
}

#[test]
fn next_alarm_is_announced_in_menu() {
    let mut rig = monday_seven(false);
    rig.pickup();
    rig.call("0");
    rig.finish();
    rig.dial("1");
    rig.finish_all();
    let played = rig.played();
    let at = played
        .iter()
        .position(|p| *p == spoken("next_alarm"))
        .expect("next alarm");
    assert_eq!(played[at + 1], "/time/de/wday_1.mp3");
    assert_eq!(played[at + 2], "/time/de/h_7.mp3");
    assert_eq!(played[at + 3], "/time/de/uhr.mp3");
}

#[test]
fn ring_bound_restores_raised_volume_once() {
    let volumes = SharedVolumes::new(60, 30);
    let mut store = FileAlarmStore::in_memory();
    store
        .set(
            1,
            DayAlarm {
                hour: 7,
                minute: 0,
                active: true,
                ramp_enabled: false,
                use_random_message: false,
                ringtone: String::new(),
            },
        )
        .expect("store");
    let mut rig = Rig::with(Options {
        alarms: store,
        wall: Some(monday(6, 59)),
        volumes: Some(volumes.clone()),
        ..Options::default()
    });

    rig.wall.set(Some(monday(7, 0)));
    rig.advance(0);
    assert!(rig.ex.status().alarm.is_some());
    assert_eq!(volumes.writes(), vec![(Route::Speaker, 90)]);

    rig.advance(300_001);
    assert!(rig.ex.status().alarm.is_none());
    rig.advance(60_000);
    assert_eq!(
        volumes.writes(),
        vec![(Route::Speaker, 90), (Route::Speaker, 30)]
    );
    assert_eq!(volumes.get(Route::Speaker), 30);
}
