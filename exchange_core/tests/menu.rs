mod common;

use common::*;
use exchange_core::LineState;
use rstest::rstest;

fn in_menu() -> Rig {
    let mut rig = Rig::new();
    rig.pickup();
    rig.call("0");
    assert_eq!(rig.sink.current().as_deref(), Some(MENU));
    rig.finish();
    assert_eq!(rig.ex.status().state, LineState::OffHookVoiceMenu);
    rig
}

#[test]
fn menu_item_runs_immediately_and_menu_is_reannounced() {
    let mut rig = in_menu();
    rig.dial("1");
    // No daily alarm configured and no wall clock.
    assert_eq!(rig.sink.current(), Some(spoken("no_alarm")));
    rig.finish();
    assert_eq!(rig.count(MENU), 1);
    rig.advance(150);
    assert_eq!(rig.count(MENU), 1);
    rig.advance(60);
    assert_eq!(rig.count(MENU), 2);
}

#[test]
fn hang_up_during_reannounce_delay_cancels_menu() {
    let mut rig = in_menu();
    rig.dial("4");
    rig.finish_all();
    rig.hang_up();
    rig.advance(1000);
    assert_eq!(rig.count(MENU), 1);
    assert_eq!(rig.ex.status().state, LineState::OnHookIdle);
}

#[rstest]
#[case("7")]
#[case("0")]
#[case("9")]
fn invalid_choice_is_reported_and_menu_repeats(#[case] choice: &str) {
    let mut rig = in_menu();
    rig.call(choice);
    assert_eq!(rig.count(INVALID_NUMBER), 1);
    rig.finish();
    rig.advance(201);
    assert_eq!(rig.count(MENU), 2);
}

#[test]
fn night_toggle_from_menu() {
    let mut rig = in_menu();
    assert!(!rig.ex.status().night_mode);
    rig.dial("2");
    assert_eq!(rig.sink.current(), Some(spoken("night_on")));
    assert!(rig.ex.status().night_mode);
    rig.finish();
    rig.advance(201);
    rig.finish();
    rig.dial("2");
    assert_eq!(rig.sink.current(), Some(spoken("night_off")));
    assert!(!rig.ex.status().night_mode);
}

#[test]
fn toggles_alarm_flags() {
    let mut rig = in_menu();
    rig.dial("5");
    assert_eq!(rig.sink.current(), Some(spoken("alarms_off")));
    assert!(!rig.ex.status().alarms_enabled);
    rig.finish();
    rig.advance(201);
    rig.finish();
    rig.dial("6");
    assert_eq!(rig.sink.current(), Some(spoken("alarm_skipped")));
    assert!(rig.ex.status().skip_next_alarm);
}

#[test]
fn phonebook_listing_speaks_numbers() {
    let mut rig = in_menu();
    rig.dial("3");
    assert_eq!(rig.sink.current(), Some(spoken("phonebook")));
    rig.finish_all();
    let played = rig.played();
    // "0" is the first number in the factory phonebook.
    let intro = played
        .iter()
        .position(|p| *p == spoken("phonebook"))
        .expect("intro");
    assert_eq!(played[intro + 1], number_clip(0));
}

#[test]
fn system_codes_outside_the_menu() {
    let mut rig = Rig::new();
    rig.pickup();
    rig.call("90");
    assert_eq!(rig.sink.current(), Some(spoken("alarms_off")));
    rig.hang_up();
    rig.pickup();
    rig.call("91");
    assert_eq!(rig.sink.current(), Some(spoken("alarm_skipped")));
    let st = rig.ex.status();
    assert!(!st.alarms_enabled);
    assert!(st.skip_next_alarm);
}
