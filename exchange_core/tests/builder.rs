use exchange_core::config::ExchangeConfig;
use exchange_core::mocks::RecordingSink;
use exchange_core::{BuildError, Exchange, LineState};
use rstest::rstest;

#[test]
fn try_build_without_sink_fails() {
    let err = Exchange::builder().try_build().expect_err("no sink");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingSink)
    ));
}

#[test]
fn defaults_build_and_start_on_hook() {
    let mut ex = Exchange::builder()
        .with_sink(RecordingSink::new())
        .build()
        .expect("build");
    ex.start();
    assert_eq!(ex.status().state, LineState::OnHookIdle);
}

fn broken(f: impl FnOnce(&mut ExchangeConfig)) -> ExchangeConfig {
    let mut c = ExchangeConfig::default();
    f(&mut c);
    c
}

#[rstest]
#[case(broken(|c| c.input.tick_ms = 0))]
#[case(broken(|c| c.line.poll_ms = 0))]
#[case(broken(|c| c.line.menu_items = 0))]
#[case(broken(|c| c.alarm.timer_min_minutes = 0))]
#[case(broken(|c| c.alarm.timer_max_minutes = 1000))]
#[case(broken(|c| c.alarm.fade_floor = 0.0))]
#[case(broken(|c| c.route.night_volume_percent = 101))]
#[case(broken(|c| c.alarm.alarm_min_volume = 95))]
fn invalid_config_is_rejected(#[case] cfg: ExchangeConfig) {
    let err = Exchange::builder()
        .with_sink(RecordingSink::new())
        .with_config(cfg)
        .build()
        .expect_err("invalid");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn config_conversion_keeps_values() {
    let mut file = exchange_config::Config::default();
    file.line.inter_digit_ms = 3000;
    file.alarm.timer_ring_minutes = 2;
    file.night.volume_percent = 40;
    let cfg = ExchangeConfig::from(&file);
    assert_eq!(cfg.line.inter_digit_ms, 3000);
    assert_eq!(cfg.alarm.timer_ring_ms, 120_000);
    assert_eq!(cfg.route.night_volume_percent, 40);
}
