use exchange_core::mocks::{MockPin, RecordingSink};
use exchange_core::{Exchange, Inputs, LineState};
use exchange_traits::{HookState, Route};

#[test]
fn hook_pin_drives_the_line_through_the_tick_thread() {
    let sink = RecordingSink::new();
    let mut ex = Exchange::builder()
        .with_sink(sink.clone())
        .build()
        .expect("build");
    ex.start();
    sink.finish();
    ex.pump();

    let hook = MockPin::new(true);
    let tick = ex.spawn_inputs(Inputs {
        hook: Box::new(hook.clone()),
        button: None,
        mode: None,
    });
    hook.set(false);

    let mut off_hook = false;
    for _ in 0..50 {
        ex.run_once();
        if ex.status().hook == HookState::OffHook {
            off_hook = true;
            break;
        }
    }
    drop(tick);
    assert!(off_hook, "hook change never arrived");
    let st = ex.status();
    assert_eq!(st.state, LineState::OffHookDialTone);
    assert_eq!(st.effective_route, Route::Handset);
}

#[test]
fn pulses_from_interrupt_become_a_digit() {
    let sink = RecordingSink::new();
    let mut ex = Exchange::builder()
        .with_sink(sink.clone())
        .build()
        .expect("build");
    ex.start();
    let counter = ex.pulse_counter();
    let hook = MockPin::new(true);
    let mut poller = ex.input_poller(Inputs {
        hook: Box::new(hook),
        button: None,
        mode: None,
    });
    for i in 0..4u64 {
        counter.on_edge(true, 1_000 + i * 100);
    }
    assert!(poller.poll(1_500).is_empty());
    let events = poller.poll(2_000);
    assert_eq!(events, vec![exchange_core::LineEvent::Digit(4)]);
}
