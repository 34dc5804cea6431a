//! Level debouncing for slow contacts (hook switch, button, dial mode contact).

/// Accepts a new level once the raw input has disagreed with the stable level
/// for longer than `debounce_ms`. Any agreeing sample restarts the window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    stable: bool,
    last_agree_ms: u64,
    debounce_ms: u64,
}

impl Debouncer {
    pub fn new(initial: bool, debounce_ms: u64) -> Self {
        Self {
            stable: initial,
            last_agree_ms: 0,
            debounce_ms,
        }
    }

    /// Feed one raw sample; returns the new stable level when it changed.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> Option<bool> {
        if raw == self.stable {
            self.last_agree_ms = now_ms;
            return None;
        }
        if now_ms.saturating_sub(self.last_agree_ms) > self.debounce_ms {
            self.stable = raw;
            self.last_agree_ms = now_ms;
            return Some(raw);
        }
        None
    }

    pub fn stable(&self) -> bool {
        self.stable
    }
}
