//! Ordered playback of multi-clip announcements.
use std::collections::VecDeque;

use exchange_traits::ClipSink;

use crate::hw_error::log_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next clip started.
    Next(String),
    /// The last clip finished; the queue is now inactive.
    Exhausted,
    /// No announcement was running.
    Inactive,
}

#[derive(Debug, Default)]
pub struct PromptQueue {
    clips: VecDeque<String>,
    active: bool,
}

impl PromptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running announcement and start playing `clips`.
    /// Returns false when nothing could be started.
    pub fn start<I>(&mut self, clips: I, sink: &mut dyn ClipSink) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        self.clips = clips.into_iter().collect();
        self.active = false;
        tracing::debug!(clips = self.clips.len(), "announcement start");
        self.play_next(sink).is_some()
    }

    pub fn on_clip_finished(&mut self, sink: &mut dyn ClipSink) -> Advance {
        if !self.active {
            return Advance::Inactive;
        }
        match self.play_next(sink) {
            Some(clip) => Advance::Next(clip),
            None => Advance::Exhausted,
        }
    }

    /// Abort silently; no exhaustion is reported.
    pub fn clear(&mut self) {
        self.clips.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> usize {
        self.clips.len()
    }

    // Clips the sink refuses are skipped.
    fn play_next(&mut self, sink: &mut dyn ClipSink) -> Option<String> {
        while let Some(clip) = self.clips.pop_front() {
            match sink.play(&clip) {
                Ok(()) => {
                    self.active = true;
                    return Some(clip);
                }
                Err(e) => log_failure("play", e.as_ref()),
            }
        }
        self.active = false;
        None
    }
}
