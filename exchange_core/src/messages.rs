//! Themed message ("persona") selection.
//!
//! Each category folder is played in a shuffled order without repeats until
//! every clip has been heard once.
use std::collections::{HashMap, VecDeque};

use exchange_traits::Assets;

use crate::clips::ClipCatalog;

pub const PERSONA_CATEGORIES: u8 = 5;

/// xorshift32; good enough to shuffle a playlist.
#[derive(Debug, Clone)]
struct XorShift32(u32);

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0x9E37_79B9 } else { seed })
    }

    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() as usize) % n.max(1)
    }
}

#[derive(Debug)]
pub struct MessageLibrary {
    rng: XorShift32,
    /// Key 0 is the mix over all categories.
    queues: HashMap<u8, VecDeque<String>>,
}

impl MessageLibrary {
    pub fn new(seed: u32) -> Self {
        Self {
            rng: XorShift32::new(seed),
            queues: HashMap::new(),
        }
    }

    /// Next clip for `category` (1..=5), or from all categories when `None`.
    pub fn pick(
        &mut self,
        category: Option<u8>,
        catalog: &ClipCatalog,
        assets: &dyn Assets,
    ) -> Option<String> {
        let key = category.unwrap_or(0);
        let needs_refill = self.queues.get(&key).is_none_or(VecDeque::is_empty);
        if needs_refill {
            let mut files: Vec<String> = match category {
                Some(c) => assets.list(&catalog.persona_folder(c)),
                None => (1..=PERSONA_CATEGORIES)
                    .flat_map(|c| assets.list(&catalog.persona_folder(c)))
                    .collect(),
            };
            if files.is_empty() {
                tracing::warn!(category = key, "no themed messages available");
                return None;
            }
            files.sort();
            // Fisher-Yates
            for i in (1..files.len()).rev() {
                let j = self.rng.below(i + 1);
                files.swap(i, j);
            }
            self.queues.insert(key, files.into());
        }
        self.queues.get_mut(&key).and_then(VecDeque::pop_front)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClipCfg;
    use crate::mocks::MemoryAssets;

    #[test]
    fn every_clip_once_per_round() {
        let assets = MemoryAssets::with(&[
            "/persona_01/a.mp3",
            "/persona_01/b.mp3",
            "/persona_01/c.mp3",
            "/persona_02/x.mp3",
        ]);
        let catalog = ClipCatalog::new(&ClipCfg::default());
        let mut lib = MessageLibrary::new(7);
        let mut round: Vec<String> = (0..3)
            .filter_map(|_| lib.pick(Some(1), &catalog, &assets))
            .collect();
        round.sort();
        assert_eq!(round, vec!["/persona_01/a.mp3", "/persona_01/b.mp3", "/persona_01/c.mp3"]);
        assert!(lib.pick(Some(1), &catalog, &assets).is_some());
    }

    #[test]
    fn mix_spans_categories_and_empty_is_none() {
        let assets = MemoryAssets::with(&["/persona_01/a.mp3", "/persona_05/z.mp3"]);
        let catalog = ClipCatalog::new(&ClipCfg::default());
        let mut lib = MessageLibrary::new(1);
        let mut mix: Vec<String> = (0..2)
            .filter_map(|_| lib.pick(None, &catalog, &assets))
            .collect();
        mix.sort();
        assert_eq!(mix, vec!["/persona_01/a.mp3", "/persona_05/z.mp3"]);
        assert!(lib.pick(Some(3), &catalog, &assets).is_none());
    }
}
