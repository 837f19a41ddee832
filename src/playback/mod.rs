pub mod audio;
pub mod deck;
pub mod sequencer;

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dataset::{Dataset, Sentence};
use crate::error::{DrillError, Result};
use crate::shuffle::Shuffler;
use audio::AudioManifest;

pub const MIN_SPEED: f32 = 0.1;
pub const MAX_SPEED: f32 = 3.0;

/// A deck's state, shared between control handlers and its running player.
pub type SharedState = Arc<Mutex<PlaybackState>>;

/// What happened at the end of a sentence's play cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved(usize),
    Stopped,
}

/// Display toggles for a flashcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardView {
    pub show_english: bool,
    pub show_pinyin: bool,
}

impl Default for CardView {
    fn default() -> Self {
        Self {
            show_english: true,
            show_pinyin: true,
        }
    }
}

/// Per-sentence repeat settings handed to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    pub repeat_english: u32,
    pub repeat_chinese: u32,
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleKey {
    is_playing: bool,
    index: usize,
    position: Option<usize>,
    speed: f32,
    repeat_english: u32,
    repeat_chinese: u32,
}

/// Position, ordering and modes of the flashcard player for one batch.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    group: String,
    batch: u32,
    sentences: Vec<Sentence>,
    order: Vec<usize>,
    index: usize,
    manifest: Arc<AudioManifest>,
    pub is_playing: bool,
    pub loop_mode: bool,
    shuffle_mode: bool,
    pub manual_mode: bool,
    speed: f32,
    repeat_english: u32,
    repeat_chinese: u32,
    bookmarks: BTreeSet<usize>,
    pub view: CardView,
}

impl PlaybackState {
    /// Loads one batch. Fails with `EmptyBatch` when no sentence matches.
    pub fn load(
        dataset: &Dataset,
        group: &str,
        batch: u32,
        manifest: AudioManifest,
        rng: &mut impl Shuffler,
    ) -> Result<Self> {
        let sentences = dataset.batch(group, batch);
        if sentences.is_empty() {
            return Err(DrillError::EmptyBatch {
                group: group.to_string(),
                batch,
            });
        }

        let mut state = Self {
            group: group.to_string(),
            batch,
            order: (0..sentences.len()).collect(),
            sentences,
            index: 0,
            manifest: Arc::new(manifest),
            is_playing: false,
            loop_mode: true,
            shuffle_mode: true,
            manual_mode: false,
            speed: 1.0,
            repeat_english: 1,
            repeat_chinese: 2,
            bookmarks: BTreeSet::new(),
            view: CardView::default(),
        };
        state.reorder(rng);
        Ok(state)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn batch(&self) -> u32 {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn manifest(&self) -> &AudioManifest {
        &self.manifest
    }

    pub fn shuffle_mode(&self) -> bool {
        self.shuffle_mode
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn repeat_english(&self) -> u32 {
        self.repeat_english
    }

    pub fn repeat_chinese(&self) -> u32 {
        self.repeat_chinese
    }

    pub fn bookmarks(&self) -> &BTreeSet<usize> {
        &self.bookmarks
    }

    /// Index into the batch of the sentence under the cursor, if the cursor is valid.
    pub fn current_position(&self) -> Option<usize> {
        self.order
            .get(self.index)
            .copied()
            .filter(|&i| i < self.sentences.len())
    }

    pub fn current_sentence(&self) -> Option<&Sentence> {
        self.current_position().map(|i| &self.sentences[i])
    }

    pub fn is_bookmarked(&self) -> bool {
        self.bookmarks.contains(&self.index)
    }

    /// Fields whose change interrupts the clip that is playing.
    pub fn cycle_key(&self) -> CycleKey {
        CycleKey {
            is_playing: self.is_playing,
            index: self.index,
            position: self.current_position(),
            speed: self.speed,
            repeat_english: self.repeat_english,
            repeat_chinese: self.repeat_chinese,
        }
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            repeat_english: self.repeat_english,
            repeat_chinese: self.repeat_chinese,
            speed: self.speed,
        }
    }

    pub fn set_shuffle(&mut self, enabled: bool, rng: &mut impl Shuffler) {
        self.shuffle_mode = enabled;
        self.reorder(rng);
    }

    fn reorder(&mut self, rng: &mut impl Shuffler) {
        self.order = (0..self.sentences.len()).collect();
        if self.shuffle_mode {
            rng.shuffle(&mut self.order);
        }
        if self.index >= self.order.len() {
            self.index = 0;
        }
    }

    pub fn next(&mut self) {
        let len = self.order.len();
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
    }

    pub fn prev(&mut self) {
        let len = self.order.len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }

    /// Step taken after a finished cycle: wraps in loop mode, otherwise stops on the last card.
    pub fn auto_advance(&mut self) -> Advance {
        let len = self.order.len();
        if len == 0 {
            self.is_playing = false;
            return Advance::Stopped;
        }
        if self.index + 1 < len {
            self.index += 1;
            Advance::Moved(self.index)
        } else if self.loop_mode {
            self.index = 0;
            Advance::Moved(0)
        } else {
            self.is_playing = false;
            Advance::Stopped
        }
    }

    pub fn increase_speed(&mut self) {
        self.speed = round_speed(self.speed + 0.1).min(MAX_SPEED);
    }

    pub fn decrease_speed(&mut self) {
        self.speed = round_speed(self.speed - 0.1).max(MIN_SPEED);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = round_speed(speed).clamp(MIN_SPEED, MAX_SPEED);
    }

    pub fn set_repeat_english(&mut self, times: u32) {
        self.repeat_english = times.max(1);
    }

    pub fn set_repeat_chinese(&mut self, times: u32) {
        self.repeat_chinese = times.max(1);
    }

    /// Returns whether the current card is bookmarked afterwards.
    pub fn toggle_bookmark(&mut self) -> bool {
        if self.order.is_empty() {
            return false;
        }
        if self.bookmarks.remove(&self.index) {
            false
        } else {
            self.bookmarks.insert(self.index);
            true
        }
    }
}

fn round_speed(speed: f32) -> f32 {
    (speed * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) fn test_dataset(size: u32) -> Dataset {
    use crate::dataset::sentence;
    let mut sentences: Vec<Sentence> = (1..=size)
        .map(|id| sentence(id, &format!("Sentence number {}.", id), "HSK1", 1))
        .collect();
    sentences.push(sentence(100, "Other batch.", "HSK1", 2));
    Dataset::new(sentences)
}

#[cfg(test)]
pub(crate) fn sequential_state(size: u32) -> PlaybackState {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(0);
    let mut state = PlaybackState::load(
        &test_dataset(size),
        "HSK1",
        1,
        AudioManifest::default(),
        &mut rng,
    )
    .unwrap();
    state.set_shuffle(false, &mut rng);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn load_filters_batch_and_resets() {
        let state = sequential_state(4);
        assert_eq!(state.len(), 4);
        assert_eq!(state.index(), 0);
        assert_eq!(state.order(), &[0, 1, 2, 3]);
        assert!(state.bookmarks().is_empty());
        assert_eq!(state.repeat_english(), 1);
        assert_eq!(state.repeat_chinese(), 2);
        assert!(!state.is_playing);
    }

    #[test]
    fn empty_batch_is_reported() {
        let err = PlaybackState::load(
            &test_dataset(2),
            "HSK5",
            1,
            AudioManifest::default(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();
        assert!(matches!(err, DrillError::EmptyBatch { batch: 1, .. }));
    }

    #[test]
    fn shuffled_order_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(4);
        let state =
            PlaybackState::load(&test_dataset(30), "HSK1", 1, AudioManifest::default(), &mut rng)
                .unwrap();
        assert!(state.shuffle_mode());
        let mut order = state.order().to_vec();
        order.sort();
        assert_eq!(order, (0..30).collect::<Vec<_>>());
        assert_ne!(state.order(), (0..30).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn turning_shuffle_off_restores_identity() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut state =
            PlaybackState::load(&test_dataset(10), "HSK1", 1, AudioManifest::default(), &mut rng)
                .unwrap();
        state.set_shuffle(false, &mut rng);
        assert_eq!(state.order(), (0..10).collect::<Vec<_>>().as_slice());
        state.set_shuffle(true, &mut rng);
        assert_eq!(state.order().len(), 10);
    }

    #[test]
    fn manual_navigation_wraps() {
        let mut state = sequential_state(3);
        state.prev();
        assert_eq!(state.index(), 2);
        state.next();
        assert_eq!(state.index(), 0);
        state.next();
        state.next();
        state.next();
        assert_eq!(state.index(), 0);
    }

    #[test]
    fn auto_advance_loops_or_stops() {
        let mut state = sequential_state(2);
        state.is_playing = true;
        assert_eq!(state.auto_advance(), Advance::Moved(1));
        assert_eq!(state.auto_advance(), Advance::Moved(0));

        state.loop_mode = false;
        state.next();
        assert_eq!(state.auto_advance(), Advance::Stopped);
        assert_eq!(state.index(), 1);
        assert!(!state.is_playing);
    }

    #[test]
    fn speed_is_clamped_and_rounded() {
        let mut state = sequential_state(1);
        state.speed = 2.95;
        state.increase_speed();
        assert_eq!(state.speed(), 3.0);
        for _ in 0..5 {
            state.increase_speed();
            assert!(state.speed() <= MAX_SPEED);
        }
        assert_eq!(state.speed(), 3.0);

        state.speed = 0.15;
        state.decrease_speed();
        assert_eq!(state.speed(), 0.1);
        for _ in 0..5 {
            state.decrease_speed();
            assert!(state.speed() >= MIN_SPEED);
        }
        assert_eq!(state.speed(), 0.1);

        state.set_speed(1.0);
        for _ in 0..7 {
            state.increase_speed();
        }
        assert_eq!(state.speed(), 1.7);

        state.set_speed(9.0);
        assert_eq!(state.speed(), MAX_SPEED);
    }

    #[test]
    fn cycle_key_ignores_display_and_mode_toggles() {
        let mut state = sequential_state(3);
        let key = state.cycle_key();
        state.loop_mode = false;
        state.manual_mode = true;
        state.view.show_pinyin = false;
        state.toggle_bookmark();
        assert_eq!(state.cycle_key(), key);

        state.increase_speed();
        assert_ne!(state.cycle_key(), key);
    }

    #[test]
    fn repeats_stay_positive() {
        let mut state = sequential_state(1);
        state.set_repeat_english(0);
        state.set_repeat_chinese(3);
        assert_eq!(state.repeat_english(), 1);
        assert_eq!(state.repeat_chinese(), 3);
    }

    #[test]
    fn bookmark_toggles_current_index() {
        let mut state = sequential_state(3);
        state.next();
        assert!(state.toggle_bookmark());
        assert!(state.is_bookmarked());
        assert!(state.bookmarks().contains(&1));
        assert!(!state.toggle_bookmark());
        assert!(state.bookmarks().is_empty());
    }

    #[test]
    fn current_sentence_follows_order() {
        let mut state = sequential_state(3);
        state.next();
        assert_eq!(state.current_sentence().map(|s| s.id), Some(2));
    }
}
