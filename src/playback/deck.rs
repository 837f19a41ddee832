use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error};
use tokio::sync::{mpsc, Mutex};

use crate::playback::audio::AudioService;
use crate::playback::sequencer::{PlaybackEvent, Player};
use crate::playback::{PlaybackState, SharedState};

/// An open batch and the player running over it, if any.
pub struct Deck<A> {
    audio: Arc<A>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    state: SharedState,
    player: Option<Player>,
}

impl<A: AudioService + 'static> Deck<A> {
    pub fn new(
        audio: Arc<A>,
        state: PlaybackState,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        Self {
            audio,
            events,
            state: Arc::new(parking_lot::Mutex::new(state)),
            player: None,
        }
    }

    fn spawn(&self) -> Player {
        Player::start(self.audio.clone(), self.state.clone(), self.events.clone())
    }

    /// Applies `change`. The current cycle is restarted only when the change
    /// touches what is being played; other changes reach the player in place.
    pub async fn update<R>(&mut self, change: impl FnOnce(&mut PlaybackState) -> R) -> R {
        let (result, restart, playing) = {
            let mut state = self.state.lock();
            let before = state.cycle_key();
            let result = change(&mut state);
            let restart = state.cycle_key() != before;
            if restart {
                // Raised under the lock so the player cannot advance past this change.
                if let Some(player) = &self.player {
                    player.cancel();
                }
            }
            (result, restart, state.is_playing)
        };

        if !restart {
            if let Some(player) = &self.player {
                player.nudge();
            }
            return result;
        }
        self.stop().await;
        if playing {
            self.player = Some(self.spawn());
        }
        result
    }

    async fn stop(&mut self) {
        if let Some(player) = self.player.take() {
            if let Err(e) = player.stop().await {
                error!("Player task failed: {}", e);
            }
        }
    }
}

/// Open decks by chat. Each deck has its own lock, so one chat waiting on its
/// player never blocks another chat.
pub struct Decks<A> {
    decks: Mutex<HashMap<i64, Arc<Mutex<Deck<A>>>>>,
}

impl<A: AudioService + 'static> Default for Decks<A> {
    fn default() -> Self {
        Self {
            decks: Mutex::new(HashMap::new()),
        }
    }
}

impl<A: AudioService + 'static> Decks<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, chat: i64, deck: Deck<A>) {
        let previous = self
            .decks
            .lock()
            .await
            .insert(chat, Arc::new(Mutex::new(deck)));
        if let Some(previous) = previous {
            debug!("Replacing open deck for chat {}", chat);
            previous.lock().await.stop().await;
        }
    }

    /// Applies `change` to the chat's deck. `None` when the chat has no open deck.
    pub async fn update<R>(
        &self,
        chat: i64,
        change: impl FnOnce(&mut PlaybackState) -> R,
    ) -> Option<R> {
        let deck = self.decks.lock().await.get(&chat).cloned()?;
        let mut deck = deck.lock().await;
        Some(deck.update(change).await)
    }

    /// Stops playback and forgets the deck.
    pub async fn close(&self, chat: i64) -> bool {
        let removed = self.decks.lock().await.remove(&chat);
        match removed {
            Some(deck) => {
                deck.lock().await.stop().await;
                true
            }
            None => false,
        }
    }
}
