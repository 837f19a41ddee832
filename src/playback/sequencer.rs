use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::{JoinError, JoinHandle};

use crate::dataset::Sentence;
use crate::error::Result;
use crate::playback::audio::{AudioManifest, AudioService, ClipRequest, Language};
use crate::playback::{Advance, CardView, CycleSettings, SharedState};

/// Progress reported by a running player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A new card is about to be played.
    Showing {
        index: usize,
        total: usize,
        sentence: Sentence,
        view: CardView,
    },
    /// Reached the last card without loop mode.
    Finished,
    /// Playback stopped on an audio error, or there was nothing to play.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEnd {
    Completed,
    /// No clip of the sentence is in the manifest.
    Silent,
    Cancelled,
}

/// Plays English `repeat_english` times then Chinese `repeat_chinese` times,
/// one clip at a time. Clips missing from the manifest are skipped.
pub async fn play_sentence<A: AudioService>(
    audio: &A,
    manifest: &AudioManifest,
    sentence: &Sentence,
    settings: CycleSettings,
    cancel: &mut watch::Receiver<bool>,
) -> Result<CycleEnd> {
    let phases = [
        (Language::English, settings.repeat_english),
        (Language::Chinese, settings.repeat_chinese),
    ];
    let mut played = 0;
    for (language, repeats) in phases {
        let Some(asset) = manifest.get(sentence.id, language) else {
            warn!("No {:?} audio for sentence {}", language, sentence.id);
            continue;
        };
        for repeat in 1..=repeats {
            let clip = ClipRequest {
                sentence_id: sentence.id,
                language,
                repeat,
                asset: asset.to_path_buf(),
            };
            if play_clip(audio, &clip, settings.speed, cancel).await? == CycleEnd::Cancelled {
                return Ok(CycleEnd::Cancelled);
            }
            played += 1;
        }
    }
    Ok(if played == 0 {
        CycleEnd::Silent
    } else {
        CycleEnd::Completed
    })
}

async fn play_clip<A: AudioService>(
    audio: &A,
    clip: &ClipRequest,
    speed: f32,
    cancel: &mut watch::Receiver<bool>,
) -> Result<CycleEnd> {
    if is_cancelled(cancel) {
        return Ok(CycleEnd::Cancelled);
    }
    let handle = tokio::select! {
        handle = audio.play(clip, speed) => handle?,
        _ = cancelled(cancel) => return Ok(CycleEnd::Cancelled),
    };
    let outcome = tokio::select! {
        done = audio.wait(&handle) => done.map(|_| CycleEnd::Completed),
        _ = cancelled(cancel) => Ok(CycleEnd::Cancelled),
    };
    audio.release(&handle).await;
    outcome
}

fn is_cancelled(cancel: &mut watch::Receiver<bool>) -> bool {
    *cancel.borrow_and_update()
}

/// Resolves once the flag is raised or its sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if is_cancelled(cancel) {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Drives cycles until cancelled, stopped at the end, or out of audio.
/// In manual mode it holds the card until cancelled or manual mode is turned off.
///
/// The cancel flag is checked under the state lock before every write, so a
/// change made by the caller is never overwritten by a late auto-advance.
async fn run<A: AudioService>(
    audio: &A,
    shared: SharedState,
    mut cancel: watch::Receiver<bool>,
    nudge: Arc<Notify>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
) {
    let mut silent = 0;
    loop {
        let (sentence, manifest, settings) = {
            let mut state = shared.lock();
            if is_cancelled(&mut cancel) || !state.is_playing {
                return;
            }
            let Some(sentence) = state.current_sentence().cloned() else {
                state.is_playing = false;
                return;
            };
            let _ = events.send(PlaybackEvent::Showing {
                index: state.index(),
                total: state.len(),
                sentence: sentence.clone(),
                view: state.view,
            });
            (sentence, state.manifest.clone(), state.cycle_settings())
        };

        let end = play_sentence(audio, &manifest, &sentence, settings, &mut cancel).await;
        match end {
            Ok(CycleEnd::Cancelled) => return,
            Ok(CycleEnd::Completed) => silent = 0,
            Ok(CycleEnd::Silent) => silent += 1,
            Err(e) => {
                warn!("Playback stopped: {}", e);
                let mut state = shared.lock();
                if !is_cancelled(&mut cancel) {
                    state.is_playing = false;
                    let _ = events.send(PlaybackEvent::Failed(e.to_string()));
                }
                return;
            }
        }

        loop {
            {
                let mut state = shared.lock();
                if is_cancelled(&mut cancel) {
                    return;
                }
                if !state.manual_mode {
                    if silent >= state.len() {
                        state.is_playing = false;
                        let _ = events.send(PlaybackEvent::Failed(
                            "no audio available for this batch".to_string(),
                        ));
                        return;
                    }
                    match state.auto_advance() {
                        Advance::Moved(index) => debug!("Advanced to card {}", index),
                        Advance::Stopped => {
                            let _ = events.send(PlaybackEvent::Finished);
                        }
                    }
                    break;
                }
            }
            // Stay on this card until the cursor moves or manual mode is switched off.
            tokio::select! {
                _ = cancelled(&mut cancel) => return,
                _ = nudge.notified() => {}
            }
        }
        tokio::task::yield_now().await;
    }
}

/// A play cycle running on its own task over a deck's shared state.
pub struct Player {
    cancel: watch::Sender<bool>,
    nudge: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Player {
    pub fn start<A: AudioService + 'static>(
        audio: Arc<A>,
        shared: SharedState,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);
        let nudge = Arc::new(Notify::new());
        let task = tokio::spawn({
            let nudge = nudge.clone();
            async move { run(audio.as_ref(), shared, cancel_rx, nudge, events).await }
        });
        Self {
            cancel,
            nudge,
            task,
        }
    }

    /// Raises the cancel flag without waiting for the task.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Asks a player holding a card in manual mode to look at the state again.
    pub fn nudge(&self) {
        self.nudge.notify_one();
    }

    /// Cancels the cycle and waits until the current clip has been released.
    pub async fn stop(self) -> std::result::Result<(), JoinError> {
        self.cancel();
        self.task.await
    }
}
