mod chat_audio;
mod config;
mod dataset;
mod error;
mod playback;
mod quiz;
mod shuffle;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chat_audio::ChatAudio;
use config::Config;
use dataset::{Dataset, Sentence};
use dotenv::dotenv;
use error::DrillError;
use log::{debug, error, info, warn};
use playback::audio::{load_manifest, DirectoryManifest};
use playback::deck::{Deck, Decks};
use playback::sequencer::PlaybackEvent;
use playback::{CardView, PlaybackState};
use quiz::{CheckOutcome, Phase, QuizSession};
use teloxide::{
    dispatching::dialogue::{InMemStorage, InMemStorageError},
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup},
};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

type DrillDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type ChatDecks = Arc<Decks<ChatAudio>>;

/// Which screen the chat is on. Each activity owns its own state.
#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveFeatureChoice,
    ReceiveGroup,
    ReceiveBatch {
        group: String,
    },
    Flashcards {
        group: String,
        batch: u32,
    },
    SentenceGame {
        session: QuizSession,
    },
}

#[tokio::main]
async fn main() {
    // Loaded first so RUST_LOG from .env reaches the logger.
    let env_file = dotenv();
    pretty_env_logger::init();
    if env_file.is_err() {
        // Settings may come from the real environment instead.
        warn!("No .env file found");
    }
    info!("Starting sentence drill bot...");

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    info!("Loading sentences from {}", config.sentences_path.display());
    let dataset = match Dataset::open(&config.sentences_path) {
        Ok(dataset) => Arc::new(dataset),
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    if dataset.is_empty() {
        warn!("The sentence dataset is empty");
    }
    info!(
        "Loaded {} sentences in {} groups",
        dataset.len(),
        dataset.groups().len()
    );

    let bot = Bot::from_env();
    let decks: ChatDecks = Arc::new(Decks::new());
    let game_locks = Arc::new(ChatLocks::default());

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveFeatureChoice].endpoint(receive_feature_choice))
            .branch(dptree::case![State::ReceiveGroup].endpoint(receive_group))
            .branch(dptree::case![State::ReceiveBatch { group }].endpoint(receive_batch))
            .branch(dptree::case![State::Flashcards { group, batch }].endpoint(flashcards))
            .branch(dptree::case![State::SentenceGame { session }].endpoint(sentence_game)),
    )
    .dependencies(dptree::deps![
        InMemStorage::<State>::new(),
        dataset,
        config,
        decks,
        game_locks
    ])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "Hi! I help you practise HSK sentences. Listen to a batch as flashcards, or rebuild English sentences word by word.";
const FLASHCARDS: &str = "🎧 Flashcards";
const SENTENCE_GAME: &str = "🧩 Sentence game";
const BACK: &str = "⬅️ Back";

fn feature_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(FLASHCARDS),
        KeyboardButton::new(SENTENCE_GAME),
    ]])
}

async fn start(bot: Bot, dialogue: DrillDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(feature_keyboard())
        .await?;
    dialogue.update(State::ReceiveFeatureChoice).await?;
    Ok(())
}

async fn show_features(bot: &Bot, dialogue: &DrillDialogue, chat_id: ChatId) -> HandlerResult {
    bot.send_message(chat_id, "What would you like to do?")
        .reply_markup(feature_keyboard())
        .await?;
    dialogue.update(State::ReceiveFeatureChoice).await?;
    Ok(())
}

async fn receive_feature_choice(
    bot: Bot,
    dialogue: DrillDialogue,
    dataset: Arc<Dataset>,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(FLASHCARDS) => show_groups(&bot, &dialogue, &dataset, msg.chat.id).await,
        Some(SENTENCE_GAME) => {
            let session = QuizSession::load(&dataset.sentences, &mut rand::thread_rng());
            info!(
                "Chat {} started a sentence game with {} questions",
                msg.chat.id.0,
                session.len()
            );
            send_quiz_screen(&bot, msg.chat.id, &session).await?;
            dialogue.update(State::SentenceGame { session }).await?;
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, "Please pick one of the options")
                .reply_markup(feature_keyboard())
                .await?;
            Ok(())
        }
    }
}

// --- Flashcards ---

async fn show_groups(
    bot: &Bot,
    dialogue: &DrillDialogue,
    dataset: &Dataset,
    chat_id: ChatId,
) -> HandlerResult {
    let mut rows: Vec<Vec<KeyboardButton>> = dataset
        .groups()
        .into_iter()
        .map(|group| vec![KeyboardButton::new(group)])
        .collect();
    rows.push(vec![KeyboardButton::new(BACK)]);
    bot.send_message(chat_id, "Choose a level")
        .reply_markup(KeyboardMarkup::new(rows))
        .await?;
    dialogue.update(State::ReceiveGroup).await?;
    Ok(())
}

async fn receive_group(
    bot: Bot,
    dialogue: DrillDialogue,
    dataset: Arc<Dataset>,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(BACK) => show_features(&bot, &dialogue, msg.chat.id).await,
        Some(group) if dataset.groups().iter().any(|g| g == group) => {
            show_batches(&bot, &dialogue, &dataset, msg.chat.id, group.to_string()).await
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose a level from the list")
                .await?;
            Ok(())
        }
    }
}

fn batch_label(batch: u32) -> String {
    format!("Batch {}", batch)
}

fn parse_batch_label(text: &str) -> Option<u32> {
    text.strip_prefix("Batch ")?.trim().parse().ok()
}

async fn show_batches(
    bot: &Bot,
    dialogue: &DrillDialogue,
    dataset: &Dataset,
    chat_id: ChatId,
    group: String,
) -> HandlerResult {
    let mut rows: Vec<Vec<KeyboardButton>> = dataset
        .batches(&group)
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .map(|&batch| KeyboardButton::new(batch_label(batch)))
                .collect()
        })
        .collect();
    rows.push(vec![KeyboardButton::new(BACK)]);
    bot.send_message(chat_id, format!("{} batches", group))
        .reply_markup(KeyboardMarkup::new(rows))
        .await?;
    dialogue.update(State::ReceiveBatch { group }).await?;
    Ok(())
}

async fn receive_batch(
    bot: Bot,
    dialogue: DrillDialogue,
    group: String,
    dataset: Arc<Dataset>,
    config: Arc<Config>,
    decks: ChatDecks,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        return show_groups(&bot, &dialogue, &dataset, msg.chat.id).await;
    }
    let Some(batch) = parse_batch_label(text) else {
        bot.send_message(msg.chat.id, "Please choose a batch from the list")
            .await?;
        return Ok(());
    };

    let resolver = DirectoryManifest::new(config.audio_root.clone());
    let manifest = load_manifest(&resolver, &group, batch, config.manifest_retries).await;
    if manifest.is_empty() {
        warn!("No audio available for {} batch {}", group, batch);
    } else {
        debug!("Resolved {} clips for {} batch {}", manifest.len(), group, batch);
    }

    let loaded = PlaybackState::load(&dataset, &group, batch, manifest, &mut rand::thread_rng());
    let state = match loaded {
        Ok(state) => state,
        Err(e @ DrillError::EmptyBatch { .. }) => {
            debug!("{}", e);
            bot.send_message(msg.chat.id, "No sentences found for this batch.")
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let card = render_card(&state);
    let audio = Arc::new(ChatAudio::new(bot.clone(), msg.chat.id, config.clip_pause));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    forward_playback_events(bot.clone(), msg.chat.id, events_rx);
    decks
        .open(msg.chat.id.0, Deck::new(audio, state, events_tx))
        .await;
    info!("Chat {} opened {} batch {}", msg.chat.id.0, group, batch);

    bot.send_message(msg.chat.id, card)
        .reply_markup(flashcard_keyboard())
        .await?;
    dialogue.update(State::Flashcards { group, batch }).await?;
    Ok(())
}

/// Posts a card for every sentence the player moves to.
fn forward_playback_events(
    bot: Bot,
    chat_id: ChatId,
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event {
                PlaybackEvent::Showing {
                    index,
                    total,
                    sentence,
                    view,
                } => format!("{}/{}\n\n{}", index + 1, total, render_sentence(&sentence, view)),
                PlaybackEvent::Finished => "🏁 End of batch".to_string(),
                PlaybackEvent::Failed(reason) => format!("⚠️ Playback stopped: {}", reason),
            };
            if let Err(e) = bot.send_message(chat_id, text).await {
                warn!("Could not post playback update to chat {}: {}", chat_id.0, e);
            }
        }
    });
}

const MAX_REPEATS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    PlayPause,
    Prev,
    Next,
    Loop,
    Shuffle,
    Manual,
    Slower,
    Faster,
    Bookmark,
    EnglishRepeats,
    ChineseRepeats,
    ShowPinyin,
    ShowEnglish,
}

impl Control {
    const ALL: [Control; 13] = [
        Control::PlayPause,
        Control::Prev,
        Control::Next,
        Control::Loop,
        Control::Shuffle,
        Control::Manual,
        Control::Slower,
        Control::Faster,
        Control::Bookmark,
        Control::EnglishRepeats,
        Control::ChineseRepeats,
        Control::ShowPinyin,
        Control::ShowEnglish,
    ];

    fn label(self) -> &'static str {
        match self {
            Control::PlayPause => "⏯ Play / Pause",
            Control::Prev => "⏮ Prev",
            Control::Next => "⏭ Next",
            Control::Loop => "🔁 Loop",
            Control::Shuffle => "🔀 Shuffle",
            Control::Manual => "✋ Manual",
            Control::Slower => "🐢 Slower",
            Control::Faster => "🐇 Faster",
            Control::Bookmark => "🔖 Bookmark",
            Control::EnglishRepeats => "🇬🇧 Repeats",
            Control::ChineseRepeats => "🇨🇳 Repeats",
            Control::ShowPinyin => "Pinyin on/off",
            Control::ShowEnglish => "English on/off",
        }
    }

    fn parse(text: &str) -> Option<Control> {
        Control::ALL.into_iter().find(|c| c.label() == text)
    }

    fn apply(self, state: &mut PlaybackState) {
        match self {
            Control::PlayPause => state.is_playing = !state.is_playing,
            Control::Prev => state.prev(),
            Control::Next => state.next(),
            Control::Loop => state.loop_mode = !state.loop_mode,
            Control::Shuffle => {
                let enabled = !state.shuffle_mode();
                state.set_shuffle(enabled, &mut rand::thread_rng());
            }
            Control::Manual => state.manual_mode = !state.manual_mode,
            Control::Slower => state.decrease_speed(),
            Control::Faster => state.increase_speed(),
            Control::Bookmark => {
                state.toggle_bookmark();
            }
            Control::EnglishRepeats => {
                state.set_repeat_english(state.repeat_english() % MAX_REPEATS + 1)
            }
            Control::ChineseRepeats => {
                state.set_repeat_chinese(state.repeat_chinese() % MAX_REPEATS + 1)
            }
            Control::ShowPinyin => state.view.show_pinyin = !state.view.show_pinyin,
            Control::ShowEnglish => state.view.show_english = !state.view.show_english,
        }
    }
}

fn flashcard_keyboard() -> KeyboardMarkup {
    let rows: [&[Control]; 6] = [
        &[Control::PlayPause],
        &[Control::Prev, Control::Next],
        &[Control::Loop, Control::Shuffle, Control::Manual],
        &[Control::Slower, Control::Faster, Control::Bookmark],
        &[Control::EnglishRepeats, Control::ChineseRepeats],
        &[Control::ShowPinyin, Control::ShowEnglish],
    ];
    let mut keyboard: Vec<Vec<KeyboardButton>> = rows
        .iter()
        .map(|row| row.iter().map(|c| KeyboardButton::new(c.label())).collect())
        .collect();
    keyboard.push(vec![KeyboardButton::new(BACK)]);
    KeyboardMarkup::new(keyboard)
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn render_sentence(sentence: &Sentence, view: CardView) -> String {
    let mut lines = vec![sentence.text_chinese.clone()];
    if view.show_pinyin {
        lines.push(sentence.pinyin.clone());
    }
    if view.show_english {
        lines.push(sentence.text_english.clone());
    }
    lines.join("\n")
}

fn render_card(state: &PlaybackState) -> String {
    let bookmark = if state.is_bookmarked() { " 🔖" } else { "" };
    let bookmarks = match state.bookmarks().len() {
        0 => String::new(),
        n => format!(" · {} bookmarked", n),
    };
    let body = state
        .current_sentence()
        .map(|s| render_sentence(s, state.view))
        .unwrap_or_else(|| "No sentence selected".to_string());
    format!(
        "{} · {} · {}/{}{}\n\n{}\n\n{} · loop {} · shuffle {} · manual {}\nspeed {:.1}x · 🇬🇧 ×{} · 🇨🇳 ×{}{}",
        state.group(),
        batch_label(state.batch()),
        state.index() + 1,
        state.len(),
        bookmark,
        body,
        if state.is_playing { "▶️ playing" } else { "⏸ paused" },
        on_off(state.loop_mode),
        on_off(state.shuffle_mode()),
        on_off(state.manual_mode),
        state.speed(),
        state.repeat_english(),
        state.repeat_chinese(),
        bookmarks,
    )
}

async fn flashcards(
    bot: Bot,
    dialogue: DrillDialogue,
    (group, batch): (String, u32),
    dataset: Arc<Dataset>,
    decks: ChatDecks,
    msg: Message,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        decks.close(chat_id.0).await;
        info!("Chat {} closed {} batch {}", chat_id.0, group, batch);
        return show_batches(&bot, &dialogue, &dataset, chat_id, group).await;
    }

    let Some(control) = Control::parse(text) else {
        bot.send_message(chat_id, "Use the buttons below to control the player")
            .reply_markup(flashcard_keyboard())
            .await?;
        return Ok(());
    };

    let card = decks
        .update(chat_id.0, |state| {
            control.apply(state);
            render_card(state)
        })
        .await;
    match card {
        Some(card) => {
            bot.send_message(chat_id, card)
                .reply_markup(flashcard_keyboard())
                .await?;
            Ok(())
        }
        None => {
            bot.send_message(chat_id, "This batch is no longer open.")
                .await?;
            show_batches(&bot, &dialogue, &dataset, chat_id, group).await
        }
    }
}

// --- Sentence game ---

const CHECK: &str = "✅ Check";
const RESET: &str = "↩️ Reset";
const SKIP: &str = "⏭ Skip";
const CONTINUE: &str = "Continue";
const TRY_AGAIN: &str = "Try Again";
const NEXT_QUESTION: &str = "Next Question";
const CANCEL: &str = "Cancel";
const CONFIRM_SKIP: &str = "Skip";
const RESTART: &str = "🔄 Restart";
const MENU: &str = "🏠 Menu";
const WORDS_PER_ROW: usize = 3;

fn keyboard(labels: &[&str]) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![labels
        .iter()
        .map(|label| KeyboardButton::new(*label))
        .collect::<Vec<_>>()])
}

fn word_bank_keyboard(session: &QuizSession) -> KeyboardMarkup {
    let remaining: Vec<&String> = session
        .current_question()
        .map(|q| {
            q.word_bank
                .iter()
                .filter(|w| !session.selected_words().contains(*w))
                .collect()
        })
        .unwrap_or_default();
    let mut rows: Vec<Vec<KeyboardButton>> = remaining
        .chunks(WORDS_PER_ROW)
        .map(|chunk| chunk.iter().map(|w| KeyboardButton::new(w.as_str())).collect())
        .collect();
    rows.push(vec![
        KeyboardButton::new(CHECK),
        KeyboardButton::new(RESET),
        KeyboardButton::new(SKIP),
    ]);
    rows.push(vec![KeyboardButton::new(MENU)]);
    KeyboardMarkup::new(rows)
}

fn render_question(session: &QuizSession) -> String {
    let Some(question) = session.current_question() else {
        return String::new();
    };
    let answer = if session.selected_words().is_empty() {
        "…".to_string()
    } else {
        session.selected_words().join(" ")
    };
    format!(
        "Question {}/{} · Score {}\n\n{}\n{}\n\nYour answer: {}",
        session.current_index() + 1,
        session.len(),
        session.score(),
        question.chinese,
        question.pinyin,
        answer
    )
}

/// Shows whatever the session is waiting for: the next question or the final score.
async fn send_quiz_screen(bot: &Bot, chat_id: ChatId, session: &QuizSession) -> HandlerResult {
    if session.is_finished() {
        bot.send_message(
            chat_id,
            format!(
                "🎉 Quiz finished! You answered {} of {} correctly.",
                session.score(),
                session.len()
            ),
        )
        .reply_markup(keyboard(&[RESTART, MENU]))
        .await?;
    } else {
        bot.send_message(chat_id, render_question(session))
            .reply_markup(word_bank_keyboard(session))
            .await?;
    }
    Ok(())
}

/// Serializes sentence-game state changes per chat between message handlers
/// and auto-advance timers.
#[derive(Default)]
struct ChatLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    async fn acquire(&self, chat: i64) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().await.entry(chat).or_default().clone();
        lock.lock_owned().await
    }
}

/// The stored session, which is newer than `routed` when a timer has advanced it.
async fn stored_session(
    dialogue: &DrillDialogue,
    routed: QuizSession,
) -> Result<QuizSession, InMemStorageError> {
    Ok(match dialogue.get().await? {
        Some(State::SentenceGame { session }) => session,
        _ => routed,
    })
}

async fn send_correct_prompt(bot: &Bot, chat_id: ChatId) -> HandlerResult {
    bot.send_message(chat_id, "✅ Correct! Moving to next question...")
        .reply_markup(keyboard(&[CONTINUE]))
        .await?;
    Ok(())
}

async fn sentence_game(
    bot: Bot,
    dialogue: DrillDialogue,
    session: QuizSession,
    dataset: Arc<Dataset>,
    config: Arc<Config>,
    game_locks: Arc<ChatLocks>,
    msg: Message,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let _guard = game_locks.acquire(chat_id.0).await;
    let mut session = stored_session(&dialogue, session).await?;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Please use the buttons").await?;
        return Ok(());
    };
    if text == MENU {
        return show_features(&bot, &dialogue, chat_id).await;
    }

    match session.phase().clone() {
        Phase::Finished => {
            if text == RESTART {
                session.restart(&dataset.sentences, &mut rand::thread_rng());
            }
            send_quiz_screen(&bot, chat_id, &session).await?;
        }
        Phase::AwaitingContinue => {
            if text == CONTINUE {
                let current = session.current_index();
                session.acknowledge(current);
                send_quiz_screen(&bot, chat_id, &session).await?;
            } else {
                send_correct_prompt(&bot, chat_id).await?;
            }
        }
        Phase::Reviewing { correct_answer } => match text {
            TRY_AGAIN => {
                session.retry();
                send_quiz_screen(&bot, chat_id, &session).await?;
            }
            NEXT_QUESTION => {
                session.advance();
                send_quiz_screen(&bot, chat_id, &session).await?;
            }
            _ => {
                bot.send_message(chat_id, format!("Correct answer: \"{}\"", correct_answer))
                    .reply_markup(keyboard(&[TRY_AGAIN, NEXT_QUESTION]))
                    .await?;
            }
        },
        Phase::ConfirmingSkip => {
            session.confirm_skip(text == CONFIRM_SKIP);
            send_quiz_screen(&bot, chat_id, &session).await?;
        }
        Phase::Answering => match text {
            CHECK => match session.check() {
                Err(DrillError::EmptySelection) => {
                    bot.send_message(chat_id, "No Answer: please select some words first!")
                        .await?;
                }
                Err(e) => return Err(e.into()),
                Ok(Some(CheckOutcome::Correct)) => {
                    send_correct_prompt(&bot, chat_id).await?;
                    let question_index = session.current_index();
                    dialogue
                        .update(State::SentenceGame {
                            session: session.clone(),
                        })
                        .await?;
                    tokio::spawn(auto_advance(
                        bot.clone(),
                        dialogue.clone(),
                        game_locks.clone(),
                        question_index,
                        config.auto_advance,
                    ));
                    return Ok(());
                }
                Ok(Some(CheckOutcome::Incorrect { correct_answer })) => {
                    bot.send_message(
                        chat_id,
                        format!("❌ Incorrect\nCorrect answer: \"{}\"", correct_answer),
                    )
                    .reply_markup(keyboard(&[TRY_AGAIN, NEXT_QUESTION]))
                    .await?;
                }
                Ok(None) => send_quiz_screen(&bot, chat_id, &session).await?,
            },
            RESET => {
                session.reset_selection();
                send_quiz_screen(&bot, chat_id, &session).await?;
            }
            SKIP => {
                session.request_skip();
                bot.send_message(chat_id, "Are you sure you want to skip this question?")
                    .reply_markup(keyboard(&[CANCEL, CONFIRM_SKIP]))
                    .await?;
            }
            word => {
                if !session.press_word(word) {
                    debug!("Ignoring {:?} in chat {}", word, chat_id.0);
                }
                send_quiz_screen(&bot, chat_id, &session).await?;
            }
        },
    }

    dialogue.update(State::SentenceGame { session }).await?;
    Ok(())
}

/// Moves past a correctly answered question if the player hasn't pressed "Continue" yet.
async fn auto_advance(
    bot: Bot,
    dialogue: DrillDialogue,
    game_locks: Arc<ChatLocks>,
    question_index: usize,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    if let Err(e) = advance_if_waiting(&bot, &dialogue, &game_locks, question_index).await {
        warn!("Auto-advance failed in chat {}: {}", dialogue.chat_id().0, e);
    }
}

async fn advance_if_waiting(
    bot: &Bot,
    dialogue: &DrillDialogue,
    game_locks: &ChatLocks,
    question_index: usize,
) -> HandlerResult {
    let _guard = game_locks.acquire(dialogue.chat_id().0).await;
    if let Some(session) = acknowledge_stored(dialogue, question_index).await? {
        send_quiz_screen(bot, dialogue.chat_id(), &session).await?;
    }
    Ok(())
}

/// Acknowledges `question_index` in the stored session. `None` when the game has
/// already moved past it.
async fn acknowledge_stored(
    dialogue: &DrillDialogue,
    question_index: usize,
) -> Result<Option<QuizSession>, InMemStorageError> {
    let Some(State::SentenceGame { mut session }) = dialogue.get().await? else {
        return Ok(None);
    };
    if !session.acknowledge(question_index) {
        return Ok(None);
    }
    dialogue
        .update(State::SentenceGame {
            session: session.clone(),
        })
        .await?;
    Ok(Some(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::audio::AudioManifest;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> PlaybackState {
        let dataset = Dataset::new(vec![
            dataset::sentence(1, "I am here.", "HSK1", 1),
            dataset::sentence(2, "You are there.", "HSK1", 1),
        ]);
        let mut rng = StdRng::seed_from_u64(0);
        let mut state =
            PlaybackState::load(&dataset, "HSK1", 1, AudioManifest::default(), &mut rng).unwrap();
        state.set_shuffle(false, &mut rng);
        state
    }

    #[test]
    fn every_control_label_parses_back() {
        for control in Control::ALL {
            assert_eq!(Control::parse(control.label()), Some(control));
        }
        assert_eq!(Control::parse("Dance"), None);
    }

    #[test]
    fn repeat_buttons_cycle_within_range() {
        let mut state = state();
        for _ in 0..MAX_REPEATS {
            Control::EnglishRepeats.apply(&mut state);
            assert!((1..=MAX_REPEATS).contains(&state.repeat_english()));
        }
        assert_eq!(state.repeat_english(), 1);
        Control::ChineseRepeats.apply(&mut state);
        assert_eq!(state.repeat_chinese(), 3);
    }

    #[test]
    fn card_respects_display_toggles() {
        let mut state = state();
        let card = render_card(&state);
        assert!(card.contains("HSK1 · Batch 1 · 1/2"));
        assert!(card.contains("I am here."));
        assert!(card.contains("jùzi 1"));

        Control::ShowEnglish.apply(&mut state);
        Control::ShowPinyin.apply(&mut state);
        Control::Bookmark.apply(&mut state);
        let card = render_card(&state);
        assert!(!card.contains("I am here."));
        assert!(!card.contains("jùzi 1"));
        assert!(card.contains("🔖"));
    }

    fn answered_session() -> QuizSession {
        let sentences = vec![
            dataset::sentence(1, "I am here.", "HSK1", 1),
            dataset::sentence(2, "You are there.", "HSK1", 1),
        ];
        let mut session = QuizSession::load(&sentences, &mut StdRng::seed_from_u64(3));
        for word in ["I", "am", "here"] {
            assert!(session.press_word(word));
        }
        assert_eq!(session.check().unwrap(), Some(CheckOutcome::Correct));
        session
    }

    #[tokio::test]
    async fn timer_acknowledges_only_once() {
        let dialogue = DrillDialogue::new(InMemStorage::<State>::new(), ChatId(42));
        dialogue
            .update(State::SentenceGame {
                session: answered_session(),
            })
            .await
            .unwrap();

        let advanced = acknowledge_stored(&dialogue, 0).await.unwrap().unwrap();
        assert_eq!(advanced.current_index(), 1);
        assert_eq!(advanced.phase(), &Phase::Answering);
        assert!(acknowledge_stored(&dialogue, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handler_sees_the_session_a_timer_advanced() {
        let routed = answered_session();
        let dialogue = DrillDialogue::new(InMemStorage::<State>::new(), ChatId(42));
        dialogue
            .update(State::SentenceGame {
                session: routed.clone(),
            })
            .await
            .unwrap();
        acknowledge_stored(&dialogue, 0).await.unwrap();

        let session = stored_session(&dialogue, routed).await.unwrap();
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.phase(), &Phase::Answering);
    }

    #[tokio::test]
    async fn game_locks_are_per_chat() {
        let locks = Arc::new(ChatLocks::default());
        let held = locks.acquire(1).await;

        let waiting = tokio::spawn({
            let locks = locks.clone();
            async move {
                let _guard = locks.acquire(1).await;
            }
        });
        tokio::time::timeout(Duration::from_secs(1), locks.acquire(2))
            .await
            .expect("another chat was blocked");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiting.is_finished());

        drop(held);
        waiting.await.unwrap();
    }

    #[test]
    fn batch_labels_round_trip() {
        assert_eq!(parse_batch_label(&batch_label(12)), Some(12));
        assert_eq!(parse_batch_label("Batch x"), None);
        assert_eq!(parse_batch_label("12"), None);
    }
}
