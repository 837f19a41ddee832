use std::time::Duration;

use log::debug;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};

use crate::error::{DrillError, Result};
use crate::playback::audio::{AudioService, ClipRequest, Language};
use crate::playback::MIN_SPEED;

/// Sends clips to a chat as audio messages. Telegram does not report when the
/// listener is done, so a clip counts as finished after `clip_pause / speed`.
#[derive(Clone)]
pub struct ChatAudio {
    bot: Bot,
    chat_id: ChatId,
    clip_pause: Duration,
}

pub struct SentClip {
    message_id: MessageId,
    length: Duration,
}

impl ChatAudio {
    pub fn new(bot: Bot, chat_id: ChatId, clip_pause: Duration) -> Self {
        Self {
            bot,
            chat_id,
            clip_pause,
        }
    }
}

fn caption(clip: &ClipRequest, speed: f32) -> String {
    let flag = match clip.language {
        Language::English => "🇬🇧",
        Language::Chinese => "🇨🇳",
    };
    format!("{} #{} · {:.1}x", flag, clip.repeat, speed)
}

impl AudioService for ChatAudio {
    type Handle = SentClip;

    async fn play(&self, clip: &ClipRequest, speed: f32) -> Result<SentClip> {
        let message = self
            .bot
            .send_audio(self.chat_id, InputFile::file(clip.asset.clone()))
            .caption(caption(clip, speed))
            .await
            .map_err(|e| DrillError::Audio(e.to_string()))?;
        Ok(SentClip {
            message_id: message.id,
            length: self.clip_pause.div_f32(speed.max(MIN_SPEED)),
        })
    }

    async fn wait(&self, handle: &SentClip) -> Result<()> {
        tokio::time::sleep(handle.length).await;
        Ok(())
    }

    async fn release(&self, handle: &SentClip) {
        // The message stays in the chat; nothing is held on our side.
        debug!("Released clip message {:?} in chat {}", handle.message_id, self.chat_id.0);
    }
}
