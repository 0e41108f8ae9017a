use async_trait::async_trait;
use common::config::TelegramConfig;
use teloxide::prelude::*;

use crate::services::notifier::Notifier;

#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
}

impl TelegramService {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot: Bot::new(&config.bot_token),
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }
}

#[async_trait]
impl Notifier for TelegramService {
    async fn send(&self, destination: i64, text: &str) -> anyhow::Result<()> {
        self.bot
            .send_message(ChatId(destination), text.to_string())
            .await?;
        Ok(())
    }
}
