use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::RawSignal;
use teloxide::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

/// Chat whose messages are treated as signals.
#[derive(Debug, Clone, Copy)]
struct SignalChat(ChatId);

/// Receives chat updates and publishes the signal chat's messages on the signal channel.
pub struct SignalListener {
    id: Uuid,
    bot: Bot,
    signal_chat: ChatId,
    signal_tx: broadcast::Sender<Arc<RawSignal>>,
}

#[async_trait]
impl Actor for SignalListener {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::SignalListenerActor
    }

    async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        info!("Listening for signals in chat {}", self.signal_chat);

        // Groups deliver messages, channels deliver channel posts.
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(forward_signal))
            .branch(Update::filter_channel_post().endpoint(forward_signal));

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![
                self.signal_tx.clone(),
                SignalChat(self.signal_chat)
            ])
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;

        bail!("Telegram dispatcher stopped")
    }
}

impl SignalListener {
    pub fn new(bot: Bot, signal_chat_id: i64, signal_tx: broadcast::Sender<Arc<RawSignal>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot,
            signal_chat: ChatId(signal_chat_id),
            signal_tx,
        }
    }
}

async fn forward_signal(
    msg: Message,
    signal_tx: broadcast::Sender<Arc<RawSignal>>,
    signal_chat: SignalChat,
) -> ResponseResult<()> {
    if let Some(raw) = to_raw_signal(&msg, signal_chat.0) {
        debug!("Message {} from signal chat", raw.message_id);
        if signal_tx.send(Arc::new(raw)).is_err() {
            debug!("No signal subscribers, message dropped");
        }
    }
    Ok(())
}

fn to_raw_signal(msg: &Message, signal_chat: ChatId) -> Option<RawSignal> {
    if msg.chat.id != signal_chat {
        return None;
    }
    let text = msg.text()?;
    Some(RawSignal::new(text, i64::from(msg.id.0), msg.date))
}
