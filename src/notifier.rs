use std::time::Duration;

use futures_core::future::BoxFuture;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::callback::CallbackAction;
use crate::messages::MarkdownString;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("notification queue is closed")]
    QueueClosed,
    #[error("delivery timed out")]
    Timeout,
}

pub trait OutboundNotifier: Send + Sync + 'static {
    fn send(
        &self,
        chat_id: ChatId,
        text: MarkdownString,
        action: Option<CallbackAction>,
    ) -> BoxFuture<'_, Result<(), DeliveryError>>;
}

type Outgoing = (ChatId, MarkdownString, Option<CallbackAction>);

const QUEUE_CAPACITY: usize = 100;

/// Sends notifications through a queue that is drained at most 20 messages
/// per second, so many workers firing at once stay below Telegram's limits.
///
/// The queue is bounded. While Telegram stalls, `send` waits for a free slot
/// for at most the enqueue timeout and then fails with
/// [`DeliveryError::Timeout`].
#[derive(Clone)]
pub struct TelegramNotifier {
    queue: mpsc::Sender<Outgoing>,
    enqueue_timeout: Duration,
}

impl TelegramNotifier {
    fn with_queue(
        capacity: usize,
        enqueue_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Outgoing>) {
        let (queue, rx) = mpsc::channel(capacity);
        let notifier = Self {
            queue,
            enqueue_timeout,
        };
        (notifier, rx)
    }

    async fn deliver(
        bot: &Bot,
        chat_id: ChatId,
        msg: &MarkdownString,
        action: Option<&CallbackAction>,
    ) {
        let mut request = bot
            .send_message(chat_id, msg.as_str())
            .parse_mode(ParseMode::MarkdownV2);

        if let Some(action) = action {
            request = request.reply_markup(action.keyboard());
        }

        if let Err(e) = request.await {
            log::warn!("Couldn't send message to {chat_id}: {e}")
        }
    }

    /// `timeout` bounds both waiting for a queue slot and each Telegram request.
    pub fn new(bot: Bot, timeout: Duration) -> Self {
        let (notifier, mut rx) = Self::with_queue(QUEUE_CAPACITY, timeout);

        tokio::task::spawn(async move {
            let mut buffer = Vec::with_capacity(20);
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            while rx.recv_many(&mut buffer, 20).await > 0 {
                for (chat_id, msg, action) in buffer.iter() {
                    let delivery = Self::deliver(&bot, *chat_id, msg, action.as_ref());
                    if tokio::time::timeout(timeout, delivery).await.is_err() {
                        log::warn!("Sending message to {chat_id} timed out");
                    }
                }
                buffer.clear();
                interval.tick().await;
            }
            log::info!("Notification queue shut down.");
        });

        notifier
    }
}

impl OutboundNotifier for TelegramNotifier {
    fn send(
        &self,
        chat_id: ChatId,
        text: MarkdownString,
        action: Option<CallbackAction>,
    ) -> BoxFuture<'_, Result<(), DeliveryError>> {
        Box::pin(async move {
            self.queue
                .send_timeout((chat_id, text, action), self.enqueue_timeout)
                .await
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                    SendTimeoutError::Closed(_) => DeliveryError::QueueClosed,
                })
        })
    }
}
