mod worker;

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::ChatId;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::lookup::ProductLookupClient;
use crate::notifier::OutboundNotifier;
use crate::subscriptions::SubscriptionRegistry;

/// Runs one worker task per subscription in the registry.
///
/// Workers are never aborted. Removing a subscription from the registry
/// makes the worker's next check fail, after which it sends nothing more
/// and finishes.
#[derive(Clone)]
pub struct NotificationScheduler {
    registry: SubscriptionRegistry,
    lookup: Arc<dyn ProductLookupClient>,
    notifier: Arc<dyn OutboundNotifier>,
    period: Duration,
    call_timeout: Duration,
}

impl NotificationScheduler {
    pub fn new(
        registry: SubscriptionRegistry,
        lookup: Arc<dyn ProductLookupClient>,
        notifier: Arc<dyn OutboundNotifier>,
        period: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            lookup,
            notifier,
            period,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Subscribes and starts a worker, unless the pair is already subscribed.
    ///
    /// Nothing is sent right away. The first notification comes one period
    /// after subscribing, since the user has just been shown the card.
    pub fn subscribe(&self, chat_id: ChatId, product_id: &str) -> Option<JoinHandle<()>> {
        let generation = self.registry.insert(chat_id, product_id)?;

        let mut ticks = interval_at(Instant::now() + self.period, self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let worker = worker::SubscriptionWorker {
            chat_id,
            product_id: product_id.to_owned(),
            generation,
            registry: self.registry.clone(),
            lookup: self.lookup.clone(),
            notifier: self.notifier.clone(),
            ticks,
            call_timeout: self.call_timeout,
            failures: 0,
        };

        Some(tokio::spawn(worker.run()))
    }

    pub fn unsubscribe(&self, chat_id: ChatId, product_id: &str) -> bool {
        self.registry.unsubscribe(chat_id, product_id)
    }

    pub fn unsubscribe_all(&self, chat_id: ChatId) -> usize {
        self.registry.unsubscribe_all(chat_id)
    }
}
