use std::sync::Arc;
use std::time::Duration;

use teloxide::types::ChatId;

use crate::callback::CallbackAction;
use crate::lookup::{self, LookupError, ProductLookupClient};
use crate::messages;
use crate::notifier::{DeliveryError, OutboundNotifier};
use crate::subscriptions::SubscriptionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Delivered,
    LookupFailed,
    DeliveryFailed,
    Stopped,
}

/// Periodic task behind one subscription.
pub struct SubscriptionWorker {
    pub chat_id: ChatId,
    pub product_id: String,
    pub generation: u64,
    pub registry: SubscriptionRegistry,
    pub lookup: Arc<dyn ProductLookupClient>,
    pub notifier: Arc<dyn OutboundNotifier>,
    pub ticks: tokio::time::Interval,
    pub call_timeout: Duration,
    pub failures: u32,
}

impl SubscriptionWorker {
    fn is_current(&self) -> bool {
        self.registry
            .is_current(self.chat_id, &self.product_id, self.generation)
    }

    async fn tick(&mut self) -> TickOutcome {
        if !self.is_current() {
            return TickOutcome::Stopped;
        }

        let fetch = lookup::lookup_product(&*self.lookup, &self.product_id);
        let snapshot = match tokio::time::timeout(self.call_timeout, fetch).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => return self.lookup_failed(e),
            Err(_) => return self.lookup_failed(LookupError::Timeout),
        };
        self.failures = 0;

        // unsubscribed while the lookup was in flight
        if !self.is_current() {
            return TickOutcome::Stopped;
        }

        let text = messages::notification(&snapshot);
        let delivery = self.notifier.send(
            self.chat_id,
            text,
            Some(CallbackAction::StopNotifications),
        );
        let result = match tokio::time::timeout(self.call_timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout),
        };

        match result {
            Ok(()) => {
                log::debug!("{}/{}: Notification sent", self.chat_id, self.product_id);
                TickOutcome::Delivered
            }
            Err(e) => {
                log::warn!(
                    "{}/{}: Couldn't deliver notification: {e}",
                    self.chat_id,
                    self.product_id
                );
                TickOutcome::DeliveryFailed
            }
        }
    }

    fn lookup_failed(&mut self, e: LookupError) -> TickOutcome {
        self.failures += 1;
        log::warn!(
            "{}/{}: Lookup failed ({} in a row), retrying next tick: {e}",
            self.chat_id,
            self.product_id,
            self.failures
        );
        TickOutcome::LookupFailed
    }

    pub async fn run(mut self) {
        log::info!(
            "Starting notification task for {}/{}",
            self.chat_id,
            self.product_id
        );
        loop {
            self.ticks.tick().await;
            if self.tick().await == TickOutcome::Stopped {
                break;
            }
        }
        log::info!(
            "Notification task for {}/{} shut down.",
            self.chat_id,
            self.product_id
        );
    }
}
