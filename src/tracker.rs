use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use teloxide::types::ChatId;

use crate::database::{Database, Error as DbError, QueryRecord};
use crate::lookup::{self, LookupError, ProductLookupClient, ProductSnapshot};
use crate::notifications::NotificationScheduler;

/// What the bot does in response to a user's request, independent of how
/// the request arrived or how the answer is rendered.
pub struct Tracker {
    scheduler: NotificationScheduler,
    lookup: Arc<dyn ProductLookupClient>,
    database: Database,
    history_limit: u32,
}

impl Tracker {
    pub fn new(
        scheduler: NotificationScheduler,
        lookup: Arc<dyn ProductLookupClient>,
        database: Database,
        history_limit: u32,
    ) -> Self {
        Self {
            scheduler,
            lookup,
            database,
            history_limit,
        }
    }

    pub fn notify_interval(&self) -> Duration {
        self.scheduler.period()
    }

    pub async fn on_lookup_requested(
        &self,
        chat_id: ChatId,
        user_id: i64,
        product_id: &str,
    ) -> Result<ProductSnapshot, LookupError> {
        let snapshot = lookup::lookup_product(&*self.lookup, product_id)
            .await
            .map_err(|e| {
                log::warn!("{chat_id}: Lookup of {product_id} failed: {e}");
                e
            })?;

        if let Err(e) = self
            .database
            .append_query(user_id, product_id, Utc::now())
            .await
        {
            log::error!("Database error: {e}");
        }

        Ok(snapshot)
    }

    /// Returns false if the chat already was subscribed to the product.
    pub fn on_subscribe_requested(&self, chat_id: ChatId, product_id: &str) -> bool {
        if !lookup::is_valid_product_id(product_id) {
            log::warn!("{chat_id}: Refusing to subscribe to {product_id:?}");
            return false;
        }

        let started = self.scheduler.subscribe(chat_id, product_id).is_some();
        if started {
            log::info!("{chat_id}: Subscribed to {product_id}");
        }
        started
    }

    /// Stops every notification of the chat.
    pub fn on_unsubscribe_requested(&self, chat_id: ChatId) -> usize {
        let removed = self.scheduler.unsubscribe_all(chat_id);
        log::info!("{chat_id}: Removed {removed} subscriptions");
        removed
    }

    pub fn on_unsubscribe_product_requested(&self, chat_id: ChatId, product_id: &str) -> bool {
        self.scheduler.unsubscribe(chat_id, product_id)
    }

    pub fn subscriptions(&self, chat_id: ChatId) -> Vec<String> {
        self.scheduler.registry().products(chat_id)
    }

    pub async fn recent_history(&self) -> Result<Vec<QueryRecord>, DbError> {
        self.database.recent_queries(self.history_limit).await
    }
}
