pub mod callback;
pub mod config;
pub mod database;
pub mod handlers;
pub mod lookup;
pub mod messages;
pub mod notifications;
pub mod notifier;
pub mod subscriptions;
pub mod tracker;
