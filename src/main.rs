use std::sync::Arc;

use teloxide::dptree::deps;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use wbnotifybot::config::{Config, ConfigError};
use wbnotifybot::database::{self, Database};
use wbnotifybot::handlers::{self, App, Command};
use wbnotifybot::lookup::{LookupError, WbClient};
use wbnotifybot::notifications::NotificationScheduler;
use wbnotifybot::notifier::TelegramNotifier;
use wbnotifybot::subscriptions::SubscriptionRegistry;
use wbnotifybot::tracker::Tracker;

#[derive(Error, Debug)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Database(#[from] database::Error),
    #[error("http client: {0}")]
    Lookup(#[from] LookupError),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    env_logger::init();
    log::info!("Starting bot...");

    let config = Config::from_env()?;
    let bot = Bot::new(&config.bot_token);
    let database = Database::new(&config.database_url).await?;
    let lookup = Arc::new(WbClient::new(&config.card_url, config.lookup_timeout)?);
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), config.call_timeout));

    let scheduler = NotificationScheduler::new(
        SubscriptionRegistry::new(),
        lookup.clone(),
        notifier,
        config.notify_interval,
        config.call_timeout,
    );
    let app = Arc::new(App {
        tracker: Tracker::new(scheduler, lookup, database, config.history_limit),
        history_timezone: config.history_timezone,
    });

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Couldn't register bot commands: {e}");
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handlers::handle_command),
        )
        .branch(Update::filter_message().endpoint(handlers::handle_text))
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(deps![app])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot shut down.");
    Ok(())
}
