use std::sync::Arc;

use chrono_tz::Tz;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, ParseMode, ReplyParameters};
use teloxide::utils::command::BotCommands;

use crate::callback::CallbackAction;
use crate::lookup::{self, LookupError};
use crate::messages::{self, MarkdownString, BUTTON_HISTORY, BUTTON_LOOKUP, BUTTON_STOP};
use crate::tracker::Tracker;

pub struct App {
    pub tracker: Tracker,
    pub history_timezone: Tz,
}

#[derive(BotCommands, Clone, Debug)]
#[command(
    rename_rule = "snake_case",
    parse_with = "split",
    description = "Поддерживаются следующие команды:"
)]
pub enum Command {
    #[command(description = "показать клавиатуру.")]
    Start,
    #[command(description = "показать этот текст.")]
    Help,
    #[command(description = "информация о товаре по артикулу.")]
    Product { product_id: String },
    #[command(description = "показать ваши подписки.")]
    Subscriptions,
    #[command(description = "отписаться от одного товара.")]
    Unsubscribe { product_id: String },
    #[command(description = "остановить все уведомления.")]
    Stop,
    #[command(description = "последние запросы из БД.")]
    History,
}

fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new([[
        KeyboardButton::new(BUTTON_LOOKUP),
        KeyboardButton::new(BUTTON_STOP),
        KeyboardButton::new(BUTTON_HISTORY),
    ]])
    .resize_keyboard()
}

async fn reply(bot: &Bot, msg: &Message, text: MarkdownString) -> ResponseResult<Message> {
    bot.send_message(msg.chat.id, text.into_string())
        .parse_mode(ParseMode::MarkdownV2)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await
}

async fn lookup_and_reply(
    bot: &Bot,
    msg: &Message,
    app: &App,
    product_id: &str,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let user_id = msg.from.as_ref().map_or(chat_id.0, |user| user.id.0 as i64);

    let snapshot = match app
        .tracker
        .on_lookup_requested(chat_id, user_id, product_id)
        .await
    {
        Ok(snapshot) => snapshot,
        Err(LookupError::InvalidProductId) => {
            reply(bot, msg, messages::invalid_product_id()).await?;
            return Ok(());
        }
        Err(_) => {
            reply(bot, msg, messages::lookup_failed()).await?;
            return Ok(());
        }
    };

    reply(bot, msg, messages::product_info(&snapshot)).await?;
    bot.send_message(chat_id, messages::subscribe_prompt().into_string())
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(CallbackAction::Subscribe(snapshot.product_id).keyboard())
        .await?;

    Ok(())
}

async fn stop_notifications(bot: &Bot, msg: &Message, app: &App) -> ResponseResult<()> {
    let removed = app.tracker.on_unsubscribe_requested(msg.chat.id);
    reply(bot, msg, messages::notifications_stopped(removed)).await?;
    Ok(())
}

async fn history(bot: &Bot, msg: &Message, app: &App) -> ResponseResult<()> {
    let text = match app.tracker.recent_history().await {
        Ok(records) => messages::history(&records, app.history_timezone),
        Err(e) => {
            log::error!("Database error: {e}");
            messages::internal_error()
        }
    };
    reply(bot, msg, text).await?;
    Ok(())
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    app: Arc<App>,
) -> ResponseResult<()> {
    log::info!("{:?}", cmd);
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, messages::choose_action().into_string())
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(main_keyboard())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
        Command::Product { product_id } => {
            lookup_and_reply(&bot, &msg, &app, &product_id).await?
        }
        Command::Subscriptions => {
            let products = app.tracker.subscriptions(msg.chat.id);
            reply(&bot, &msg, messages::list_subscriptions(&products)).await?;
        }
        Command::Unsubscribe { product_id } => {
            let removed = app
                .tracker
                .on_unsubscribe_product_requested(msg.chat.id, &product_id);
            reply(&bot, &msg, messages::unsubscribed(&product_id, removed)).await?;
        }
        Command::Stop => stop_notifications(&bot, &msg, &app).await?,
        Command::History => history(&bot, &msg, &app).await?,
    }
    Ok(())
}

/// Reply keyboard buttons and bare article numbers.
pub async fn handle_text(bot: Bot, msg: Message, app: Arc<App>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match text.trim() {
        BUTTON_LOOKUP => {
            reply(&bot, &msg, messages::ask_product_id()).await?;
        }
        BUTTON_STOP => stop_notifications(&bot, &msg, &app).await?,
        BUTTON_HISTORY => history(&bot, &msg, &app).await?,
        product_id if lookup::is_valid_product_id(product_id) => {
            lookup_and_reply(&bot, &msg, &app, product_id).await?
        }
        _ => {
            bot.send_message(msg.chat.id, messages::choose_action().into_string())
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(main_keyboard())
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, app: Arc<App>) -> ResponseResult<()> {
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));
    log::info!("{chat_id}: {action:?}");

    let text = match action {
        CallbackAction::Subscribe(product_id) => {
            bot.answer_callback_query(q.id).await?;
            if !lookup::is_valid_product_id(&product_id) {
                messages::invalid_product_id()
            } else if app.tracker.on_subscribe_requested(chat_id, &product_id) {
                messages::subscribed(&product_id, app.tracker.notify_interval())
            } else {
                messages::already_subscribed(&product_id)
            }
        }
        CallbackAction::StopNotifications => {
            let removed = app.tracker.on_unsubscribe_requested(chat_id);
            bot.answer_callback_query(q.id)
                .text("Уведомления остановлены.")
                .await?;
            messages::notifications_stopped(removed)
        }
    };

    bot.send_message(chat_id, text.into_string())
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}
