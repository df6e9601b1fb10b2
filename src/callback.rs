use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

const SUBSCRIBE_PREFIX: &str = "subscribe:";
const STOP_NOTIFICATIONS: &str = "stop_subscription";

/// Inline button attached to a message; Telegram hands its data back to us
/// in a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Subscribe(String),
    StopNotifications,
}

impl CallbackAction {
    pub fn data(&self) -> String {
        match self {
            CallbackAction::Subscribe(product_id) => format!("{SUBSCRIBE_PREFIX}{product_id}"),
            CallbackAction::StopNotifications => STOP_NOTIFICATIONS.to_owned(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        if data == STOP_NOTIFICATIONS {
            return Some(CallbackAction::StopNotifications);
        }

        let product_id = data.strip_prefix(SUBSCRIBE_PREFIX)?;
        if product_id.is_empty() {
            return None;
        }
        Some(CallbackAction::Subscribe(product_id.to_owned()))
    }

    fn label(&self) -> &'static str {
        match self {
            CallbackAction::Subscribe(_) => "Подписаться",
            CallbackAction::StopNotifications => "Остановить уведомления",
        }
    }

    pub fn keyboard(&self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(self.label(), self.data())]])
    }
}
