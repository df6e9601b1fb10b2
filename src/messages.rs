mod markdown_string;

use std::time::Duration;

use chrono_tz::Tz;
pub use markdown_string::MarkdownString;

use crate::database::QueryRecord;
use crate::lookup::ProductSnapshot;

pub const BUTTON_LOOKUP: &str = "Получить информацию по товару";
pub const BUTTON_STOP: &str = "Остановить уведомления";
pub const BUTTON_HISTORY: &str = "Получить информацию из БД";

fn price(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{sign}{}.{:02} ₽", abs / 100, abs % 100)
}

/// The product card, identical for replies and notifications.
pub fn product_info(snapshot: &ProductSnapshot) -> MarkdownString {
    MarkdownString::from_str(&snapshot.name).bold()
        + "\nАртикул: "
        + MarkdownString::code_inline(&snapshot.product_id)
        + &format!(
            "\nЦена: {}\nРейтинг: {}\nКоличество товара на складах: {}",
            price(snapshot.price_minor_units),
            snapshot.rating,
            snapshot.stock_quantity
        )
}

pub fn notification(snapshot: &ProductSnapshot) -> MarkdownString {
    MarkdownString::from_str("🔔 Уведомление: новая информация о товаре\n\n") + product_info(snapshot)
}

pub fn subscribe_prompt() -> MarkdownString {
    "Желаете подписаться на уведомления?".into()
}

pub fn choose_action() -> MarkdownString {
    "Выберите действие".into()
}

pub fn ask_product_id() -> MarkdownString {
    "Введите артикул товара с Wildberries:".into()
}

pub fn invalid_product_id() -> MarkdownString {
    "Артикул должен состоять только из цифр.".into()
}

pub fn lookup_failed() -> MarkdownString {
    "Произошла ошибка при получении информации о товаре.".into()
}

pub fn subscribed(product_id: &str, period: Duration) -> MarkdownString {
    MarkdownString::from_str("Подписка на товар ")
        + MarkdownString::code_inline(product_id)
        + &format!(
            " оформлена. Первое обновление придёт через {0} с., дальше каждые {0} с.",
            period.as_secs()
        )
}

pub fn already_subscribed(product_id: &str) -> MarkdownString {
    MarkdownString::from_str("Вы уже подписаны на товар ")
        + MarkdownString::code_inline(product_id)
        + "."
}

pub fn notifications_stopped(count: usize) -> MarkdownString {
    match count {
        0 => "У вас нет активных подписок.".into(),
        _ => MarkdownString::from_str(&format!("Уведомления остановлены ({count}).")),
    }
}

pub fn unsubscribed(product_id: &str, removed: bool) -> MarkdownString {
    if removed {
        MarkdownString::from_str("Подписка на товар ")
            + MarkdownString::code_inline(product_id)
            + " отменена 👍"
    } else {
        MarkdownString::from_str("Подписки на товар ")
            + MarkdownString::code_inline(product_id)
            + " не найдено."
    }
}

pub fn list_subscriptions(products: &[String]) -> MarkdownString {
    if products.is_empty() {
        return "У вас нет активных подписок.".into();
    }

    let items: Vec<_> = products
        .iter()
        .map(|p| MarkdownString::from_str("• ") + MarkdownString::code_inline(p))
        .collect();
    MarkdownString::from_str("Ваши подписки:\n") + MarkdownString::join(&items, &"\n".into())
}

pub fn history(records: &[QueryRecord], tz: Tz) -> MarkdownString {
    if records.is_empty() {
        return "В БД пока нет записей.".into();
    }

    let lines: Vec<_> = records
        .iter()
        .map(|r| {
            let time = r.time_of_query.with_timezone(&tz);
            MarkdownString::from_str("Артикул товара: ")
                + MarkdownString::code_inline(&r.product_id)
                + &format!(", время запроса: {}", time.format("%d.%m.%Y %H:%M:%S"))
        })
        .collect();

    MarkdownString::from_str("Последние запросы из БД:\n") + MarkdownString::join(&lines, &"\n".into())
}

pub fn internal_error() -> MarkdownString {
    "Извините, произошла внутренняя ошибка :((".into()
}
