use std::ops::{Add, AddAssign};

use teloxide::utils::markdown as md;

/// Text that is already escaped for Telegram's MarkdownV2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MarkdownString(String);

impl From<&str> for MarkdownString {
    fn from(value: &str) -> Self {
        Self::from_str(value)
    }
}

impl AddAssign<&MarkdownString> for MarkdownString {
    fn add_assign(&mut self, rhs: &MarkdownString) {
        self.0 += &rhs.0;
    }
}

impl AddAssign<MarkdownString> for MarkdownString {
    fn add_assign(&mut self, rhs: MarkdownString) {
        *self += &rhs
    }
}

impl AddAssign<&str> for MarkdownString {
    fn add_assign(&mut self, rhs: &str) {
        *self += &MarkdownString::from_str(rhs)
    }
}

impl AddAssign<&String> for MarkdownString {
    fn add_assign(&mut self, rhs: &String) {
        *self += rhs.as_str()
    }
}

impl<T> Add<T> for MarkdownString
where
    MarkdownString: AddAssign<T>,
{
    type Output = MarkdownString;

    fn add(mut self, rhs: T) -> Self::Output {
        self += rhs;
        self
    }
}

impl MarkdownString {
    pub fn new() -> MarkdownString {
        MarkdownString(String::new())
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_str(s: &str) -> MarkdownString {
        MarkdownString(md::escape(s))
    }

    pub fn code_inline(s: &str) -> MarkdownString {
        MarkdownString(md::code_inline(s))
    }

    pub fn bold(&self) -> MarkdownString {
        MarkdownString(md::bold(&self.0))
    }

    pub fn join<'a>(
        items: impl IntoIterator<Item = &'a MarkdownString>,
        sep: &MarkdownString,
    ) -> MarkdownString {
        let mut result = MarkdownString::new();
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                result += sep;
            }
            result += item;
        }

        result
    }
}
