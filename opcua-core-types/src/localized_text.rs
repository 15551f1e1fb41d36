use std::fmt;

/// Human readable text with an optional locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalizedText {
    /// The locale, e.g. "en-US". Empty means unspecified.
    pub locale: String,
    /// The text.
    pub text: String,
}

impl LocalizedText {
    /// Create text with a locale.
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> LocalizedText {
        LocalizedText {
            locale: locale.into(),
            text: text.into(),
        }
    }

    /// The null localized text.
    pub fn null() -> LocalizedText {
        LocalizedText::default()
    }
}

impl From<&str> for LocalizedText {
    fn from(v: &str) -> Self {
        LocalizedText {
            locale: String::new(),
            text: v.to_owned(),
        }
    }
}

impl From<String> for LocalizedText {
    fn from(v: String) -> Self {
        LocalizedText {
            locale: String::new(),
            text: v,
        }
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
