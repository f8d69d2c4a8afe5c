//! Localization
//!
//! Rules write English source strings wrapped in `UserFacingString`.
//! A `Localizer` turns those strings and typed values into text for one
//! locale. `BasicLocalizer` is the English identity; `CatalogLocalizer`
//! looks strings up in an immutable `LocaleCatalog`.

mod catalog;

pub use catalog::{CatalogLocalizer, LocaleCatalog};

use crate::formatter::util;

/// A source string shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserFacingString {
    text: &'static str,
    should_localize: bool,
}

impl UserFacingString {
    /// Translatable text
    pub const fn new(text: &'static str) -> Self {
        Self {
            text,
            should_localize: true,
        }
    }

    /// Text passed through as-is, e.g. a bare placeholder
    pub const fn not_localized(text: &'static str) -> Self {
        Self {
            text,
            should_localize: false,
        }
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn should_localize(&self) -> bool {
        self.should_localize
    }
}

/// Renders strings and values for one locale. The value methods default
/// to English formatting.
pub trait Localizer: Send + Sync {
    fn locale(&self) -> &str;

    fn localize_string(&self, s: &UserFacingString) -> String;

    fn localize_int(&self, value: i64) -> String {
        value.to_string()
    }

    fn localize_url(&self, url: &str) -> String {
        url.to_string()
    }

    fn localize_bytes(&self, bytes: i64) -> String {
        util::format_bytes(bytes)
    }

    fn localize_time_duration(&self, milliseconds: i64) -> String {
        util::format_time_duration(milliseconds)
    }

    fn localize_percentage(&self, percent: i64) -> String {
        format!("{}%", percent)
    }
}

/// English, no translation
#[derive(Debug, Clone, Default)]
pub struct BasicLocalizer;

impl Localizer for BasicLocalizer {
    fn locale(&self) -> &str {
        "en_US"
    }

    fn localize_string(&self, s: &UserFacingString) -> String {
        s.text().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_localizer() {
        let localizer = BasicLocalizer;
        assert_eq!(localizer.locale(), "en_US");
        assert_eq!(localizer.localize_string(&UserFacingString::new("Minify CSS")), "Minify CSS");
        assert_eq!(localizer.localize_int(42), "42");
        assert_eq!(localizer.localize_bytes(1536), "1.5KiB");
        assert_eq!(localizer.localize_percentage(83), "83%");
        assert_eq!(localizer.localize_time_duration(2000), "2 seconds");
        assert!(!UserFacingString::not_localized("%(URL)s").should_localize());
    }
}
