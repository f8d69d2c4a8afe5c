//! Translation catalogs
//!
//! A `LocaleCatalog` is built once (usually from JSON) and never changes
//! afterwards; share it behind an `Arc` when several runs use it.

use super::{Localizer, UserFacingString};
use crate::error::{PagespeedError, Result};
use ahash::AHashMap;
use serde_json::Value;
use std::sync::Arc;

/// locale → English source → translation
#[derive(Debug, Clone, Default)]
pub struct LocaleCatalog {
    tables: AHashMap<String, AHashMap<String, String>>,
}

impl LocaleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or extend the table for `locale`
    pub fn with_locale<I, K, V>(mut self, locale: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = self.tables.entry(locale.to_string()).or_default();
        table.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// `{"<locale>": {"<source>": "<translation>", ...}, ...}`
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let locales = value.as_object().ok_or(PagespeedError::InputNotDictionary)?;

        let mut catalog = Self::new();
        for (locale, table) in locales {
            let table = table
                .as_object()
                .ok_or(PagespeedError::MissingFields)?;
            let entries = table
                .iter()
                .filter_map(|(source, translated)| {
                    let translated = translated.as_str();
                    if translated.is_none() {
                        tracing::warn!("Skipping non-string translation for {:?}", source);
                    }
                    translated.map(|t| (source.clone(), t.to_string()))
                });
            catalog = catalog.with_locale(locale, entries);
        }
        tracing::debug!("Loaded catalog with {} locales", catalog.tables.len());
        Ok(catalog)
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.tables.contains_key(locale)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn translate(&self, locale: &str, source: &str) -> Option<&str> {
        self.tables
            .get(locale)
            .and_then(|table| table.get(source))
            .map(String::as_str)
    }
}

/// Translates through a catalog, falling back to the English source
pub struct CatalogLocalizer {
    catalog: Arc<LocaleCatalog>,
    locale: String,
}

impl CatalogLocalizer {
    pub fn new(catalog: Arc<LocaleCatalog>, locale: &str) -> Self {
        if !catalog.has_locale(locale) {
            tracing::warn!("No translations for locale {}, using source strings", locale);
        }
        Self {
            catalog,
            locale: locale.to_string(),
        }
    }
}

impl Localizer for CatalogLocalizer {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn localize_string(&self, s: &UserFacingString) -> String {
        if !s.should_localize() {
            return s.text().to_string();
        }
        match self.catalog.translate(&self.locale, s.text()) {
            Some(translated) => translated.to_string(),
            None => {
                tracing::debug!("No {} translation for {:?}", self.locale, s.text());
                s.text().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: UserFacingString = UserFacingString::new("Minify CSS");

    #[test]
    fn test_catalog_from_json() {
        let catalog = LocaleCatalog::from_json(
            r#"{"fr": {"Minify CSS": "Réduire la taille des CSS"}, "de": {}}"#,
        )
        .unwrap();
        assert!(catalog.has_locale("fr"));
        assert!(catalog.has_locale("de"));
        assert_eq!(catalog.translate("fr", "Minify CSS"), Some("Réduire la taille des CSS"));
        assert_eq!(catalog.translate("de", "Minify CSS"), None);
    }

    #[test]
    fn test_catalog_localizer_falls_back() {
        let catalog = Arc::new(LocaleCatalog::new().with_locale("fr", [("Minify CSS", "Minifier CSS")]));
        let fr = CatalogLocalizer::new(catalog.clone(), "fr");
        assert_eq!(fr.localize_string(&HEADER), "Minifier CSS");
        assert_eq!(fr.locale(), "fr");

        let es = CatalogLocalizer::new(catalog, "es");
        assert_eq!(es.localize_string(&HEADER), "Minify CSS");
    }

    #[test]
    fn test_not_localized_passes_through() {
        let catalog = Arc::new(LocaleCatalog::new().with_locale("fr", [("$1", "nope")]));
        let fr = CatalogLocalizer::new(catalog, "fr");
        assert_eq!(fr.localize_string(&UserFacingString::not_localized("$1")), "$1");
    }

    #[test]
    fn test_bad_catalog() {
        assert!(LocaleCatalog::from_json("[]").is_err());
        assert!(LocaleCatalog::from_json(r#"{"fr": 3}"#).is_err());
        assert!(LocaleCatalog::from_json("{").is_err());
    }
}
