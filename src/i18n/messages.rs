/// Translation message catalog
///
/// Each locale has one JSON document at `{messages_dir}/{locale}.json` with
/// nested objects of strings. Parsed documents are kept in a `BoundedCache`
/// owned by the catalog.
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::cache::BoundedCache;

use super::negotiate::LocaleConfig;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unsupported locale '{0}'")]
    UnknownLocale(String),

    #[error("failed to read messages from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid message file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no message '{key}' for locale '{locale}'")]
    MissingKey { locale: String, key: String },
}

#[derive(Debug)]
pub struct MessageCatalog {
    messages_dir: PathBuf,
    config: LocaleConfig,
    cache: BoundedCache<String, Arc<Value>>,
}

impl MessageCatalog {
    pub fn new(messages_dir: impl Into<PathBuf>, config: LocaleConfig, capacity: usize) -> Self {
        Self {
            messages_dir: messages_dir.into(),
            config,
            cache: BoundedCache::new(capacity),
        }
    }

    /// Number of parsed documents currently held
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Parsed message document for `locale`, read from disk on first use
    pub fn messages(&mut self, locale: &str) -> Result<Arc<Value>, CatalogError> {
        let Some(key) = self
            .config
            .locales
            .iter()
            .find(|l| l.eq_ignore_ascii_case(locale))
            .cloned()
        else {
            return Err(CatalogError::UnknownLocale(locale.to_string()));
        };

        if let Some(doc) = self.cache.get(&key) {
            return Ok(Arc::clone(doc));
        }

        let path = self.messages_dir.join(format!("{key}.json"));
        let json = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&json).map_err(|source| CatalogError::Parse {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(locale = %key, path = %path.display(), "loaded message catalog");
        let doc = Arc::new(doc);
        if let Some(evicted) = self.cache.insert(key, Arc::clone(&doc)) {
            tracing::trace!(evicted = %evicted, "evicted message catalog");
        }
        Ok(doc)
    }

    /// Message at the dotted `key`, falling back to the default locale
    pub fn translate(&mut self, locale: &str, key: &str) -> Result<String, CatalogError> {
        let doc = self.messages(locale)?;
        if let Some(message) = lookup(&doc, key) {
            return Ok(message.to_string());
        }

        let default = self.config.default_locale.clone();
        if !default.eq_ignore_ascii_case(locale) {
            let fallback = self.messages(&default)?;
            if let Some(message) = lookup(&fallback, key) {
                tracing::debug!(locale, key, fallback = %default, "message missing, using default locale");
                return Ok(message.to_string());
            }
        }

        Err(CatalogError::MissingKey {
            locale: locale.to_string(),
            key: key.to_string(),
        })
    }

    /// `translate` followed by `{name}` placeholder substitution
    pub fn translate_with(
        &mut self,
        locale: &str,
        key: &str,
        args: &[(&str, &str)],
    ) -> Result<String, CatalogError> {
        let template = self.translate(locale, key)?;
        Ok(interpolate(&template, args))
    }
}

/// Walk a dotted path through nested objects down to a string
fn lookup<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    key.split('.')
        .try_fold(doc, |node, segment| node.get(segment))?
        .as_str()
}

/// Replace `{name}` placeholders; unknown placeholders are left as is
pub fn interpolate(template: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn catalog(dir: &Path, capacity: usize) -> MessageCatalog {
        std::fs::write(
            dir.join("en.json"),
            r#"{"nav":{"home":"Home","projects":"Projects"},"hero":{"greeting":"Hi, I'm {name}"}}"#,
        )
        .unwrap();
        std::fs::write(dir.join("es.json"), r#"{"nav":{"home":"Inicio"}}"#).unwrap();
        MessageCatalog::new(dir, LocaleConfig::default(), capacity)
    }

    #[test]
    fn test_translate_dotted_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog(dir.path(), 4);

        assert_eq!(catalog.translate("es", "nav.home").unwrap(), "Inicio");
        assert_eq!(catalog.translate("en", "nav.projects").unwrap(), "Projects");
    }

    #[test]
    fn test_missing_message_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog(dir.path(), 4);

        assert_eq!(catalog.translate("es", "nav.projects").unwrap(), "Projects");
        let err = catalog.translate("es", "nav.contact").unwrap_err();
        assert!(matches!(err, CatalogError::MissingKey { .. }));

        // A subtree is not a message
        assert!(catalog.translate("en", "nav").is_err());
    }

    #[test]
    fn test_unknown_locale_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog(dir.path(), 4);

        let err = catalog.translate("de", "nav.home").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownLocale(ref l) if l == "de"));
    }

    #[test]
    fn test_cache_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog(dir.path(), 1);

        catalog.messages("en").unwrap();
        catalog.messages("es").unwrap();
        assert_eq!(catalog.cached(), 1);

        // Served from cache even after the file is gone
        std::fs::remove_file(dir.path().join("es.json")).unwrap();
        assert_eq!(catalog.translate("es", "nav.home").unwrap(), "Inicio");
    }

    #[test]
    fn test_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MessageCatalog::new(dir.path(), LocaleConfig::default(), 2);
        assert!(matches!(catalog.messages("en"), Err(CatalogError::Io { .. })));

        std::fs::write(dir.path().join("en.json"), "{ nope").unwrap();
        assert!(matches!(catalog.messages("en"), Err(CatalogError::Parse { .. })));
    }

    #[test]
    fn test_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog(dir.path(), 4);

        let text = catalog
            .translate_with("en", "hero.greeting", &[("name", "Ada")])
            .unwrap();
        assert_eq!(text, "Hi, I'm Ada");
        assert_eq!(interpolate("{a} and {b}", &[("a", "1")]), "1 and {b}");
    }
}
