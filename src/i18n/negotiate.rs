/// Locale negotiation and routing
///
/// Decides which locale a request should be served in and whether an
/// unprefixed path needs a redirect to its localized form.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Path prefixes that are never localized
const PASSTHROUGH_PREFIXES: [&str; 2] = ["/_next", "/api"];

/// Supported locales and the fallback
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LocaleConfig {
    pub locales: Vec<String>,
    pub default_locale: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en".to_string(), "es".to_string()],
            default_locale: "en".to_string(),
        }
    }
}

impl LocaleConfig {
    pub fn is_supported(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l.eq_ignore_ascii_case(locale))
    }

    /// Supported locale matching `tag`, exactly or by primary subtag
    fn match_tag(&self, tag: &str) -> Option<&str> {
        if let Some(exact) = self.locales.iter().find(|l| l.eq_ignore_ascii_case(tag)) {
            return Some(exact);
        }
        let primary = tag.split(['-', '_']).next().unwrap_or(tag);
        self.locales
            .iter()
            .find(|l| {
                let candidate = l.split(['-', '_']).next().unwrap_or(l);
                candidate.eq_ignore_ascii_case(primary)
            })
            .map(String::as_str)
    }
}

/// What to do with an incoming request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Serve as is
    Pass,
    /// Redirect to this localized location
    Redirect(String),
}

/// Language tags from an `Accept-Language` header, best first.
///
/// Entries with `q=0` are dropped; equal weights keep header order.
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut fields = part.split(';');
            let tag = fields.next()?.trim();
            if tag.is_empty() {
                return None;
            }

            let mut quality = 1.0;
            for param in fields {
                if let Some(value) = param.trim().strip_prefix("q=") {
                    quality = value.trim().parse::<f32>().ok()?;
                }
            }
            (quality > 0.0).then(|| (tag.to_string(), quality))
        })
        .collect();

    // sort_by is stable
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}

/// Locale for a request: supported cookie value, then the best accepted
/// language, then the default
pub fn detect_locale(
    config: &LocaleConfig,
    accept_language: Option<&str>,
    preferred_cookie: Option<&str>,
) -> String {
    if let Some(cookie) = preferred_cookie {
        if let Some(locale) = config.locales.iter().find(|l| l.eq_ignore_ascii_case(cookie)) {
            return locale.clone();
        }
    }

    if let Some(header) = accept_language {
        for tag in parse_accept_language(header) {
            if tag == "*" {
                break;
            }
            if let Some(locale) = config.match_tag(&tag) {
                return locale.to_string();
            }
        }
    }

    config.default_locale.clone()
}

/// Locale named by the first segment of `path`, if supported.
/// Matching ignores ASCII case; the configured spelling is returned.
pub fn locale_from_path<'a>(config: &'a LocaleConfig, path: &str) -> Option<&'a str> {
    let first = path.trim_start_matches('/').split(['/', '?', '#']).next()?;
    config
        .locales
        .iter()
        .find(|l| l.eq_ignore_ascii_case(first))
        .map(String::as_str)
}

fn is_passthrough(path: &str) -> bool {
    if PASSTHROUGH_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
    {
        return true;
    }
    // Static files: the last segment has an extension
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

/// Decide how to route `path` (which may carry a query string)
pub fn route(
    config: &LocaleConfig,
    path: &str,
    accept_language: Option<&str>,
    preferred_cookie: Option<&str>,
) -> Routing {
    let (path_only, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };

    if is_passthrough(path_only) || locale_from_path(config, path_only).is_some() {
        return Routing::Pass;
    }

    let locale = detect_locale(config, accept_language, preferred_cookie);
    let mut target = if path_only.is_empty() || path_only == "/" {
        format!("/{locale}")
    } else if path_only.starts_with('/') {
        format!("/{locale}{path_only}")
    } else {
        format!("/{locale}/{path_only}")
    };
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }

    tracing::debug!(path, target = %target, "redirecting to localized path");
    Routing::Redirect(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_language_ordering() {
        let tags = parse_accept_language("fr;q=0.5, es-MX, en;q=0.8, de;q=0");
        assert_eq!(tags, vec!["es-MX", "en", "fr"]);
    }

    #[test]
    fn test_accept_language_equal_weights_keep_order() {
        let tags = parse_accept_language("pt, es;q=0.9, en;q=0.9");
        assert_eq!(tags, vec!["pt", "es", "en"]);
        assert!(parse_accept_language("").is_empty());
    }

    #[test]
    fn test_cookie_wins_when_supported() {
        let config = LocaleConfig::default();
        assert_eq!(detect_locale(&config, Some("en"), Some("es")), "es");
        assert_eq!(detect_locale(&config, Some("es"), Some("de")), "es");
    }

    #[test]
    fn test_region_tags_match_primary_subtag() {
        let config = LocaleConfig::default();
        assert_eq!(detect_locale(&config, Some("es-AR,en;q=0.5"), None), "es");
        assert_eq!(detect_locale(&config, Some("de-DE, fr"), None), "en");
        assert_eq!(detect_locale(&config, None, None), "en");
    }

    #[test]
    fn test_locale_from_path() {
        let config = LocaleConfig::default();
        assert_eq!(locale_from_path(&config, "/es/projects"), Some("es"));
        assert_eq!(locale_from_path(&config, "/en"), Some("en"));
        assert_eq!(locale_from_path(&config, "/english"), None);
        assert_eq!(locale_from_path(&config, "/"), None);
    }

    #[test]
    fn test_locale_prefix_ignores_case() {
        let config = LocaleConfig::default();
        assert_eq!(locale_from_path(&config, "/ES/music"), Some("es"));
        assert_eq!(route(&config, "/ES/music", Some("en"), None), Routing::Pass);
        assert_eq!(route(&config, "/En", None, None), Routing::Pass);
    }

    #[test]
    fn test_route_passes_internals_and_files() {
        let config = LocaleConfig::default();
        for path in ["/_next/static/chunk.js", "/api/contact", "/images/a.jpg", "/favicon.ico", "/es/music"] {
            assert_eq!(route(&config, path, Some("es"), None), Routing::Pass, "{path}");
        }
    }

    #[test]
    fn test_route_redirects_unprefixed_paths() {
        let config = LocaleConfig::default();
        assert_eq!(
            route(&config, "/", Some("es-ES"), None),
            Routing::Redirect("/es".to_string())
        );
        assert_eq!(
            route(&config, "/projects?tab=web", None, Some("es")),
            Routing::Redirect("/es/projects?tab=web".to_string())
        );
        assert_eq!(
            route(&config, "/about", Some("ja"), None),
            Routing::Redirect("/en/about".to_string())
        );
    }

    #[test]
    fn test_config_json_shape() {
        let config: LocaleConfig =
            serde_json::from_str(r#"{"locales":["en","fr"],"defaultLocale":"fr"}"#).unwrap();
        assert_eq!(config.default_locale, "fr");
        assert!(config.is_supported("FR"));
    }
}
