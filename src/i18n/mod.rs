/// Internationalization module
///
/// This module handles:
/// - Picking a locale from cookies and Accept-Language (negotiate.rs)
/// - Redirecting unprefixed paths to their localized form (negotiate.rs)
/// - Looking up translated messages (messages.rs)

pub mod messages;
pub mod negotiate;

pub use messages::{CatalogError, MessageCatalog};
pub use negotiate::{detect_locale, route, LocaleConfig, Routing};
