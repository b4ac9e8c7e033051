//! Translation bundles for the supported locales and key lookup over them.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, OnceLock};

pub const SUPPORTED_LOCALES: &[&str] = &["en", "fa", "ps"];
pub const RTL_LOCALES: &[&str] = &["fa", "ps"];

const BUNDLES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.json")),
    ("fa", include_str!("../locales/fa.json")),
    ("ps", include_str!("../locales/ps.json")),
];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid placeholder pattern")
});

static GLOBAL: OnceLock<Mutex<I18n>> = OnceLock::new();

pub fn is_rtl(locale: &str) -> bool {
    RTL_LOCALES.contains(&locale)
}

pub struct I18n {
    bundles: HashMap<String, HashMap<String, String>>,
    language: String,
    fallback: String,
    initialized: bool,
    registrations: usize,
}

impl I18n {
    /// Unregistered instance; `locale` is both the active and the fallback language.
    pub fn new(locale: &str) -> Self {
        Self {
            bundles: HashMap::new(),
            language: locale.to_string(),
            fallback: locale.to_string(),
            initialized: false,
            registrations: 0,
        }
    }

    /// Register the embedded bundles. Returns false if already done.
    pub fn init(&mut self) -> Result<bool> {
        if self.initialized {
            return Ok(false);
        }
        for (locale, raw) in BUNDLES {
            let tree: Value = serde_json::from_str(raw)
                .with_context(|| format!("Invalid translation bundle for '{}'", locale))?;
            let mut flat = HashMap::new();
            flatten("", &tree, &mut flat);
            log::debug!("Registered {} strings for '{}'", flat.len(), locale);
            self.bundles.insert(locale.to_string(), flat);
            self.registrations += 1;
        }
        if !self.bundles.contains_key(&self.language) {
            log::warn!(
                "No bundle for locale '{}', using '{}'",
                self.language,
                BUNDLES[0].0
            );
            self.language = BUNDLES[0].0.to_string();
            self.fallback = self.language.clone();
        }
        self.initialized = true;
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// How many bundles have been registered over this instance's lifetime.
    pub fn registrations(&self) -> usize {
        self.registrations
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn change_language(&mut self, locale: &str) -> Result<()> {
        if !self.bundles.contains_key(locale) {
            bail!("Unsupported locale: {}", locale);
        }
        self.language = locale.to_string();
        Ok(())
    }

    pub fn is_rtl(&self) -> bool {
        is_rtl(&self.language)
    }

    pub fn t(&self, key: &str) -> String {
        self.t_in(&self.language, key)
    }

    /// Look `key` up in `locale`, then the fallback locale, then return the key itself.
    pub fn t_in(&self, locale: &str, key: &str) -> String {
        [locale, self.fallback.as_str()]
            .iter()
            .find_map(|l| self.bundles.get(*l).and_then(|b| b.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Translate and substitute `{{name}}` placeholders. Unknown names are left as is.
    pub fn t_with(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let template = self.t(key);
        PLACEHOLDER
            .replace_all(&template, |caps: &regex::Captures| {
                let name = &caps[1];
                vars.iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Process-wide instance, created and initialized on first use. Later calls
/// ignore `locale`.
pub fn global(locale: &str) -> Result<&'static Mutex<I18n>> {
    if let Some(existing) = GLOBAL.get() {
        return Ok(existing);
    }
    let mut i18n = I18n::new(locale);
    i18n.init()?;
    Ok(GLOBAL.get_or_init(|| Mutex::new(i18n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(locale: &str) -> I18n {
        let mut i18n = I18n::new(locale);
        i18n.init().unwrap();
        i18n
    }

    #[test]
    fn test_init_registers_once() {
        let mut i18n = I18n::new("en");
        assert!(!i18n.is_initialized());
        assert!(i18n.init().unwrap());
        assert!(!i18n.init().unwrap());
        assert_eq!(i18n.registrations(), SUPPORTED_LOCALES.len());
    }

    #[test]
    fn test_every_supported_locale_has_a_bundle() {
        let i18n = ready("en");
        for locale in SUPPORTED_LOCALES {
            assert_ne!(i18n.t_in(locale, "nav.jobs"), "nav.jobs", "{}", locale);
        }
    }

    #[test]
    fn test_lookup_falls_back_to_default_then_key() {
        let mut i18n = ready("en");
        i18n.change_language("ps").unwrap();
        assert_eq!(i18n.t("nav.jobs"), "دندې");
        // missing in ps, present in en
        assert_eq!(i18n.t("settings.reset"), "Reset to defaults");
        assert_eq!(i18n.t("no.such.key"), "no.such.key");
    }

    #[test]
    fn test_untranslated_before_init_returns_key() {
        let i18n = I18n::new("en");
        assert_eq!(i18n.t("nav.jobs"), "nav.jobs");
    }

    #[test]
    fn test_change_language_rejects_unknown_locale() {
        let mut i18n = ready("en");
        assert!(i18n.change_language("de").is_err());
        assert_eq!(i18n.language(), "en");
        i18n.change_language("fa").unwrap();
        assert!(i18n.is_rtl());
    }

    #[test]
    fn test_unknown_initial_locale_uses_first_bundle() {
        let i18n = ready("de");
        assert_eq!(i18n.language(), "en");
        assert_eq!(i18n.t("nav.books"), "Books");
    }

    #[test]
    fn test_interpolation() {
        let i18n = ready("en");
        assert_eq!(i18n.t_with("app.welcome", &[("name", "Zahra")]), "Welcome, Zahra!");
        assert_eq!(
            i18n.t_with("common.pageSize", &[("other", "1")]),
            "Show {{count}} per page"
        );
    }

    #[test]
    fn test_global_is_shared() {
        let a = global("en").unwrap();
        let b = global("fa").unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(a.lock().unwrap().is_initialized());
    }
}
