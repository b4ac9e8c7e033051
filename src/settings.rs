//! User/session preferences: one record, loaded once from a [`SettingsStore`],
//! written back on every change and handed to subscribers.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

use crate::i18n;

pub const SETTINGS_KEY: &str = "portal-settings";
pub const BASE_CURRENCY: &str = "AFN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurrencyFormat {
    SymbolFirst,
    SymbolLast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Notifications {
    pub email: bool,
    pub push: bool,
    pub job_alerts: bool,
    pub scholarship_alerts: bool,
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            email: true,
            push: false,
            job_alerts: true,
            scholarship_alerts: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub language: String,
    pub default_currency: String,
    pub secondary_currency: String,
    pub currency_format: CurrencyFormat,
    pub date_format: String,
    pub direction: TextDirection,
    /// Units of each currency per one unit of [`BASE_CURRENCY`].
    pub exchange_rates: BTreeMap<String, f64>,
    pub notifications: Notifications,
}

impl Default for Settings {
    fn default() -> Self {
        let exchange_rates = CURRENCIES
            .iter()
            .map(|c| (c.code.to_string(), c.default_rate))
            .collect();
        Self {
            theme: Theme::Light,
            language: "en".to_string(),
            default_currency: BASE_CURRENCY.to_string(),
            secondary_currency: "USD".to_string(),
            currency_format: CurrencyFormat::SymbolFirst,
            date_format: "DD/MM/YYYY".to_string(),
            direction: TextDirection::Ltr,
            exchange_rates,
            notifications: Notifications::default(),
        }
    }
}

impl Settings {
    /// Defaults for a deployment whose configured locale is `locale`.
    pub fn for_locale(locale: &str) -> Self {
        Self {
            language: locale.to_string(),
            direction: if i18n::is_rtl(locale) {
                TextDirection::Rtl
            } else {
                TextDirection::Ltr
            },
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: usize,
    pub default_rate: f64,
}

pub const CURRENCIES: &[Currency] = &[
    Currency { code: "AFN", symbol: "؋", name: "Afghan Afghani", decimals: 2, default_rate: 1.0 },
    Currency { code: "USD", symbol: "$", name: "US Dollar", decimals: 2, default_rate: 0.01142 },
    Currency { code: "EUR", symbol: "€", name: "Euro", decimals: 2, default_rate: 0.01052 },
    Currency { code: "GBP", symbol: "£", name: "British Pound", decimals: 2, default_rate: 0.00901 },
    Currency { code: "PKR", symbol: "₨", name: "Pakistani Rupee", decimals: 2, default_rate: 3.19 },
    Currency { code: "INR", symbol: "₹", name: "Indian Rupee", decimals: 2, default_rate: 0.95 },
    Currency { code: "IRR", symbol: "﷼", name: "Iranian Rial", decimals: 0, default_rate: 480.5 },
];

pub fn currency(code: &str) -> Option<&'static Currency> {
    CURRENCIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Key/value persistence for the settings record.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// In-process store; clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

type Subscriber = Box<dyn Fn(&Settings)>;

pub struct SettingsContext<S: SettingsStore> {
    settings: Settings,
    defaults: Settings,
    store: S,
    subscribers: Vec<Subscriber>,
}

impl<S: SettingsStore> SettingsContext<S> {
    pub fn new(store: S) -> Self {
        Self::with_defaults(store, Settings::default())
    }

    /// Load the persisted record, or start from `defaults` if there is none or it
    /// cannot be read.
    pub fn with_defaults(store: S, defaults: Settings) -> Self {
        let settings = match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Ignoring unreadable saved settings: {}", e);
                    defaults.clone()
                }
            },
            Ok(None) => defaults.clone(),
            Err(e) => {
                log::warn!("Could not load saved settings: {:#}", e);
                defaults.clone()
            }
        };
        Self {
            settings,
            defaults,
            store,
            subscribers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&Settings) + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Replace one top-level field, e.g. `("theme", json!("dark"))`.
    pub fn update_setting(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut record = serde_json::to_value(&self.settings)?;
        let fields = record
            .as_object_mut()
            .context("Settings record is not an object")?;
        if !fields.contains_key(key) {
            bail!("Unknown setting: {}", key);
        }
        fields.insert(key.to_string(), value);

        let next: Settings = serde_json::from_value(record)
            .with_context(|| format!("Invalid value for setting '{}'", key))?;
        self.replace(next);
        Ok(())
    }

    /// Replace one field of a nested record without touching its siblings.
    pub fn update_nested_setting(
        &mut self,
        parent: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut record = serde_json::to_value(&self.settings)?;
        let nested = record
            .get_mut(parent)
            .with_context(|| format!("Unknown setting: {}", parent))?
            .as_object_mut()
            .with_context(|| format!("Setting '{}' has no nested fields", parent))?;
        nested.insert(key.to_string(), value);

        let next: Settings = serde_json::from_value(record)
            .with_context(|| format!("Invalid value for setting '{}.{}'", parent, key))?;
        self.replace(next);
        Ok(())
    }

    pub fn update_exchange_rate(&mut self, currency_code: &str, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            bail!("Exchange rate for {} must be a positive number", currency_code);
        }
        self.update_nested_setting(
            "exchangeRates",
            &currency_code.to_uppercase(),
            serde_json::json!(rate),
        )
    }

    /// Convert through the base currency. Unknown currencies leave `amount` as is.
    pub fn convert_currency(&self, amount: f64, from: &str, to: &str) -> f64 {
        match (self.rate(from), self.rate(to)) {
            (Some(from_rate), Some(to_rate)) => amount / from_rate * to_rate,
            _ => amount,
        }
    }

    pub fn format_currency(&self, amount: f64, currency_code: Option<&str>) -> String {
        let code = currency_code.unwrap_or(&self.settings.default_currency);
        let def = currency(code)
            .or_else(|| currency(&self.settings.default_currency))
            .unwrap_or(&CURRENCIES[0]);

        let number = group_thousands(amount.abs(), def.decimals);
        let sign = if amount < 0.0 && number.chars().any(|c| c.is_ascii_digit() && c != '0') {
            "-"
        } else {
            ""
        };
        match self.settings.currency_format {
            CurrencyFormat::SymbolFirst => format!("{}{}{}", sign, def.symbol, number),
            CurrencyFormat::SymbolLast => format!("{}{} {}", sign, number, def.symbol),
        }
    }

    /// Render a date using the `dateFormat` pattern (`DD`, `MM`, `YYYY`).
    pub fn format_date(&self, date: NaiveDate) -> String {
        let pattern = self
            .settings
            .date_format
            .replace('%', "%%")
            .replace("YYYY", "%Y")
            .replace("MM", "%m")
            .replace("DD", "%d");
        date.format(&pattern).to_string()
    }

    pub fn toggle_theme(&mut self) {
        let mut next = self.settings.clone();
        next.theme = match next.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.replace(next);
    }

    pub fn toggle_direction(&mut self) {
        let mut next = self.settings.clone();
        next.direction = match next.direction {
            TextDirection::Ltr => TextDirection::Rtl,
            TextDirection::Rtl => TextDirection::Ltr,
        };
        self.replace(next);
    }

    pub fn reset_settings(&mut self) {
        self.replace(self.defaults.clone());
    }

    fn rate(&self, code: &str) -> Option<f64> {
        self.settings
            .exchange_rates
            .get(&code.to_uppercase())
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    // A failed write keeps the in-memory change; it is retried on the next change.
    fn replace(&mut self, next: Settings) {
        self.settings = next;
        match serde_json::to_string(&self.settings) {
            Ok(raw) => {
                if let Err(e) = self.store.set(SETTINGS_KEY, &raw) {
                    log::error!("Failed to persist settings: {:#}", e);
                }
            }
            Err(e) => log::error!("Failed to serialize settings: {}", e),
        }
        for subscriber in &self.subscribers {
            subscriber(&self.settings);
        }
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}
