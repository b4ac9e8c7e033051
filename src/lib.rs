pub mod config;
pub mod db;
pub mod filters;
pub mod i18n;
pub mod logger;
pub mod migrate;
pub mod models;
pub mod settings;
