use crate::config::{AppConfig, APP_NAME};
use anyhow::Result;
use chrono::Local;
use fern::Dispatch;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const TARGET_WIDTH: usize = 20;

pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
    Channel(Sender<String>),
}

/// Console-style logger whose channels are all silenced outside development,
/// except `error`, which always goes through.
pub struct Logger {
    verbose: bool,
    sink: Box<dyn Log>,
    timers: Mutex<HashMap<String, Instant>>,
    depth: AtomicUsize,
}

impl Logger {
    pub fn new(config: &AppConfig, output: LogOutput) -> Result<Self> {
        let dispatch = Dispatch::new()
            .level(LevelFilter::Trace)
            .format(|out, message, record| {
                let target = record.target().replace("::", ".");
                let display_target = tail_chars(&target, TARGET_WIDTH);
                out.finish(format_args!(
                    "{} {: <width$} [{}] {}",
                    Local::now().format("%y-%m-%d_%H:%M:%S"),
                    display_target,
                    record.level(),
                    message,
                    width = TARGET_WIDTH
                ))
            });

        let dispatch = match output {
            LogOutput::Stdout => dispatch.chain(std::io::stdout()),
            LogOutput::Stderr => dispatch.chain(std::io::stderr()),
            LogOutput::File(path) => dispatch.chain(fern::log_file(path)?),
            LogOutput::Channel(tx) => dispatch.chain(tx),
        };
        let (_, sink) = dispatch.into_log();

        Ok(Self {
            verbose: config.environment.is_development(),
            sink,
            timers: Mutex::new(HashMap::new()),
            depth: AtomicUsize::new(0),
        })
    }

    /// Make this the process-wide `log` backend. The returned handle stays usable
    /// for the channels `log` has no macro for (table, timers, groups).
    pub fn install(self) -> Result<&'static Logger> {
        let max = if self.verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Error
        };
        let logger: &'static Logger = Box::leak(Box::new(self));
        log::set_logger(logger)?;
        log::set_max_level(max);
        Ok(logger)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn log(&self, message: impl Display) {
        self.emit(Level::Info, format_args!("{}", message));
    }

    pub fn info(&self, message: impl Display) {
        self.emit(Level::Info, format_args!("{}", message));
    }

    pub fn warn(&self, message: impl Display) {
        self.emit(Level::Warn, format_args!("{}", message));
    }

    pub fn debug(&self, message: impl Display) {
        self.emit(Level::Debug, format_args!("{}", message));
    }

    pub fn error(&self, message: impl Display) {
        self.emit(Level::Error, format_args!("{}", message));
    }

    /// Render a JSON array of objects as aligned rows. Anything else is printed as-is.
    pub fn table(&self, rows: &serde_json::Value) {
        if !self.verbose {
            return;
        }
        for line in render_table(rows) {
            self.emit(Level::Info, format_args!("{}", line));
        }
    }

    pub fn time(&self, label: &str) {
        if !self.verbose {
            return;
        }
        if let Ok(mut timers) = self.timers.lock() {
            timers.insert(label.to_string(), Instant::now());
        }
    }

    pub fn time_end(&self, label: &str) -> Option<Duration> {
        if !self.verbose {
            return None;
        }
        let started = self.timers.lock().ok()?.remove(label);
        match started {
            Some(start) => {
                let elapsed = start.elapsed();
                self.emit(
                    Level::Info,
                    format_args!("{}: {:.3}ms", label, elapsed.as_secs_f64() * 1000.0),
                );
                Some(elapsed)
            }
            None => {
                self.emit(Level::Warn, format_args!("Timer '{}' does not exist", label));
                None
            }
        }
    }

    pub fn group(&self, label: impl Display) {
        if !self.verbose {
            return;
        }
        self.emit(Level::Info, format_args!("{}", label));
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn group_end(&self) {
        if !self.verbose {
            return;
        }
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| d.checked_sub(1));
    }

    fn passes(&self, level: Level) -> bool {
        level == Level::Error || self.verbose
    }

    fn emit(&self, level: Level, args: fmt::Arguments) {
        if !self.passes(level) {
            return;
        }
        let indent = "  ".repeat(self.depth.load(Ordering::Relaxed));
        self.sink.log(
            &Record::builder()
                .args(format_args!("{}{}", indent, args))
                .level(level)
                .target(APP_NAME)
                .build(),
        );
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.passes(metadata.level()) && self.sink.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.sink.log(record);
        }
    }

    fn flush(&self) {
        self.sink.flush();
    }
}

/// The last `max` characters of `s`.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    match s.char_indices().nth(count - max) {
        Some((start, _)) => &s[start..],
        None => s,
    }
}

fn render_table(rows: &serde_json::Value) -> Vec<String> {
    let items = match rows.as_array() {
        Some(items) if items.iter().all(|i| i.is_object()) && !items.is_empty() => items,
        _ => return vec![rows.to_string()],
    };

    let mut columns: Vec<String> = vec!["(index)".to_string()];
    for item in items {
        if let Some(obj) = item.as_object() {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let cells: Vec<Vec<String>> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            columns
                .iter()
                .enumerate()
                .map(|(c, key)| {
                    if c == 0 {
                        return i.to_string();
                    }
                    match item.get(key) {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(v) => v.to_string(),
                        None => String::new(),
                    }
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            cells
                .iter()
                .map(|row| row[c].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(&columns)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(cells.iter().map(|row| format_row(row)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use std::collections::HashMap as Map;
    use std::sync::mpsc::{channel, Receiver};

    fn logger_for(environment: Environment) -> (Logger, Receiver<String>) {
        let mut config = AppConfig::from_vars(&Map::new()).unwrap();
        config.environment = environment;
        let (tx, rx) = channel();
        let logger = Logger::new(&config, LogOutput::Channel(tx)).unwrap();
        (logger, rx)
    }

    // fern terminates every message sent to a channel with a newline
    fn drain(rx: &Receiver<String>) -> Vec<String> {
        rx.try_iter().map(|line| line.trim_end().to_string()).collect()
    }

    #[test]
    fn test_production_only_emits_errors() {
        let (logger, rx) = logger_for(Environment::Production);
        logger.log("hello");
        logger.info("info");
        logger.warn("warn");
        logger.debug("debug");
        logger.table(&serde_json::json!([{"a": 1}]));
        logger.group("group");
        logger.time("t");
        assert!(logger.time_end("t").is_none());
        assert!(drain(&rx).is_empty());

        logger.error("boom");
        let lines = drain(&rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[ERROR] boom"));
    }

    #[test]
    fn test_development_emits_everything() {
        let (logger, rx) = logger_for(Environment::Development);
        logger.log("hello");
        logger.warn("careful");
        logger.debug("details");
        logger.error("boom");
        let lines = drain(&rx);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("[INFO] hello"));
        assert!(lines[1].contains("[WARN] careful"));
        assert!(lines[2].contains("[DEBUG] details"));
        assert!(lines[3].contains("[ERROR] boom"));
    }

    #[test]
    fn test_groups_indent_nested_lines() {
        let (logger, rx) = logger_for(Environment::Development);
        logger.group("outer");
        logger.log("inside");
        logger.group_end();
        logger.group_end();
        logger.log("outside");
        let lines = drain(&rx);
        assert!(lines[1].ends_with("  inside"));
        assert!(lines[2].ends_with("] outside"));
    }

    #[test]
    fn test_long_non_ascii_target_is_shortened_by_chars() {
        let (logger, rx) = logger_for(Environment::Development);
        Log::log(
            &logger,
            &Record::builder()
                .args(format_args!("hello"))
                .level(Level::Info)
                .target("پورتال::تنظیمات::واحد_پول::نرخ")
                .build(),
        );
        let lines = drain(&rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[INFO] hello"));
        assert_eq!(tail_chars("ééé", 2), "éé");
        assert_eq!(tail_chars("abc", 5), "abc");
    }

    #[test]
    fn test_timer_reports_elapsed() {
        let (logger, rx) = logger_for(Environment::Development);
        logger.time("load");
        assert!(logger.time_end("load").is_some());
        assert!(logger.time_end("load").is_none());
        let lines = drain(&rx);
        assert!(lines[0].contains("load: "));
        assert!(lines[1].contains("Timer 'load' does not exist"));
    }

    #[test]
    fn test_log_trait_respects_gate() {
        let (logger, rx) = logger_for(Environment::Test);
        Log::log(
            &logger,
            &Record::builder()
                .args(format_args!("quiet"))
                .level(Level::Warn)
                .build(),
        );
        assert!(drain(&rx).is_empty());
        assert!(!logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn test_render_table() {
        let lines = render_table(&serde_json::json!([
            {"code": "USD", "rate": 0.5},
            {"code": "AFN", "name": "Afghani"}
        ]));
        assert_eq!(lines[0], "(index) | code | rate | name");
        assert!(lines[2].starts_with("0       | USD  | 0.5"));
        assert_eq!(lines[3], "1       | AFN  |      | Afghani");
        assert_eq!(render_table(&serde_json::json!("x")), vec!["\"x\""]);
    }
}
