use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use portal::config::{AppConfig, Environment, VERSION};
use portal::db::{Database, JobFilter};
use portal::filters::{self, ALL};
use portal::i18n;
use portal::logger::{LogOutput, Logger};
use portal::migrate::Migrator;
use portal::models::{Gender, NewJob};
use portal::settings::{FileStore, Settings, SettingsContext};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portal")]
#[command(version = VERSION)]
#[command(about = "Content portal tooling - schema migrations, content data, settings and translations")]
struct Cli {
    /// Database file (overrides PORTAL_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Environment: development, production or test (overrides PORTAL_ENV)
    #[arg(long, global = true)]
    env: Option<Environment>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply, revert or inspect schema migrations
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },

    /// Manage companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Manage job postings
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Manage books
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },

    /// Show or change saved preferences
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// List the filter options for an entity field (e.g. `job type`)
    Options {
        entity: String,
        field: String,
    },

    /// List page sizes and sort orders
    Sorting,

    /// Show the display label and badge class for a token
    Label {
        token: String,
    },

    /// Translate a key
    Translate {
        key: String,

        /// Locale to translate into (defaults to PORTAL_LOCALE)
        #[arg(short, long)]
        locale: Option<String>,

        /// Placeholder values as name=value
        #[arg(short, long = "var")]
        vars: Vec<String>,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Show applied and pending migrations
    Status,

    /// Apply pending migrations
    Up {
        /// Stop after this version
        #[arg(long)]
        to: Option<i64>,
    },

    /// Revert applied migrations
    Down {
        /// Number of migrations to revert
        #[arg(long, default_value = "1", conflicts_with = "to")]
        steps: usize,

        /// Revert everything above this version
        #[arg(long)]
        to: Option<i64>,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// List all companies
    List,

    /// Add a company
    Add {
        name: String,

        #[arg(short, long)]
        logo: Option<String>,

        #[arg(short, long)]
        about: Option<String>,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List jobs
    List {
        #[arg(short = 't', long, default_value = ALL)]
        job_type: String,

        #[arg(short, long, default_value = ALL)]
        status: String,

        #[arg(short, long, default_value = ALL)]
        gender: String,

        /// Company name
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Show job details
    Show {
        id: i64,
    },

    /// Add a job posting
    Add {
        title: String,

        /// Company name; created if it does not exist
        #[arg(short, long)]
        company: String,

        #[arg(short = 't', long)]
        job_type: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(long)]
        duties: Option<String>,

        #[arg(long)]
        requirements: Option<String>,

        /// Province id, may be repeated
        #[arg(short, long = "province")]
        provinces: Vec<i64>,

        #[arg(long)]
        contract_type: Option<String>,

        #[arg(long)]
        contract_duration: Option<String>,

        #[arg(long)]
        extensible: bool,

        #[arg(long)]
        probation: Option<String>,

        #[arg(long)]
        vacancies: Option<i64>,

        #[arg(long)]
        salary: Option<String>,

        #[arg(long)]
        experience: Option<String>,

        #[arg(short, long, default_value = "any")]
        gender: Gender,

        #[arg(long)]
        closing_date: Option<String>,

        #[arg(long)]
        posting_date: Option<String>,

        #[arg(long)]
        reference: Option<String>,
    },
}

#[derive(Subcommand)]
enum BookCommands {
    /// List books
    List {
        #[arg(short, long, default_value = ALL)]
        status: String,
    },

    /// Add a book
    Add {
        title: String,

        #[arg(short, long)]
        author: Option<String>,

        #[arg(short, long)]
        format: Option<String>,

        #[arg(short, long)]
        language: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the current settings as JSON
    Show,

    /// Replace a top-level setting; VALUE is JSON or a plain string
    Set { key: String, value: String },

    /// Replace one field of a nested setting
    SetNested {
        parent: String,
        key: String,
        value: String,
    },

    /// Set the exchange rate of a currency against AFN
    Rate { code: String, rate: f64 },

    /// Convert an amount between currencies
    Convert { amount: f64, from: String, to: String },

    /// Format an amount in a currency
    Format { amount: f64, code: Option<String> },

    /// Format a date (YYYY-MM-DD) with the saved date format
    Date { date: NaiveDate },

    ToggleTheme,

    ToggleDirection,

    /// Restore defaults
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(env) = cli.env {
        config.environment = env;
    }
    let logger = Logger::new(&config, LogOutput::Stderr)?.install()?;
    log::debug!("Running in {} mode", config.environment.as_str());

    match cli.command {
        Commands::Migrate { command } => {
            let mut db = Database::open(&config)?;
            let migrator = Migrator::standard()?;
            match command {
                MigrateCommands::Status => {
                    let status = migrator.status(db.conn())?;
                    logger.table(&serde_json::to_value(&status)?);
                    println!("{:<8} {:<30} {:<20}", "VERSION", "NAME", "APPLIED");
                    println!("{}", "-".repeat(60));
                    for entry in status {
                        println!(
                            "{:<8} {:<30} {:<20}",
                            entry.version,
                            truncate(&entry.name, 28),
                            entry.applied_at.as_deref().unwrap_or("pending")
                        );
                    }
                }

                MigrateCommands::Up { to } => {
                    logger.time("migrate up");
                    let applied = migrator.up(db.conn_mut(), to)?;
                    logger.time_end("migrate up");
                    if applied.is_empty() {
                        println!("Database is up to date (version {}).", migrator.current_version(db.conn())?);
                    } else {
                        println!("Applied {} migrations: {:?}", applied.len(), applied);
                    }
                }

                MigrateCommands::Down { steps, to } => {
                    let reverted = match to {
                        Some(target) => migrator.down_to(db.conn_mut(), target)?,
                        None => migrator.down(db.conn_mut(), steps)?,
                    };
                    if reverted.is_empty() {
                        println!("Nothing to revert.");
                    } else {
                        println!("Reverted {} migrations: {:?}", reverted.len(), reverted);
                    }
                    println!("Database is now at version {}.", migrator.current_version(db.conn())?);
                }
            }
        }

        Commands::Company { command } => {
            let db = open_migrated(&config)?;
            match command {
                CompanyCommands::List => {
                    let companies = db.list_companies()?;
                    if companies.is_empty() {
                        println!("No companies found.");
                    } else {
                        println!("{:<6} {:<30} {:<40}", "ID", "NAME", "LOGO");
                        println!("{}", "-".repeat(78));
                        for company in companies {
                            let logo = match &company.logo {
                                Some(url) if config.is_image_allowed(url) => url.clone(),
                                Some(url) => format!("{} (blocked)", url),
                                None => filters::NOT_AVAILABLE.to_string(),
                            };
                            println!(
                                "{:<6} {:<30} {:<40}",
                                company.id,
                                truncate(&company.name, 28),
                                truncate(&logo, 40)
                            );
                        }
                    }
                }

                CompanyCommands::Add { name, logo, about } => {
                    let id = db.add_company(&name, about.as_deref(), logo.as_deref())?;
                    println!("Added company '{}' (ID: {})", name, id);
                }
            }
        }

        Commands::Job { command } => {
            let db = open_migrated(&config)?;
            match command {
                JobCommands::List {
                    job_type,
                    status,
                    gender,
                    company,
                } => {
                    let filter = JobFilter {
                        job_type,
                        status,
                        gender,
                        company,
                    };
                    let jobs = db.list_jobs(&filter)?;
                    if jobs.is_empty() {
                        println!("No jobs found.");
                    } else {
                        println!(
                            "{:<6} {:<10} {:<30} {:<20} {:<14}",
                            "ID", "STATUS", "TITLE", "COMPANY", "TYPE"
                        );
                        println!("{}", "-".repeat(84));
                        for job in jobs {
                            println!(
                                "{:<6} {:<10} {:<30} {:<20} {:<14}",
                                job.id,
                                job.status,
                                truncate(&job.title, 28),
                                truncate(&job.company_name, 18),
                                filters::get_category_label(job.job_type.as_deref())
                            );
                        }
                    }
                }

                JobCommands::Show { id } => match db.get_job(id)? {
                    Some(job) => {
                        let na = || filters::NOT_AVAILABLE.to_string();
                        println!("Job #{}", job.id);
                        println!("Title: {}", job.title);
                        println!("Company: {}", job.company_name);
                        println!("Status: {}", job.status);
                        println!("Type: {}", filters::get_category_label(job.job_type.as_deref()));
                        println!("Gender: {}", job.gender);
                        println!("Vacancies: {}", job.vacancy_count);
                        if !job.province_ids.is_empty() {
                            println!("Provinces: {:?}", job.province_ids);
                        }
                        println!("Salary: {}", job.salary_range.clone().unwrap_or_else(na));
                        println!("Experience: {}", job.experience.clone().unwrap_or_else(na));
                        println!(
                            "Contract: {} {}{}",
                            filters::get_category_label(job.contract_type.as_deref()),
                            job.contract_duration.clone().unwrap_or_default(),
                            if job.contract_extensible { " (extensible)" } else { "" }
                        );
                        if let Some(probation) = &job.probation_period {
                            println!("Probation: {}", probation);
                        }
                        if let Some(reference) = &job.reference_number {
                            println!("Reference: {}", reference);
                        }
                        println!("Posted: {}", job.posting_date.clone().unwrap_or_else(na));
                        println!("Closes: {}", job.closing_date.clone().unwrap_or_else(na));
                        if let Some(duties) = &job.duties_and_responsibilities {
                            println!("\n--- Duties and Responsibilities ---\n{}", duties);
                        }
                        if let Some(requirements) = &job.job_requirements {
                            println!("\n--- Requirements ---\n{}", requirements);
                        }
                    }
                    None => {
                        println!("Job #{} not found.", id);
                    }
                },

                JobCommands::Add {
                    title,
                    company,
                    job_type,
                    status,
                    duties,
                    requirements,
                    provinces,
                    contract_type,
                    contract_duration,
                    extensible,
                    probation,
                    vacancies,
                    salary,
                    experience,
                    gender,
                    closing_date,
                    posting_date,
                    reference,
                } => {
                    let job = NewJob {
                        title,
                        company,
                        job_type,
                        status,
                        duties_and_responsibilities: duties,
                        job_requirements: requirements,
                        province_ids: provinces,
                        contract_type,
                        contract_duration,
                        contract_extensible: extensible,
                        probation_period: probation,
                        vacancy_count: vacancies,
                        salary_range: salary,
                        experience,
                        gender,
                        closing_date,
                        posting_date,
                        reference_number: reference,
                    };
                    let id = db.add_job(&job)?;
                    println!("Added job #{}", id);
                }
            }
        }

        Commands::Book { command } => {
            let db = open_migrated(&config)?;
            match command {
                BookCommands::List { status } => {
                    let books = db.list_books(&status)?;
                    if books.is_empty() {
                        println!("No books found.");
                    } else {
                        println!("{:<6} {:<30} {:<20} {:<10} {:<12}", "ID", "TITLE", "AUTHOR", "FORMAT", "STATUS");
                        println!("{}", "-".repeat(82));
                        for book in books {
                            println!(
                                "{:<6} {:<30} {:<20} {:<10} {:<12}",
                                book.id,
                                truncate(&book.title, 28),
                                truncate(&book.author.unwrap_or_default(), 18),
                                book.format.unwrap_or_default(),
                                book.status
                            );
                        }
                    }
                }

                BookCommands::Add {
                    title,
                    author,
                    format,
                    language,
                } => {
                    let id = db.add_book(&title, author.as_deref(), format.as_deref(), language.as_deref())?;
                    println!("Added book #{}", id);
                }
            }
        }

        Commands::Settings { command } => {
            let mut ctx = SettingsContext::with_defaults(
                FileStore::new(config.storage_dir.clone()),
                Settings::for_locale(&config.locale),
            );
            match command {
                SettingsCommands::Show => {
                    println!("{}", serde_json::to_string_pretty(ctx.settings())?);
                }
                SettingsCommands::Set { key, value } => {
                    ctx.update_setting(&key, parse_value(&value))?;
                    println!("Set {}.", key);
                }
                SettingsCommands::SetNested { parent, key, value } => {
                    ctx.update_nested_setting(&parent, &key, parse_value(&value))?;
                    println!("Set {}.{}.", parent, key);
                }
                SettingsCommands::Rate { code, rate } => {
                    ctx.update_exchange_rate(&code, rate)?;
                    println!("1 AFN = {} {}", rate, code.to_uppercase());
                }
                SettingsCommands::Convert { amount, from, to } => {
                    let converted = ctx.convert_currency(amount, &from, &to);
                    println!(
                        "{} = {}",
                        ctx.format_currency(amount, Some(from.as_str())),
                        ctx.format_currency(converted, Some(to.as_str()))
                    );
                }
                SettingsCommands::Format { amount, code } => {
                    println!("{}", ctx.format_currency(amount, code.as_deref()));
                }
                SettingsCommands::Date { date } => {
                    println!("{}", ctx.format_date(date));
                }
                SettingsCommands::ToggleTheme => {
                    ctx.toggle_theme();
                    println!("Theme: {:?}", ctx.settings().theme);
                }
                SettingsCommands::ToggleDirection => {
                    ctx.toggle_direction();
                    println!("Direction: {:?}", ctx.settings().direction);
                }
                SettingsCommands::Reset => {
                    ctx.reset_settings();
                    println!("Settings restored to defaults.");
                }
            }
        }

        Commands::Options { entity, field } => match filters::options_for(&entity, &field) {
            Some(options) => {
                for option in options {
                    if filters::is_all(option) {
                        println!("{}", option);
                    } else {
                        println!("{:<20} {}", option, filters::get_category_label(Some(*option)));
                    }
                }
            }
            None => bail!("No options for {} {}", entity, field),
        },

        Commands::Sorting => {
            println!(
                "Page sizes: {:?} (default {})",
                filters::PAGE_SIZES,
                filters::DEFAULT_PAGE_SIZE
            );
            for option in filters::SORT_OPTIONS {
                println!("{:<20} {:<10} {:?}", option.label, option.field, option.direction);
            }
        }

        Commands::Label { token } => {
            println!("{}", filters::get_category_label(Some(token.as_str())));
            println!("{}", filters::get_status_badge_color(Some(token.as_str())));
        }

        Commands::Translate { key, locale, vars } => {
            let i18n = i18n::global(&config.locale)?;
            let mut i18n = match i18n.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(locale) = locale {
                i18n.change_language(&locale)?;
            }
            let pairs: Vec<(&str, &str)> = vars
                .iter()
                .filter_map(|v| v.split_once('='))
                .collect();
            println!("{}", i18n.t_with(&key, &pairs));
        }
    }

    Ok(())
}

fn open_migrated(config: &AppConfig) -> Result<Database> {
    let db = Database::open(config)?;
    db.ensure_migrated(&Migrator::standard()?)?;
    Ok(db)
}

fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
