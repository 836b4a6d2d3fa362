//! # Helideck notification center CLI
//!
//! Drives the alert bus and the persisted notification center from the shell.
//!
//! Usage:
//!   helideck notify "Helideck lighting failure" --severity error --id na-kika-lighting
//!   helideck list --filter unread
//!   helideck read na-kika-lighting
//!   helideck archive na-kika-lighting
//!   helideck clear --filter archived

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use helideck_core::HelideckConfig;
use helideck_notify::{CenterRecord, NotificationFilter, NotificationSystem, NotifyOptions, Severity};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "helideck",
    version,
    about = "🚁 Helideck: inspection alerts and notification center"
)]
struct Cli {
    /// Config file (default: ~/.helideck/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Raise an alert
    Notify {
        message: String,
        /// info | success | warning | error | loading
        #[arg(short, long, default_value = "info")]
        severity: Severity,
        /// Logical id (re-using it replaces the existing alert)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Keep in the notification center regardless of severity
        #[arg(long)]
        persist: bool,
        /// Toast duration override in milliseconds (0 = sticky)
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// List notification center records
    List {
        /// all | unread | archived | <category>
        #[arg(short, long, default_value = "all")]
        filter: NotificationFilter,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Mark one record read
    Read { id: String },
    /// Mark every record read
    ReadAll,
    /// Archive a record
    Archive { id: String },
    /// Delete a record permanently
    Delete { id: String },
    /// Delete the records in a filter's scope
    Clear {
        #[arg(short, long, default_value = "all")]
        filter: NotificationFilter,
    },
    /// Unread count and per-category totals
    Count,
    /// Print the effective configuration and retained record count
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "helideck=debug,helideck_notify=debug"
    } else {
        "helideck=info,helideck_notify=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => HelideckConfig::load_from(path)?,
        None => HelideckConfig::load()?,
    };
    tracing::debug!(
        "⚙️ Storage: {:?} at {}",
        config.notifications.storage,
        config.notifications.data_path().display()
    );

    let sys = NotificationSystem::from_config(&config.notifications)?;
    run(cli.command, &sys, &config)
}

fn run(command: Command, sys: &NotificationSystem, config: &HelideckConfig) -> Result<()> {
    match command {
        Command::Notify {
            message,
            severity,
            id,
            category,
            persist,
            duration_ms,
        } => {
            let mut options = NotifyOptions::new().persist(persist);
            if let Some(id) = id {
                options = options.id(id);
            }
            if let Some(category) = category {
                options = options.category(category);
            }
            if let Some(ms) = duration_ms {
                options = options.duration_ms(ms);
            }
            let id = sys.bus.notify(message, severity, options);
            let recorded = sys.center.get(&id).is_some_and(|r| !r.archived);
            println!("✅ {id}{}", if recorded { " (recorded in notification center)" } else { "" });
        }
        Command::List { filter, json } => {
            sys.center.set_filter(filter);
            let records = sys.center.notifications();
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
        }
        Command::Read { id } => report(sys.center.mark_as_read(&id), "read", &id),
        Command::ReadAll => {
            sys.center.mark_all_as_read();
            println!("✅ All notifications marked read");
        }
        Command::Archive { id } => report(sys.center.archive_notification(&id), "archived", &id),
        Command::Delete { id } => report(sys.center.delete_notification(&id), "deleted", &id),
        Command::Clear { filter } => {
            sys.center.set_filter(filter.clone());
            let removed = sys.center.clear_all();
            println!("🧹 Cleared {removed} notification(s) under '{filter}'");
        }
        Command::Count => {
            let badge = sys.center.badge_label();
            if badge.is_empty() {
                println!("🔔 Unread: 0");
            } else {
                println!("🔔 Unread: {} [{badge}]", sys.center.unread_count());
            }
            for (category, count) in sys.center.category_counts() {
                println!("   {category:<14} {count}");
            }
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(config)?);
            println!("# {} record(s) retained", sys.center.len());
        }
    }
    Ok(())
}

fn report(found: bool, verb: &str, id: &str) {
    if found {
        println!("✅ {id} {verb}");
    } else {
        println!("⚠️  No notification with id '{id}'");
    }
}

fn print_records(records: &[CenterRecord]) {
    if records.is_empty() {
        println!("📭 No notifications to display");
        return;
    }
    let now = chrono::Utc::now();
    for r in records {
        let marker = if r.archived {
            "🗄️"
        } else if r.read {
            "  "
        } else {
            "🔵"
        };
        println!(
            "{marker} [{:<7}] {:<24} {} · {} · {}",
            r.severity,
            r.id,
            r.message,
            r.category,
            r.age_label(now)
        );
    }
}
