mod blocking;
mod desktop;
mod store;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crewboard_calendar::{export_ics, import_ics, write_ics_file};
use crewboard_config::{AppConfig, ConfigManager};
use crewboard_core::ReminderId;
use crewboard_reminders::{
    snooze_reminder, CheckSummary, Permission, ReminderEngine, SnoozeDirective, SnoozeZone,
};
use desktop::{CommandSoundPlayer, DesktopNotifier};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use store::JsonReminderStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const APP_NAME: &str = "Crewboard";

#[derive(Parser, Debug)]
#[command(name = "crewboard", version, about = "Crewboard reminder notifications")]
struct Cli {
    /// Keep config and data under this directory instead of the platform defaults
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the reminder store and raise desktop notifications until Ctrl-C
    Watch,

    /// Run a single reminder check and print what was dispatched
    Check,

    /// Export all reminders as an iCalendar file
    Export {
        /// Output path (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import reminders from an iCalendar file, replacing ones with the same id
    Import {
        path: PathBuf,
    },

    /// Snooze a reminder
    Snooze {
        id: String,

        #[command(flatten)]
        until: SnoozeArgs,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SnoozeArgs {
    /// Snooze for this many minutes
    #[arg(long)]
    minutes: Option<u32>,

    /// Snooze until 09:00 tomorrow
    #[arg(long)]
    tomorrow: bool,

    /// Snooze until 09:00 next Monday
    #[arg(long)]
    next_monday: bool,

    /// Raw snooze code as sent by the web client (minutes, -1 or -2)
    #[arg(long, allow_negative_numbers = true)]
    code: Option<i64>,
}

impl SnoozeArgs {
    fn directive(&self) -> Result<SnoozeDirective> {
        if let Some(minutes) = self.minutes {
            return SnoozeDirective::from_code(i64::from(minutes)).map_err(Into::into);
        }
        if self.tomorrow {
            return Ok(SnoozeDirective::TomorrowMorning);
        }
        if self.next_monday {
            return Ok(SnoozeDirective::NextMondayMorning);
        }
        match self.code {
            Some(code) => SnoozeDirective::from_code(code).map_err(Into::into),
            None => bail!("no snooze target given"),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

struct AppState {
    manager: ConfigManager,
    config: AppConfig,
    store: Arc<JsonReminderStore>,
}

fn open_state(home: Option<PathBuf>) -> Result<AppState> {
    let manager = match home {
        Some(root) => ConfigManager::with_root(root),
        None => ConfigManager::new(),
    }
    .context("initialize config manager")?;
    let config = manager.load().context("load app config")?;
    let store = Arc::new(JsonReminderStore::new(manager.reminders_path(&config)));
    Ok(AppState {
        manager,
        config,
        store,
    })
}

fn build_engine(state: &AppState) -> Result<Arc<ReminderEngine>> {
    let notifications = &state.config.notifications;
    let engine = ReminderEngine::new(
        notifications,
        state.store.clone(),
        Arc::new(DesktopNotifier::new(APP_NAME)),
        state.store.clone(),
    )
    .context("create reminder engine")?
    .with_sound_player(Arc::new(CommandSoundPlayer::new(
        state.manager.sounds_dir(),
        notifications.sounds.clone(),
    )));
    Ok(Arc::new(engine))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let state = open_state(cli.home)?;

    match cli.command {
        Command::Watch => watch(&state).await?,
        Command::Check => check(&state).await?,
        Command::Export { output } => export(&state, output)?,
        Command::Import { path } => import(&state, path)?,
        Command::Snooze { id, until } => snooze(&state, ReminderId::new(id), until.directive()?)?,
    }

    Ok(())
}

async fn watch(state: &AppState) -> Result<()> {
    let engine = build_engine(state)?;
    let handle = engine.start().context("start reminder polling")?;
    tracing::info!(store = %state.store.path().display(), "watching reminders; Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("listen for Ctrl-C")?;
    handle.shutdown().await;
    Ok(())
}

async fn check(state: &AppState) -> Result<()> {
    let engine = build_engine(state)?;
    if engine.permission() != Permission::Granted && !engine.request_permission().await {
        bail!("desktop notifications are not available");
    }
    let summary = engine.check_reminders().await;
    println!("{}", describe_check(&summary));
    Ok(())
}

fn describe_check(summary: &CheckSummary) -> String {
    format!(
        "evaluated {} reminder alerts: {} dispatched, {} failed",
        summary.evaluated, summary.dispatched, summary.failed
    )
}

fn export(state: &AppState, output: Option<PathBuf>) -> Result<()> {
    let reminders = state.store.load()?;
    let stamp = Utc::now();
    match output {
        Some(path) => write_ics_file(&path, &reminders, stamp)
            .with_context(|| format!("write {}", path.display()))?,
        None => print!("{}", export_ics(&reminders, stamp).context("export reminders")?),
    }
    Ok(())
}

fn import(state: &AppState, path: PathBuf) -> Result<()> {
    let payload =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let reminders = import_ics(&payload).context("parse calendar")?;
    let total = reminders.len();
    let added = state.store.merge(reminders)?;
    println!("imported {total} reminders ({added} new)");
    Ok(())
}

fn snooze(state: &AppState, id: ReminderId, directive: SnoozeDirective) -> Result<()> {
    let zone = SnoozeZone::from(state.config.notifications.timezone()?);
    let mut persisted = Ok(false);
    let until = snooze_reminder(&id, directive, Utc::now(), &zone, |id, until| {
        persisted = state.store.set_snoozed_until(id, until);
    })?;

    if !persisted? {
        bail!("no reminder with id {id}");
    }
    println!("{id} snoozed until {}", until.to_rfc3339());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("crewboard").chain(args.iter().copied()))
    }

    fn snooze_directive(args: &[&str]) -> SnoozeDirective {
        match parse(args).expect("parses").command {
            Command::Snooze { until, .. } => until.directive().expect("directive"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn snooze_flags_resolve_to_directives() {
        assert_eq!(
            snooze_directive(&["snooze", "r1", "--minutes", "15"]),
            SnoozeDirective::Minutes(15)
        );
        assert_eq!(
            snooze_directive(&["snooze", "r1", "--tomorrow"]),
            SnoozeDirective::TomorrowMorning
        );
        assert_eq!(
            snooze_directive(&["snooze", "r1", "--next-monday"]),
            SnoozeDirective::NextMondayMorning
        );
        assert_eq!(
            snooze_directive(&["snooze", "r1", "--code", "-2"]),
            SnoozeDirective::NextMondayMorning
        );
    }

    #[test]
    fn snooze_needs_exactly_one_target() {
        assert!(parse(&["snooze", "r1"]).is_err());
        assert!(parse(&["snooze", "r1", "--tomorrow", "--minutes", "5"]).is_err());
    }

    #[test]
    fn invalid_codes_are_rejected() {
        let cli = parse(&["snooze", "r1", "--code", "-7"]).expect("parses");
        let Command::Snooze { until, .. } = cli.command else {
            panic!("expected snooze");
        };
        assert!(until.directive().is_err());
        assert!(SnoozeArgs {
            minutes: Some(0),
            tomorrow: false,
            next_monday: false,
            code: None,
        }
        .directive()
        .is_err());
    }

    #[test]
    fn check_output_counts_alerts() {
        let summary = CheckSummary {
            evaluated: 3,
            dispatched: 1,
            awaiting_permission: 0,
            failed: 1,
        };
        assert_eq!(
            describe_check(&summary),
            "evaluated 3 reminder alerts: 1 dispatched, 1 failed"
        );
    }

    #[test]
    fn home_is_global() {
        let cli = parse(&["export", "--home", "/tmp/crewboard"]).expect("parses");
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/crewboard")));
    }
}
