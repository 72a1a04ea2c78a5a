pub mod date;
pub mod render;
pub mod shutdown;
pub mod watch;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use date::{parse_date, DateStyle};
use render::render_calendar;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    projector::CalendarProjector,
    snapshot::{SnapshotFeed, SourceFeed, UserFeed},
    store::synced::SyncedStore,
    theme::PaletteThemeProvider,
    utils::{
        clock::{Clock, FixedClock, SystemClock},
        dir::create_application_default_path,
        logging::{enable_logging, LogConfig, CLI_PREFIX, WATCH_PREFIX},
    },
};

const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Parser, Debug)]
#[command(name = "usermetrics", version, long_about = None)]
#[command(about = "Calendar of daily per-user metrics", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Log level, for example \"debug\". Falls back to RUST_LOG, then to \"info\""
    )]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Print the calendar of a user once")]
    Show {
        #[command(flatten)]
        calendar: CalendarArgs,
    },
    #[command(about = "Keep printing the calendar as the snapshot changes. Stops on Ctrl-C")]
    Watch {
        #[command(flatten)]
        calendar: CalendarArgs,
        #[arg(long, default_value_t = 5, help = "Seconds between snapshot reloads")]
        interval: u64,
    },
    #[command(about = "List data sources and their records")]
    Sources {
        #[arg(
            long,
            help = "Snapshot file. By default it's snapshot.json in $XDG_STATE_HOME/usermetrics or $HOME/.local/state/usermetrics"
        )]
        snapshot: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct CalendarArgs {
    #[arg(
        long,
        help = "Snapshot file. By default it's snapshot.json in $XDG_STATE_HOME/usermetrics or $HOME/.local/state/usermetrics"
    )]
    snapshot: Option<PathBuf>,
    #[arg(long, env = "USER", default_value = "", help = "User whose calendar is shown")]
    user: String,
    #[arg(
        long,
        default_value_t = 0,
        help = "How many times to advance to the next source of the user"
    )]
    source: usize,
    #[arg(
        long,
        help = "Show the calendar as of this date. Examples are \"yesterday\", \"2 weeks ago\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl CalendarArgs {
    fn clock(&self) -> Result<Box<dyn Clock>> {
        Ok(match &self.date {
            Some(date) => Box::new(FixedClock(parse_date(date, self.date_style)?)),
            None => Box::new(SystemClock),
        })
    }
}

/// Everything a calendar command works with: the snapshot, the two synced stores and the
/// projector that owns the user store.
pub struct CalendarApp {
    pub feed: Arc<SnapshotFeed>,
    pub sources: SyncedStore<SourceFeed>,
    pub projector: CalendarProjector<SyncedStore<UserFeed>>,
}

impl CalendarApp {
    pub fn new(feed: Arc<SnapshotFeed>, clock: Box<dyn Clock>, username: &str, source: usize) -> Self {
        let sources = SyncedStore::new(SourceFeed(feed.clone()));
        let users = SyncedStore::new(UserFeed(feed.clone()));
        let mut projector =
            CalendarProjector::new(clock, users, Box::new(PaletteThemeProvider::default()));
        projector.set_username(username);
        for _ in 0..source {
            projector.advance_source();
        }
        projector.refresh();
        Self {
            feed,
            sources,
            projector,
        }
    }

    /// Applies pending changes of the snapshot and recomputes the calendar.
    pub fn sync(&mut self) {
        let applied = self.sources.pump() + self.projector.store_mut().pump();
        if applied > 0 {
            info!("Applied {applied} snapshot changes");
        }
        self.projector.refresh();
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let application_path = create_application_default_path()?;
    let prefix = match args.commands {
        Commands::Watch { .. } => WATCH_PREFIX,
        _ => CLI_PREFIX,
    };
    let log_config = LogConfig {
        prefix,
        level: args.log_filter,
        console: args.log,
    };
    enable_logging(&log_config, &application_path)?;

    let snapshot_path = |snapshot: Option<PathBuf>| {
        snapshot.unwrap_or_else(|| application_path.join(SNAPSHOT_FILE))
    };

    match args.commands {
        Commands::Show { calendar } => {
            let feed = SnapshotFeed::open(snapshot_path(calendar.snapshot.clone())).await?;
            let app = CalendarApp::new(feed, calendar.clock()?, &calendar.user, calendar.source);
            print!("{}", render_calendar(&app.projector)?);
            Ok(())
        }
        Commands::Watch { calendar, interval } => {
            let feed = SnapshotFeed::open(snapshot_path(calendar.snapshot.clone())).await?;
            let app = CalendarApp::new(feed, calendar.clock()?, &calendar.user, calendar.source);
            let ticker = calendar.clock()?;
            let shutdown_token = CancellationToken::new();
            let (_, result) = tokio::join!(
                shutdown::detect_shutdown(shutdown_token.clone()),
                watch::watch(app, ticker, Duration::from_secs(interval), shutdown_token.clone()),
            );
            result
        }
        Commands::Sources { snapshot } => {
            let feed = SnapshotFeed::open(snapshot_path(snapshot)).await?;
            print!("{}", list_sources(&feed)?);
            Ok(())
        }
    }
}

/// One line per source with its template, followed by the records that belong to it.
fn list_sources(feed: &Arc<SnapshotFeed>) -> Result<String> {
    let sources = SyncedStore::new(SourceFeed(feed.clone()));
    let records = feed.records()?;
    let mut out = String::new();
    for (source_id, record) in sources.iter() {
        out.push_str(&format!("{source_id}\t{}\n", record.template));
        for id in records.get(source_id).into_iter().flatten() {
            out.push_str(&format!("\t{id}\n"));
        }
    }
    Ok(out)
}
