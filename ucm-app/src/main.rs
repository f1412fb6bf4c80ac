//! Headless runner for the Circle Task.
//!
//! Drives a complete session with a simulated participant, either in real
//! time or as fast as the machine allows, then exports the collected data.

mod app;
mod participant;

use anyhow::{Context, Result};
use app::{App, SessionOutcome, log_timing};
use clap::{Args, Parser, Subcommand};
use participant::SimulatedParticipant;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ucm_core::config::{self, Settings};
use ucm_core::{AppContext, DeviceInfo};
use ucm_data::UserProfile;
use ucm_export::LocalStore;
use ucm_timing::{ManualScheduler, RealtimeScheduler, Timer};

#[derive(Parser, Debug)]
#[command(name = "ucm")]
#[command(about = "Circle Task data collection")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Settings file; defaults to the user config directory
    #[arg(short, long, global = true, env = "UCM_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for locally stored data
    #[arg(long, global = true, env = "UCM_STORAGE")]
    storage: Option<PathBuf>,

    /// Log filter, e.g. "info" or "ucm=debug"
    #[arg(long, global = true, default_value = "info", env = "UCM_LOG")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one session with a simulated participant
    Run(RunArgs),
    /// Delete all locally stored data of a user
    Forget {
        /// User identifier; defaults to the configured user
        user: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Seed for block planning and the simulated participant
    #[arg(long)]
    seed: Option<u64>,

    /// Skip waiting between events
    #[arg(long)]
    fast: bool,

    /// Probability per block that one slider is ignored
    #[arg(long, default_value_t = 0.0)]
    neglect: f64,

    /// Interrupt the session after this many seconds
    #[arg(long)]
    interrupt_after: Option<f64>,

    /// Hardware identifier the device id is derived from
    #[arg(long, default_value = "unknown", env = "UCM_DEVICE_UID")]
    device_uid: String,

    #[arg(long, default_value = "")]
    age_group: String,

    #[arg(long, default_value = "")]
    gender: String,

    /// Gaming experience 1-5; negative if not answered
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    gaming_exp: i32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.common.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = load_settings(&cli.common)?;
    match cli.command {
        Command::Run(args) => run(settings, args),
        Command::Forget { user } => {
            let user = user.unwrap_or_else(|| settings.current_user.clone());
            let store = LocalStore::new(settings.data_collection.storage_root());
            let removed = store
                .remove_user_data(&user)
                .with_context(|| format!("Failed to remove data of {user}"))?;
            info!(%user, removed, "local data removed");
            Ok(())
        }
    }
}

fn load_settings(args: &CommonArgs) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => config::load_required(path)?,
        None => match dirs::config_dir() {
            Some(dir) => Settings::load(&dir.join("ucm").join("settings.toml"))?,
            None => Settings::default(),
        },
    };
    if let Some(storage) = &args.storage {
        settings.data_collection.storage_root = Some(storage.clone());
    }
    Ok(settings)
}

fn run(settings: Settings, args: RunArgs) -> Result<()> {
    let trial_duration = settings.circle_task.trial_duration;
    let outbox = settings.data_collection.storage_root().join("outbox");
    let device = DeviceInfo {
        uid: args.device_uid.clone(),
        ..DeviceInfo::default()
    };
    let ctx = AppContext::new(settings, device);

    let (task_rng, participant_rng) = match args.seed {
        Some(seed) => (
            StdRng::seed_from_u64(seed),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        ),
        None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
    };
    let participant = SimulatedParticipant::new(participant_rng, trial_duration, args.neglect);
    let mut app = App::new(ctx, task_rng, participant).interrupt_after(args.interrupt_after);

    let profile = UserProfile {
        age_group: args.age_group,
        gender: args.gender,
        gaming_exp: args.gaming_exp,
    };
    let outcome = if args.fast {
        let mut sched = ManualScheduler::new();
        app.run_session(&profile, &mut sched)?
    } else {
        let mut sched = RealtimeScheduler::new();
        let outcome = app.run_session(&profile, &mut sched)?;
        log_timing(&sched.timer().stats());
        outcome
    };

    if let SessionOutcome::Interrupted { discarded } = outcome {
        info!(discarded, "session interrupted, nothing exported");
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let report = runtime.block_on(app.export(outbox))?;
    if report.any_failed() {
        anyhow::bail!("export failed on at least one channel");
    }
    Ok(())
}
