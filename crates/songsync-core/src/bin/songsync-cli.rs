use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use songsync_core::{
    AppConfig, Dialect, MemorySession, SyncEngine,
    diagnostics::init_tracing_with_config,
    fixtures::demo_song,
    persistence::{load_song, save_json},
};

#[derive(Debug, Parser)]
#[command(name = "songsync-cli")]
#[command(about = "Apply declarative song descriptions to a DAW session")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Config file; defaults to songsync.config.toml discovery.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full pipeline against the in-process session.
    Sync {
        song: PathBuf,

        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "hybrid")]
        dialect: DialectArg,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Sync, then list the devices on the named track.
    Inspect {
        song: PathBuf,

        #[arg(long)]
        track: String,
    },
    /// Write the built-in demo song.
    Demo {
        #[arg(long, default_value = "data/demo.song.json")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DialectArg {
    Creator,
    Generic,
    Hybrid,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Creator => Self::CreatorStyle,
            DialectArg::Generic => Self::Generic,
            DialectArg::Hybrid => Self::Hybrid,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    let _telemetry = init_tracing_with_config(&cli.log_dir, &config.diagnostics)?;

    match cli.command {
        Commands::Sync {
            song,
            snapshot,
            dialect,
            seed,
        } => {
            if seed.is_some() {
                config.harmony.seed = seed;
            }
            let mut engine = SyncEngine::new(MemorySession::new(dialect.into()), config);
            let report = engine
                .run(&load_song(&song)?)
                .with_context(|| format!("sync failed for {}", song.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(path) = snapshot {
                save_json(&path, &engine.adapter().binding().snapshot())?;
                tracing::info!(path = %path.display(), "session snapshot written");
            }
        }
        Commands::Inspect { song, track } => inspect(&song, &track, config)?,
        Commands::Demo { output } => {
            save_json(&output, &demo_song())?;
            tracing::info!(path = %output.display(), "demo song written");
        }
    }

    Ok(())
}

fn inspect(song: &Path, track: &str, config: AppConfig) -> anyhow::Result<()> {
    let mut engine = SyncEngine::new(MemorySession::default(), config);
    engine
        .run(&load_song(song)?)
        .with_context(|| format!("sync failed for {}", song.display()))?;

    let Some(instruments) = engine.inspect(track)? else {
        bail!("no track named \"{track}\"");
    };
    println!("{}", serde_json::to_string_pretty(&instruments)?);
    Ok(())
}
