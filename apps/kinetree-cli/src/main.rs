mod config;
mod scene;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kinetree_kernel::{BoundsPolicy, LockPolicy, World, WorldConfig};
use kinetree_persist::{CommitRecord, WorldStore};
use kinetree_tools::WorldInspector;
use kinetree_viz::{DebugTextRenderer, RenderView, Renderer, SnapshotFollower};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kinetree-cli", about = "CLI tool for kinematic world operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// World config file (.yaml, .yml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Clamp out-of-limit state writes instead of rejecting them
    #[arg(long)]
    clamp: bool,

    /// Fail instead of waiting when another writer holds the world
    #[arg(long)]
    fail_fast: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, the demo world summary and its kinematic tree
    Info,
    /// Open the dresser drawer and show how the scene moves
    Drawer {
        /// Drawer slide position in metres
        #[arg(short, long, default_value = "0.2")]
        position: f64,
    },
    /// Insert a new root above the scene through a free connection
    RootSwap {
        #[arg(long, default_value = "0.0")]
        x: f64,
        #[arg(long, default_value = "0.0")]
        y: f64,
        #[arg(long, default_value = "0.0")]
        z: f64,
        /// Rotation about the vertical axis in radians
        #[arg(long, default_value = "0.0")]
        yaw: f64,
    },
    /// Save the demo world with the drawer at a position
    Save {
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(short, long, default_value = "0.2")]
        position: f64,
    },
    /// Load, verify and print a saved world
    Load {
        #[arg(short, long)]
        dir: PathBuf,
    },
}

fn world_config(cli: &Cli) -> anyhow::Result<WorldConfig> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => WorldConfig::default(),
    };
    if cli.clamp {
        config.bounds_policy = BoundsPolicy::Clamp;
    }
    if cli.fail_fast {
        config.lock_policy = LockPolicy::FailFast;
    }
    Ok(config)
}

fn demo_world(config: WorldConfig) -> anyhow::Result<World> {
    let model = scene::dresser_model().context("building dresser scene")?;
    Ok(World::from_model(model, config)?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = world_config(&cli)?;
    tracing::debug!(?config, "world config");
    let renderer = DebugTextRenderer::new();
    let view = RenderView::default();

    match cli.command {
        Commands::Info => {
            println!("kinetree-cli v{}", env!("CARGO_PKG_VERSION"));
            let world = demo_world(config)?;
            let snapshot = world.snapshot();
            println!("{}", WorldInspector::summary(&snapshot));
            print!("{}", WorldInspector::tree(&snapshot)?);
        }
        Commands::Drawer { position } => {
            let world = demo_world(config)?;
            let mut follower = SnapshotFollower::attach(&world);
            print!("{}", follower.render(&renderer, &view));

            let stored = world.modify(|tx| tx.set_position(&scene::drawer_slide(), position))?;
            println!(
                "Drawer slide: requested={position:.3} stored={:.3} (version {})",
                stored.position,
                world.version()
            );
            print!("{}", follower.render(&renderer, &view));
            let handle = scene::handle_body(follower.latest())?;
            println!("{}", WorldInspector::inspect_body(follower.latest(), &handle)?);
        }
        Commands::RootSwap { x, y, z, yaw } => {
            let world = demo_world(config)?;
            let connection = scene::swap_root(&world, [x, y, z], yaw)?;
            println!("New root connection: {connection}");
            let snapshot = world.snapshot();
            print!("{}", WorldInspector::tree(&snapshot)?);
            print!("{}", renderer.render(&snapshot, &view));
        }
        Commands::Save { dir, position } => {
            let world = demo_world(config)?;
            let commits = world.subscribe();
            let mut store = WorldStore::open(&dir)
                .with_context(|| format!("opening store {}", dir.display()))?;
            store.snapshot_world(&world)?;

            world.modify(|tx| tx.set_position(&scene::drawer_slide(), position).map(|_| ()))?;
            let records: Vec<CommitRecord> =
                commits.try_iter().map(|n| CommitRecord::from(&n)).collect();
            store.append_commits(&records)?;
            store.verify_integrity()?;
            println!(
                "Saved world {} at version {} to {} ({} snapshot(s), {} log segment(s))",
                world.id(),
                world.version(),
                dir.display(),
                store.meta().snapshot_count,
                store.meta().event_segment_count
            );
        }
        Commands::Load { dir } => {
            let store = WorldStore::open(&dir)
                .with_context(|| format!("opening store {}", dir.display()))?;
            store.verify_integrity()?;
            let (version, model) = store.load_latest()?;
            println!("Loaded version {version} from {}", dir.display());
            let world = World::from_model(model, config)?;
            let snapshot = world.snapshot();
            println!("{}", WorldInspector::summary(&snapshot));
            print!("{}", renderer.render(&snapshot, &view));
        }
    }

    Ok(())
}
