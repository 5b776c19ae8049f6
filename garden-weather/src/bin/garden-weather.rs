// garden-weather: inspect, back up and recover a garden's weather context
//
// Commands:
//   garden-weather status
//   garden-weather show
//   garden-weather snapshot
//   garden-weather backup [--shadow-only]
//   garden-weather recover [--force]
//   garden-weather verify [PATH]
//   garden-weather backups
//   garden-weather restore-shadow
//   garden-weather restore <NAME>

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use garden_weather::{
    ContextStore, GardenPaths, GitCli, RecoveryResult, ResilienceConfig, ResilienceManager,
};

#[derive(Parser)]
#[command(name = "garden-weather")]
#[command(about = "Durable weather context with shadow copies, backups and disaster recovery")]
struct Cli {
    /// Garden root (defaults to the nearest ancestor containing .garden or .git)
    #[arg(long, global = true, env = "GARDEN_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show what the garden has to recover from
    Status,
    /// Print the context document, creating a default one if needed
    Show,
    /// Rotate shadow copies and write a timestamped backup
    Snapshot,
    /// Create shadow copies and a full backup set
    Backup {
        /// Only create shadow copies
        #[arg(long)]
        shadow_only: bool,
    },
    /// Run the recovery strategies when the context is missing or corrupt
    Recover {
        /// Recover even if the current context verifies
        #[arg(long)]
        force: bool,
    },
    /// Verify a context document (defaults to the canonical file)
    Verify { path: Option<PathBuf> },
    /// List timestamped and full backups
    Backups,
    /// Restore the canonical file from the live shadow copy
    RestoreShadow,
    /// Restore the canonical file from a timestamped backup
    Restore { name: String },
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("garden_weather=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_root(explicit: Option<PathBuf>) -> Result<GardenPaths> {
    if let Some(root) = explicit {
        return Ok(GardenPaths::new(root));
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    GardenPaths::discover(&cwd).ok_or_else(|| {
        anyhow!(
            "No garden found from {} (looked for .garden or .git); pass --root",
            cwd.display()
        )
    })
}

fn run(cli: Cli) -> Result<i32> {
    let paths = resolve_root(cli.root)?;
    let config = ResilienceConfig::load(&paths).context("Failed to load resilience config")?;

    if let Err(e) = ContextStore::new(paths.clone()).cleanup_stale_temps() {
        tracing::warn!(error = %e, "stale temp cleanup failed");
    }

    let manager = ResilienceManager::new(
        paths.clone(),
        config,
        Box::new(GitCli::new(paths.root())),
    );

    match cli.command {
        Command::Status => print_status(&manager)?,
        Command::Show => {
            let context = manager.store().load().context("Failed to load context")?;
            println!("{}", serde_json::to_string_pretty(&context)?);
        }
        Command::Snapshot => {
            manager
                .shadows()
                .snapshot()
                .context("Failed to create shadow copies")?;
            println!("Shadow copies updated");
        }
        Command::Backup { shadow_only } => {
            if let Err(e) = manager.create_shadow_copy() {
                eprintln!("Warning: failed to create shadow copies: {}", e);
            }
            if !shadow_only {
                let dir = manager.create_backup().context("Failed to create backup")?;
                println!("Backup created at {}", dir.display());
            }
        }
        Command::Recover { force } => return recover(&manager, force),
        Command::Verify { path } => {
            let path = path.unwrap_or_else(|| paths.context_file());
            let context = manager.shadows().verify_integrity(&path)?;
            println!(
                "{} is valid (version {}, updated {})",
                path.display(),
                context.version,
                context.updated.to_rfc3339()
            );
        }
        Command::Backups => {
            let backups = manager.shadows().list_backups()?;
            let full = manager.list_full_backups()?;
            println!("Timestamped backups ({}):", backups.len());
            for name in backups {
                println!("  {}", name);
            }
            println!("Full backups ({}):", full.len());
            for name in full {
                println!("  {}", name);
            }
        }
        Command::RestoreShadow => {
            manager
                .shadows()
                .restore_from_shadow()
                .context("Failed to restore from shadow copy")?;
            println!("Restored context from shadow copy");
        }
        Command::Restore { name } => {
            manager
                .shadows()
                .restore_from_backup(&name)
                .with_context(|| format!("Failed to restore backup {}", name))?;
            println!("Restored context from {}", name);
        }
    }

    Ok(0)
}

fn recover(manager: &ResilienceManager, force: bool) -> Result<i32> {
    let status = manager.status()?;
    if status.context_healthy() && !force {
        println!("Context verifies; nothing to recover (use --force to recover anyway)");
        return Ok(0);
    }

    let result = manager
        .recover_from_disaster()
        .context("Failed to run recovery")?;
    print_recovery(&result);

    Ok(if result.success { 0 } else { 2 })
}

fn print_recovery(result: &RecoveryResult) {
    for attempt in &result.attempts {
        let mark = if attempt.success { "ok" } else { "failed" };
        let detail = attempt
            .message
            .as_deref()
            .or(attempt.error.as_deref())
            .unwrap_or("");
        println!("  [{}] {}: {}", mark, attempt.strategy, detail);
    }
    match result.recovered_by() {
        Some(strategy) => println!("Recovered using {}", strategy),
        None => println!("All recovery strategies failed"),
    }
}

fn print_status(manager: &ResilienceManager) -> Result<()> {
    let status = manager.status()?;

    let context = match (status.context_exists, status.context_error.as_deref()) {
        (false, _) => "missing".to_string(),
        (true, None) => "ok".to_string(),
        (true, Some(reason)) => format!("invalid ({})", reason),
    };
    println!("Garden:        {}", manager.paths().root().display());
    println!("Context:       {}", context);
    println!(
        "weather.md:    {}",
        if status.companion_exists { "present" } else { "missing" }
    );
    println!(
        "Shadow copies: {} ({})",
        status.shadows.len(),
        if status.shadow_copies_enabled { "enabled" } else { "disabled" }
    );
    println!(
        "Backups:       {} timestamped, {} full",
        status.backups.len(),
        status.full_backups.len()
    );
    println!("Recovery:      {}", status.recovery_strategies.join(" -> "));
    Ok(())
}
