//! dbmaintain CLI - versioned SQL script maintenance.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dbmaintain::{
    Config, DbMaintainer, ExecutionPlan, MaintainError, ResetReport, UpdateOptions, UpdateReport,
};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "dbmaintain")]
#[command(about = "Keep a database schema in step with versioned SQL scripts")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "dbmaintain.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute new and changed scripts
    Update {
        /// Plan and parse every script without executing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip conflicting scripts instead of aborting
        #[arg(long)]
        force: bool,
    },

    /// Show what an update would do
    Status,

    /// Register all scripts as executed without running them
    MarkUpToDate,

    /// Drop all database objects except preserved ones
    Clear,

    /// Delete all table rows except preserved ones
    Clean,

    /// Disable foreign key, check and not-null constraints
    DisableConstraints,

    /// Mark failed scripts as successfully executed
    MarkErrorScriptsSuccessful,

    /// Remove failed scripts from the registry so they run again
    RemoveErrorScripts,

    /// Check the configuration file without connecting
    ValidateConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MaintainError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MaintainError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Commands::ValidateConfig = cli.command {
        if cli.output_json {
            print_json(&serde_json::json!({ "valid": true, "hash": config.hash() }))?;
        } else {
            println!("Configuration is valid");
            println!("  Dialect: {}", config.database.dialect);
            println!("  Schemas: {}", config.database.schemas.join(", "));
            println!("  Hash: {}", config.hash());
        }
        return Ok(());
    }

    // Script locations are relative to the configuration file
    let base_dir = cli.config.parent().unwrap_or(Path::new("."));
    let maintainer = DbMaintainer::connect(config, base_dir).await?;

    match cli.command {
        Commands::ValidateConfig => unreachable!(), // Handled above
        Commands::Update { dry_run, force } => {
            let report = maintainer
                .update_database(UpdateOptions { dry_run, force })
                .await?;
            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_update(&report);
            }
        }
        Commands::Status => {
            let plan = maintainer.plan().await?;
            if cli.output_json {
                print_json(&plan)?;
            } else {
                print_plan(&plan);
            }
        }
        Commands::MarkUpToDate => {
            let count = maintainer.mark_database_as_up_to_date().await?;
            print_count(cli.output_json, "marked", count, "script(s) marked as executed")?;
        }
        Commands::Clear => {
            let report = maintainer.clear_database().await?;
            print_reset(cli.output_json, "Cleared", "dropped", &report)?;
        }
        Commands::Clean => {
            let report = maintainer.clean_database().await?;
            print_reset(cli.output_json, "Cleaned", "emptied", &report)?;
        }
        Commands::DisableConstraints => {
            let report = maintainer.disable_constraints().await?;
            print_reset(cli.output_json, "Disabled constraints in", "affected", &report)?;
        }
        Commands::MarkErrorScriptsSuccessful => {
            let count = maintainer.mark_error_scripts_as_successful().await?;
            print_count(cli.output_json, "marked", count, "failed script(s) marked as successful")?;
        }
        Commands::RemoveErrorScripts => {
            let count = maintainer.remove_error_scripts().await?;
            print_count(cli.output_json, "removed", count, "failed script record(s) removed")?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), MaintainError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_count(json: bool, key: &str, count: usize, message: &str) -> Result<(), MaintainError> {
    if json {
        let mut result = serde_json::Map::new();
        result.insert(key.to_string(), count.into());
        print_json(&result)
    } else {
        println!("{} {}", count, message);
        Ok(())
    }
}

fn print_update(report: &UpdateReport) {
    let status_msg = if report.dry_run {
        "Dry run completed!"
    } else {
        "Update completed!"
    };
    println!("\n{}", status_msg);
    if report.rebuilt_from_scratch {
        println!("  Rebuilt from scratch");
    }
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!("  Scripts: {} executed, {} skipped", report.scripts.len(), report.skipped);
    for script in &report.scripts {
        println!(
            "    {} ({}, {} statements)",
            script.file_name, script.reason, script.statements
        );
    }
    if !report.forced_conflicts.is_empty() {
        println!("  Forced past conflicts: {:?}", report.forced_conflicts);
    }
    if !report.orphans.is_empty() {
        println!("  No longer in repository: {:?}", report.orphans);
    }
}

fn print_plan(plan: &ExecutionPlan) {
    if plan.is_up_to_date() {
        println!("Database is up to date");
    }
    for entry in &plan.entries {
        println!(
            "{:<8} {} ({})",
            entry.action.to_string(),
            entry.script.file_name,
            entry.reason
        );
    }
    for orphan in &plan.orphans {
        println!("{:<8} {} (no longer in repository)", "ORPHAN", orphan.file_name);
    }
}

fn print_reset(
    json: bool,
    verb: &str,
    items_label: &str,
    report: &ResetReport,
) -> Result<(), MaintainError> {
    if json {
        return print_json(report);
    }
    println!("{} schema(s): {}", verb, report.schemas.join(", "));
    println!("  Constraints disabled: {}", report.constraints_disabled);
    if !report.items.is_empty() {
        println!("  Objects {}: {}", items_label, report.items.len());
        for item in &report.items {
            println!("    {}", item);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
