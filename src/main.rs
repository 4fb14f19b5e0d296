//! mmine CLI
//!
//! Entry point for the `mmine` command-line tool.

use clap::{Parser, Subcommand};
use mmine::config::CONFIG_FILE_NAME;
use mmine::{logging, EffectiveConfig, IntegrationError, JsonProject, NotificationExtensionIntegrator};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "mmine")]
#[command(about = "Notification extension integrator for iOS projects", version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct IntegrationArgs {
    /// Path to the project model file
    #[arg(long, short = 'p')]
    project: PathBuf,

    /// Application code injected into the extension and the info plist
    #[arg(long, short = 'a')]
    application_code: Option<String>,

    /// App group shared by the app and the extension (group.<identifier>)
    #[arg(long, short = 'g')]
    app_group: Option<String>,

    /// Name of the application target
    #[arg(long, short = 't')]
    target: Option<String>,

    /// Cordova packaging mode
    #[arg(long)]
    cordova: bool,

    /// Swift version set on the extension target
    #[arg(long)]
    swift_version: Option<String>,

    /// Path to config file (default: .mmine.toml next to the project)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate the notification extension into a project
    Integrate {
        #[command(flatten)]
        args: IntegrationArgs,

        /// Output the integration report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration with secrets redacted
    Config {
        #[command(flatten)]
        args: IntegrationArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Integrate { args, json } => run_integrate(&args, json),
        Commands::Config { args } => run_config(&args),
    }
}

fn run_integrate(args: &IntegrationArgs, json: bool) {
    match integrate(args) {
        Ok(report) => {
            if json {
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing output: {}", e);
                        process::exit(1);
                    }
                }
            } else {
                println!("{}", report.human_summary);
                for step in &report.steps {
                    match &step.detail {
                        Some(detail) => println!("  {:<28} {:?} ({})", step.step, step.status, detail),
                        None => println!("  {:<28} {:?}", step.step, step.status),
                    }
                }
                println!("Notification extension integration finished successfully");
            }
        }
        Err(e) => fail(&e),
    }
}

fn integrate(args: &IntegrationArgs) -> Result<mmine::IntegrationReport, IntegrationError> {
    let effective = load_config(args)?;
    let config = effective.integration()?;
    let (redacted, _) = effective.redacted();
    tracing::debug!(config = %redacted, "effective configuration");

    let project = JsonProject::open(&config.project)?;
    let mut integrator = NotificationExtensionIntegrator::new(project, config)?;
    integrator.run()
}

fn run_config(args: &IntegrationArgs) {
    let effective = match load_config(args) {
        Ok(effective) => effective,
        Err(e) => fail(&e),
    };
    let (redacted, redactions) = effective.redacted();
    let output = serde_json::json!({
        "created_at": effective.created_at,
        "config": redacted,
        "sources": effective.sources,
        "redactions": redactions,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(args: &IntegrationArgs) -> Result<EffectiveConfig, IntegrationError> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&args.project));
    Ok(EffectiveConfig::build(
        Some(&config_path),
        Some(cli_overrides(args)),
    )?)
}

fn default_config_path(project: &Path) -> PathBuf {
    project
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME)
}

/// Only flags given on the command line override lower layers
fn cli_overrides(args: &IntegrationArgs) -> Value {
    let mut map = Map::new();
    map.insert(
        "project".to_string(),
        Value::String(args.project.to_string_lossy().to_string()),
    );
    let optional = [
        ("application_code", &args.application_code),
        ("app_group", &args.app_group),
        ("main_target", &args.target),
        ("swift_version", &args.swift_version),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            map.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    if args.cordova {
        map.insert("cordova".to_string(), Value::Bool(true));
    }
    Value::Object(map)
}

fn fail(error: &IntegrationError) -> ! {
    eprintln!("Error: {}", error);
    if let Some(hint) = error.remediation() {
        eprintln!("  {}", hint);
    }
    process::exit(error.exit_code());
}
