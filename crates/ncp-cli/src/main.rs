use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ncp_core::config::{config_path, NcpConfig};
use ncp_core::model::{PASSWORD_ENV, USERNAME_ENV};
use ncp_core::{
    load_persisted_inventory, sync, CommandDispatcher, CommandResult, Credentials, DeviceType,
    InventorySync, JsonFileStore, ParsedValue,
};
use ncp_sot::HttpSourceFactory;
use ncp_ssh::SshConnector;
use serde_json::{json, Value};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ncp")]
#[command(about = "Query network devices and sync their inventory", long_about = None)]
struct Cli {
    /// Log at debug level regardless of configuration
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run `<host> show <args>` against a device
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command_line: Vec<String>,
        /// Skip autodetection and connect as this platform
        #[arg(long)]
        device_type: Option<String>,
        /// Also write the result to this file as JSON
        #[arg(long)]
        save: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Replace the local inventory from a source of truth
    Sync {
        #[arg(long, env = "NCP_SOT_SOURCE", default_value = "netbox")]
        source: String,
        #[arg(long, env = "NCP_SOT_URL")]
        url: String,
        #[arg(long, env = "NCP_SOT_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Inspect the persisted inventory
    Inventory {
        #[command(subcommand)]
        action: InventoryCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum InventoryCommands {
    List {
        #[arg(long)]
        json: bool,
    },
    Path,
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NcpConfig::load().context("Failed to load config")?;
    let level = if cli.debug {
        "debug".to_string()
    } else {
        config.log_level()
    };
    init_logging(&level);

    match cli.command {
        Commands::Exec {
            command_line,
            device_type,
            save,
            json,
        } => {
            let line = command_line.join(" ");
            let result = execute(&config, &line, device_type)?;
            let document = result_document(&line, &result);
            if let Some(path) = save {
                let body = serde_json::to_string_pretty(&document)?;
                fs::write(&path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                let (raw, parsed) = result.display_pair();
                println!("{raw}");
                println!();
                println!("{parsed}");
            }
        }
        Commands::Sync { source, url, token } => {
            let store = JsonFileStore::new(config.inventory_path());
            let syncer = InventorySync::new(HttpSourceFactory::new(config.sot.clone()), store);
            let outcome = sync::validate(&source, &url, &token).and_then(|cfg| syncer.run(&cfg));
            match outcome {
                Ok(report) => {
                    println!("Sync was successful");
                    println!(
                        "{} devices from {} ({} skipped) at {}",
                        report.records_written,
                        report.source.label(),
                        report.skipped,
                        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "inventory sync failed");
                    println!("Sync was not successful");
                    eprintln!("{err}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Inventory { action } => {
            let store = JsonFileStore::new(config.inventory_path());
            match action {
                InventoryCommands::List { json } => {
                    let records = load_persisted_inventory(&store);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    } else if records.is_empty() {
                        println!("No devices in {}", store.path().display());
                    } else {
                        for record in &records {
                            println!(
                                "{:<32} {:<20} {}",
                                record.name, record.primary_ip, record.device_type
                            );
                        }
                    }
                }
                InventoryCommands::Path => println!("{}", store.path().display()),
            }
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                println!("# {}", config_path().display());
                print!("{}", config.to_toml()?);
                println!();
                println!("# effective");
                println!("inventory = {:?}", config.inventory_path().display().to_string());
                println!("log_level = {:?}", config.log_level());
                let credentials = Credentials::from_env();
                println!("username = {:?}", credentials.username);
                let password_source = if std::env::var(PASSWORD_ENV).is_ok() {
                    PASSWORD_ENV
                } else {
                    "default"
                };
                println!("password = \"*** ({password_source})\"");
                if std::env::var(USERNAME_ENV).is_err() {
                    println!("# set {USERNAME_ENV}/{PASSWORD_ENV} to override the lab defaults");
                }
            }
        },
    }

    Ok(())
}

fn execute(config: &NcpConfig, line: &str, device_type: Option<String>) -> Result<CommandResult> {
    let connector =
        SshConnector::new(config.ssh.clone()).context("Failed to load parser templates")?;
    let device_type = device_type
        .or_else(|| config.ssh.device_type.clone())
        .map(DeviceType::new);
    let dispatcher = CommandDispatcher::new(connector.clone(), connector, Credentials::from_env())
        .with_device_type(device_type);
    Ok(dispatcher.execute(line))
}

fn result_document(line: &str, result: &CommandResult) -> Value {
    let parsed = match &result.parsed {
        ParsedValue::Structured(value) => value.clone(),
        other => Value::String(other.display_text()),
    };
    json!({
        "command": line.trim(),
        "raw": result.raw,
        "parsed": parsed,
    })
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_flags_before_command_line() {
        let cli = Cli::try_parse_from([
            "ncp",
            "exec",
            "--device-type",
            "cisco_ios",
            "--json",
            "r1",
            "show",
            "clock",
        ])
        .expect("parse");
        match cli.command {
            Commands::Exec {
                command_line,
                device_type,
                json,
                ..
            } => {
                assert_eq!(command_line, vec!["r1", "show", "clock"]);
                assert_eq!(device_type.as_deref(), Some("cisco_ios"));
                assert!(json);
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn result_document_keeps_structured_output_as_json() {
        let result = CommandResult::new("raw text", ParsedValue::Structured(json!([{"a": "b"}])));
        let document = result_document(" r1 show x ", &result);
        assert_eq!(document["command"], json!("r1 show x"));
        assert_eq!(document["parsed"], json!([{"a": "b"}]));

        let result = CommandResult::new("Could not connect to device.", ParsedValue::NotAvailable);
        assert_eq!(result_document("r1 show x", &result)["parsed"], json!("N/A"));
    }
}
