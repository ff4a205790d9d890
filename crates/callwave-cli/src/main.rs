//! Callwave CLI - Batch dispatch and monitoring
//!
//! Thin client over the Callwave API: create batches, start and stop them,
//! follow progress and pull transcripts.

mod api;
mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use dialoguer::{Confirm, Input, Password};
use std::fs;
use uuid::Uuid;

use api::{CallEntryRequest, CallResponse, CallwaveClient, CreateBatchRequest};
use config::Config;

#[derive(Parser)]
#[command(name = "callwave")]
#[command(about = "Callwave CLI - Outbound call batches", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Login and store API key
    Login {
        /// API key (will prompt if not provided)
        #[arg(short, long)]
        key: Option<String>,
        /// Server URL to store alongside the key
        #[arg(long)]
        url: Option<String>,
    },

    /// Batch operations
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },

    /// Call operations
    Call {
        #[command(subcommand)]
        action: CallAction,
    },

    /// Run one stuck-call sweep now
    Sweep,

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum BatchAction {
    /// Create a batch of calls
    Create {
        /// Batch name
        name: String,
        /// Phone numbers (repeatable)
        #[arg(long = "phone")]
        phones: Vec<String>,
        /// File with one `phone[,reg_no]` per line
        #[arg(short, long)]
        file: Option<String>,
        /// Message spoken on every call
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List batches, newest first
    List,
    /// Show a batch and its calls
    Show {
        id: Uuid,
    },
    /// Start placing the batch's calls
    Dispatch {
        id: Uuid,
        /// Follow progress until the batch completes
        #[arg(short, long)]
        watch: bool,
    },
    /// Emergency stop: cancel every unfinished call
    Stop {
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Follow progress until the batch completes
    Watch {
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum CallAction {
    /// Show a call
    Show {
        id: Uuid,
    },
    /// Pull the transcript from the provider
    Transcript {
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login { key, url } => cmd_login(key, url).await,
        Commands::Batch { action } => cmd_batch(action).await,
        Commands::Call { action } => cmd_call(action).await,
        Commands::Sweep => cmd_sweep().await,
        Commands::Config => cmd_config(),
    }
}

fn client(config: &Config) -> CallwaveClient {
    CallwaveClient::new(&config.base_url, config.api_key_or_empty())
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_login(key: Option<String>, url: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    if let Some(url) = url {
        config.set_base_url(&url);
    }

    let api_key = match key {
        Some(k) => k,
        None => Password::new()
            .with_prompt("API Key")
            .interact()
            .context("Failed to read API key")?,
    };

    let client = CallwaveClient::new(&config.base_url, &api_key);
    print!("Testing connection to {}... ", config.base_url);

    match client.health().await {
        Ok(true) => println!("{}", "OK".green()),
        _ => {
            println!("{}", "Failed".red());
            bail!("Could not connect to Callwave API at {}", config.base_url);
        }
    }

    config.set_api_key(api_key);
    config.save()?;

    println!("{} API key saved to {:?}", "✓".green(), Config::config_path()?);

    Ok(())
}

async fn cmd_batch(action: BatchAction) -> Result<()> {
    let config = Config::load()?;
    let client = client(&config);

    match action {
        BatchAction::Create {
            name,
            phones,
            file,
            message,
        } => {
            let mut calls: Vec<CallEntryRequest> = phones
                .into_iter()
                .map(|phone_number| CallEntryRequest {
                    phone_number,
                    reg_no: None,
                })
                .collect();

            if let Some(f) = file {
                let content = fs::read_to_string(&f)
                    .with_context(|| format!("Failed to read file: {}", f))?;
                calls.extend(parse_call_lines(&content));
            }

            if calls.is_empty() {
                let phone: String = Input::new()
                    .with_prompt("Phone number")
                    .interact_text()
                    .context("Failed to read input")?;
                calls.push(CallEntryRequest {
                    phone_number: phone,
                    reg_no: None,
                });
            }

            let batch = client
                .create_batch(&CreateBatchRequest {
                    name,
                    message,
                    calls,
                })
                .await?;

            println!(
                "{} Batch {} created with {} calls",
                "✓".green(),
                batch.name.cyan(),
                batch.total_calls
            );
            println!("  {}", batch.id.to_string().dimmed());
            println!("\n{}", "Start it with:".dimmed());
            println!("  callwave batch dispatch {} --watch", batch.id);
        }

        BatchAction::List => {
            let batches = client.list_batches().await?;

            if batches.is_empty() {
                println!("No batches found.");
                return Ok(());
            }

            println!("{}", "Batches:".bold());
            for batch in batches {
                println!(
                    "  {} {} [{}] {}/{} ok, {} failed  {}",
                    batch.id.to_string().dimmed(),
                    batch.name.cyan().bold(),
                    status_colored(&batch.status),
                    batch.successful_calls,
                    batch.total_calls,
                    batch.failed_calls,
                    batch.created_at.dimmed()
                );
            }
        }

        BatchAction::Show { id } => {
            let detail = client.get_batch(id).await?;
            let batch = detail.batch;

            println!(
                "{} [{}]",
                batch.name.cyan().bold(),
                status_colored(&batch.status)
            );
            println!(
                "  {} total, {} successful, {} failed",
                batch.total_calls,
                batch.successful_calls.to_string().green(),
                batch.failed_calls.to_string().red()
            );
            if let Some(completed_at) = &batch.completed_at {
                println!("  Completed at {}", completed_at);
            }

            println!("\n{}", "Calls:".bold());
            for call in &detail.calls {
                print_call_line(call);
            }
        }

        BatchAction::Dispatch { id, watch } => {
            let accepted = client.dispatch_batch(id).await?;

            println!(
                "{} Dispatching {} calls of batch {}",
                "✓".green(),
                accepted.total_calls,
                accepted.batch_id.to_string().dimmed()
            );
            if !accepted.watchdog_started {
                println!("{}", "  Watchdog is not running for this batch".yellow());
            }

            if watch {
                watch_batch(&client, id, config.wait_secs).await?;
            }
        }

        BatchAction::Stop { id, yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Cancel every unfinished call of batch {}?", id))
                    .default(false)
                    .interact()
                    .context("Failed to read confirmation")?;

            if !confirmed {
                println!("Aborted.");
                return Ok(());
            }

            let summary = client.stop_batch(id).await?;

            println!(
                "{} {} calls canceled ({} provider hang-ups sent)",
                "🛑".red(),
                summary.canceled,
                summary.provider_cancels
            );
            if summary.batch_completed {
                println!("  Batch completed");
            }
        }

        BatchAction::Watch { id } => watch_batch(&client, id, config.wait_secs).await?,
    }

    Ok(())
}

/// Long-poll changes until the batch completes
async fn watch_batch(client: &CallwaveClient, batch_id: Uuid, wait_secs: u64) -> Result<()> {
    let detail = client.get_batch(batch_id).await?;
    if detail.batch.status == "completed" {
        println!("Batch already completed.");
        return Ok(());
    }

    println!("{}", "Watching (Ctrl-C to quit)...".dimmed());

    loop {
        let Some(change) = client.next_change(batch_id, wait_secs).await? else {
            continue;
        };

        match change.table.as_str() {
            "batch" => {
                println!(
                    "  batch [{}] {} ok, {} failed",
                    status_colored(&change.status),
                    change.successful_calls.unwrap_or_default(),
                    change.failed_calls.unwrap_or_default()
                );
            }
            _ => {
                println!(
                    "  call {} -> {}",
                    change.id.to_string().dimmed(),
                    status_colored(&change.status)
                );
            }
        }

        if change.is_batch_completion() {
            println!("{} Batch completed", "✓".green());
            return Ok(());
        }
    }
}

async fn cmd_call(action: CallAction) -> Result<()> {
    let config = Config::load()?;
    let client = client(&config);

    match action {
        CallAction::Show { id } => {
            let call = client.get_call(id).await?;

            print_call_line(&call);
            println!("  Batch: {}", call.batch_id);
            if let Some(ext) = &call.external_call_id {
                println!("  Provider call: {}", ext);
            }
            if let Some(started_at) = &call.started_at {
                println!("  Started: {}", started_at);
            }
            if let Some(completed_at) = &call.completed_at {
                println!("  Completed: {}", completed_at);
            }
            if let Some(seconds) = call.duration_seconds {
                println!("  Duration: {}s", seconds);
            }
            if let Some(url) = &call.recording_url {
                println!("  Recording: {}", url);
            }
            if let Some(text) = call.final_transcript.as_ref().or(call.live_transcript.as_ref()) {
                println!("\n{}", text);
            }
        }

        CallAction::Transcript { id } => {
            let fetched = client.fetch_transcript(id).await?;

            if !fetched.available {
                println!(
                    "{} Transcript not available yet (call is {})",
                    "…".yellow(),
                    fetched.status
                );
                return Ok(());
            }

            if let Some(seconds) = fetched.duration_seconds {
                eprintln!("{} {}s", "Duration".dimmed(), seconds);
            }
            if let Some(url) = &fetched.recording_url {
                eprintln!("{} {}", "Recording".dimmed(), url);
            }
            // Transcript alone on stdout for piping
            println!("{}", fetched.transcript.unwrap_or_default());
        }
    }

    Ok(())
}

async fn cmd_sweep() -> Result<()> {
    let config = Config::load()?;
    let report = client(&config).sweep().await?;

    println!(
        "{} {} examined, {} timed out, {} already resolved",
        "🐕".normal(),
        report.examined,
        report.timed_out.to_string().yellow(),
        report.already_resolved
    );
    if report.cancel_failures > 0 || report.errors > 0 {
        println!(
            "  {} provider cancel failures, {} errors",
            report.cancel_failures.to_string().red(),
            report.errors.to_string().red()
        );
    }

    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  API Key: {}",
        if config.api_key.is_some() {
            "Set".green()
        } else {
            "Not set".red()
        }
    );
    println!("  Watch wait: {}s", config.wait_secs);

    Ok(())
}

fn print_call_line(call: &CallResponse) {
    let reg_no = call.reg_no.as_deref().unwrap_or("-");
    let error = call
        .error_message
        .as_deref()
        .map(|e| truncate_string(e, 60))
        .unwrap_or_default();

    println!(
        "  {} {} {} [{}] {}",
        call.id.to_string().dimmed(),
        call.phone_number.cyan(),
        reg_no.dimmed(),
        status_colored(&call.status),
        error.red()
    );
}

fn status_colored(status: &str) -> ColoredString {
    match status {
        "completed" => status.green(),
        "failed" | "canceled" => status.red(),
        "active" | "ringing" | "dispatching" => status.yellow(),
        _ => status.normal(),
    }
}

/// Parse `phone[,reg_no]` lines, skipping blanks and `#` comments
fn parse_call_lines(content: &str) -> Vec<CallEntryRequest> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (phone, reg_no) = match line.split_once(',') {
                Some((phone, reg_no)) => (phone.trim(), Some(reg_no.trim())),
                None => (line, None),
            };
            CallEntryRequest {
                phone_number: phone.to_string(),
                reg_no: reg_no.filter(|r| !r.is_empty()).map(str::to_string),
            }
        })
        .collect()
}

/// Truncate string safely for UTF-8 (by char count, not bytes)
fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
