//! Route Map CLI - submit shipment files and fetch rendered maps

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tabled::{Table, Tabled};
use tokio::io::AsyncReadExt;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "routemap-cli")]
#[command(about = "Route Map Engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "ROUTEMAP_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a shipment file (`-` reads stdin)
    Submit {
        file: PathBuf,

        /// Job timeout in seconds
        #[arg(short, long)]
        timeout_secs: Option<u64>,
    },

    /// Show the status of a job
    Status {
        job_id: String,
    },

    /// Fetch the rendered map of a finished job
    #[command(name = "result")]
    Fetch {
        job_id: String,

        /// Write the HTML map here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Poll until a job finishes or fails
    Wait {
        job_id: String,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,

        /// Give up after this many seconds
        #[arg(long, default_value = "600")]
        max_wait_secs: u64,
    },

    /// Show system statistics
    Stats,

    /// Run maintenance operations
    Maintenance {
        /// Force VACUUM even if not needed
        #[arg(long)]
        force_vacuum: bool,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    job_id: String,
    state: String,
}

#[derive(Deserialize, Tabled)]
struct RouteCounts {
    delivery: usize,
    collection: usize,
    stock: usize,
    malformed: usize,
    duplicate: usize,
    unresolved: usize,
    unclassified: usize,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut data = String::new();
        tokio::io::stdin()
            .read_to_string(&mut data)
            .await
            .context("Failed to read stdin")?;
        Ok(data)
    } else {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))
    }
}

fn colored_status(status: &str) -> colored::ColoredString {
    match status {
        "FINISHED" => status.green(),
        "FAILED" => status.red(),
        "RUNNING" => status.cyan(),
        "QUEUED" => status.yellow(),
        _ => status.dimmed(),
    }
}

fn mb(bytes: &serde_json::Value) -> f64 {
    bytes.as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { file, timeout_secs } => {
            let data = read_input(&file).await?;
            let params = json!({
                "data": data,
                "timeout_secs": timeout_secs,
            });

            let result = call_rpc(&cli.rpc_url, "route.submit.v1", params).await?;
            let submitted: SubmitResult = serde_json::from_value(result)?;

            println!("{}", "✓ Shipments submitted".green().bold());
            println!();
            println!("{}", Table::new(vec![submitted]));
        }

        Commands::Status { job_id } => {
            let result = call_rpc(&cli.rpc_url, "route.status.v1", json!({ "job_id": job_id }))
                .await?;
            let status = result["status"].as_str().unwrap_or("UNKNOWN");

            println!("  {} {}", "Job:".bold(), job_id);
            println!("  {} {}", "Status:".bold(), colored_status(status));
            if let Some(error) = result["error"].as_str() {
                println!("  {} {}", "Error:".bold(), error.red());
            }
        }

        Commands::Fetch { job_id, out } => {
            let result = call_rpc(&cli.rpc_url, "route.result.v1", json!({ "job_id": job_id }))
                .await?;
            let map_html = result["map_html"].as_str().unwrap_or_default();

            match out {
                Some(path) => {
                    tokio::fs::write(&path, map_html)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;

                    let counts: RouteCounts = serde_json::from_value(result["counts"].clone())?;
                    println!(
                        "{}",
                        format!("✓ Map written to {}", path.display()).green().bold()
                    );
                    println!();
                    println!("{}", Table::new(vec![counts]));
                }
                None => println!("{}", map_html),
            }
        }

        Commands::Wait {
            job_id,
            interval_ms,
            max_wait_secs,
        } => {
            let deadline = Instant::now() + Duration::from_secs(max_wait_secs);
            loop {
                let result =
                    call_rpc(&cli.rpc_url, "route.status.v1", json!({ "job_id": job_id }))
                        .await?;
                let status = result["status"].as_str().unwrap_or("UNKNOWN").to_string();

                match status.as_str() {
                    "QUEUED" | "RUNNING" if Instant::now() < deadline => {
                        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                    }
                    "QUEUED" | "RUNNING" => {
                        anyhow::bail!("Job {} still {} after {}s", job_id, status, max_wait_secs);
                    }
                    "FINISHED" => {
                        println!("{} {}", "✓".green(), colored_status(&status));
                        break;
                    }
                    _ => {
                        println!("{} {}", "✗".red(), colored_status(&status));
                        if let Some(error) = result["error"].as_str() {
                            println!("  {} {}", "Error:".bold(), error);
                        }
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Stats => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Queued:".bold(), stats["queued_jobs"]);
                    println!("  {} {}", "Running:".bold(), stats["running_jobs"]);
                    println!("  {} {}", "Finished:".bold(), stats["finished_jobs"]);
                    println!("  {} {}", "Failed:".bold(), stats["failed_jobs"]);
                    match stats["cached_zips"].as_i64() {
                        Some(n) => println!("  {} {}", "Cached ZIPs:".bold(), n),
                        None => println!("  {} {}", "Cached ZIPs:".bold(), "n/a (worker-local)".dimmed()),
                    }
                    println!();
                    println!("  {} {:.2} MB", "DB Size:".bold(), mb(&stats["db_size_bytes"]));
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Maintenance { force_vacuum } => {
            println!("{}", "Running maintenance...".cyan().bold());
            println!();

            let params = json!({ "force_vacuum": force_vacuum });

            match call_rpc(&cli.rpc_url, "admin.maintenance.v1", params).await {
                Ok(result) => {
                    if result["vacuum_run"].as_bool().unwrap_or(false) {
                        println!("  {} VACUUM executed", "✓".green());
                    } else {
                        println!("  ○ VACUUM skipped (not needed)");
                    }
                    println!("  {} {} jobs deleted", "✓".green(), result["jobs_deleted"]);
                    println!(
                        "  {} {:.2} MB → {:.2} MB",
                        "DB Size:".bold(),
                        mb(&result["db_size_before"]),
                        mb(&result["db_size_after"])
                    );
                }
                Err(e) => {
                    println!("  {} Maintenance failed: {}", "✗".red(), e);
                }
            }
        }
    }

    Ok(())
}
