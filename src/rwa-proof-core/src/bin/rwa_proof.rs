//! rwa-proof CLI - evaluate verification claims for real-world-asset tokens.
//!
//! Exit codes: 0 success, 1 other error, 2 malformed identifier,
//! 3 asset not found, 4 cancelled.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rwa_proof_core::audit::{verify_audit_log, AuditLog};
use rwa_proof_core::{
    GatewayConfig, OverallRisk, ProofCategory, ProofEngine, ProofError, ProofExtra, ProofResult,
    ProofStatus, TokenIdentifier, VerificationRecord,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// rwa-proof - existence, legality and collateral proofs for RWA tokens.
///
/// Token identifiers look like `asset:1/0xABCD1234/001`: a chain id, the
/// token contract address and the token id within that contract.
#[derive(Parser)]
#[command(name = "rwa-proof")]
#[command(version = VERSION)]
#[command(about = "Verification-claim evaluation for real-world-asset tokens")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a token and print its verification record
    Evaluate {
        /// Token identifier, e.g. asset:1/0xABCD1234/001
        token: String,

        /// Use the built-in demonstration registry instead of HTTPS sources
        #[arg(long)]
        demo: bool,

        /// Gateway configuration file (JSON)
        #[arg(long, conflicts_with = "demo")]
        config: Option<PathBuf>,

        /// Append the record to this audit log
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },

    /// Parse a token identifier and print its parts
    Parse {
        /// Token identifier
        token: String,
    },

    /// Verify the hash chain of an audit log
    AuditVerify {
        /// Audit log file (JSON Lines)
        path: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorOutput {
    error: String,
    caller_state: rwa_proof_core::CallerState,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

fn exit_code_for(err: &ProofError) -> ExitCode {
    match err {
        ProofError::MalformedIdentifier { .. } => ExitCode::from(2),
        ProofError::AssetNotFound { .. } => ExitCode::from(3),
        ProofError::Cancelled => ExitCode::from(4),
        _ => ExitCode::from(1),
    }
}

fn report_error(err: &ProofError, json: bool) -> ExitCode {
    if json {
        print_json(&ErrorOutput {
            error: err.to_string(),
            caller_state: err.caller_state(),
        });
    } else {
        eprintln!("{RED}error{RESET}: {err}");
    }
    exit_code_for(err)
}

fn status_color(status: ProofStatus) -> &'static str {
    match status {
        ProofStatus::Verified => GREEN,
        ProofStatus::Warning | ProofStatus::Pending => YELLOW,
        ProofStatus::Failed => RED,
    }
}

fn risk_color(risk: OverallRisk) -> &'static str {
    match risk {
        OverallRisk::Safe => GREEN,
        OverallRisk::Warning => YELLOW,
        OverallRisk::Danger => RED,
    }
}

fn print_proof(category: ProofCategory, proof: &ProofResult) {
    let status = format!("{:?}", proof.status).to_uppercase();
    println!(
        "  {:<11} {}{:<8}{RESET} {} ({})",
        category.as_str(),
        status_color(proof.status),
        status,
        proof.source,
        proof.method
    );
    if let Some(at) = proof.verified_at {
        println!("              {DIM}at {}{RESET}", at.to_rfc3339());
    }
    for evidence in &proof.evidence {
        println!("              - {evidence}");
    }
    if let ProofExtra::Existence { notes, .. } = &proof.extra {
        for note in notes {
            println!("              {DIM}note: {note}{RESET}");
        }
    }
    for warning in &proof.warnings {
        println!("              {YELLOW}! {warning}{RESET}");
    }
}

fn print_record(record: &VerificationRecord) {
    let meta = &record.metadata;
    println!("\nVERIFICATION RECORD");
    println!("===================\n");
    println!("Token:    {}", record.token_id);
    println!("Asset:    {} ({:?})", meta.name, meta.asset_type);
    if let Some(ref location) = meta.location {
        println!("Location: {location}");
    }
    if let Some(ref value) = meta.value {
        println!("Value:    {value}");
    }
    if let Some(ref issuer) = meta.issuer {
        println!("Issuer:   {issuer}");
    }
    println!();

    println!("Proofs:");
    for category in ProofCategory::ALL {
        print_proof(category, record.proofs.get(category));
    }
    println!();

    println!(
        "Overall:  {}{}{RESET}",
        risk_color(record.overall_risk),
        record.overall_message
    );
    println!("{DIM}Generated {}{RESET}", record.generated_at.to_rfc3339());
}

fn build_engine(
    demo: bool,
    config: Option<&Path>,
    audit_log: Option<PathBuf>,
) -> Result<ProofEngine, ProofError> {
    if demo {
        let engine = ProofEngine::demo();
        return match audit_log {
            Some(path) => Ok(engine.with_audit_log(AuditLog::open(path)?)),
            None => Ok(engine),
        };
    }

    let mut config = match config {
        Some(path) => GatewayConfig::from_json_file(path)?,
        None => GatewayConfig::default(),
    };
    if audit_log.is_some() {
        config.audit_log = audit_log;
    }
    ProofEngine::with_config(config)
}

async fn run_evaluate(
    token: &str,
    demo: bool,
    config: Option<&Path>,
    audit_log: Option<PathBuf>,
    json: bool,
) -> ExitCode {
    let engine = match build_engine(demo, config, audit_log) {
        Ok(engine) => engine,
        Err(e) => return report_error(&e, json),
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    match engine.evaluate_with_cancel(token, cancel_rx).await {
        Ok(record) => {
            if json {
                print_json(&record);
            } else {
                print_record(&record);
            }
            ExitCode::SUCCESS
        },
        Err(e) => report_error(&e, json),
    }
}

fn run_parse(raw: &str, json: bool) -> ExitCode {
    match TokenIdentifier::parse(raw) {
        Ok(token) => {
            if json {
                print_json(&serde_json::json!({
                    "canonical": token.canonical(),
                    "chainId": token.chain_id(),
                    "contractAddress": token.contract_address(),
                    "localTokenId": token.local_token_id(),
                }));
            } else {
                println!("Canonical:        {token}");
                println!("Chain ID:         {}", token.chain_id());
                println!("Contract address: {}", token.contract_address());
                println!("Local token ID:   {}", token.local_token_id());
            }
            ExitCode::SUCCESS
        },
        Err(e) => report_error(&e, json),
    }
}

fn run_audit_verify(path: &Path, json: bool) -> ExitCode {
    let result = match verify_audit_log(path) {
        Ok(result) => result,
        Err(e) => return report_error(&e, json),
    };

    if json {
        print_json(&result);
    } else {
        println!("\nAUDIT LOG CHECK");
        println!("===============\n");
        println!("File:    {}", path.display());
        println!("Entries: {}", result.total_entries);
        if result.valid {
            println!("Chain:   {GREEN}INTACT{RESET}");
        } else {
            println!("Chain:   {RED}BROKEN{RESET}");
            if let Some(seq) = result.first_tampered_sequence {
                println!("First broken entry: {seq}");
            }
            for error in &result.errors {
                println!("  - {error}");
            }
        }
    }

    if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Log filter from `RUST_LOG`, falling back to a level chosen by the flags
/// (suppressed for JSON output).
fn log_filter(rust_log: Option<String>, verbose: bool, json_output: bool) -> EnvFilter {
    let default = if json_output {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let json_output = cli.format == "json";

    // RUST_LOG overrides the level picked from the flags
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            std::env::var("RUST_LOG").ok(),
            cli.verbose,
            json_output,
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Evaluate {
            token,
            demo,
            config,
            audit_log,
        } => run_evaluate(&token, demo, config.as_deref(), audit_log, json_output).await,
        Commands::Parse { token } => run_parse(&token, json_output),
        Commands::AuditVerify { path } => run_audit_verify(&path, json_output),
    }
}
