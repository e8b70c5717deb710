//! Lull Config Verifier CLI Tool
//!
//! Loads a lull configuration file, runs the full declare + merge pass, and
//! reports the effective sleep_ms for every scope, so operators can see what
//! a config will do before deploying it.
//!
//! Usage:
//!   lull-verify --config lull.yaml [--json]

use clap::Parser;

use lull_http_delay::config::Config;
use lull_http_delay::delay::DelaySpec;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Lull Config Verifier - report effective per-scope delays
#[derive(Parser, Debug)]
#[command(name = "lull-verify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: String,

    /// Emit the report as JSON instead of a colored table
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let compiled = match Config::from_file(&args.config).and_then(|c| c.compile()) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("{RED}{BOLD}configuration invalid:{RESET} {e:#}");
            std::process::exit(1);
        }
    };

    if args.json {
        let report: Vec<serde_json::Value> = compiled
            .scopes
            .iter()
            .map(|(_, name, spec)| {
                let delay = match spec.map(|s| s.as_ref()) {
                    None => serde_json::Value::Null,
                    Some(DelaySpec::Literal(ms)) => serde_json::json!({ "ms": ms }),
                    Some(spec @ DelaySpec::Dynamic(_)) => {
                        serde_json::json!({ "expression": spec.to_string() })
                    }
                };
                serde_json::json!({ "scope": name, "sleep_ms": delay })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
        return;
    }

    println!("{BOLD}effective sleep_ms per scope{RESET}");
    for (_, name, spec) in compiled.scopes.iter() {
        match spec.map(|s| s.as_ref()) {
            None => println!("  {DIM}{name}: no delay{RESET}"),
            Some(DelaySpec::Literal(0)) => {
                println!("  {YELLOW}{name}: 0 ms (never sleeps){RESET}")
            }
            Some(DelaySpec::Literal(ms)) => println!("  {GREEN}{name}: {ms} ms{RESET}"),
            Some(spec @ DelaySpec::Dynamic(_)) => {
                println!("  {CYAN}{name}: {spec} (resolved per request){RESET}")
            }
        }
    }
}
