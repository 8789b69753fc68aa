//! Command-line runner for the record pipeline.
//!
//! `immiwatch [validate|dispatch|notify|publish|stdin]`, defaulting to
//! `validate`, which runs the sample records through mapping and validation
//! without any network or file output.

use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

use immiwatch_pipeline::notify::{Notifier, SlackNotifier, StatusKind, StatusMessage};
use immiwatch_pipeline::{Outcome, Pipeline, PipelineConfig, Record};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Routine to run
    #[arg(value_enum, default_value_t = Routine::Validate)]
    routine: Routine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Routine {
    /// Map and validate the bundled sample records
    Validate,
    /// Send the sample draw record to the configured dispatch endpoint
    Dispatch,
    /// Post a test message to SLACK_WEBHOOK_URL
    Notify,
    /// Render the sample records into SITE_ROOT
    Publish,
    /// Read one trigger payload (JSON) from stdin and run the full pipeline
    Stdin,
}

fn samples() -> Vec<(&'static str, Value)> {
    vec![
        (
            "draw",
            json!({ "record": { "fields": {
                "Headline": "Express Entry CEC Draw: 3,000 ITAs Issued at CRS 518",
                "Summary": "IRCC conducted a CEC-specific draw on July 8, 2025.",
                "Category": "Draws",
                "Impact": "High",
                "Date of Update": "2025-07-08",
                "Cutoff": 518,
                "Invitation": "3,000",
                "Draw Type": "CEC",
                "Program Affected": ["Canadian Experience Class", ""]
            }}}),
        ),
        (
            "policy",
            json!({ "fields": {
                "Headline": "  New Study Permit Processing Standards  ",
                "Summary": "Processing standards for study permit renewals were updated.",
                "Category": "program-delivery",
                "Impact": "moderate",
                "Date of Update": "2025-07-16",
                "Source URL": "https://www.canada.ca/en/immigration-refugees-citizenship.html"
            }}),
        ),
        (
            "invalid",
            json!({
                "Summary": "Draw without numbers",
                "Category": "draws",
                "Impact": "urgent",
                "Date of Update": "29-07-2025"
            }),
        ),
    ]
}

fn print_outcome(name: &str, out: &Outcome) {
    let status = if out.success { "OK" } else { "FAILED" };
    println!("[{status}] {name}");
    for e in &out.errors {
        println!("  error:   {e}");
    }
    if let Some(e) = &out.error {
        println!("  error:   {e}");
    }
    for w in &out.warnings {
        println!("  warning: {w}");
    }
    if let Some(url) = &out.article_url {
        println!("  article: {url}");
    }
    if let Some(rec) = &out.record {
        if let Ok(s) = serde_json::to_string(rec) {
            println!("  record:  {s}");
        }
    }
}

async fn run(routine: Routine, cfg: &PipelineConfig) -> Result<bool> {
    match routine {
        Routine::Validate => {
            // Validation only: no dispatch target, no publisher, no chat.
            let pipeline = Pipeline::new(cfg.build_mapper(), cfg.build_validator());
            for (name, trigger) in samples() {
                print_outcome(name, &pipeline.process(&trigger).await);
            }
            Ok(true)
        }
        Routine::Dispatch => {
            if cfg.build_dispatch().is_none() {
                anyhow::bail!(
                    "no dispatch target (set DISPATCH_URL, or dispatch.repository with GITHUB_TOKEN)"
                );
            }
            let pipeline = Pipeline::from_config(cfg);
            let (name, trigger) = samples().swap_remove(0);
            let out = pipeline.process(&trigger).await;
            print_outcome(name, &out);
            Ok(out.success)
        }
        Routine::Notify => {
            let slack = SlackNotifier::from_env();
            if !slack.is_enabled() {
                anyhow::bail!("SLACK_WEBHOOK_URL is not set");
            }
            let mut rec = Record::new();
            rec.insert("headline", "Slack Webhook Test");
            rec.insert("source", "ImmiWatch Automation");
            let msg = StatusMessage::for_record(StatusKind::Dispatched, &rec)
                .with_details(vec!["Webhook configured and ready".to_string()]);
            slack.notify(&msg).await;
            println!("notification attempted (see log for delivery status)");
            Ok(true)
        }
        Routine::Publish => {
            let publisher = cfg.build_publisher().await?;
            let pipeline = Pipeline::new(cfg.build_mapper(), cfg.build_validator())
                .with_notifier(cfg.build_notifier())
                .with_publisher(publisher);
            let mut all_ok = true;
            for (name, trigger) in samples() {
                let out = pipeline.process(&trigger).await;
                all_ok &= out.success || name == "invalid";
                print_outcome(name, &out);
            }
            Ok(all_ok)
        }
        Routine::Stdin => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("reading trigger from stdin")?;
            let trigger: Value = serde_json::from_str(&raw).context("parsing trigger JSON")?;
            let publisher = cfg.build_publisher().await?;
            let pipeline = Pipeline::from_config(cfg).with_publisher(publisher);
            let outs = pipeline.process_batch(&trigger).await;
            let ok = outs.iter().all(|o| o.success);
            println!("{}", serde_json::to_string_pretty(&outs)?);
            Ok(ok)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    immiwatch_pipeline::init_tracing();
    let cli = Cli::parse();

    let cfg = match PipelineConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.routine, &cfg).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
