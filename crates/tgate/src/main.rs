#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trustgate_core::errors::HttpFailure;
use trustgate_core::settings::{TenantSettings, WebhookConfig};
use trustgate_core::traits::FlagStore;
use trustgate_core::types::{AutomationLevel, HealthSnapshot, RetryPolicy};
use trustgate_engine::exec::WebhookNotifier;
use trustgate_engine::gates::TrustGate;
use trustgate_engine::health::{HealthClassifier, HttpHealthProvider};
use trustgate_engine::report::event_log::{read_events, verify_chain};
use trustgate_engine::report::{GateAlerts, JsonlSink, Reporter};
use trustgate_engine::state::{
    events_path, flags_path, load_settings, update_automation_level, FileFlagStore,
};
use trustgate_engine::{observe, GatedRunner, OutcomeSummary, RunOutcome};

#[derive(Parser)]
#[command(
    name = "tgate",
    version,
    about = "Health-based trust gate for automated actions. JSON on stdout, notes on stderr."
)]
struct Cli {
    /// Debug logging on stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Classify a health score.
    Classify {
        /// Score 0-100; omit for "no data".
        #[arg(long, allow_negative_numbers = true)]
        score: Option<f64>,

        /// Reported issue (repeatable).
        #[arg(long = "issue")]
        issues: Vec<String>,

        /// Issue substring that marks health critical (repeatable).
        #[arg(long = "marker")]
        markers: Vec<String>,

        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a tenant settings file: schema + semantic checks.
    Check {
        /// Path to settings .json file.
        file: String,

        /// Output structured JSON report.
        #[arg(long)]
        json: bool,

        /// Fail on warnings (not just errors).
        #[arg(long)]
        strict: bool,
    },

    /// Show settings, or change the automation level.
    Settings {
        /// Path to settings .json file.
        file: String,

        /// New automation level (0, 1 or 2).
        #[arg(long, requires = "actor")]
        set_level: Option<u8>,

        /// Who is changing the level (recorded in the event log).
        #[arg(long)]
        actor: Option<String>,
    },

    /// Evaluate the gate for an action and log the decision.
    Evaluate {
        /// Path to settings .json file.
        file: String,

        /// Action identifier.
        #[arg(long)]
        action: String,

        #[command(flatten)]
        health: HealthArgs,

        /// Evaluate at this level instead of the configured one.
        #[arg(long)]
        level: Option<u8>,
    },

    /// Gate a webhook payload and deliver it with retry.
    Dispatch {
        /// Path to settings .json file.
        file: String,

        /// Action identifier.
        #[arg(long)]
        action: String,

        #[command(flatten)]
        health: HealthArgs,

        /// JSON payload to POST.
        #[arg(long)]
        payload: String,

        /// Sign off an approval-required action in the same run. The gate is
        /// re-checked on the same snapshot before delivery.
        #[arg(long)]
        approved_by: Option<String>,
    },

    /// Webhook connectivity test (single attempt).
    Webhook {
        /// Path to settings .json file.
        file: String,

        #[arg(long)]
        test: bool,
    },

    /// Inspect the event log.
    Events {
        /// Path to settings .json file.
        file: String,

        /// Verify the hash chain.
        #[arg(long, conflicts_with = "tail")]
        verify: bool,

        /// Print the last N events as JSON.
        #[arg(long)]
        tail: Option<usize>,
    },

    /// List, dismiss or reset hold/block alerts.
    Alerts {
        /// Path to settings .json file.
        file: String,

        #[arg(long, conflicts_with_all = ["dismiss", "clear"])]
        list: bool,

        /// Dismiss the alert for this action.
        #[arg(long, conflicts_with = "clear")]
        dismiss: Option<String>,

        /// Forget every dismissal.
        #[arg(long)]
        clear: bool,
    },
}

#[derive(clap::Args)]
struct HealthArgs {
    /// Health score 0-100.
    #[arg(long, conflicts_with = "health_url", allow_negative_numbers = true)]
    score: Option<f64>,

    /// Fetch {score, issues} from this URL instead.
    #[arg(long)]
    health_url: Option<String>,

    /// Reported issue (repeatable).
    #[arg(long = "issue")]
    issues: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::Classify {
            score,
            issues,
            markers,
            json,
        } => cmd_classify(score, issues, &markers, json),

        Cmd::Check { file, json, strict } => cmd_check(&file, json, strict),

        Cmd::Settings {
            file,
            set_level,
            actor,
        } => cmd_settings(Path::new(&file), set_level, actor.as_deref()),

        Cmd::Evaluate {
            file,
            action,
            health,
            level,
        } => cmd_evaluate(Path::new(&file), &action, health, level).await,

        Cmd::Dispatch {
            file,
            action,
            health,
            payload,
            approved_by,
        } => {
            cmd_dispatch(
                Path::new(&file),
                &action,
                health,
                &payload,
                approved_by.as_deref(),
            )
            .await
        }

        Cmd::Webhook { file, test } => cmd_webhook(Path::new(&file), test).await,

        Cmd::Events { file, verify, tail } => cmd_events(Path::new(&file), verify, tail),

        Cmd::Alerts {
            file,
            list,
            dismiss,
            clear,
        } => cmd_alerts(Path::new(&file), list, dismiss, clear),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_level(level: u8) -> Result<AutomationLevel> {
    Ok(AutomationLevel::try_from(level)?)
}

async fn snapshot(health: HealthArgs, policy: &RetryPolicy) -> Result<HealthSnapshot> {
    match health.health_url {
        Some(url) => {
            let provider = HttpHealthProvider::new(url, *policy)?;
            let mut snapshot = observe(&provider).await;
            snapshot.issues.extend(health.issues);
            Ok(snapshot)
        }
        None => Ok(HealthSnapshot::new(health.score, health.issues)),
    }
}

/// Event log plus alert tracking, both keyed off the settings path.
fn file_reporter(file: &Path) -> Reporter {
    let flags: Arc<dyn FlagStore> = Arc::new(FileFlagStore::new(flags_path(file)));
    Reporter::new()
        .with_sink(Arc::new(JsonlSink::new(events_path(file))))
        .with_sink(Arc::new(GateAlerts::new(flags)))
}

fn cmd_classify(
    score: Option<f64>,
    issues: Vec<String>,
    markers: &[String],
    json_out: bool,
) -> Result<()> {
    let classifier = HealthClassifier::with_critical_markers(markers);
    let assessment = classifier.assess(&HealthSnapshot::new(score, issues));
    if json_out {
        print_json(&assessment)?;
    } else {
        println!("{}", assessment.status);
    }
    Ok(())
}

fn cmd_check(file: &str, json_out: bool, strict: bool) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("cannot read {file}"))?;
    let data: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("{file}: invalid JSON"))?;

    let report = trustgate_core::schema::check(&data, file, strict);

    if json_out {
        print_json(&report)?;
    } else {
        if report.pass {
            eprintln!("  ok   {file}");
        } else {
            eprintln!("  FAIL {file}");
        }
        for e in &report.errors {
            eprintln!("  error {e}");
        }
        for w in &report.warnings {
            eprintln!("  warn  {w}");
        }
    }

    if !report.pass {
        bail!("check failed for {file}");
    }
    Ok(())
}

fn cmd_settings(file: &Path, set_level: Option<u8>, actor: Option<&str>) -> Result<()> {
    let settings = match set_level {
        Some(level) => {
            let level = parse_level(level)?;
            let actor = actor.context("--actor is required with --set-level")?;
            let updated = update_automation_level(file, level, actor)?;
            eprintln!(
                "  automation level {} (rev {})",
                updated.automation_level, updated.settings_rev
            );
            updated
        }
        None => load_settings(file)?,
    };
    print_json(&settings)
}

async fn cmd_evaluate(
    file: &Path,
    action: &str,
    health: HealthArgs,
    level: Option<u8>,
) -> Result<()> {
    let settings = load_settings(file)?;
    let level = match level {
        Some(l) => parse_level(l)?,
        None => settings.automation_level,
    };
    let snapshot = snapshot(health, &settings.retry).await?;

    let assessment = HealthClassifier::from_settings(&settings).assess(&snapshot);
    let verdict = TrustGate::from_settings(&settings).check(action, &assessment, level);
    file_reporter(file).report(&verdict.event());

    print_json(&verdict)
}

async fn cmd_dispatch(
    file: &Path,
    action: &str,
    health: HealthArgs,
    payload: &str,
    approved_by: Option<&str>,
) -> Result<()> {
    let settings = load_settings(file)?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("--payload is not valid JSON")?;
    let webhook = webhook_config(&settings, file)?;

    // The runner owns retries; each attempt is a single POST.
    let sender = WebhookNotifier::new(webhook.clone(), RetryPolicy::single_attempt())?;
    let runner = GatedRunner::from_settings(&settings)?.with_reporter(file_reporter(file));
    let snapshot = snapshot(health, &settings.retry).await?;

    let mut outcome = runner
        .run_classified(
            action,
            &snapshot,
            &settings,
            || sender.send_json(&payload),
            HttpFailure::is_retryable,
        )
        .await
        .with_context(|| format!("delivery to {} failed", sender.url()))?;

    // The approval queue lives in this process only; without --approved-by
    // the queued action ends with the run.
    let awaiting = matches!(outcome, RunOutcome::AwaitingApproval(_));
    if let Some(approver) = approved_by.filter(|_| awaiting) {
        eprintln!("  approved by {approver}");
        if let Some(approved) = runner
            .run_approved_classified(
                action,
                &snapshot,
                || sender.send_json(&payload),
                HttpFailure::is_retryable,
            )
            .await
        {
            outcome = approved.with_context(|| format!("delivery to {} failed", sender.url()))?;
        }
    }

    let mut summary = serde_json::to_value(OutcomeSummary::from(&outcome))?;
    if let RunOutcome::Executed(delivery) = &outcome {
        summary["http_status"] = serde_json::json!(delivery.status);
    }
    print_json(&summary)
}

async fn cmd_webhook(file: &Path, test: bool) -> Result<()> {
    if !test {
        bail!("specify --test");
    }
    let settings = load_settings(file)?;
    let webhook = webhook_config(&settings, file)?;
    let notifier = WebhookNotifier::new(webhook.clone(), RetryPolicy::single_attempt())?;
    let delivery = notifier
        .test_connection()
        .await
        .with_context(|| format!("webhook test to {} failed", notifier.url()))?;
    eprintln!("  webhook reachable ({})", delivery.status);
    print_json(&delivery)
}

fn webhook_config<'a>(settings: &'a TenantSettings, file: &Path) -> Result<&'a WebhookConfig> {
    settings
        .webhook
        .as_ref()
        .with_context(|| format!("no webhook configured in {}", file.display()))
}

fn cmd_events(file: &Path, verify: bool, tail: Option<usize>) -> Result<()> {
    let log = events_path(file);
    if verify {
        if !log.exists() {
            eprintln!("  no event log found at {}", log.display());
            return Ok(());
        }
        let count = verify_chain(&log)?;
        eprintln!("  event chain valid ({count} entries)");
        return print_json(&serde_json::json!({ "valid": true, "entries": count }));
    }
    let Some(n) = tail else {
        bail!("specify --verify or --tail N");
    };
    let events = read_events(&log)?;
    let start = events.len().saturating_sub(n);
    print_json(&events[start..])
}

fn cmd_alerts(file: &Path, list: bool, dismiss: Option<String>, clear: bool) -> Result<()> {
    let flags = Arc::new(FileFlagStore::new(flags_path(file)));
    let alerts = GateAlerts::new(flags.clone());

    if let Some(action_id) = dismiss {
        alerts.dismiss(&action_id)?;
        eprintln!("  dismissed alert for {action_id}");
        return Ok(());
    }
    if clear {
        flags.clear_all()?;
        eprintln!("  cleared all dismissals");
        return Ok(());
    }
    if !list {
        bail!("specify --list, --dismiss ID or --clear");
    }

    let events = read_events(&events_path(file))?;
    alerts.restore(&events);
    print_json(&alerts.visible())
}
