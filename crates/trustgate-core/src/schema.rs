use anyhow::{bail, Context, Result};
use jsonschema::Validator;
use serde_json::Value;

use crate::errors::{CheckIssue, CheckReport};
use crate::types::RetryPolicy;

const SETTINGS_SCHEMA: &str = include_str!("../schema/trustgate-settings.schema.json");

/// Create a validator for tenant settings.
pub fn validator() -> Result<Validator> {
    let schema: Value =
        serde_json::from_str(SETTINGS_SCHEMA).context("embedded schema is invalid JSON")?;
    Validator::new(&schema).map_err(|e| anyhow::anyhow!("schema compilation failed: {e}"))
}

/// Validate a settings value against the schema.
pub fn validate(data: &Value) -> Result<()> {
    let v = validator()?;
    if v.is_valid(data) {
        return Ok(());
    }
    let msgs: Vec<String> = v
        .iter_errors(data)
        .map(|error| {
            let path = error.instance_path.to_string();
            let loc = if path.is_empty() {
                "(root)".into()
            } else {
                path
            };
            format!("  {loc}: {error}")
        })
        .collect();
    bail!("validation failed:\n{}", msgs.join("\n"));
}

/// Full check producing a structured report (for `tgate check --json`).
pub fn check(data: &Value, file: &str, strict: bool) -> CheckReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match validator() {
        Ok(v) => {
            for error in v.iter_errors(data) {
                let path = error.instance_path.to_string();
                errors.push(CheckIssue {
                    code: "E001".to_string(),
                    check: "schema".to_string(),
                    message: error.to_string(),
                    path: Some(if path.is_empty() {
                        "$(root)".to_string()
                    } else {
                        format!("${path}")
                    }),
                });
            }
        }
        Err(e) => errors.push(CheckIssue {
            code: "E000".to_string(),
            check: "schema".to_string(),
            message: e.to_string(),
            path: None,
        }),
    }

    check_retry_policy(data, &mut errors);
    lint_checks(data, &mut warnings);

    let pass = errors.is_empty() && (!strict || warnings.is_empty());
    CheckReport {
        file: file.to_string(),
        pass,
        errors,
        warnings,
    }
}

/// Cross-field retry rules the schema cannot express.
fn check_retry_policy(data: &Value, errors: &mut Vec<CheckIssue>) {
    let Some(retry) = data.get("retry") else {
        return;
    };
    // Type errors are already reported by the schema pass.
    let Ok(policy) = serde_json::from_value::<RetryPolicy>(retry.clone()) else {
        return;
    };
    if let Err(e) = policy.validate() {
        errors.push(CheckIssue {
            code: "E002".to_string(),
            check: "retry_policy".to_string(),
            message: e.to_string(),
            path: Some("$/retry".to_string()),
        });
    }
}

fn lint_checks(data: &Value, warnings: &mut Vec<CheckIssue>) {
    let webhook_url = data.pointer("/webhook/url").and_then(Value::as_str);

    if let Some(url) = webhook_url {
        if url.starts_with("http://") {
            warnings.push(CheckIssue {
                code: "W001".to_string(),
                check: "lint".to_string(),
                message: "webhook url uses plain http".to_string(),
                path: Some("$/webhook/url".to_string()),
            });
        }
    }

    let level = data
        .get("automation_level")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if level == 0 && webhook_url.is_some() {
        warnings.push(CheckIssue {
            code: "W002".to_string(),
            check: "lint".to_string(),
            message: "automation_level 0 never auto-executes; webhook only receives suggestions"
                .to_string(),
            path: Some("$/automation_level".to_string()),
        });
    }
}
