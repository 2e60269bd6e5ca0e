use super::{build_registry, json_pretty, styled_status, EXIT_DECLARATION_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use bento_core::CoreError;
use bento_runtime::CancellationToken;
use bento_schema::{current_platform, parse_declarations_file};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Serialize)]
struct ProvisionReport {
    name: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Warm start: resolve every declared environment, report per-environment
/// status, and exit non-zero iff anything failed. Individual failures never
/// abort the run — the remaining environments still get their chance.
pub fn run(declarations: &Path, cancel: &CancellationToken, json: bool) -> Result<u8, String> {
    let definitions = match parse_declarations_file(declarations) {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(EXIT_DECLARATION_ERROR);
        }
    };
    let registry = build_registry(declarations, cancel)?;

    let platform = current_platform();
    let mut seen = HashSet::new();
    let mut reports = Vec::new();
    let mut failures = 0usize;

    for definition in definitions.iter().filter(|d| d.matches_platform(platform)) {
        let name = definition.name.to_string();
        if !seen.insert(name.clone()) {
            continue;
        }
        let report = match registry.environment(&name) {
            Ok(environment) if environment.is_disabled => ProvisionReport {
                name,
                status: "skipped",
                path: None,
                detail: None,
            },
            Ok(environment) => ProvisionReport {
                name,
                status: "ready",
                path: Some(environment.path.display().to_string()),
                detail: None,
            },
            Err(CoreError::Cancelled) => {
                failures += 1;
                reports.push(ProvisionReport {
                    name,
                    status: "cancelled",
                    path: None,
                    detail: None,
                });
                break;
            }
            Err(e) => {
                failures += 1;
                ProvisionReport {
                    name,
                    status: "failed",
                    path: None,
                    detail: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    if json {
        println!("{}", json_pretty(&reports)?);
    } else if reports.is_empty() {
        println!("no environments declared for {platform}");
    } else {
        for report in &reports {
            match (&report.path, &report.detail) {
                (Some(path), _) => {
                    println!("{:<24} {} {}", report.name, styled_status(report.status), path);
                }
                (None, Some(detail)) => {
                    println!("{:<24} {}", report.name, styled_status(report.status));
                    eprintln!("  {}", detail.replace('\n', "\n  "));
                }
                (None, None) => {
                    println!("{:<24} {}", report.name, styled_status(report.status));
                }
            }
        }
    }

    Ok(if failures == 0 { EXIT_SUCCESS } else { EXIT_FAILURE })
}
