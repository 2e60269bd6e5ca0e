use super::{json_pretty, styled_status, EXIT_CONFIG_ERROR, EXIT_DECLARATION_ERROR, EXIT_SUCCESS};
use bento_schema::{current_platform, parse_declarations_file};
use bento_store::{read_record, BundlingRootResolver};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Serialize)]
struct Row {
    name: String,
    version: String,
    state: String,
    path: String,
}

/// Read-only listing: declared environments and their recorded install
/// state. Never triggers an install.
pub fn run(declarations: &Path, json: bool) -> Result<u8, String> {
    let definitions = match parse_declarations_file(declarations) {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(EXIT_DECLARATION_ERROR);
        }
    };
    let root = match BundlingRootResolver::new().root() {
        Ok(root) => root,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    let platform = current_platform();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for definition in definitions.iter().filter(|d| d.matches_platform(platform)) {
        if !seen.insert(definition.name.to_string()) {
            continue;
        }
        let environment_root = root.environment_root(&definition.name);
        let state = if definition.skip {
            "skipped".to_owned()
        } else {
            read_record(&environment_root)
                .map_or_else(|| "uninstalled".to_owned(), |r| r.outcome.to_string())
        };
        rows.push(Row {
            name: definition.name.to_string(),
            version: definition.version.to_string(),
            state,
            path: environment_root.display().to_string(),
        });
    }

    if json {
        println!("{}", json_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("no environments declared for {platform}");
    } else {
        println!("{:<24} {:<12} {:<12} PATH", "NAME", "VERSION", "STATE");
        for row in &rows {
            println!(
                "{:<24} {:<12} {:<12} {}",
                row.name,
                row.version,
                styled_status(&row.state),
                row.path
            );
        }
    }

    Ok(EXIT_SUCCESS)
}
