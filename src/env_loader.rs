use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;

const ENV_PATHS: [&str; 3] = [".env", ".env.local", "../.env"];

/// Loads the first `.env` file found. Variables already set in the process
/// environment always win.
pub fn load_env() {
    let mut loaded_env = false;
    for path in ENV_PATHS.iter() {
        if Path::new(path).exists() {
            match load_env_from_file(path) {
                Ok(count) => {
                    info!("Loaded {} environment variables from {}", count, path);
                    loaded_env = true;
                    break;
                }
                Err(e) => warn!("Failed to load environment from {}: {}", path, e),
            }
        }
    }
    if !loaded_env {
        info!("No .env file found, using environment variables from system");
    }
}

fn load_env_from_file(file_path: &str) -> Result<usize> {
    let contents = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read env file {}", file_path))?;
    let mut applied = 0;
    for (key, value) in parse_env_lines(&contents) {
        if std::env::var(&key).is_err() {
            debug!("Set env var from file: {} = {}", key, masked(&key, &value));
            std::env::set_var(&key, &value);
            applied += 1;
        }
    }
    Ok(applied)
}

/// `KEY=value` pairs from an env file, skipping comments and blank lines.
/// Surrounding quotes on values are stripped.
fn parse_env_lines(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let idx = line.find('=')?;
            let key = line[..idx].trim().trim_start_matches("export ").trim();
            if key.is_empty() {
                return None;
            }
            let value = line[idx + 1..].trim().trim_matches('"').trim_matches('\'');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn masked<'a>(key: &str, value: &'a str) -> &'a str {
    let upper = key.to_ascii_uppercase();
    if ["PASSWORD", "SECRET", "URI", "TOKEN"].iter().any(|s| upper.contains(s)) {
        "[hidden]"
    } else {
        value
    }
}
