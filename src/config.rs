use crate::error::{Result, TrendError};
use crate::ledger::hub::RepoType;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".quality-trend.yml";

/// All settings that can be placed in a .quality-trend.yml config file.
/// Every field is optional. Omitted fields fall back to CLI defaults, and
/// CLI flags always take precedence over values set here.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrendConfig {
    // Backfill defaults (overridden by the corresponding CLI flag)
    pub branch: Option<String>,
    pub src_subdir: Option<String>,
    pub max_months: Option<usize>,
    pub report_name: Option<String>,
    pub format: Option<String>,
    pub ledger: Option<String>,

    pub scanner: Option<ScannerConfig>,
    pub cloc: Option<ClocConfig>,
    pub hub: Option<HubConfig>,
}

/// How to invoke the report scanner.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClocConfig {
    pub program: Option<String>,
    pub language: Option<String>,
}

/// Remote ledger location on the Hugging Face Hub.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    pub repo: Option<String>,
    pub file: Option<String>,
    pub branch: Option<String>,
    pub repo_type: Option<RepoType>,
    pub endpoint: Option<String>,
}

fn non_empty(field: &str, value: Option<&str>) -> std::result::Result<(), String> {
    match value {
        Some(v) if v.trim().is_empty() => Err(format!("Invalid '{field}' value: must not be empty")),
        _ => Ok(()),
    }
}

impl TrendConfig {
    /// Validates semantic constraints that serde cannot enforce.
    ///
    /// Returns a human-readable error describing what is wrong and what values
    /// are accepted. Called automatically by [`load_config`].
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(fmt) = &self.format {
            match fmt.to_ascii_lowercase().as_str() {
                "csv" | "json" | "terminal" => {}
                other => {
                    return Err(format!(
                        "Invalid 'format' value: \"{other}\". \
                         Expected one of: \"csv\", \"json\", \"terminal\""
                    ))
                }
            }
        }

        // max_months: 0 would walk nothing and silently produce an empty series
        if let Some(0) = self.max_months {
            return Err("Invalid 'max_months' value: 0. \
                 Must be 1 or greater (omit it to walk the whole history)"
                .to_string());
        }

        non_empty("branch", self.branch.as_deref())?;
        non_empty("report_name", self.report_name.as_deref())?;
        if let Some(name) = &self.report_name {
            if name.contains('/') || name.contains('\\') {
                return Err(format!(
                    "Invalid 'report_name' value: \"{name}\". Must be a file name, not a path"
                ));
            }
        }

        if let Some(scanner) = &self.scanner {
            non_empty("scanner.program", scanner.program.as_deref())?;
            if let Some(0) = scanner.timeout_secs {
                return Err("Invalid 'scanner.timeout_secs' value: 0. \
                     Must be 1 or greater (omit it to wait indefinitely)"
                    .to_string());
            }
        }

        if let Some(cloc) = &self.cloc {
            non_empty("cloc.program", cloc.program.as_deref())?;
            non_empty("cloc.language", cloc.language.as_deref())?;
        }

        if let Some(hub) = &self.hub {
            if let Some(repo) = &hub.repo {
                if repo.split('/').filter(|s| !s.is_empty()).count() != 2 {
                    return Err(format!(
                        "Invalid 'hub.repo' value: \"{repo}\". Expected \"owner/name\""
                    ));
                }
            }
            non_empty("hub.file", hub.file.as_deref())?;
            non_empty("hub.branch", hub.branch.as_deref())?;
        }

        Ok(())
    }
}

/// Reads, parses, and validates a YAML config file from `path`.
pub fn load_config(path: &Path) -> Result<TrendConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TrendError::Configuration(format!("Cannot read config file '{}': {e}", path.display()))
    })?;
    let cfg: TrendConfig = serde_yaml::from_str(&content).map_err(|e| {
        TrendError::Configuration(format!("Invalid config file '{}': {e}", path.display()))
    })?;
    cfg.validate()
        .map_err(|e| TrendError::Configuration(format!("Config file '{}': {e}", path.display())))?;
    Ok(cfg)
}

/// Loads `explicit` if given, else `.quality-trend.yml` when present, else defaults.
pub fn discover_config(explicit: Option<&Path>) -> Result<TrendConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                load_config(default)
            } else {
                Ok(TrendConfig::default())
            }
        }
    }
}

/// Hub token from the flag, then `HF_TOKEN`, then the token file written by
/// `huggingface-cli login` (under `HF_HOME`, or `~/.cache/huggingface`).
pub fn resolve_hub_token(flag: Option<&str>) -> Option<String> {
    let clean = |s: &str| Some(s.trim().to_string()).filter(|t| !t.is_empty());
    if let Some(token) = flag.and_then(clean) {
        return Some(token);
    }
    if let Some(token) = std::env::var("HF_TOKEN").ok().as_deref().and_then(clean) {
        return Some(token);
    }
    let home = std::env::var_os("HF_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache").join("huggingface")))?;
    read_token_file(&home.join("token"))
}

fn read_token_file(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(text.trim().to_string()).filter(|t| !t.is_empty())
}

/// Annotated YAML template, printed by `--generate-config`.
pub static TEMPLATE: &str = r#"# quality-trend configuration file
# Generated by: quality-trend --generate-config
#
# All settings are optional. Omit any field to use the built-in default.
# CLI flags always take precedence over values in this file.
# Save this file as .quality-trend.yml in the directory you run from, or pass
#
#   quality-trend --config path/to/file.yml backfill --repo <path>

# ── Backfill ───────────────────────────────────────────────────────────────────

# Branch whose first-parent history is sampled.
# branch: "main"

# Directory inside the repository handed to the scanner.
# src_subdir: "src"

# Stop after this many months, counting back from the current month.
# Omit to walk back to the first commit.
# max_months: 100

# File name the scanner writes each snapshot report to.
# report_name: "result.json"

# ── Output ─────────────────────────────────────────────────────────────────────

# Output format for backfill: csv, json, terminal
# format: "csv"

# Local ledger CSV to append collected records to.
# ledger: "metrics.csv"

# ── External tools ─────────────────────────────────────────────────────────────

# Invoked as: <program> <args...> <source-dir> -o <report-path>
# scanner:
#   program: "python"
#   args: ["main.py"]
#   working_dir: "../code-checker"
#   timeout_secs: 600

# Line counter. Only the given language entry is read from `cloc --json`.
# cloc:
#   program: "cloc"
#   language: "Python"

# ── Remote ledger ──────────────────────────────────────────────────────────────
# Token: --hub-token, else HF_TOKEN, else the huggingface-cli login token file.

# hub:
#   repo: "owner/space-name"
#   file: "metrics.csv"
#   branch: "main"
#   repo_type: "space"        # space, dataset, model
"#;

/// Prints the config template to stdout, or writes it to `output_path` if given.
pub fn print_template(output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => std::fs::write(path, TEMPLATE).map_err(|e| TrendError::io(path, e)),
        None => {
            print!("{TEMPLATE}");
            Ok(())
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
