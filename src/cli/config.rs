use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::fill::apply::ApplyOptions;
use crate::host::session::DEFAULT_HOST_SCRIPT;
use crate::mapping::collaborator::DEFAULT_MAPPING_ENDPOINT;
use crate::scan::locate::DEFAULT_CUSTOM_QUESTION_PREFIX;

pub const DEFAULT_CONFIG_PATH: &str = "page-autofill.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "page-autofill",
    version,
    about = "Extract form fields from a web page and fill them in place"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: page-autofill.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Append a JSONL run trace to this file
    #[arg(long, global = true)]
    pub trace: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan an HTML snapshot and print its field model
    Extract {
        /// Saved page markup
        #[arg(long)]
        html: String,

        /// Output format: json, console
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Dry-run an assignment map against a saved page
    Apply {
        /// Saved page markup
        #[arg(long)]
        html: String,

        /// JSON object of selector -> value
        #[arg(long)]
        assignments: String,

        /// File (path or URL) to attach to the page's file controls
        #[arg(long)]
        attach: Option<String>,
    },

    /// Fill the active page of a live browser through the host helper
    Fill {
        /// JSON object of selector -> value
        #[arg(long, conflicts_with = "resume", required_unless_present = "resume")]
        assignments: Option<String>,

        /// Resume JSON sent to the mapping service with the page's fields
        #[arg(long)]
        resume: Option<String>,

        /// Mapping service endpoint
        #[arg(long)]
        mapping_endpoint: Option<String>,

        /// Node host helper script
        #[arg(long)]
        host_script: Option<String>,

        /// File (path or URL) to attach to the page's file controls
        #[arg(long)]
        attach: Option<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `page-autofill.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub apply: ApplyConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_host_script")]
    pub script: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            script: default_host_script(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConfig {
    #[serde(default = "default_prefix")]
    pub custom_question_prefix: String,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            custom_question_prefix: default_prefix(),
        }
    }
}

impl ApplyConfig {
    pub fn options(&self) -> ApplyOptions {
        ApplyOptions {
            custom_question_prefix: self.custom_question_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TraceConfig {
    pub path: Option<String>,
}

// Serde default helpers
fn default_host_script() -> String { DEFAULT_HOST_SCRIPT.to_string() }
fn default_endpoint() -> String { DEFAULT_MAPPING_ENDPOINT.to_string() }
fn default_prefix() -> String { DEFAULT_CUSTOM_QUESTION_PREFIX.to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content),
        Err(_) => AppConfig::default(),
    }
}

pub fn parse_config(content: &str) -> AppConfig {
    serde_yaml::from_str(content).unwrap_or_default()
}

/// CLI value if given, else the config file's.
pub fn resolve<'a>(cli: Option<&'a str>, config: &'a str) -> &'a str {
    cli.unwrap_or(config)
}
