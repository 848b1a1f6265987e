use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// SQLite database holding the evaluation dataset and receiving predictions
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// File name of the model artifact inside `artifact_input_path`
    #[serde(default = "default_model_file_name")]
    pub model_file_name: String,
    /// Width of rendered diagnostics (pixels)
    #[serde(default = "default_plot_width")]
    pub plot_width: u32,
    /// Height of rendered diagnostics (pixels)
    #[serde(default = "default_plot_height")]
    pub plot_height: u32,
    /// Number of bars shown in the feature importance chart
    #[serde(default = "default_max_importance_features")]
    pub max_importance_features: usize,
    /// TrueType font for chart labels. Common system fonts are tried when unset
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Smallest canvas the plot renderer accepts.
pub const MIN_PLOT_SIDE: u32 = 64;

fn default_database_path() -> PathBuf {
    PathBuf::from("scorecard.db")
}
fn default_model_file_name() -> String {
    "model.json".to_string()
}
fn default_plot_width() -> u32 {
    640
}
fn default_plot_height() -> u32 {
    480
}
fn default_max_importance_features() -> usize {
    10
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            model_file_name: default_model_file_name(),
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
            max_importance_features: default_max_importance_features(),
            font_path: None,
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_log_filter(),
        }
    }
}

impl EvaluatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            database_path: lookup("SCORECARD_DATABASE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            model_file_name: lookup("SCORECARD_MODEL_FILE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(default_model_file_name),
            plot_width: parsed(&lookup, "SCORECARD_PLOT_WIDTH").unwrap_or_else(default_plot_width),
            plot_height: parsed(&lookup, "SCORECARD_PLOT_HEIGHT")
                .unwrap_or_else(default_plot_height),
            max_importance_features: parsed(&lookup, "SCORECARD_MAX_IMPORTANCE_FEATURES")
                .unwrap_or_else(default_max_importance_features),
            font_path: lookup("SCORECARD_FONT")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log: LogConfig {
                json: lookup("SCORECARD_LOG_JSON")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(false),
                filter: lookup("RUST_LOG")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(default_log_filter),
            },
        }
    }

    /// Canvas size clamped to the renderer minimum.
    pub fn plot_size(&self) -> (u32, u32) {
        (
            self.plot_width.max(MIN_PLOT_SIDE),
            self.plot_height.max(MIN_PLOT_SIDE),
        )
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
