/// Layered configuration.
///
/// Settings are assembled from several sources, each one overriding the
/// previous field by field:
///
///   1. Built-in defaults ([`Config::default`])
///   2. The user config file, `<config dir>/dotcomplete/config.toml`
///   3. The workspace file, `<workspace root>/.dotcomplete.toml`
///   4. LSP `initializationOptions` / `workspace/didChangeConfiguration`
///   5. Command line flags
///
/// Every source is parsed into a [`ConfigLayer`] whose fields are all
/// optional, so a layer only overrides what it actually mentions.
///
/// ```toml
/// languages = ["java", "jsp"]
///
/// [oracle]
/// command = "java -cp lib/oracle.jar CompletionOracle"
/// working_dir = "/path/to/project"
/// timeout_secs = 5
///
/// [resolution]
/// builtin_package = "java.lang.*"
/// ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::BaseStrategy;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::oracle::DEFAULT_TIMEOUT;

/// File name looked up at the workspace root.
pub const WORKSPACE_CONFIG_FILE: &str = ".dotcomplete.toml";

/// Key under which LSP clients may nest the settings object.
pub const SETTINGS_SECTION: &str = "dotcomplete";

/// Settings for launching and talking to the oracle process.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    /// Shell command line that starts the oracle.  `None` disables member
    /// completion.
    pub command: Option<String>,
    /// Directory the oracle is started in.
    pub working_dir: Option<PathBuf>,
    /// Per-line read timeout.
    pub timeout: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            command: None,
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Settings for type resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionSettings {
    /// Wildcard import every file gets implicitly.
    pub builtin_package: String,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            builtin_package: "java.lang.*".to_string(),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub oracle: OracleSettings,
    pub resolution: ResolutionSettings,
    /// LSP language ids member completion is offered for.
    pub languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oracle: OracleSettings::default(),
            resolution: ResolutionSettings::default(),
            languages: vec!["java".to_string(), "jsp".to_string()],
        }
    }
}

impl Config {
    /// Build the configuration from the files on disk.
    ///
    /// `explicit` is a config file named on the command line; it is read
    /// after the user and workspace files.
    pub fn load(workspace_root: Option<&Path>, explicit: Option<&Path>) -> Self {
        let mut config = Self::default();
        if let Some(path) = user_config_path() {
            config.apply_file(&path);
        }
        if let Some(root) = workspace_root {
            config.apply_file(&root.join(WORKSPACE_CONFIG_FILE));
        }
        if let Some(path) = explicit {
            config.apply_file(path);
        }
        config
    }

    /// Override every field `layer` sets.
    pub fn apply(&mut self, layer: &ConfigLayer) {
        if let Some(command) = &layer.oracle.command {
            let command = command.trim();
            self.oracle.command = (!command.is_empty()).then(|| command.to_string());
        }
        if let Some(dir) = &layer.oracle.working_dir {
            self.oracle.working_dir = Some(dir.clone());
        }
        if let Some(secs) = layer.oracle.timeout_secs
            && secs.is_finite()
            && secs > 0.0
        {
            self.oracle.timeout = Duration::from_secs_f64(secs);
        }
        if let Some(package) = &layer.resolution.builtin_package {
            self.resolution.builtin_package = package.clone();
        }
        if let Some(languages) = &layer.languages {
            self.languages = languages.clone();
        }
    }

    /// Apply the TOML file at `path` if it exists.  Malformed files are
    /// logged and skipped.
    pub fn apply_file(&mut self, path: &Path) {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        match ConfigLayer::from_toml(&content) {
            Ok(layer) => {
                debug!(path = %path.display(), "loaded config file");
                self.apply(&layer);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring malformed config file"),
        }
    }

    pub fn supports_language(&self, language_id: &str) -> bool {
        self.languages.iter().any(|l| l == language_id)
    }
}

/// One source of settings.  Absent fields leave the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub oracle: OracleLayer,
    pub resolution: ResolutionLayer,
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OracleLayer {
    pub command: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolutionLayer {
    pub builtin_package: Option<String>,
}

impl ConfigLayer {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read a layer from LSP settings JSON.
    ///
    /// Accepts both the bare settings object and one nested under a
    /// `"dotcomplete"` key.  Returns `None` for `null` or unparsable input.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let value = value.get(SETTINGS_SECTION).unwrap_or(value);
        match serde_json::from_value(value.clone()) {
            Ok(layer) => Some(layer),
            Err(e) => {
                warn!(error = %e, "ignoring malformed client settings");
                None
            }
        }
    }
}

/// `<config dir>/dotcomplete/config.toml`, following the platform's
/// conventions (XDG on Linux).
pub fn user_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("dotcomplete").join("config.toml"))
}
