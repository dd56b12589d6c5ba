//! `.meo/config.toml`: where the documents live and how to talk to the agent.
//!
//! The file is looked up in the working directory. `folder` is the only
//! required key; every other key falls back to a default so a config written
//! by `meo init` stays valid as new keys are added.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use meo_core::patch::MatchPolicy;
use meo_core::protocol::ContextVisibility;
use meo_core::session::SessionSettings;

/// Directory holding the config file, and inside `folder`, sessions and logs.
pub const MEO_DIR: &str = ".meo";
const CONFIG_FILE: &str = "config.toml";
const SESSIONS_DIR: &str = "sessions";
const LOG_FILE: &str = "meo.log";

const DEFAULT_AGENT_PROMPT: &str =
    "Follow the instructions in this document exactly. Output ONLY the edited text, nothing else.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Absolute path of the folder containing the markdown files.
    pub folder: PathBuf,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub context_visibility: ContextVisibility,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub patch: MatchPolicy,
}

/// External command that receives a task artifact on stdin and prints the
/// edited text on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_owned(),
            args: vec!["--print".to_owned(), DEFAULT_AGENT_PROMPT.to_owned()],
        }
    }
}

fn default_theme() -> String {
    "catppuccin-mocha".to_owned()
}

const THEMES: [&str; 2] = ["dark", "catppuccin-mocha"];

/// `<cwd>/.meo/config.toml`.
pub fn config_path(cwd: &Path) -> PathBuf {
    cwd.join(MEO_DIR).join(CONFIG_FILE)
}

impl Config {
    /// A config for `folder` with every optional key at its default.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            theme: default_theme(),
            context_visibility: ContextVisibility::default(),
            agent: AgentConfig::default(),
            patch: MatchPolicy::default(),
        }
    }

    /// Parses and validates config text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("invalid config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.folder.is_absolute() {
            bail!("folder must be an absolute path, got {}", self.folder.display());
        }
        if !THEMES.contains(&self.theme.as_str()) {
            bail!("unknown theme {:?} (expected one of: {})", self.theme, THEMES.join(", "));
        }
        if self.agent.command.trim().is_empty() {
            bail!("agent.command must not be empty");
        }
        if self.patch.search_window == 0 {
            bail!("patch.search_window must be positive");
        }
        Ok(())
    }

    /// Loads the config at `path`. A missing file points the user at `meo init`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("no config at {}; run `meo init <folder>` first", path.display())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Writes the config to `path`, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    /// `<folder>/.meo`.
    pub fn data_dir(&self) -> PathBuf {
        self.folder.join(MEO_DIR)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join(SESSIONS_DIR)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join(LOG_FILE)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            visibility: self.context_visibility,
            policy: self.patch,
        }
    }

    /// Resolves a document argument: absolute paths as given, anything else
    /// relative to `folder`.
    pub fn resolve_document(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.folder.join(file)
        }
    }

    /// The folder's `*.md` files (not recursive), sorted by name.
    pub fn markdown_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.folder)
            .with_context(|| format!("failed to read {}", self.folder.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse("folder = \"/srv/notes\"\n").unwrap();
        assert_eq!(config, Config::new("/srv/notes"));
        assert_eq!(config.agent.command, "claude");
        assert_eq!(config.agent.args[0], "--print");
        assert_eq!(config.context_visibility, ContextVisibility::FullDocument);
        assert!(config.patch.collapse_whitespace);
        assert_eq!(config.sessions_dir(), PathBuf::from("/srv/notes/.meo/sessions"));
        assert_eq!(config.log_path(), PathBuf::from("/srv/notes/.meo/meo.log"));
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
folder = "/srv/notes"
theme = "dark"
context_visibility = "adjacent-locked"

[agent]
command = "llm"
args = ["-m", "local"]

[patch]
search_window = 512
case_insensitive = true
"#;
        let config = Config::parse(text).unwrap();
        assert_eq!(config.theme, "dark");
        assert_eq!(config.context_visibility, ContextVisibility::AdjacentLocked);
        assert_eq!(config.agent.args, ["-m", "local"]);
        let settings = config.session_settings();
        assert_eq!(settings.policy.search_window, 512);
        assert!(settings.policy.case_insensitive);
        assert!(settings.policy.collapse_whitespace);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("folder = \"/srv\"\ncolour = \"red\"\n").is_err());
        assert!(Config::parse("folder = \"/srv\"\n[patch]\nfuzzy = true\n").is_err());
    }

    #[test]
    fn relative_folder_and_unknown_theme_are_rejected() {
        assert!(Config::parse("folder = \"notes\"\n").is_err());
        assert!(Config::parse("folder = \"/srv\"\ntheme = \"neon\"\n").is_err());
        assert!(Config::parse("theme = \"dark\"\n").is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = config_path(dir.path());
        let config = Config::new(dir.path());
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_config_mentions_init() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::load(&config_path(dir.path())).unwrap_err();
        assert!(err.to_string().contains("meo init"));
    }

    #[test]
    fn markdown_files_are_listed_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["b.md", "a.md", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.md")).unwrap();
        let files = Config::new(dir.path()).markdown_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.md", "b.md"]);
    }
}
