//! Configuration types for the chat application.
//!
//! Configuration comes from three places, resolved once at startup into a [`ChatConfig`]:
//!
//! - command-line arguments, parsed via `arrrg` into [`ChatArgs`];
//! - an optional JSON settings file holding the palette and the `showstats` flag;
//! - the environment, which names the model (`GEMINI_MODEL`) and the settings file
//!   (`CLOFF_CONFIG`), optionally seeded from a `.env` file by [`load_env_file`].
//!
//! A missing settings file is not an error unless `--config` named it.  A settings file that exists but is malformed or
//! lacks a required field is fatal.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::chat::conversation::{DEFAULT_GREETING, DEFAULT_PERSONA};
use crate::error::{Error, Result};

/// Settings file used when neither `--config` nor `CLOFF_CONFIG` names one.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable naming the model.
pub const MODEL_VARIABLE: &str = "GEMINI_MODEL";

/// Environment variable naming the settings file.
pub const CONFIG_VARIABLE: &str = "CLOFF_CONFIG";

/// Default idle timeout between reply fragments.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Key of the persisted timing-statistics flag.
const SHOW_STATS_KEY: &str = "showstats";

/// Command-line arguments for cloff.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path of the JSON settings file.
    #[arrrg(optional, "Settings file (default: $CLOFF_CONFIG or config.json)", "PATH")]
    pub config: Option<String>,

    /// Model to chat with.
    #[arrrg(optional, "Model to use (default: $GEMINI_MODEL)", "MODEL")]
    pub model: Option<String>,

    /// Seconds to wait for each reply fragment.
    #[arrrg(optional, "Seconds to wait for each reply fragment (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// A 24-bit color, stored in the settings file as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Wrap `text` in the ANSI escape sequence for this color.
    pub fn paint(self, text: &str) -> String {
        let Rgb(r, g, b) = self;
        format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m")
    }
}

/// Colors of one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColors {
    /// Color of the `[tag]`.
    pub tag: Rgb,
    /// Color of the message text.
    pub text: Rgb,
}

/// Colors of both conversational roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    /// The assistant.
    pub cloff: RoleColors,
    /// The human.
    pub human: RoleColors,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            cloff: RoleColors {
                tag: Rgb(97, 175, 239),
                text: Rgb(220, 223, 228),
            },
            human: RoleColors {
                tag: Rgb(152, 195, 121),
                text: Rgb(255, 255, 255),
            },
        }
    }
}

/// Process-lifetime display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Print elapsed time after each reply.
    pub show_stats: bool,
    /// Emit ANSI colors.
    pub use_color: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_stats: false,
            use_color: true,
        }
    }
}

/// The settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Assistant colors.
    pub cloff: RoleColors,
    /// Human colors.
    pub human: RoleColors,
    /// Print elapsed time after each reply.
    pub showstats: bool,
    /// Overrides the persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    /// Overrides the greeting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    /// Overrides the idle timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl SettingsFile {
    /// Load the settings file at `path`.  Returns `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::config(
                    format!("cannot read {}: {err}", path.display()),
                    None,
                ));
            }
        };
        let file: Self = serde_json::from_str(&text).map_err(|err| {
            Error::config(
                format!("invalid settings file {}: {err}", path.display()),
                None,
            )
        })?;
        if file.timeout_secs == Some(0) {
            return Err(Error::config(
                format!("invalid settings file {}", path.display()),
                Some("timeout_secs".to_string()),
            ));
        }
        Ok(Some(file))
    }
}

/// Load `KEY=value` lines from the env file at `path` into the process environment.
///
/// Variables already set are left alone.  Returns `Ok(false)` when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(Error::config(
            format!("invalid env file {}: {err}", path.display()),
            None,
        )),
    }
}

/// Write `show_stats` into the settings file at `path`, keeping every other key.
///
/// The file must already exist; a missing file is reported as an I/O error so the caller can
/// keep the setting for the session only.
pub fn persist_show_stats(path: &Path, show_stats: bool) -> Result<()> {
    let text = fs::read_to_string(path)
        .map_err(|err| Error::io(format!("cannot read {}", path.display()), err))?;
    let mut value: serde_json::Value = serde_json::from_str(&text)?;
    let Some(object) = value.as_object_mut() else {
        return Err(Error::config(
            format!("{} does not hold a JSON object", path.display()),
            None,
        ));
    };
    object.insert(SHOW_STATS_KEY.to_string(), show_stats.into());
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    fs::write(path, text).map_err(|err| Error::io(format!("cannot write {}", path.display()), err))
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// The model identifier.
    pub model: String,
    /// The persona sent as the system message.
    pub persona: String,
    /// The assistant's opening line.
    pub greeting: String,
    /// Role colors.
    pub palette: Palette,
    /// Display settings.
    pub settings: Settings,
    /// Where `stats` persists the timing flag.
    pub settings_path: Option<PathBuf>,
    /// How long to wait for each reply fragment.
    pub timeout: Duration,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            persona: DEFAULT_PERSONA.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            palette: Palette::default(),
            settings: Settings::default(),
            settings_path: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolve arguments, the process environment and the settings file.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        Self::resolve(
            args,
            env::var(MODEL_VARIABLE).ok(),
            env::var(CONFIG_VARIABLE).ok(),
        )
    }

    /// Resolve arguments against explicit environment values and the settings file.
    pub fn resolve(
        args: ChatArgs,
        env_model: Option<String>,
        env_config: Option<String>,
    ) -> Result<Self> {
        let model = args
            .model
            .or(env_model)
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    format!("no model given; pass --model or set {MODEL_VARIABLE}"),
                    Some("model".to_string()),
                )
            })?;
        if args.timeout_secs == Some(0) {
            return Err(Error::config(
                "--timeout-secs must be positive",
                Some("timeout_secs".to_string()),
            ));
        }

        let explicit = args.config.is_some();
        let path = PathBuf::from(
            args.config
                .or(env_config)
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
        );
        let mut config = Self::new(model).with_settings_path(Some(path.clone()));
        match SettingsFile::load(&path)? {
            Some(file) => {
                tracing::debug!(path = %path.display(), "loaded settings");
                config.palette = Palette {
                    cloff: file.cloff,
                    human: file.human,
                };
                config.settings.show_stats = file.showstats;
                if let Some(persona) = file.persona {
                    config.persona = persona;
                }
                if let Some(greeting) = file.greeting {
                    config.greeting = greeting;
                }
                if let Some(secs) = file.timeout_secs {
                    config.timeout = Duration::from_secs(secs);
                }
            }
            None if explicit => {
                return Err(Error::config(
                    format!("settings file {} does not exist", path.display()),
                    Some("config".to_string()),
                ));
            }
            None => {
                tracing::info!(path = %path.display(), "no settings file; using defaults");
                config.settings_path = None;
            }
        }
        if let Some(secs) = args.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if args.no_color {
            config = config.without_color();
        }
        Ok(config)
    }

    /// Sets the persona.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Sets the greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the palette.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Sets whether timing statistics are shown.
    pub fn with_show_stats(mut self, show_stats: bool) -> Self {
        self.settings.show_stats = show_stats;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.settings.use_color = false;
        self
    }

    /// Sets the settings file path.
    pub fn with_settings_path(mut self, path: Option<PathBuf>) -> Self {
        self.settings_path = path;
        self
    }

    /// Sets the idle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SETTINGS: &str = r#"{
        "cloff": {"tag": [1, 2, 3], "text": [4, 5, 6]},
        "human": {"tag": [7, 8, 9], "text": [10, 11, 12]},
        "showstats": true,
        "theme": "kept"
    }"#;

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn args_for(path: &Path) -> ChatArgs {
        ChatArgs {
            config: Some(path.to_string_lossy().into_owned()),
            ..ChatArgs::default()
        }
    }

    #[test]
    fn default_config() {
        let config = ChatConfig::new("gemini-2.0-flash");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.persona, DEFAULT_PERSONA);
        assert_eq!(config.greeting, DEFAULT_GREETING);
        assert_eq!(config.palette, Palette::default());
        assert!(!config.settings.show_stats);
        assert!(config.settings.use_color);
        assert!(config.settings_path.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new("m")
            .with_persona("p")
            .with_greeting("g")
            .with_show_stats(true)
            .without_color()
            .with_settings_path(Some(PathBuf::from("settings.json")))
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.persona, "p");
        assert_eq!(config.greeting, "g");
        assert!(config.settings.show_stats);
        assert!(!config.settings.use_color);
        assert_eq!(config.settings_path, Some(PathBuf::from("settings.json")));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn rgb_paints_truecolor() {
        assert_eq!(Rgb(1, 2, 3).paint("x"), "\x1b[38;2;1;2;3mx\x1b[0m");
    }

    #[test]
    fn resolve_reads_settings_file() {
        let file = settings_file(SETTINGS);
        let config = ChatConfig::resolve(args_for(file.path()), Some("m".to_string()), None).unwrap();
        assert_eq!(config.model, "m");
        assert_eq!(config.palette.cloff.tag, Rgb(1, 2, 3));
        assert_eq!(config.palette.human.text, Rgb(10, 11, 12));
        assert!(config.settings.show_stats);
        assert_eq!(config.settings_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn resolve_without_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let env_config = Some(path.to_string_lossy().into_owned());
        let config =
            ChatConfig::resolve(ChatArgs::default(), Some("m".to_string()), env_config).unwrap();
        assert_eq!(config.palette, Palette::default());
        assert!(!config.settings.show_stats);
        assert!(config.settings_path.is_none());
    }

    #[test]
    fn resolve_prefers_argument_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let args = ChatArgs {
            model: Some("from-args".to_string()),
            timeout_secs: Some(9),
            no_color: true,
            ..ChatArgs::default()
        };
        let env_config = Some(dir.path().join("absent.json").to_string_lossy().into_owned());
        let config =
            ChatConfig::resolve(args, Some("from-env".to_string()), env_config).unwrap();
        assert_eq!(config.model, "from-args");
        assert_eq!(config.timeout, Duration::from_secs(9));
        assert!(!config.settings.use_color);
    }

    #[test]
    fn resolve_uses_config_variable() {
        let file = settings_file(SETTINGS);
        let env_config = Some(file.path().to_string_lossy().into_owned());
        let config =
            ChatConfig::resolve(ChatArgs::default(), Some("m".to_string()), env_config).unwrap();
        assert!(config.settings.show_stats);
    }

    #[test]
    fn missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChatConfig::resolve(args_for(&dir.path().join("absent.json")), None, None)
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(MODEL_VARIABLE));
    }

    #[test]
    fn missing_explicit_settings_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.json");
        let err = ChatConfig::resolve(args_for(&path), Some("m".to_string()), None).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("typo.json"));
    }

    #[test]
    fn env_file_fills_unset_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "CLOFF_ENV_FILE_TEST_MODEL=from-env-file\n").unwrap();
        assert!(load_env_file(&path).unwrap());
        assert_eq!(
            env::var("CLOFF_ENV_FILE_TEST_MODEL").as_deref(),
            Ok("from-env-file")
        );
    }

    #[test]
    fn missing_env_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!load_env_file(&dir.path().join(".env")).unwrap());
    }

    #[test]
    fn malformed_env_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "NOT A VALID LINE\n").unwrap();
        assert!(load_env_file(&path).unwrap_err().is_config());
    }

    #[test]
    fn missing_field_is_fatal() {
        let file = settings_file(r#"{"cloff": {"tag": [1, 2, 3], "text": [4, 5, 6]}, "showstats": false}"#);
        let err = ChatConfig::resolve(args_for(file.path()), Some("m".to_string()), None)
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("human"));
    }

    #[test]
    fn malformed_file_is_fatal() {
        let file = settings_file("{not json");
        let err = ChatConfig::resolve(args_for(file.path()), Some("m".to_string()), None)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn out_of_range_color_is_fatal() {
        let file = settings_file(
            r#"{"cloff": {"tag": [256, 0, 0], "text": [0, 0, 0]},
                "human": {"tag": [0, 0, 0], "text": [0, 0, 0]},
                "showstats": false}"#,
        );
        let err = ChatConfig::resolve(args_for(file.path()), Some("m".to_string()), None)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn persist_keeps_other_keys() {
        let file = settings_file(SETTINGS);
        persist_show_stats(file.path(), false).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(value["showstats"], false);
        assert_eq!(value["theme"], "kept");
        assert_eq!(value["cloff"]["tag"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn persist_to_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = persist_show_stats(&dir.path().join("absent.json"), true).unwrap_err();
        assert!(err.is_not_found_io());
    }
}
