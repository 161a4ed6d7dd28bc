use crate::sources::SourceClassifier;
use nova_analysis::CompileOrder;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use thiserror::Error;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter, MakeWriterExt as _};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::Layer as _;

/// Settings for incremental compilation of one project.
///
/// Loaded from TOML; every key is optional.
///
/// ```toml
/// max_errors = 50
/// compile_order = "secondary-then-primary"
/// secondary_extensions = ["java"]
///
/// [store]
/// path = "target/nova-incremental/analysis.bin"
///
/// [logging]
/// level = "nova.incremental=debug,info"
/// compile_log = "target/nova-incremental/compile.log"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncrementalConfig {
    /// Error budget handed to the primary compiler.
    #[serde(default = "IncrementalConfig::default_max_errors")]
    pub max_errors: usize,

    #[serde(default)]
    pub compile_order: CompileOrder,

    /// File extensions (without the dot) compiled by the secondary backend.
    #[serde(default = "IncrementalConfig::default_secondary_extensions")]
    pub secondary_extensions: Vec<String>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IncrementalConfig {
    fn default_max_errors() -> usize {
        100
    }

    fn default_secondary_extensions() -> Vec<String> {
        vec!["java".to_owned()]
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn classifier(&self) -> SourceClassifier {
        SourceClassifier::new(self.secondary_extensions.iter().cloned())
    }

    /// Store location, resolved against `project_root` when relative.
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            project_root.join(&self.store.path)
        }
    }
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            max_errors: Self::default_max_errors(),
            compile_order: CompileOrder::default(),
            secondary_extensions: Self::default_secondary_extensions(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_path")]
    pub path: PathBuf,
}

impl StoreConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("target/nova-incremental/analysis.bin")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to this file as well.
    ///
    /// If the file cannot be opened, file logging is disabled while other sinks
    /// remain active.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Dedicated log for compiler subsystems.
    ///
    /// When set, events emitted while a run holds the store are routed here
    /// instead of the global subscriber.
    #[serde(default)]
    pub compile_log: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// Effective filter: the configured level, with `RUST_LOG` merged in.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }

    /// Dispatcher writing to [`LoggingConfig::compile_log`], if one is configured
    /// and can be opened.
    ///
    /// Meant for [`crate::IncrementalCompiler::with_ambient_dispatch`].
    pub fn compile_log_dispatch(&self) -> Option<Dispatch> {
        let path = self.compile_log.as_ref()?;
        let file = match open_append(path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(
                    target: "nova.incremental",
                    path = %path.display(),
                    error = %err,
                    "failed to open compile log; compiler events stay on the global subscriber"
                );
                return None;
            }
        };
        let writer = MutexFileMakeWriter {
            file: Arc::new(Mutex::new(file)),
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(writer)
            .with_ansi(false);
        let dispatch = if self.json {
            Dispatch::new(builder.json().finish())
        } else {
            Dispatch::new(builder.finish())
        };
        Some(dispatch)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
            compile_log: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` embeds a snippet of the input; keep just the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

fn open_append(path: &Path) -> io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

struct MutexFileMakeWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl<'a> MakeWriter<'a> for MutexFileMakeWriter {
    type Writer = MutexFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        MutexFileWriter {
            guard: self
                .file
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }
}

struct MutexFileWriter<'a> {
    guard: std::sync::MutexGuard<'a, std::fs::File>,
}

impl Write for MutexFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global `tracing` subscriber described by `config`.
///
/// Only the first call has an effect; later calls (and calls made after some
/// other global subscriber was installed) are ignored.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let mut make_writer = if config.stderr {
            BoxMakeWriter::new(io::stderr)
        } else {
            BoxMakeWriter::new(io::sink)
        };

        let mut file_open_failed = None;
        if let Some(path) = config.file.as_ref() {
            match open_append(path) {
                Ok(file) => {
                    make_writer = BoxMakeWriter::new(make_writer.and(MutexFileMakeWriter {
                        file: Arc::new(Mutex::new(file)),
                    }));
                }
                Err(err) => file_open_failed = Some((path.clone(), err)),
            }
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            if let Some((path, err)) = file_open_failed {
                tracing::warn!(
                    target: "nova.incremental",
                    path = %path.display(),
                    error = %err,
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
}
