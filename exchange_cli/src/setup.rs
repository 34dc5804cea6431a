//! Config loading, logging and collaborator wiring shared by the subcommands.

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use exchange_config::{
    Config, FileAlarmStore, HourRangeNightSchedule, Logging, MemoryVolumeStore, Phonebook,
};
use exchange_core::error::ExchangeError;
use exchange_core::{Exchange, ExchangeBuilder, ExchangeConfig, Missing};
use exchange_hardware::DirAssets;

use crate::cli::FILE_GUARD;

/// Parsed and validated config plus the directory relative paths resolve against.
#[derive(Debug)]
pub struct LoadedConfig {
    pub cfg: Config,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    /// Absolute paths are kept, relative ones are taken from the config file's directory.
    pub fn resolve(&self, p: &str) -> PathBuf {
        let path = Path::new(p);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

pub fn load_config(path: &Path) -> eyre::Result<LoadedConfig> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = exchange_config::load_toml(&text).map_err(|e| {
        ExchangeError::Config(format!("parse config {}: {}", path.display(), e.message()))
    })?;
    cfg.validate()
        .map_err(|e| ExchangeError::Config(e.to_string()))?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(LoadedConfig { cfg, base_dir })
}

/// Console layer on stderr (pretty or JSON), plus an optional JSON file layer from `[logging]`.
pub fn init_tracing(json: bool, level: &str, logging: Option<(&Logging, &LoadedConfig)>) {
    use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some((log_cfg, loaded)) = logging
        && let Some(file) = log_cfg.file.as_deref()
    {
        let path = loaded.resolve(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = path
            .file_name()
            .map_or_else(|| "exchange.log".into(), |n| n.to_os_string());
        let appender = match log_cfg.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = log_cfg.level.as_deref().unwrap_or("info");
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(file_level))
                .boxed(),
        );
    }

    // A second init (tests, re-entry) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(layers).try_init();
}

/// Collaborators loaded from disk. `degraded` is set when the clip storage is unusable.
pub struct Stores {
    pub phonebook: Phonebook,
    pub alarms: FileAlarmStore,
    pub assets: Option<DirAssets>,
    pub degraded: Option<String>,
}

/// Load failures never stop the line: each falls back to a harmless default and
/// the reason ends up in `degraded`.
pub fn open_stores(loaded: &LoadedConfig) -> eyre::Result<Stores> {
    let cfg = &loaded.cfg;
    let mut faults: Vec<String> = Vec::new();

    let phonebook = match cfg.assets.phonebook.as_deref() {
        Some(p) => {
            let path = loaded.resolve(p);
            exchange_config::load_phonebook_csv(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "phonebook unavailable");
                faults.push(format!("phonebook unavailable: {e}"));
                Phonebook::defaults()
            })
        }
        None => {
            tracing::info!("no phonebook configured, using factory entries");
            Phonebook::defaults()
        }
    };
    let alarms = match cfg.assets.alarms.as_deref() {
        Some(p) => {
            let path = loaded.resolve(p);
            FileAlarmStore::open(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "alarm table unavailable");
                faults.push(format!("alarm table unavailable: {e}"));
                FileAlarmStore::in_memory()
            })
        }
        None => FileAlarmStore::in_memory(),
    };
    let root = loaded.resolve(&cfg.assets.root);
    let assets = match DirAssets::open(&root) {
        Ok(a) => {
            tracing::info!(root = %root.display(), "clip storage mounted");
            Some(a)
        }
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "clip storage unavailable");
            faults.push(format!("clip storage unavailable: {e}"));
            None
        }
    };
    let degraded = (!faults.is_empty()).then(|| faults.join("; "));
    Ok(Stores {
        phonebook,
        alarms,
        assets,
        degraded,
    })
}

/// Builder with config and every store wired; only the sink (and clocks) remain.
pub fn exchange_builder(cfg: &Config, stores: Stores) -> ExchangeBuilder<Missing> {
    let mut b = Exchange::builder()
        .with_config(ExchangeConfig::from(cfg))
        .with_phonebook(stores.phonebook)
        .with_alarm_store(stores.alarms)
        .with_volumes(MemoryVolumeStore::new(cfg.volume.handset, cfg.volume.speaker))
        .with_night_schedule(HourRangeNightSchedule {
            enabled: cfg.night.enabled,
            start_hour: cfg.night.start_hour,
            end_hour: cfg.night.end_hour,
        });
    if let Some(assets) = stores.assets {
        b = b.with_assets(assets);
    }
    if let Some(reason) = stores.degraded {
        b = b.degraded(reason);
    }
    b
}
