//! `exchange self-check`: load everything the line needs without running it.

use exchange_config::{FileAlarmStore, Phonebook};
use exchange_core::ExchangeConfig;
use exchange_core::clips::{ClipCatalog, Prompt};
use exchange_core::error::ExchangeError;
use exchange_hardware::DirAssets;
use exchange_traits::{Assets, PhonebookLookup};

use crate::setup::LoadedConfig;

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Prompts the line cannot work without.
const REQUIRED: [Prompt; 6] = [
    Prompt::BusyTone,
    Prompt::ErrorTone,
    Prompt::HangupClick,
    Prompt::InvalidNumber,
    Prompt::Startup,
    Prompt::SystemError,
];

fn clip_checks(loaded: &LoadedConfig, assets: &DirAssets) -> Vec<Check> {
    let xcfg = ExchangeConfig::from(&loaded.cfg);
    let catalog = ClipCatalog::new(&xcfg.clips);
    let mut checks = Vec::new();

    let dial_tone = catalog.dial_tone(assets);
    checks.push(if assets.exists(&dial_tone) {
        Check::pass("dial tone", dial_tone)
    } else {
        Check::fail("dial tone", format!("missing {dial_tone}"))
    });

    let missing: Vec<String> = REQUIRED
        .iter()
        .map(|p| catalog.path(*p))
        .filter(|c| !assets.exists(c))
        .collect();
    checks.push(if missing.is_empty() {
        Check::pass("system clips", format!("{} present", REQUIRED.len()))
    } else {
        Check::fail("system clips", format!("missing {}", missing.join(", ")))
    });

    let ringtones = assets.list(&xcfg.alarm.ringtone_folder);
    checks.push(if !ringtones.is_empty() {
        Check::pass("ringtones", format!("{} in {}", ringtones.len(), xcfg.alarm.ringtone_folder))
    } else if assets.exists(&xcfg.alarm.fallback_ringtone) {
        Check::pass("ringtones", format!("fallback {}", xcfg.alarm.fallback_ringtone))
    } else {
        Check::fail(
            "ringtones",
            format!(
                "{} is empty and {} is missing",
                xcfg.alarm.ringtone_folder, xcfg.alarm.fallback_ringtone
            ),
        )
    });
    checks
}

/// Run every check. Unlike `run`, a broken phonebook or alarm table aborts here
/// instead of degrading; missing clips are reported.
pub fn self_check(loaded: &LoadedConfig) -> eyre::Result<Vec<Check>> {
    let cfg = &loaded.cfg;
    let mut checks = vec![Check::pass("config", "valid")];

    let phonebook = match cfg.assets.phonebook.as_deref() {
        Some(p) => exchange_config::load_phonebook_csv(&loaded.resolve(p))?,
        None => Phonebook::defaults(),
    };
    checks.push(Check::pass(
        "phonebook",
        format!("{} numbers", phonebook.numbers().len()),
    ));
    if let Some(p) = cfg.assets.alarms.as_deref() {
        FileAlarmStore::open(&loaded.resolve(p))?;
    }
    checks.push(Check::pass("alarm table", "readable"));

    let root = loaded.resolve(&cfg.assets.root);
    match DirAssets::open(&root) {
        Ok(assets) => {
            checks.push(Check::pass("clip storage", assets.root().display().to_string()));
            checks.extend(clip_checks(loaded, &assets));
        }
        Err(e) => checks.push(Check::fail("clip storage", format!("unavailable: {e}"))),
    }
    Ok(checks)
}

/// Error for the first failed check, if any.
pub fn verdict(checks: &[Check]) -> eyre::Result<()> {
    match checks.iter().find(|c| !c.ok) {
        Some(c) => Err(eyre::Report::new(ExchangeError::Asset(format!(
            "{}: {}",
            c.name, c.detail
        )))),
        None => Ok(()),
    }
}

pub fn checks_json(checks: &[Check]) -> serde_json::Value {
    let items: Vec<serde_json::Value> = checks
        .iter()
        .map(|c| serde_json::json!({ "name": c.name, "ok": c.ok, "detail": c.detail }))
        .collect();
    serde_json::json!({ "ok": checks.iter().all(|c| c.ok), "checks": items })
}
