//! Human-readable error descriptions and structured JSON error formatting.

/// Exit code when the line asked for a restart (dialed REBOOT).
pub const EXIT_REBOOT: i32 = 3;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use exchange_core::error::{BuildError, ExchangeError};

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSink => {
                "What happened: No audio sink was provided to the exchange.\nLikely causes: The audio backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sink is created successfully and passed via with_sink(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `exchange self-check`."
            ),
        };
    }

    if let Some(xe) = err.downcast_ref::<ExchangeError>() {
        return match xe {
            ExchangeError::Hardware(m) | ExchangeError::HardwareFault(m) => format!(
                "What happened: Hardware error ({m}).\nLikely causes: Wrong pin numbers, missing GPIO permissions, or the audio device is busy.\nHow to fix: Check [pins] in the config and that the process may access /dev/gpiomem."
            ),
            ExchangeError::Config(m) => format!(
                "What happened: Invalid configuration ({m}).\nLikely causes: A typo or out-of-range value in the TOML.\nHow to fix: Edit the config file, then rerun `exchange self-check`."
            ),
            ExchangeError::Asset(m) => format!(
                "What happened: A clip is missing ({m}).\nLikely causes: The SD card is not mounted or the clip set is incomplete.\nHow to fix: Check assets.root in the config and copy the system clips."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("phonebook csv must have headers") {
        return "Invalid headers in phonebook CSV. Expected 'number,name,kind,value,parameter'."
            .to_string();
    }

    if lower.contains("invalid phonebook row") {
        return format!(
            "What happened: The phonebook could not be loaded ({msg}).\nLikely causes: Unknown kind, empty value, non-digit or duplicate number.\nHow to fix: Correct the CSV row and rerun."
        );
    }

    if lower.contains("read config") {
        let cause = err
            .chain()
            .nth(1)
            .map(|c| format!(" Cause: {c}"))
            .unwrap_or_default();
        return format!(
            "What happened: The config file could not be loaded.{cause}\nHow to fix: Pass --config <FILE> pointing at a valid TOML file."
        );
    }

    if lower.contains("script line") {
        return format!(
            "What happened: The simulation script is invalid ({msg}).\nHow to fix: Use one command per line: pickup, hangup, dial N, button, wait MS, time HH:MM [WEEKDAY], finish."
        );
    }

    let cause = err
        .chain()
        .nth(1)
        .map(|c| format!(" Cause: {c}"))
        .unwrap_or_default();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration problems, 4 for hardware, 5 for assets, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use exchange_core::error::{BuildError, ExchangeError};

    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if let Some(xe) = err.downcast_ref::<ExchangeError>() {
        return match xe {
            ExchangeError::Config(_) => 2,
            ExchangeError::Hardware(_) | ExchangeError::HardwareFault(_) => 4,
            ExchangeError::Asset(_) => 5,
            _ => 1,
        };
    }
    1
}

/// Short machine-readable reason for the JSON error form.
fn reason_name(err: &eyre::Report) -> &'static str {
    use exchange_core::error::{BuildError, ExchangeError};

    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<ExchangeError>() {
        Some(ExchangeError::Config(_)) => "InvalidConfig",
        Some(ExchangeError::Hardware(_) | ExchangeError::HardwareFault(_)) => "Hardware",
        Some(ExchangeError::Asset(_)) => "MissingAsset",
        Some(ExchangeError::Store(_)) => "Store",
        Some(ExchangeError::Unsupported(_)) => "Unsupported",
        Some(ExchangeError::TimerOutOfRange { .. }) => "TimerOutOfRange",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_core::error::{BuildError, ExchangeError};

    #[test]
    fn build_errors_map_to_config_exit_code() {
        let err = eyre::Report::new(BuildError::InvalidConfig("poll_ms must be >= 1"));
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).contains("poll_ms must be >= 1"));
    }

    #[test]
    fn asset_errors_have_their_own_code() {
        let err = eyre::Report::new(ExchangeError::Asset("/system/busy_tone.wav".into()));
        assert_eq!(exit_code_for_error(&err), 5);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "MissingAsset");
        assert_eq!(v["exit_code"], 5);
    }

    #[test]
    fn phonebook_header_error_is_explained() {
        let err = eyre::eyre!(
            "phonebook CSV must have headers 'number,name,kind,value,parameter', got: a,b"
        );
        assert!(humanize(&err).starts_with("Invalid headers in phonebook CSV"));
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
