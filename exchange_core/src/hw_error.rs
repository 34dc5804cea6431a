//! Maps `Box<dyn Error>` from collaborator boundaries to typed `ExchangeError`.
//!
//! The traits in `exchange_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to the typed enum, with an optional feature-gated path
//! for `exchange_hardware::HwError` downcasting.

use crate::error::ExchangeError;

/// Map a collaborator error to a typed `ExchangeError`.
///
/// Known hardware error types are downcast first, then string heuristics apply.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ExchangeError {
    #[cfg(feature = "hardware-errors")]
    {
        use exchange_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::MissingAsset(path) => ExchangeError::Asset(path.clone()),
                HwError::Unsupported(what) => ExchangeError::Unsupported((*what).to_string()),
                other => ExchangeError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("not found") || lower.contains("no such file") {
        ExchangeError::Asset(s)
    } else if lower.contains("not available") || lower.contains("unsupported") {
        ExchangeError::Unsupported(s)
    } else {
        ExchangeError::Hardware(s)
    }
}

/// Log a failed sink/store command; the loop never stops on these.
pub(crate) fn log_failure(op: &'static str, e: &(dyn std::error::Error + 'static)) {
    let mapped = map_hw_error(e);
    tracing::warn!(op, error = %mapped, "collaborator command failed");
}
