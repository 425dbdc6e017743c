//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset: our crates at info, HTTP internals quieter.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn,sqlx=warn";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops). An unparsable
/// `RUST_LOG` falls back to the default filter and is reported once the
/// subscriber is installed.
pub fn init() {
    let raw = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, rejected) = select_filter(raw.as_deref());
    let active = filter.to_string();

    // JSON logs + timestamps.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();
    if !installed {
        return;
    }

    if let Some(rejected) = rejected {
        tracing::warn!(rust_log = %rejected, filter = %active, "invalid RUST_LOG ignored");
    }
    tracing::debug!(filter = %active, "tracing initialized");
}

/// Filter for a `RUST_LOG` value, plus the value itself when it was rejected.
fn select_filter(raw: Option<&str>) -> (EnvFilter, Option<String>) {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => (EnvFilter::new(DEFAULT_FILTER), None),
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_FILTER), Some(directives.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_a_no_op() {
        init();
        init();
        tracing::info!(component = "observability", "still logging after double init");
    }

    #[test]
    fn unset_or_blank_uses_default() {
        for raw in [None, Some(""), Some("   ")] {
            let (filter, rejected) = select_filter(raw);
            assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
            assert!(rejected.is_none());
        }
    }

    #[test]
    fn valid_directives_are_kept() {
        let (filter, rejected) = select_filter(Some("sitelens_infra=debug"));
        assert_eq!(filter.to_string(), "sitelens_infra=debug");
        assert!(rejected.is_none());
    }

    #[test]
    fn invalid_directives_fall_back_and_are_reported() {
        let (filter, rejected) = select_filter(Some("sitelens_infra=loud"));
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
        assert_eq!(rejected.as_deref(), Some("sitelens_infra=loud"));
    }
}
