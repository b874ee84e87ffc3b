//! `autoProcessReadyTasks` flag resolution — spec §4.F "Selection".
//!
//! Environment beats persisted config, config beats the built-in default.

/// Where the resolved `autoProcessReadyTasks` value came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoProcessSource {
    Environment,
    PersistedConfig,
    Default,
}

/// Default value of `autoProcessReadyTasks` (spec §4.F).
pub const DEFAULT_AUTO_PROCESS_READY_TASKS: bool = true;

/// Resolve `autoProcessReadyTasks`: environment variable override takes
/// precedence over the persisted config value, which takes precedence
/// over the built-in default.
pub fn resolve_auto_process_ready_tasks(env_var: Option<&str>, persisted: Option<bool>) -> (bool, AutoProcessSource) {
    if let Some(raw) = env_var {
        if let Some(parsed) = parse_bool(raw) {
            return (parsed, AutoProcessSource::Environment);
        }
    }
    match persisted {
        Some(value) => (value, AutoProcessSource::PersistedConfig),
        None => (DEFAULT_AUTO_PROCESS_READY_TASKS, AutoProcessSource::Default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_persisted_config() {
        let (value, source) = resolve_auto_process_ready_tasks(Some("false"), Some(true));
        assert!(!value);
        assert_eq!(source, AutoProcessSource::Environment);
    }

    #[test]
    fn persisted_config_overrides_default() {
        let (value, source) = resolve_auto_process_ready_tasks(None, Some(false));
        assert!(!value);
        assert_eq!(source, AutoProcessSource::PersistedConfig);
    }

    #[test]
    fn falls_back_to_default() {
        let (value, source) = resolve_auto_process_ready_tasks(None, None);
        assert!(value);
        assert_eq!(source, AutoProcessSource::Default);
    }

    #[test]
    fn unparseable_environment_value_falls_through() {
        let (value, source) = resolve_auto_process_ready_tasks(Some("maybe"), Some(false));
        assert!(!value);
        assert_eq!(source, AutoProcessSource::PersistedConfig);
    }
}
