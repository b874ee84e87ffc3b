use super::*;

#[test]
fn default_config_matches_spec_defaults() {
    let config = Config::default();
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
    assert!(config.auto_process_ready_tasks);
}

#[test]
fn global_layer_is_overridden_by_project_layer() {
    let global = ConfigLayer { max_workers: Some(2), ..Default::default() };
    let project = ConfigLayer { max_workers: Some(8), ..Default::default() };
    let config = Config::merge(Some(global), Some(project), ConfigLayer::default()).expect("merge ok");
    assert_eq!(config.max_workers, 8);
}

#[test]
fn environment_layer_overrides_project_layer() {
    let project = ConfigLayer { poll_interval_ms: Some(2000), ..Default::default() };
    let env = ConfigLayer { poll_interval_ms: Some(5000), ..Default::default() };
    let config = Config::merge(None, Some(project), env).expect("merge ok");
    assert_eq!(config.poll_interval_ms, 5000);
}

#[test]
fn poll_interval_is_clamped_to_the_minimum() {
    let env = ConfigLayer { poll_interval_ms: Some(10), ..Default::default() };
    let config = Config::merge(None, None, env).expect("merge ok");
    assert_eq!(config.poll_interval_ms, crate::loop_::MIN_POLL_INTERVAL_MS);
}

#[test]
fn role_models_merge_per_key_across_layers() {
    let mut global_models = HashMap::new();
    global_models.insert("implementer".to_string(), "model-a".to_string());
    let global = ConfigLayer { role_models: global_models, ..Default::default() };

    let mut project_models = HashMap::new();
    project_models.insert("verifier".to_string(), "model-b".to_string());
    let project = ConfigLayer { role_models: project_models, ..Default::default() };

    let config = Config::merge(Some(global), Some(project), ConfigLayer::default()).expect("merge ok");
    assert_eq!(config.role_models.get("implementer"), Some(&"model-a".to_string()));
    assert_eq!(config.role_models.get("verifier"), Some(&"model-b".to_string()));
}

#[test]
fn invalid_thinking_level_is_rejected() {
    let env = ConfigLayer { thinking: Some("ultra".to_string()), ..Default::default() };
    assert!(Config::merge(None, None, env).is_err());
}

#[test]
fn auto_process_env_override_beats_persisted_project_config() {
    let project = ConfigLayer { auto_process_ready_tasks: Some(true), ..Default::default() };
    let env = ConfigLayer { auto_process_ready_tasks: Some(false), ..Default::default() };
    let config = Config::merge(None, Some(project), env).expect("merge ok");
    assert!(!config.auto_process_ready_tasks);
    assert_eq!(config.auto_process_source, AutoProcessSource::Environment);
}

#[test]
fn toml_layer_parses_expected_fields() {
    let raw = r#"
        poll_interval_ms = 1500
        max_workers = 6
        thinking = "high"
        tools_allowlist = ["read_file", "run_command"]
    "#;
    let layer = ConfigLayer::from_toml_str(raw).expect("parse ok");
    assert_eq!(layer.poll_interval_ms, Some(1500));
    assert_eq!(layer.max_workers, Some(6));
    assert_eq!(layer.thinking.as_deref(), Some("high"));
    assert_eq!(layer.tools_allowlist, Some(vec!["read_file".to_string(), "run_command".to_string()]));
}
