use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::*;

fn role(category: &str) -> RoleDef {
    RoleDef { category: category.to_string(), rendering: "default".to_string(), ..Default::default() }
}

fn minimal_config() -> RoleConfig {
    let mut roles = IndexMap::new();
    roles.insert("orchestrator".to_string(), role("orchestrator"));
    RoleConfig { version: ROLE_CONFIG_VERSION.to_string(), profile: "default".to_string(), roles }
}

#[test]
fn rejects_unsupported_version() {
    let mut config = minimal_config();
    config.version = "2.0".to_string();
    assert_eq!(validate_role_config(&config), Err(RoleConfigError::UnsupportedVersion("2.0".to_string())));
}

#[test]
fn rejects_empty_profile() {
    let mut config = minimal_config();
    config.profile = "  ".to_string();
    assert_eq!(validate_role_config(&config), Err(RoleConfigError::EmptyProfile));
}

#[test]
fn rejects_no_roles() {
    let config = RoleConfig { version: ROLE_CONFIG_VERSION.to_string(), profile: "default".to_string(), roles: IndexMap::new() };
    assert_eq!(validate_role_config(&config), Err(RoleConfigError::NoRoles));
}

#[test]
fn rejects_can_spawn_referencing_undeclared_role() {
    let mut config = minimal_config();
    config.roles.get_mut("orchestrator").unwrap().can_spawn = ["scout".to_string()].into_iter().collect();
    assert_eq!(
        validate_role_config(&config),
        Err(RoleConfigError::UnknownSpawnTarget { role: "orchestrator".to_string(), target: "scout".to_string() })
    );
}

#[test]
fn rejects_mutual_spawn_cycle() {
    let mut roles = IndexMap::new();
    let mut a = role("a");
    a.can_spawn = ["b".to_string()].into_iter().collect();
    let mut b = role("b");
    b.can_spawn = ["a".to_string()].into_iter().collect();
    roles.insert("a".to_string(), a);
    roles.insert("b".to_string(), b);
    let config = RoleConfig { version: ROLE_CONFIG_VERSION.to_string(), profile: "default".to_string(), roles };

    assert!(matches!(validate_role_config(&config), Err(RoleConfigError::SpawnCycle(_))));
}

#[test]
fn rejects_non_positive_steering_interval() {
    let mut config = minimal_config();
    config.roles.get_mut("orchestrator").unwrap().steering = Some(SteeringConfig { interval_ms: 0 });
    assert_eq!(validate_role_config(&config), Err(RoleConfigError::InvalidSteeringInterval { role: "orchestrator".to_string() }));
}

#[test]
fn rejects_empty_extension_path() {
    let mut config = minimal_config();
    config.roles.get_mut("orchestrator").unwrap().extensions = vec![ExtensionEntry { name: "ext".to_string(), path: "  ".to_string() }];
    assert_eq!(
        validate_role_config(&config),
        Err(RoleConfigError::EmptyExtensionPath { role: "orchestrator".to_string(), index: 0 })
    );
}

#[test]
fn accepts_well_formed_config() {
    let config = minimal_config();
    assert!(validate_role_config(&config).is_ok());
}

#[test]
fn merge_layers_applies_override_chain() {
    let mut base_roles = IndexMap::new();
    base_roles.insert("implementer".to_string(), role("implementer"));
    let base = RoleConfig { version: ROLE_CONFIG_VERSION.to_string(), profile: "default".to_string(), roles: base_roles };

    let mut override_roles = IndexMap::new();
    override_roles.insert("implementer".to_string(), role("implementer-custom"));
    let overridden = RoleConfig { version: ROLE_CONFIG_VERSION.to_string(), profile: "prod".to_string(), roles: override_roles };

    let merged = merge_role_layers([base, overridden]).expect("merge present");
    assert_eq!(merged.profile, "prod");
    assert_eq!(merged.roles["implementer"].category, "implementer-custom");
}

#[test]
fn resolve_prompt_prefers_explicit_over_builtin() {
    let resolved = resolve_prompt(Some("explicit.md"), Some(Path::new("builtin.md")));
    assert_eq!(resolved, Some(PathBuf::from("explicit.md")));
    let fallback = resolve_prompt(None, Some(Path::new("builtin.md")));
    assert_eq!(fallback, Some(PathBuf::from("builtin.md")));
}

#[test]
fn resolve_extension_path_follows_priority_order() {
    let entry = ExtensionEntry { name: "ext".to_string(), path: "ext.js".to_string() };
    let mut named = HashMap::new();
    named.insert("ext".to_string(), PathBuf::from("/named/ext.js"));
    let builtin = HashMap::new();
    let cwd = Path::new("/tmp");

    let resolved = resolve_extension_path(&entry, &named, &builtin, cwd).expect("resolved");
    assert_eq!(resolved, PathBuf::from("/named/ext.js"));
}

#[test]
fn resolve_extension_path_errors_when_unresolvable() {
    let entry = ExtensionEntry { name: "missing".to_string(), path: "does/not/exist.js".to_string() };
    let named = HashMap::new();
    let builtin = HashMap::new();
    let cwd = Path::new("/tmp/nonexistent-fleet-test-dir");

    assert!(matches!(resolve_extension_path(&entry, &named, &builtin, cwd), Err(RoleConfigError::ExtensionNotFound { .. })));
}

#[test]
fn resolve_permissions_defaults_without_override() {
    let resolved = resolve_permissions(None).expect("ok");
    assert_eq!(resolved, default_permissions_allowlist());
}

#[test]
fn resolve_permissions_fails_closed_on_invalid_json() {
    assert!(resolve_permissions(Some("not json")).is_err());
}

#[test]
fn resolve_permissions_accepts_string_array_override() {
    let resolved = resolve_permissions(Some(r#"["read_file"]"#)).expect("ok");
    assert_eq!(resolved, vec!["read_file".to_string()]);
}
