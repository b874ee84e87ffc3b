use super::*;

#[test]
fn role_id_round_trips_through_json_as_plain_string() {
    let role = RoleId::Verifier;
    let json = serde_json::to_string(&role).unwrap_or_default();
    assert_eq!(json, "\"verifier\"");
    let back: RoleId = serde_json::from_str(&json).unwrap_or(RoleId::Custom(String::new()));
    assert_eq!(back, RoleId::Verifier);
}

#[test]
fn unknown_role_strings_become_custom() {
    let role = RoleId::from_str_id("data-migrator");
    assert_eq!(role, RoleId::Custom("data-migrator".to_string()));
    assert!(!role.is_builtin());
}

#[test]
fn builtin_roles_are_recognized() {
    for (s, expected) in [
        ("orchestrator", RoleId::Orchestrator),
        ("scout", RoleId::Scout),
        ("implementer", RoleId::Implementer),
        ("verifier", RoleId::Verifier),
        ("supervisor", RoleId::Supervisor),
    ] {
        let role = RoleId::from_str_id(s);
        assert_eq!(role, expected);
        assert!(role.is_builtin());
    }
}

#[test]
fn custom_role_falls_back_to_default_capabilities() {
    let caps = Capabilities::for_builtin(&RoleId::Custom("thing".into()));
    assert!(caps.is_none());
    let fallback = Capabilities::default_custom();
    assert!(fallback.can_modify_files);
    assert!(!fallback.can_close_task);
    assert!(!fallback.can_advance_lifecycle);
    assert!(fallback.can_spawn.is_empty());
}

#[test]
fn verifier_can_close_and_advance_but_not_modify_files() {
    let caps = Capabilities::for_builtin(&RoleId::Verifier).unwrap_or_else(Capabilities::default_custom);
    assert!(caps.can_close_task);
    assert!(caps.can_advance_lifecycle);
    assert!(!caps.can_modify_files);
}

#[test]
fn orchestrator_can_spawn_only_declared_roles() {
    let caps = Capabilities::for_builtin(&RoleId::Orchestrator).unwrap_or_else(Capabilities::default_custom);
    assert!(caps.can_spawn.contains(&RoleId::Scout));
    assert!(caps.can_spawn.contains(&RoleId::Implementer));
    assert!(caps.can_spawn.contains(&RoleId::Verifier));
    assert!(!caps.can_spawn.contains(&RoleId::Orchestrator));
}
