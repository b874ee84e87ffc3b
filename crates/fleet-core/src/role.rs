//! Role identity and capabilities — spec §3 and §9 ("Role polymorphism").
//!
//! The source system uses a structural `role: string`. Here built-in roles
//! are a tagged variant and anything else is an opaque custom string, so
//! behavioral decisions can switch on capabilities instead of role names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// Role identity: a fixed built-in variant, or an opaque custom role id.
///
/// Serializes as a plain string (`"verifier"`, `"my-custom-role"`) so the
/// wire format matches the source system's structural `role: string`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleId {
    Orchestrator,
    Scout,
    Implementer,
    Verifier,
    Supervisor,
    Custom(String),
}

impl Serialize for RoleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(RoleId::from_str_id(&s))
    }
}

impl RoleId {
    pub fn as_str(&self) -> &str {
        match self {
            RoleId::Orchestrator => "orchestrator",
            RoleId::Scout => "scout",
            RoleId::Implementer => "implementer",
            RoleId::Verifier => "verifier",
            RoleId::Supervisor => "supervisor",
            RoleId::Custom(s) => s.as_str(),
        }
    }

    pub fn from_str_id(s: &str) -> Self {
        match s {
            "orchestrator" => RoleId::Orchestrator,
            "scout" => RoleId::Scout,
            "implementer" => RoleId::Implementer,
            "verifier" => RoleId::Verifier,
            "supervisor" => RoleId::Supervisor,
            other => RoleId::Custom(other.to_string()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, RoleId::Custom(_))
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering hint for how a role's output should be displayed (UI concern,
/// out of scope for the core — kept as an opaque tag since the Role
/// Registry schema names it, spec §4.I).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rendering {
    Default,
    Markdown,
    Diff,
}

/// Capability set for a role — spec §3 "Role capabilities".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub category: String,
    pub rendering: Rendering,
    pub can_modify_files: bool,
    pub can_close_task: bool,
    pub can_advance_lifecycle: bool,
    pub can_spawn: BTreeSet<RoleId>,
}

impl Capabilities {
    /// Capability fallback for roles not explicitly declared (spec §3).
    pub fn default_custom() -> Self {
        Self {
            category: "implementer".to_string(),
            rendering: Rendering::Default,
            can_modify_files: true,
            can_close_task: false,
            can_advance_lifecycle: false,
            can_spawn: BTreeSet::new(),
        }
    }

    /// Built-in capability table (spec §3 + GLOSSARY role descriptions).
    pub fn for_builtin(role: &RoleId) -> Option<Self> {
        match role {
            RoleId::Orchestrator => Some(Self {
                category: "orchestrator".into(),
                rendering: Rendering::Markdown,
                can_modify_files: false,
                can_close_task: false,
                can_advance_lifecycle: false,
                can_spawn: [RoleId::Scout, RoleId::Implementer, RoleId::Verifier, RoleId::Supervisor]
                    .into_iter()
                    .collect(),
            }),
            RoleId::Scout => Some(Self {
                category: "scout".into(),
                rendering: Rendering::Markdown,
                can_modify_files: false,
                can_close_task: false,
                can_advance_lifecycle: false,
                can_spawn: BTreeSet::new(),
            }),
            RoleId::Implementer => Some(Self {
                category: "implementer".into(),
                rendering: Rendering::Diff,
                can_modify_files: true,
                can_close_task: false,
                can_advance_lifecycle: false,
                can_spawn: BTreeSet::new(),
            }),
            RoleId::Verifier => Some(Self {
                category: "verifier".into(),
                rendering: Rendering::Diff,
                can_modify_files: false,
                can_close_task: true,
                can_advance_lifecycle: true,
                can_spawn: BTreeSet::new(),
            }),
            RoleId::Supervisor => Some(Self {
                category: "supervisor".into(),
                rendering: Rendering::Default,
                can_modify_files: false,
                can_close_task: false,
                can_advance_lifecycle: false,
                can_spawn: BTreeSet::new(),
            }),
            RoleId::Custom(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
