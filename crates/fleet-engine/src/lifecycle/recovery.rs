//! Sticky verifier recovery context — spec §4.E "Sticky verifier rule".

use fleet_core::Comment;

/// Recovery context handed to a respawned verifier when the previous one
/// exited without a signal (spec §8 property 5): the previous session id
/// (if any), a summary of current task state, and up to the last six
/// verifier-authored comments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecoveryContext {
    pub previous_session_id: Option<String>,
    pub task_state_summary: String,
    pub recent_verifier_comments: Vec<String>,
}

/// Max verifier-authored comments carried into the recovery context (spec §4.E).
pub const MAX_RECOVERY_COMMENTS: usize = 6;

impl RecoveryContext {
    pub fn build(previous_session_id: Option<String>, task_state_summary: String, verifier_comments: &[Comment]) -> Self {
        let recent_verifier_comments = verifier_comments
            .iter()
            .rev()
            .take(MAX_RECOVERY_COMMENTS)
            .map(|c| c.text.clone())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Self { previous_session_id, task_state_summary, recent_verifier_comments }
    }

    /// Render as the kickoff message text handed to the respawned verifier.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(session) = &self.previous_session_id {
            out.push_str(&format!("Previous verifier session: {session}\n"));
        }
        out.push_str(&self.task_state_summary);
        if !self.recent_verifier_comments.is_empty() {
            out.push_str("\n\nRecent verifier comments:\n");
            for comment in &self.recent_verifier_comments {
                out.push_str(&format!("- {comment}\n"));
            }
        }
        out
    }
}
