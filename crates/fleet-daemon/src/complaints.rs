//! File-level complaint registry — spec §4.G `complain`/`revoke_complaint`,
//! §4.D "On any terminal transition, the manager always revokes any
//! outstanding complaints registered by the agent."

use parking_lot::Mutex;

/// One registered complaint: a complainant flagging a set of files for a
/// reason (spec §4.G: "strings trimmed, empties dropped").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complaint {
    pub files: Vec<String>,
    pub reason: String,
    pub complainant: String,
}

fn normalize(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect()
}

/// In-memory registry of outstanding file complaints, keyed by complainant so
/// a terminal agent transition can revoke everything it registered in one
/// call.
#[derive(Default)]
pub struct ComplaintBook {
    complaints: Mutex<Vec<Complaint>>,
}

impl ComplaintBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// `complain`: register a complaint. A complainant with an empty
    /// `reason` or no surviving files after trimming registers nothing.
    pub fn register(&self, files: Vec<String>, reason: String, complainant: String) {
        let files = normalize(files);
        let reason = reason.trim().to_string();
        let complainant = complainant.trim().to_string();
        if files.is_empty() || reason.is_empty() || complainant.is_empty() {
            return;
        }
        self.complaints.lock().push(Complaint { files, reason, complainant });
    }

    /// `revoke_complaint`: drop complaints from `complainant` that mention
    /// any of `files` (empty `files` revokes all of the complainant's
    /// outstanding complaints).
    pub fn revoke(&self, files: &[String], complainant: &str) {
        let files = normalize(files.to_vec());
        let complainant = complainant.trim();
        self.complaints.lock().retain(|c| {
            if c.complainant != complainant {
                return true;
            }
            if files.is_empty() {
                return false;
            }
            !c.files.iter().any(|f| files.contains(f))
        });
    }

    /// Terminal-transition cleanup (spec §4.D): unconditionally drop every
    /// complaint registered by `complainant`.
    pub fn revoke_all_by(&self, complainant: &str) {
        self.complaints.lock().retain(|c| c.complainant != complainant);
    }

    pub fn outstanding(&self) -> Vec<Complaint> {
        self.complaints.lock().clone()
    }

    pub fn outstanding_for_file(&self, file: &str) -> Vec<Complaint> {
        self.complaints.lock().iter().filter(|c| c.files.iter().any(|f| f == file)).cloned().collect()
    }
}
