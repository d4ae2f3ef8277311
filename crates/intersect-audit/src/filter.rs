//! Query filter for `AuditLog::list`.

use crate::entry::AuditEntry;
use chrono::{DateTime, Utc};
use intersect_core::{CircleId, IntersectionId};

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub circle_id: Option<CircleId>,
    pub intersection_id: Option<IntersectionId>,
    pub event_type: Option<String>,
    pub subject_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(circle_id) = &self.circle_id {
            if entry.circle_id.as_ref() != Some(circle_id) {
                return false;
            }
        }
        if let Some(intersection_id) = &self.intersection_id {
            if entry.intersection_id.as_ref() != Some(intersection_id) {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if &entry.event_type != event_type {
                return false;
            }
        }
        if let Some(subject_id) = &self.subject_id {
            if entry.subject_id() != Some(subject_id.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.after {
            if entry.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if entry.timestamp > before {
                return false;
            }
        }
        true
    }
}
