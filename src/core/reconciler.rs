//! Group registration: turn a list of submitted student identifiers into a persisted group.
//!
//! The sequence is read-match-validate-commit against the injected [`RecordStore`]. Nothing
//! here locks the store: two concurrent calls can both match the same ungrouped student before
//! either write lands. A store with a uniqueness constraint on the group link is required to
//! make "a student belongs to at most one group" hold under concurrency.

use crate::domain::model::{CommittedGroup, Student};
use crate::domain::ports::RecordStore;
use crate::domain::student_id::{normalize, IdFormat, StudentIdPattern};
use crate::utils::error::{AppError, Result};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid group size {count}: expected between {min} and {max} students")]
    InvalidSize { count: usize, min: usize, max: usize },

    #[error("Invalid student ID: {id}")]
    InvalidFormat { id: String },

    /// Covers both unknown and already grouped identifiers.
    #[error("Only {matched} of {requested} students could be matched")]
    IncompleteMatch { requested: usize, matched: usize },

    #[error("Record store failure: {0}")]
    StoreFailure(#[source] AppError),
}

impl From<AppError> for ReconcileError {
    fn from(e: AppError) -> Self {
        ReconcileError::StoreFailure(e)
    }
}

impl ReconcileError {
    /// Whether the caller can fix the request and try again.
    pub fn is_user_correctable(&self) -> bool {
        !matches!(self, ReconcileError::StoreFailure(_))
    }
}

#[derive(Debug, Clone)]
pub struct GroupRules {
    pub min_size: usize,
    pub max_size: usize,
    pub id_format: IdFormat,
    /// Upper bound on the ungrouped snapshot read; students beyond it are not considered.
    pub snapshot_limit: usize,
}

impl Default for GroupRules {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 4,
            id_format: IdFormat::default(),
            snapshot_limit: 50,
        }
    }
}

/// A student picked from the snapshot with the 1-based position of the identifier it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentMatch {
    pub student: Student,
    pub position: u32,
}

pub struct GroupReconciler {
    store: Arc<dyn RecordStore>,
    rules: GroupRules,
    pattern: StudentIdPattern,
}

impl GroupReconciler {
    pub fn new(store: Arc<dyn RecordStore>, rules: GroupRules) -> Result<Self> {
        let pattern = rules.id_format.compile()?;
        Ok(Self {
            store,
            rules,
            pattern,
        })
    }

    pub async fn reconcile(
        &self,
        submitted: &[String],
    ) -> std::result::Result<CommittedGroup, ReconcileError> {
        let requested = submitted.len();
        self.check_size(requested)?;

        if let Some(bad) = submitted.iter().find(|id| !self.pattern.is_valid(id)) {
            return Err(ReconcileError::InvalidFormat { id: bad.clone() });
        }

        let wanted: Vec<String> = submitted.iter().map(|id| normalize(id)).collect();

        let snapshot = self
            .store
            .fetch_ungrouped_students(self.rules.snapshot_limit)
            .await?;
        tracing::debug!(
            "Matching {} identifiers against {} ungrouped students",
            requested,
            snapshot.len()
        );

        let matches = match_students(&wanted, snapshot);
        if matches.len() < requested {
            tracing::info!(
                "Group rejected: matched {} of {} submitted students",
                matches.len(),
                requested
            );
            return Err(ReconcileError::IncompleteMatch {
                requested,
                matched: matches.len(),
            });
        }

        self.commit(matches).await
    }

    fn check_size(&self, count: usize) -> std::result::Result<(), ReconcileError> {
        if count == 0 || count < self.rules.min_size || count > self.rules.max_size {
            return Err(ReconcileError::InvalidSize {
                count,
                min: self.rules.min_size,
                max: self.rules.max_size,
            });
        }
        Ok(())
    }

    /// Two writes with no transaction between them. If creating the group fails after the
    /// order annotations landed, the annotated students stay ungrouped and need manual cleanup.
    async fn commit(
        &self,
        matches: Vec<StudentMatch>,
    ) -> std::result::Result<CommittedGroup, ReconcileError> {
        for m in &matches {
            self.store
                .annotate_student_order(&m.student.id, m.position)
                .await?;
        }

        let member_ids: Vec<String> = matches.iter().map(|m| m.student.id.clone()).collect();
        let record = self.store.create_group(&member_ids).await?;

        let members: Vec<Student> = matches
            .into_iter()
            .map(|m| Student {
                group_ref: Some(record.id.clone()),
                order: Some(m.position),
                ..m.student
            })
            .collect();

        let member_count = members.len() as u32;
        if record.member_count != member_count {
            tracing::warn!(
                "⚠️ Store reports {} members for group {}, committed {}",
                record.member_count,
                record.number,
                member_count
            );
        }

        tracing::info!(
            "✅ Registered group {} with {} members",
            record.number,
            member_count
        );

        Ok(CommittedGroup {
            id: record.id,
            number: record.number,
            member_count,
            members,
        })
    }
}

/// Scans `snapshot` in store order and stops once every submitted identifier could be covered.
/// The result is ordered by submission position.
pub fn match_students(wanted: &[String], snapshot: Vec<Student>) -> Vec<StudentMatch> {
    let mut matches = Vec::with_capacity(wanted.len());

    for student in snapshot {
        if matches.len() == wanted.len() {
            break;
        }

        let code = normalize(&student.code);
        if let Some(index) = wanted.iter().position(|w| *w == code) {
            matches.push(StudentMatch {
                student,
                position: index as u32 + 1,
            });
        }
    }

    matches.sort_by_key(|m| m.position);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Vec<Student> {
        vec![
            Student::new("rec1", "2020AAAAA", "Pérez", "Ana"),
            Student::new("rec2", "U2021BBBBB", "Gómez", "Luis"),
            Student::new("rec3", "2022CCCCC", "Rojas", "Carla"),
        ]
    }

    fn wanted(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| normalize(id)).collect()
    }

    #[test]
    fn test_match_orders_by_submission() {
        let matches = match_students(&wanted(&["2022ccccc", "u2020aaaaa"]), snapshot());

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].student.id, "rec3");
        assert_eq!(matches[0].position, 1);
        assert_eq!(matches[1].student.id, "rec1");
        assert_eq!(matches[1].position, 2);
    }

    #[test]
    fn test_match_stops_at_requested_count() {
        let mut students = snapshot();
        // 重複的代碼不應超過請求數量
        students.push(Student::new("rec4", "2020aaaaa", "Pérez", "Ana"));

        let matches = match_students(&wanted(&["2020AAAAA"]), students);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].student.id, "rec1");
    }

    #[test]
    fn test_duplicate_submissions_fall_short() {
        let matches = match_students(&wanted(&["2020AAAAA", "U2020AAAAA"]), snapshot());
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_error_correctability() {
        assert!(ReconcileError::IncompleteMatch {
            requested: 2,
            matched: 1
        }
        .is_user_correctable());
        assert!(!ReconcileError::StoreFailure(AppError::ProcessingError {
            message: "down".to_string()
        })
        .is_user_correctable());
    }
}
