//! In-process [`RecordStore`] used by tests and by local runs seeded from a roster CSV.

use crate::app::roster::{read_roster_csv, RosterEntry};
use crate::domain::model::{GroupRecord, Student};
use crate::domain::ports::RecordStore;
use crate::domain::student_id::normalize;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    FetchUngrouped,
    FindStudent,
    AnnotateOrder,
    CreateGroup,
    ListGroups,
    FetchStudents,
}

#[derive(Debug, Default)]
struct Tables {
    students: Vec<Student>,
    groups: Vec<GroupRecord>,
    writes: usize,
    failing: HashSet<StoreOperation>,
}

impl Tables {
    fn check(&self, operation: StoreOperation) -> Result<()> {
        if self.failing.contains(&operation) {
            return Err(AppError::StoreResponseError {
                status: 503,
                kind: "SERVICE_UNAVAILABLE".to_string(),
                message: format!("{:?} is failing", operation),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                students,
                ..Tables::default()
            }),
        }
    }

    pub fn from_roster(entries: Vec<RosterEntry>) -> Self {
        let students = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                Student::new(
                    &format!("rec{}", i + 1),
                    &entry.code,
                    &entry.last_name,
                    &entry.first_name,
                )
            })
            .collect();
        Self::new(students)
    }

    pub fn from_roster_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let entries = read_roster_csv(file)?;
        tracing::info!("📋 Seeded in-memory store with {} students", entries.len());
        Ok(Self::from_roster(entries))
    }

    /// Makes every later call of `operation` fail with a store error.
    pub async fn fail_on(&self, operation: StoreOperation) {
        self.tables.lock().await.failing.insert(operation);
    }

    /// Number of successful write calls so far.
    pub async fn write_count(&self) -> usize {
        self.tables.lock().await.writes
    }

    pub async fn students(&self) -> Vec<Student> {
        self.tables.lock().await.students.clone()
    }

    pub async fn groups(&self) -> Vec<GroupRecord> {
        self.tables.lock().await.groups.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn fetch_ungrouped_students(&self, max_records: usize) -> Result<Vec<Student>> {
        let tables = self.tables.lock().await;
        tables.check(StoreOperation::FetchUngrouped)?;

        Ok(tables
            .students
            .iter()
            .filter(|s| s.is_ungrouped())
            .take(max_records)
            .cloned()
            .collect())
    }

    async fn find_ungrouped_student(&self, normalized_code: &str) -> Result<Option<Student>> {
        let tables = self.tables.lock().await;
        tables.check(StoreOperation::FindStudent)?;

        Ok(tables
            .students
            .iter()
            .find(|s| s.is_ungrouped() && normalize(&s.code) == normalized_code)
            .cloned())
    }

    async fn annotate_student_order(&self, student_id: &str, order: u32) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.check(StoreOperation::AnnotateOrder)?;

        let student = tables
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| AppError::StoreResponseError {
                status: 404,
                kind: "NOT_FOUND".to_string(),
                message: format!("Student {} not found", student_id),
            })?;
        student.order = Some(order);
        tables.writes += 1;
        Ok(())
    }

    async fn create_group(&self, member_ids: &[String]) -> Result<GroupRecord> {
        let mut tables = self.tables.lock().await;
        tables.check(StoreOperation::CreateGroup)?;

        let number = tables.groups.len() as u64 + 1;
        let record = GroupRecord {
            id: format!("grp{}", number),
            number,
            member_count: member_ids.len() as u32,
            member_ids: member_ids.to_vec(),
        };

        // 雙向連結：學生的 group_ref 指回新群組
        for student in tables.students.iter_mut() {
            if member_ids.contains(&student.id) {
                student.group_ref = Some(record.id.clone());
            }
        }
        tables.groups.push(record.clone());
        tables.writes += 1;
        Ok(record)
    }

    async fn list_groups(&self, max_records: usize) -> Result<Vec<GroupRecord>> {
        let tables = self.tables.lock().await;
        tables.check(StoreOperation::ListGroups)?;
        Ok(tables.groups.iter().take(max_records).cloned().collect())
    }

    async fn fetch_students(&self, ids: &[String]) -> Result<Vec<Student>> {
        let tables = self.tables.lock().await;
        tables.check(StoreOperation::FetchStudents)?;

        Ok(tables
            .students
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_group_links_students() {
        let store = InMemoryStore::new(vec![
            Student::new("rec1", "2020AAAAA", "Pérez", "Ana"),
            Student::new("rec2", "2021BBBBB", "Gómez", "Luis"),
        ]);

        let group = store.create_group(&["rec2".to_string()]).await.unwrap();
        assert_eq!(group.number, 1);

        let ungrouped = store.fetch_ungrouped_students(50).await.unwrap();
        assert_eq!(ungrouped.len(), 1);
        assert_eq!(ungrouped[0].id, "rec1");
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryStore::new(vec![]);
        store.fail_on(StoreOperation::ListGroups).await;

        assert!(store.list_groups(10).await.is_err());
        assert!(store.fetch_ungrouped_students(10).await.is_ok());
    }

    #[tokio::test]
    async fn test_from_roster_assigns_record_ids() {
        let store = InMemoryStore::from_roster(vec![RosterEntry {
            code: "U2020AAAAA".to_string(),
            last_name: "Pérez".to_string(),
            first_name: "Ana".to_string(),
        }]);

        let found = store.find_ungrouped_student("2020aaaaa").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some("rec1".to_string()));
    }
}
