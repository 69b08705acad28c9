use crate::domain::model::{GroupView, Student};
use crate::domain::ports::RecordStore;
use crate::domain::student_id::{normalize, IdFormat, StudentIdPattern};
use crate::utils::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid student ID: {id}")]
    InvalidFormat { id: String },

    #[error("Record store failure: {0}")]
    StoreFailure(#[from] AppError),
}

/// Read-only queries over the students and groups tables.
pub struct GroupDirectory {
    store: Arc<dyn RecordStore>,
    pattern: StudentIdPattern,
    list_limit: usize,
}

impl GroupDirectory {
    pub fn new(store: Arc<dyn RecordStore>, id_format: &IdFormat, list_limit: usize) -> Result<Self> {
        Ok(Self {
            store,
            pattern: id_format.compile()?,
            list_limit,
        })
    }

    /// Registered groups in store order. Members are resolved only when `detailed` is set.
    pub async fn list_groups(&self, detailed: bool) -> Result<Vec<GroupView>> {
        let records = self.store.list_groups(self.list_limit).await?;
        tracing::debug!("Listing {} groups (detailed: {})", records.len(), detailed);

        if !detailed {
            return Ok(records.iter().map(GroupView::from).collect());
        }

        let ids: Vec<String> = records
            .iter()
            .flat_map(|r| r.member_ids.iter().cloned())
            .collect();

        let students: HashMap<String, Student> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .fetch_students(&ids)
                .await?
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect()
        };

        Ok(records
            .iter()
            .map(|record| {
                let members = record
                    .member_ids
                    .iter()
                    .filter_map(|id| students.get(id).cloned())
                    .collect();
                GroupView {
                    members: Some(members),
                    ..GroupView::from(record)
                }
            })
            .collect())
    }

    /// Zero or one ungrouped student for live validation of a single identifier.
    pub async fn lookup_student(&self, raw: &str) -> std::result::Result<Vec<Student>, LookupError> {
        if !self.pattern.is_valid(raw) {
            return Err(LookupError::InvalidFormat { id: raw.to_string() });
        }

        let found = self.store.find_ungrouped_student(&normalize(raw)).await?;
        Ok(found.into_iter().collect())
    }
}
