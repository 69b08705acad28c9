use crate::domain::model::{GroupRecord, Student};
use crate::utils::error::Result;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;

/// External tabular store holding the students and groups tables.
///
/// Implementations perform no retries; every error is surfaced as-is.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Students with no group reference, in the store's default order, at most `max_records`.
    async fn fetch_ungrouped_students(&self, max_records: usize) -> Result<Vec<Student>>;

    /// The first ungrouped student whose normalized code equals `normalized_code`.
    async fn find_ungrouped_student(&self, normalized_code: &str) -> Result<Option<Student>>;

    async fn annotate_student_order(&self, student_id: &str, order: u32) -> Result<()>;

    async fn create_group(&self, member_ids: &[String]) -> Result<GroupRecord>;

    async fn list_groups(&self, max_records: usize) -> Result<Vec<GroupRecord>>;

    /// Students by record id. Unknown ids are skipped.
    async fn fetch_students(&self, ids: &[String]) -> Result<Vec<Student>>;
}

/// Source of token verification keys for the identity gate.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Key for the given key id, `Ok(None)` when no such key is published.
    async fn decoding_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>>;
}
