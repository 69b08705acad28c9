use serde::Serialize;

/// One enrollable person as stored in the students table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Store record id, never exposed to clients.
    #[serde(skip)]
    pub id: String,
    pub code: String,
    pub last_name: String,
    pub first_name: String,
    /// Back-reference to the owning group; `None` means ungrouped.
    #[serde(skip)]
    pub group_ref: Option<String>,
    #[serde(skip)]
    pub order: Option<u32>,
}

impl Student {
    pub fn new(id: &str, code: &str, last_name: &str, first_name: &str) -> Self {
        Self {
            id: id.to_string(),
            code: code.to_string(),
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            group_ref: None,
            order: None,
        }
    }

    pub fn is_ungrouped(&self) -> bool {
        self.group_ref.is_none()
    }
}

/// A group row as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: String,
    pub number: u64,
    pub member_count: u32,
    /// Student record ids in member order.
    pub member_ids: Vec<String>,
}

/// Result of a successful reconciliation, members resolved to full records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedGroup {
    #[serde(skip)]
    pub id: String,
    pub number: u64,
    pub member_count: u32,
    pub members: Vec<Student>,
}

/// Group as listed to clients. `members` is only filled for authenticated callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub number: u64,
    pub member_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Student>>,
}

impl From<&GroupRecord> for GroupView {
    fn from(record: &GroupRecord) -> Self {
        Self {
            number: record.number,
            member_count: record.member_count,
            members: None,
        }
    }
}
