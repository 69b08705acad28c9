use crate::config::StoreConfig;
use crate::domain::model::{GroupRecord, Student};
use crate::domain::ports::RecordStore;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

// 欄位名稱 (Airtable 表格)
const STUDENT_CODE: &str = "Código";
const STUDENT_LAST_NAME: &str = "Apellidos";
const STUDENT_FIRST_NAME: &str = "Nombres";
const STUDENT_GROUP: &str = "Grupo";
const STUDENT_ORDER: &str = "Orden";
const GROUP_NUMBER: &str = "Grupo";
const GROUP_MEMBERS: &str = "Integrantes";
const GROUP_MEMBER_COUNT: &str = "Número de integrantes";

/// Airtable's hard cap on records per page.
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct ListReply<F> {
    records: Vec<AirtableRecord<F>>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord<F> {
    id: String,
    #[serde(rename = "createdTime", default)]
    created_time: Option<DateTime<Utc>>,
    fields: F,
}

#[derive(Debug, Deserialize)]
struct StudentFields {
    #[serde(rename = "Código", default)]
    code: String,
    #[serde(rename = "Apellidos", default)]
    last_name: String,
    #[serde(rename = "Nombres", default)]
    first_name: String,
    #[serde(rename = "Grupo", default)]
    group: Vec<String>,
    #[serde(rename = "Orden", default)]
    order: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GroupFields {
    #[serde(rename = "Grupo")]
    number: u64,
    #[serde(rename = "Integrantes", default)]
    members: Vec<String>,
    #[serde(rename = "Número de integrantes", default)]
    member_count: Option<u32>,
}

#[derive(Debug, Serialize)]
struct FieldsBody<F> {
    fields: F,
}

#[derive(Debug, Serialize)]
struct OrderPatch {
    #[serde(rename = "Orden")]
    order: u32,
}

#[derive(Debug, Serialize)]
struct NewGroup<'a> {
    #[serde(rename = "Integrantes")]
    members: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: ErrorBody,
}

/// Airtable sends either `{"error": {"type", "message"}}` or `{"error": "TYPE"}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        message: String,
    },
    Bare(String),
}

impl From<AirtableRecord<StudentFields>> for Student {
    fn from(record: AirtableRecord<StudentFields>) -> Self {
        let fields = record.fields;
        Student {
            id: record.id,
            code: fields.code,
            last_name: fields.last_name,
            first_name: fields.first_name,
            group_ref: fields.group.into_iter().next(),
            order: fields.order,
        }
    }
}

impl From<AirtableRecord<GroupFields>> for GroupRecord {
    fn from(record: AirtableRecord<GroupFields>) -> Self {
        let fields = record.fields;
        GroupRecord {
            id: record.id,
            number: fields.number,
            member_count: fields
                .member_count
                .unwrap_or(fields.members.len() as u32),
            member_ids: fields.members,
        }
    }
}

struct Select<'a> {
    formula: Option<String>,
    fields: &'a [&'a str],
    max_records: usize,
}

/// [`RecordStore`] backed by the Airtable REST API.
pub struct AirtableStore {
    client: Client,
    api_url: String,
    api_key: String,
    base_key: String,
    students_table: String,
    groups_table: String,
    view: String,
}

impl AirtableStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            base_key: config.base_key.clone().unwrap_or_default(),
            students_table: config.students_table.clone(),
            groups_table: config.groups_table.clone(),
            view: config.view.clone(),
        })
    }

    fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.api_url).map_err(|e| AppError::ConfigError {
            message: format!("Invalid store API URL {}: {}", self.api_url, e),
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|_| AppError::ConfigError {
                message: format!("Store API URL cannot be a base: {}", self.api_url),
            })?;
            segments
                .pop_if_empty()
                .extend(["v0", self.base_key.as_str(), table]);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }

        Ok(url)
    }

    /// 分頁讀取，直到沒有 offset 或達到 max_records
    async fn select<F: DeserializeOwned>(
        &self,
        table: &str,
        query: Select<'_>,
    ) -> Result<Vec<AirtableRecord<F>>> {
        let url = self.table_url(table, None)?;
        let mut records: Vec<AirtableRecord<F>> = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut params: Vec<(&str, String)> = vec![
                ("view", self.view.clone()),
                ("maxRecords", query.max_records.to_string()),
                ("pageSize", query.max_records.min(PAGE_SIZE).to_string()),
            ];
            if let Some(formula) = &query.formula {
                params.push(("filterByFormula", formula.clone()));
            }
            for field in query.fields {
                params.push(("fields[]", field.to_string()));
            }
            if let Some(offset) = &offset {
                params.push(("offset", offset.clone()));
            }

            tracing::debug!("Selecting from {} (offset: {:?})", table, offset);
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .query(&params)
                .send()
                .await?;

            let page: ListReply<F> = parse_reply(response).await?;
            records.extend(page.records);

            match page.offset {
                Some(next) if records.len() < query.max_records => offset = Some(next),
                _ => break,
            }
        }

        records.truncate(query.max_records);
        Ok(records)
    }

    fn student_fields() -> [&'static str; 5] {
        [
            STUDENT_CODE,
            STUDENT_LAST_NAME,
            STUDENT_FIRST_NAME,
            STUDENT_GROUP,
            STUDENT_ORDER,
        ]
    }
}

fn ungrouped_formula() -> String {
    format!("{{{}}} = BLANK()", STUDENT_GROUP)
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

async fn parse_reply<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let (kind, message) = match serde_json::from_str::<ErrorReply>(&body) {
            Ok(ErrorReply {
                error: ErrorBody::Detailed { kind, message },
            }) => (kind, message),
            Ok(ErrorReply {
                error: ErrorBody::Bare(kind),
            }) => (kind.clone(), kind),
            Err(_) => ("UNKNOWN".to_string(), body),
        };
        tracing::warn!("Record store replied {}: {} {}", status, kind, message);
        return Err(AppError::StoreResponseError {
            status: status.as_u16(),
            kind,
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn fetch_ungrouped_students(&self, max_records: usize) -> Result<Vec<Student>> {
        let records = self
            .select::<StudentFields>(
                &self.students_table,
                Select {
                    formula: Some(ungrouped_formula()),
                    fields: &Self::student_fields(),
                    max_records,
                },
            )
            .await?;

        Ok(records.into_iter().map(Student::from).collect())
    }

    async fn find_ungrouped_student(&self, normalized_code: &str) -> Result<Option<Student>> {
        let code = normalized_code.to_lowercase();
        let formula = format!(
            "AND({}, OR(LOWER({{{field}}}) = {}, LOWER({{{field}}}) = {}))",
            ungrouped_formula(),
            quote(&code),
            quote(&format!("u{}", code)),
            field = STUDENT_CODE,
        );

        let records = self
            .select::<StudentFields>(
                &self.students_table,
                Select {
                    formula: Some(formula),
                    fields: &Self::student_fields(),
                    max_records: 1,
                },
            )
            .await?;

        Ok(records.into_iter().next().map(Student::from))
    }

    async fn annotate_student_order(&self, student_id: &str, order: u32) -> Result<()> {
        let url = self.table_url(&self.students_table, Some(student_id))?;
        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.api_key)
            .json(&FieldsBody {
                fields: OrderPatch { order },
            })
            .send()
            .await?;

        let _: AirtableRecord<StudentFields> = parse_reply(response).await?;
        Ok(())
    }

    async fn create_group(&self, member_ids: &[String]) -> Result<GroupRecord> {
        let url = self.table_url(&self.groups_table, None)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&FieldsBody {
                fields: NewGroup {
                    members: member_ids,
                },
            })
            .send()
            .await?;

        let record: AirtableRecord<GroupFields> = parse_reply(response).await?;
        tracing::debug!(
            "Created group record {} at {:?}",
            record.id,
            record.created_time
        );
        Ok(GroupRecord::from(record))
    }

    async fn list_groups(&self, max_records: usize) -> Result<Vec<GroupRecord>> {
        let records = self
            .select::<GroupFields>(
                &self.groups_table,
                Select {
                    formula: None,
                    fields: &[GROUP_NUMBER, GROUP_MEMBER_COUNT, GROUP_MEMBERS],
                    max_records,
                },
            )
            .await?;

        Ok(records.into_iter().map(GroupRecord::from).collect())
    }

    async fn fetch_students(&self, ids: &[String]) -> Result<Vec<Student>> {
        let mut students = Vec::with_capacity(ids.len());

        // 每批最多 PAGE_SIZE 個 id (filterByFormula 受 URL 長度限制)
        for chunk in ids.chunks(PAGE_SIZE) {
            let clauses: Vec<String> = chunk
                .iter()
                .map(|id| format!("RECORD_ID() = {}", quote(id)))
                .collect();

            let records = self
                .select::<StudentFields>(
                    &self.students_table,
                    Select {
                        formula: Some(format!("OR({})", clauses.join(", "))),
                        fields: &Self::student_fields(),
                        max_records: chunk.len(),
                    },
                )
                .await?;
            students.extend(records.into_iter().map(Student::from));
        }

        Ok(students)
    }
}
