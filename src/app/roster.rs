//! Roster import: LMS course membership export -> roster CSV for the students table.
//!
//! The export is the JSON returned by the Blackboard Learn memberships endpoint. Only
//! usernames starting with `U` are students; everything else (instructors, preview users) is
//! dropped. Rows are written as `code,last name,first name` with no header, which is what the
//! students table import and [`crate::adapters::InMemoryStore`] expect.

use crate::utils::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub code: String,
    pub last_name: String,
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
struct MembershipPage {
    results: Vec<Membership>,
}

#[derive(Debug, Deserialize)]
struct Membership {
    user: MemberUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberUser {
    user_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    given_name: String,
}

/// Adds `https://` when no scheme is given and drops a trailing slash.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    let host = if host.starts_with("http://") || host.starts_with("https://") {
        host
    } else {
        format!("https://{}", host)
    };
    host.trim_end_matches('/').to_string()
}

/// Memberships endpoint for a course, sorted so students come out in surname order.
pub fn memberships_url(host: &str, course_id: &str) -> String {
    format!(
        "{}/learn/api/v1/courses/{}/memberships?fields=id,role,user.familyName,user.givenName,user.userName\
         &limit=50&offset=0&sort=role(asc),isPreviewStudent(asc),displayOrder(asc),\
         user.familyName(asc),user.givenName(asc),user.userName(asc)",
        normalize_host(host),
        course_id.trim()
    )
}

pub fn extract_roster(json: &[u8]) -> Result<Vec<RosterEntry>> {
    let page: MembershipPage = serde_json::from_slice(json)?;

    let entries: Vec<RosterEntry> = page
        .results
        .into_iter()
        .filter_map(|membership| {
            let user = membership.user;
            let code = user.user_name.to_uppercase();
            if !code.starts_with('U') {
                return None;
            }
            Some(RosterEntry {
                code,
                last_name: user.family_name,
                first_name: user.given_name,
            })
        })
        .collect();

    if entries.is_empty() {
        tracing::warn!("⚠️ Membership export contained no student usernames");
    }
    Ok(entries)
}

pub fn write_roster_csv<W: Write>(entries: &[RosterEntry], writer: W) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    for entry in entries {
        csv_writer.serialize(entry)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn read_roster_csv<R: Read>(reader: R) -> Result<Vec<RosterEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for row in csv_reader.deserialize() {
        let entry: RosterEntry = row?;
        if entry.code.is_empty() {
            return Err(AppError::ProcessingError {
                message: format!("Roster row {} has an empty code", entries.len() + 1),
            });
        }
        entries.push(entry);
    }
    Ok(entries)
}
