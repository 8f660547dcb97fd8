//! Export of a finished session's jobs.
//!
//! Two deterministic encodings over the same field set:
//! - `structured`: JSON array of objects, fields in [`COLUMNS`] order
//! - `tabular`: RFC 4180 CSV, header row then one row per job
//!
//! `json` is accepted for `structured`; `csv` and `excel` for `tabular`.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, ExportError};
use crate::manager::SessionManager;
use crate::types::{job::JobRecord, result::SessionResult, site::SiteId};

/// Field order shared by both encodings.
pub const COLUMNS: [&str; 8] = [
    "site",
    "title",
    "company",
    "location",
    "salary",
    "url",
    "employmentType",
    "description",
];

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Structured,
    Tabular,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Structured => "application/json",
            Self::Tabular => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Structured => "json",
            Self::Tabular => "csv",
        }
    }

    /// `jobs_<first 8 of session id>_<yyyymmdd>.<ext>`
    pub fn file_name(&self, session_id: Uuid) -> String {
        let short = session_id.simple().to_string();
        format!(
            "jobs_{}_{}.{}",
            &short[..8],
            Utc::now().format("%Y%m%d"),
            self.extension()
        )
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => f.write_str("structured"),
            Self::Tabular => f.write_str("tabular"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "json" => Ok(Self::Structured),
            "tabular" | "csv" | "excel" => Ok(Self::Tabular),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Rendered export ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRow<'a> {
    site: SiteId,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    salary: &'a str,
    url: Option<&'a str>,
    employment_type: Option<&'a str>,
    description: Option<&'a str>,
}

impl<'a> ExportRow<'a> {
    fn new(site: SiteId, job: &'a JobRecord) -> Self {
        Self {
            site,
            title: &job.title,
            company: &job.company,
            location: &job.location,
            salary: &job.salary,
            url: job.url.as_deref(),
            employment_type: job.employment_type.as_deref(),
            description: job.description.as_deref(),
        }
    }

    fn cells(&self) -> [&str; 8] {
        [
            self.site.as_str(),
            self.title,
            self.company,
            self.location,
            self.salary,
            self.url.unwrap_or_default(),
            self.employment_type.unwrap_or_default(),
            self.description.unwrap_or_default(),
        ]
    }
}

/// Renders session results for download.
#[derive(Clone)]
pub struct ExportService {
    manager: SessionManager,
}

impl ExportService {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Export a terminal session in the requested format.
    pub fn export(&self, session_id: Uuid, format: &str) -> Result<ExportPayload, EngineError> {
        let format: ExportFormat = format.parse()?;
        let result = self
            .manager
            .result(session_id)?
            .ok_or(ExportError::SessionNotComplete)?;

        let bytes = Self::render(&result, format)?;
        Ok(ExportPayload {
            bytes,
            content_type: format.content_type(),
            file_name: format.file_name(session_id),
        })
    }

    /// Encode a session result. Pure and deterministic.
    pub fn render(result: &SessionResult, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        let rows: Vec<ExportRow<'_>> = result
            .jobs()
            .map(|(site, job)| ExportRow::new(site, job))
            .collect();

        match format {
            ExportFormat::Structured => Ok(serde_json::to_vec_pretty(&rows)?),
            ExportFormat::Tabular => Ok(render_csv(&rows).into_bytes()),
        }
    }
}

fn render_csv(rows: &[ExportRow<'_>]) -> String {
    let mut out = String::new();
    push_csv_line(&mut out, COLUMNS);
    for row in rows {
        push_csv_line(&mut out, row.cells());
    }
    out
}

fn push_csv_line(out: &mut String, cells: [&str; 8]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\r', '\n']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::result::{ScrapeResult, SessionStatus};
    use std::time::Duration;

    fn session_with(jobs: Vec<JobRecord>) -> SessionResult {
        SessionResult {
            session_id: Uuid::nil(),
            total_items: jobs.len(),
            status: SessionStatus::Completed,
            success: true,
            completed_at: Utc::now(),
            results: vec![ScrapeResult {
                site: SiteId::Townwork,
                total_items: jobs.len(),
                jobs,
                duration: Duration::from_secs(1),
                timestamp: Utc::now(),
                success: true,
                error: None,
                attempts: 1,
                retries: 0,
            }],
        }
    }

    #[test]
    fn test_format_aliases() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Structured);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Tabular);
        assert_eq!("excel".parse::<ExportFormat>().unwrap(), ExportFormat::Tabular);
        assert!(matches!(
            "xlsx".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(f)) if f == "xlsx"
        ));
    }

    #[test]
    fn test_empty_exports_are_valid() {
        let result = session_with(vec![]);

        let json = ExportService::render(&result, ExportFormat::Structured).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, serde_json::json!([]));

        let csv = ExportService::render(&result, ExportFormat::Tabular).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "site,title,company,location,salary,url,employmentType,description\r\n"
        );
    }

    #[test]
    fn test_structured_field_order() {
        let result = session_with(vec![JobRecord::new("Cook", "Diner", "Tokyo", "¥1,200/h")]);
        let json = String::from_utf8(
            ExportService::render(&result, ExportFormat::Structured).unwrap(),
        )
        .unwrap();

        let positions: Vec<usize> = COLUMNS
            .iter()
            .map(|c| json.find(&format!("\"{}\"", c)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"url\": null"));
    }

    #[test]
    fn test_csv_quoting() {
        let job = JobRecord::new("Cook, line", "The \"Best\" Diner", "Tokyo", "¥1200")
            .with_description("two\nlines");
        let csv = String::from_utf8(
            ExportService::render(&session_with(vec![job]), ExportFormat::Tabular).unwrap(),
        )
        .unwrap();

        let body = csv.split_once("\r\n").unwrap().1;
        assert_eq!(
            body,
            "townwork,\"Cook, line\",\"The \"\"Best\"\" Diner\",Tokyo,¥1200,,,\"two\nlines\"\r\n"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let result = session_with(vec![
            JobRecord::new("A", "B", "C", "D").with_url("https://x"),
            JobRecord::new("E", "F", "G", "H"),
        ]);
        for format in [ExportFormat::Structured, ExportFormat::Tabular] {
            assert_eq!(
                ExportService::render(&result, format).unwrap(),
                ExportService::render(&result, format).unwrap()
            );
        }
    }

    #[test]
    fn test_file_name() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let name = ExportFormat::Tabular.file_name(id);
        assert!(name.starts_with("jobs_67e55044_"));
        assert!(name.ends_with(".csv"));
    }
}
