use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{NewReviewItem, ReviewCategory, SubjectRef, UserId};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: usize, reason: String },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read review intake file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid review intake CSV data: {}", err),
            ImportError::InvalidRow { line, reason } => {
                write!(f, "invalid review intake row at line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads pending verification submissions from a CSV export.
///
/// Expected header: `category,subject_type,subject_id,user_id,submitted_at`.
pub struct ReviewIntakeImporter;

impl ReviewIntakeImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<NewReviewItem>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<NewReviewItem>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut submissions = Vec::new();

        for (index, record) in csv_reader.deserialize::<IntakeRow>().enumerate() {
            let row = record?;
            // header occupies line 1
            let line = index + 2;
            submissions.push(row.into_submission(line)?);
        }

        Ok(submissions)
    }
}

#[derive(Debug, Deserialize)]
struct IntakeRow {
    category: String,
    subject_type: String,
    subject_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    submitted_at: Option<String>,
}

impl IntakeRow {
    fn into_submission(self, line: usize) -> Result<NewReviewItem, ImportError> {
        if self.subject_id.is_empty() {
            return Err(ImportError::InvalidRow {
                line,
                reason: "subject_id is empty".to_string(),
            });
        }

        let subject = SubjectRef::from_parts(&self.subject_type, self.subject_id).ok_or_else(|| {
            ImportError::InvalidRow {
                line,
                reason: format!("unknown subject_type '{}'", self.subject_type),
            }
        })?;

        let submitted_at = match self.submitted_at.as_deref() {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| ImportError::InvalidRow {
                line,
                reason: format!("unparseable submitted_at '{raw}'"),
            })?),
            None => None,
        };

        Ok(NewReviewItem {
            subject,
            category: ReviewCategory::parse(&self.category),
            user_id: self.user_id.map(UserId),
            submitted_at,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rows_with_optional_columns() {
        let csv = "category,subject_type,subject_id,user_id,submitted_at\n\
identity,worker_identity,w-1,user-1,2025-03-01T09:00:00Z\n\
agency,agency_application,a-7,,2025-03-02 10:30:00\n\
payroll,business_license,b-2,user-3,\n";

        let rows = ReviewIntakeImporter::from_reader(csv.as_bytes()).expect("import succeeds");
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].category, ReviewCategory::Identity);
        assert_eq!(rows[0].user_id, Some(UserId("user-1".to_string())));
        assert_eq!(
            rows[0].submitted_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
        );

        assert_eq!(rows[1].subject, SubjectRef::AgencyApplication("a-7".to_string()));
        assert!(rows[1].user_id.is_none());
        assert_eq!(
            rows[1].submitted_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 30, 0).unwrap())
        );

        assert_eq!(rows[2].category, ReviewCategory::Other("payroll".to_string()));
        assert!(rows[2].submitted_at.is_none());
    }

    #[test]
    fn rejects_unknown_subject_types_with_line_numbers() {
        let csv = "category,subject_type,subject_id,user_id,submitted_at\n\
identity,worker_identity,w-1,,\n\
identity,shift,s-1,,\n";

        match ReviewIntakeImporter::from_reader(csv.as_bytes()) {
            Err(ImportError::InvalidRow { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("shift"));
            }
            other => panic!("expected invalid row error, got {other:?}"),
        }
    }
}
