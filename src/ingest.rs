use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::SourceFile;
use crate::dates;
use crate::error::{DashboardError, Result};
use crate::models::{Document, FieldValue};
use crate::store::DocumentStore;

/// Cell contents treated as missing, matching common CSV exports.
const NULL_TOKENS: &[&str] = &[
    "", "na", "n/a", "nan", "-nan", "null", "none", "#n/a", "<na>", "nat",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub path: PathBuf,
    pub collection: String,
    pub attempted: usize,
    pub confirmed: usize,
    pub unparsed_dates: usize,
}

/// Documents read from one file, plus the date cells that had to be dropped.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub documents: Vec<Document>,
    pub unparsed_dates: usize,
}

fn is_null_token(raw: &str) -> bool {
    let value = raw.trim().to_lowercase();
    NULL_TOKENS.contains(&value.as_str())
}

/// Parses one raw cell. A date-named column holding something that is not
/// a date fails with `Parse`; other cells become integers, floats or text.
pub fn parse_cell(header: &str, raw: &str) -> Result<FieldValue> {
    if is_null_token(raw) {
        return Ok(FieldValue::Absent);
    }

    let value = raw.trim();
    if dates::is_date_header(header) {
        return dates::parse_date(value)
            .map(FieldValue::Date)
            .ok_or_else(|| DashboardError::Parse {
                field: header.to_string(),
                value: value.to_string(),
            });
    }

    Ok(normalize_scalar(value))
}

fn normalize_scalar(value: &str) -> FieldValue {
    if let Ok(integer) = value.parse::<i64>() {
        return FieldValue::Integer(integer);
    }
    if let Ok(float) = value.parse::<f64>() {
        return FieldValue::from(Some(float));
    }
    FieldValue::Text(value.to_string())
}

/// Reads a header-driven delimited file into normalized documents. Short
/// rows are padded with absent cells and cells beyond the header are ignored.
pub fn read_documents(path: &Path) -> Result<ParsedFile> {
    let source_error = |reason: String| DashboardError::SourceFile {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| source_error(e.to_string()))?;

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| source_error(e.to_string()))?
        .iter()
        .map(|header| String::from_utf8_lossy(header).trim().to_string())
        .collect();

    let mut parsed = ParsedFile::default();
    for (line, result) in reader.byte_records().enumerate() {
        let record = result.map_err(|e| source_error(format!("row {}: {e}", line + 1)))?;
        if record.len() != headers.len() {
            warn!(
                path = %path.display(),
                row = line + 1,
                expected = headers.len(),
                found = record.len(),
                "row width differs from header"
            );
        }

        let mut document = Document::new();
        for (index, header) in headers.iter().enumerate() {
            let raw = record.get(index).map(String::from_utf8_lossy);
            let value = match raw.map(|raw| parse_cell(header, &raw)) {
                Some(Ok(value)) => value,
                Some(Err(err)) => {
                    debug!(path = %path.display(), row = line + 1, "dropping cell: {err}");
                    parsed.unparsed_dates += 1;
                    FieldValue::Absent
                }
                None => FieldValue::Absent,
            };
            document.insert(header.clone(), value);
        }
        parsed.documents.push(document);
    }

    Ok(parsed)
}

/// Ingests one file into `collection`. Re-running appends again.
pub async fn ingest_file(
    store: &dyn DocumentStore,
    path: &Path,
    collection: &str,
) -> Result<IngestOutcome> {
    let ParsedFile {
        documents,
        unparsed_dates,
    } = read_documents(path)?;
    let attempted = documents.len();

    let confirmed = store.insert_many(collection, &documents).await?;
    if confirmed != attempted {
        return Err(DashboardError::Persistence {
            collection: collection.to_string(),
            attempted,
            confirmed,
            reason: "store confirmed fewer documents than sent".to_string(),
        });
    }

    if unparsed_dates > 0 {
        warn!(path = %path.display(), unparsed_dates, "date cells stored as absent");
    }
    info!(
        path = %path.display(),
        collection,
        attempted,
        confirmed,
        unparsed_dates,
        "ingested source file"
    );
    Ok(IngestOutcome {
        path: path.to_path_buf(),
        collection: collection.to_string(),
        attempted,
        confirmed,
        unparsed_dates,
    })
}

/// Ingests every source in order. A failing source is logged and reported
/// without stopping the rest.
pub async fn ingest_sources(
    store: &dyn DocumentStore,
    sources: &[SourceFile],
) -> Vec<(SourceFile, Result<IngestOutcome>)> {
    let mut outcomes = Vec::with_capacity(sources.len());

    for source in sources {
        let outcome = ingest_file(store, &source.path, &source.collection).await;
        if let Err(err) = &outcome {
            error!(
                path = %source.path.display(),
                collection = %source.collection,
                "ingestion failed: {err}"
            );
        }
        outcomes.push((source.clone(), outcome));
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;

    use super::*;
    use crate::store::MemoryStore;

    fn cell(header: &str, raw: &str) -> FieldValue {
        parse_cell(header, raw).unwrap_or(FieldValue::Absent)
    }

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn null_equivalents_become_absent() {
        for raw in ["", "  ", "NaN", "nan", "NULL", "N/A", "None"] {
            assert_eq!(cell("Calories", raw), FieldValue::Absent, "{raw:?}");
        }
        assert_eq!(cell("Calories", "0"), FieldValue::Integer(0));
    }

    #[test]
    fn date_columns_parse_or_become_absent() {
        assert_eq!(
            cell("ActivityDate", "4/12/2016"),
            FieldValue::Date(NaiveDate::from_ymd_opt(2016, 4, 12).unwrap())
        );
        assert_eq!(cell("ActivityDate", "yesterday"), FieldValue::Absent);
        assert_eq!(cell("Activity name", "Running"), FieldValue::Text("Running".into()));
    }

    #[test]
    fn numbers_are_typed() {
        assert_eq!(cell("Id", "1503960366"), FieldValue::Integer(1503960366));
        assert_eq!(cell("Day Strain", "12.4"), FieldValue::Float(12.4));
        assert_eq!(cell("Day Strain", "inf"), FieldValue::Absent);
    }

    #[test]
    fn reads_rows_keyed_by_literal_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "physiologicals.csv",
            "Date,Heart rate variability (ms),Blood oxygen %\n2023-05-01,62,\n2023-05-02,,95.5\n",
        );

        let documents = read_documents(&path).unwrap().documents;

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["Heart rate variability (ms)"], FieldValue::Integer(62));
        assert_eq!(documents[0]["Blood oxygen %"], FieldValue::Absent);
        assert_eq!(documents[1]["Heart rate variability (ms)"], FieldValue::Absent);
        assert_eq!(documents[1]["Blood oxygen %"], FieldValue::Float(95.5));
    }

    #[test]
    fn short_rows_are_padded_with_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "sleep.csv", "Id,SleepDay,TotalMinutesAsleep\n1,4/12/2016\n");

        let documents = read_documents(&path).unwrap().documents;
        assert_eq!(documents[0]["TotalMinutesAsleep"], FieldValue::Absent);
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let err = read_documents(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, DashboardError::SourceFile { .. }));
    }

    #[tokio::test]
    async fn ingest_reports_counts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "daily.csv",
            "Id,ActivityDate,TotalSteps,Calories\n1,4/12/2016,10000,1985\n1,4/13/2016,,1797\n",
        );
        let store = MemoryStore::new();

        let outcome = ingest_file(&store, &path, "daily_activity").await.unwrap();

        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.confirmed, 2);
        assert_eq!(outcome.unparsed_dates, 0);
        let stored = store.find("daily_activity").await.unwrap();
        assert_eq!(stored[1]["TotalSteps"], FieldValue::Absent);
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_csv(
            &dir,
            "sleep.csv",
            "Id,SleepDay,TotalMinutesAsleep,TotalTimeInBed\n1,4/12/2016,420,480\n",
        );
        let sources = vec![
            SourceFile {
                path: dir.path().join("missing.csv"),
                collection: "daily_activity".to_string(),
            },
            SourceFile {
                path: good,
                collection: "sleep_day".to_string(),
            },
        ];
        let store = MemoryStore::new();

        let outcomes = ingest_sources(&store, &sources).await;

        assert!(outcomes[0].1.is_err());
        assert_eq!(outcomes[1].1.as_ref().unwrap().confirmed, 1);
        assert_eq!(store.find("sleep_day").await.unwrap().len(), 1);
    }

    #[test]
    fn bad_date_is_a_parse_error() {
        let err = parse_cell("ActivityDate", " yesterday ").unwrap_err();
        let DashboardError::Parse { field, value } = err else {
            panic!("expected a parse error");
        };
        assert_eq!(field, "ActivityDate");
        assert_eq!(value, "yesterday");
        assert_eq!(parse_cell("ActivityDate", "NaN").unwrap(), FieldValue::Absent);
    }

    #[tokio::test]
    async fn unparsed_dates_are_counted_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "daily.csv",
            concat!(
                "Id,ActivityDate,TotalSteps\n",
                "1,4/12/2016,10\n1,someday,20\n1,,30\n1,13/45/2016,40\n",
            ),
        );
        let store = MemoryStore::new();

        let outcome = ingest_file(&store, &path, "daily_activity").await.unwrap();

        assert_eq!(outcome.confirmed, 4);
        assert_eq!(outcome.unparsed_dates, 2);
        let stored = store.find("daily_activity").await.unwrap();
        assert_eq!(stored[1]["ActivityDate"], FieldValue::Absent);
        assert_eq!(stored[1]["TotalSteps"], FieldValue::Integer(20));
    }

    #[tokio::test]
    async fn partial_persistence_surfaces_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "daily.csv", "Id,TotalSteps\n1,10\n1,20\n1,30\n");
        let store = MemoryStore::with_capacity(1);

        let err = ingest_file(&store, &path, "daily_activity").await.unwrap_err();
        assert!(matches!(err, DashboardError::Persistence { attempted: 3, confirmed: 1, .. }));
    }
}
