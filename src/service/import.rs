//! CSV bulk import of employees.
//!
//! Rows are grouped into fixed-size chunks. Each chunk is written in its own
//! transaction, so a failing chunk never undoes the chunks before it.

use crate::error::AppError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportRow {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<u64>,
    pub designation: Option<String>,
    pub join_date: NaiveDate,
    pub basic_salary: Option<Decimal>,
    pub overtime_rate: Option<Decimal>,
}

/// One chunk of rows; `rows` holds the 1-based data line numbers it spans.
#[derive(Debug)]
pub struct Chunk {
    pub index: usize,
    pub first_row: usize,
    pub last_row: usize,
    pub rows: Result<Vec<ImportRow>, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChunkReport {
    pub chunk: usize,
    pub first_row: usize,
    pub last_row: usize,
    #[schema(example = "ok")]
    pub status: String,
    pub inserted: usize,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportReport {
    pub total_rows: usize,
    pub inserted: usize,
    pub failed_rows: usize,
    pub chunks: Vec<ChunkReport>,
}

impl ChunkReport {
    pub fn ok(chunk: &Chunk, inserted: usize) -> Self {
        Self {
            chunk: chunk.index,
            first_row: chunk.first_row,
            last_row: chunk.last_row,
            status: "ok".to_string(),
            inserted,
            error: None,
        }
    }

    pub fn failed(chunk: &Chunk, error: String) -> Self {
        Self {
            chunk: chunk.index,
            first_row: chunk.first_row,
            last_row: chunk.last_row,
            status: "failed".to_string(),
            inserted: 0,
            error: Some(error),
        }
    }
}

impl ImportReport {
    pub fn from_chunks(chunks: Vec<ChunkReport>) -> Self {
        let total_rows = chunks.iter().map(|c| c.last_row + 1 - c.first_row).sum();
        let inserted = chunks.iter().map(|c| c.inserted).sum();
        Self {
            total_rows,
            inserted,
            failed_rows: total_rows - inserted,
            chunks,
        }
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

/// Parses the upload and splits it into chunks.
///
/// A malformed header or an empty file is a 400. A malformed data row fails
/// only the chunk it belongs to.
pub fn parse_chunks(body: &[u8], chunk_size: usize) -> Result<Vec<Chunk>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Invalid CSV header: {e}")))?
        .clone();
    for required in ["first_name", "join_date"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::BadRequest(format!("CSV is missing column {required}")));
        }
    }

    let rows: Vec<Result<ImportRow, String>> = reader
        .deserialize::<ImportRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map(|mut r| {
                blank_to_none(&mut r.last_name);
                blank_to_none(&mut r.email);
                blank_to_none(&mut r.phone);
                blank_to_none(&mut r.designation);
                r
            })
            .map_err(|e| format!("row {}: {e}", i + 1))
        })
        .collect();

    if rows.is_empty() {
        return Err(AppError::bad_request("CSV has no data rows"));
    }

    let size = chunk_size.max(1);
    Ok(rows
        .chunks(size)
        .enumerate()
        .map(|(index, slice)| {
            let first_row = index * size + 1;
            Chunk {
                index: index + 1,
                first_row,
                last_row: first_row + slice.len() - 1,
                rows: slice.iter().cloned().collect(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "first_name,last_name,email,phone,department_id,designation,join_date,basic_salary,overtime_rate\n";

    fn csv_with(rows: &[&str]) -> Vec<u8> {
        let mut body = HEADER.to_string();
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        body.into_bytes()
    }

    #[test]
    fn parses_rows_and_blanks() {
        let body = csv_with(&["Karim, ,karim@x.com,,2,Driver,2026-02-01,18000.50,"]);
        let chunks = parse_chunks(&body, CHUNK_SIZE).unwrap();

        assert_eq!(chunks.len(), 1);
        let rows = chunks[0].rows.as_ref().unwrap();
        assert_eq!(rows[0].first_name, "Karim");
        assert_eq!(rows[0].last_name, None);
        assert_eq!(rows[0].department_id, Some(2));
        assert_eq!(rows[0].basic_salary, Some(Decimal::new(1_800_050, 2)));
        assert_eq!(rows[0].overtime_rate, None);
    }

    #[test]
    fn splits_into_fixed_chunks() {
        let row = "A,,,,,,2026-01-01,,";
        let body = csv_with(&[row; 5]);
        let chunks = parse_chunks(&body, 2).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[2].first_row, chunks[2].last_row), (5, 5));
        assert_eq!(chunks[1].index, 2);
    }

    #[test]
    fn bad_row_fails_only_its_chunk() {
        let body = csv_with(&[
            "A,,,,,,2026-01-01,,",
            "B,,,,,,not-a-date,,",
            "C,,,,,,2026-01-03,,",
        ]);
        let chunks = parse_chunks(&body, 2).unwrap();

        let err = chunks[0].rows.as_ref().unwrap_err();
        assert!(err.starts_with("row 2:"));
        assert!(chunks[1].rows.is_ok());
    }

    #[test]
    fn missing_columns_are_rejected() {
        assert!(parse_chunks(b"last_name,email\nx,y\n", CHUNK_SIZE).is_err());
        assert!(parse_chunks(HEADER.as_bytes(), CHUNK_SIZE).is_err());
    }

    #[test]
    fn report_totals() {
        let body = csv_with(&["A,,,,,,2026-01-01,,"; 3]);
        let chunks = parse_chunks(&body, 2).unwrap();
        let report = ImportReport::from_chunks(vec![
            ChunkReport::ok(&chunks[0], 2),
            ChunkReport::failed(&chunks[1], "duplicate".into()),
        ]);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed_rows, 1);
    }
}
