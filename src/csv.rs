use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Amount;
use crate::model::{GiftCardSnapshot, Operation};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors that can occur when reading operations or writing cards
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open operations file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation type '{op}'")]
    UnrecognizedType { line: usize, op: String },

    #[error("line {line}: {op} missing amount")]
    MissingAmount { line: usize, op: String },

    #[error("line {line}: issue missing expiration date")]
    MissingExpiry { line: usize },

    #[error("line {line}: invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { line: usize, value: String },

    #[error("failed to write card row: {0}")]
    Write(csv::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    card: String,
    amount: Option<f64>,
    expires: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    card: &'a str,
    number: &'a str,
    balance: String,
    status: &'static str,
}

fn parse_row(line: usize, row: InputRow) -> Result<Operation, CsvError> {
    let amount = |op: &str| {
        row.amount
            .map(Amount::from_float)
            .ok_or_else(|| CsvError::MissingAmount {
                line,
                op: op.to_string(),
            })
    };

    match row.r#type.as_str() {
        "issue" => {
            let amount = amount("issue")?;
            let raw = row
                .expires
                .as_deref()
                .ok_or(CsvError::MissingExpiry { line })?;
            let expires =
                NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| CsvError::InvalidDate {
                    line,
                    value: raw.to_string(),
                })?;
            Ok(Operation::Issue {
                card: row.card,
                amount,
                expires,
            })
        }
        "use" => {
            let amount = amount("use")?;
            Ok(Operation::Use {
                card: row.card,
                amount,
            })
        }
        "deactivate" => Ok(Operation::Deactivate { card: row.card }),
        other => Err(CsvError::UnrecognizedType {
            line,
            op: other.to_string(),
        }),
    }
}

/// Read operations from a csv file
pub fn read_operations(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Operation, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        }))
}

/// Write labelled cards in csv format
pub fn write_cards<'a, W: io::Write>(
    out: W,
    cards: impl IntoIterator<Item = &'a (String, GiftCardSnapshot)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);

    for (card, snapshot) in cards {
        let row = OutputRow {
            card,
            number: &snapshot.number,
            balance: snapshot.balance.to_string(),
            status: snapshot.status.as_str(),
        };
        writer.serialize(&row).map_err(CsvError::Write)?;
    }

    writer.flush()?;
    Ok(())
}
