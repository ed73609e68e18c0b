use crate::core::{CodeUnit, CsvError, GroundTruth};
use crate::reporter::OutputRow;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use tracing::warn;

const ID_COLUMN: &str = "ID";
const CODE_COLUMN: &str = "Code";
const CONTEXT_COLUMN: &str = "Context";
const CORRECT_CODE_COLUMN: &str = "Correct Code";
const EXPLANATION_COLUMN: &str = "Explanation";

/// One input row: a usable unit, or a row that will get an error verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRecord {
    Unit(CodeUnit),
    Malformed { id: String, reason: String },
}

impl InputRecord {
    pub fn id(&self) -> &str {
        match self {
            InputRecord::Unit(unit) => &unit.id,
            InputRecord::Malformed { id, .. } => id,
        }
    }
}

pub fn read_units(path: impl AsRef<Path>) -> Result<Vec<InputRecord>, CsvError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_units_from(file)
}

pub fn read_units_from<R: Read>(reader: R) -> Result<Vec<InputRecord>, CsvError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_lowercase(), idx))
        .collect();
    let column = |name: &str| columns.get(&name.to_lowercase()).copied();

    let id_idx = column(ID_COLUMN).ok_or(CsvError::MissingColumn(ID_COLUMN))?;
    let code_idx = column(CODE_COLUMN).ok_or(CsvError::MissingColumn(CODE_COLUMN))?;
    let context_idx = column(CONTEXT_COLUMN);
    let correct_idx = column(CORRECT_CODE_COLUMN);
    let explanation_idx = column(EXPLANATION_COLUMN);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let fallback_id = format!("row-{}", row + 1);
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Unreadable input row {}: {}", row + 1, e);
                records.push(InputRecord::Malformed {
                    id: fallback_id,
                    reason: format!("unreadable row: {}", e),
                });
                continue;
            }
        };

        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).and_then(present);
        let id = cell(Some(id_idx)).map(|id| id.trim().to_string());
        let code = cell(Some(code_idx));

        let (id, code) = match (id, code) {
            (Some(id), Some(code)) => (id, code),
            (id, _) => {
                let id = id.unwrap_or(fallback_id);
                let missing = if cell(Some(id_idx)).is_none() { ID_COLUMN } else { CODE_COLUMN };
                records.push(InputRecord::Malformed {
                    id,
                    reason: format!("missing {}", missing),
                });
                continue;
            }
        };

        let mut unit = CodeUnit::new(id, code);
        if let Some(context) = cell(context_idx) {
            unit = unit.with_context(context);
        }
        unit = unit.with_ground_truth(GroundTruth {
            correct_code: cell(correct_idx).map(str::to_string),
            explanation: cell(explanation_idx).map(str::to_string),
        });
        records.push(InputRecord::Unit(unit));
    }
    Ok(records)
}

/// Blank cells and pandas' `nan` placeholder count as absent.
fn present(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(value)
    }
}

pub fn write_output(path: impl AsRef<Path>, rows: &[OutputRow]) -> Result<(), CsvError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write_output_to(file, rows)
}

pub fn write_output_to<W: Write>(writer: W, rows: &[OutputRow]) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        writer.write_record([ID_COLUMN, "Bug Line", EXPLANATION_COLUMN])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| CsvError::Io {
        path: "<output>".to_string(),
        source,
    })?;
    Ok(())
}

pub fn read_output(path: impl AsRef<Path>) -> Result<Vec<OutputRow>, CsvError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_output_from(file)
}

pub fn read_output_from<R: Read>(reader: R) -> Result<Vec<OutputRow>, CsvError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_units_with_loose_headers() {
        let input = " id ,CODE,context,Correct Code,Explanation\n1,\"RDI_BEGIN();\nrdi.dc().iMeans();\",Measure,\"RDI_BEGIN();\nrdi.dc().iMeas();\",typo\n2,x;,nan,,\n";
        let records = read_units_from(input.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        let InputRecord::Unit(first) = &records[0] else {
            panic!("expected unit");
        };
        assert_eq!(first.line_count(), 2);
        assert_eq!(first.context.as_deref(), Some("Measure"));
        assert_eq!(
            first.ground_truth.as_ref().and_then(|g| g.explanation.as_deref()),
            Some("typo")
        );

        let InputRecord::Unit(second) = &records[1] else {
            panic!("expected unit");
        };
        assert!(second.context.is_none());
        assert!(second.ground_truth.is_none());
    }

    #[test]
    fn test_malformed_rows() {
        let input = "ID,Code\n,x;\n5,\n6,nan\n7,ok;\n";
        let records = read_units_from(input.as_bytes()).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(
            records[0],
            InputRecord::Malformed {
                id: "row-1".to_string(),
                reason: "missing ID".to_string()
            }
        );
        assert_eq!(records[1].id(), "5");
        assert!(matches!(&records[2], InputRecord::Malformed { reason, .. } if reason == "missing Code"));
        assert!(matches!(records[3], InputRecord::Unit(_)));
    }

    #[test]
    fn test_missing_code_column() {
        let err = read_units_from("ID,Context\n1,x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CsvError::MissingColumn("Code")));
    }

    #[test]
    fn test_output_round_trip() {
        let rows = vec![
            OutputRow::new("1", "3,7", "Line 3: iClamp order, \"reversed\".\nLine 7: typo"),
            OutputRow::new("2", "None", "No bug found."),
        ];

        let mut buffer = Vec::new();
        write_output_to(&mut buffer, &rows).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("ID,Bug Line,Explanation\n"));

        assert_eq!(read_output_from(buffer.as_slice()).unwrap(), rows);
    }

    #[test]
    fn test_empty_output_has_header() {
        let mut buffer = Vec::new();
        write_output_to(&mut buffer, &[]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "ID,Bug Line,Explanation\n");
    }
}
