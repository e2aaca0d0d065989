use std::path::Path;

use polars::prelude::*;

use crate::data::normalize::{normalize_with_report, NormalizeReport, SourceHint};
use crate::data::DataError;
use crate::domain::BarSeries;

/// Rows polars inspects before fixing CSV column types.
const CSV_INFER_ROWS: usize = 10_000;

/// Reader for local CSV and Parquet datasets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataIngestor;

impl DataIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Lazily scan a CSV file with a header row. Column types are inferred.
    pub fn ingest_csv(&self, path: &Path) -> Result<LazyFrame, DataError> {
        LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(CSV_INFER_ROWS))
            .finish()
            .map_err(|e| DataError::Ingest(format!("{}: {e}", path.display())))
    }

    /// Lazily scan a Parquet file.
    pub fn ingest_parquet(&self, path: &Path) -> Result<LazyFrame, DataError> {
        LazyFrame::scan_parquet(path, Default::default())
            .map_err(|e| DataError::Ingest(format!("{}: {e}", path.display())))
    }

    /// Read a file, choosing the reader by extension (`.parquet`/`.pq`, otherwise CSV).
    pub fn read(&self, path: &Path) -> Result<DataFrame, DataError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let frame = match ext.as_deref() {
            Some("parquet") | Some("pq") => self.ingest_parquet(path)?,
            _ => self.ingest_csv(path)?,
        };
        frame
            .collect()
            .map_err(|e| DataError::Ingest(format!("{}: {e}", path.display())))
    }

    /// Read and normalize in one step.
    pub fn load(
        &self,
        path: &Path,
        hint: &SourceHint,
    ) -> Result<(BarSeries, NormalizeReport), DataError> {
        let df = self.read(path)?;
        normalize_with_report(&df, hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        writeln!(file, "2024-01-03,11,12,10,11.5,200").unwrap();
        writeln!(file, "2024-01-02,10,11,9,10.5,100").unwrap();
        file.flush().unwrap();

        let (series, report) = DataIngestor::new()
            .load(file.path(), &SourceHint::default())
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![10.5, 11.5]);
        assert_eq!(report.rows_in, 2);
    }

    #[test]
    fn missing_file_is_ingest_error() {
        let err = DataIngestor::new()
            .read(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, DataError::Ingest(_)));
    }
}
