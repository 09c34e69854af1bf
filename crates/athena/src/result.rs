use std::fmt;

use serde::{Deserialize, Serialize};

/// Athena query execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// A state this crate does not know about.
    Unknown(String),
}

impl QueryState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_uppercase().as_str() {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// QUEUED and RUNNING are the only states that still change.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("QUEUED"),
            Self::Running => f.write_str("RUNNING"),
            Self::Succeeded => f.write_str("SUCCEEDED"),
            Self::Failed => f.write_str("FAILED"),
            Self::Cancelled => f.write_str("CANCELLED"),
            Self::Unknown(s) => f.write_str(s),
        }
    }
}

/// Status snapshot of one query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExecution {
    pub query_id: String,
    pub state: QueryState,
    /// Reason supplied by Athena on failure or cancellation.
    pub state_change_reason: Option<String>,
    /// S3 location of the result CSV, if known.
    pub output_location: Option<String>,
    pub bytes_scanned: u64,
    pub execution_time_ms: u64,
}

impl QueryExecution {
    pub fn new(query_id: &str, state: QueryState) -> Self {
        Self {
            query_id: query_id.to_string(),
            state,
            state_change_reason: None,
            output_location: None,
            bytes_scanned: 0,
            execution_time_ms: 0,
        }
    }
}

/// Column definition returned by an Athena query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared in the result set.
    pub name: String,
    /// Athena data type (e.g. "varchar", "bigint", "double").
    pub data_type: String,
}

impl Column {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }
}

/// Result set of a completed query.
///
/// Rows are stored as `Vec<Option<String>>` where `None` represents SQL NULL.
/// Column ordering in each row matches the `columns` vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
    pub execution: QueryExecution,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finds the zero-based index of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Retrieves the value at the given row index and column name.
    ///
    /// Returns `None` if the row index is out of bounds, the column name
    /// does not exist, or the cell value is SQL NULL.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&str> {
        let col_idx = self.column_index(col)?;
        self.rows.get(row)?.get(col_idx)?.as_deref()
    }

    /// Values of the first column, skipping NULLs.
    pub fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.first().cloned().flatten())
            .collect()
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return write!(f, "(empty result set)");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.len()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.as_deref().unwrap_or("NULL").len());
            }
        }

        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:<width$}", col.name, width = widths[i])?;
        }
        writeln!(f)?;

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", separator.join("-+-"))?;

        for row in &self.rows {
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                let cell = row.get(i).and_then(|c| c.as_deref()).unwrap_or("NULL");
                write!(f, "{:<width$}", cell, width = *width)?;
            }
            writeln!(f)?;
        }

        write!(
            f,
            "({} rows) query {} | {:.2} MB scanned | {}ms",
            self.rows.len(),
            self.execution.query_id,
            self.execution.bytes_scanned as f64 / (1024.0 * 1024.0),
            self.execution.execution_time_ms,
        )
    }
}
