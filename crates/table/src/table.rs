use crate::error::{Result, TableError};
use crate::value::{DType, Scalar};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: DType,
    values: Vec<Scalar>,
}

impl Column {
    /// Builds a column, inferring the dtype from its non-null values.
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        let dtype = infer_dtype(&values);
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column-oriented, read-only table with a stable row order
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    rows: usize,
}

impl Table {
    /// Loads a CSV file with a header row.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        log::info!(
            "Loaded table from {}: {} rows x {} columns",
            path.display(),
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }

    /// Reads CSV from any reader. Ragged rows and invalid UTF-8 are errors.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(TableError::from_csv)?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if h.is_empty() {
                    format!("Unnamed: {i}")
                } else {
                    h.to_string()
                }
            })
            .collect();
        if headers.is_empty() {
            return Err(TableError::NoColumns);
        }

        let mut raw: Vec<Vec<String>> = headers.iter().map(|_| Vec::new()).collect();
        for record in rdr.records() {
            let record = record.map_err(TableError::from_csv)?;
            for (buffer, field) in raw.iter_mut().zip(record.iter()) {
                buffer.push(field.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| parse_column(name, cells))
            .collect();
        Self::from_columns(columns)
    }

    /// Assembles a table from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(TableError::NoColumns);
        }
        let rows = columns[0].len();
        let mut by_name = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(TableError::LengthMismatch {
                    name: column.name.clone(),
                    expected: rows,
                    found: column.len(),
                });
            }
            if by_name.insert(column.name.clone(), idx).is_some() {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self {
            columns,
            by_name,
            rows,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn column_at(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    pub fn value(&self, row: usize, column: usize) -> &Scalar {
        &self.columns[column].values[row]
    }
}

fn infer_dtype(values: &[Scalar]) -> DType {
    let mut dtype: Option<DType> = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        let Some(next) = value.dtype() else { continue };
        dtype = Some(match (dtype, next) {
            (None, next) => next,
            (Some(a), b) if a == b => a,
            (Some(DType::Int), DType::Float) | (Some(DType::Float), DType::Int) => DType::Float,
            _ => DType::Str,
        });
    }
    dtype.unwrap_or(DType::Float)
}

fn parse_column(name: String, cells: Vec<String>) -> Column {
    let non_empty = || cells.iter().filter(|c| !c.is_empty());

    let values = if non_empty().next().is_none() {
        vec![Scalar::Null; cells.len()]
    } else if non_empty().all(|c| c.parse::<i64>().is_ok()) {
        cells
            .iter()
            .map(|c| c.parse::<i64>().map_or(Scalar::Null, Scalar::Int))
            .collect()
    } else if non_empty().all(|c| c.parse::<f64>().is_ok()) {
        cells
            .iter()
            .map(|c| c.parse::<f64>().map_or(Scalar::Null, Scalar::Float))
            .collect()
    } else if non_empty().all(|c| parse_bool(c).is_some()) {
        cells
            .iter()
            .map(|c| parse_bool(c).map_or(Scalar::Null, Scalar::Bool))
            .collect()
    } else {
        cells
            .into_iter()
            .map(|c| if c.is_empty() { Scalar::Null } else { Scalar::Str(c) })
            .collect()
    };

    Column::new(name, values)
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
