use std::sync::Arc;
use tabula_table::{Column, Scalar, Table};

use crate::error::{ExecError, Result};

/// Index of a series: either positions in the source table, or explicit
/// labels produced by grouping, counting or per-column aggregation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Labels {
    Rows(Vec<usize>),
    Keys(Vec<Scalar>),
}

impl Labels {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Keys(keys) => keys.len(),
        }
    }

    pub(crate) fn get(&self, pos: usize) -> Scalar {
        match self {
            Self::Rows(rows) => Scalar::Int(rows[pos] as i64),
            Self::Keys(keys) => keys[pos].clone(),
        }
    }

    pub(crate) fn select(&self, positions: &[usize]) -> Self {
        match self {
            Self::Rows(rows) => Self::Rows(positions.iter().map(|&p| rows[p]).collect()),
            Self::Keys(keys) => Self::Keys(positions.iter().map(|&p| keys[p].clone()).collect()),
        }
    }

    pub(crate) fn is_keyed(&self) -> bool {
        matches!(self, Self::Keys(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Series {
    pub name: Option<String>,
    pub index_name: Option<String>,
    pub labels: Labels,
    pub values: Vec<Scalar>,
}

impl Series {
    pub(crate) fn keyed(
        name: Option<String>,
        index_name: Option<String>,
        keys: Vec<Scalar>,
        values: Vec<Scalar>,
    ) -> Self {
        Self {
            name,
            index_name,
            labels: Labels::Keys(keys),
            values,
        }
    }

    /// A series labelled 0..n.
    pub(crate) fn positional(name: Option<String>, values: Vec<Scalar>) -> Self {
        Self {
            name,
            index_name: None,
            labels: Labels::Rows((0..values.len()).collect()),
            values,
        }
    }

    /// Same index and name, new values.
    pub(crate) fn with_values(&self, values: Vec<Scalar>) -> Self {
        Self {
            name: self.name.clone(),
            index_name: self.index_name.clone(),
            labels: self.labels.clone(),
            values,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn select(&self, positions: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            index_name: self.index_name.clone(),
            labels: self.labels.select(positions),
            values: positions.iter().map(|&p| self.values[p].clone()).collect(),
        }
    }

    pub(crate) fn label(&self, pos: usize) -> Scalar {
        self.labels.get(pos)
    }

    /// Positions whose mask value is true. Nulls count as false.
    pub(crate) fn mask_positions(&self) -> Result<Vec<usize>> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(pos, value)| match value {
                Scalar::Bool(true) => Some(Ok(pos)),
                Scalar::Bool(false) => None,
                v if v.is_null() => None,
                other => Some(Err(ExecError::type_error(format!(
                    "boolean mask expected, found value {other}"
                )))),
            })
            .collect()
    }
}

/// A row/column selection over a shared table.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub table: Arc<Table>,
    pub rows: Vec<usize>,
    pub columns: Vec<usize>,
    /// Per physical row labels, present when the table was built by an
    /// aggregation.
    pub keys: Option<Arc<Vec<Scalar>>>,
    pub index_name: Option<String>,
}

impl Frame {
    pub(crate) fn whole(table: Arc<Table>) -> Self {
        Self {
            rows: (0..table.num_rows()).collect(),
            columns: (0..table.num_columns()).collect(),
            table,
            keys: None,
            index_name: None,
        }
    }

    /// A keyed frame over freshly built columns.
    pub(crate) fn from_columns(
        columns: Vec<Column>,
        keys: Option<Vec<Scalar>>,
        index_name: Option<String>,
    ) -> Result<Self> {
        let table = Table::from_columns(columns)
            .map_err(|err| ExecError::argument(err.to_string()))?;
        let mut frame = Self::whole(Arc::new(table));
        frame.keys = keys.map(Arc::new);
        frame.index_name = index_name;
        Ok(frame)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn label(&self, row: usize) -> Scalar {
        match &self.keys {
            Some(keys) => keys[row].clone(),
            None => Scalar::Int(row as i64),
        }
    }

    pub(crate) fn labels(&self) -> Labels {
        match &self.keys {
            Some(keys) => Labels::Keys(self.rows.iter().map(|&r| keys[r].clone()).collect()),
            None => Labels::Rows(self.rows.clone()),
        }
    }

    pub(crate) fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|&c| self.table.column_at(c).name().to_string())
            .collect()
    }

    /// Resolves a column name to its table position, restricted to the
    /// columns this frame selects.
    pub(crate) fn resolve(&self, name: &str) -> Result<usize> {
        self.table
            .column_index(name)
            .filter(|idx| self.columns.contains(idx))
            .ok_or_else(|| ExecError::UnknownColumn(name.to_string()))
    }

    pub(crate) fn series(&self, column: usize) -> Series {
        Series {
            name: Some(self.table.column_at(column).name().to_string()),
            index_name: self.index_name.clone(),
            labels: self.labels(),
            values: self
                .rows
                .iter()
                .map(|&r| self.table.value(r, column).clone())
                .collect(),
        }
    }

    pub(crate) fn with_rows(&self, rows: Vec<usize>) -> Self {
        Self {
            table: Arc::clone(&self.table),
            rows,
            columns: self.columns.clone(),
            keys: self.keys.clone(),
            index_name: self.index_name.clone(),
        }
    }

    pub(crate) fn with_columns(&self, columns: Vec<usize>) -> Self {
        Self {
            table: Arc::clone(&self.table),
            rows: self.rows.clone(),
            columns,
            keys: self.keys.clone(),
            index_name: self.index_name.clone(),
        }
    }

    /// Row `pos` of the frame as a series labelled by column name.
    pub(crate) fn row(&self, pos: usize) -> Series {
        let row = self.rows[pos];
        Series {
            name: Some(self.label(row).to_string()),
            index_name: None,
            labels: Labels::Keys(
                self.column_names().into_iter().map(Scalar::Str).collect(),
            ),
            values: self
                .columns
                .iter()
                .map(|&c| self.table.value(row, c).clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Selection {
    All,
    Single(usize),
    Many(Vec<usize>),
}

#[derive(Debug, Clone)]
pub(crate) struct GroupBy {
    pub frame: Frame,
    pub key: usize,
    pub selection: Selection,
    /// `false` when grouping keys come back as a regular column.
    pub as_index: bool,
    /// Groups ordered by key, or by first appearance when `false`.
    pub sort: bool,
}

/// Runtime value of a sub-expression.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Series(Series),
    Frame(Frame),
    GroupBy(GroupBy),
    StrAccessor(Series),
    Loc(Box<Value>),
    ILoc(Box<Value>),
}

impl Value {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(Scalar::Str(_)) => "str",
            Self::Scalar(Scalar::Bool(_)) => "bool",
            Self::Scalar(Scalar::Int(_)) => "int",
            Self::Scalar(Scalar::Float(_)) => "float",
            Self::Scalar(Scalar::Null) => "None",
            Self::List(_) => "list",
            Self::Series(_) => "Series",
            Self::Frame(_) => "DataFrame",
            Self::GroupBy(_) => "DataFrameGroupBy",
            Self::StrAccessor(_) => "str accessor",
            Self::Loc(_) => "loc indexer",
            Self::ILoc(_) => "iloc indexer",
        }
    }
}
