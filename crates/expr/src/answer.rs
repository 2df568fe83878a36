//! Conversion of evaluated values into JSON answers.

use serde::Serialize;
use serde_json::{Map, Number, Value as Json};
use tabula_table::Scalar;

use crate::error::{ExecError, Result};
use crate::eval::value::{Frame, Series};
use crate::eval::Value;

/// Shape of an answer as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// A single value.
    Scalar,
    /// An array: a list or a series with the default row index.
    Sequence,
    /// An object keyed by label text: a labelled series.
    Mapping,
    /// An array of row objects.
    Table,
}

/// The JSON-compatible result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    kind: AnswerKind,
    value: Json,
    cells: usize,
}

impl Answer {
    pub fn kind(&self) -> AnswerKind {
        self.kind
    }

    pub fn value(&self) -> &Json {
        &self.value
    }

    pub fn into_value(self) -> Json {
        self.value
    }

    /// Number of cells the answer holds, as counted against the size cap.
    pub fn cells(&self) -> usize {
        self.cells
    }
}

pub(crate) fn convert(value: Value, max_cells: usize) -> Result<Answer> {
    let (kind, cells) = match &value {
        Value::Scalar(_) => (AnswerKind::Scalar, 1),
        Value::List(items) => (AnswerKind::Sequence, items.len()),
        Value::Series(series) if series.labels.is_keyed() => (AnswerKind::Mapping, series.len()),
        Value::Series(series) => (AnswerKind::Sequence, series.len()),
        Value::Frame(frame) => {
            let index = usize::from(index_column(frame).is_some());
            (AnswerKind::Table, frame.len() * (frame.columns.len() + index))
        }
        other => {
            return Err(ExecError::type_error(format!(
                "a {} is not an answer; finish the expression with a selection or an aggregation",
                other.kind()
            )))
        }
    };
    if cells > max_cells {
        return Err(ExecError::ResultTooLarge {
            cells,
            limit: max_cells,
        });
    }

    let value = match value {
        Value::Scalar(scalar) => scalar_json(&scalar),
        Value::List(items) => Json::Array(items.iter().map(scalar_json).collect()),
        Value::Series(series) if kind == AnswerKind::Mapping => mapping(&series),
        Value::Series(series) => Json::Array(series.values.iter().map(scalar_json).collect()),
        Value::Frame(frame) => records(&frame),
        _ => Json::Null,
    };
    Ok(Answer { kind, value, cells })
}

/// Scalars map to JSON directly; NaN and infinities become `null`.
pub(crate) fn scalar_json(scalar: &Scalar) -> Json {
    match scalar {
        Scalar::Null => Json::Null,
        Scalar::Bool(v) => Json::Bool(*v),
        Scalar::Int(v) => Json::Number((*v).into()),
        Scalar::Float(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Scalar::Str(v) => Json::String(v.clone()),
    }
}

fn mapping(series: &Series) -> Json {
    let mut map = Map::with_capacity(series.len());
    for (pos, value) in series.values.iter().enumerate() {
        map.insert(series.label(pos).to_string(), scalar_json(value));
    }
    Json::Object(map)
}

/// Frames built by aggregation carry their labels as a leading field.
fn index_column(frame: &Frame) -> Option<String> {
    frame
        .keys
        .as_ref()
        .map(|_| frame.index_name.clone().unwrap_or_else(|| "index".to_string()))
}

fn records(frame: &Frame) -> Json {
    let names = frame.column_names();
    let index_name = index_column(frame);
    let rows = frame
        .rows
        .iter()
        .map(|&row| {
            let mut record = Map::with_capacity(names.len() + 1);
            if let Some(index_name) = &index_name {
                record.insert(index_name.clone(), scalar_json(&frame.label(row)));
            }
            for (name, &column) in names.iter().zip(&frame.columns) {
                record.insert(name.clone(), scalar_json(frame.table.value(row, column)));
            }
            Json::Object(record)
        })
        .collect();
    Json::Array(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::Labels;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tabula_table::Table;

    fn series(labels: Labels, values: Vec<Scalar>) -> Series {
        Series {
            name: None,
            index_name: None,
            labels,
            values,
        }
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(scalar_json(&Scalar::Float(f64::NAN)), Json::Null);
        assert_eq!(scalar_json(&Scalar::Float(f64::INFINITY)), Json::Null);
        assert_eq!(scalar_json(&Scalar::Float(2.5)), json!(2.5));
        assert_eq!(scalar_json(&Scalar::Int(1000)), json!(1000));
    }

    #[test]
    fn row_indexed_series_is_an_array() {
        let answer = convert(
            Value::Series(series(Labels::Rows(vec![4, 7]), vec![Scalar::Int(1), Scalar::Null])),
            10,
        )
        .unwrap();
        assert_eq!(answer.kind(), AnswerKind::Sequence);
        assert_eq!(answer.value(), &json!([1, null]));
    }

    #[test]
    fn keyed_series_is_an_object_in_label_order() {
        let answer = convert(
            Value::Series(series(
                Labels::Keys(vec![Scalar::from("South"), Scalar::from("North"), Scalar::Int(3)]),
                vec![Scalar::Int(250), Scalar::Int(750), Scalar::Float(0.5)],
            )),
            10,
        )
        .unwrap();
        assert_eq!(answer.kind(), AnswerKind::Mapping);
        assert_eq!(
            serde_json::to_string(answer.value()).unwrap(),
            r#"{"South":250,"North":750,"3":0.5}"#
        );
    }

    #[test]
    fn frames_become_records() {
        let table = Table::from_reader("a,b\n1,x\n2,y\n".as_bytes()).unwrap();
        let frame = Frame::whole(Arc::new(table));
        let answer = convert(Value::Frame(frame), 10).unwrap();
        assert_eq!(answer.kind(), AnswerKind::Table);
        assert_eq!(answer.cells(), 4);
        assert_eq!(
            answer.into_value(),
            json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}])
        );
    }

    #[test]
    fn size_cap_is_enforced_before_conversion() {
        let values = vec![Scalar::Int(0); 11];
        let err = convert(Value::List(values), 10).unwrap_err();
        assert_eq!(err, ExecError::ResultTooLarge { cells: 11, limit: 10 });
        assert!(err.is_result_too_large());
    }
}
