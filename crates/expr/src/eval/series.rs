use std::collections::{HashMap, HashSet};

use tabula_table::{Column, DType, Scalar};

use super::aggregate::Agg;
use super::frame::{aggregations, distinct_positions, head_tail, Keep, DEFAULT_HEAD_ROWS};
use super::ops;
use super::value::{Frame, Series, Value};
use super::{
    compare_nulls_last, is_mask, mask_list_positions, no_method, position, slice_range, Args,
    Evaluator, Key, Lookup, KEYWORD_ONLY,
};
use crate::ast::BinaryOp;
use crate::error::{ExecError, Result};

impl Evaluator<'_> {
    pub(super) fn series_attribute(&mut self, series: Series, name: &str) -> Result<Value> {
        let value = match name {
            "shape" => Value::List(vec![Scalar::Int(series.len() as i64)]),
            "empty" => Value::Scalar(Scalar::Bool(series.len() == 0)),
            "size" => Value::Scalar(Scalar::Int(series.len() as i64)),
            "name" => Value::Scalar(series.name.map_or(Scalar::Null, Scalar::Str)),
            "dtypes" => {
                self.charge(series.len())?;
                let dtype = Column::new("", series.values).dtype();
                Value::Scalar(Scalar::from(dtype.name()))
            }
            "values" => {
                self.charge(series.len())?;
                Value::List(series.values)
            }
            "index" => {
                self.charge(series.len())?;
                Value::List((0..series.len()).map(|pos| series.label(pos)).collect())
            }
            "loc" => Value::Loc(Box::new(Value::Series(series))),
            "iloc" => Value::ILoc(Box::new(Value::Series(series))),
            "str" => {
                self.charge(series.len())?;
                if let Some(bad) = series
                    .values
                    .iter()
                    .find(|v| !v.is_null() && v.as_str().is_none())
                {
                    return Err(ExecError::type_error(format!(
                        "the .str accessor needs string values, found {bad}"
                    )));
                }
                Value::StrAccessor(series)
            }
            _ => {
                return Err(ExecError::type_error(format!(
                    "'Series' object has no attribute '{name}'"
                )))
            }
        };
        Ok(value)
    }

    pub(super) fn series_index(&mut self, series: Series, key: Key, lookup: Lookup) -> Result<Value> {
        match key {
            Key::Slice { start, stop } if lookup == Lookup::Label => {
                let positions = self.label_range(&series.labels, start.as_ref(), stop.as_ref())?;
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            Key::Slice { start, stop } => {
                let positions: Vec<usize> =
                    slice_range(series.len(), start.as_ref(), stop.as_ref())?.collect();
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            Key::Value(Value::Series(mask)) => {
                let positions = if lookup == Lookup::Position {
                    mask.mask_positions()?
                } else {
                    self.mask_by_label(&series.labels, &mask)?
                };
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            Key::Value(Value::List(items)) if is_mask(&items, series.len()) => {
                let positions = mask_list_positions(&items);
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            Key::Value(Value::List(items)) => {
                let mut positions = Vec::with_capacity(items.len());
                for item in &items {
                    match (lookup, item) {
                        (Lookup::Position, Scalar::Int(index)) => {
                            positions.push(position(*index, series.len())?)
                        }
                        (Lookup::Position, other) => return Err(positional_key(other)),
                        _ => positions.extend(self.find_label(&series.labels, item)?),
                    }
                }
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            Key::Value(Value::Scalar(item)) => {
                let found = match (lookup, &item) {
                    (Lookup::Position, Scalar::Int(index)) => vec![position(*index, series.len())?],
                    (Lookup::Position, other) => return Err(positional_key(other)),
                    _ => self.find_label(&series.labels, &item)?,
                };
                match found.as_slice() {
                    [single] => Ok(Value::Scalar(series.values[*single].clone())),
                    _ => Ok(Value::Series(self.take(&series, &found)?)),
                }
            }
            Key::Value(other) => Err(ExecError::type_error(format!(
                "cannot index a Series with {}",
                other.kind()
            ))),
        }
    }

    fn take(&mut self, series: &Series, positions: &[usize]) -> Result<Series> {
        self.charge(positions.len())?;
        Ok(series.select(positions))
    }

    /// Label of the first largest (or smallest) non-null value.
    pub(super) fn idx_extreme(&mut self, series: &Series, max: bool) -> Result<Scalar> {
        self.charge(series.len())?;
        let mut best: Option<usize> = None;
        for (pos, value) in series.values.iter().enumerate() {
            if value.is_null() {
                continue;
            }
            let Some(current) = best else {
                best = Some(pos);
                continue;
            };
            let op = if max {
                BinaryOp::GreaterThan
            } else {
                BinaryOp::LessThan
            };
            if ops::compare(op, value, &series.values[current])? {
                best = Some(pos);
            }
        }
        best.map(|pos| series.label(pos)).ok_or_else(|| {
            ExecError::argument(format!(
                "{} of an empty sequence",
                if max { "idxmax" } else { "idxmin" }
            ))
        })
    }

    /// Stable ordering of series positions by value.
    fn value_order(&mut self, series: &Series, ascending: bool) -> Result<Vec<usize>> {
        self.charge(series.len())?;
        let mut order: Vec<usize> = (0..series.len()).collect();
        order.sort_by(|&a, &b| compare_nulls_last(&series.values[a], &series.values[b], ascending));
        Ok(order)
    }

    fn value_counts(
        &mut self,
        series: &Series,
        normalize: bool,
        sort: bool,
        ascending: bool,
        dropna: bool,
    ) -> Result<Series> {
        self.charge(series.len())?;
        let mut index: HashMap<&Scalar, usize> = HashMap::new();
        let mut counts: Vec<(Scalar, usize)> = Vec::new();
        for value in &series.values {
            if dropna && value.is_null() {
                continue;
            }
            match index.get(value) {
                Some(&at) => counts[at].1 += 1,
                None => {
                    index.insert(value, counts.len());
                    counts.push((value.clone(), 1));
                }
            }
        }
        if sort {
            if ascending {
                counts.sort_by_key(|(_, count)| *count);
            } else {
                counts.sort_by(|a, b| b.1.cmp(&a.1));
            }
        }
        let total: usize = counts.iter().map(|(_, count)| count).sum();
        let (keys, values): (Vec<_>, Vec<_>) = counts
            .into_iter()
            .map(|(key, count)| {
                let value = if normalize {
                    Scalar::Float(count as f64 / total as f64)
                } else {
                    Scalar::Int(count as i64)
                };
                (key, value)
            })
            .unzip();
        let name = if normalize { "proportion" } else { "count" };
        Ok(Series::keyed(
            Some(name.to_string()),
            series.name.clone(),
            keys,
            values,
        ))
    }

    pub(super) fn series_method(&mut self, series: Series, name: &str, mut args: Args) -> Result<Value> {
        match name {
            "head" | "tail" => {
                let n = args.int(0, "n", DEFAULT_HEAD_ROWS)?;
                args.finish()?;
                let positions: Vec<usize> = head_tail(series.len(), n, name == "head").collect();
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            "item" => {
                args.finish()?;
                match series.values.as_slice() {
                    [single] => Ok(Value::Scalar(single.clone())),
                    values => Err(ExecError::argument(format!(
                        "item() needs exactly one value, found {}",
                        values.len()
                    ))),
                }
            }
            "tolist" | "to_list" => {
                args.finish()?;
                self.charge(series.len())?;
                Ok(Value::List(series.values))
            }
            "reset_index" => {
                let drop = args.flag(KEYWORD_ONLY, "drop", false)?;
                args.finish()?;
                self.charge(series.len())?;
                if drop {
                    return Ok(Value::Series(Series::positional(series.name, series.values)));
                }
                let index_name = series.index_name.clone().unwrap_or_else(|| "index".to_string());
                let value_name = series.name.clone().unwrap_or_else(|| "0".to_string());
                let labels = (0..series.len()).map(|pos| series.label(pos)).collect();
                let columns = vec![
                    Column::new(index_name, labels),
                    Column::new(value_name, series.values),
                ];
                Ok(Value::Frame(Frame::from_columns(columns, None, None)?))
            }
            "isin" => {
                let wanted: HashSet<Scalar> = match args.require(0, "values")? {
                    Value::List(items) => items.into_iter().collect(),
                    Value::Series(other) => other.values.into_iter().collect(),
                    other => {
                        return Err(ExecError::type_error(format!(
                            "isin() expects a list, not {}",
                            other.kind()
                        )))
                    }
                };
                args.finish()?;
                self.map_value(Value::Series(series), |v| Ok(Scalar::Bool(wanted.contains(v))))
            }
            "between" => {
                let left = args
                    .scalar(0, "left")?
                    .ok_or_else(|| ExecError::argument("between() missing required argument 'left'"))?;
                let right = args
                    .scalar(1, "right")?
                    .ok_or_else(|| ExecError::argument("between() missing required argument 'right'"))?;
                let inclusive = args.text(2, "inclusive")?;
                args.finish()?;
                let (low, high) = match inclusive.as_deref() {
                    None | Some("both") => (BinaryOp::GreaterThanOrEqual, BinaryOp::LessThanOrEqual),
                    Some("neither") => (BinaryOp::GreaterThan, BinaryOp::LessThan),
                    Some("left") => (BinaryOp::GreaterThanOrEqual, BinaryOp::LessThan),
                    Some("right") => (BinaryOp::GreaterThan, BinaryOp::LessThanOrEqual),
                    Some(other) => {
                        return Err(ExecError::argument(format!(
                            "inclusive must be 'both', 'neither', 'left' or 'right', not '{other}'"
                        )))
                    }
                };
                self.map_value(Value::Series(series), |v| {
                    Ok(Scalar::Bool(
                        ops::compare(low, v, &left)? && ops::compare(high, v, &right)?,
                    ))
                })
            }
            "isna" | "isnull" | "notna" | "notnull" => {
                args.finish()?;
                let present = name.starts_with("not");
                self.map_value(Value::Series(series), |v| Ok(Scalar::Bool(v.is_null() != present)))
            }
            "fillna" => {
                let fill = args
                    .scalar(0, "value")?
                    .ok_or_else(|| ExecError::argument("fillna() missing required argument 'value'"))?;
                args.finish()?;
                self.map_value(Value::Series(series), |v| {
                    Ok(if v.is_null() { fill.clone() } else { v.clone() })
                })
            }
            "dropna" => {
                args.finish()?;
                let positions: Vec<usize> = (0..series.len())
                    .filter(|&pos| !series.values[pos].is_null())
                    .collect();
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            "drop_duplicates" => {
                let keep = Keep::from_args(&mut args, 0)?;
                args.finish()?;
                self.charge(series.len())?;
                let positions = distinct_positions(&series.values, keep);
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            "unique" => {
                args.finish()?;
                self.charge(series.len())?;
                let positions = distinct_positions(&series.values, Keep::First);
                Ok(Value::List(
                    positions.into_iter().map(|pos| series.values[pos].clone()).collect(),
                ))
            }
            "value_counts" => {
                let normalize = args.flag(0, "normalize", false)?;
                let sort = args.flag(1, "sort", true)?;
                let ascending = args.flag(2, "ascending", false)?;
                let dropna = args.flag(KEYWORD_ONLY, "dropna", true)?;
                args.finish()?;
                Ok(Value::Series(self.value_counts(
                    &series, normalize, sort, ascending, dropna,
                )?))
            }
            "idxmax" | "idxmin" => {
                args.finish()?;
                Ok(Value::Scalar(self.idx_extreme(&series, name == "idxmax")?))
            }
            "mode" => {
                args.finish()?;
                let counts = self.value_counts(&series, false, false, false, true)?;
                let top = counts.values.iter().filter_map(Scalar::as_i64).max().unwrap_or(0);
                let mut modes: Vec<Scalar> = (0..counts.len())
                    .filter(|&pos| counts.values[pos].as_i64() == Some(top))
                    .map(|pos| counts.label(pos))
                    .collect();
                modes.sort_by(|a, b| a.sort_cmp(b));
                Ok(Value::Series(Series::positional(series.name, modes)))
            }
            "sort_values" => {
                let ascending = args.flag(KEYWORD_ONLY, "ascending", true)?;
                args.finish()?;
                let order = self.value_order(&series, ascending)?;
                Ok(Value::Series(self.take(&series, &order)?))
            }
            "sort_index" => {
                let ascending = args.flag(KEYWORD_ONLY, "ascending", true)?;
                args.finish()?;
                self.charge(series.len())?;
                let mut order: Vec<usize> = (0..series.len()).collect();
                order.sort_by(|&a, &b| {
                    compare_nulls_last(&series.label(a), &series.label(b), ascending)
                });
                Ok(Value::Series(self.take(&series, &order)?))
            }
            "nlargest" | "nsmallest" => {
                let n = args.int(0, "n", DEFAULT_HEAD_ROWS)?;
                args.finish()?;
                let order = self.value_order(&series, name == "nsmallest")?;
                let positions: Vec<usize> = order
                    .into_iter()
                    .filter(|&pos| !series.values[pos].is_null())
                    .take(usize::try_from(n).unwrap_or(0))
                    .collect();
                Ok(Value::Series(self.take(&series, &positions)?))
            }
            "abs" => {
                args.finish()?;
                self.map_value(Value::Series(series), ops::abs)
            }
            "round" => {
                let decimals = args.int(0, "decimals", 0)?;
                args.finish()?;
                self.map_value(Value::Series(series), |v| ops::round(v, decimals))
            }
            "agg" | "aggregate" => {
                let (aggs, single) = aggregations(&mut args)?;
                args.finish()?;
                self.charge(series.len() * aggs.len())?;
                if single {
                    return Ok(Value::Scalar(aggs[0].1.apply(&series.values)?));
                }
                let mut keys = Vec::with_capacity(aggs.len());
                let mut values = Vec::with_capacity(aggs.len());
                for (name, agg) in aggs {
                    values.push(agg.apply(&series.values)?);
                    keys.push(Scalar::Str(name));
                }
                Ok(Value::Series(Series::keyed(series.name, None, keys, values)))
            }
            _ => {
                let Some(agg) = Agg::from_name(name).filter(|agg| *agg != Agg::Size) else {
                    return Err(no_method(&Value::Series(series), name));
                };
                args.finish()?;
                self.charge(series.len())?;
                if series.values.iter().any(|v| v.dtype() == Some(DType::Str))
                    && agg.numeric_only()
                {
                    return Err(ExecError::type_error(format!(
                        "cannot compute {name} of a text column"
                    )));
                }
                Ok(Value::Scalar(agg.apply(&series.values)?))
            }
        }
    }
}

fn positional_key(item: &Scalar) -> ExecError {
    ExecError::argument(format!("positional indexers must be integers, found {item}"))
}
