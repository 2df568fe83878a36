use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::ops::Range;

use tabula_table::{Column, DType, Scalar};

use super::aggregate::Agg;
use super::ops;
use super::value::{Frame, GroupBy, Selection, Series, Value};
use super::{
    compare_nulls_last, is_mask, mask_list_positions, no_method, position, slice_range, Args,
    Evaluator, Key, Lookup, KEYWORD_ONLY,
};
use crate::error::{ExecError, Result};

pub(super) const DEFAULT_HEAD_ROWS: i64 = 5;

/// Which copy of a duplicate survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Keep {
    First,
    Last,
    None,
}

impl Keep {
    pub(super) fn from_args(args: &mut Args, index: usize) -> Result<Self> {
        match args.scalar(index, "keep")? {
            None => Ok(Self::First),
            Some(Scalar::Str(keep)) if keep == "first" => Ok(Self::First),
            Some(Scalar::Str(keep)) if keep == "last" => Ok(Self::Last),
            Some(Scalar::Bool(false)) => Ok(Self::None),
            Some(other) => Err(ExecError::argument(format!(
                "keep must be 'first', 'last' or False, not {other}"
            ))),
        }
    }
}

/// Positions that survive de-duplication, in their original order.
pub(super) fn distinct_positions<T: Hash + Eq>(keys: &[T], keep: Keep) -> Vec<usize> {
    match keep {
        Keep::First => {
            let mut seen = HashSet::with_capacity(keys.len());
            (0..keys.len()).filter(|&pos| seen.insert(&keys[pos])).collect()
        }
        Keep::Last => {
            let mut seen = HashSet::with_capacity(keys.len());
            let mut out: Vec<usize> = (0..keys.len())
                .rev()
                .filter(|&pos| seen.insert(&keys[pos]))
                .collect();
            out.reverse();
            out
        }
        Keep::None => {
            let mut counts: HashMap<&T, usize> = HashMap::with_capacity(keys.len());
            for key in keys {
                *counts.entry(key).or_default() += 1;
            }
            (0..keys.len()).filter(|&pos| counts[&keys[pos]] == 1).collect()
        }
    }
}

/// Rows kept by `head(n)` or `tail(n)`; negative `n` counts from the other end.
pub(super) fn head_tail(len: usize, n: i64, head: bool) -> Range<usize> {
    let n_abs = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX).min(len);
    match (head, n >= 0) {
        (true, true) => 0..n_abs,
        (true, false) => 0..len - n_abs,
        (false, true) => len - n_abs..len,
        (false, false) => n_abs..len,
    }
}

enum Pick {
    One(usize),
    Many(Vec<usize>),
}

impl Evaluator<'_> {
    pub(super) fn frame_attribute(&mut self, frame: Frame, name: &str) -> Result<Value> {
        let value = match name {
            "shape" => Value::List(vec![
                Scalar::Int(frame.len() as i64),
                Scalar::Int(frame.columns.len() as i64),
            ]),
            "columns" => Value::List(frame.column_names().into_iter().map(Scalar::Str).collect()),
            "empty" => Value::Scalar(Scalar::Bool(frame.len() == 0 || frame.columns.is_empty())),
            "size" => Value::Scalar(Scalar::Int((frame.len() * frame.columns.len()) as i64)),
            "dtypes" => {
                let dtypes = frame
                    .columns
                    .iter()
                    .map(|&c| Scalar::from(frame.table.column_at(c).dtype().name()))
                    .collect();
                let names = frame.column_names().into_iter().map(Scalar::Str).collect();
                Value::Series(Series::keyed(None, None, names, dtypes))
            }
            "index" => {
                self.charge(frame.len())?;
                Value::List(frame.rows.iter().map(|&r| frame.label(r)).collect())
            }
            "loc" => Value::Loc(Box::new(Value::Frame(frame))),
            "iloc" => Value::ILoc(Box::new(Value::Frame(frame))),
            _ => {
                let column = frame.resolve(name)?;
                self.charge(frame.len())?;
                Value::Series(frame.series(column))
            }
        };
        Ok(value)
    }

    /// `df[key]`: a column, a list of columns, a boolean mask or a row slice.
    pub(super) fn frame_index(&mut self, frame: Frame, key: Key) -> Result<Value> {
        match key {
            Key::Value(Value::Scalar(Scalar::Str(name))) => {
                let column = frame.resolve(&name)?;
                self.charge(frame.len())?;
                Ok(Value::Series(frame.series(column)))
            }
            Key::Value(Value::List(items)) if is_mask(&items, frame.len()) => {
                let positions = mask_list_positions(&items);
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            Key::Value(Value::List(items)) => {
                let columns = self.columns_by_name(&frame, &items)?;
                Ok(Value::Frame(frame.with_columns(columns)))
            }
            Key::Value(Value::Series(mask)) => {
                let positions = self.mask_by_label(&frame.labels(), &mask)?;
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            Key::Slice { start, stop } => {
                let range = slice_range(frame.len(), start.as_ref(), stop.as_ref())?;
                let positions: Vec<usize> = range.collect();
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            Key::Value(Value::Scalar(other)) => Err(ExecError::UnknownColumn(other.to_string())),
            Key::Value(other) => Err(ExecError::type_error(format!(
                "cannot index a DataFrame with {}",
                other.kind()
            ))),
        }
    }

    /// `.loc[rows, cols]` and `.iloc[rows, cols]`.
    pub(super) fn frame_locate(
        &mut self,
        frame: Frame,
        mut keys: Vec<Key>,
        lookup: Lookup,
    ) -> Result<Value> {
        if keys.is_empty() || keys.len() > 2 {
            return Err(ExecError::argument(format!(
                "expected one or two indexers, found {}",
                keys.len()
            )));
        }
        let column_key = if keys.len() == 2 { keys.pop() } else { None };
        let row_key = keys.remove(0);

        let rows = self.pick_rows(&frame, row_key, lookup)?;
        let columns = match column_key {
            None => Pick::Many(frame.columns.clone()),
            Some(key) => pick_columns(&frame, key, lookup)?,
        };

        match (rows, columns) {
            (Pick::One(pos), Pick::One(column)) => Ok(Value::Scalar(
                frame.table.value(frame.rows[pos], column).clone(),
            )),
            (Pick::One(pos), Pick::Many(columns)) => {
                self.charge(columns.len())?;
                Ok(Value::Series(frame.with_columns(columns).row(pos)))
            }
            (Pick::Many(positions), Pick::One(column)) => {
                let rows = self.take_rows(&frame, &positions)?;
                Ok(Value::Series(rows.series(column)))
            }
            (Pick::Many(positions), Pick::Many(columns)) => Ok(Value::Frame(
                self.take_rows(&frame, &positions)?.with_columns(columns),
            )),
        }
    }

    fn pick_rows(&mut self, frame: &Frame, key: Key, lookup: Lookup) -> Result<Pick> {
        if key.is_full_slice() {
            return Ok(Pick::Many((0..frame.len()).collect()));
        }
        let labels = frame.labels();
        match key {
            Key::Slice { start, stop } if lookup == Lookup::Position => Ok(Pick::Many(
                slice_range(frame.len(), start.as_ref(), stop.as_ref())?.collect(),
            )),
            Key::Slice { start, stop } => Ok(Pick::Many(self.label_range(
                &labels,
                start.as_ref(),
                stop.as_ref(),
            )?)),
            Key::Value(Value::Series(mask)) if lookup == Lookup::Position => {
                if mask.len() != frame.len() {
                    return Err(ExecError::argument(format!(
                        "boolean mask of length {} does not match {} rows",
                        mask.len(),
                        frame.len()
                    )));
                }
                Ok(Pick::Many(mask.mask_positions()?))
            }
            Key::Value(Value::Series(mask)) => Ok(Pick::Many(self.mask_by_label(&labels, &mask)?)),
            Key::Value(Value::List(items)) if is_mask(&items, frame.len()) => {
                Ok(Pick::Many(mask_list_positions(&items)))
            }
            Key::Value(Value::List(items)) => {
                let mut positions = Vec::with_capacity(items.len());
                for item in &items {
                    match lookup {
                        Lookup::Position => positions.push(position(int_key(item)?, frame.len())?),
                        _ => positions.extend(self.find_label(&labels, item)?),
                    }
                }
                Ok(Pick::Many(positions))
            }
            Key::Value(Value::Scalar(item)) => match lookup {
                Lookup::Position => Ok(Pick::One(position(int_key(&item)?, frame.len())?)),
                _ => {
                    let mut found = self.find_label(&labels, &item)?;
                    if found.len() == 1 {
                        Ok(Pick::One(found.remove(0)))
                    } else {
                        Ok(Pick::Many(found))
                    }
                }
            },
            Key::Value(other) => Err(ExecError::type_error(format!(
                "cannot select rows with {}",
                other.kind()
            ))),
        }
    }

    fn columns_by_name(&self, frame: &Frame, names: &[Scalar]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| match name {
                Scalar::Str(name) => frame.resolve(name),
                other => Err(ExecError::UnknownColumn(other.to_string())),
            })
            .collect()
    }

    /// Frame restricted to the given frame positions.
    pub(super) fn take_rows(&mut self, frame: &Frame, positions: &[usize]) -> Result<Frame> {
        self.charge(positions.len())?;
        Ok(frame.with_rows(positions.iter().map(|&p| frame.rows[p]).collect()))
    }

    /// Copies the frame into a fresh table labelled 0..n, optionally with the
    /// current labels as a leading column.
    pub(super) fn materialize(&mut self, frame: &Frame, keep_index: bool) -> Result<Frame> {
        self.charge(frame.len() * (frame.columns.len() + 1))?;
        let mut columns = Vec::with_capacity(frame.columns.len() + 1);
        if keep_index {
            let name = frame.index_name.clone().unwrap_or_else(|| "index".to_string());
            columns.push(Column::new(
                name,
                frame.rows.iter().map(|&r| frame.label(r)).collect(),
            ));
        }
        for &c in &frame.columns {
            columns.push(Column::new(
                frame.table.column_at(c).name(),
                frame.rows.iter().map(|&r| frame.table.value(r, c).clone()).collect(),
            ));
        }
        Frame::from_columns(columns, None, None)
    }

    /// Stable ordering of frame positions by the given columns.
    fn sort_order(&mut self, frame: &Frame, columns: &[usize], ascending: &[bool]) -> Result<Vec<usize>> {
        self.charge(frame.len() * columns.len().max(1))?;
        let mut order: Vec<usize> = (0..frame.len()).collect();
        order.sort_by(|&a, &b| {
            columns
                .iter()
                .zip(ascending)
                .map(|(&c, &asc)| {
                    compare_nulls_last(
                        frame.table.value(frame.rows[a], c),
                        frame.table.value(frame.rows[b], c),
                        asc,
                    )
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(order)
    }

    /// One aggregate per column, labelled by column name. Text columns are
    /// skipped for numeric aggregations.
    pub(super) fn frame_aggregate(&mut self, frame: &Frame, agg: Agg) -> Result<Series> {
        self.charge(frame.len() * frame.columns.len())?;
        let mut names = Vec::new();
        let mut values = Vec::new();
        for &c in &frame.columns {
            let column = frame.table.column_at(c);
            if agg.numeric_only() && column.dtype() == DType::Str {
                continue;
            }
            let cells: Vec<Scalar> = frame
                .rows
                .iter()
                .map(|&r| frame.table.value(r, c).clone())
                .collect();
            names.push(Scalar::from(column.name()));
            values.push(agg.apply(&cells)?);
        }
        Ok(Series::keyed(None, None, names, values))
    }

    pub(super) fn frame_method(&mut self, frame: Frame, name: &str, mut args: Args) -> Result<Value> {
        match name {
            "head" | "tail" => {
                let n = args.int(0, "n", DEFAULT_HEAD_ROWS)?;
                args.finish()?;
                let positions: Vec<usize> = head_tail(frame.len(), n, name == "head").collect();
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            "sort_values" => {
                let by = args
                    .names(0, "by")?
                    .ok_or_else(|| ExecError::argument("sort_values() missing required argument 'by'"))?;
                let ascending = args.flags(KEYWORD_ONLY, "ascending", by.len())?;
                args.finish()?;
                let columns = by
                    .iter()
                    .map(|name| frame.resolve(name))
                    .collect::<Result<Vec<_>>>()?;
                let order = self.sort_order(&frame, &columns, &ascending)?;
                Ok(Value::Frame(self.take_rows(&frame, &order)?))
            }
            "nlargest" | "nsmallest" => {
                let n = args.int(0, "n", DEFAULT_HEAD_ROWS)?;
                let by = args
                    .names(1, "columns")?
                    .ok_or_else(|| ExecError::argument(format!("{name}() missing required argument 'columns'")))?;
                args.finish()?;
                let columns = by
                    .iter()
                    .map(|name| frame.resolve(name))
                    .collect::<Result<Vec<_>>>()?;
                let ascending = vec![name == "nsmallest"; columns.len()];
                let order = self.sort_order(&frame, &columns, &ascending)?;
                let keep = usize::try_from(n).unwrap_or(0);
                let positions: Vec<usize> = order
                    .into_iter()
                    .filter(|&p| !frame.table.value(frame.rows[p], columns[0]).is_null())
                    .take(keep)
                    .collect();
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            "sort_index" => {
                let ascending = args.flag(KEYWORD_ONLY, "ascending", true)?;
                args.finish()?;
                self.charge(frame.len())?;
                let mut order: Vec<usize> = (0..frame.len()).collect();
                order.sort_by(|&a, &b| {
                    compare_nulls_last(
                        &frame.label(frame.rows[a]),
                        &frame.label(frame.rows[b]),
                        ascending,
                    )
                });
                Ok(Value::Frame(self.take_rows(&frame, &order)?))
            }
            "drop_duplicates" => {
                let subset = args.names(0, "subset")?;
                let keep = Keep::from_args(&mut args, 1)?;
                args.finish()?;
                let columns = match subset {
                    Some(names) => names
                        .iter()
                        .map(|name| frame.resolve(name))
                        .collect::<Result<Vec<_>>>()?,
                    None => frame.columns.clone(),
                };
                self.charge(frame.len() * columns.len())?;
                let keys: Vec<Vec<&Scalar>> = frame
                    .rows
                    .iter()
                    .map(|&r| columns.iter().map(|&c| frame.table.value(r, c)).collect())
                    .collect();
                let positions = distinct_positions(&keys, keep);
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            "dropna" => {
                let subset = args.names(KEYWORD_ONLY, "subset")?;
                let how = args.text(KEYWORD_ONLY, "how")?;
                args.finish()?;
                let all = match how.as_deref() {
                    None | Some("any") => false,
                    Some("all") => true,
                    Some(other) => {
                        return Err(ExecError::argument(format!(
                            "how must be 'any' or 'all', not '{other}'"
                        )))
                    }
                };
                let columns = match subset {
                    Some(names) => names
                        .iter()
                        .map(|name| frame.resolve(name))
                        .collect::<Result<Vec<_>>>()?,
                    None => frame.columns.clone(),
                };
                self.charge(frame.len() * columns.len())?;
                let positions: Vec<usize> = (0..frame.len())
                    .filter(|&p| {
                        let mut nulls = columns
                            .iter()
                            .map(|&c| frame.table.value(frame.rows[p], c).is_null());
                        if all {
                            !nulls.all(|null| null)
                        } else {
                            !nulls.any(|null| null)
                        }
                    })
                    .collect();
                Ok(Value::Frame(self.take_rows(&frame, &positions)?))
            }
            "groupby" => {
                let by = args
                    .names(0, "by")?
                    .ok_or_else(|| ExecError::argument("groupby() missing required argument 'by'"))?;
                let as_index = args.flag(KEYWORD_ONLY, "as_index", true)?;
                let sort = args.flag(KEYWORD_ONLY, "sort", true)?;
                args.finish()?;
                let [key] = by.as_slice() else {
                    return Err(ExecError::argument(format!(
                        "groupby() takes exactly one key column, found {}",
                        by.len()
                    )));
                };
                let key = frame.resolve(key)?;
                Ok(Value::GroupBy(GroupBy {
                    frame,
                    key,
                    selection: Selection::All,
                    as_index,
                    sort,
                }))
            }
            "reset_index" => {
                let drop = args.flag(KEYWORD_ONLY, "drop", false)?;
                args.finish()?;
                Ok(Value::Frame(self.materialize(&frame, !drop)?))
            }
            "isna" | "isnull" | "notna" | "notnull" => {
                args.finish()?;
                let present = name.starts_with("not");
                self.map_value(Value::Frame(frame), |v| Ok(Scalar::Bool(v.is_null() != present)))
            }
            "fillna" => {
                let fill = args
                    .scalar(0, "value")?
                    .ok_or_else(|| ExecError::argument("fillna() missing required argument 'value'"))?;
                args.finish()?;
                self.map_value(Value::Frame(frame), |v| {
                    Ok(if v.is_null() { fill.clone() } else { v.clone() })
                })
            }
            "abs" => {
                args.finish()?;
                self.map_value(Value::Frame(frame), ops::abs)
            }
            "round" => {
                let decimals = args.int(0, "decimals", 0)?;
                args.finish()?;
                self.map_value(Value::Frame(frame), |v| ops::round(v, decimals))
            }
            "idxmax" | "idxmin" => {
                args.finish()?;
                let mut names = Vec::new();
                let mut labels = Vec::new();
                for &c in &frame.columns {
                    if frame.table.column_at(c).dtype() == DType::Str {
                        continue;
                    }
                    self.charge(frame.len())?;
                    let series = frame.series(c);
                    names.push(Scalar::from(frame.table.column_at(c).name()));
                    labels.push(self.idx_extreme(&series, name == "idxmax")?);
                }
                Ok(Value::Series(Series::keyed(None, None, names, labels)))
            }
            "agg" | "aggregate" => {
                let (aggs, single) = aggregations(&mut args)?;
                args.finish()?;
                match aggs.as_slice() {
                    [(_, agg)] if single => Ok(Value::Series(self.frame_aggregate(&frame, *agg)?)),
                    _ => {
                        let mut per_agg = Vec::with_capacity(aggs.len());
                        for (_, agg) in &aggs {
                            per_agg.push(self.frame_aggregate(&frame, *agg)?);
                        }
                        let mut columns = Vec::new();
                        for &c in &frame.columns {
                            let column = frame.table.column_at(c);
                            let label = Scalar::from(column.name());
                            let values = per_agg
                                .iter()
                                .map(|series| {
                                    (0..series.len())
                                        .find(|&p| series.label(p) == label)
                                        .map_or(Scalar::Null, |p| series.values[p].clone())
                                })
                                .collect();
                            columns.push(Column::new(column.name(), values));
                        }
                        let keys = aggs.into_iter().map(|(name, _)| Scalar::Str(name)).collect();
                        Ok(Value::Frame(Frame::from_columns(columns, Some(keys), None)?))
                    }
                }
            }
            _ => {
                let Some(agg) = Agg::from_name(name).filter(|agg| *agg != Agg::Size) else {
                    return Err(no_method(&Value::Frame(frame), name));
                };
                // Numeric aggregations skip text columns whatever this says.
                args.flag(KEYWORD_ONLY, "numeric_only", false)?;
                args.finish()?;
                Ok(Value::Series(self.frame_aggregate(&frame, agg)?))
            }
        }
    }
}

/// Aggregation names from the first argument of `agg()`: a single name or
/// a list. The flag is `true` for the single-name form.
pub(super) fn aggregations(args: &mut Args) -> Result<(Vec<(String, Agg)>, bool)> {
    let (names, single) = match args.require(0, "func")? {
        Value::Scalar(Scalar::Str(name)) => (vec![name], true),
        Value::List(items) => (
            items
                .into_iter()
                .map(|item| match item {
                    Scalar::Str(name) => Ok(name),
                    other => Err(ExecError::argument(format!(
                        "aggregation names must be strings, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
            false,
        ),
        other => {
            return Err(ExecError::argument(format!(
                "agg() expects an aggregation name or a list of names, not {}",
                other.kind()
            )))
        }
    };
    let aggs = names
        .into_iter()
        .map(|name| match Agg::from_name(&name) {
            Some(agg) => Ok((name, agg)),
            None => Err(ExecError::DisallowedOperation(name)),
        })
        .collect::<Result<Vec<_>>>()?;
    if aggs.is_empty() {
        return Err(ExecError::argument("agg() needs at least one aggregation"));
    }
    Ok((aggs, single))
}

fn int_key(item: &Scalar) -> Result<i64> {
    match item {
        Scalar::Int(index) => Ok(*index),
        other => Err(ExecError::argument(format!(
            "positional indexers must be integers, found {other}"
        ))),
    }
}

fn pick_columns(frame: &Frame, key: Key, lookup: Lookup) -> Result<Pick> {
    if key.is_full_slice() {
        return Ok(Pick::Many(frame.columns.clone()));
    }
    let names = frame.column_names();
    let by_name = |name: &Scalar| -> Result<usize> {
        match name {
            Scalar::Str(name) => frame.resolve(name),
            other => Err(ExecError::UnknownColumn(other.to_string())),
        }
    };
    let by_position =
        |item: &Scalar| -> Result<usize> { Ok(frame.columns[position(int_key(item)?, frame.columns.len())?]) };
    match (key, lookup) {
        (Key::Slice { start, stop }, Lookup::Position) => Ok(Pick::Many(
            frame.columns[slice_range(frame.columns.len(), start.as_ref(), stop.as_ref())?].to_vec(),
        )),
        (Key::Slice { start, stop }, _) => {
            let find = |bound: &Scalar| {
                names
                    .iter()
                    .position(|name| bound.as_str() == Some(name.as_str()))
                    .ok_or_else(|| ExecError::UnknownColumn(bound.to_string()))
            };
            let first = start.as_ref().map(find).transpose()?.unwrap_or(0);
            let last = stop
                .as_ref()
                .map(find)
                .transpose()?
                .map_or(names.len(), |pos| pos + 1);
            Ok(Pick::Many(frame.columns[first..last.max(first)].to_vec()))
        }
        (Key::Value(Value::Scalar(item)), Lookup::Position) => Ok(Pick::One(by_position(&item)?)),
        (Key::Value(Value::Scalar(item)), _) => Ok(Pick::One(by_name(&item)?)),
        (Key::Value(Value::List(items)), Lookup::Position) => Ok(Pick::Many(
            items.iter().map(by_position).collect::<Result<Vec<_>>>()?,
        )),
        (Key::Value(Value::List(items)), _) => Ok(Pick::Many(
            items.iter().map(by_name).collect::<Result<Vec<_>>>()?,
        )),
        (Key::Value(other), _) => Err(ExecError::type_error(format!(
            "cannot select columns with {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::Labels;
    use crate::eval::Budget;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tabula_table::Table;

    fn table() -> Arc<Table> {
        let csv = "region,product,revenue,units\n\
                   North,Widget,100,3\n\
                   South,Gadget,250,5\n\
                   North,Gadget,650,\n\
                   East,Widget,250,1\n";
        Arc::new(Table::from_reader(csv.as_bytes()).unwrap())
    }

    fn eval(source: &str) -> Result<Value> {
        let table = table();
        let mut evaluator = Evaluator::new(&table, Budget::new(100_000, Duration::from_secs(5)));
        evaluator.eval(&parse(source).unwrap())
    }

    fn frame(source: &str) -> Frame {
        match eval(source).unwrap() {
            Value::Frame(frame) => frame,
            other => panic!("expected a frame for {source}, got {}", other.kind()),
        }
    }

    fn column(frame: &Frame, name: &str) -> Vec<Scalar> {
        frame.series(frame.resolve(name).unwrap()).values
    }

    #[test]
    fn head_and_tail_accept_negative_counts() {
        assert_eq!(head_tail(4, 2, true), 0..2);
        assert_eq!(head_tail(4, -1, true), 0..3);
        assert_eq!(head_tail(4, 10, false), 0..4);
        assert_eq!(head_tail(4, -3, false), 3..4);
        assert_eq!(frame("df.tail(1)").rows, vec![3]);
    }

    #[test]
    fn boolean_filters_keep_row_labels() {
        let filtered = frame("df[(df['revenue'] > 200) & (df['region'] != 'South')]");
        assert_eq!(filtered.rows, vec![2, 3]);
        let chained = frame("df[df['revenue'] > 200][df['units'] > 2]");
        assert_eq!(chained.rows, vec![1]);
    }

    #[test]
    fn sort_values_is_stable_with_nulls_last() {
        let sorted = frame("df.sort_values('revenue', ascending=False)");
        assert_eq!(sorted.rows, vec![2, 1, 3, 0]);
        let by_units = frame("df.sort_values(by=['units'])");
        assert_eq!(by_units.rows, vec![3, 0, 1, 2]);
        let multi = frame("df.sort_values(['revenue', 'region'], ascending=[False, True])");
        assert_eq!(multi.rows, vec![2, 3, 1, 0]);
    }

    #[test]
    fn nlargest_skips_nulls() {
        assert_eq!(frame("df.nlargest(2, 'revenue')").rows, vec![2, 1]);
        assert_eq!(frame("df.nsmallest(10, 'units')").rows, vec![3, 0, 1]);
    }

    #[test]
    fn loc_and_iloc_selection() {
        assert_eq!(
            match eval("df.loc[2, 'revenue']").unwrap() {
                Value::Scalar(v) => v,
                other => panic!("{}", other.kind()),
            },
            Scalar::Int(650)
        );
        let Value::Series(series) = eval("df.loc[df['units'] > 2, 'product']").unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(series.values, vec![Scalar::from("Widget"), Scalar::from("Gadget")]);

        let Value::Series(row) = eval("df.iloc[-1]").unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values[0], Scalar::from("East"));

        let sub = frame("df.iloc[1:3, 0:2]");
        assert_eq!(sub.rows, vec![1, 2]);
        assert_eq!(sub.column_names(), vec!["region", "product"]);

        assert!(matches!(
            eval("df.iloc[10]"),
            Err(ExecError::OutOfRange { index: 10, len: 4 })
        ));
        assert!(matches!(eval("df.loc[99]"), Err(ExecError::MissingLabel(_))));
    }

    #[test]
    fn column_subsets_and_unknown_columns() {
        assert_eq!(
            frame("df[['units', 'region']]").column_names(),
            vec!["units", "region"]
        );
        assert_eq!(
            eval("df['profit']").unwrap_err(),
            ExecError::UnknownColumn("profit".into())
        );
    }

    #[test]
    fn drop_duplicates_and_dropna() {
        assert_eq!(frame("df.drop_duplicates(subset='region')").rows, vec![0, 1, 3]);
        assert_eq!(
            frame("df.drop_duplicates(subset=['product'], keep='last')").rows,
            vec![2, 3]
        );
        assert_eq!(frame("df.drop_duplicates('revenue', keep=False)").rows, vec![0, 2]);
        assert_eq!(frame("df.dropna()").rows, vec![0, 1, 3]);
    }

    #[test]
    fn per_column_aggregates_skip_text() {
        let Value::Series(sums) = eval("df.sum()").unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(
            sums.labels,
            Labels::Keys(vec![Scalar::from("revenue"), Scalar::from("units")])
        );
        assert_eq!(sums.values, vec![Scalar::Int(1250), Scalar::Int(9)]);

        let Value::Series(counts) = eval("df.count()").unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(counts.values[3], Scalar::Int(3));
    }

    #[test]
    fn reset_index_materializes_labels() {
        let reset = frame("df[df['region'] == 'North'].reset_index()");
        assert_eq!(reset.column_names()[0], "index");
        assert_eq!(column(&reset, "index"), vec![Scalar::Int(0), Scalar::Int(2)]);
        let dropped = frame("df[df['region'] == 'North'].reset_index(drop=True)");
        assert_eq!(dropped.labels(), Labels::Rows(vec![0, 1]));
    }

    #[test]
    fn shape_columns_and_dtypes() {
        let Value::List(shape) = eval("df.shape").unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(shape, vec![Scalar::Int(4), Scalar::Int(4)]);
        let Value::Series(dtypes) = eval("df.dtypes").unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(
            dtypes.values,
            vec![
                Scalar::from("object"),
                Scalar::from("object"),
                Scalar::from("int64"),
                Scalar::from("int64")
            ]
        );
    }

    #[test]
    fn distinct_positions_modes() {
        let keys = [1, 2, 1, 3, 2];
        assert_eq!(distinct_positions(&keys, Keep::First), vec![0, 1, 3]);
        assert_eq!(distinct_positions(&keys, Keep::Last), vec![2, 3, 4]);
        assert_eq!(distinct_positions(&keys, Keep::None), vec![3]);
    }
}
