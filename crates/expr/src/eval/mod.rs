//! Budgeted tree-walking evaluator.
//!
//! Every node charges one step, and every operation that touches rows charges
//! one step per row, so the step limit bounds total work regardless of how the
//! expression is shaped. The wall-clock deadline is checked on each charge.

mod aggregate;
mod frame;
mod groupby;
mod ops;
mod series;
mod strings;
pub(crate) mod value;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tabula_table::{Column, Scalar, Table};

use crate::ast::{BinaryOp, Expr, IndexKey, Literal, UnaryOp};
use crate::error::{ExecError, Result};
use crate::validate::TABLE_NAME;
use value::{Frame, Labels, Series};
pub(crate) use value::Value;

pub(crate) struct Budget {
    max_steps: u64,
    used: u64,
    max_duration: Duration,
    deadline: Option<Instant>,
}

impl Budget {
    pub(crate) fn new(max_steps: u64, max_duration: Duration) -> Self {
        Self {
            max_steps,
            used: 0,
            max_duration,
            deadline: Instant::now().checked_add(max_duration),
        }
    }

    pub(crate) fn charge(&mut self, steps: usize) -> Result<()> {
        self.used = self.used.saturating_add(steps as u64);
        if self.used > self.max_steps {
            return Err(ExecError::BudgetExhausted(self.max_steps));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ExecError::DeadlineExceeded(self.max_duration));
        }
        Ok(())
    }

    pub(crate) fn used(&self) -> u64 {
        self.used
    }
}

/// Position that never matches a positional argument.
pub(crate) const KEYWORD_ONLY: usize = usize::MAX;

/// Evaluated call arguments, consumed by position or keyword.
pub(crate) struct Args {
    callee: String,
    positional: Vec<Option<Value>>,
    named: Vec<(String, Value)>,
}

impl Args {
    pub(crate) fn value(&mut self, index: usize, name: &str) -> Option<Value> {
        if let Some(value) = self.positional.get_mut(index).and_then(Option::take) {
            return Some(value);
        }
        let pos = self.named.iter().position(|(key, _)| key == name)?;
        Some(self.named.remove(pos).1)
    }

    pub(crate) fn scalar(&mut self, index: usize, name: &str) -> Result<Option<Scalar>> {
        match self.value(index, name) {
            None => Ok(None),
            Some(Value::Scalar(scalar)) => Ok(Some(scalar)),
            Some(other) => Err(ExecError::type_error(format!(
                "{}() argument '{name}' must be a scalar, not {}",
                self.callee,
                other.kind()
            ))),
        }
    }

    pub(crate) fn int(&mut self, index: usize, name: &str, default: i64) -> Result<i64> {
        match self.scalar(index, name)? {
            None => Ok(default),
            Some(Scalar::Int(value)) => Ok(value),
            Some(other) => Err(ExecError::argument(format!(
                "{}() argument '{name}' must be an integer, not {other}",
                self.callee
            ))),
        }
    }

    pub(crate) fn flag(&mut self, index: usize, name: &str, default: bool) -> Result<bool> {
        match self.scalar(index, name)? {
            None => Ok(default),
            Some(Scalar::Bool(value)) => Ok(value),
            Some(other) => Err(ExecError::argument(format!(
                "{}() argument '{name}' must be True or False, not {other}",
                self.callee
            ))),
        }
    }

    /// One flag per sort key; a single flag applies to all of them.
    pub(crate) fn flags(&mut self, index: usize, name: &str, count: usize) -> Result<Vec<bool>> {
        match self.value(index, name) {
            None => Ok(vec![true; count]),
            Some(Value::Scalar(Scalar::Bool(flag))) => Ok(vec![flag; count]),
            Some(Value::List(items))
                if items.len() == count && items.iter().all(|i| i.as_bool().is_some()) =>
            {
                Ok(items.iter().filter_map(Scalar::as_bool).collect())
            }
            Some(_) => Err(ExecError::argument(format!(
                "{}() argument '{name}' must be a bool or a list of {count} bools",
                self.callee
            ))),
        }
    }

    pub(crate) fn text(&mut self, index: usize, name: &str) -> Result<Option<String>> {
        match self.scalar(index, name)? {
            None => Ok(None),
            Some(Scalar::Str(value)) => Ok(Some(value)),
            Some(other) => Err(ExecError::argument(format!(
                "{}() argument '{name}' must be a string, not {other}",
                self.callee
            ))),
        }
    }

    /// A column name or a list of column names.
    pub(crate) fn names(&mut self, index: usize, name: &str) -> Result<Option<Vec<String>>> {
        let names = match self.value(index, name) {
            None => return Ok(None),
            Some(Value::Scalar(Scalar::Str(single))) => vec![single],
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| match item {
                    Scalar::Str(s) => Ok(s),
                    other => Err(ExecError::argument(format!(
                        "column names must be strings, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(ExecError::argument(format!(
                    "{}() argument '{name}' must name columns, not {}",
                    self.callee,
                    other.kind()
                )))
            }
        };
        Ok(Some(names))
    }

    pub(crate) fn require(&mut self, index: usize, name: &str) -> Result<Value> {
        self.value(index, name).ok_or_else(|| {
            ExecError::argument(format!(
                "{}() missing required argument '{name}'",
                self.callee
            ))
        })
    }

    pub(crate) fn finish(self) -> Result<()> {
        if let Some(pos) = self.positional.iter().position(Option::is_some) {
            return Err(ExecError::argument(format!(
                "{}() takes at most {pos} positional arguments",
                self.callee
            )));
        }
        if let Some((name, _)) = self.named.first() {
            return Err(ExecError::argument(format!(
                "{}() got an unexpected keyword argument '{name}'",
                self.callee
            )));
        }
        Ok(())
    }
}

/// An evaluated `[...]` position.
pub(crate) enum Key {
    Value(Value),
    Slice {
        start: Option<Scalar>,
        stop: Option<Scalar>,
    },
}

impl Key {
    fn is_full_slice(&self) -> bool {
        matches!(self, Self::Slice { start: None, stop: None })
    }
}

pub(crate) struct Evaluator<'a> {
    table: &'a Arc<Table>,
    budget: Budget,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(table: &'a Arc<Table>, budget: Budget) -> Self {
        Self { table, budget }
    }

    pub(crate) fn steps(&self) -> u64 {
        self.budget.used()
    }

    pub(crate) fn charge(&mut self, steps: usize) -> Result<()> {
        self.budget.charge(steps)
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value> {
        self.charge(1)?;
        match expr {
            Expr::Literal(literal) => Ok(Value::Scalar(scalar_literal(literal))),
            Expr::Name(name) if name == TABLE_NAME => {
                Ok(Value::Frame(Frame::whole(Arc::clone(self.table))))
            }
            Expr::Name(name) => Err(ExecError::UnboundName(name.clone())),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval(item)? {
                        Value::Scalar(scalar) => out.push(scalar),
                        other => {
                            return Err(ExecError::type_error(format!(
                                "list items must be scalars, found {}",
                                other.kind()
                            )))
                        }
                    }
                }
                Ok(Value::List(out))
            }
            Expr::Attribute { target, name } => {
                let target = self.eval(target)?;
                self.attribute(target, name)
            }
            Expr::Call { func, args, kwargs } => self.call(func, args, kwargs),
            Expr::Index { target, keys } => {
                let target = self.eval(target)?;
                let keys = keys
                    .iter()
                    .map(|key| self.key(key))
                    .collect::<Result<Vec<_>>>()?;
                self.index(target, keys)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                self.unary(*op, operand)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.binary(*op, lhs, rhs)
            }
        }
    }

    fn key(&mut self, key: &IndexKey) -> Result<Key> {
        match key {
            IndexKey::Expr(expr) => Ok(Key::Value(self.eval(expr)?)),
            IndexKey::Slice { start, stop } => Ok(Key::Slice {
                start: self.bound(start.as_ref())?,
                stop: self.bound(stop.as_ref())?,
            }),
        }
    }

    fn bound(&mut self, expr: Option<&Expr>) -> Result<Option<Scalar>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::Scalar(Scalar::Null) => Ok(None),
            Value::Scalar(scalar) => Ok(Some(scalar)),
            other => Err(ExecError::type_error(format!(
                "slice bounds must be scalars, found {}",
                other.kind()
            ))),
        }
    }

    fn call(&mut self, func: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> Result<Value> {
        let (receiver, name) = match func {
            Expr::Name(name) => (None, name),
            Expr::Attribute { target, name } => (Some(self.eval(target)?), name),
            _ => return Err(ExecError::DisallowedOperation("call".to_string())),
        };
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(Some(self.eval(arg)?));
        }
        let mut named = Vec::with_capacity(kwargs.len());
        for (key, arg) in kwargs {
            named.push((key.clone(), self.eval(arg)?));
        }
        let args = Args {
            callee: name.clone(),
            positional,
            named,
        };
        match receiver {
            None => self.function(name, args),
            Some(Value::Frame(frame)) => self.frame_method(frame, name, args),
            Some(Value::Series(series)) => self.series_method(series, name, args),
            Some(Value::GroupBy(groups)) => self.groupby_method(groups, name, args),
            Some(Value::StrAccessor(series)) => self.str_method(series, name, args),
            Some(Value::List(items)) => match name.as_str() {
                "tolist" | "to_list" => {
                    args.finish()?;
                    Ok(Value::List(items))
                }
                _ => self.series_method(Series::positional(None, items), name, args),
            },
            Some(Value::Scalar(scalar)) => self.scalar_method(scalar, name, args),
            Some(other) => Err(no_method(&other, name)),
        }
    }

    fn function(&mut self, name: &str, mut args: Args) -> Result<Value> {
        match name {
            "len" => {
                let value = args.require(0, "obj")?;
                args.finish()?;
                let len = match &value {
                    Value::Frame(frame) => frame.len(),
                    Value::Series(series) => series.len(),
                    Value::List(items) => items.len(),
                    Value::Scalar(Scalar::Str(s)) => s.chars().count(),
                    Value::GroupBy(groups) => self.group_count(groups)?,
                    other => {
                        return Err(ExecError::type_error(format!(
                            "object of type '{}' has no len()",
                            other.kind()
                        )))
                    }
                };
                Ok(Value::Scalar(Scalar::Int(len as i64)))
            }
            "abs" => {
                let value = args.require(0, "x")?;
                args.finish()?;
                self.map_value(value, ops::abs)
            }
            "round" => {
                let value = args.require(0, "number")?;
                let digits = args.scalar(1, "ndigits")?;
                args.finish()?;
                match (value, digits) {
                    (Value::Scalar(scalar), None) => match ops::round(&scalar, 0)? {
                        Scalar::Float(v) if v.is_finite() => Ok(Value::Scalar(Scalar::Int(v as i64))),
                        other => Ok(Value::Scalar(other)),
                    },
                    (value, digits) => {
                        let digits = match digits {
                            None => 0,
                            Some(Scalar::Int(d)) => d,
                            Some(other) => {
                                return Err(ExecError::argument(format!(
                                    "round() ndigits must be an integer, not {other}"
                                )))
                            }
                        };
                        self.map_value(value, |v| ops::round(v, digits))
                    }
                }
            }
            "sum" | "min" | "max" => {
                let mut items = Vec::new();
                let mut index = 0;
                while let Some(value) = args.value(index, "") {
                    items.push(value);
                    index += 1;
                }
                args.finish()?;
                let values = match items.len() {
                    0 => {
                        return Err(ExecError::argument(format!(
                            "{name}() expected at least 1 argument"
                        )))
                    }
                    1 => match items.remove(0) {
                        Value::Series(series) => series.values,
                        Value::List(items) => items,
                        Value::Frame(frame) => frame.column_names().into_iter().map(Scalar::Str).collect(),
                        other => {
                            return Err(ExecError::type_error(format!(
                                "'{}' object is not iterable",
                                other.kind()
                            )))
                        }
                    },
                    _ if name == "sum" => {
                        return Err(ExecError::argument("sum() takes a single iterable"))
                    }
                    _ => items
                        .into_iter()
                        .map(|item| match item {
                            Value::Scalar(scalar) => Ok(scalar),
                            other => Err(ExecError::type_error(format!(
                                "cannot compare {} with a scalar",
                                other.kind()
                            ))),
                        })
                        .collect::<Result<Vec<_>>>()?,
                };
                self.charge(values.len())?;
                let agg = aggregate::Agg::from_name(name)
                    .ok_or_else(|| ExecError::DisallowedOperation(name.to_string()))?;
                if name != "sum" && values.is_empty() {
                    return Err(ExecError::argument(format!("{name}() arg is an empty sequence")));
                }
                Ok(Value::Scalar(agg.apply(&values)?))
            }
            other => Err(ExecError::DisallowedOperation(other.to_string())),
        }
    }

    fn scalar_method(&mut self, scalar: Scalar, name: &str, mut args: Args) -> Result<Value> {
        let result = match (name, &scalar) {
            ("item", _) => scalar.clone(),
            ("round", _) => ops::round(&scalar, args.int(0, "decimals", 0)?)?,
            ("abs", _) => ops::abs(&scalar)?,
            ("lower", Scalar::Str(s)) => Scalar::Str(s.to_lowercase()),
            ("upper", Scalar::Str(s)) => Scalar::Str(s.to_uppercase()),
            ("strip", Scalar::Str(s)) => Scalar::Str(s.trim().to_string()),
            ("startswith", Scalar::Str(s)) => {
                let prefix = args.text(0, "prefix")?.unwrap_or_default();
                Scalar::Bool(s.starts_with(&prefix))
            }
            ("endswith", Scalar::Str(s)) => {
                let suffix = args.text(0, "suffix")?.unwrap_or_default();
                Scalar::Bool(s.ends_with(&suffix))
            }
            _ => return Err(no_method(&Value::Scalar(scalar.clone()), name)),
        };
        args.finish()?;
        Ok(Value::Scalar(result))
    }

    fn attribute(&mut self, target: Value, name: &str) -> Result<Value> {
        match target {
            Value::Frame(frame) => self.frame_attribute(frame, name),
            Value::Series(series) => self.series_attribute(series, name),
            Value::GroupBy(groups) => {
                let key = Key::Value(Value::Scalar(Scalar::Str(name.to_string())));
                self.groupby_select(groups, key)
            }
            other => Err(ExecError::type_error(format!(
                "'{}' object has no attribute '{name}'",
                other.kind()
            ))),
        }
    }

    fn index(&mut self, target: Value, mut keys: Vec<Key>) -> Result<Value> {
        match target {
            Value::Frame(frame) => {
                let key = single_key(&mut keys)?;
                self.frame_index(frame, key)
            }
            Value::Series(series) => {
                let key = single_key(&mut keys)?;
                self.series_index(series, key, Lookup::Plain)
            }
            Value::GroupBy(groups) => {
                let key = single_key(&mut keys)?;
                self.groupby_select(groups, key)
            }
            Value::List(items) => {
                let key = single_key(&mut keys)?;
                self.series_index(Series::positional(None, items), key, Lookup::Position)
                    .map(|value| match value {
                        Value::Series(series) => Value::List(series.values),
                        other => other,
                    })
            }
            Value::Loc(inner) => match *inner {
                Value::Frame(frame) => self.frame_locate(frame, keys, Lookup::Label),
                Value::Series(series) => {
                    let key = single_key(&mut keys)?;
                    self.series_index(series, key, Lookup::Label)
                }
                other => Err(not_subscriptable(&other)),
            },
            Value::ILoc(inner) => match *inner {
                Value::Frame(frame) => self.frame_locate(frame, keys, Lookup::Position),
                Value::Series(series) => {
                    let key = single_key(&mut keys)?;
                    self.series_index(series, key, Lookup::Position)
                }
                other => Err(not_subscriptable(&other)),
            },
            other => Err(not_subscriptable(&other)),
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: Value) -> Result<Value> {
        self.map_value(operand, |v| ops::unary(op, v))
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        match (lhs, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(ops::binary(op, &a, &b)?)),
            (Value::Series(series), Value::Scalar(b)) => {
                self.map_value(Value::Series(series), |a| ops::binary(op, a, &b))
            }
            (Value::Scalar(a), Value::Series(series)) => {
                self.map_value(Value::Series(series), |b| ops::binary(op, &a, b))
            }
            (Value::Frame(frame), Value::Scalar(b)) => {
                self.map_value(Value::Frame(frame), |a| ops::binary(op, a, &b))
            }
            (Value::Scalar(a), Value::Frame(frame)) => {
                self.map_value(Value::Frame(frame), |b| ops::binary(op, &a, b))
            }
            (Value::Series(lhs), Value::Series(rhs)) => {
                let aligned = self.align(&lhs, &rhs)?;
                let values = lhs
                    .values
                    .iter()
                    .zip(&aligned)
                    .map(|(a, b)| ops::binary(op, a, b))
                    .collect::<Result<Vec<_>>>()?;
                let mut out = lhs.with_values(values);
                if lhs.name != rhs.name {
                    out.name = None;
                }
                Ok(Value::Series(out))
            }
            (Value::Series(lhs), Value::List(items)) if items.len() == lhs.len() => {
                self.charge(items.len())?;
                let values = lhs
                    .values
                    .iter()
                    .zip(&items)
                    .map(|(a, b)| ops::binary(op, a, b))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Series(lhs.with_values(values)))
            }
            (lhs, rhs) => Err(ExecError::type_error(format!(
                "unsupported operand types for {}: '{}' and '{}'",
                op.symbol(),
                lhs.kind(),
                rhs.kind()
            ))),
        }
    }

    /// Applies `f` to every cell of a scalar, series or frame.
    fn map_value(&mut self, value: Value, f: impl Fn(&Scalar) -> Result<Scalar>) -> Result<Value> {
        match value {
            Value::Scalar(scalar) => Ok(Value::Scalar(f(&scalar)?)),
            Value::Series(series) => {
                self.charge(series.len())?;
                let values = series.values.iter().map(&f).collect::<Result<Vec<_>>>()?;
                Ok(Value::Series(series.with_values(values)))
            }
            Value::List(items) => {
                self.charge(items.len())?;
                Ok(Value::List(items.iter().map(&f).collect::<Result<Vec<_>>>()?))
            }
            Value::Frame(frame) => {
                self.charge(frame.len() * frame.columns.len())?;
                let columns = frame
                    .columns
                    .iter()
                    .map(|&c| {
                        let values = frame
                            .rows
                            .iter()
                            .map(|&r| f(frame.table.value(r, c)))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(Column::new(frame.table.column_at(c).name(), values))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let keys = frame
                    .keys
                    .as_ref()
                    .map(|keys| frame.rows.iter().map(|&r| keys[r].clone()).collect());
                Ok(Value::Frame(Frame::from_columns(columns, keys, frame.index_name)?))
            }
            other => Err(ExecError::type_error(format!(
                "operation not supported on {}",
                other.kind()
            ))),
        }
    }

    /// Values of `rhs` lined up with the labels of `lhs`; unmatched labels
    /// become null.
    fn align(&mut self, lhs: &Series, rhs: &Series) -> Result<Vec<Scalar>> {
        self.charge(lhs.len() + rhs.len())?;
        if lhs.labels == rhs.labels {
            return Ok(rhs.values.clone());
        }
        let mut by_label = HashMap::with_capacity(rhs.len());
        for pos in 0..rhs.len() {
            by_label.entry(rhs.label(pos)).or_insert(pos);
        }
        Ok((0..lhs.len())
            .map(|pos| {
                by_label
                    .get(&lhs.label(pos))
                    .map_or(Scalar::Null, |&p| rhs.values[p].clone())
            })
            .collect())
    }

    /// Positions of `labels` selected by a boolean mask series, matched by
    /// label.
    fn mask_by_label(&mut self, labels: &Labels, mask: &Series) -> Result<Vec<usize>> {
        if *labels == mask.labels {
            return mask.mask_positions();
        }
        self.charge(labels.len() + mask.len())?;
        let mut by_label = HashMap::with_capacity(mask.len());
        for pos in 0..mask.len() {
            by_label.entry(mask.label(pos)).or_insert(pos);
        }
        let mut out = Vec::new();
        for pos in 0..labels.len() {
            let label = labels.get(pos);
            let Some(&at) = by_label.get(&label) else {
                return Err(ExecError::argument(format!(
                    "boolean mask has no entry for label {label}"
                )));
            };
            match &mask.values[at] {
                Scalar::Bool(true) => out.push(pos),
                Scalar::Bool(false) => {}
                v if v.is_null() => {}
                other => {
                    return Err(ExecError::type_error(format!(
                        "boolean mask expected, found value {other}"
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Every position carrying `label`.
    pub(crate) fn find_label(&mut self, labels: &Labels, label: &Scalar) -> Result<Vec<usize>> {
        self.charge(labels.len())?;
        let found: Vec<usize> = (0..labels.len())
            .filter(|&pos| labels.get(pos) == *label)
            .collect();
        if found.is_empty() {
            return Err(ExecError::MissingLabel(label.to_string()));
        }
        Ok(found)
    }

    /// Label-based slice: both ends inclusive.
    pub(crate) fn label_range(
        &mut self,
        labels: &Labels,
        start: Option<&Scalar>,
        stop: Option<&Scalar>,
    ) -> Result<Vec<usize>> {
        let first = match start {
            Some(label) => self.find_label(labels, label)?[0],
            None => 0,
        };
        let last = match stop {
            Some(label) => self
                .find_label(labels, label)?
                .last()
                .map_or(0, |&pos| pos + 1),
            None => labels.len(),
        };
        Ok((first..last.max(first)).collect())
    }
}

/// `true` for a list of booleans usable as a positional mask.
pub(crate) fn is_mask(items: &[Scalar], len: usize) -> bool {
    !items.is_empty() && items.len() == len && items.iter().all(|i| matches!(i, Scalar::Bool(_)))
}

pub(crate) fn mask_list_positions(items: &[Scalar]) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches!(item, Scalar::Bool(true)))
        .map(|(pos, _)| pos)
        .collect()
}

/// How `[...]` resolves scalar keys and slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// `x[...]`: scalars are labels, slices are positions.
    Plain,
    /// `.loc[...]`: scalars and slice bounds are labels.
    Label,
    /// `.iloc[...]`: everything is a position.
    Position,
}

fn scalar_literal(literal: &Literal) -> Scalar {
    match literal {
        Literal::None => Scalar::Null,
        Literal::Bool(v) => Scalar::Bool(*v),
        Literal::Int(v) => Scalar::Int(*v),
        Literal::Float(v) => Scalar::Float(*v),
        Literal::Str(v) => Scalar::Str(v.clone()),
    }
}

fn single_key(keys: &mut Vec<Key>) -> Result<Key> {
    if keys.len() != 1 {
        return Err(ExecError::argument(format!(
            "expected a single index key, found {}",
            keys.len()
        )));
    }
    Ok(keys.remove(0))
}

pub(crate) fn no_method(value: &Value, name: &str) -> ExecError {
    ExecError::type_error(format!("'{}' object has no method '{name}'", value.kind()))
}

fn not_subscriptable(value: &Value) -> ExecError {
    ExecError::type_error(format!("'{}' object is not subscriptable", value.kind()))
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn position(index: i64, len: usize) -> Result<usize> {
    let adjusted = if index < 0 { index + len as i64 } else { index };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(ExecError::OutOfRange { index, len });
    }
    Ok(adjusted as usize)
}

/// Half-open positional range with negative bounds counted from the end.
pub(crate) fn slice_range(len: usize, start: Option<&Scalar>, stop: Option<&Scalar>) -> Result<Range<usize>> {
    let clamp = |bound: Option<&Scalar>, default: usize| -> Result<usize> {
        match bound {
            None => Ok(default),
            Some(Scalar::Int(bound)) if *bound < 0 => Ok((len as i64 + bound).max(0) as usize),
            Some(Scalar::Int(bound)) => Ok((*bound as usize).min(len)),
            Some(other) => Err(ExecError::argument(format!(
                "positional slice bounds must be integers, found {other}"
            ))),
        }
    };
    let start = clamp(start, 0)?;
    let stop = clamp(stop, len)?;
    Ok(start..stop.max(start))
}

/// Ascending or descending comparison with nulls always last.
pub(crate) fn compare_nulls_last(a: &Scalar, b: &Scalar, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if ascending => a.sort_cmp(b),
        (false, false) => b.sort_cmp(a),
    }
}
