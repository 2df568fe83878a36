use std::collections::HashMap;

use tabula_table::{Column, DType, Scalar};

use super::aggregate::Agg;
use super::frame::aggregations;
use super::value::{Frame, GroupBy, Selection, Series, Value};
use super::{no_method, Args, Evaluator, Key};
use crate::error::{ExecError, Result};

/// Rows of each group, keyed by the group value. Rows with a null key
/// belong to no group.
struct Groups {
    keys: Vec<Scalar>,
    members: Vec<Vec<usize>>,
}

impl Evaluator<'_> {
    fn groups(&mut self, groups: &GroupBy) -> Result<Groups> {
        let frame = &groups.frame;
        self.charge(frame.len())?;
        let mut index: HashMap<&Scalar, usize> = HashMap::new();
        let mut keys: Vec<Scalar> = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for &row in &frame.rows {
            let key = frame.table.value(row, groups.key);
            if key.is_null() {
                continue;
            }
            let at = *index.entry(key).or_insert_with(|| {
                keys.push(key.clone());
                members.push(Vec::new());
                keys.len() - 1
            });
            members[at].push(row);
        }

        if !groups.sort {
            return Ok(Groups { keys, members });
        }
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].sort_cmp(&keys[b]));
        let mut sorted = Groups {
            keys: Vec::with_capacity(order.len()),
            members: Vec::with_capacity(order.len()),
        };
        for pos in order {
            sorted.keys.push(keys[pos].clone());
            sorted.members.push(std::mem::take(&mut members[pos]));
        }
        Ok(sorted)
    }

    pub(super) fn group_count(&mut self, groups: &GroupBy) -> Result<usize> {
        Ok(self.groups(groups)?.keys.len())
    }

    /// `grouped['col']`, `grouped[['a', 'b']]` and `grouped.col`.
    pub(super) fn groupby_select(&mut self, groups: GroupBy, key: Key) -> Result<Value> {
        let selection = match key {
            Key::Value(Value::Scalar(Scalar::Str(name))) => {
                Selection::Single(groups.frame.resolve(&name)?)
            }
            Key::Value(Value::List(items)) => Selection::Many(
                items
                    .iter()
                    .map(|item| match item {
                        Scalar::Str(name) => groups.frame.resolve(name),
                        other => Err(ExecError::UnknownColumn(other.to_string())),
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Key::Value(Value::Scalar(other)) => {
                return Err(ExecError::UnknownColumn(other.to_string()))
            }
            _ => {
                return Err(ExecError::type_error(
                    "groups can only be narrowed to named columns",
                ))
            }
        };
        Ok(Value::GroupBy(GroupBy {
            selection,
            ..groups
        }))
    }

    pub(super) fn groupby_method(&mut self, groups: GroupBy, name: &str, mut args: Args) -> Result<Value> {
        let (aggs, single) = match name {
            "agg" | "aggregate" => aggregations(&mut args)?,
            _ => match Agg::from_name(name) {
                Some(agg) => (vec![(name.to_string(), agg)], true),
                None => return Err(no_method(&Value::GroupBy(groups), name)),
            },
        };
        args.finish()?;
        self.aggregate_groups(groups, aggs, single)
    }

    fn aggregate_groups(
        &mut self,
        groups: GroupBy,
        aggs: Vec<(String, Agg)>,
        single: bool,
    ) -> Result<Value> {
        let grouped = self.groups(&groups)?;
        let table = &groups.frame.table;
        let key_name = table.column_at(groups.key).name().to_string();

        let selected_name = match groups.selection {
            Selection::Single(c) => Some(table.column_at(c).name().to_string()),
            _ => None,
        };

        // size() counts rows per group whatever the selection.
        if single && aggs[0].1 == Agg::Size {
            let values = grouped
                .members
                .iter()
                .map(|rows| Scalar::Int(rows.len() as i64))
                .collect();
            let series = Series::keyed(selected_name, Some(key_name), grouped.keys, values);
            return self.finish_groups(Value::Series(series), groups.as_index, "size");
        }

        let columns: Vec<usize> = match &groups.selection {
            Selection::Single(c) => vec![*c],
            Selection::Many(columns) => columns.clone(),
            Selection::All => groups
                .frame
                .columns
                .iter()
                .copied()
                .filter(|&c| c != groups.key)
                .collect(),
        };
        self.charge(groups.frame.len() * columns.len().max(1) * aggs.len())?;

        let mut out = Vec::with_capacity(columns.len() * aggs.len());
        for &c in &columns {
            let column = table.column_at(c);
            for (agg_name, agg) in &aggs {
                let implicit = matches!(groups.selection, Selection::All);
                if implicit && agg.numeric_only() && column.dtype() == DType::Str {
                    continue;
                }
                let values = grouped
                    .members
                    .iter()
                    .map(|rows| {
                        let cells: Vec<Scalar> =
                            rows.iter().map(|&r| table.value(r, c).clone()).collect();
                        agg.apply(&cells)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let label = if single {
                    column.name().to_string()
                } else if columns.len() == 1 {
                    agg_name.clone()
                } else {
                    format!("{}_{agg_name}", column.name())
                };
                out.push(Column::new(label, values));
            }
        }

        let value = match (&groups.selection, single, out.len()) {
            (Selection::Single(_), true, 1) => {
                let values = out.remove(0).values().to_vec();
                Value::Series(Series::keyed(
                    selected_name,
                    Some(key_name),
                    grouped.keys,
                    values,
                ))
            }
            _ => Value::Frame(Frame::from_columns(out, Some(grouped.keys), Some(key_name))?),
        };
        self.finish_groups(value, groups.as_index, "0")
    }

    /// With `as_index=False` the group keys become the first column.
    fn finish_groups(&mut self, value: Value, as_index: bool, unnamed: &str) -> Result<Value> {
        if as_index {
            return Ok(value);
        }
        match value {
            Value::Series(series) => {
                let index_name = series.index_name.clone().unwrap_or_else(|| "index".to_string());
                let value_name = series.name.clone().unwrap_or_else(|| unnamed.to_string());
                let labels = (0..series.len()).map(|pos| series.label(pos)).collect();
                let columns = vec![
                    Column::new(index_name, labels),
                    Column::new(value_name, series.values),
                ];
                Ok(Value::Frame(Frame::from_columns(columns, None, None)?))
            }
            Value::Frame(frame) => Ok(Value::Frame(self.materialize(&frame, true)?)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ExecError;
    use crate::eval::value::{Frame, Labels, Value};
    use crate::eval::{Budget, Evaluator};
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tabula_table::{Scalar, Table};

    fn table() -> Arc<Table> {
        let csv = "region,product,revenue,units\n\
                   North,Widget,100,3\n\
                   South,Gadget,250,5\n\
                   North,Gadget,650,\n\
                   ,Widget,40,1\n\
                   East,Widget,250,1\n";
        Arc::new(Table::from_reader(csv.as_bytes()).unwrap())
    }

    fn eval(source: &str) -> Result<Value, ExecError> {
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

    fn keys(labels: &[&str]) -> Labels {
        Labels::Keys(labels.iter().map(|l| Scalar::from(*l)).collect())
    }

    #[test]
    fn grouped_column_sum_is_a_keyed_series() {
        let Value::Series(totals) = eval("df.groupby('region')['revenue'].sum()").unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(totals.labels, keys(&["East", "North", "South"]));
        assert_eq!(
            totals.values,
            vec![Scalar::Int(250), Scalar::Int(750), Scalar::Int(250)]
        );
        assert_eq!(totals.name.as_deref(), Some("revenue"));
        assert_eq!(totals.index_name.as_deref(), Some("region"));
    }

    #[test]
    fn unsorted_groups_keep_first_appearance() {
        let Value::Series(totals) =
            eval("df.groupby('region', sort=False)['units'].count()").unwrap()
        else {
            panic!("expected a series");
        };
        assert_eq!(totals.labels, keys(&["North", "South", "East"]));
        assert_eq!(
            totals.values,
            vec![Scalar::Int(1), Scalar::Int(1), Scalar::Int(1)]
        );
    }

    #[test]
    fn whole_frame_mean_skips_text_columns() {
        let means = frame("df.groupby('product').mean()");
        assert_eq!(means.column_names(), vec!["revenue", "units"]);
        assert_eq!(means.index_name.as_deref(), Some("product"));
        assert_eq!(
            means.series(0).values,
            vec![Scalar::Float(450.0), Scalar::Float(130.0)]
        );
    }

    #[test]
    fn size_and_as_index() {
        let Value::Series(sizes) = eval("df.groupby('product').size()").unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(sizes.values, vec![Scalar::Int(2), Scalar::Int(3)]);
        assert_eq!(sizes.name, None);

        let flat = frame("df.groupby('product', as_index=False)['revenue'].sum()");
        assert_eq!(flat.column_names(), vec!["product", "revenue"]);
        assert_eq!(flat.keys, None);

        let counted = frame("df.groupby('region', as_index=False).size()");
        assert_eq!(counted.column_names(), vec!["region", "size"]);
    }

    #[test]
    fn multiple_aggregations() {
        let stats = frame("df.groupby('product')['revenue'].agg(['min', 'max'])");
        assert_eq!(stats.column_names(), vec!["min", "max"]);
        assert_eq!(
            stats.series(1).values,
            vec![Scalar::Int(650), Scalar::Int(250)]
        );
    }

    #[test]
    fn group_selection_errors() {
        assert_eq!(
            eval("df.groupby('region')['profit'].sum()").unwrap_err(),
            ExecError::UnknownColumn("profit".into())
        );
        assert!(matches!(
            eval("df.groupby('region').transform('sum')"),
            Err(ExecError::Type(_))
        ));
    }

    #[test]
    fn len_counts_groups() {
        assert!(matches!(
            eval("len(df.groupby('region'))").unwrap(),
            Value::Scalar(Scalar::Int(3))
        ));
    }
}
