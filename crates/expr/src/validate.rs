//! Whitelist check run on the parsed tree before anything is evaluated.

use crate::ast::{Expr, IndexKey};
use crate::error::{ExecError, Result};
use tabula_table::Table;

/// The single name bound in the evaluation context.
pub const TABLE_NAME: &str = "df";

/// Free functions that may be called by name.
pub const FREE_FUNCTIONS: &[&str] = &["len", "abs", "round", "sum", "min", "max"];

/// Methods that may be called on tables, columns, groups and lists.
pub const METHODS: &[&str] = &[
    // selection
    "head",
    "tail",
    "item",
    "tolist",
    "to_list",
    "reset_index",
    // filtering
    "isin",
    "between",
    "isna",
    "isnull",
    "notna",
    "notnull",
    "fillna",
    "dropna",
    "drop_duplicates",
    "contains",
    "startswith",
    "endswith",
    "lower",
    "upper",
    "strip",
    "len",
    // aggregation
    "groupby",
    "agg",
    "aggregate",
    "sum",
    "mean",
    "median",
    "min",
    "max",
    "std",
    "var",
    "count",
    "nunique",
    "size",
    "any",
    "all",
    "unique",
    "value_counts",
    "idxmax",
    "idxmin",
    "mode",
    // sorting
    "sort_values",
    "sort_index",
    "nlargest",
    "nsmallest",
    // arithmetic
    "abs",
    "round",
];

/// Attributes that may be read without a call.
pub const ATTRIBUTES: &[&str] = &[
    "shape", "columns", "empty", "size", "dtypes", "loc", "iloc", "index", "values", "name",
    "str",
];

pub fn validate(expr: &Expr, table: &Table) -> Result<()> {
    Validator { table }.check(expr, false)
}

struct Validator<'a> {
    table: &'a Table,
}

impl Validator<'_> {
    fn check(&self, expr: &Expr, callee: bool) -> Result<()> {
        match expr {
            Expr::Literal(_) => Ok(()),
            Expr::Name(name) => {
                if name == TABLE_NAME {
                    Ok(())
                } else if callee && FREE_FUNCTIONS.contains(&name.as_str()) {
                    Ok(())
                } else if callee {
                    Err(ExecError::DisallowedOperation(name.clone()))
                } else {
                    Err(ExecError::UnboundName(name.clone()))
                }
            }
            Expr::List(items) => items.iter().try_for_each(|item| self.check(item, false)),
            Expr::Attribute { target, name } => {
                self.check(target, false)?;
                if name.starts_with("__") {
                    return Err(ExecError::DisallowedOperation(name.clone()));
                }
                let allowed = if callee {
                    METHODS.contains(&name.as_str())
                } else {
                    ATTRIBUTES.contains(&name.as_str()) || self.table.column(name).is_some()
                };
                if allowed {
                    Ok(())
                } else {
                    Err(ExecError::DisallowedOperation(name.clone()))
                }
            }
            Expr::Call { func, args, kwargs } => {
                match func.as_ref() {
                    Expr::Name(_) | Expr::Attribute { .. } => self.check(func, true)?,
                    _ => return Err(ExecError::DisallowedOperation("call".to_string())),
                }
                args.iter().try_for_each(|arg| self.check(arg, false))?;
                kwargs
                    .iter()
                    .try_for_each(|(_, value)| self.check(value, false))
            }
            Expr::Index { target, keys } => {
                self.check(target, false)?;
                keys.iter().try_for_each(|key| match key {
                    IndexKey::Expr(expr) => self.check(expr, false),
                    IndexKey::Slice { start, stop } => start
                        .iter()
                        .chain(stop.iter())
                        .try_for_each(|bound| self.check(bound, false)),
                })
            }
            Expr::Unary { operand, .. } => self.check(operand, false),
            Expr::Binary { lhs, rhs, .. } => {
                self.check(lhs, false)?;
                self.check(rhs, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn table() -> Table {
        Table::from_reader("region,revenue\nNorth,10\n".as_bytes()).unwrap()
    }

    fn check(source: &str) -> Result<()> {
        validate(&parse(source).unwrap(), &table())
    }

    #[test]
    fn accepts_whitelisted_queries() {
        for source in [
            "df['revenue'].sum()",
            "df.revenue.mean()",
            "len(df[df['revenue'] > 5])",
            "df.groupby('region')['revenue'].sum().sort_values(ascending=False).head(3)",
            "df.loc[df['region'].str.contains('no', case=False), 'revenue'].max()",
            "round(df['revenue'].std(), 2)",
            "df.shape",
        ] {
            assert_eq!(check(source), Ok(()), "{source}");
        }
    }

    #[test]
    fn rejects_writers_before_evaluation() {
        assert_eq!(
            check("df.to_csv('/etc/passwd')"),
            Err(ExecError::DisallowedOperation("to_csv".into()))
        );
    }

    #[test]
    fn rejects_unbound_names_and_unknown_functions() {
        assert_eq!(
            check("os.system('ls')"),
            Err(ExecError::UnboundName("os".into()))
        );
        assert_eq!(
            check("open('/etc/passwd')"),
            Err(ExecError::DisallowedOperation("open".into()))
        );
        assert_eq!(
            check("df[secret]"),
            Err(ExecError::UnboundName("secret".into()))
        );
    }

    #[test]
    fn rejects_dunder_and_unknown_attributes() {
        assert_eq!(
            check("df.__class__"),
            Err(ExecError::DisallowedOperation("__class__".into()))
        );
        assert_eq!(
            check("df.apply(len)"),
            Err(ExecError::DisallowedOperation("apply".into()))
        );
        assert_eq!(
            check("df.missing_column"),
            Err(ExecError::DisallowedOperation("missing_column".into()))
        );
    }

    #[test]
    fn rejects_calls_on_arbitrary_values() {
        assert_eq!(
            check("df['revenue']()"),
            Err(ExecError::DisallowedOperation("call".into()))
        );
    }
}
