//! Element-wise text operations behind `series.str`.

use regex::{Regex, RegexBuilder};
use tabula_table::Scalar;

use super::value::{Series, Value};
use super::{no_method, Args, Evaluator};
use crate::error::{ExecError, Result};

/// Upper bound on the compiled size of a `contains` pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

fn compile_pattern(pattern: &str, case: bool, regex: bool) -> Result<Regex> {
    let source = if regex {
        pattern.to_string()
    } else {
        regex::escape(pattern)
    };
    RegexBuilder::new(&source)
        .case_insensitive(!case)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|err| ExecError::argument(format!("invalid pattern '{pattern}': {err}")))
}

impl Evaluator<'_> {
    pub(super) fn str_method(&mut self, series: Series, name: &str, mut args: Args) -> Result<Value> {
        self.charge(series.len())?;
        let values: Vec<Scalar> = match name {
            "contains" => {
                let pattern = args
                    .text(0, "pat")?
                    .ok_or_else(|| ExecError::argument("contains() missing required argument 'pat'"))?;
                let case = args.flag(1, "case", true)?;
                let na = args.scalar(3, "na")?.unwrap_or(Scalar::Null);
                let regex = args.flag(4, "regex", true)?;
                let matcher = compile_pattern(&pattern, case, regex)?;
                series
                    .values
                    .iter()
                    .map(|v| match v.as_str() {
                        Some(text) => Scalar::Bool(matcher.is_match(text)),
                        None => na.clone(),
                    })
                    .collect()
            }
            "startswith" | "endswith" => {
                let pattern = args
                    .text(0, "pat")?
                    .ok_or_else(|| ExecError::argument(format!("{name}() missing required argument 'pat'")))?;
                let na = args.scalar(1, "na")?.unwrap_or(Scalar::Null);
                series
                    .values
                    .iter()
                    .map(|v| match v.as_str() {
                        Some(text) if name == "startswith" => Scalar::Bool(text.starts_with(&pattern)),
                        Some(text) => Scalar::Bool(text.ends_with(&pattern)),
                        None => na.clone(),
                    })
                    .collect()
            }
            "lower" | "upper" | "strip" => series
                .values
                .iter()
                .map(|v| match v.as_str() {
                    Some(text) => Scalar::Str(match name {
                        "lower" => text.to_lowercase(),
                        "upper" => text.to_uppercase(),
                        _ => text.trim().to_string(),
                    }),
                    None => Scalar::Null,
                })
                .collect(),
            "len" => series
                .values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map_or(Scalar::Null, |text| Scalar::Int(text.chars().count() as i64))
                })
                .collect(),
            _ => return Err(no_method(&Value::StrAccessor(series), name)),
        };
        args.finish()?;
        Ok(Value::Series(series.with_values(values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Budget;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tabula_table::Table;

    fn eval(source: &str) -> Result<Value> {
        let csv = "name,city\nAlice, Paris\nbob,London\nCarol,\n";
        let table = Arc::new(Table::from_reader(csv.as_bytes()).unwrap());
        let mut evaluator = Evaluator::new(&table, Budget::new(10_000, Duration::from_secs(5)));
        evaluator.eval(&parse(source).unwrap())
    }

    fn values(source: &str) -> Vec<Scalar> {
        match eval(source).unwrap() {
            Value::Series(series) => series.values,
            other => panic!("expected a series for {source}, got {}", other.kind()),
        }
    }

    #[test]
    fn contains_honours_case_and_na() {
        assert_eq!(
            values("df['name'].str.contains('o')"),
            vec![Scalar::Bool(false), Scalar::Bool(true), Scalar::Bool(true)]
        );
        assert_eq!(
            values("df['name'].str.contains('^a', case=False)"),
            vec![Scalar::Bool(true), Scalar::Bool(false), Scalar::Bool(false)]
        );
        assert_eq!(
            values("df['city'].str.contains('on', na=False)"),
            vec![Scalar::Bool(false), Scalar::Bool(true), Scalar::Bool(false)]
        );
        assert_eq!(
            values("df['name'].str.contains('.', regex=False)"),
            vec![Scalar::Bool(false); 3]
        );
    }

    #[test]
    fn invalid_patterns_are_argument_errors() {
        assert!(matches!(
            eval("df['name'].str.contains('(')"),
            Err(ExecError::Argument(_))
        ));
    }

    #[test]
    fn case_and_length() {
        assert_eq!(
            values("df['name'].str.upper()"),
            vec![Scalar::from("ALICE"), Scalar::from("BOB"), Scalar::from("CAROL")]
        );
        assert_eq!(
            values("df['name'].str.len()"),
            vec![Scalar::Int(5), Scalar::Int(3), Scalar::Int(5)]
        );
        assert_eq!(
            values("df['name'].str.startswith('C')"),
            vec![Scalar::Bool(false), Scalar::Bool(false), Scalar::Bool(true)]
        );
    }

    #[test]
    fn unknown_accessor_methods() {
        assert!(matches!(
            eval("df['name'].str.zfill(3)"),
            Err(ExecError::Type(_))
        ));
    }
}
