use std::collections::HashSet;
use tabula_table::Scalar;

use crate::error::{ExecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Agg {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Std,
    Var,
    Count,
    Nunique,
    Size,
    Any,
    All,
}

impl Agg {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let agg = match name {
            "sum" => Self::Sum,
            "mean" => Self::Mean,
            "median" => Self::Median,
            "min" => Self::Min,
            "max" => Self::Max,
            "std" => Self::Std,
            "var" => Self::Var,
            "count" => Self::Count,
            "nunique" => Self::Nunique,
            "size" => Self::Size,
            "any" => Self::Any,
            "all" => Self::All,
            _ => return None,
        };
        Some(agg)
    }

    /// Aggregations that skip non-numeric columns when applied to a frame.
    pub(crate) const fn numeric_only(self) -> bool {
        matches!(
            self,
            Self::Sum | Self::Mean | Self::Median | Self::Std | Self::Var
        )
    }

    pub(crate) fn apply(self, values: &[Scalar]) -> Result<Scalar> {
        let present = values.iter().filter(|v| !v.is_null());
        match self {
            Self::Count => Ok(Scalar::Int(present.count() as i64)),
            Self::Size => Ok(Scalar::Int(values.len() as i64)),
            Self::Nunique => Ok(Scalar::Int(present.collect::<HashSet<_>>().len() as i64)),
            Self::Any => Ok(Scalar::Bool(values.iter().any(truthy))),
            Self::All => Ok(Scalar::Bool(values.iter().filter(|v| !v.is_null()).all(truthy))),
            Self::Min | Self::Max => extreme(values, self == Self::Max),
            Self::Sum => sum(values),
            Self::Mean => {
                let numbers = numeric(values, "mean")?;
                if numbers.is_empty() {
                    return Ok(Scalar::Null);
                }
                Ok(Scalar::Float(numbers.iter().sum::<f64>() / numbers.len() as f64))
            }
            Self::Median => {
                let mut numbers = numeric(values, "median")?;
                if numbers.is_empty() {
                    return Ok(Scalar::Null);
                }
                numbers.sort_by(f64::total_cmp);
                let mid = numbers.len() / 2;
                let median = if numbers.len() % 2 == 0 {
                    (numbers[mid - 1] + numbers[mid]) / 2.0
                } else {
                    numbers[mid]
                };
                Ok(Scalar::Float(median))
            }
            Self::Std | Self::Var => {
                let numbers = numeric(values, if self == Self::Std { "std" } else { "var" })?;
                if numbers.len() < 2 {
                    return Ok(Scalar::Null);
                }
                let n = numbers.len() as f64;
                let mean = numbers.iter().sum::<f64>() / n;
                let var = numbers.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Ok(Scalar::Float(if self == Self::Std { var.sqrt() } else { var }))
            }
        }
    }
}

pub(crate) fn truthy(value: &Scalar) -> bool {
    match value {
        Scalar::Bool(b) => *b,
        Scalar::Int(v) => *v != 0,
        Scalar::Float(v) => *v != 0.0 && !v.is_nan(),
        Scalar::Str(s) => !s.is_empty(),
        Scalar::Null => false,
    }
}

fn numeric(values: &[Scalar], op: &str) -> Result<Vec<f64>> {
    values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                ExecError::type_error(format!("cannot compute {op} of non-numeric value {v}"))
            })
        })
        .collect()
}

fn sum(values: &[Scalar]) -> Result<Scalar> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    let mut any_float = false;
    for value in values.iter().filter(|v| !v.is_null()) {
        match value {
            Scalar::Int(_) | Scalar::Bool(_) => {
                let v = value.as_i64().unwrap_or_default();
                int_total = int_total.and_then(|t| t.checked_add(v));
                float_total += v as f64;
            }
            Scalar::Float(v) => {
                any_float = true;
                float_total += v;
            }
            other => {
                return Err(ExecError::type_error(format!(
                    "cannot compute sum of non-numeric value {other}"
                )))
            }
        }
    }
    Ok(match int_total {
        Some(total) if !any_float => Scalar::Int(total),
        _ => Scalar::Float(float_total),
    })
}

fn extreme(values: &[Scalar], max: bool) -> Result<Scalar> {
    let mut best: Option<&Scalar> = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        let Some(current) = best else {
            best = Some(value);
            continue;
        };
        let comparable = matches!(
            (current, value),
            (Scalar::Str(_), Scalar::Str(_))
        ) || (current.as_f64().is_some() && value.as_f64().is_some());
        if !comparable {
            return Err(ExecError::type_error(format!(
                "cannot compare {current} with {value}"
            )));
        }
        let ord = value.sort_cmp(current);
        if (max && ord.is_gt()) || (!max && ord.is_lt()) {
            best = Some(value);
        }
    }
    Ok(best.cloned().unwrap_or(Scalar::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Scalar> {
        values.iter().copied().map(Scalar::Int).collect()
    }

    #[test]
    fn integer_sums_stay_integral() {
        assert_eq!(
            Agg::Sum.apply(&ints(&[100, 250, 650])).unwrap(),
            Scalar::Int(1000)
        );
        assert_eq!(
            Agg::Sum
                .apply(&[Scalar::Int(1), Scalar::Float(0.5), Scalar::Null])
                .unwrap(),
            Scalar::Float(1.5)
        );
    }

    #[test]
    fn statistics_skip_nulls() {
        let values = vec![Scalar::Int(2), Scalar::Null, Scalar::Int(4), Scalar::Int(9)];
        assert_eq!(Agg::Mean.apply(&values).unwrap(), Scalar::Float(5.0));
        assert_eq!(Agg::Median.apply(&values).unwrap(), Scalar::Float(4.0));
        assert_eq!(Agg::Count.apply(&values).unwrap(), Scalar::Int(3));
        assert_eq!(Agg::Max.apply(&values).unwrap(), Scalar::Int(9));
        assert_eq!(Agg::Var.apply(&values).unwrap(), Scalar::Float(13.0));
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(Agg::Sum.apply(&[]).unwrap(), Scalar::Int(0));
        assert_eq!(Agg::Mean.apply(&[]).unwrap(), Scalar::Null);
        assert_eq!(Agg::Min.apply(&[Scalar::Null]).unwrap(), Scalar::Null);
    }

    #[test]
    fn strings_do_not_sum() {
        let err = Agg::Sum.apply(&[Scalar::from("a")]).unwrap_err();
        assert!(matches!(err, ExecError::Type(_)));
        assert_eq!(
            Agg::Max
                .apply(&[Scalar::from("apple"), Scalar::from("pear")])
                .unwrap(),
            Scalar::from("pear")
        );
    }
}
