//! # Tabula Expr
//!
//! A restricted, pandas-flavoured expression language evaluated against a
//! read-only [`Table`].
//!
//! ## Pipeline
//!
//! ```text
//! expression text
//!     │
//!     ├──> lexer ──> tokens
//!     │
//!     ├──> parser (precedence climbing) ──> Expr
//!     │
//!     ├──> validate: names, methods and attributes against fixed whitelists
//!     │
//!     ├──> evaluate under a step budget and a wall-clock deadline
//!     │
//!     └──> Answer: JSON value, size-capped
//! ```
//!
//! The only bound name is `df`. Nothing in the language can reach the file
//! system, the network or the process environment: operations outside the
//! whitelist are rejected before a single row is read.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tabula_expr::{Limits, QueryExecutor};
//! use tabula_table::Table;
//!
//! let csv = "region,amount\nNorth,100\nSouth,250\nNorth,650\n";
//! let table = Arc::new(Table::from_reader(csv.as_bytes()).unwrap());
//! let executor = QueryExecutor::new(table, Limits::default());
//!
//! let answer = executor.execute("df['amount'].sum()").unwrap();
//! assert_eq!(answer.value(), &serde_json::json!(1000));
//! ```

mod answer;
pub mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod validate;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabula_table::Table;

pub use answer::{Answer, AnswerKind};
pub use error::{ExecError, Result};
pub use parser::parse;
pub use validate::{validate, ATTRIBUTES, FREE_FUNCTIONS, METHODS, TABLE_NAME};

use eval::{Budget, Evaluator};

/// Resource limits for a single evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum evaluation steps (roughly: rows touched)
    pub max_steps: u64,

    /// Wall-clock limit for one evaluation
    pub max_duration: Duration,

    /// Largest answer, in cells, that may be returned
    pub max_result_cells: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 5_000_000,
            max_duration: Duration::from_secs(5),
            max_result_cells: 1000,
        }
    }
}

impl Limits {
    /// Validate limits
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be > 0".to_string());
        }
        if self.max_duration.is_zero() {
            return Err("max_duration must be > 0".to_string());
        }
        if self.max_result_cells == 0 {
            return Err("max_result_cells must be > 0".to_string());
        }
        Ok(())
    }
}

/// Parses and validates an expression against the table's columns.
pub fn compile(source: &str, table: &Table) -> Result<ast::Expr> {
    let expr = parse(source)?;
    validate(&expr, table)?;
    Ok(expr)
}

/// Evaluates expressions against one shared table
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    table: Arc<Table>,
    limits: Limits,
}

impl QueryExecutor {
    pub fn new(table: Arc<Table>, limits: Limits) -> Self {
        Self { table, limits }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Compiles and evaluates `source`, returning a JSON-ready answer.
    ///
    /// Deterministic for a given table and expression. Blocking: callers on
    /// an async runtime should run it on a blocking thread.
    pub fn execute(&self, source: &str) -> Result<Answer> {
        let expr = compile(source, &self.table)?;
        let budget = Budget::new(self.limits.max_steps, self.limits.max_duration);
        let mut evaluator = Evaluator::new(&self.table, budget);
        let value = evaluator.eval(&expr)?;
        let answer = answer::convert(value, self.limits.max_result_cells)?;
        log::debug!(
            "Evaluated `{source}` in {} steps ({} cells)",
            evaluator.steps(),
            answer.cells()
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn executor(limits: Limits) -> QueryExecutor {
        let csv = "region,product,amount\n\
                   North,Widget,100\n\
                   South,Gadget,250\n\
                   North,Gadget,650\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        QueryExecutor::new(Arc::new(table), limits)
    }

    fn run(source: &str) -> Result<serde_json::Value> {
        executor(Limits::default())
            .execute(source)
            .map(Answer::into_value)
    }

    #[test]
    fn total_of_a_column() {
        assert_eq!(run("df['amount'].sum()").unwrap(), json!(1000));
    }

    #[test]
    fn answers_take_every_shape() {
        assert_eq!(run("df['amount'].mean()").unwrap(), json!(1000.0 / 3.0));
        assert_eq!(
            run("df[df['amount'] > 200]['product'].tolist()").unwrap(),
            json!(["Gadget", "Gadget"])
        );
        assert_eq!(
            run("df.groupby('region')['amount'].sum()").unwrap(),
            json!({"North": 750, "South": 250})
        );
        assert_eq!(
            run("df.nlargest(1, 'amount')[['region', 'amount']]").unwrap(),
            json!([{"region": "North", "amount": 650}])
        );
        assert_eq!(
            run("df.groupby('region')['amount'].agg(['sum', 'count'])").unwrap(),
            json!([
                {"region": "North", "sum": 750, "count": 2},
                {"region": "South", "sum": 250, "count": 1}
            ])
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let executor = executor(Limits::default());
        let source = "df.groupby('product')['amount'].mean().sort_values(ascending=False)";
        let first = executor.execute(source).unwrap();
        let second = executor.execute(source).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(first.value()).unwrap(),
            r#"{"Gadget":450.0,"Widget":100.0}"#
        );
    }

    #[test]
    fn whitelist_is_checked_before_evaluation() {
        let limits = Limits {
            max_steps: 1,
            ..Limits::default()
        };
        let err = executor(limits)
            .execute("df.to_csv('/tmp/out.csv')")
            .unwrap_err();
        assert_eq!(err, ExecError::DisallowedOperation("to_csv".into()));
    }

    #[test]
    fn step_budget_stops_evaluation() {
        let limits = Limits {
            max_steps: 5,
            ..Limits::default()
        };
        let err = executor(limits)
            .execute("df['amount'].sum()")
            .unwrap_err();
        assert_eq!(err, ExecError::BudgetExhausted(5));
    }

    #[test]
    fn wall_clock_deadline_stops_evaluation() {
        let limits = Limits {
            max_steps: u64::MAX,
            max_duration: Duration::ZERO,
            ..Limits::default()
        };
        let err = executor(limits)
            .execute("df[df['amount'] > 0]['amount'].sum()")
            .unwrap_err();
        assert_eq!(err, ExecError::DeadlineExceeded(Duration::ZERO));
    }

    #[test]
    fn runaway_chains_fail_as_syntax_errors() {
        let executor = executor(Limits::default());
        let sum = format!("1{}", "+1".repeat(100_000));
        assert!(matches!(
            executor.execute(&sum),
            Err(ExecError::Syntax { .. })
        ));
        let calls = format!("df['amount']{}.sum()", ".abs()".repeat(3_000));
        assert!(matches!(
            executor.execute(&calls),
            Err(ExecError::Syntax { .. })
        ));
    }

    #[test]
    fn oversized_answers_are_rejected() {
        let limits = Limits {
            max_result_cells: 5,
            ..Limits::default()
        };
        let err = executor(limits).execute("df").unwrap_err();
        assert_eq!(err, ExecError::ResultTooLarge { cells: 9, limit: 5 });
        assert!(executor(limits).execute("df.head(1)").is_ok());
    }

    #[test]
    fn non_answers_are_type_errors() {
        assert!(matches!(
            run("df.groupby('region')"),
            Err(ExecError::Type(_))
        ));
        assert!(matches!(run("df['region'].str"), Err(ExecError::Type(_))));
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        assert!(matches!(
            run("df['amount'].sum("),
            Err(ExecError::Syntax { .. })
        ));
        assert!(matches!(run("x = 1"), Err(ExecError::Syntax { .. })));
    }

    #[test]
    fn limits_validation() {
        assert!(Limits::default().validate().is_ok());
        let zero = Limits {
            max_result_cells: 0,
            ..Limits::default()
        };
        assert!(zero.validate().is_err());
    }
}
