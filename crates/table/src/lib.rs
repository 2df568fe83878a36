//! # Tabula Table
//!
//! The read-only dataset behind the gateway. A [`Table`] is loaded once from a
//! CSV file, infers one dtype per column and is never mutated afterwards, so it
//! can be shared across requests behind an `Arc` without locking.
//!
//! ```no_run
//! use tabula_table::Table;
//!
//! let table = Table::load("data/sales.csv")?;
//! println!("{}", table.schema_preview(5));
//! # Ok::<(), tabula_table::TableError>(())
//! ```

mod error;
mod preview;
mod table;
mod value;

pub use error::{Result, TableError};
pub use preview::{ColumnSummary, SchemaPreview, DEFAULT_PREVIEW_ROWS};
pub use table::{Column, Table};
pub use value::{DType, Scalar};
