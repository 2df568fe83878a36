use crate::table::Table;
use crate::value::DType;
use std::fmt;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;
const MAX_CELL_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: DType,
}

/// Bounded textual summary of a table, used to ground model prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPreview {
    text: String,
    columns: Vec<ColumnSummary>,
    rows: usize,
}

impl SchemaPreview {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn columns(&self) -> &[ColumnSummary] {
        &self.columns
    }

    /// Row count of the whole table, not of the preview.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl fmt::Display for SchemaPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Table {
    /// Renders the first `max_rows` rows the way `print(df.head())` would,
    /// followed by a dtype listing.
    pub fn schema_preview(&self, max_rows: usize) -> SchemaPreview {
        let shown = self.num_rows().min(max_rows);

        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.num_columns() + 1);
        let mut index = vec![String::new()];
        index.extend((0..shown).map(|row| row.to_string()));
        grid.push(index);
        for column in self.columns() {
            let mut cells = vec![clip(column.name())];
            cells.extend(column.values()[..shown].iter().map(|v| clip(&v.to_string())));
            grid.push(cells);
        }

        let widths: Vec<usize> = grid
            .iter()
            .map(|cells| cells.iter().map(|c| c.chars().count()).max().unwrap_or(0))
            .collect();

        let mut text = String::new();
        for line in 0..=shown {
            let rendered: Vec<String> = grid
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(col, (cells, width))| {
                    if col == 0 {
                        format!("{:<width$}", cells[line], width = *width)
                    } else {
                        format!("{:>width$}", cells[line], width = *width)
                    }
                })
                .collect();
            text.push_str(rendered.join("  ").trim_end());
            text.push('\n');
        }
        if shown < self.num_rows() {
            text.push_str(&format!(
                "... ({} more rows)\n",
                self.num_rows() - shown
            ));
        }

        text.push_str(&format!(
            "\n[{} rows x {} columns]\n",
            self.num_rows(),
            self.num_columns()
        ));
        let columns: Vec<ColumnSummary> = self
            .columns()
            .iter()
            .map(|c| ColumnSummary {
                name: c.name().to_string(),
                dtype: c.dtype(),
            })
            .collect();
        text.push_str("dtypes:\n");
        for column in &columns {
            text.push_str(&format!("  {}: {}\n", column.name, column.dtype));
        }

        SchemaPreview {
            text,
            columns,
            rows: self.num_rows(),
        }
    }
}

fn clip(raw: &str) -> String {
    if raw.chars().count() <= MAX_CELL_CHARS {
        return raw.to_string();
    }
    let mut clipped: String = raw.chars().take(MAX_CELL_CHARS - 3).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> Table {
        Table::from_reader(
            "region,revenue\nNorth,250\nSouth,300.5\nEast,149.5\nWest,300\n".as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn preview_is_bounded_and_aligned() {
        let preview = table().schema_preview(2);
        assert_eq!(
            preview.text(),
            "   region  revenue\n\
             0   North    250.0\n\
             1   South    300.5\n\
             ... (2 more rows)\n\
             \n\
             [4 rows x 2 columns]\n\
             dtypes:\n  region: object\n  revenue: float64\n"
        );
        assert_eq!(preview.rows(), 4);
        assert_eq!(preview.columns()[1].dtype, DType::Float);
    }

    #[test]
    fn preview_is_stable_across_calls() {
        let table = table();
        assert_eq!(table.schema_preview(5), table.schema_preview(5));
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "x".repeat(100);
        assert_eq!(clip(&long).chars().count(), MAX_CELL_CHARS);
        assert!(clip(&long).ends_with("..."));
    }
}
