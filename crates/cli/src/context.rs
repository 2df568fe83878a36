use anyhow::{anyhow, Context as AnyhowContext, Result};
use std::sync::Arc;
use tabula_expr::{Limits, QueryExecutor};
use tabula_protocol::{ColumnInfo, SchemaResponse};
use tabula_synth::Synthesizer;
use tabula_table::{SchemaPreview, Table};

use crate::config::Config;

/// Everything a request needs, built once before the listener binds.
#[derive(Clone)]
pub struct AppContext {
    executor: QueryExecutor,
    synthesizer: Synthesizer,
    preview: Arc<SchemaPreview>,
}

impl AppContext {
    pub fn new(
        table: Arc<Table>,
        synthesizer: Synthesizer,
        limits: Limits,
        preview_rows: usize,
    ) -> Self {
        let preview = Arc::new(table.schema_preview(preview_rows));
        Self {
            executor: QueryExecutor::new(table, limits),
            synthesizer,
            preview,
        }
    }

    /// Loads the table and builds the configured synthesizer.
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .model
            .validate()
            .map_err(|err| anyhow!(err))
            .context("Invalid model configuration")?;
        let table = load_table(config)?;
        let synthesizer = Synthesizer::from_settings(&config.model)
            .context("Failed to initialise the expression synthesizer")?;
        log::info!(
            "Synthesizer: {} backend, timeout {:?}",
            synthesizer.backend_name(),
            synthesizer.timeout()
        );
        Ok(Self::new(
            table,
            synthesizer,
            config.limits,
            config.data.preview_rows,
        ))
    }

    pub fn table(&self) -> &Arc<Table> {
        self.executor.table()
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    pub fn preview(&self) -> &SchemaPreview {
        &self.preview
    }

    pub fn schema(&self) -> SchemaResponse {
        schema_response(&self.preview)
    }
}

/// Body of `GET /schema` for a preview.
pub fn schema_response(preview: &SchemaPreview) -> SchemaResponse {
    SchemaResponse {
        rows: preview.rows(),
        columns: preview
            .columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                dtype: c.dtype.name().to_string(),
            })
            .collect(),
        preview: preview.text().to_string(),
    }
}

/// Loads the configured CSV once. A missing or malformed file is fatal.
pub fn load_table(config: &Config) -> Result<Arc<Table>> {
    let path = &config.data.path;
    let table = Table::load(path)
        .with_context(|| format!("Failed to load data file {}", path.display()))?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.num_rows(),
        table.num_columns(),
        path.display()
    );
    Ok(Arc::new(table))
}
