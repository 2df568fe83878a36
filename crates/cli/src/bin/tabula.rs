use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tabula_cli::main_entry().await
}
