use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    moderation_cli::main_entry().await
}
