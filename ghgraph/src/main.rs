#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ghgraph::run_cli().await
}
