#[tokio::main]
async fn main() -> anyhow::Result<()> {
    repairdesk::run().await
}
