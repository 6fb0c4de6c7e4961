#[tokio::main]
async fn main() -> anyhow::Result<()> {
    study_service::run().await
}
