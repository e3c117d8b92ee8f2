#[tokio::main]
async fn main() -> anyhow::Result<()> {
    screenbox::run().await
}
