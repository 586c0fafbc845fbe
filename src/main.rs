#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wheeliemap_lib::run().await
}
