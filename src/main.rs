#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    event_sync_lib::run().await
}
