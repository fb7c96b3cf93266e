#[tokio::main]
async fn main() -> std::io::Result<()> {
    move_sync::run_with_config().await
}
