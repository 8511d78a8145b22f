#[tokio::main]
async fn main() {
    if let Err(e) = carechat_lib::run().await {
        tracing::error!("{e}");
        eprintln!("carechat: {e}");
        std::process::exit(1);
    }
}
