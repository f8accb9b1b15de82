#[tokio::main]
async fn main() {
    if let Err(e) = medshare_lib::run().await {
        eprintln!("medshare: {e}");
        std::process::exit(1);
    }
}
