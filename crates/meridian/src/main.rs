//! Binary entry point for the Meridian World Server.

#[tokio::main]
async fn main() {
    if let Err(e) = lib_meridian::init().await {
        eprintln!("❌ Fatal error: {e}");
        std::process::exit(1);
    }
}
