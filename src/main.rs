//! CMS Engine - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = cms_engine::run().await {
        tracing::error!(error = %e, "cms-engine failed");
        eprintln!("cms-engine: {}", e);
        std::process::exit(1);
    }
}
