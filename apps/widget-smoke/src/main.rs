use std::{env, path::PathBuf};

use widget_analysis::{AnalysisBackend, AnalysisBackendConfig};
use widget_platform::{FileIdentityStore, load_or_create_identity};

#[tokio::main]
async fn main() {
    let base_url = env::var("LUMERA_ANALYSIS_URL")
        .unwrap_or_else(|_| "https://api.lumera.example".to_owned());
    let identity_path = env::var("LUMERA_IDENTITY_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.lumera-smoke-identity.json"));

    let identity = match load_or_create_identity(&FileIdentityStore::new(identity_path)) {
        Ok(identity) => identity,
        Err(err) => {
            eprintln!("Failed to load client identity: {err}");
            std::process::exit(1);
        }
    };

    let backend = match AnalysisBackend::new(AnalysisBackendConfig::new(base_url, identity)) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("Failed to initialize analysis backend: {err}");
            std::process::exit(1);
        }
    };

    println!("Analysis backend initialized for {}", backend.base_url());
    match backend.health().await {
        Ok(()) => println!("Health probe OK."),
        Err(err) => println!("Health probe failed (non-fatal): {err}"),
    }
}
