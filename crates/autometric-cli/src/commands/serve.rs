//! Server command implementation

use anyhow::Result;
use autometric_core::ServiceConfig;
use tracing::error;

use super::open_predictor;

pub async fn cmd_serve(config: ServiceConfig, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or(&config.host).to_string();
    let port = port.unwrap_or(config.port);

    println!("🚀 Starting AutoMetric API...");
    println!("   Model: {}", config.model_path.display());
    println!("   Schema: {}", config.schema_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if !config.explain_enabled {
        println!("   Explainability: disabled");
    }
    if !config.allowed_origins.is_empty() {
        println!("   CORS origins: {}", config.allowed_origins.join(", "));
    }
    println!();
    println!("   Press Ctrl+C to stop");

    // A broken model still lets the server come up and report it on /health
    let predictor = match open_predictor(&config) {
        Ok(p) => Some(p),
        Err(e) => {
            error!("{:#}", e);
            None
        }
    };

    let server_config = autometric_server::ServerConfig {
        allowed_origins: config.allowed_origins.clone(),
        reference_date: None,
    };

    autometric_server::serve(predictor, &host, port, server_config).await
}
