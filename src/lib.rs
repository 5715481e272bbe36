pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;

use cli::Args;
use llm::{ new_client, BedrockConfig, InferenceClient };
use log::{ error, info };
use server::{ AppState, Server };
use std::error::Error;
use std::sync::Arc;

/// Build the provider client once. A failure here is permanent for the process lifetime.
pub async fn init_inference_client(args: &Args) -> Option<Arc<dyn InferenceClient>> {
    let config = BedrockConfig::from_args(args);
    match new_client(&config).await {
        Ok(client) => {
            info!("Bedrock client initialized: Region={}, Model={}", config.region, client.model_id());
            Some(client)
        }
        Err(e) => {
            error!("Failed to initialize Bedrock client: {}", e);
            None
        }
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Service Name: {}", args.service_name);
    info!("AWS Region: {}", args.region);
    info!("Bedrock Model: {}", args.model_id);
    info!("Bedrock Endpoint: {}", args.bedrock_endpoint.as_deref().unwrap_or("regional default"));
    info!(
        "Provider Timeout: {}",
        args.provider_timeout_secs.map(|s| format!("{}s", s)).unwrap_or_else(|| "transport default".into())
    );
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let client = init_inference_client(&args).await;
    let state = AppState::new(client, args.region.clone(), args.service_name.clone());
    let server = Server::new(args.server_addr.clone(), state, args.clone());
    server.run().await?;

    Ok(())
}
