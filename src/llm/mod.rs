pub mod bedrock;
pub mod credentials;
pub mod payload;
pub mod response;
pub mod sigv4;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::error::{ ApiError, ClientInitError };
use self::bedrock::BedrockClient;
use self::credentials::{ CredentialEnv, CredentialSource, credential_chain };
use self::payload::ProviderPayload;

/// The inference provider as seen by request handlers.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send one payload and return the provider's raw JSON response.
    async fn invoke(&self, payload: &ProviderPayload) -> Result<JsonValue, ApiError>;

    fn model_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum Credentials {
    SigV4(Vec<CredentialSource>),
    ApiKey(String),
}

impl Credentials {
    /// A Bedrock API key wins over the AWS credential chain.
    pub fn resolve(env: &CredentialEnv) -> Option<Self> {
        if let Some(key) = &env.bearer_token {
            return Some(Credentials::ApiKey(key.clone()));
        }
        let chain = credential_chain(env);
        if chain.is_empty() {
            None
        } else {
            Some(Credentials::SigV4(chain))
        }
    }
}

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: String,
    pub model_id: String,
    pub endpoint: Option<String>,
    pub credentials: Option<Credentials>,
    pub timeout: Option<Duration>,
}

impl BedrockConfig {
    /// Settings come from `args`; credentials only from the process environment.
    pub fn from_args(args: &Args) -> Self {
        Self::with_env(args, &CredentialEnv::from_env())
    }

    pub fn with_env(args: &Args, env: &CredentialEnv) -> Self {
        Self {
            region: args.region.clone(),
            model_id: args.model_id.clone(),
            endpoint: args.bedrock_endpoint.clone().filter(|e| !e.trim().is_empty()),
            credentials: Credentials::resolve(env),
            timeout: args.provider_timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
        }
    }
}

pub async fn new_client(config: &BedrockConfig) -> Result<Arc<dyn InferenceClient>, ClientInitError> {
    let client = BedrockClient::from_config(config).await?;
    Ok(Arc::new(client))
}
