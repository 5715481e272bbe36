//! AWS credential resolution for SigV4 signing.
//!
//! Sources are tried in the usual AWS order: environment keys, the shared
//! credentials/config files, container credentials, then EC2 instance metadata
//! (IMDSv2). Profiles that rely on SSO or role assumption are skipped.

use chrono::{ DateTime, Duration as ChronoDuration, Utc };
use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;

use super::sigv4::StaticCredentials;
use crate::error::{ ClientInitError, ProviderError, error_chain };

const CONTAINER_HOST: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECS: &str = "21600";
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Environment inputs to credential resolution, captured once so resolution is testable.
#[derive(Clone, Default)]
pub struct CredentialEnv {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub bearer_token: Option<String>,
    pub profile: Option<String>,
    pub shared_credentials_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub container_relative_uri: Option<String>,
    pub container_full_uri: Option<String>,
    pub container_auth_token: Option<String>,
    pub imds_disabled: bool,
    pub imds_endpoint: Option<String>,
}

impl std::fmt::Debug for CredentialEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEnv")
            .field("access_key_id", &self.access_key_id)
            .field("profile", &self.profile)
            .field("shared_credentials_file", &self.shared_credentials_file)
            .field("config_file", &self.config_file)
            .field("container_relative_uri", &self.container_relative_uri)
            .field("container_full_uri", &self.container_full_uri)
            .field("imds_disabled", &self.imds_disabled)
            .finish_non_exhaustive()
    }
}

impl CredentialEnv {
    /// Secrets are only ever read from the environment (or `.env`), never from flags.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            session_token: var("AWS_SESSION_TOKEN"),
            bearer_token: var("AWS_BEARER_TOKEN_BEDROCK"),
            profile: var("AWS_PROFILE"),
            shared_credentials_file: var("AWS_SHARED_CREDENTIALS_FILE").map(PathBuf::from),
            config_file: var("AWS_CONFIG_FILE").map(PathBuf::from),
            home: var("HOME").or_else(|| var("USERPROFILE")).map(PathBuf::from),
            container_relative_uri: var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI"),
            container_full_uri: var("AWS_CONTAINER_CREDENTIALS_FULL_URI"),
            container_auth_token: var("AWS_CONTAINER_AUTHORIZATION_TOKEN"),
            imds_disabled: var("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            imds_endpoint: var("AWS_EC2_METADATA_SERVICE_ENDPOINT"),
        }
    }

    fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or("default")
    }

    fn credentials_path(&self) -> Option<PathBuf> {
        self.shared_credentials_file.clone().or_else(|| self.home.as_ref().map(|h| h.join(".aws").join("credentials")))
    }

    fn config_path(&self) -> Option<PathBuf> {
        self.config_file.clone().or_else(|| self.home.as_ref().map(|h| h.join(".aws").join("config")))
    }
}

#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(StaticCredentials),
    Container {
        url: String,
        auth_token: Option<String>,
    },
    InstanceMetadata {
        endpoint: String,
    },
}

impl CredentialSource {
    fn describe(&self) -> &'static str {
        match self {
            CredentialSource::Static(_) => "static keys",
            CredentialSource::Container { .. } => "container credentials",
            CredentialSource::InstanceMetadata { .. } => "EC2 instance metadata",
        }
    }
}

/// Ordered list of sources to try. Empty when nothing could possibly supply credentials.
pub fn credential_chain(env: &CredentialEnv) -> Vec<CredentialSource> {
    let mut chain = Vec::new();

    if let (Some(access_key_id), Some(secret_access_key)) = (&env.access_key_id, &env.secret_access_key) {
        chain.push(
            CredentialSource::Static(StaticCredentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: env.session_token.clone(),
            })
        );
    }

    if let Some(creds) = profile_credentials(env) {
        chain.push(CredentialSource::Static(creds));
    }

    if let Some(uri) = &env.container_full_uri {
        chain.push(CredentialSource::Container { url: uri.clone(), auth_token: env.container_auth_token.clone() });
    } else if let Some(path) = &env.container_relative_uri {
        chain.push(CredentialSource::Container { url: format!("{}{}", CONTAINER_HOST, path), auth_token: None });
    }

    if !env.imds_disabled {
        let endpoint = env.imds_endpoint.clone().unwrap_or_else(|| IMDS_ENDPOINT.to_string());
        chain.push(CredentialSource::InstanceMetadata { endpoint: endpoint.trim_end_matches('/').to_string() });
    }

    chain
}

/// Static keys for the selected profile. The credentials file wins over the config file.
fn profile_credentials(env: &CredentialEnv) -> Option<StaticCredentials> {
    let profile = env.profile_name();

    let from_credentials = env.credentials_path()
        .and_then(|p| fs::read_to_string(p).ok())
        .and_then(|text| parse_ini(&text).remove(profile));
    let from_config = env.config_path()
        .and_then(|p| fs::read_to_string(p).ok())
        .and_then(|text| {
            let mut sections = parse_ini(&text);
            let key = if profile == "default" { "default".to_string() } else { format!("profile {}", profile) };
            sections.remove(&key)
        });

    let mut merged = from_config.unwrap_or_default();
    merged.extend(from_credentials.unwrap_or_default());

    match (merged.get("aws_access_key_id"), merged.get("aws_secret_access_key")) {
        (Some(access_key_id), Some(secret_access_key)) =>
            Some(StaticCredentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: merged.get("aws_session_token").cloned(),
            }),
        _ => {
            if merged.contains_key("sso_session") || merged.contains_key("sso_start_url") || merged.contains_key("role_arn") {
                warn!("AWS profile '{}' uses SSO or role assumption, which is not supported; skipping", profile);
            }
            None
        }
    }
}

fn parse_ini(text: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            if let Some(entries) = sections.get_mut(section) {
                entries.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
    }
    sections
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<String>,
}

#[derive(Clone)]
struct Cached {
    credentials: StaticCredentials,
    expires_at: Option<DateTime<Utc>>,
}

/// Holds the source that produced credentials at startup and refreshes them before expiry.
pub struct CredentialsProvider {
    source: CredentialSource,
    http: HttpClient,
    cached: RwLock<Cached>,
}

impl CredentialsProvider {
    /// Walk the chain and keep the first source that yields credentials.
    pub async fn resolve(chain: Vec<CredentialSource>) -> Result<Self, ClientInitError> {
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(5))
            .build()?;

        for source in chain {
            match fetch(&http, &source).await {
                Ok(cached) => {
                    info!("AWS credentials resolved from {}", source.describe());
                    return Ok(Self { source, http, cached: RwLock::new(cached) });
                }
                Err(e) => warn!("No AWS credentials from {}: {}", source.describe(), e),
            }
        }
        Err(ClientInitError::MissingCredentials)
    }

    pub async fn current(&self) -> Result<StaticCredentials, ProviderError> {
        {
            let cached = self.cached.read().await;
            if !needs_refresh(cached.expires_at, Utc::now()) {
                return Ok(cached.credentials.clone());
            }
        }

        let fresh = fetch(&self.http, &self.source).await?;
        let credentials = fresh.credentials.clone();
        *self.cached.write().await = fresh;
        info!("Refreshed AWS credentials from {}", self.source.describe());
        Ok(credentials)
    }
}

fn needs_refresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| at - now < ChronoDuration::minutes(REFRESH_MARGIN_MINUTES))
}

async fn fetch(http: &HttpClient, source: &CredentialSource) -> Result<Cached, ProviderError> {
    let remote = match source {
        CredentialSource::Static(creds) => {
            return Ok(Cached { credentials: creds.clone(), expires_at: None });
        }
        CredentialSource::Container { url, auth_token } => {
            let mut req = http.get(url);
            if let Some(token) = auth_token {
                req = req.header(reqwest::header::AUTHORIZATION, token);
            }
            get_json::<RemoteCredentials>(req).await?
        }
        CredentialSource::InstanceMetadata { endpoint } => {
            let token = http
                .put(format!("{}/latest/api/token", endpoint))
                .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECS)
                .send().await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ProviderError::transport(error_chain(&e)))?
                .text().await
                .map_err(|e| ProviderError::transport(error_chain(&e)))?;

            let roles_url = format!("{}/latest/meta-data/iam/security-credentials/", endpoint);
            let role = http
                .get(&roles_url)
                .header("x-aws-ec2-metadata-token", &token)
                .send().await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ProviderError::transport(error_chain(&e)))?
                .text().await
                .map_err(|e| ProviderError::transport(error_chain(&e)))?;
            let role = role
                .lines()
                .next()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| ProviderError::transport("no IAM role attached to the instance"))?
                .to_string();

            get_json::<RemoteCredentials>(
                http.get(format!("{}{}", roles_url, role)).header("x-aws-ec2-metadata-token", &token)
            ).await?
        }
    };

    let expires_at = remote.expiration
        .as_deref()
        .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
        .map(|e| e.with_timezone(&Utc));

    Ok(Cached {
        credentials: StaticCredentials {
            access_key_id: remote.access_key_id,
            secret_access_key: remote.secret_access_key,
            session_token: remote.token,
        },
        expires_at,
    })
}

async fn get_json<T: for<'de> Deserialize<'de>>(req: reqwest::RequestBuilder) -> Result<T, ProviderError> {
    req.send().await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ProviderError::transport(error_chain(&e)))?
        .json::<T>().await
        .map_err(|e| ProviderError::transport(error_chain(&e)))
}
