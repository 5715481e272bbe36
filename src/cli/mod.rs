use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP API to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8000")]
    pub server_addr: String,

    /// Service name reported by the health endpoint.
    #[arg(long, env = "SERVICE_NAME", default_value = "bedrock-ui-backend")]
    pub service_name: String,

    // --- Bedrock Provider Args ---
    /// AWS region hosting the Bedrock runtime (e.g., us-east-1, ap-northeast-1)
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Bedrock model identifier used for chat and diagram generation.
    #[arg(long, env = "BEDROCK_MODEL_ID", default_value = "anthropic.claude-3-sonnet-20240229-v1:0")]
    pub model_id: String,

    // AWS credentials and the Bedrock API key are read from the environment only.

    /// Override for the Bedrock runtime endpoint (e.g., a VPC endpoint). Defaults to the regional endpoint.
    #[arg(long, env = "BEDROCK_ENDPOINT")]
    pub bedrock_endpoint: Option<String>,

    /// Timeout in seconds for a single provider call. Unset means the transport default.
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS")]
    pub provider_timeout_secs: Option<u64>,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_flags() {
        let args = Args::try_parse_from([
            "bedrock-ui-backend",
            "--region",
            "us-east-1",
            "--server-addr",
            "0.0.0.0:8000",
        ])
        .unwrap();
        assert_eq!(args.region, "us-east-1");
        assert_eq!(args.server_addr, "0.0.0.0:8000");
        assert!(!args.enable_tls);
    }

    #[test]
    fn region_flag_overrides_default() {
        let args = Args::try_parse_from(["bedrock-ui-backend", "--region", "ap-northeast-1"]).unwrap();
        assert_eq!(args.region, "ap-northeast-1");
    }

    #[test]
    fn secrets_are_not_accepted_as_flags() {
        for flag in ["--aws-secret-access-key", "--aws-access-key-id", "--aws-session-token", "--bedrock-api-key"] {
            let res = Args::try_parse_from(["bedrock-ui-backend", flag, "value"]);
            assert!(res.is_err(), "{} should not be a flag", flag);
        }
    }
}
