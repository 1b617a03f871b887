use clap::builder::TypedValueParser as _;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Host serving the authorization page when `DOMAIN` is not set.
pub const DEFAULT_DOMAIN: &str = "https://one.eartho.world";
/// Token API when `AUTH_URL` is not set.
pub const DEFAULT_AUTH_URL: &str = "https://api.eartho.world";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The client identifier registered with the identity provider.
    #[arg(long, env, default_value = "")]
    client_id: String,

    /// The host serving the authorization page.
    #[arg(long, env, default_value = DEFAULT_DOMAIN)]
    domain: String,

    /// The base URL of the token API. Also the expected ID token issuer.
    #[arg(long, env, default_value = DEFAULT_AUTH_URL)]
    auth_url: String,

    /// Where the provider redirects after the user signs in.
    #[arg(long, env, default_value = "http://localhost:4000/callback")]
    pub redirect_uri: String,

    /// The access configuration to sign in with.
    #[arg(long, env, default_value = "")]
    pub access_id: String,

    /// PEM file holding the public key that signs ID tokens.
    #[arg(long, env)]
    public_key_file: Option<PathBuf>,

    /// Login providers offered on the authorization page.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true)]
    pub enabled_providers: Vec<String>,

    /// The scope to request. `openid` is always added.
    #[arg(long, env, default_value = "openid profile email")]
    pub scope: String,

    /// Clock skew in seconds tolerated when checking ID token times.
    #[arg(long, env, default_value_t = 60)]
    pub id_token_leeway_secs: u32,

    /// Maximum seconds since the user last authenticated.
    #[arg(long, env)]
    pub max_age: Option<u32>,

    /// Timeout in seconds for requests to the token API.
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Retries for transient token API failures. Authorization codes are single-use.
    #[arg(long, env, default_value_t = 0)]
    pub http_max_retries: u32,

    /// Extra header sent with the token request, as `Name: value`. Repeatable.
    #[arg(long = "token-header", value_parser = parse_header)]
    pub token_headers: Vec<(String, String)>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Print the authorization URL, then read the callback URI from stdin and sign in.
    Login,
    /// Print the parameters carried by a redirect callback URI as JSON.
    ParseCallback {
        /// The full callback URI.
        uri: String,
    },
    /// Verify a JWT's signature and print its payload.
    VerifyToken {
        /// The compact serialized token.
        token: String,
        /// Verify an HS256 signature with this secret instead of the public key.
        #[arg(long, env)]
        hmac_secret: Option<String>,
    },
    /// Check PKCE support and print a fresh verifier and challenge.
    Pkce,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn public_key_file(&self) -> Option<&PathBuf> {
        self.public_key_file.as_ref()
    }

    pub fn id_token_leeway(&self) -> Duration {
        Duration::from_secs(self.id_token_leeway_secs.into())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, header_value) = value
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in `{}`", value));
    }
    Ok((name.to_string(), header_value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("eartho-one").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--client-id", "client-123", "pkce"]);
        assert_eq!(config.client_id(), "client-123");
        assert_eq!(config.scope, "openid profile email");
        assert_eq!(config.id_token_leeway(), Duration::from_secs(60));
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.http_max_retries, 0);
        assert!(config.token_headers.is_empty());
        assert!(matches!(config.command, Command::Pkce));
    }

    #[test]
    fn test_repeated_token_headers() {
        let config = parse(&[
            "--token-header",
            "X-Tenant: acme",
            "--token-header",
            "X-Trace:abc:def",
            "login",
        ]);
        assert_eq!(
            config.token_headers,
            vec![
                ("X-Tenant".to_string(), "acme".to_string()),
                ("X-Trace".to_string(), "abc:def".to_string()),
            ]
        );
    }

    #[test]
    fn test_enabled_providers_are_comma_delimited() {
        let config = parse(&["--enabled-providers", "google,apple", "login"]);
        assert_eq!(config.enabled_providers, vec!["google", "apple"]);
    }

    #[test]
    fn test_verify_token_subcommand() {
        let config = parse(&["verify-token", "a.b.c", "--hmac-secret", "shh"]);
        match config.command {
            Command::VerifyToken { token, hmac_secret } => {
                assert_eq!(token, "a.b.c");
                assert_eq!(hmac_secret.as_deref(), Some("shh"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_header_rejects_malformed() {
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
