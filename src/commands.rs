//! Subcommands of the `eartho-one` binary.

use std::collections::HashMap;
use std::error::Error;
use std::fs;

use chrono::Utc;
use log::{debug, info, warn};
use one_auth::http::HttpClientBuilder;
use one_auth::{
    values_from_uri, AccountConfig, AuthenticationApiClient, CodeVerifier, Credentials, Jwt,
    LoginFlow, LoginOptions, Pkce, SignatureVerifier,
};
use secrecy::{ExposeSecret, SecretString};
use service::config::Config;
use tokio::io::{self, AsyncBufReadExt, BufReader};

type CommandResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Run a full login: print the authorization URL, read the callback, exchange and verify.
pub async fn login(config: &Config) -> CommandResult {
    let api_client = api_client(config)?;

    let mut options = LoginOptions::new(&config.redirect_uri, &config.access_id);
    options.scope = config.scope.clone();
    options.max_age = config.max_age.map(i64::from);
    options.leeway = Some(chrono::Duration::seconds(config.id_token_leeway_secs.into()));
    options.headers = token_headers(config);

    let flow = LoginFlow::start(api_client, options)?;
    println!("Open the following URL in a browser to sign in:\n\n{}\n", flow.authorize_url());
    println!("Then paste the URI you were redirected to:");

    let mut callback_uri = String::new();
    BufReader::new(io::stdin())
        .read_line(&mut callback_uri)
        .await?;

    let credentials = flow.resume(callback_uri.trim(), Utc::now()).await?;
    info!("Signed in");
    print_credentials(&credentials);
    Ok(())
}

/// Print the values of a redirect callback URI as JSON.
pub fn parse_callback(uri: &str) -> CommandResult {
    let values = values_from_uri(Some(uri));
    if values.is_empty() {
        warn!("No values found in {}", uri);
    }
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

/// Verify a token's signature and print its payload.
pub fn verify_token(config: &Config, token: &str, hmac_secret: Option<&str>) -> CommandResult {
    let verifier = match hmac_secret {
        Some(secret) => SignatureVerifier::for_symmetric_algorithm(SecretString::new(secret.to_string())),
        None => {
            let pem = public_key(config)?.ok_or("A public key file is required without --hmac-secret")?;
            SignatureVerifier::for_asymmetric_algorithm(&pem)?
        }
    };

    let jwt = Jwt::parse(token)?;
    verifier.verify(&jwt)?;
    info!("Signature verified with {}", jwt.algorithm().unwrap_or_default());

    println!("{}", serde_json::to_string_pretty(jwt.payload())?);
    Ok(())
}

/// Report PKCE support and print a fresh verifier/challenge pair.
pub fn pkce() -> CommandResult {
    if !Pkce::is_available() {
        return Err("PKCE is not available on this platform".into());
    }

    let verifier = CodeVerifier::generate();
    println!("code_verifier:  {}", verifier.as_str());
    println!("code_challenge: {}", verifier.challenge());
    Ok(())
}

fn api_client(config: &Config) -> Result<AuthenticationApiClient, Box<dyn Error + Send + Sync>> {
    let mut account = AccountConfig::new(config.client_id())?
        .with_domain(config.domain())?
        .with_auth_url(config.auth_url())?
        .with_enabled_providers(config.enabled_providers.clone());
    if let Some(pem) = public_key(config)? {
        account = account.with_public_key(pem);
    }

    let http_client = HttpClientBuilder::new()
        .with_timeout(config.http_timeout())
        .with_max_retries(config.http_max_retries)
        .build()?;

    Ok(AuthenticationApiClient::with_http_client(account, http_client))
}

fn public_key(config: &Config) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
    let Some(path) = config.public_key_file() else {
        return Ok(None);
    };
    debug!("Reading public key from {}", path.display());
    let pem = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read public key {}: {}", path.display(), e))?;
    Ok(Some(pem))
}

fn token_headers(config: &Config) -> HashMap<String, String> {
    config.token_headers.iter().cloned().collect()
}

fn print_credentials(credentials: &Credentials) {
    let present = |token: &Option<SecretString>| {
        token
            .as_ref()
            .map(|t| format!("present ({} chars)", t.expose_secret().len()))
            .unwrap_or_else(|| "absent".to_string())
    };

    println!("id_token:      {}", present(&credentials.id_token));
    println!("access_token:  {}", present(&credentials.access_token));
    println!("refresh_token: {}", present(&credentials.refresh_token));
    println!(
        "token_type:    {}",
        credentials.token_type.as_deref().unwrap_or("-")
    );
    println!(
        "expires_at:    {}",
        credentials
            .expires_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(scope) = &credentials.scope {
        println!("scope:         {}", scope);
    }
}
