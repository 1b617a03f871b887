use log::{error, info};
use service::{
    config::{Command, Config},
    logging::Logger,
};

mod commands;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start the logger: {e}");
        std::process::exit(1);
    }

    info!("Using token API [{}]", config.auth_url());

    let result = match &config.command {
        Command::Login => commands::login(&config).await,
        Command::ParseCallback { uri } => commands::parse_callback(uri),
        Command::VerifyToken { token, hmac_secret } => {
            commands::verify_token(&config, token, hmac_secret.as_deref())
        }
        Command::Pkce => commands::pkce(),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
