use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use namibot_api::AppState;
use namibot_brokers_common::{PaperExchange, PaperExchangeConfig};
use namibot_brokers_nami::{signer, NamiClient, Signer};
use namibot_core::{BotConfig, Credentials, Exchange};
use namibot_engine::{Poller, PollerConfig, RunState};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_WEBHOOK_TOKEN: &str = "change_me_secret";

#[derive(Parser)]
#[command(name = "namibot")]
#[command(about = "Threshold trading bot for the Nami exchange with an HTTP control surface")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// TOML config file (symbol, thresholds, interval, ...)
    #[arg(short, long, env = "NAMIBOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    /// Exchange API key
    #[arg(long, env = "NAMI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Exchange API secret
    #[arg(long, env = "NAMI_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,
}

impl CredentialArgs {
    fn require(&self) -> Result<Credentials> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .context("NAMI_API_KEY is not set")?;
        let secret = self
            .api_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .context("NAMI_API_SECRET is not set")?;
        Ok(Credentials::new(key, secret))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control API and the polling loop
    Serve {
        /// Bind address (defaults to 0.0.0.0:$PORT)
        #[arg(short, long)]
        bind: Option<String>,

        /// Port used when --bind is not given
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,

        /// Bearer token for the protected routes
        #[arg(long, env = "WEBHOOK_TOKEN", hide_env_values = true)]
        webhook_token: Option<String>,

        /// Trade against an in-memory paper exchange instead of Nami
        #[arg(long)]
        paper: bool,

        /// Starting quote for the paper exchange
        #[arg(long, requires = "paper")]
        paper_price: Option<Decimal>,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Fetch and print the current price once
    Price {
        /// Symbol to quote (defaults to the configured symbol)
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Print the request signature for the given material
    Sign {
        /// HTTP method
        #[arg(short, long, default_value = "POST")]
        method: String,

        /// Request path relative to the API base (e.g. /order)
        #[arg(short, long)]
        path: String,

        /// Request body or canonical query string
        #[arg(short, long, default_value = "")]
        body: String,

        /// Unix milliseconds (defaults to now)
        #[arg(short, long)]
        timestamp: Option<String>,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    match cli.log_format {
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).with_target(false).init(),
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            port,
            webhook_token,
            paper,
            paper_price,
            credentials,
        } => {
            let bind = bind.unwrap_or_else(|| format!("0.0.0.0:{}", port));
            let exchange: Arc<dyn Exchange> = if paper {
                let mut paper_config = PaperExchangeConfig::default();
                if let Some(price) = paper_price {
                    paper_config.initial_price = price;
                }
                info!(price = %paper_config.initial_price, "Using paper exchange");
                Arc::new(PaperExchange::new(paper_config))
            } else {
                Arc::new(NamiClient::new(&config.exchange, credentials.require()?)?)
            };
            let token = match webhook_token.filter(|t| !t.is_empty()) {
                Some(token) => token,
                None => {
                    warn!("WEBHOOK_TOKEN is not set, falling back to the default token");
                    DEFAULT_WEBHOOK_TOKEN.to_string()
                }
            };
            serve(config, exchange, token, &bind).await?;
        }
        Commands::Price { symbol } => {
            let symbol = symbol.unwrap_or_else(|| config.exchange.symbol.clone());
            // Ticker reads are public, so no credentials are needed.
            let client = NamiClient::new(&config.exchange, Credentials::new("", ""))?;
            let price = client.last_price(&symbol).await?;
            println!("{} {}", symbol, price);
        }
        Commands::Sign {
            method,
            path,
            body,
            timestamp,
            credentials,
        } => {
            let timestamp = timestamp.unwrap_or_else(signer::timestamp_millis);
            let headers = Signer::new(credentials.require()?)
                .sign_request_at(&timestamp, &method, &path, &body)?;
            println!("{}: {}", signer::HEADER_API_KEY, headers.api_key);
            println!("{}: {}", signer::HEADER_API_SIGN, headers.signature);
            println!("{}: {}", signer::HEADER_API_TIMESTAMP, headers.timestamp);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BotConfig> {
    let config = match path {
        Some(path) => BotConfig::load(path)?,
        None => {
            let config = BotConfig::default();
            config.validate()?;
            config
        }
    };
    info!(
        symbol = %config.exchange.symbol,
        buy_price = %config.strategy.buy_price,
        sell_price = %config.strategy.sell_price,
        quantity = %config.strategy.quantity,
        repeat_policy = ?config.strategy.repeat_policy,
        "Configuration loaded"
    );
    Ok(config)
}

/// Run the poller and the API until Ctrl-C.
async fn serve(
    config: BotConfig,
    exchange: Arc<dyn Exchange>,
    webhook_token: String,
    bind: &str,
) -> Result<()> {
    let run_state = Arc::new(RunState::default());
    let poller_config = PollerConfig::from_bot_config(&config);
    let shutdown = CancellationToken::new();

    let poller = Poller::new(exchange.clone(), poller_config.clone(), run_state.clone())
        .spawn(shutdown.clone());

    let app_state = AppState::new(run_state, exchange, poller_config, webhook_token)
        .with_trigger_executes(config.api.trigger_executes);

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    });

    let served = namibot_api::start_server(Arc::new(app_state), bind, shutdown.clone()).await;
    shutdown.cancel();
    poller.await.context("Poller task failed")?;
    served
}
