use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dte_dispatch::app::SubmissionClient;
use dte_dispatch::config::{Config, Environment};
use dte_dispatch::domain::Certificate;
use dte_dispatch::infra::http_client::ReqwestUploader;
use dte_dispatch::infra::token::StaticTokenManager;
use dte_dispatch::logging;
use dte_dispatch::rut::TaxpayerId;
use dte_dispatch::xml::{decode_latin1, XmlDocument};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "dte-dispatch")]
#[command(about = "Upload signed DTE envelopes to the SII")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an XML envelope and print its tracking id
    Send {
        /// Signed envelope to upload (ISO-8859-1 or UTF-8)
        #[arg(long)]
        file: PathBuf,
        /// Company the envelope is sent for, e.g. 76192083-9
        #[arg(long)]
        company: String,
        /// Taxpayer id of the certificate holder sending the envelope
        #[arg(long)]
        sender: String,
        /// Session token issued by the SII
        #[arg(long, env = "DTE_DISPATCH_TOKEN")]
        token: String,
        /// Upload the envelope gzipped
        #[arg(long)]
        compress: bool,
        /// Retry budget, capped at 10
        #[arg(long)]
        retries: Option<u32>,
        /// TOML config file with a [connection] table
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides the configured environment
        #[arg(long, value_enum)]
        environment: Option<Environment>,
    },
    /// Validate a taxpayer id and print its number and check digit
    CheckRut { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging("logs");

    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            file,
            company,
            sender,
            token,
            compress,
            retries,
            config,
            environment,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            }
            .apply_env_overrides()?;
            if let Some(environment) = environment {
                config.connection.environment = environment;
            }

            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => decode_latin1(e.as_bytes()),
            };
            let document = XmlDocument::parse(text).context("The envelope is not well-formed XML")?;

            let transport = ReqwestUploader::new(&config.connection).map_err(anyhow::Error::msg)?;
            let client = SubmissionClient::new(
                Arc::new(Certificate::new(sender.clone(), sender)),
                config.connection,
                Arc::new(StaticTokenManager::new(token)),
                Arc::new(transport),
            );

            info!(file = %file.display(), company = %company, "Sending envelope");
            let track_id = client.submit(&document, &company, compress, retries).await?;
            println!("{}", track_id);
        }
        Commands::CheckRut { id } => {
            let rut = TaxpayerId::parse(&id)?;
            let (number, check_digit) = rut.decompose();
            println!("{} number={} check_digit={}", rut, number, check_digit);
        }
    }

    Ok(())
}
