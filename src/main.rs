use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use brokerage::{
    credentials::OtpGenerator,
    repositories::{
        mail::{LogMailer, Mailer, SmtpMailer},
        users::{MemoryUserStore, PostgresUserStore, UserStore},
    },
    services,
    settings::{Settings, StorageBackend},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = dotenv::dotenv();
    let settings = Settings::new(&args.config)?;

    init_logging(&args.log4rs)?;
    log::info!("Starting brokerage backend.");

    let store = connect_store(&settings).await?;
    let mailer = build_mailer(&settings)?;
    let otp = match &settings.otp.secret {
        Some(secret) => OtpGenerator::new(
            secret.as_bytes().to_vec(),
            settings.otp.step_seconds,
            settings.otp.digits,
        ),
        None => {
            log::warn!("No OTP secret configured, using a random one for this process.");
            OtpGenerator::random(settings.otp.step_seconds, settings.otp.digits)
        }
    };

    let state = services::start_services(store, mailer, otp, settings.notifications.clone());

    let address = args.listen.unwrap_or_else(|| settings.server.address());
    services::http::start_http_server(state, &address).await?;

    Ok(())
}

async fn connect_store(settings: &Settings) -> Result<Arc<dyn UserStore>> {
    match settings.storage.backend {
        StorageBackend::Postgres => {
            let conn = PgPoolOptions::new()
                .max_connections(settings.postgres.max_connections)
                .connect(&settings.postgres.url)
                .await?;
            let store = PostgresUserStore::new(conn);
            store.migrate().await?;
            log::info!("Connected to Postgres.");

            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            log::warn!("Using the in-memory user store, data is lost on restart.");
            Ok(Arc::new(MemoryUserStore::new()))
        }
    }
}

fn build_mailer(settings: &Settings) -> Result<Arc<dyn Mailer>> {
    if settings.smtp.enabled {
        log::info!("Delivering email through {}.", settings.smtp.host);
        Ok(Arc::new(SmtpMailer::new(&settings.smtp)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
