use std::env;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use invoice_tracker::{
    auth::password::{hash_password, is_valid_email, MIN_PASSWORD_LENGTH},
    config::AppConfig,
    db,
    store::{PgRecordStore, RecordStore},
};

const USAGE: &str = "Usage: maintenance <create-user|set-password> <email> <password>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    let command = args.next();
    let email = args.next();
    let password = args.next();

    let (command, email, password) = match (command, email, password) {
        (Some(command), Some(email), Some(password)) => (command, email, password),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    if !is_valid_email(&email) {
        bail!("{email} is not a valid email address");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!("password must be at least {MIN_PASSWORD_LENGTH} characters long");
    }

    let store = open_store()?;
    match command.as_str() {
        "create-user" => create_user(&store, &email, &password).await?,
        "set-password" => set_password(&store, &email, &password).await?,
        other => {
            eprintln!("Unknown command: {other}\n{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn open_store() -> Result<PgRecordStore> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;
    Ok(PgRecordStore::new(pool, config.invoice_number_scope))
}

async fn create_user(store: &PgRecordStore, email: &str, password: &str) -> Result<()> {
    let hash = hash_password(password)?;
    let user = store
        .create_user(email, &hash)
        .await
        .context("failed to create user")?;
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}

async fn set_password(store: &PgRecordStore, email: &str, password: &str) -> Result<()> {
    let user = store
        .find_user_by_email(email)
        .await
        .context("failed to look up user")?
        .with_context(|| format!("no user with email {email}"))?;
    let hash = hash_password(password)?;
    store
        .update_user_password(user.id, &hash)
        .await
        .context("failed to update password")?;
    println!("Password updated for {}", user.email);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
