use std::{env, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::{
    db::DEFAULT_MAX_POOL_SIZE,
    guest::{GuestLimits, DEFAULT_MAX_GUEST_SESSIONS},
};

pub const DEFAULT_BUCKET: &str = "invoice-tracker-bucket";

/// Which invoices an invoice number has to be unique against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceNumberScope {
    /// Unique per customer (enforced by the `(customer_id, invoice_number)` index).
    Customer,
    /// Unique across every invoice of the account.
    Account,
}

impl FromStr for InvoiceNumberScope {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "account" | "global" => Ok(Self::Account),
            other => Err(anyhow!("unknown invoice number scope: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub session_cookie_secure: bool,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub storage_public_url: String,
    pub invoice_number_scope: InvoiceNumberScope,
    pub clamp_negative_totals: bool,
    pub guest_session_ttl_minutes: u64,
    pub max_guest_sessions: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "invoice-tracker".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "invoice-tracker-clients".to_string());
        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("JWT_EXPIRY_MINUTES must be an integer")?;
        let session_cookie_secure = env_flag("SESSION_COOKIE_SECURE", false);
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
        let storage_public_url = match env::var("STORAGE_PUBLIC_URL") {
            Ok(value) => value,
            Err(_) => default_public_url(aws_endpoint_url.as_deref(), &aws_region),
        };
        let invoice_number_scope = env::var("INVOICE_NUMBER_SCOPE")
            .unwrap_or_else(|_| "customer".to_string())
            .parse()
            .context("INVOICE_NUMBER_SCOPE must be `customer` or `account`")?;
        let clamp_negative_totals = env_flag("CLAMP_NEGATIVE_TOTALS", true);
        let guest_session_ttl_minutes = env::var("GUEST_SESSION_TTL_MINUTES")
            .unwrap_or_else(|_| "720".to_string())
            .parse()
            .context("GUEST_SESSION_TTL_MINUTES must be a positive integer")?;
        let max_guest_sessions = env::var("MAX_GUEST_SESSIONS")
            .unwrap_or_else(|_| DEFAULT_MAX_GUEST_SESSIONS.to_string())
            .parse()
            .context("MAX_GUEST_SESSIONS must be a positive integer")?;

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            session_cookie_secure,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
            storage_public_url,
            invoice_number_scope,
            clamp_negative_totals,
            guest_session_ttl_minutes,
            max_guest_sessions,
        })
    }

    pub fn guest_limits(&self) -> GuestLimits {
        GuestLimits {
            idle_ttl: Duration::from_secs(self.guest_session_ttl_minutes.saturating_mul(60)),
            max_sessions: self.max_guest_sessions,
        }
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn default_public_url(endpoint: Option<&str>, region: &str) -> String {
    match endpoint {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => format!("https://s3.{region}.amazonaws.com"),
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_password(Some("*****"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
