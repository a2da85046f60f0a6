//! Storage for guest sessions.
//!
//! Each guest session owns a small key/value area holding serialized JSON
//! lists, the same shape a browser keeps in local storage. Nothing here is
//! durable: entries live in process memory until the session logs out or the
//! process stops.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    mapper::split_invoice,
    views::{CompanyData, CustomerData, InvoiceData, InvoiceStatus},
};

pub const GUEST_INVOICES_KEY: &str = "invoice_tracker_guest_invoices";
pub const GUEST_CUSTOMERS_KEY: &str = "invoice_tracker_guest_customers";
pub const GUEST_COMPANY_KEY: &str = "invoice_tracker_guest_company";

pub const DEFAULT_GUEST_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_MAX_GUEST_SESSIONS: usize = 10_000;

type Bucket = HashMap<&'static str, String>;

#[derive(Debug, Error)]
pub enum GuestError {
    #[error("guest session expired")]
    SessionExpired,
    #[error("guest data is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GuestResult<T> = Result<T, GuestError>;

/// Bounds on how many guest sessions are kept and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestLimits {
    /// A session untouched for this long is dropped.
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for GuestLimits {
    fn default() -> Self {
        Self {
            idle_ttl: DEFAULT_GUEST_SESSION_TTL,
            max_sessions: DEFAULT_MAX_GUEST_SESSIONS,
        }
    }
}

struct Session {
    bucket: Bucket,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            bucket: Bucket::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Only sessions registered through [`GuestStore::open_session`] exist;
/// reads for any other id see empty data and create nothing.
#[derive(Default)]
pub struct GuestStore {
    sessions: Mutex<HashMap<String, Session>>,
    counter: AtomicU64,
    limits: GuestLimits,
}

fn read<T: DeserializeOwned + Default>(bucket: &Bucket, key: &str) -> serde_json::Result<T> {
    match bucket.get(key) {
        Some(raw) => serde_json::from_str(raw),
        None => Ok(T::default()),
    }
}

fn write<T: Serialize>(bucket: &mut Bucket, key: &'static str, value: &T) -> serde_json::Result<()> {
    bucket.insert(key, serde_json::to_string(value)?);
    Ok(())
}

impl GuestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: GuestLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// `<prefix>_<unix millis>_<sequence>`.
    pub fn generate_id(&self, prefix: &str) -> String {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{}_{sequence}", Utc::now().timestamp_millis())
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_seen) >= self.limits.idle_ttl
    }

    /// Registers a freshly minted session id. Expired sessions are swept
    /// first; at the cap the least recently used session is evicted.
    pub async fn open_session(&self, session: &str) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, existing| !self.is_expired(existing, now));
        while sessions.len() >= self.limits.max_sessions.max(1) {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, existing)| existing.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    debug!(mode = "guest", "evicted least recently used guest session");
                }
                None => break,
            }
        }
        sessions.insert(session.to_string(), Session::new());
    }

    /// True for a registered, unexpired session; refreshes its idle timer.
    pub async fn touch(&self, session: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let expired = sessions
            .get(session)
            .map(|existing| self.is_expired(existing, now));
        match expired {
            Some(false) => {
                if let Some(existing) = sessions.get_mut(session) {
                    existing.last_seen = now;
                }
                true
            }
            Some(true) => {
                sessions.remove(session);
                false
            }
            None => false,
        }
    }

    async fn read_bucket<T: DeserializeOwned + Default>(
        &self,
        session: &str,
        key: &str,
    ) -> GuestResult<T> {
        let sessions = self.sessions.lock().await;
        match sessions.get(session) {
            Some(existing) => Ok(read(&existing.bucket, key)?),
            None => Ok(T::default()),
        }
    }

    async fn with_bucket<R>(
        &self,
        session: &str,
        f: impl FnOnce(&mut Bucket) -> serde_json::Result<R>,
    ) -> GuestResult<R> {
        let mut sessions = self.sessions.lock().await;
        let existing = sessions
            .get_mut(session)
            .ok_or(GuestError::SessionExpired)?;
        existing.last_seen = Instant::now();
        Ok(f(&mut existing.bucket)?)
    }

    pub async fn invoices(&self, session: &str) -> GuestResult<Vec<InvoiceData>> {
        self.read_bucket(session, GUEST_INVOICES_KEY).await
    }

    pub async fn invoice(
        &self,
        session: &str,
        invoice_id: &str,
    ) -> GuestResult<Option<InvoiceData>> {
        let invoices = self.invoices(session).await?;
        Ok(invoices
            .into_iter()
            .find(|invoice| invoice.id.as_deref() == Some(invoice_id)))
    }

    /// Stores the invoice, upserting its recipient into the customer list by
    /// email and remembering the sender fields as the guest company.
    pub async fn save_invoice(
        &self,
        session: &str,
        mut invoice: InvoiceData,
    ) -> GuestResult<InvoiceData> {
        let invoice_id = match invoice.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => self.generate_id("guest_inv"),
        };
        let fresh_customer_id = self.generate_id("guest_cust");
        let parts = split_invoice(&invoice);

        self.with_bucket(session, move |bucket| -> serde_json::Result<InvoiceData> {
            let mut customers: Vec<CustomerData> = read(bucket, GUEST_CUSTOMERS_KEY)?;
            let customer_id = match customers
                .iter_mut()
                .find(|customer| customer.email.eq_ignore_ascii_case(&parts.customer.email))
            {
                Some(existing) => {
                    existing.contact_name = parts.customer.contact_name.clone();
                    existing.address = parts.customer.address.clone();
                    existing.id.clone()
                }
                None => {
                    customers.push(CustomerData {
                        id: fresh_customer_id.clone(),
                        contact_name: parts.customer.contact_name.clone(),
                        email: parts.customer.email.clone(),
                        address: parts.customer.address.clone(),
                        company_name: None,
                        logo_url: None,
                        company_details: None,
                    });
                    fresh_customer_id
                }
            };
            customers.sort_by(|a, b| a.contact_name.cmp(&b.contact_name));
            write(bucket, GUEST_CUSTOMERS_KEY, &customers)?;

            if parts.company != CompanyData::default() {
                write(bucket, GUEST_COMPANY_KEY, &parts.company)?;
            }

            invoice.id = Some(invoice_id.clone());
            invoice.customer_id = Some(customer_id);

            let mut invoices: Vec<InvoiceData> = read(bucket, GUEST_INVOICES_KEY)?;
            match invoices
                .iter_mut()
                .find(|stored| stored.id.as_deref() == Some(invoice_id.as_str()))
            {
                Some(stored) => *stored = invoice.clone(),
                None => invoices.push(invoice.clone()),
            }
            write(bucket, GUEST_INVOICES_KEY, &invoices)?;
            Ok(invoice)
        })
        .await
    }

    pub async fn delete_invoice(&self, session: &str, invoice_id: &str) -> GuestResult<bool> {
        self.with_bucket(session, |bucket| -> serde_json::Result<bool> {
            let mut invoices: Vec<InvoiceData> = read(bucket, GUEST_INVOICES_KEY)?;
            let before = invoices.len();
            invoices.retain(|invoice| invoice.id.as_deref() != Some(invoice_id));
            let removed = invoices.len() != before;
            write(bucket, GUEST_INVOICES_KEY, &invoices)?;
            Ok(removed)
        })
        .await
    }

    pub async fn update_status(
        &self,
        session: &str,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> GuestResult<Option<InvoiceData>> {
        self.with_bucket(session, |bucket| -> serde_json::Result<Option<InvoiceData>> {
            let mut invoices: Vec<InvoiceData> = read(bucket, GUEST_INVOICES_KEY)?;
            let updated = invoices
                .iter_mut()
                .find(|invoice| invoice.id.as_deref() == Some(invoice_id))
                .map(|invoice| {
                    invoice.status = status;
                    invoice.clone()
                });
            if updated.is_some() {
                write(bucket, GUEST_INVOICES_KEY, &invoices)?;
            }
            Ok(updated)
        })
        .await
    }

    pub async fn customers(&self, session: &str) -> GuestResult<Vec<CustomerData>> {
        self.read_bucket(session, GUEST_CUSTOMERS_KEY).await
    }

    pub async fn company(&self, session: &str) -> GuestResult<Option<CompanyData>> {
        self.read_bucket(session, GUEST_COMPANY_KEY).await
    }

    pub async fn set_company(&self, session: &str, company: &CompanyData) -> GuestResult<()> {
        self.with_bucket(session, |bucket| write(bucket, GUEST_COMPANY_KEY, company))
            .await
    }

    /// Drops every key of the session.
    pub async fn clear(&self, session: &str) {
        self.sessions.lock().await.remove(session);
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
