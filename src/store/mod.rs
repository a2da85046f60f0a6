//! The relational record store behind authenticated sessions.
//!
//! Handlers never talk to diesel directly; they go through [`RecordStore`]
//! so the persistence router can be exercised against a test double.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::InvoiceNumberScope,
    mapper::InvoiceParts,
    models::{CompanyProfile, Customer, InvoiceRecord, User},
    views::{CompanyData, InvoiceStatus},
};

pub mod pg;

pub use pg::PgRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("An invoice with number {number} already exists {}", scope_phrase(.scope))]
    DuplicateInvoiceNumber {
        number: String,
        scope: InvoiceNumberScope,
    },
    #[error("An account with email {0} already exists")]
    DuplicateEmail(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("store task failed: {0}")]
    Task(String),
}

fn scope_phrase(scope: &InvoiceNumberScope) -> &'static str {
    match scope {
        InvoiceNumberScope::Customer => "for this customer",
        InvoiceNumberScope::Account => "in this account",
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Every read and write is scoped to the owning account.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User>;

    async fn update_user_email(&self, user_id: Uuid, email: &str) -> StoreResult<()>;

    async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()>;

    /// Invoices with customer and line items, newest issue date first.
    async fn list_invoices(&self, owner: Uuid) -> StoreResult<Vec<InvoiceRecord>>;

    async fn get_invoice(&self, owner: Uuid, invoice_id: Uuid)
        -> StoreResult<Option<InvoiceRecord>>;

    /// Customer upsert, company upsert, invoice insert-or-update and line
    /// item replacement as one unit. Returns the invoice id.
    async fn save_invoice(
        &self,
        owner: Uuid,
        invoice_id: Option<Uuid>,
        parts: InvoiceParts,
    ) -> StoreResult<Uuid>;

    /// Returns false when the invoice does not exist for this owner.
    async fn delete_invoice(&self, owner: Uuid, invoice_id: Uuid) -> StoreResult<bool>;

    async fn update_invoice_status(
        &self,
        owner: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> StoreResult<bool>;

    /// Ordered by contact name.
    async fn list_customers(&self, owner: Uuid) -> StoreResult<Vec<Customer>>;

    async fn get_customer(&self, owner: Uuid, customer_id: Uuid) -> StoreResult<Option<Customer>>;

    async fn list_customer_invoices(
        &self,
        owner: Uuid,
        customer_id: Uuid,
    ) -> StoreResult<Vec<InvoiceRecord>>;

    async fn get_company(&self, owner: Uuid) -> StoreResult<Option<CompanyProfile>>;

    async fn upsert_company(&self, owner: Uuid, company: CompanyData)
        -> StoreResult<CompanyProfile>;
}
