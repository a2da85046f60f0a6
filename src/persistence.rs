//! Routes every data operation either to the guest store or to the record
//! store, based on the caller's [`SessionContext`].
//!
//! Guest operations never touch the record store or object storage. Every
//! failure comes back as an [`AppError`], which the HTTP layer renders as the
//! `{success: false, message}` envelope.

use std::{cmp::Ordering, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, session::generate_guest_session_id, SessionContext},
    error::{AppError, AppResult},
    guest::GuestStore,
    logo,
    mapper::{
        company_view, customer_view, invoice_summary, invoice_view, keys_to_camel, keys_to_snake,
        split_invoice,
    },
    models::{InvoiceRecord, User},
    pricing::{invoice_totals, PricingOptions},
    storage::ObjectStorage,
    store::RecordStore,
    views::{
        CompanyData, CustomerDetail, InvoiceData, InvoiceDetail, InvoiceStatus, InvoiceSummary,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Total,
    Status,
    Number,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Dashboard filters. `status` is a status name or `any`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl ListOptions {
    fn status_filter(&self) -> AppResult<Option<InvoiceStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) if value.eq_ignore_ascii_case("any") => Ok(None),
            Some(value) => value.parse().map(Some).map_err(AppError::bad_request),
        }
    }

    pub fn apply(&self, mut rows: Vec<InvoiceSummary>) -> AppResult<Vec<InvoiceSummary>> {
        let status = self.status_filter()?;
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);

        rows.retain(|row| {
            status.map_or(true, |status| row.status == status)
                && needle
                    .as_deref()
                    .map_or(true, |needle| matches_search(row, needle))
        });
        rows.sort_by(|a, b| {
            let ordering = compare_rows(self.sort, a, b);
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        Ok(rows)
    }
}

fn matches_search(row: &InvoiceSummary, needle: &str) -> bool {
    [&row.invoice_number, &row.customer_name, &row.customer_email]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

fn compare_rows(key: SortKey, a: &InvoiceSummary, b: &InvoiceSummary) -> Ordering {
    match key {
        SortKey::Date => a
            .date
            .cmp(&b.date)
            .then_with(|| a.invoice_number.cmp(&b.invoice_number)),
        SortKey::Total => a.total.cmp(&b.total),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        SortKey::Number => a.invoice_number.cmp(&b.invoice_number),
    }
}

/// Range of a `NUMERIC(p, s)` column: fewer than `p - s` integer digits and
/// at most `s` decimal places.
#[derive(Debug, Clone, Copy)]
struct NumericLimit {
    integer_digits: u32,
    scale: u32,
}

const AMOUNT_LIMIT: NumericLimit = NumericLimit {
    integer_digits: 10,
    scale: 4,
};
const TAX_RATE_LIMIT: NumericLimit = NumericLimit {
    integer_digits: 5,
    scale: 4,
};
const EXCHANGE_RATE_LIMIT: NumericLimit = NumericLimit {
    integer_digits: 8,
    scale: 6,
};

const INVOICE_NUMBER_MAX_CHARS: usize = 100;
const NAME_MAX_CHARS: usize = 255;
const CURRENCY_MAX_CHARS: usize = 16;

impl NumericLimit {
    fn admits(self, value: Decimal) -> bool {
        let bound = Decimal::from(10_i64.pow(self.integer_digits));
        value.normalize().scale() <= self.scale && value.abs() < bound
    }
}

fn too_long(value: &str, max_chars: usize) -> bool {
    value.chars().count() > max_chars
}

/// Returns the message shown to the user when the invoice cannot be saved.
/// Amounts must fit the columns they are stored in, so guests and accounts
/// price the same invoice identically.
pub fn validate_invoice(invoice: &InvoiceData) -> Result<(), &'static str> {
    if invoice.invoice_number.trim().is_empty() {
        return Err("Invoice number is required");
    }
    if invoice.to_name.trim().is_empty() {
        return Err("Customer name is required");
    }
    if invoice.to_email.trim().is_empty() {
        return Err("Customer email is required");
    }
    if too_long(invoice.invoice_number.trim(), INVOICE_NUMBER_MAX_CHARS) {
        return Err("Invoice number must be at most 100 characters");
    }
    let long_name = [
        &invoice.to_name,
        &invoice.to_email,
        &invoice.from_name,
        &invoice.from_email,
        &invoice.company_name,
    ]
    .into_iter()
    .any(|value| too_long(value, NAME_MAX_CHARS));
    if long_name {
        return Err("Names and email addresses must be at most 255 characters");
    }
    let long_currency = invoice
        .currency
        .iter()
        .chain(invoice.items.iter().filter_map(|item| item.currency.as_ref()))
        .any(|currency| too_long(currency, CURRENCY_MAX_CHARS));
    if long_currency {
        return Err("Currency must be at most 16 characters");
    }

    if invoice.items.iter().any(|item| item.quantity < Decimal::ZERO) {
        return Err("Quantity cannot be negative");
    }
    if invoice.tax_rate < Decimal::ZERO {
        return Err("Tax rate cannot be negative");
    }
    let negative_discount = invoice.discount_value < Decimal::ZERO
        || invoice
            .items
            .iter()
            .any(|item| item.discount_value < Decimal::ZERO);
    if negative_discount {
        return Err("Discount cannot be negative");
    }

    if invoice.items.iter().any(|item| !AMOUNT_LIMIT.admits(item.quantity)) {
        return Err("Quantity must be below 10,000,000,000 with at most 4 decimal places");
    }
    if invoice.items.iter().any(|item| !AMOUNT_LIMIT.admits(item.price)) {
        return Err("Price must be below 10,000,000,000 with at most 4 decimal places");
    }
    let discount_out_of_range = !AMOUNT_LIMIT.admits(invoice.discount_value)
        || invoice
            .items
            .iter()
            .any(|item| !AMOUNT_LIMIT.admits(item.discount_value));
    if discount_out_of_range {
        return Err("Discount must be below 10,000,000,000 with at most 4 decimal places");
    }
    if !TAX_RATE_LIMIT.admits(invoice.tax_rate) {
        return Err("Tax rate must be below 100,000 with at most 4 decimal places");
    }
    if invoice
        .items
        .iter()
        .any(|item| !EXCHANGE_RATE_LIMIT.admits(item.exchange_rate))
    {
        return Err("Exchange rate must be below 100,000,000 with at most 6 decimal places");
    }
    Ok(())
}

fn parse_id(raw: &str, entity: &'static str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found(format!("{entity} not found")))
}

fn invoice_not_found() -> AppError {
    AppError::not_found("Invoice not found")
}

fn customer_not_found() -> AppError {
    AppError::not_found("Customer not found")
}

/// Company profile as submitted by the settings screen. Keys may arrive in
/// either camelCase or snake_case.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompanyInput {
    company_name: String,
    company_logo: String,
    company_details: String,
    from_name: String,
    from_email: String,
    from_address: String,
}

fn company_from_payload(payload: Value) -> AppResult<CompanyData> {
    let input: CompanyInput = serde_json::from_value(keys_to_snake(payload))
        .map_err(|_| AppError::bad_request("Invalid company profile"))?;
    let long_name = [&input.company_name, &input.from_name, &input.from_email]
        .into_iter()
        .any(|value| too_long(value, NAME_MAX_CHARS));
    if long_name {
        return Err(AppError::bad_request(
            "Names and email addresses must be at most 255 characters",
        ));
    }
    Ok(CompanyData {
        company_name: input.company_name,
        company_logo: input.company_logo,
        company_details: input.company_details,
        from_name: input.from_name,
        from_email: input.from_email,
        from_address: input.from_address,
    })
}

#[derive(Clone)]
pub struct Persistence {
    records: Arc<dyn RecordStore>,
    guests: Arc<GuestStore>,
    storage: Arc<dyn ObjectStorage>,
    pricing: PricingOptions,
}

impl Persistence {
    pub fn new(
        records: Arc<dyn RecordStore>,
        guests: Arc<GuestStore>,
        storage: Arc<dyn ObjectStorage>,
        pricing: PricingOptions,
    ) -> Self {
        Self {
            records,
            guests,
            storage,
            pricing,
        }
    }

    pub fn guests(&self) -> &GuestStore {
        &self.guests
    }

    fn summaries(&self, records: &[InvoiceRecord]) -> AppResult<Vec<InvoiceSummary>> {
        records
            .iter()
            .map(|record| {
                invoice_summary(&invoice_view(record, None), self.pricing).map_err(AppError::from)
            })
            .collect()
    }

    pub async fn list_invoices(
        &self,
        ctx: &SessionContext,
        options: &ListOptions,
    ) -> AppResult<Vec<InvoiceSummary>> {
        let rows: Vec<InvoiceSummary> = match ctx {
            SessionContext::Guest(session) => self
                .guests
                .invoices(session)
                .await?
                .iter()
                .map(|invoice| invoice_summary(invoice, self.pricing))
                .collect::<Result<_, _>>()?,
            SessionContext::Authenticated(owner) => {
                let records = self.records.list_invoices(*owner).await?;
                self.summaries(&records)?
            }
        };
        debug!(mode = ctx.mode(), count = rows.len(), "listed invoices");
        options.apply(rows)
    }

    async fn load_invoice(&self, ctx: &SessionContext, invoice_id: &str) -> AppResult<InvoiceData> {
        match ctx {
            SessionContext::Guest(session) => self
                .guests
                .invoice(session, invoice_id)
                .await?
                .ok_or_else(invoice_not_found),
            SessionContext::Authenticated(owner) => {
                let id = parse_id(invoice_id, "Invoice")?;
                let record = self
                    .records
                    .get_invoice(*owner, id)
                    .await?
                    .ok_or_else(invoice_not_found)?;
                let company = self.records.get_company(*owner).await?;
                Ok(invoice_view(&record, company.as_ref()))
            }
        }
    }

    pub async fn get_invoice(
        &self,
        ctx: &SessionContext,
        invoice_id: &str,
    ) -> AppResult<InvoiceDetail> {
        let invoice = self.load_invoice(ctx, invoice_id).await?;
        let totals = invoice_totals(&invoice, self.pricing)?;
        Ok(InvoiceDetail { invoice, totals })
    }

    pub async fn save_invoice(
        &self,
        ctx: &SessionContext,
        invoice: InvoiceData,
    ) -> AppResult<InvoiceData> {
        if let Err(reason) = validate_invoice(&invoice) {
            warn!(
                mode = ctx.mode(),
                invoice_number = %invoice.invoice_number,
                reason,
                "rejected invoice"
            );
            return Err(AppError::bad_request(reason));
        }
        if let Err(err) = invoice_totals(&invoice, self.pricing) {
            warn!(
                mode = ctx.mode(),
                invoice_number = %invoice.invoice_number,
                "rejected invoice with amounts out of range"
            );
            return Err(err.into());
        }

        match ctx {
            SessionContext::Guest(session) => {
                let saved = self.guests.save_invoice(session, invoice).await?;
                info!(
                    mode = ctx.mode(),
                    invoice_id = saved.id.as_deref().unwrap_or_default(),
                    "invoice saved"
                );
                Ok(saved)
            }
            SessionContext::Authenticated(owner) => {
                let existing = match invoice.id.as_deref().map(str::trim) {
                    Some(id) if !id.is_empty() => Some(parse_id(id, "Invoice")?),
                    _ => None,
                };
                let parts = split_invoice(&invoice);
                let invoice_id = self.records.save_invoice(*owner, existing, parts).await?;
                info!(
                    mode = ctx.mode(),
                    invoice_id = %invoice_id,
                    created = existing.is_none(),
                    "invoice saved"
                );
                self.load_invoice(ctx, &invoice_id.to_string()).await
            }
        }
    }

    pub async fn delete_invoice(&self, ctx: &SessionContext, invoice_id: &str) -> AppResult<()> {
        let removed = match ctx {
            SessionContext::Guest(session) => {
                self.guests.delete_invoice(session, invoice_id).await?
            }
            SessionContext::Authenticated(owner) => {
                let id = parse_id(invoice_id, "Invoice")?;
                self.records.delete_invoice(*owner, id).await?
            }
        };
        if !removed {
            return Err(invoice_not_found());
        }
        info!(mode = ctx.mode(), invoice_id, "invoice deleted");
        Ok(())
    }

    pub async fn update_invoice_status(
        &self,
        ctx: &SessionContext,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> AppResult<()> {
        let updated = match ctx {
            SessionContext::Guest(session) => self
                .guests
                .update_status(session, invoice_id, status)
                .await?
                .is_some(),
            SessionContext::Authenticated(owner) => {
                let id = parse_id(invoice_id, "Invoice")?;
                self.records.update_invoice_status(*owner, id, status).await?
            }
        };
        if !updated {
            return Err(invoice_not_found());
        }
        info!(mode = ctx.mode(), invoice_id, status = %status, "invoice status updated");
        Ok(())
    }

    /// camelCase customer rows ordered by contact name.
    pub async fn list_customers(&self, ctx: &SessionContext) -> AppResult<Value> {
        match ctx {
            SessionContext::Guest(session) => {
                let customers = self.guests.customers(session).await?;
                Ok(serde_json::to_value(customers)?)
            }
            SessionContext::Authenticated(owner) => {
                let rows = self.records.list_customers(*owner).await?;
                Ok(keys_to_camel(serde_json::to_value(rows)?))
            }
        }
    }

    pub async fn get_customer_with_invoices(
        &self,
        ctx: &SessionContext,
        customer_id: &str,
    ) -> AppResult<CustomerDetail> {
        match ctx {
            SessionContext::Guest(session) => {
                let customer = self
                    .guests
                    .customers(session)
                    .await?
                    .into_iter()
                    .find(|customer| customer.id == customer_id)
                    .ok_or_else(customer_not_found)?;
                let mut invoices: Vec<InvoiceSummary> = self
                    .guests
                    .invoices(session)
                    .await?
                    .iter()
                    .filter(|invoice| invoice.customer_id.as_deref() == Some(customer_id))
                    .map(|invoice| invoice_summary(invoice, self.pricing))
                    .collect::<Result<_, _>>()?;
                invoices.sort_by(|a, b| b.date.cmp(&a.date));
                Ok(CustomerDetail { customer, invoices })
            }
            SessionContext::Authenticated(owner) => {
                let id = parse_id(customer_id, "Customer")?;
                let customer = self
                    .records
                    .get_customer(*owner, id)
                    .await?
                    .ok_or_else(customer_not_found)?;
                let invoices = match self.records.list_customer_invoices(*owner, id).await {
                    Ok(records) => self.summaries(&records)?,
                    Err(err) => {
                        warn!(customer_id = %id, error = %err, "failed to load customer invoices");
                        Vec::new()
                    }
                };
                Ok(CustomerDetail {
                    customer: customer_view(&customer),
                    invoices,
                })
            }
        }
    }

    /// Empty profile when none has been saved yet.
    pub async fn get_company(&self, ctx: &SessionContext) -> AppResult<CompanyData> {
        match ctx {
            SessionContext::Guest(session) => {
                Ok(self.guests.company(session).await?.unwrap_or_default())
            }
            SessionContext::Authenticated(owner) => {
                let profile = self.records.get_company(*owner).await?;
                Ok(company_view(profile.as_ref()))
            }
        }
    }

    pub async fn save_company(&self, ctx: &SessionContext, payload: Value) -> AppResult<CompanyData> {
        let company = company_from_payload(payload)?;
        let saved = match ctx {
            SessionContext::Guest(session) => {
                self.guests.set_company(session, &company).await?;
                company
            }
            SessionContext::Authenticated(owner) => {
                let profile = self.records.upsert_company(*owner, company).await?;
                company_view(Some(&profile))
            }
        };
        info!(mode = ctx.mode(), "company profile saved");
        Ok(saved)
    }

    /// Guests keep the logo inline as the data URL they sent.
    pub async fn upload_logo(
        &self,
        ctx: &SessionContext,
        image: &str,
        file_name: Option<&str>,
    ) -> AppResult<String> {
        let upload = logo::parse_data_url(image)?;
        let owner = match ctx {
            SessionContext::Guest(_) => {
                debug!(mode = ctx.mode(), "logo kept inline");
                return Ok(image.trim().to_string());
            }
            SessionContext::Authenticated(owner) => owner,
        };

        let key = logo::logo_key(file_name, &upload.extension, Utc::now().timestamp_millis());
        let size = upload.bytes.len();
        self.storage
            .put_object(&key, upload.bytes, &upload.content_type)
            .await
            .map_err(|err| {
                error!(user_id = %owner, key = %key, error = %err, "logo upload failed");
                AppError::internal("Failed to upload logo")
            })?;
        info!(mode = ctx.mode(), user_id = %owner, key = %key, size, "logo uploaded");
        Ok(self.storage.public_url(&key))
    }

    pub async fn delete_logo(&self, ctx: &SessionContext, url: &str) -> AppResult<()> {
        if ctx.is_guest() {
            return Ok(());
        }

        let key = logo::key_from_public_url(url, self.storage.bucket())?;
        self.storage.delete_object(&key).await.map_err(|err| {
            error!(key = %key, error = %err, "logo delete failed");
            AppError::internal("Failed to delete logo")
        })?;
        info!(mode = ctx.mode(), key = %key, "logo deleted");
        Ok(())
    }

    /// Verifies credentials. Unknown emails and wrong passwords look the same.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self
            .records
            .find_user_by_email(email)
            .await?
            .ok_or_else(AppError::unauthorized)?;
        let valid = password::verify_password(password, &user.password_hash)
            .map_err(|_| AppError::unauthorized())?;
        if !valid {
            warn!(user_id = %user.id, "rejected login");
            return Err(AppError::unauthorized());
        }
        Ok(user)
    }

    pub async fn account(&self, user_id: Uuid) -> AppResult<User> {
        self.records
            .find_user(user_id)
            .await?
            .ok_or_else(AppError::unauthorized)
    }

    pub async fn update_email(&self, ctx: &SessionContext, email: &str) -> AppResult<()> {
        if !password::is_valid_email(email) {
            return Err(AppError::bad_request("Please enter a valid email address"));
        }
        let SessionContext::Authenticated(owner) = ctx else {
            return Err(AppError::forbidden(
                "You must be logged in to update your email",
            ));
        };
        self.records.update_user_email(*owner, email).await?;
        info!(user_id = %owner, "email updated");
        Ok(())
    }

    pub async fn update_password(
        &self,
        ctx: &SessionContext,
        new_password: &str,
        confirm_password: &str,
    ) -> AppResult<()> {
        password::validate_new_password(new_password, confirm_password)
            .map_err(AppError::bad_request)?;
        let SessionContext::Authenticated(owner) = ctx else {
            return Err(AppError::forbidden(
                "You must be logged in to update your password",
            ));
        };
        let hash = password::hash_password(new_password)?;
        self.records.update_user_password(*owner, &hash).await?;
        info!(user_id = %owner, "password updated");
        Ok(())
    }

    /// Mints and registers a new guest session id.
    pub async fn start_guest_session(&self) -> String {
        let session = generate_guest_session_id();
        self.guests.open_session(&session).await;
        info!(mode = "guest", "guest session started");
        session
    }

    /// Drops all data of a guest session.
    pub async fn end_guest_session(&self, session: &str) {
        self.guests.clear(session).await;
        info!(mode = "guest", "guest session cleared");
    }
}
