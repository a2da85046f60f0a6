use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    pg::PgConnection,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use tracing::debug;
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult};
use crate::{
    config::InvoiceNumberScope,
    db::PgPool,
    mapper::{company_row, InvoiceParts},
    models::{
        CompanyProfile, Customer, Invoice, InvoiceRecord, LineItem, NewCompanyProfile, NewUser,
        User,
    },
    schema::{customers, invoice_line_items, invoices, user_company, users},
    views::{CompanyData, InvoiceStatus},
};

const INVOICE_NUMBER_CONSTRAINT: &str = "invoices_customer_invoice_number_key";
const USER_EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    scope: InvoiceNumberScope,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, scope: InvoiceNumberScope) -> Self {
        Self { pool, scope }
    }

    async fn run<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| StoreError::Pool(err.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

fn is_unique_violation(err: &DieselError, constraint: &str) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some(constraint)
    )
}

fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<(Invoice, Customer)>,
) -> QueryResult<Vec<InvoiceRecord>> {
    let invoices: Vec<Invoice> = rows.iter().map(|(invoice, _)| invoice.clone()).collect();
    let items = LineItem::belonging_to(&invoices)
        .order(invoice_line_items::position.asc())
        .load::<LineItem>(conn)?
        .grouped_by(&invoices);

    Ok(rows
        .into_iter()
        .zip(items)
        .map(|((invoice, customer), items)| InvoiceRecord {
            invoice,
            customer,
            items,
        })
        .collect())
}

fn upsert_company_row(
    conn: &mut PgConnection,
    row: &NewCompanyProfile,
) -> QueryResult<CompanyProfile> {
    let now = Utc::now().naive_utc();
    diesel::insert_into(user_company::table)
        .values(row)
        .on_conflict(user_company::user_id)
        .do_update()
        .set((row, user_company::updated_at.eq(now)))
        .get_result(conn)
}

fn save_invoice_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    invoice_id: Option<Uuid>,
    parts: &InvoiceParts,
    scope: InvoiceNumberScope,
) -> StoreResult<Uuid> {
    let now = Utc::now().naive_utc();
    let number = parts.invoice.invoice_number.clone();
    let duplicate = || StoreError::DuplicateInvoiceNumber {
        number: number.clone(),
        scope,
    };

    let customer = parts.customer_row(owner);
    let customer_id: Uuid = diesel::insert_into(customers::table)
        .values(&customer)
        .on_conflict((customers::user_id, customers::email))
        .do_update()
        .set((
            customers::contact_name.eq(&customer.contact_name),
            customers::address.eq(&customer.address),
            customers::updated_at.eq(now),
        ))
        .returning(customers::id)
        .get_result(conn)?;

    let company = &parts.company;
    let has_company = [
        &company.company_name,
        &company.company_logo,
        &company.company_details,
        &company.from_name,
        &company.from_email,
        &company.from_address,
    ]
    .iter()
    .any(|value| !value.trim().is_empty());
    if has_company {
        upsert_company_row(conn, &parts.company_row(owner))?;
    }

    let target_id = invoice_id.unwrap_or_else(Uuid::new_v4);

    if scope == InvoiceNumberScope::Account {
        let clash = invoices::table
            .filter(invoices::user_id.eq(owner))
            .filter(invoices::invoice_number.eq(&number))
            .filter(invoices::id.ne(target_id))
            .select(invoices::id)
            .first::<Uuid>(conn)
            .optional()?;
        if clash.is_some() {
            return Err(duplicate());
        }
    }

    let row = parts.invoice_row(owner, target_id, customer_id);
    let write = match invoice_id {
        Some(existing) => diesel::update(
            invoices::table
                .filter(invoices::id.eq(existing))
                .filter(invoices::user_id.eq(owner)),
        )
        .set((&row, invoices::updated_at.eq(now)))
        .execute(conn),
        None => diesel::insert_into(invoices::table)
            .values(&row)
            .execute(conn),
    };
    match write {
        Ok(0) => return Err(StoreError::NotFound("Invoice")),
        Ok(_) => {}
        Err(err) if is_unique_violation(&err, INVOICE_NUMBER_CONSTRAINT) => {
            return Err(duplicate())
        }
        Err(err) => return Err(err.into()),
    }

    let removed = diesel::delete(
        invoice_line_items::table.filter(invoice_line_items::invoice_id.eq(target_id)),
    )
    .execute(conn)?;

    let items = parts.line_item_rows(target_id);
    if !items.is_empty() {
        diesel::insert_into(invoice_line_items::table)
            .values(&items)
            .execute(conn)?;
    }

    debug!(
        invoice_id = %target_id,
        customer_id = %customer_id,
        removed_items = removed,
        inserted_items = items.len(),
        "invoice rows written"
    );

    Ok(target_id)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_ascii_lowercase();
        self.run(move |conn| {
            Ok(users::table
                .filter(users::email.eq(&email))
                .first::<User>(conn)
                .optional()?)
        })
        .await
    }

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.run(move |conn| Ok(users::table.find(user_id).first::<User>(conn).optional()?))
            .await
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email: email.trim().to_ascii_lowercase(),
            password_hash: password_hash.to_string(),
        };
        self.run(move |conn| {
            match diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(conn)
            {
                Ok(user) => Ok(user),
                Err(err) if is_unique_violation(&err, USER_EMAIL_CONSTRAINT) => {
                    Err(StoreError::DuplicateEmail(new_user.email))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn update_user_email(&self, user_id: Uuid, email: &str) -> StoreResult<()> {
        let email = email.trim().to_ascii_lowercase();
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            match diesel::update(users::table.find(user_id))
                .set((users::email.eq(&email), users::updated_at.eq(now)))
                .execute(conn)
            {
                Ok(0) => Err(StoreError::NotFound("User")),
                Ok(_) => Ok(()),
                Err(err) if is_unique_violation(&err, USER_EMAIL_CONSTRAINT) => {
                    Err(StoreError::DuplicateEmail(email))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let password_hash = password_hash.to_string();
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            let updated = diesel::update(users::table.find(user_id))
                .set((
                    users::password_hash.eq(&password_hash),
                    users::updated_at.eq(now),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(StoreError::NotFound("User"));
            }
            Ok(())
        })
        .await
    }

    async fn list_invoices(&self, owner: Uuid) -> StoreResult<Vec<InvoiceRecord>> {
        self.run(move |conn| {
            let rows: Vec<(Invoice, Customer)> = invoices::table
                .inner_join(customers::table)
                .filter(invoices::user_id.eq(owner))
                .order((invoices::issue_date.desc(), invoices::created_at.desc()))
                .load(conn)?;
            Ok(attach_items(conn, rows)?)
        })
        .await
    }

    async fn get_invoice(
        &self,
        owner: Uuid,
        invoice_id: Uuid,
    ) -> StoreResult<Option<InvoiceRecord>> {
        self.run(move |conn| {
            let row: Option<(Invoice, Customer)> = invoices::table
                .inner_join(customers::table)
                .filter(invoices::id.eq(invoice_id))
                .filter(invoices::user_id.eq(owner))
                .first(conn)
                .optional()?;
            match row {
                Some(row) => Ok(attach_items(conn, vec![row])?.pop()),
                None => Ok(None),
            }
        })
        .await
    }

    async fn save_invoice(
        &self,
        owner: Uuid,
        invoice_id: Option<Uuid>,
        parts: InvoiceParts,
    ) -> StoreResult<Uuid> {
        let scope = self.scope;
        self.run(move |conn| {
            conn.transaction::<Uuid, StoreError, _>(|conn| {
                save_invoice_tx(conn, owner, invoice_id, &parts, scope)
            })
        })
        .await
    }

    async fn delete_invoice(&self, owner: Uuid, invoice_id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            conn.transaction::<bool, StoreError, _>(|conn| {
                let owned = invoices::table
                    .filter(invoices::id.eq(invoice_id))
                    .filter(invoices::user_id.eq(owner))
                    .select(invoices::id)
                    .first::<Uuid>(conn)
                    .optional()?;
                if owned.is_none() {
                    return Ok(false);
                }

                diesel::delete(
                    invoice_line_items::table
                        .filter(invoice_line_items::invoice_id.eq(invoice_id)),
                )
                .execute(conn)?;
                diesel::delete(invoices::table.find(invoice_id)).execute(conn)?;
                Ok(true)
            })
        })
        .await
    }

    async fn update_invoice_status(
        &self,
        owner: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> StoreResult<bool> {
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            let updated = diesel::update(
                invoices::table
                    .filter(invoices::id.eq(invoice_id))
                    .filter(invoices::user_id.eq(owner)),
            )
            .set((
                invoices::status.eq(status.as_str()),
                invoices::updated_at.eq(now),
            ))
            .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn list_customers(&self, owner: Uuid) -> StoreResult<Vec<Customer>> {
        self.run(move |conn| {
            Ok(customers::table
                .filter(customers::user_id.eq(owner))
                .order(customers::contact_name.asc())
                .load(conn)?)
        })
        .await
    }

    async fn get_customer(&self, owner: Uuid, customer_id: Uuid) -> StoreResult<Option<Customer>> {
        self.run(move |conn| {
            Ok(customers::table
                .filter(customers::id.eq(customer_id))
                .filter(customers::user_id.eq(owner))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_customer_invoices(
        &self,
        owner: Uuid,
        customer_id: Uuid,
    ) -> StoreResult<Vec<InvoiceRecord>> {
        self.run(move |conn| {
            let rows: Vec<(Invoice, Customer)> = invoices::table
                .inner_join(customers::table)
                .filter(invoices::user_id.eq(owner))
                .filter(invoices::customer_id.eq(customer_id))
                .order((invoices::issue_date.desc(), invoices::created_at.desc()))
                .load(conn)?;
            Ok(attach_items(conn, rows)?)
        })
        .await
    }

    async fn get_company(&self, owner: Uuid) -> StoreResult<Option<CompanyProfile>> {
        self.run(move |conn| {
            Ok(user_company::table
                .filter(user_company::user_id.eq(owner))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn upsert_company(
        &self,
        owner: Uuid,
        company: CompanyData,
    ) -> StoreResult<CompanyProfile> {
        self.run(move |conn| Ok(upsert_company_row(conn, &company_row(owner, &company))?))
            .await
    }
}
