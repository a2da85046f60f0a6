use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = customers)]
pub struct Customer {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub contact_name: String,
    pub email: String,
    pub address: String,
    pub company_name: Option<String>,
    pub logo_url: Option<String>,
    pub company_details: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = customers)]
pub struct NewCustomer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contact_name: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = invoices)]
#[diesel(belongs_to(Customer))]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub from_name: String,
    pub from_email: String,
    pub from_address: String,
    pub notes: String,
    pub footer: String,
    pub currency: Option<String>,
    pub tax_rate: Decimal,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub apply_invoice_discount_to_discounted_items: bool,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Invoice columns written on save. The primary key is excluded from the
/// changeset, so the same value serves inserts and updates.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = invoices)]
#[diesel(treat_none_as_null = true)]
pub struct NewInvoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub from_name: String,
    pub from_email: String,
    pub from_address: String,
    pub notes: String,
    pub footer: String,
    pub currency: Option<String>,
    pub tax_rate: Decimal,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub apply_invoice_discount_to_discounted_items: bool,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = invoice_line_items)]
#[diesel(belongs_to(Invoice))]
pub struct LineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub currency: Option<String>,
    pub exchange_rate: Decimal,
    pub discount_type: String,
    pub discount_value: Decimal,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = invoice_line_items)]
pub struct NewLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub currency: Option<String>,
    pub exchange_rate: Decimal,
    pub discount_type: String,
    pub discount_value: Decimal,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = user_company)]
pub struct CompanyProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub company_logo: String,
    pub company_details: String,
    pub from_name: String,
    pub from_email: String,
    pub from_address: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = user_company)]
pub struct NewCompanyProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub company_logo: String,
    pub company_details: String,
    pub from_name: String,
    pub from_email: String,
    pub from_address: String,
}

/// An invoice joined with its customer and ordered line items.
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub invoice: Invoice,
    pub customer: Customer,
    pub items: Vec<LineItem>,
}
