//! Conversion between stored rows (snake_case, relational) and the nested
//! camelCase view-models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    models::{
        CompanyProfile, Customer, InvoiceRecord, LineItem, NewCompanyProfile, NewCustomer,
        NewInvoice, NewLineItem,
    },
    pricing::{currency_symbol, invoice_totals, DiscountType, PricingOptions, PricingResult},
    views::{
        CompanyData, CustomerData, InvoiceData, InvoiceStatus, InvoiceSummary, LineItemData,
    },
};

/// `invoice_line_items` -> `invoiceLineItems`. Only an underscore followed by a
/// lowercase ASCII letter is folded.
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// `invoiceLineItems` -> `invoice_line_items`.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Array(values) => Value::Array(
            values
                .into_iter()
                .map(|value| rename_keys(value, rename))
                .collect(),
        ),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (rename(&key), rename_keys(value, rename)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

pub fn keys_to_camel(value: Value) -> Value {
    rename_keys(value, &to_camel_case)
}

pub fn keys_to_snake(value: Value) -> Value {
    rename_keys(value, &to_snake_case)
}

pub fn customer_view(customer: &Customer) -> CustomerData {
    CustomerData {
        id: customer.id.to_string(),
        contact_name: customer.contact_name.clone(),
        email: customer.email.clone(),
        address: customer.address.clone(),
        company_name: customer.company_name.clone(),
        logo_url: customer.logo_url.clone(),
        company_details: customer.company_details.clone(),
    }
}

pub fn company_view(profile: Option<&CompanyProfile>) -> CompanyData {
    match profile {
        Some(profile) => CompanyData {
            company_name: profile.company_name.clone(),
            company_logo: profile.company_logo.clone(),
            company_details: profile.company_details.clone(),
            from_name: profile.from_name.clone(),
            from_email: profile.from_email.clone(),
            from_address: profile.from_address.clone(),
        },
        None => CompanyData::default(),
    }
}

/// A stored discount whose type is not recognised takes nothing off.
fn stored_discount(kind: &str, value: Decimal) -> (DiscountType, Decimal) {
    match DiscountType::from_db(kind) {
        Some(kind) => (kind, value),
        None => (DiscountType::default(), Decimal::ZERO),
    }
}

fn line_item_view(item: &LineItem) -> LineItemData {
    let (discount_type, discount_value) = stored_discount(&item.discount_type, item.discount_value);
    LineItemData {
        id: Some(item.id.to_string()),
        description: item.description.clone(),
        quantity: item.quantity,
        price: item.price,
        currency: item.currency.clone(),
        exchange_rate: item.exchange_rate,
        discount_type,
        discount_value,
    }
}

/// Flattens a joined invoice row into the generator view-model. Company
/// name, logo and details come from the account's profile; the sender
/// contact fields are the ones captured on the invoice itself.
pub fn invoice_view(record: &InvoiceRecord, company: Option<&CompanyProfile>) -> InvoiceData {
    let invoice = &record.invoice;
    let customer = &record.customer;
    let company = company_view(company);

    let (discount_type, discount_value) =
        stored_discount(&invoice.discount_type, invoice.discount_value);

    let mut items: Vec<&LineItem> = record.items.iter().collect();
    items.sort_by_key(|item| item.position);

    InvoiceData {
        id: Some(invoice.id.to_string()),
        invoice_number: invoice.invoice_number.clone(),
        date: invoice.issue_date,
        due_date: invoice.due_date,
        company_name: company.company_name,
        company_logo: company.company_logo,
        company_details: company.company_details,
        from_name: invoice.from_name.clone(),
        from_email: invoice.from_email.clone(),
        from_address: invoice.from_address.clone(),
        to_name: customer.contact_name.clone(),
        to_email: customer.email.clone(),
        to_address: customer.address.clone(),
        items: items.into_iter().map(line_item_view).collect(),
        notes: invoice.notes.clone(),
        tax_rate: invoice.tax_rate,
        currency: invoice.currency.clone(),
        footer: invoice.footer.clone(),
        discount_type,
        discount_value,
        apply_invoice_discount_to_discounted_items: invoice
            .apply_invoice_discount_to_discounted_items,
        status: invoice.status.parse().unwrap_or_default(),
        customer_id: Some(invoice.customer_id.to_string()),
    }
}

pub fn invoice_summary(
    invoice: &InvoiceData,
    options: PricingOptions,
) -> PricingResult<InvoiceSummary> {
    let totals = invoice_totals(invoice, options)?;
    Ok(InvoiceSummary {
        id: invoice.id.clone().unwrap_or_default(),
        invoice_number: invoice.invoice_number.clone(),
        customer_id: invoice.customer_id.clone(),
        customer_name: invoice.to_name.clone(),
        customer_email: invoice.to_email.clone(),
        date: invoice.date,
        due_date: invoice.due_date,
        status: invoice.status,
        currency: currency_symbol(invoice.currency.as_deref()).to_string(),
        total: totals.total,
        formatted_total: totals.formatted_total,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerFields {
    pub contact_name: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceFields {
    pub id: Option<String>,
    pub invoice_number: String,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub from_name: String,
    pub from_email: String,
    pub from_address: String,
    pub notes: String,
    pub footer: String,
    pub currency: Option<String>,
    pub tax_rate: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub apply_invoice_discount_to_discounted_items: bool,
    pub status: InvoiceStatus,
}

/// One generator submission split into its four write targets.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceParts {
    pub customer: CustomerFields,
    pub company: CompanyData,
    pub invoice: InvoiceFields,
    pub items: Vec<LineItemData>,
}

pub fn split_invoice(data: &InvoiceData) -> InvoiceParts {
    InvoiceParts {
        customer: CustomerFields {
            contact_name: data.to_name.trim().to_string(),
            email: data.to_email.trim().to_ascii_lowercase(),
            address: data.to_address.clone(),
        },
        company: CompanyData {
            company_name: data.company_name.clone(),
            company_logo: data.company_logo.clone(),
            company_details: data.company_details.clone(),
            from_name: data.from_name.clone(),
            from_email: data.from_email.clone(),
            from_address: data.from_address.clone(),
        },
        invoice: InvoiceFields {
            id: data.id.clone(),
            invoice_number: data.invoice_number.trim().to_string(),
            date: data.date,
            due_date: data.due_date,
            from_name: data.from_name.clone(),
            from_email: data.from_email.clone(),
            from_address: data.from_address.clone(),
            notes: data.notes.clone(),
            footer: data.footer.clone(),
            currency: data.currency.clone(),
            tax_rate: data.tax_rate,
            discount_type: data.discount_type,
            discount_value: data.discount_value,
            apply_invoice_discount_to_discounted_items: data
                .apply_invoice_discount_to_discounted_items,
            status: data.status,
        },
        items: data.items.clone(),
    }
}

impl InvoiceParts {
    pub fn customer_row(&self, owner: Uuid) -> NewCustomer {
        NewCustomer {
            id: Uuid::new_v4(),
            user_id: owner,
            contact_name: self.customer.contact_name.clone(),
            email: self.customer.email.clone(),
            address: self.customer.address.clone(),
        }
    }

    pub fn company_row(&self, owner: Uuid) -> NewCompanyProfile {
        company_row(owner, &self.company)
    }

    pub fn invoice_row(&self, owner: Uuid, invoice_id: Uuid, customer_id: Uuid) -> NewInvoice {
        let fields = &self.invoice;
        NewInvoice {
            id: invoice_id,
            user_id: owner,
            customer_id,
            invoice_number: fields.invoice_number.clone(),
            issue_date: fields.date,
            due_date: fields.due_date,
            from_name: fields.from_name.clone(),
            from_email: fields.from_email.clone(),
            from_address: fields.from_address.clone(),
            notes: fields.notes.clone(),
            footer: fields.footer.clone(),
            currency: fields.currency.clone(),
            tax_rate: fields.tax_rate,
            discount_type: fields.discount_type.as_str().to_string(),
            discount_value: fields.discount_value,
            apply_invoice_discount_to_discounted_items: fields
                .apply_invoice_discount_to_discounted_items,
            status: fields.status.as_str().to_string(),
        }
    }

    /// Fresh rows for every item; ids are regenerated on each save.
    pub fn line_item_rows(&self, invoice_id: Uuid) -> Vec<NewLineItem> {
        self.items
            .iter()
            .enumerate()
            .map(|(position, item)| NewLineItem {
                id: Uuid::new_v4(),
                invoice_id,
                position: position as i32,
                description: item.description.clone(),
                quantity: item.quantity,
                price: item.price,
                currency: item.currency.clone(),
                exchange_rate: item.exchange_rate,
                discount_type: item.discount_type.as_str().to_string(),
                discount_value: item.discount_value,
            })
            .collect()
    }
}

pub fn company_row(owner: Uuid, company: &CompanyData) -> NewCompanyProfile {
    NewCompanyProfile {
        id: Uuid::new_v4(),
        user_id: owner,
        company_name: company.company_name.clone(),
        company_logo: company.company_logo.clone(),
        company_details: company.company_details.clone(),
        from_name: company.from_name.clone(),
        from_email: company.from_email.clone(),
        from_address: company.from_address.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use serde_json::json;

    use super::*;
    use crate::models::Invoice;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn record() -> InvoiceRecord {
        let owner = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();
        let item = |position: i32, description: &str| LineItem {
            id: Uuid::new_v4(),
            invoice_id,
            position,
            description: description.to_string(),
            quantity: Decimal::new(2, 0),
            price: Decimal::new(5000, 2),
            currency: None,
            exchange_rate: Decimal::ONE,
            discount_type: "fixed".to_string(),
            discount_value: Decimal::new(5, 0),
        };
        InvoiceRecord {
            invoice: Invoice {
                id: invoice_id,
                user_id: owner,
                customer_id,
                invoice_number: "INV-001".to_string(),
                issue_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                due_date: None,
                from_name: "Ada".to_string(),
                from_email: "ada@example.com".to_string(),
                from_address: "1 Loop Rd".to_string(),
                notes: String::new(),
                footer: "Thanks".to_string(),
                currency: Some("€".to_string()),
                tax_rate: Decimal::new(8, 0),
                discount_type: "percentage".to_string(),
                discount_value: Decimal::ZERO,
                apply_invoice_discount_to_discounted_items: false,
                status: "Paid".to_string(),
                created_at: timestamp(),
                updated_at: timestamp(),
            },
            customer: Customer {
                id: customer_id,
                user_id: owner,
                contact_name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                address: "2 Stack St".to_string(),
                company_name: None,
                logo_url: None,
                company_details: None,
                created_at: timestamp(),
                updated_at: timestamp(),
            },
            items: vec![item(1, "second"), item(0, "first")],
        }
    }

    #[test]
    fn camel_case_only_folds_lowercase_after_underscore() {
        assert_eq!(to_camel_case("invoice_line_items"), "invoiceLineItems");
        assert_eq!(to_camel_case("tax_rate_2"), "taxRate_2");
        assert_eq!(to_camel_case("_private"), "Private");
        assert_eq!(to_camel_case("already"), "already");
    }

    #[test]
    fn snake_case_splits_uppercase() {
        assert_eq!(
            to_snake_case("applyInvoiceDiscountToDiscountedItems"),
            "apply_invoice_discount_to_discounted_items"
        );
        assert_eq!(to_snake_case("id"), "id");
    }

    #[test]
    fn key_conversion_recurses_into_nested_values() {
        let rows = json!([{
            "invoice_number": "A-1",
            "customers": { "contact_name": "Grace", "logo_url": null },
            "invoice_line_items": [{ "exchange_rate": 1, "discount_value": "2.5" }]
        }]);
        let camel = keys_to_camel(rows.clone());
        assert_eq!(
            camel,
            json!([{
                "invoiceNumber": "A-1",
                "customers": { "contactName": "Grace", "logoUrl": null },
                "invoiceLineItems": [{ "exchangeRate": 1, "discountValue": "2.5" }]
            }])
        );
        assert_eq!(keys_to_snake(camel), rows);
    }

    #[test]
    fn invoice_view_flattens_join() {
        let record = record();
        let profile = CompanyProfile {
            id: Uuid::new_v4(),
            user_id: record.invoice.user_id,
            company_name: "Analytical Engines".to_string(),
            company_logo: "https://cdn/logo.png".to_string(),
            company_details: "VAT 1".to_string(),
            from_name: "ignored".to_string(),
            from_email: "ignored".to_string(),
            from_address: "ignored".to_string(),
            updated_at: timestamp(),
        };

        let view = invoice_view(&record, Some(&profile));
        assert_eq!(view.id, Some(record.invoice.id.to_string()));
        assert_eq!(view.company_name, "Analytical Engines");
        assert_eq!(view.from_name, "Ada");
        assert_eq!(view.to_email, "grace@example.com");
        assert_eq!(view.status, InvoiceStatus::Paid);
        assert!(!view.apply_invoice_discount_to_discounted_items);
        assert_eq!(view.items[0].description, "first");
        assert_eq!(view.items[1].description, "second");
        assert_eq!(view.items[0].discount_type, DiscountType::Amount);
        assert_eq!(view.customer_id, Some(record.customer.id.to_string()));
    }

    #[test]
    fn split_then_rows_keep_item_order_and_fields() {
        let view = invoice_view(&record(), None);
        let parts = split_invoice(&view);
        let owner = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();

        assert_eq!(parts.customer.email, "grace@example.com");
        assert_eq!(parts.company.from_address, "1 Loop Rd");

        let row = parts.invoice_row(owner, invoice_id, customer_id);
        assert_eq!(row.user_id, owner);
        assert_eq!(row.discount_type, "percentage");
        assert_eq!(row.status, "Paid");

        let items = parts.line_item_rows(invoice_id);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "first");
        assert_eq!(items[0].position, 0);
        assert_eq!(items[1].position, 1);
        assert_eq!(items[1].discount_type, "amount");
        assert!(items.iter().all(|item| item.invoice_id == invoice_id));
    }

    #[test]
    fn unknown_stored_discount_type_takes_nothing_off() {
        let mut record = record();
        record.invoice.discount_type = String::new();
        record.invoice.discount_value = Decimal::new(50, 0);
        record.items[0].discount_type = "voucher".to_string();

        let view = invoice_view(&record, None);
        assert_eq!(view.discount_value, Decimal::ZERO);
        let second = &view.items[1];
        assert_eq!(second.description, "second");
        assert_eq!(second.discount_type, DiscountType::Percentage);
        assert_eq!(second.discount_value, Decimal::ZERO);

        let summary = invoice_summary(&view, PricingOptions::default()).unwrap();
        // 100 + 95, plus 8% tax
        assert_eq!(summary.total, Decimal::new(21060, 2));
    }

    #[test]
    fn summary_carries_computed_total() {
        let view = invoice_view(&record(), None);
        let summary = invoice_summary(&view, PricingOptions::default()).unwrap();
        // two lines of 2 x 50 - 5, plus 8% tax
        assert_eq!(summary.total, Decimal::new(20520, 2));
        assert_eq!(summary.formatted_total, "€205.20");
        assert_eq!(summary.customer_name, "Grace");
    }
}
