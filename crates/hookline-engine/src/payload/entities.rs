//! Typed CRM entities and their published field maps.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{EntityRecord, EventSchema};

/// Every schema in the catalog, for callers that only know the table name.
pub const SCHEMAS: &[EventSchema] = &[
    Lead::SCHEMA,
    Appointment::SCHEMA,
    Expense::SCHEMA,
    Product::SCHEMA,
    Estimate::SCHEMA,
    Invoice::SCHEMA,
    BillingSubscription::SCHEMA,
    Receipt::SCHEMA,
    LeaveRequest::SCHEMA,
];

/// Look up the schema published for `table`.
pub fn schema_for_table(table: &str) -> Option<&'static EventSchema> {
    SCHEMAS.iter().find(|s| s.entity_table == table)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: String,
    pub assigned_to: Option<String>,
    pub value: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EntityRecord for Lead {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "leads",
        event_prefix: "LEAD",
        id_field: "id",
        previous_fields: &["name", "email", "status", "assigned_to", "value"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "phone": self.phone,
            "company": self.company,
            "source": self.source,
            "status": self.status,
            "assigned_to": self.assigned_to,
            "value": self.value,
            "notes": self.notes,
            "created_at": self.created_at,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub title: String,
    pub lead_id: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location: Option<String>,
    pub status: String,
    pub assigned_to: Option<String>,
}

impl EntityRecord for Appointment {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "appointments",
        event_prefix: "APPOINTMENT",
        id_field: "id",
        previous_fields: &["scheduled_at", "status", "location", "assigned_to"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "title": self.title,
            "lead_id": self.lead_id,
            "scheduled_at": self.scheduled_at,
            "duration_minutes": self.duration_minutes,
            "location": self.location,
            "status": self.status,
            "assigned_to": self.assigned_to,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub id: String,
    pub estimate_number: String,
    pub lead_id: Option<String>,
    pub total: f64,
    pub currency: String,
    pub status: String,
    pub valid_until: Option<NaiveDate>,
}

impl EntityRecord for Estimate {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "estimates",
        event_prefix: "ESTIMATE",
        id_field: "id",
        previous_fields: &["total", "status", "valid_until"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "estimate_number": self.estimate_number,
            "lead_id": self.lead_id,
            "total": self.total,
            "currency": self.currency,
            "status": self.status,
            "valid_until": self.valid_until,
        }))
    }
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub total: f64,
    pub amount_paid: f64,
    pub currency: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
}

impl EntityRecord for Invoice {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "invoices",
        event_prefix: "INVOICE",
        id_field: "id",
        previous_fields: &["status", "total", "amount_paid", "due_date"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "invoice_number": self.invoice_number,
            "customer_id": self.customer_id,
            "total": self.total,
            "amount_paid": self.amount_paid,
            "currency": self.currency,
            "status": self.status,
            "due_date": self.due_date,
        }))
    }
}

/// A customer's recurring billing plan (not a webhook subscription).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSubscription {
    pub id: String,
    pub customer_id: String,
    pub plan_name: String,
    pub amount: f64,
    pub currency: String,
    pub billing_interval: String,
    pub status: String,
    pub next_billing_date: Option<NaiveDate>,
}

impl EntityRecord for BillingSubscription {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "customer_subscriptions",
        event_prefix: "SUBSCRIPTION",
        id_field: "id",
        previous_fields: &["plan_name", "amount", "status", "next_billing_date"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "customer_id": self.customer_id,
            "plan_name": self.plan_name,
            "amount": self.amount,
            "currency": self.currency,
            "billing_interval": self.billing_interval,
            "status": self.status,
            "next_billing_date": self.next_billing_date,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub receipt_number: String,
    pub invoice_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub received_at: DateTime<Utc>,
}

impl EntityRecord for Receipt {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "receipts",
        event_prefix: "RECEIPT",
        id_field: "id",
        previous_fields: &["amount", "payment_method"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "receipt_number": self.receipt_number,
            "invoice_id": self.invoice_id,
            "amount": self.amount,
            "currency": self.currency,
            "payment_method": self.payment_method,
            "received_at": self.received_at,
        }))
    }
}

// ---------------------------------------------------------------------------
// Back office
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub category: Option<String>,
    pub expense_date: NaiveDate,
    pub status: String,
    pub submitted_by: Option<String>,
}

impl EntityRecord for Expense {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "expenses",
        event_prefix: "EXPENSE",
        id_field: "id",
        previous_fields: &["amount", "category", "status"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "description": self.description,
            "amount": self.amount,
            "currency": self.currency,
            "category": self.category,
            "expense_date": self.expense_date,
            "status": self.status,
            "submitted_by": self.submitted_by,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    pub currency: String,
    pub is_active: bool,
    pub stock_quantity: Option<i64>,
}

impl EntityRecord for Product {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "products",
        event_prefix: "PRODUCT",
        id_field: "id",
        previous_fields: &["name", "price", "is_active", "stock_quantity"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "name": self.name,
            "sku": self.sku,
            "price": self.price,
            "currency": self.currency,
            "is_active": self.is_active,
            "stock_quantity": self.stock_quantity,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: String,
    pub employee_id: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub reason: Option<String>,
    pub approved_by: Option<String>,
}

impl EntityRecord for LeaveRequest {
    const SCHEMA: EventSchema = EventSchema {
        entity_table: "leave_requests",
        event_prefix: "LEAVE_REQUEST",
        id_field: "id",
        previous_fields: &["start_date", "end_date", "status", "approved_by"],
    };

    fn to_fields(&self) -> Map<String, Value> {
        object(json!({
            "id": self.id,
            "employee_id": self.employee_id,
            "leave_type": self.leave_type,
            "start_date": self.start_date,
            "end_date": self.end_date,
            "status": self.status,
            "reason": self.reason,
            "approved_by": self.approved_by,
        }))
    }
}
