//! Boundary JSON shapes
//!
//! The engine stores one canonical field per value; this module maps
//! documents to the JSON shape consumers expect, emitting the legacy
//! compatibility aliases (`cgst`/`cgstAmount`, `amount`/`itemAmount`,
//! `finalTotal`/`grandTotal`, order-style `gstMode` next to invoice-style
//! `taxMode`) side by side so they can never diverge. On the way in,
//! requests are accepted with either spelling.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::*;

fn tax_mode_label(mode: TaxMode) -> &'static str {
    match mode {
        TaxMode::Inclusive => "with-tax",
        TaxMode::Exclusive => "without-tax",
    }
}

fn gst_mode_label(mode: TaxMode) -> &'static str {
    match mode {
        TaxMode::Inclusive => "include",
        TaxMode::Exclusive => "exclude",
    }
}

fn deserialize_tax_mode<'de, D>(deserializer: D) -> Result<TaxMode, D::Error>
where
    D: Deserializer<'de>,
{
    let label = String::deserialize(deserializer)?;
    TaxMode::parse_label(&label)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown tax mode '{label}'")))
}

fn default_tax_mode() -> TaxMode {
    TaxMode::Exclusive
}

fn default_unit() -> String {
    "pcs".to_string()
}

/// Line item as emitted to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Uuid>,
    pub name: String,
    pub quantity: BigDecimal,
    pub unit: String,
    pub price_per_unit: BigDecimal,
    pub tax_rate: BigDecimal,
    /// Invoice-style label: `with-tax` / `without-tax`
    pub tax_mode: &'static str,
    /// Order-style label: `include` / `exclude`
    pub gst_mode: &'static str,
    pub discount_percent: BigDecimal,
    pub discount: BigDecimal,
    pub taxable_amount: BigDecimal,
    pub cgst: BigDecimal,
    pub cgst_amount: BigDecimal,
    pub sgst: BigDecimal,
    pub sgst_amount: BigDecimal,
    pub igst: BigDecimal,
    pub igst_amount: BigDecimal,
    pub amount: BigDecimal,
    pub item_amount: BigDecimal,
}

impl From<&LineItem> for LineItemWire {
    fn from(item: &LineItem) -> Self {
        Self {
            item_id: item.item_id,
            name: item.name.clone(),
            quantity: item.quantity.clone(),
            unit: item.unit.clone(),
            price_per_unit: item.price_per_unit.clone(),
            tax_rate: item.tax_rate.clone(),
            tax_mode: tax_mode_label(item.tax_mode),
            gst_mode: gst_mode_label(item.tax_mode),
            discount_percent: item.discount_percent.clone(),
            discount: item.discount.clone(),
            taxable_amount: item.taxable_amount.clone(),
            cgst: item.cgst_amount.clone(),
            cgst_amount: item.cgst_amount.clone(),
            sgst: item.sgst_amount.clone(),
            sgst_amount: item.sgst_amount.clone(),
            igst: item.igst_amount.clone(),
            igst_amount: item.igst_amount.clone(),
            amount: item.line_total.clone(),
            item_amount: item.line_total.clone(),
        }
    }
}

/// Totals as emitted to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsWire {
    pub subtotal: BigDecimal,
    pub total_discount: BigDecimal,
    pub total_taxable_amount: BigDecimal,
    pub total_tax: BigDecimal,
    pub round_off: BigDecimal,
    pub final_total: BigDecimal,
    pub grand_total: BigDecimal,
}

impl From<&Totals> for TotalsWire {
    fn from(totals: &Totals) -> Self {
        Self {
            subtotal: totals.subtotal.clone(),
            total_discount: totals.total_discount.clone(),
            total_taxable_amount: totals.total_taxable.clone(),
            total_tax: totals.total_tax.clone(),
            round_off: totals.round_off.clone(),
            final_total: totals.final_total.clone(),
            grand_total: totals.final_total.clone(),
        }
    }
}

/// Payment block as emitted to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWire {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub paid_amount: BigDecimal,
    pub pending_amount: BigDecimal,
    pub balance_amount: BigDecimal,
    pub payment_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub credit_days: u32,
}

impl From<&PaymentInfo> for PaymentWire {
    fn from(payment: &PaymentInfo) -> Self {
        Self {
            method: payment.method,
            status: payment.status,
            paid_amount: payment.paid_amount.clone(),
            pending_amount: payment.pending_amount.clone(),
            balance_amount: payment.pending_amount.clone(),
            payment_date: payment.payment_date,
            due_date: payment.due_date,
            credit_days: payment.credit_days,
        }
    }
}

/// Payment history entry as emitted to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryWire {
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl From<&PaymentHistoryEntry> for PaymentHistoryWire {
    fn from(entry: &PaymentHistoryEntry) -> Self {
        Self {
            amount: entry.amount.clone(),
            method: entry.method,
            reference: entry.reference.clone(),
            payment_date: entry.payment_date,
            due_date: entry.due_date,
            created_at: entry.created_at,
            created_by: entry.created_by.clone(),
        }
    }
}

/// Conversion back-link as emitted to consumers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRefWire {
    pub id: Uuid,
    pub document_type: DocumentType,
}

/// Conversion link as emitted to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionLinkWire {
    pub target_id: Uuid,
    pub target_type: DocumentType,
    pub converted_at: NaiveDateTime,
    pub converted_by: String,
}

/// Full document as emitted to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWire {
    pub id: Uuid,
    pub number: String,
    pub number_fallback: bool,
    pub document_type: DocumentType,
    pub date: NaiveDate,
    pub company_id: Uuid,
    pub party_id: Uuid,
    pub items: Vec<LineItemWire>,
    pub totals: TotalsWire,
    pub payment: PaymentWire,
    pub payment_history: Vec<PaymentHistoryWire>,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DocumentRefWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted: Option<ConversionLinkWire>,
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl From<&Document> for DocumentWire {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            number: document.number.clone(),
            number_fallback: document.number_fallback,
            document_type: document.document_type,
            date: document.date,
            company_id: document.company_id,
            party_id: document.party_id,
            items: document.items.iter().map(LineItemWire::from).collect(),
            totals: TotalsWire::from(&document.totals),
            payment: PaymentWire::from(&document.payment),
            payment_history: document
                .payment_history
                .iter()
                .map(PaymentHistoryWire::from)
                .collect(),
            status: document.status,
            source: document.source.map(|s| DocumentRefWire {
                id: s.id,
                document_type: s.document_type,
            }),
            converted: document.converted.as_ref().map(|link| ConversionLinkWire {
                target_id: link.target_id,
                target_type: link.target_type,
                converted_at: link.converted_at,
                converted_by: link.converted_by.clone(),
            }),
            created_at: document.created_at,
            created_by: document.created_by.clone(),
        }
    }
}

/// Line item as accepted from clients
///
/// Tolerates the legacy spellings: `qty`, `price`/`rate`, `gstRate`,
/// `gstMode` with order-style labels, and `discount` for the absolute
/// discount amount.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    #[serde(default)]
    pub item_id: Option<Uuid>,
    pub name: String,
    #[serde(alias = "qty")]
    pub quantity: BigDecimal,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(alias = "price", alias = "rate")]
    pub price_per_unit: BigDecimal,
    #[serde(default, alias = "gstRate")]
    pub tax_rate: BigDecimal,
    #[serde(
        default = "default_tax_mode",
        alias = "gstMode",
        deserialize_with = "deserialize_tax_mode"
    )]
    pub tax_mode: TaxMode,
    #[serde(default)]
    pub discount_percent: BigDecimal,
    #[serde(default, alias = "discount")]
    pub discount_amount: BigDecimal,
}

impl From<LineItemRequest> for LineItemInput {
    fn from(request: LineItemRequest) -> Self {
        Self {
            item_id: request.item_id,
            name: request.name,
            quantity: request.quantity,
            unit: request.unit,
            price_per_unit: request.price_per_unit,
            tax_rate: request.tax_rate,
            tax_mode: request.tax_mode,
            discount_percent: request.discount_percent,
            discount_amount: request.discount_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line_item() -> LineItem {
        let zero = BigDecimal::from(0);
        LineItem {
            item_id: None,
            name: "Widget".to_string(),
            quantity: BigDecimal::from(10),
            unit: "pcs".to_string(),
            price_per_unit: BigDecimal::from(100),
            tax_rate: BigDecimal::from(18),
            tax_mode: TaxMode::Exclusive,
            discount_percent: zero.clone(),
            discount_amount: zero.clone(),
            discount: zero.clone(),
            taxable_amount: BigDecimal::from(1000),
            cgst_amount: BigDecimal::from(90),
            sgst_amount: BigDecimal::from(90),
            igst_amount: zero,
            line_total: BigDecimal::from(1180),
        }
    }

    #[test]
    fn aliases_are_emitted_in_sync() {
        let wire = LineItemWire::from(&line_item());
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["cgst"], json["cgstAmount"]);
        assert_eq!(json["sgst"], json["sgstAmount"]);
        assert_eq!(json["igst"], json["igstAmount"]);
        assert_eq!(json["amount"], json["itemAmount"]);
        assert_eq!(json["taxMode"], "without-tax");
        assert_eq!(json["gstMode"], "exclude");
    }

    #[test]
    fn totals_emit_grand_total_alias() {
        let totals = Totals {
            subtotal: BigDecimal::from(1000),
            total_discount: BigDecimal::from(0),
            total_taxable: BigDecimal::from(1000),
            total_tax: BigDecimal::from(180),
            round_off: BigDecimal::from(0),
            final_total: BigDecimal::from(1180),
        };
        let json = serde_json::to_value(TotalsWire::from(&totals)).unwrap();
        assert_eq!(json["finalTotal"], json["grandTotal"]);
    }

    #[test]
    fn accepts_legacy_order_payload() {
        let request: LineItemRequest = serde_json::from_str(
            r#"{
                "name": "Widget",
                "qty": "10",
                "rate": "100",
                "gstRate": "18",
                "gstMode": "include"
            }"#,
        )
        .unwrap();

        let input = LineItemInput::from(request);
        assert_eq!(input.quantity, BigDecimal::from(10));
        assert_eq!(input.price_per_unit, BigDecimal::from(100));
        assert_eq!(input.tax_mode, TaxMode::Inclusive);
        assert_eq!(input.unit, "pcs");
    }

    #[test]
    fn accepts_invoice_style_tax_mode() {
        let request: LineItemRequest = serde_json::from_str(
            r#"{
                "name": "Widget",
                "quantity": "1",
                "pricePerUnit": "99.50",
                "taxRate": "12",
                "taxMode": "with-tax"
            }"#,
        )
        .unwrap();
        assert_eq!(request.tax_mode, TaxMode::Inclusive);
    }

    #[test]
    fn rejects_unknown_tax_mode() {
        let result: Result<LineItemRequest, _> = serde_json::from_str(
            r#"{"name": "Widget", "quantity": "1", "price": "10", "taxMode": "sideways"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn document_wire_round_trips_through_json() {
        let now = Utc::now().naive_utc();
        let doc = Document {
            id: Uuid::new_v4(),
            version: 3,
            number: "GST-20240601-0007".to_string(),
            number_fallback: false,
            document_type: DocumentType::Sale,
            date: now.date(),
            company_id: Uuid::new_v4(),
            party_id: Uuid::new_v4(),
            items: vec![line_item()],
            totals: Totals {
                subtotal: BigDecimal::from(1000),
                total_discount: BigDecimal::from(0),
                total_taxable: BigDecimal::from(1000),
                total_tax: BigDecimal::from(180),
                round_off: BigDecimal::from(0),
                final_total: BigDecimal::from(1180),
            },
            payment: PaymentInfo {
                method: PaymentMethod::Cash,
                status: PaymentStatus::Pending,
                paid_amount: BigDecimal::from(0),
                pending_amount: BigDecimal::from(1180),
                payment_date: now.date(),
                due_date: None,
                credit_days: 0,
            },
            payment_history: Vec::new(),
            status: DocumentStatus::Completed,
            source: None,
            converted: None,
            created_at: now,
            updated_at: now,
            created_by: "cashier".to_string(),
        };

        let json = serde_json::to_value(DocumentWire::from(&doc)).unwrap();
        assert_eq!(json["number"], "GST-20240601-0007");
        assert_eq!(json["payment"]["pendingAmount"], json["payment"]["balanceAmount"]);
        // internal concurrency version never leaks to consumers
        assert!(json.get("version").is_none());
    }
}
