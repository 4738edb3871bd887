//! Core types and data structures for the invoicing engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a quoted price already contains tax (inclusive) or tax is
/// added on top (exclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Price contains tax; the taxable amount is derived by dividing it out
    Inclusive,
    /// Tax is added on top of the price
    #[default]
    Exclusive,
}

impl TaxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxMode::Inclusive => "inclusive",
            TaxMode::Exclusive => "exclusive",
        }
    }

    /// Parse a tax mode from any of the labels that appear in client
    /// payloads, including the legacy order (`include`/`exclude`) and
    /// invoice (`with-tax`/`without-tax`) spellings.
    pub fn parse_label(s: &str) -> Option<Self> {
        match s {
            "inclusive" | "include" | "with-tax" => Some(TaxMode::Inclusive),
            "exclusive" | "exclude" | "without-tax" => Some(TaxMode::Exclusive),
            _ => None,
        }
    }
}

/// Payment methods accepted on documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Upi,
    BankTransfer,
    Cheque,
    /// Sale on credit; payment collected later against the due date
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Credit => "credit",
        }
    }
}

/// Payment status of a document
///
/// `Overdue` is derived, not sticky: a pending or partially paid document
/// becomes overdue once its due date passes while an amount is still
/// outstanding, and reverts on payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// The four document kinds the engine manages
///
/// All four share the same structural core; the type drives number
/// prefixes, stock effects, and the legal conversion paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Sales invoice
    Sale,
    /// Sales order, convertible into a sales invoice
    SalesOrder,
    /// Purchase invoice
    Purchase,
    /// Purchase order
    PurchaseOrder,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Sale => "sale",
            DocumentType::SalesOrder => "sales_order",
            DocumentType::Purchase => "purchase",
            DocumentType::PurchaseOrder => "purchase_order",
        }
    }

    /// Document number prefix for this type
    pub fn prefix(&self, gst_enabled: bool) -> &'static str {
        match (self, gst_enabled) {
            (DocumentType::Sale, true) => "GST",
            (DocumentType::Sale, false) => "INV",
            (DocumentType::SalesOrder, _) => "SO",
            (DocumentType::Purchase, true) => "PI-GST",
            (DocumentType::Purchase, false) => "PI",
            (DocumentType::PurchaseOrder, true) => "PO-GST",
            (DocumentType::PurchaseOrder, false) => "PO",
        }
    }
}

/// Lifecycle status of a document
///
/// `Completed` and `Cancelled` are terminal for items and totals; the
/// payment history may still append a reversal entry on cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    #[default]
    Completed,
    Cancelled,
}

/// Raw line item as submitted by a client, before tax computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    /// Optional link to an inventory item; lines without one are skipped
    /// by stock adjustment
    pub item_id: Option<Uuid>,
    /// Item name as it appears on the printed document
    pub name: String,
    /// Quantity, must be positive
    pub quantity: BigDecimal,
    /// Unit of measure (pcs, kg, hrs, ...)
    pub unit: String,
    /// Price per unit, must be non-negative
    pub price_per_unit: BigDecimal,
    /// GST rate percentage (0-100)
    pub tax_rate: BigDecimal,
    /// Whether the price includes tax
    pub tax_mode: TaxMode,
    /// Percentage discount (0-100); ignored when an absolute discount is given
    pub discount_percent: BigDecimal,
    /// Absolute discount; wins over the percentage when non-zero
    pub discount_amount: BigDecimal,
}

impl LineItemInput {
    /// Convenience constructor for a plain line with no discount
    pub fn new(
        name: String,
        quantity: BigDecimal,
        price_per_unit: BigDecimal,
        tax_rate: BigDecimal,
        tax_mode: TaxMode,
    ) -> Self {
        Self {
            item_id: None,
            name,
            quantity,
            unit: "pcs".to_string(),
            price_per_unit,
            tax_rate,
            tax_mode,
            discount_percent: BigDecimal::from(0),
            discount_amount: BigDecimal::from(0),
        }
    }
}

/// A computed line item as stored on a document
///
/// All monetary fields are rounded to 2 decimal places. Exclusive mode
/// satisfies `line_total == taxable_amount + cgst + sgst + igst`;
/// inclusive mode satisfies `line_total == amount after discount`, both
/// to within rounding tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: Option<Uuid>,
    pub name: String,
    pub quantity: BigDecimal,
    pub unit: String,
    pub price_per_unit: BigDecimal,
    pub tax_rate: BigDecimal,
    pub tax_mode: TaxMode,
    pub discount_percent: BigDecimal,
    pub discount_amount: BigDecimal,
    /// Effective discount applied to this line
    pub discount: BigDecimal,
    /// Amount the tax was computed on
    pub taxable_amount: BigDecimal,
    /// Central GST component
    pub cgst_amount: BigDecimal,
    /// State GST component
    pub sgst_amount: BigDecimal,
    /// Integrated GST component; reserved for inter-state transactions,
    /// always zero in the intra-state flows this engine drives
    pub igst_amount: BigDecimal,
    /// Line total after discount and tax
    pub line_total: BigDecimal,
}

/// Document-level monetary totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of quantity x price across lines, before discounts
    pub subtotal: BigDecimal,
    /// Sum of effective line discounts
    pub total_discount: BigDecimal,
    /// Sum of taxable amounts
    pub total_taxable: BigDecimal,
    /// Sum of CGST and SGST across lines
    pub total_tax: BigDecimal,
    /// Signed manual adjustment to reach a rounder figure
    pub round_off: BigDecimal,
    /// Grand total: sum of line totals plus round-off
    pub final_total: BigDecimal,
}

/// Payment state of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Total amount received so far, never negative
    pub paid_amount: BigDecimal,
    /// Outstanding amount: max(0, final_total - paid_amount)
    pub pending_amount: BigDecimal,
    /// Date of the document's initial payment terms
    pub payment_date: NaiveDate,
    /// Payment deadline; cleared when the document is fully paid
    pub due_date: Option<NaiveDate>,
    /// Credit period the due date was derived from
    pub credit_days: u32,
}

/// One entry in a document's append-only payment log
///
/// Appended on every payment and on cancellation (with a negative amount
/// reversing what was paid); never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    /// Signed amount; negative for a cancellation reversal
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    /// External reference (transaction id, cheque number, reason)
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    /// Due date at the time the entry was recorded
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

/// Reference to another document, used for conversion back-links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: Uuid,
    pub document_type: DocumentType,
}

/// Conversion link owned by a source document once it has been converted
///
/// The transition is one-way: a converted document never returns to
/// unconverted, and the target is resolved by id lookup rather than a
/// denormalized number string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionLink {
    pub target_id: Uuid,
    pub target_type: DocumentType,
    pub converted_at: NaiveDateTime,
    pub converted_by: String,
}

/// A sale, sales order, purchase, or purchase order
///
/// The document exclusively owns its line items and payment history; the
/// company and counterparty are weak references resolved by lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Internal identifier
    pub id: Uuid,
    /// Optimistic concurrency version, bumped by the store on update
    pub version: u64,
    /// Human-readable number, `{PREFIX}-{YYYYMMDD}-{SEQ4}`
    pub number: String,
    /// True when the number was produced by the timestamp fallback and
    /// needs later reconciliation
    pub number_fallback: bool,
    pub document_type: DocumentType,
    pub date: NaiveDate,
    pub company_id: Uuid,
    /// Counterparty (customer or supplier) in the company's directory
    pub party_id: Uuid,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub payment: PaymentInfo,
    pub payment_history: Vec<PaymentHistoryEntry>,
    pub status: DocumentStatus,
    /// Back-link to the document this one was created from
    pub source: Option<DocumentRef>,
    /// Set exactly once when this document is converted into another
    pub converted: Option<ConversionLink>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by: String,
}

impl Document {
    /// Whether this document has already been converted
    pub fn is_converted(&self) -> bool {
        self.converted.is_some()
    }
}

/// A counterparty in a company's directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    /// Namespace: the company whose directory this party belongs to
    pub company_id: Uuid,
    pub name: String,
    /// Stable identity for synthesized counterparties: the originating
    /// company id, never a mutable field like a phone number
    pub identity_key: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Input for creating a party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParty {
    pub company_id: Uuid,
    pub name: String,
    pub identity_key: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Result of a single stock adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub item_id: Uuid,
    pub new_stock: BigDecimal,
}

/// Engine-wide options
///
/// Plain data passed to the engine constructor; there is no global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Whether GST applies to documents created by this engine
    pub gst_enabled: bool,
    /// Whether a supplied round-off adjustment is honored
    pub round_off_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            gst_enabled: true,
            round_off_enabled: false,
        }
    }
}

/// Errors that can occur in the invoicing engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input: bad line fields, over-payment, illegal conversion.
    /// Never retried automatically.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Party not found: {0}")]
    PartyNotFound(String),
    /// Concurrent write collision (stale version, duplicate number).
    /// The engine retries these once before surfacing them.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A collaborator (inventory, party directory) failed; the primary
    /// write proceeds and the failure is reported per item.
    #[error("Dependency failure: {0}")]
    Dependency(String),
    /// Invariant violation or sequence exhaustion; the operation aborts
    /// and nothing inconsistent is persisted.
    #[error("Fatal: {0}")]
    Fatal(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
