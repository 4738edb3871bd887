//! # Invoicing Core
//!
//! An invoice computation and lifecycle engine for shop/accounting back
//! offices: sales invoices, sales orders, purchase invoices, and purchase
//! orders with GST tax breakdowns, payment tracking, and document
//! conversion.
//!
//! ## Features
//!
//! - **GST tax calculation**: Indian GST compliance with CGST/SGST split,
//!   inclusive and exclusive tax modes, percent/absolute discounts
//! - **Totals aggregation**: document totals folded from unrounded line
//!   computations with a single rounding step and optional round-off
//! - **Document numbering**: `{PREFIX}-{YYYYMMDD}-{SEQ4}` numbers from an
//!   atomic per-(company, day) counter, safe under concurrent creation
//! - **Payment tracking**: pending/partial/paid with derived overdue,
//!   credit-day due dates, and an append-only payment history
//! - **Document conversion**: sales order to invoice and cross-company
//!   invoice to purchase invoice, exactly once
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   storage, party directory, and inventory collaborators
//!
//! ## Quick Start
//!
//! ```rust
//! use invoicing_core::{
//!     DocumentInput, DocumentType, EngineOptions, InvoiceEngine, LineItemInput, PaymentSetup,
//!     TaxMode, utils::MemoryStore,
//! };
//! use bigdecimal::BigDecimal;
//!
//! // The engine works against any DocumentStore/SequenceStore/PartyDirectory
//! // implementation; MemoryStore backs tests and examples.
//! // let engine = InvoiceEngine::new(MemoryStore::new(), EngineOptions::default());
//! ```

pub mod document;
pub mod stock;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;
pub mod wire;

// Re-export commonly used types
pub use document::*;
pub use stock::*;
pub use tax::gst::*;
pub use traits::*;
pub use types::*;

// Re-export the conversion inputs for convenience
pub use document::convert::SupplierProfile;
