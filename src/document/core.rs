//! Engine facade orchestrating calculation, numbering, payments,
//! conversion, and stock adjustment

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::document::convert::{self, ConversionOutcome, SupplierProfile};
use crate::document::numbering::NumberAllocator;
use crate::document::payment::{self, PaymentRequest};
use crate::document::totals;
use crate::stock::{StockGateway, StockLineOutcome, StockOperation};
use crate::tax::gst::{calculate_lines, round_money};
use crate::traits::{DocumentStore, PartyDirectory, SequenceStore};
use crate::types::*;
use crate::utils::validation::{validate_actor, validate_reason};

/// Initial payment terms submitted with a new document
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSetup {
    pub method: PaymentMethod,
    /// Advance received at creation time; zero for unpaid documents
    pub paid_amount: BigDecimal,
    pub credit_days: u32,
    pub due_date: Option<NaiveDate>,
}

impl Default for PaymentSetup {
    fn default() -> Self {
        Self {
            method: PaymentMethod::Cash,
            paid_amount: BigDecimal::from(0),
            credit_days: 0,
            due_date: None,
        }
    }
}

/// Client payload for creating a document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInput {
    pub document_type: DocumentType,
    pub date: NaiveDate,
    pub company_id: Uuid,
    pub party_id: Uuid,
    pub items: Vec<LineItemInput>,
    /// Manual round-off; honored only when the engine enables round-off
    pub round_off: Option<BigDecimal>,
    pub payment: PaymentSetup,
}

/// A created document together with its per-line stock results
#[derive(Debug)]
pub struct CreateOutcome {
    pub document: Document,
    pub stock: Vec<StockLineOutcome>,
}

/// Main engine coordinating all document operations
///
/// Generic over the storage backend; every mutation threads an explicit
/// actor through to the audit fields rather than defaulting one.
pub struct InvoiceEngine<S> {
    store: S,
    allocator: NumberAllocator,
    stock: StockGateway,
    options: EngineOptions,
}

impl<S> InvoiceEngine<S>
where
    S: DocumentStore + SequenceStore + PartyDirectory,
{
    /// Create an engine with no inventory integration
    pub fn new(store: S, options: EngineOptions) -> Self {
        Self {
            store,
            allocator: NumberAllocator::new(),
            stock: StockGateway::disabled(),
            options,
        }
    }

    /// Create an engine with a stock gateway
    pub fn with_stock(store: S, options: EngineOptions, stock: StockGateway) -> Self {
        Self {
            store,
            allocator: NumberAllocator::new(),
            stock,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Create a document from raw line items
    ///
    /// Runs the full calculation pipeline, allocates a number, applies
    /// any advance payment, persists, and (for sales) decrements stock.
    /// A numbering collision at insert is retried once with a fresh
    /// number; stock failures degrade to per-line results.
    pub async fn create_document(
        &self,
        input: DocumentInput,
        actor: &str,
    ) -> EngineResult<CreateOutcome> {
        validate_actor(actor)?;
        let now = Utc::now().naive_utc();
        let today = now.date();

        if self.store.get_party(input.party_id).await?.is_none() {
            return Err(EngineError::PartyNotFound(input.party_id.to_string()));
        }

        let computations = calculate_lines(&input.items, self.options.gst_enabled)?;
        let round_off = if self.options.round_off_enabled {
            input.round_off.as_ref()
        } else {
            None
        };
        let doc_totals = totals::aggregate(&computations, round_off);
        totals::verify(&doc_totals, &computations)?;

        let items: Vec<LineItem> = input
            .items
            .iter()
            .zip(&computations)
            .map(|(line, comp)| comp.to_line_item(line))
            .collect();

        let zero = BigDecimal::from(0);
        let paid = round_money(&input.payment.paid_amount);
        if paid < zero {
            return Err(EngineError::Validation(
                "paid amount cannot be negative".to_string(),
            ));
        }
        if paid > doc_totals.final_total {
            return Err(EngineError::Validation(format!(
                "paid amount {} exceeds document total {}",
                paid, doc_totals.final_total
            )));
        }

        let number = self
            .allocator
            .allocate_or_fallback(
                &self.store,
                input.company_id,
                input.document_type,
                self.options.gst_enabled,
                input.date,
            )
            .await?;

        let pending = if paid >= doc_totals.final_total {
            zero.clone()
        } else {
            round_money(&(&doc_totals.final_total - &paid))
        };
        let due_date = match input.payment.due_date {
            Some(due) => Some(due),
            None if input.payment.credit_days > 0 => Some(payment::due_date_from_credit_days(
                input.date,
                input.payment.credit_days,
            )?),
            None => None,
        };
        let status = payment::evaluate_status(
            &paid,
            &pending,
            &doc_totals.final_total,
            due_date,
            today,
        );
        let due_date = if status == PaymentStatus::Paid {
            None
        } else {
            due_date
        };

        let mut document = Document {
            id: Uuid::new_v4(),
            version: 1,
            number: number.value,
            number_fallback: number.fallback,
            document_type: input.document_type,
            date: input.date,
            company_id: input.company_id,
            party_id: input.party_id,
            items,
            totals: doc_totals,
            payment: PaymentInfo {
                method: input.payment.method,
                status,
                paid_amount: paid.clone(),
                pending_amount: pending,
                payment_date: input.date,
                due_date,
                credit_days: input.payment.credit_days,
            },
            payment_history: Vec::new(),
            status: DocumentStatus::Completed,
            source: None,
            converted: None,
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
        };

        if paid > zero {
            document.payment_history.push(PaymentHistoryEntry {
                amount: paid,
                method: input.payment.method,
                reference: None,
                payment_date: input.date,
                due_date,
                created_at: now,
                created_by: actor.to_string(),
            });
        }

        match self.store.save_document(&document).await {
            Ok(()) => {}
            Err(EngineError::Conflict(_)) => {
                // Numbering collision at insert: re-allocate once
                let number = self
                    .allocator
                    .allocate(
                        &self.store,
                        input.company_id,
                        input.document_type,
                        self.options.gst_enabled,
                        input.date,
                    )
                    .await?;
                document.number = number.value;
                document.number_fallback = number.fallback;
                self.store.save_document(&document).await?;
            }
            Err(error) => return Err(error),
        }

        let stock = if document.document_type == DocumentType::Sale {
            self.stock
                .apply(&document, StockOperation::SaleDecrement)
                .await
        } else {
            Vec::new()
        };

        info!(
            id = %document.id,
            number = %document.number,
            document_type = document.document_type.as_str(),
            total = %document.totals.final_total,
            "document created"
        );
        Ok(CreateOutcome { document, stock })
    }

    /// Get a document by id
    pub async fn get_document(&self, document_id: Uuid) -> EngineResult<Option<Document>> {
        self.store.get_document(document_id).await
    }

    /// Get a document by id, failing when it does not exist
    pub async fn get_document_required(&self, document_id: Uuid) -> EngineResult<Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| EngineError::DocumentNotFound(document_id.to_string()))
    }

    /// List documents for a company
    pub async fn list_documents(
        &self,
        company_id: Uuid,
        document_type: Option<DocumentType>,
    ) -> EngineResult<Vec<Document>> {
        self.store.list_documents(company_id, document_type).await
    }

    /// Apply a payment against a document
    ///
    /// Concurrent payments serialize on the document version: a stale
    /// write is re-read and retried once before the conflict surfaces.
    pub async fn add_payment(
        &self,
        document_id: Uuid,
        request: &PaymentRequest,
        actor: &str,
    ) -> EngineResult<Document> {
        validate_actor(actor)?;
        let now = Utc::now().naive_utc();
        let today = now.date();
        let mut attempt = 0;

        loop {
            let mut document = self.get_document_required(document_id).await?;
            let expected_version = document.version;

            payment::apply_payment(&mut document, request, actor, today, now)?;

            match self.store.update_document(&document, expected_version).await {
                Ok(()) => {
                    info!(
                        id = %document.id,
                        number = %document.number,
                        amount = %request.amount,
                        status = document.payment.status.as_str(),
                        "payment recorded"
                    );
                    return Ok(document);
                }
                Err(EngineError::Conflict(_)) if attempt == 0 => {
                    attempt += 1;
                    continue;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Cancel a document, reversing any partial payment and restoring
    /// stock for sales
    pub async fn cancel_document(
        &self,
        document_id: Uuid,
        reason: &str,
        actor: &str,
    ) -> EngineResult<(Document, Vec<StockLineOutcome>)> {
        validate_actor(actor)?;
        validate_reason(reason)?;
        let now = Utc::now().naive_utc();
        let mut attempt = 0;

        let document = loop {
            let mut document = self.get_document_required(document_id).await?;
            let expected_version = document.version;

            payment::cancel(&mut document, reason, actor, now)?;

            match self.store.update_document(&document, expected_version).await {
                Ok(()) => break document,
                Err(EngineError::Conflict(_)) if attempt == 0 => {
                    attempt += 1;
                    continue;
                }
                Err(error) => return Err(error),
            }
        };

        let stock = if document.document_type == DocumentType::Sale {
            self.stock
                .apply(&document, StockOperation::CancelRestore)
                .await
        } else {
            Vec::new()
        };

        info!(id = %document.id, number = %document.number, "document cancelled");
        Ok((document, stock))
    }

    /// Set the due date from a credit period
    ///
    /// Does not itself change the payment status; the status is
    /// re-derived on the next evaluation.
    pub async fn set_due_date(
        &self,
        document_id: Uuid,
        credit_days: u32,
        _actor: &str,
    ) -> EngineResult<Document> {
        let mut attempt = 0;
        loop {
            let mut document = self.get_document_required(document_id).await?;
            let expected_version = document.version;

            document.payment.due_date = Some(payment::due_date_from_credit_days(
                document.payment.payment_date,
                credit_days,
            )?);
            document.payment.credit_days = credit_days;
            document.updated_at = Utc::now().naive_utc();

            match self.store.update_document(&document, expected_version).await {
                Ok(()) => return Ok(document),
                Err(EngineError::Conflict(_)) if attempt == 0 => {
                    attempt += 1;
                    continue;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Re-derive the payment status against today's date
    ///
    /// This is the evaluation that flips a document past its due date to
    /// overdue without any payment landing.
    pub async fn refresh_status(&self, document_id: Uuid) -> EngineResult<Document> {
        let today = Utc::now().date_naive();
        let mut attempt = 0;
        loop {
            let mut document = self.get_document_required(document_id).await?;
            let expected_version = document.version;
            let before = document.payment.status;

            payment::refresh_status(&mut document, today);
            if document.payment.status == before {
                return Ok(document);
            }

            match self.store.update_document(&document, expected_version).await {
                Ok(()) => return Ok(document),
                Err(EngineError::Conflict(_)) if attempt == 0 => {
                    attempt += 1;
                    continue;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Convert a sales order into a sales invoice
    pub async fn convert_order_to_invoice(
        &self,
        order_id: Uuid,
        actor: &str,
    ) -> EngineResult<ConversionOutcome> {
        validate_actor(actor)?;
        let now = Utc::now().naive_utc();
        convert::order_to_sale(
            &self.store,
            &self.allocator,
            &self.options,
            order_id,
            actor,
            now.date(),
            now,
        )
        .await
    }

    /// Convert a sales invoice into the buyer's purchase invoice
    pub async fn convert_to_purchase_invoice(
        &self,
        sale_id: Uuid,
        target_company_id: Uuid,
        supplier: &SupplierProfile,
        actor: &str,
    ) -> EngineResult<ConversionOutcome> {
        validate_actor(actor)?;
        let now = Utc::now().naive_utc();
        convert::sale_to_purchase(
            &self.store,
            &self.allocator,
            &self.options,
            sale_id,
            target_company_id,
            supplier,
            actor,
            now.date(),
            now,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::MemoryStore;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    async fn customer(store: &MemoryStore, company_id: Uuid) -> Party {
        store
            .create_party(NewParty {
                company_id,
                name: "Retail Customer".to_string(),
                identity_key: None,
                phone: None,
                email: None,
            })
            .await
            .unwrap()
    }

    fn sale_input(company_id: Uuid, party_id: Uuid) -> DocumentInput {
        DocumentInput {
            document_type: DocumentType::Sale,
            date: today(),
            company_id,
            party_id,
            items: vec![LineItemInput::new(
                "Widget".to_string(),
                BigDecimal::from(10),
                BigDecimal::from(100),
                BigDecimal::from(18),
                TaxMode::Exclusive,
            )],
            round_off: None,
            payment: PaymentSetup::default(),
        }
    }

    #[tokio::test]
    async fn create_computes_totals_and_allocates_number() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let party = customer(&store, company).await;
        let engine = InvoiceEngine::new(store, EngineOptions::default());

        let outcome = engine
            .create_document(sale_input(company, party.id), "cashier")
            .await
            .unwrap();
        let doc = outcome.document;

        assert_eq!(doc.totals.final_total, BigDecimal::from(1180));
        assert_eq!(doc.totals.total_tax, BigDecimal::from(180));
        assert_eq!(doc.payment.status, PaymentStatus::Pending);
        assert_eq!(doc.payment.pending_amount, BigDecimal::from(1180));
        let date_part = today().format("%Y%m%d").to_string();
        assert_eq!(doc.number, format!("GST-{}-0001", date_part));
        assert_eq!(doc.created_by, "cashier");
    }

    #[tokio::test]
    async fn create_with_advance_payment_starts_partial() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let party = customer(&store, company).await;
        let engine = InvoiceEngine::new(store, EngineOptions::default());

        let mut input = sale_input(company, party.id);
        input.payment.paid_amount = BigDecimal::from(500);

        let doc = engine.create_document(input, "cashier").await.unwrap().document;
        assert_eq!(doc.payment.status, PaymentStatus::Partial);
        assert_eq!(doc.payment.pending_amount, BigDecimal::from(680));
        assert_eq!(doc.payment_history.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_advance_beyond_total() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let party = customer(&store, company).await;
        let engine = InvoiceEngine::new(store, EngineOptions::default());

        let mut input = sale_input(company, party.id);
        input.payment.paid_amount = BigDecimal::from(2000);

        let err = engine.create_document(input, "cashier").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn create_requires_existing_party() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let engine = InvoiceEngine::new(store, EngineOptions::default());

        let err = engine
            .create_document(sale_input(company, Uuid::new_v4()), "cashier")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PartyNotFound(_)));
    }

    #[tokio::test]
    async fn round_off_is_ignored_unless_enabled() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let party = customer(&store, company).await;

        let mut input = sale_input(company, party.id);
        input.round_off = Some(BigDecimal::new((-40).into(), 2));

        let engine = InvoiceEngine::new(store.clone(), EngineOptions::default());
        let doc = engine
            .create_document(input.clone(), "cashier")
            .await
            .unwrap()
            .document;
        assert_eq!(doc.totals.final_total, BigDecimal::from(1180));

        let engine = InvoiceEngine::new(
            store,
            EngineOptions {
                round_off_enabled: true,
                ..EngineOptions::default()
            },
        );
        let doc = engine.create_document(input, "cashier").await.unwrap().document;
        let expected = BigDecimal::from(1180) + BigDecimal::new((-40).into(), 2);
        assert_eq!(doc.totals.final_total, expected);
    }

    #[tokio::test]
    async fn credit_days_on_create_derive_due_date() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let party = customer(&store, company).await;
        let engine = InvoiceEngine::new(store, EngineOptions::default());

        let mut input = sale_input(company, party.id);
        input.payment.method = PaymentMethod::Credit;
        input.payment.credit_days = 30;

        let doc = engine.create_document(input, "cashier").await.unwrap().document;
        let expected = today().checked_add_days(chrono::Days::new(30)).unwrap();
        assert_eq!(doc.payment.due_date, Some(expected));
        assert_eq!(doc.payment.credit_days, 30);
    }

    #[tokio::test]
    async fn gst_disabled_engine_uses_inv_prefix() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let party = customer(&store, company).await;
        let engine = InvoiceEngine::new(
            store,
            EngineOptions {
                gst_enabled: false,
                round_off_enabled: false,
            },
        );

        let doc = engine
            .create_document(sale_input(company, party.id), "cashier")
            .await
            .unwrap()
            .document;
        assert!(doc.number.starts_with("INV-"));
        assert_eq!(doc.totals.total_tax, BigDecimal::from(0));
        assert_eq!(doc.totals.final_total, BigDecimal::from(1000));
    }
}
