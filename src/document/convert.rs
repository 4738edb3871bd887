//! Document conversion
//!
//! Transforms a source document into a target of a different type exactly
//! once: sales order into sales invoice (same company), and sales invoice
//! into the counterparty's purchase invoice (cross-company). The source's
//! unconverted state is claimed with a compare-and-set before any
//! expensive work, so concurrent requests produce a single target; later
//! callers receive the existing target reference.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::numbering::NumberAllocator;
use crate::document::payment::evaluate_status;
use crate::traits::{ConversionClaim, DocumentStore, PartyDirectory, SequenceStore};
use crate::types::*;

/// Result of a conversion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub target_id: Uuid,
    /// False when the source was already converted and the existing
    /// target is being referenced
    pub created: bool,
}

/// Display data for the supplier party synthesized in the buyer's books
///
/// The identity key is always the originating company id; these fields
/// only fill in the human-facing record when the party does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierProfile {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

fn existing_target(link: &ConversionLink) -> ConversionOutcome {
    ConversionOutcome {
        target_id: link.target_id,
        created: false,
    }
}

/// Claim the source for conversion, retrying once on an in-flight claim
async fn claim_source<S: DocumentStore>(
    store: &S,
    source_id: Uuid,
) -> EngineResult<Option<ConversionOutcome>> {
    match store.claim_conversion(source_id).await? {
        ConversionClaim::Claimed => Ok(None),
        ConversionClaim::AlreadyConverted(link) => Ok(Some(existing_target(&link))),
        // The holder may have finished between the two calls
        ConversionClaim::InProgress => match store.claim_conversion(source_id).await? {
            ConversionClaim::Claimed => Ok(None),
            ConversionClaim::AlreadyConverted(link) => Ok(Some(existing_target(&link))),
            ConversionClaim::InProgress => Err(EngineError::Conflict(
                "conversion already in progress".to_string(),
            )),
        },
    }
}

/// Carry the source's payment state onto a freshly built target
///
/// Any advance or settled amount transfers verbatim; the pending amount
/// and status are recomputed against the target's totals.
fn carry_payment(
    source: &Document,
    target: &mut Document,
    actor: &str,
    today: NaiveDate,
    now: NaiveDateTime,
) {
    let zero = BigDecimal::from(0);
    let paid = source.payment.paid_amount.clone();
    let final_total = target.totals.final_total.clone();

    target.payment.paid_amount = paid.clone();
    target.payment.pending_amount = if paid >= final_total {
        zero.clone()
    } else {
        &final_total - &paid
    };
    target.payment.method = source.payment.method;
    target.payment.due_date = source.payment.due_date;
    target.payment.credit_days = source.payment.credit_days;
    target.payment.status = evaluate_status(
        &target.payment.paid_amount,
        &target.payment.pending_amount,
        &final_total,
        target.payment.due_date,
        today,
    );
    if target.payment.status == PaymentStatus::Paid {
        target.payment.due_date = None;
    }

    if paid > zero {
        target.payment_history.push(PaymentHistoryEntry {
            amount: paid,
            method: source.payment.method,
            reference: Some(format!("carried over from {}", source.number)),
            payment_date: today,
            due_date: target.payment.due_date,
            created_at: now,
            created_by: actor.to_string(),
        });
    }
}

fn blank_target(
    source: &Document,
    document_type: DocumentType,
    company_id: Uuid,
    party_id: Uuid,
    date: NaiveDate,
    actor: &str,
    now: NaiveDateTime,
) -> Document {
    let zero = BigDecimal::from(0);
    Document {
        id: Uuid::new_v4(),
        version: 1,
        number: String::new(),
        number_fallback: false,
        document_type,
        date,
        company_id,
        party_id,
        // Amounts carry over verbatim: tax was settled on the source
        items: source.items.clone(),
        totals: source.totals.clone(),
        payment: PaymentInfo {
            method: source.payment.method,
            status: PaymentStatus::Pending,
            paid_amount: zero.clone(),
            pending_amount: source.totals.final_total.clone(),
            payment_date: date,
            due_date: None,
            credit_days: 0,
        },
        payment_history: Vec::new(),
        status: DocumentStatus::Completed,
        source: Some(DocumentRef {
            id: source.id,
            document_type: source.document_type,
        }),
        converted: None,
        created_at: now,
        updated_at: now,
        created_by: actor.to_string(),
    }
}

/// Persist the target, retrying once with a fresh number on a collision
async fn persist_target<S>(
    store: &S,
    allocator: &NumberAllocator,
    gst_enabled: bool,
    target: &mut Document,
) -> EngineResult<()>
where
    S: DocumentStore + SequenceStore,
{
    match store.save_document(target).await {
        Ok(()) => Ok(()),
        Err(EngineError::Conflict(_)) => {
            let number = allocator
                .allocate(store, target.company_id, target.document_type, gst_enabled, target.date)
                .await?;
            target.number = number.value;
            target.number_fallback = number.fallback;
            store.save_document(target).await
        }
        Err(error) => Err(error),
    }
}

async fn finish_conversion<S: DocumentStore>(
    store: &S,
    source_id: Uuid,
    target: &Document,
    actor: &str,
    now: NaiveDateTime,
) -> EngineResult<ConversionOutcome> {
    let link = ConversionLink {
        target_id: target.id,
        target_type: target.document_type,
        converted_at: now,
        converted_by: actor.to_string(),
    };
    store.mark_converted(source_id, &link).await?;
    info!(
        source = %source_id,
        target = %target.id,
        number = %target.number,
        "document converted"
    );
    Ok(ConversionOutcome {
        target_id: target.id,
        created: true,
    })
}

/// Convert a sales order into a sales invoice in the same company
pub async fn order_to_sale<S>(
    store: &S,
    allocator: &NumberAllocator,
    options: &EngineOptions,
    order_id: Uuid,
    actor: &str,
    today: NaiveDate,
    now: NaiveDateTime,
) -> EngineResult<ConversionOutcome>
where
    S: DocumentStore + SequenceStore,
{
    let source = store
        .get_document(order_id)
        .await?
        .ok_or_else(|| EngineError::DocumentNotFound(order_id.to_string()))?;

    if source.document_type != DocumentType::SalesOrder {
        return Err(EngineError::Validation(format!(
            "cannot convert a {} into a sales invoice",
            source.document_type.as_str()
        )));
    }
    if source.status == DocumentStatus::Cancelled {
        return Err(EngineError::Validation(
            "cancelled order cannot be converted".to_string(),
        ));
    }

    if let Some(outcome) = claim_source(store, order_id).await? {
        return Ok(outcome);
    }

    let result = async {
        // Invoice is issued at conversion time, in the order's company
        let mut target = blank_target(
            &source,
            DocumentType::Sale,
            source.company_id,
            source.party_id,
            today,
            actor,
            now,
        );
        let number = allocator
            .allocate_or_fallback(store, source.company_id, DocumentType::Sale, options.gst_enabled, today)
            .await?;
        target.number = number.value;
        target.number_fallback = number.fallback;
        carry_payment(&source, &mut target, actor, today, now);

        debug!(order = %source.number, invoice = %target.number, "converting order to invoice");
        persist_target(store, allocator, options.gst_enabled, &mut target).await?;
        finish_conversion(store, order_id, &target, actor, now).await
    }
    .await;

    if result.is_err() {
        // A target must not exist while the source looks unconverted
        release_claim(store, order_id).await;
    }
    result
}

/// Convert a sales invoice into a purchase invoice in the buyer's company
///
/// The two documents are the two sides of one transaction, so the target
/// keeps the source's date and amounts. The supplier party representing
/// the selling company is found or created in the buyer's directory,
/// keyed by the selling company's id.
pub async fn sale_to_purchase<S>(
    store: &S,
    allocator: &NumberAllocator,
    options: &EngineOptions,
    sale_id: Uuid,
    target_company_id: Uuid,
    supplier: &SupplierProfile,
    actor: &str,
    today: NaiveDate,
    now: NaiveDateTime,
) -> EngineResult<ConversionOutcome>
where
    S: DocumentStore + SequenceStore + PartyDirectory,
{
    let source = store
        .get_document(sale_id)
        .await?
        .ok_or_else(|| EngineError::DocumentNotFound(sale_id.to_string()))?;

    if source.document_type != DocumentType::Sale {
        return Err(EngineError::Validation(format!(
            "cannot convert a {} into a purchase invoice",
            source.document_type.as_str()
        )));
    }
    if source.status == DocumentStatus::Cancelled {
        return Err(EngineError::Validation(
            "cancelled invoice cannot be converted".to_string(),
        ));
    }
    if target_company_id == source.company_id {
        return Err(EngineError::Validation(
            "purchase invoice must be created in a different company".to_string(),
        ));
    }

    if let Some(outcome) = claim_source(store, sale_id).await? {
        return Ok(outcome);
    }

    let result = async {
        let supplier_party =
            resolve_counterparty(store, target_company_id, source.company_id, supplier).await?;

        let mut target = blank_target(
            &source,
            DocumentType::Purchase,
            target_company_id,
            supplier_party.id,
            source.date,
            actor,
            now,
        );
        let number = allocator
            .allocate_or_fallback(
                store,
                target_company_id,
                DocumentType::Purchase,
                options.gst_enabled,
                source.date,
            )
            .await?;
        target.number = number.value;
        target.number_fallback = number.fallback;
        carry_payment(&source, &mut target, actor, today, now);

        debug!(
            sale = %source.number,
            purchase = %target.number,
            supplier = %supplier_party.id,
            "converting invoice to cross-company purchase"
        );
        persist_target(store, allocator, options.gst_enabled, &mut target).await?;
        finish_conversion(store, sale_id, &target, actor, now).await
    }
    .await;

    if result.is_err() {
        release_claim(store, sale_id).await;
    }
    result
}

async fn release_claim<S: DocumentStore>(store: &S, source_id: Uuid) {
    if let Err(error) = store.release_conversion(source_id).await {
        warn!(source = %source_id, %error, "failed to release conversion claim");
    }
}

/// Find or create the supplier party in the target company's directory
///
/// Lookup is by the stable identity key (the originating company id). A
/// uniqueness collision on a contact field never blocks the conversion:
/// the directory is re-checked for a concurrent create, then the create
/// is retried once with a disambiguated phone.
async fn resolve_counterparty<D: PartyDirectory>(
    directory: &D,
    target_company_id: Uuid,
    source_company_id: Uuid,
    supplier: &SupplierProfile,
) -> EngineResult<Party> {
    let identity = source_company_id.to_string();

    if let Some(party) = directory.find_party(target_company_id, &identity).await? {
        return Ok(party);
    }

    let new_party = NewParty {
        company_id: target_company_id,
        name: supplier.name.clone(),
        identity_key: Some(identity.clone()),
        phone: supplier.phone.clone(),
        email: supplier.email.clone(),
    };

    match directory.create_party(new_party.clone()).await {
        Ok(party) => Ok(party),
        Err(EngineError::Conflict(_)) => {
            // Either a concurrent request created the party, or a contact
            // field collided with an unrelated record
            if let Some(party) = directory.find_party(target_company_id, &identity).await? {
                return Ok(party);
            }
            let mut retry = new_party;
            if let Some(phone) = retry.phone.take() {
                retry.phone = Some(format!("{}-{}", phone, &identity[..8]));
            }
            directory.create_party(retry).await
        }
        Err(error) => Err(error),
    }
}
