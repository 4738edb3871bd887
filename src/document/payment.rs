//! Payment state machine
//!
//! Pure transition functions over a document's [`PaymentInfo`] and
//! append-only history. States move `pending -> partial -> paid`;
//! `overdue` is derived (non-sticky) whenever an amount is outstanding
//! past the due date; `cancelled` is terminal and reachable from any
//! state except fully paid.

use bigdecimal::BigDecimal;
use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::tax::gst::round_money;
use crate::types::*;

/// A payment submitted against a document
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    /// Explicit due date for the remaining balance
    pub due_date: Option<NaiveDate>,
    /// Credit period; used to derive the due date when none is given
    pub credit_days: Option<u32>,
}

/// Derive a due date from a payment date and credit period
pub fn due_date_from_credit_days(
    payment_date: NaiveDate,
    credit_days: u32,
) -> EngineResult<NaiveDate> {
    payment_date
        .checked_add_days(Days::new(u64::from(credit_days)))
        .ok_or_else(|| EngineError::Validation("credit days push due date out of range".to_string()))
}

/// Compute the status implied by the current amounts and due date
///
/// Does not mutate anything; callers store the result. `Paid` requires a
/// positive final total so an empty document does not read as settled.
pub fn evaluate_status(
    paid_amount: &BigDecimal,
    pending_amount: &BigDecimal,
    final_total: &BigDecimal,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> PaymentStatus {
    let zero = BigDecimal::from(0);

    if *final_total > zero && *paid_amount >= *final_total {
        return PaymentStatus::Paid;
    }
    if *pending_amount > zero {
        if let Some(due) = due_date {
            if due < today {
                return PaymentStatus::Overdue;
            }
        }
    }
    if *paid_amount > zero {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// Re-derive the document's payment status against `today`
///
/// This is how a document becomes overdue: no payment needs to land, the
/// next evaluation after the due date passes flips the status.
pub fn refresh_status(document: &mut Document, today: NaiveDate) {
    if document.payment.status == PaymentStatus::Cancelled {
        return;
    }
    document.payment.status = evaluate_status(
        &document.payment.paid_amount,
        &document.payment.pending_amount,
        &document.totals.final_total,
        document.payment.due_date,
        today,
    );
}

/// Apply a payment to a document
///
/// Rejects non-positive amounts and over-payment (amount beyond the
/// current pending balance) as validation errors; nothing is clamped.
/// Appends a history entry on every accepted payment.
pub fn apply_payment(
    document: &mut Document,
    request: &PaymentRequest,
    actor: &str,
    today: NaiveDate,
    now: NaiveDateTime,
) -> EngineResult<()> {
    let zero = BigDecimal::from(0);

    if document.payment.status == PaymentStatus::Cancelled {
        return Err(EngineError::Validation(
            "cancelled document cannot accept payments".to_string(),
        ));
    }
    if request.amount <= zero {
        return Err(EngineError::Validation(
            "payment amount must be positive".to_string(),
        ));
    }
    if request.amount > document.payment.pending_amount {
        return Err(EngineError::Validation(format!(
            "payment {} exceeds pending amount {}",
            request.amount, document.payment.pending_amount
        )));
    }

    let amount = round_money(&request.amount);
    let new_paid = round_money(&(&document.payment.paid_amount + &amount));
    let final_total = document.totals.final_total.clone();
    let new_pending = if new_paid >= final_total {
        zero.clone()
    } else {
        round_money(&(&final_total - &new_paid))
    };

    // Due date: explicit date wins, then a derived one from credit days
    if let Some(due) = request.due_date {
        document.payment.due_date = Some(due);
    } else if let Some(days) = request.credit_days {
        document.payment.due_date = Some(due_date_from_credit_days(request.payment_date, days)?);
        document.payment.credit_days = days;
    }

    document.payment.paid_amount = new_paid;
    document.payment.pending_amount = new_pending;
    document.payment.method = request.method;
    document.payment.payment_date = request.payment_date;

    if document.payment.paid_amount >= final_total {
        document.payment.status = PaymentStatus::Paid;
        document.payment.due_date = None;
    } else {
        document.payment.status = evaluate_status(
            &document.payment.paid_amount,
            &document.payment.pending_amount,
            &final_total,
            document.payment.due_date,
            today,
        );
    }

    document.payment_history.push(PaymentHistoryEntry {
        amount,
        method: request.method,
        reference: request.reference.clone(),
        payment_date: request.payment_date,
        due_date: document.payment.due_date,
        created_at: now,
        created_by: actor.to_string(),
    });
    document.updated_at = now;

    Ok(())
}

/// Cancel a document
///
/// A settled document cannot be cancelled; the caller must record a
/// refund or return instead. Any partial payment is reversed with a
/// negative history entry equal to what was paid.
pub fn cancel(
    document: &mut Document,
    reason: &str,
    actor: &str,
    now: NaiveDateTime,
) -> EngineResult<()> {
    let zero = BigDecimal::from(0);

    if document.status == DocumentStatus::Cancelled {
        return Err(EngineError::Validation(
            "document is already cancelled".to_string(),
        ));
    }
    if document.totals.final_total > zero
        && document.payment.paid_amount >= document.totals.final_total
    {
        return Err(EngineError::Validation(
            "fully paid document cannot be cancelled; record a refund instead".to_string(),
        ));
    }

    if document.payment.paid_amount > zero {
        document.payment_history.push(PaymentHistoryEntry {
            amount: -document.payment.paid_amount.clone(),
            method: document.payment.method,
            reference: Some(reason.to_string()),
            payment_date: now.date(),
            due_date: document.payment.due_date,
            created_at: now,
            created_by: actor.to_string(),
        });
    }

    document.payment.paid_amount = zero.clone();
    document.payment.pending_amount = zero;
    document.payment.due_date = None;
    document.payment.status = PaymentStatus::Cancelled;
    document.status = DocumentStatus::Cancelled;
    document.updated_at = now;

    Ok(())
}
