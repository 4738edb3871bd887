//! Stock adjustment gateway
//!
//! Wraps the external inventory service behind a direct, typed call
//! interface. Adjustments are applied at most once per (document,
//! operation): a retried request finds the operation already recorded and
//! does nothing. When the primary service fails for a line, a configured
//! fallback (direct stock write) may take over; the fallback never runs
//! for a line the primary already handled.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bigdecimal::BigDecimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::StockAdjuster;
use crate::types::*;

/// Stock-affecting operations, part of the at-most-once key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockOperation {
    /// Decrement stock for a completed sale
    SaleDecrement,
    /// Restore stock for a cancelled sale
    CancelRestore,
}

impl StockOperation {
    fn reason(&self) -> &'static str {
        match self {
            StockOperation::SaleDecrement => "sale",
            StockOperation::CancelRestore => "sale-cancelled",
        }
    }

    /// Signed multiplier applied to each line quantity
    fn direction(&self) -> i64 {
        match self {
            StockOperation::SaleDecrement => -1,
            StockOperation::CancelRestore => 1,
        }
    }
}

/// Outcome of adjusting stock for one document line
#[derive(Debug, Clone, PartialEq)]
pub enum StockLineOutcome {
    /// Primary service applied the adjustment
    Applied { item_id: Uuid, new_stock: BigDecimal },
    /// Primary failed; the direct-write fallback applied it
    AppliedViaFallback { item_id: Uuid, new_stock: BigDecimal },
    /// Neither primary nor fallback could apply the adjustment
    Failed { item_id: Uuid, error: String },
    /// Line has no inventory item, or the operation was already applied
    Skipped,
}

impl StockLineOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StockLineOutcome::Failed { .. })
    }
}

/// Gateway in front of the inventory collaborators
pub struct StockGateway {
    primary: Option<Arc<dyn StockAdjuster>>,
    fallback: Option<Arc<dyn StockAdjuster>>,
    applied: Mutex<HashSet<(Uuid, StockOperation)>>,
}

impl StockGateway {
    /// A gateway with no inventory service; every line is skipped
    pub fn disabled() -> Self {
        Self {
            primary: None,
            fallback: None,
            applied: Mutex::new(HashSet::new()),
        }
    }

    pub fn new(primary: Arc<dyn StockAdjuster>) -> Self {
        Self {
            primary: Some(primary),
            fallback: None,
            applied: Mutex::new(HashSet::new()),
        }
    }

    /// Add a direct-write fallback used only when the primary call fails
    pub fn with_fallback(mut self, fallback: Arc<dyn StockAdjuster>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Apply the operation to every inventory-linked line of the document
    ///
    /// Failures never propagate as errors; they are collected per line so
    /// the caller can report partial success while the financial document
    /// stands. Returns all-skipped when the operation was already applied
    /// for this document.
    pub async fn apply(&self, document: &Document, operation: StockOperation) -> Vec<StockLineOutcome> {
        let Some(primary) = &self.primary else {
            return document.items.iter().map(|_| StockLineOutcome::Skipped).collect();
        };

        // At-most-once: record the op key before touching inventory so a
        // retried request cannot double-apply.
        {
            let mut applied = self.applied.lock().unwrap();
            if !applied.insert((document.id, operation)) {
                debug!(
                    document = %document.number,
                    ?operation,
                    "stock operation already applied, skipping"
                );
                return document.items.iter().map(|_| StockLineOutcome::Skipped).collect();
            }
        }

        let mut outcomes = Vec::with_capacity(document.items.len());
        for item in &document.items {
            let Some(item_id) = item.item_id else {
                outcomes.push(StockLineOutcome::Skipped);
                continue;
            };

            let delta = &item.quantity * BigDecimal::from(operation.direction());
            let outcome = match primary
                .adjust_stock(
                    item_id,
                    document.company_id,
                    &delta,
                    operation.reason(),
                    &document.number,
                )
                .await
            {
                Ok(adjustment) => StockLineOutcome::Applied {
                    item_id,
                    new_stock: adjustment.new_stock,
                },
                Err(primary_error) => {
                    warn!(
                        document = %document.number,
                        %item_id,
                        error = %primary_error,
                        "primary stock adjustment failed"
                    );
                    match &self.fallback {
                        Some(fallback) => match fallback
                            .adjust_stock(
                                item_id,
                                document.company_id,
                                &delta,
                                operation.reason(),
                                &document.number,
                            )
                            .await
                        {
                            Ok(adjustment) => StockLineOutcome::AppliedViaFallback {
                                item_id,
                                new_stock: adjustment.new_stock,
                            },
                            Err(fallback_error) => StockLineOutcome::Failed {
                                item_id,
                                error: format!(
                                    "primary: {primary_error}; fallback: {fallback_error}"
                                ),
                            },
                        },
                        None => StockLineOutcome::Failed {
                            item_id,
                            error: primary_error.to_string(),
                        },
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::MemoryStockAdjuster;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FailingAdjuster;

    #[async_trait]
    impl StockAdjuster for FailingAdjuster {
        async fn adjust_stock(
            &self,
            _item_id: Uuid,
            _company_id: Uuid,
            _delta: &BigDecimal,
            _reason: &str,
            _reference: &str,
        ) -> EngineResult<StockAdjustment> {
            Err(EngineError::Dependency("inventory offline".to_string()))
        }
    }

    fn sale_with_item(company_id: Uuid, item_id: Uuid) -> Document {
        let now = Utc::now().naive_utc();
        let zero = BigDecimal::from(0);
        Document {
            id: Uuid::new_v4(),
            version: 1,
            number: "GST-20240601-0001".to_string(),
            number_fallback: false,
            document_type: DocumentType::Sale,
            date: now.date(),
            company_id,
            party_id: Uuid::new_v4(),
            items: vec![LineItem {
                item_id: Some(item_id),
                name: "Widget".to_string(),
                quantity: BigDecimal::from(3),
                unit: "pcs".to_string(),
                price_per_unit: BigDecimal::from(10),
                tax_rate: zero.clone(),
                tax_mode: TaxMode::Exclusive,
                discount_percent: zero.clone(),
                discount_amount: zero.clone(),
                discount: zero.clone(),
                taxable_amount: BigDecimal::from(30),
                cgst_amount: zero.clone(),
                sgst_amount: zero.clone(),
                igst_amount: zero.clone(),
                line_total: BigDecimal::from(30),
            }],
            totals: Totals {
                subtotal: BigDecimal::from(30),
                total_discount: zero.clone(),
                total_taxable: BigDecimal::from(30),
                total_tax: zero.clone(),
                round_off: zero.clone(),
                final_total: BigDecimal::from(30),
            },
            payment: PaymentInfo {
                method: PaymentMethod::Cash,
                status: PaymentStatus::Pending,
                paid_amount: zero.clone(),
                pending_amount: BigDecimal::from(30),
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
            created_by: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn decrement_and_restore_round_trip() {
        let company = Uuid::new_v4();
        let item = Uuid::new_v4();
        let inventory = Arc::new(MemoryStockAdjuster::new());
        inventory.set_stock(company, item, BigDecimal::from(10));

        let gateway = StockGateway::new(inventory.clone());
        let doc = sale_with_item(company, item);

        let outcomes = gateway.apply(&doc, StockOperation::SaleDecrement).await;
        assert_eq!(
            outcomes,
            vec![StockLineOutcome::Applied {
                item_id: item,
                new_stock: BigDecimal::from(7)
            }]
        );

        let outcomes = gateway.apply(&doc, StockOperation::CancelRestore).await;
        assert_eq!(
            outcomes,
            vec![StockLineOutcome::Applied {
                item_id: item,
                new_stock: BigDecimal::from(10)
            }]
        );
    }

    #[tokio::test]
    async fn retried_operation_does_not_double_apply() {
        let company = Uuid::new_v4();
        let item = Uuid::new_v4();
        let inventory = Arc::new(MemoryStockAdjuster::new());
        inventory.set_stock(company, item, BigDecimal::from(10));

        let gateway = StockGateway::new(inventory.clone());
        let doc = sale_with_item(company, item);

        gateway.apply(&doc, StockOperation::SaleDecrement).await;
        let retry = gateway.apply(&doc, StockOperation::SaleDecrement).await;

        assert_eq!(retry, vec![StockLineOutcome::Skipped]);
        assert_eq!(inventory.stock_level(company, item), Some(BigDecimal::from(7)));
    }

    #[tokio::test]
    async fn fallback_runs_only_when_primary_fails() {
        let company = Uuid::new_v4();
        let item = Uuid::new_v4();
        let fallback = Arc::new(MemoryStockAdjuster::new());
        fallback.set_stock(company, item, BigDecimal::from(5));

        let gateway = StockGateway::new(Arc::new(FailingAdjuster)).with_fallback(fallback.clone());
        let doc = sale_with_item(company, item);

        let outcomes = gateway.apply(&doc, StockOperation::SaleDecrement).await;
        assert_eq!(
            outcomes,
            vec![StockLineOutcome::AppliedViaFallback {
                item_id: item,
                new_stock: BigDecimal::from(2)
            }]
        );
    }

    #[tokio::test]
    async fn failure_without_fallback_is_itemized_not_fatal() {
        let gateway = StockGateway::new(Arc::new(FailingAdjuster));
        let doc = sale_with_item(Uuid::new_v4(), Uuid::new_v4());

        let outcomes = gateway.apply(&doc, StockOperation::SaleDecrement).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_failure());
    }

    #[tokio::test]
    async fn lines_without_items_are_skipped() {
        let company = Uuid::new_v4();
        let inventory = Arc::new(MemoryStockAdjuster::new());
        let gateway = StockGateway::new(inventory);

        let mut doc = sale_with_item(company, Uuid::new_v4());
        doc.items[0].item_id = None;

        let outcomes = gateway.apply(&doc, StockOperation::SaleDecrement).await;
        assert_eq!(outcomes, vec![StockLineOutcome::Skipped]);
    }
}
