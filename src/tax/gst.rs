//! GST (Goods and Services Tax) line-item calculation for Indian tax compliance

use bigdecimal::{BigDecimal, RoundingMode};

use crate::types::*;

/// Round a monetary value to 2 decimal places, half-up
///
/// Applied once at the point of storage; intermediate sums always run on
/// unrounded values.
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// Unrounded per-line computation produced by the tax calculator
///
/// Monetary fields keep full precision so the totals aggregator can sum
/// them before rounding; [`LineComputation::to_line_item`] rounds each
/// field once for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct LineComputation {
    /// quantity x price per unit
    pub base_amount: BigDecimal,
    /// Effective discount (absolute wins over percentage when non-zero)
    pub discount: BigDecimal,
    /// base_amount - discount
    pub after_discount: BigDecimal,
    /// Amount tax is computed on
    pub taxable: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    /// Reserved for inter-state transactions, always zero here
    pub igst: BigDecimal,
    /// Line total after discount and tax
    pub line_total: BigDecimal,
}

impl LineComputation {
    /// Total GST on this line
    pub fn total_tax(&self) -> BigDecimal {
        &self.cgst + &self.sgst + &self.igst
    }

    /// Build the stored line item, rounding every monetary field to
    /// 2 decimal places
    pub fn to_line_item(&self, input: &LineItemInput) -> LineItem {
        LineItem {
            item_id: input.item_id,
            name: input.name.clone(),
            quantity: input.quantity.clone(),
            unit: input.unit.clone(),
            price_per_unit: input.price_per_unit.clone(),
            tax_rate: input.tax_rate.clone(),
            tax_mode: input.tax_mode,
            discount_percent: input.discount_percent.clone(),
            discount_amount: input.discount_amount.clone(),
            discount: round_money(&self.discount),
            taxable_amount: round_money(&self.taxable),
            cgst_amount: round_money(&self.cgst),
            sgst_amount: round_money(&self.sgst),
            igst_amount: round_money(&self.igst),
            line_total: round_money(&self.line_total),
        }
    }
}

fn line_err(index: usize, message: &str) -> EngineError {
    EngineError::Validation(format!("line {}: {}", index, message))
}

/// Calculate tax for a single line item
///
/// The computation follows the intra-state GST split: the rate is halved
/// into equal CGST and SGST components. In exclusive mode tax is added on
/// top of the discounted amount; in inclusive mode the discounted amount
/// already contains tax and the taxable base is divided out.
///
/// `index` is the zero-based position of the line in the document and is
/// named in every validation error.
pub fn calculate_line(
    index: usize,
    line: &LineItemInput,
    gst_enabled: bool,
) -> EngineResult<LineComputation> {
    let zero = BigDecimal::from(0);
    let hundred = BigDecimal::from(100);

    if line.quantity <= zero {
        return Err(line_err(index, "quantity must be positive"));
    }
    if line.price_per_unit < zero {
        return Err(line_err(index, "price per unit cannot be negative"));
    }
    if line.tax_rate < zero || line.tax_rate > hundred {
        return Err(line_err(index, "tax rate must be between 0 and 100"));
    }
    if line.discount_percent < zero || line.discount_percent > hundred {
        return Err(line_err(index, "discount percent must be between 0 and 100"));
    }
    if line.discount_amount < zero {
        return Err(line_err(index, "discount amount cannot be negative"));
    }

    let base_amount = &line.quantity * &line.price_per_unit;

    let discount = if line.discount_amount > zero {
        line.discount_amount.clone()
    } else {
        (&base_amount * &line.discount_percent) / &hundred
    };
    if discount > base_amount {
        return Err(line_err(index, "discount exceeds line amount"));
    }

    let after_discount = &base_amount - &discount;

    if gst_enabled && line.tax_rate > zero {
        // Intra-state split: half the rate each to CGST and SGST
        let half_rate = &line.tax_rate / BigDecimal::from(2);

        let (taxable, line_total) = match line.tax_mode {
            TaxMode::Exclusive => (after_discount.clone(), None),
            TaxMode::Inclusive => {
                let divisor = BigDecimal::from(1) + &line.tax_rate / &hundred;
                (&after_discount / divisor, Some(after_discount.clone()))
            }
        };

        let cgst = (&taxable * &half_rate) / &hundred;
        let sgst = cgst.clone();
        let line_total = line_total.unwrap_or_else(|| &taxable + &cgst + &sgst);

        Ok(LineComputation {
            base_amount,
            discount,
            after_discount,
            taxable,
            cgst,
            sgst,
            igst: zero,
            line_total,
        })
    } else {
        Ok(LineComputation {
            base_amount,
            discount,
            after_discount: after_discount.clone(),
            taxable: after_discount.clone(),
            cgst: zero.clone(),
            sgst: zero.clone(),
            igst: zero,
            line_total: after_discount,
        })
    }
}

/// Calculate all lines of a document, naming the offending line on failure
pub fn calculate_lines(
    lines: &[LineItemInput],
    gst_enabled: bool,
) -> EngineResult<Vec<LineComputation>> {
    if lines.is_empty() {
        return Err(EngineError::Validation(
            "document must have at least one line item".to_string(),
        ));
    }
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| calculate_line(index, line, gst_enabled))
        .collect()
}
