//! Document-level totals aggregation

use bigdecimal::BigDecimal;

use crate::tax::gst::{round_money, LineComputation};
use crate::types::*;

/// Fold unrounded line computations into document totals
///
/// The fold always runs over every line; totals are never patched
/// incrementally after a line change. Each output field is rounded once,
/// after summation. `round_off` is applied only when the caller passes
/// one (the engine gates this on its round-off option).
pub fn aggregate(lines: &[LineComputation], round_off: Option<&BigDecimal>) -> Totals {
    let zero = BigDecimal::from(0);

    let subtotal: BigDecimal = lines.iter().map(|l| &l.base_amount).sum();
    let total_discount: BigDecimal = lines.iter().map(|l| &l.discount).sum();
    let total_taxable: BigDecimal = lines.iter().map(|l| &l.taxable).sum();
    let total_tax: BigDecimal = lines.iter().map(|l| l.total_tax()).sum();
    let line_total_sum: BigDecimal = lines.iter().map(|l| &l.line_total).sum();

    let round_off = round_off.cloned().unwrap_or(zero);
    let final_total = &line_total_sum + &round_off;

    Totals {
        subtotal: round_money(&subtotal),
        total_discount: round_money(&total_discount),
        total_taxable: round_money(&total_taxable),
        total_tax: round_money(&total_tax),
        round_off: round_money(&round_off),
        final_total: round_money(&final_total),
    }
}

/// Verify stored totals against a fresh fold of the same lines
///
/// Disagreement beyond rounding tolerance (0.01) means the document would
/// be internally inconsistent and must not be persisted.
pub fn verify(totals: &Totals, lines: &[LineComputation]) -> EngineResult<()> {
    let line_total_sum: BigDecimal = lines.iter().map(|l| &l.line_total).sum();
    let expected = round_money(&(&line_total_sum + &totals.round_off));

    let tolerance = BigDecimal::new(1.into(), 2); // 0.01
    let drift = (&totals.final_total - &expected).abs();
    if drift > tolerance {
        return Err(EngineError::Fatal(format!(
            "final total {} disagrees with summed line totals {}",
            totals.final_total, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::gst::calculate_lines;

    fn lines() -> Vec<LineItemInput> {
        vec![
            LineItemInput::new(
                "Widget".to_string(),
                BigDecimal::from(10),
                BigDecimal::from(100),
                BigDecimal::from(18),
                TaxMode::Exclusive,
            ),
            LineItemInput::new(
                "Gadget".to_string(),
                BigDecimal::from(1),
                BigDecimal::from(1180),
                BigDecimal::from(18),
                TaxMode::Inclusive,
            ),
        ]
    }

    #[test]
    fn aggregates_mixed_mode_lines() {
        let comps = calculate_lines(&lines(), true).unwrap();
        let totals = aggregate(&comps, None);

        // exclusive line contributes 1180, inclusive line 1180
        assert_eq!(totals.final_total, BigDecimal::from(2360));
        // taxable: 1000 + 1000
        assert_eq!(totals.total_taxable, BigDecimal::from(2000));
        // tax: 180 + 180
        assert_eq!(totals.total_tax, BigDecimal::from(360));
        assert_eq!(totals.round_off, BigDecimal::from(0));
    }

    #[test]
    fn round_off_shifts_final_total() {
        let comps = calculate_lines(&lines(), true).unwrap();
        let round_off = BigDecimal::new((-40).into(), 2); // -0.40
        let totals = aggregate(&comps, Some(&round_off));

        let expected = BigDecimal::from(2360) + &round_off;
        assert_eq!(totals.final_total, expected);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let comps = calculate_lines(&lines(), true).unwrap();
        let first = aggregate(&comps, None);
        let second = aggregate(&comps, None);
        assert_eq!(first, second);
    }

    #[test]
    fn verify_accepts_consistent_totals() {
        let comps = calculate_lines(&lines(), true).unwrap();
        let totals = aggregate(&comps, None);
        assert!(verify(&totals, &comps).is_ok());
    }

    #[test]
    fn verify_rejects_drifted_totals() {
        let comps = calculate_lines(&lines(), true).unwrap();
        let mut totals = aggregate(&comps, None);
        totals.final_total += BigDecimal::from(5);

        let err = verify(&totals, &comps).unwrap_err();
        assert!(matches!(err, EngineError::Fatal(_)));
    }
}
