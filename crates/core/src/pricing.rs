use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::quote::{CostBreakdown, PricingSummary};

/// Largest absolute drift allowed between a supplied money value and its
/// recomputed counterpart: 0.01 currency units.
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PricingViolation {
    #[error("supplied total {supplied} does not match recomputed total {expected}")]
    TotalMismatch { expected: Decimal, supplied: Decimal },

    #[error("supplied subtotal {supplied} does not match category cost sum {expected}")]
    SubtotalMismatch { expected: Decimal, supplied: Decimal },

    #[error("`{component}` must not be negative (got {value})")]
    NegativeAmount { component: &'static str, value: Decimal },
}

/// Canonical total implied by a pricing summary:
/// `subtotal + agent_markup + taxes + fees - discount`.
pub fn expected_total(pricing: &PricingSummary) -> Decimal {
    pricing.subtotal + pricing.agent_markup + pricing.taxes + pricing.fees - pricing.discount
}

/// Fail-closed consistency check, run before every storage write that
/// carries money fields. Rejects negative amounts, a subtotal that drifts
/// from the category cost sum, and a total that disagrees with the
/// canonical recomputation.
pub fn validate(costs: &CostBreakdown, pricing: &PricingSummary) -> Result<(), PricingViolation> {
    for (component, value) in costs.components() {
        if value < Decimal::ZERO {
            return Err(PricingViolation::NegativeAmount { component, value });
        }
    }

    let summary_amounts = [
        ("subtotal", pricing.subtotal),
        ("agent_markup_percent", pricing.agent_markup_percent),
        ("agent_markup", pricing.agent_markup),
        ("taxes", pricing.taxes),
        ("fees", pricing.fees),
        ("discount", pricing.discount),
        ("total", pricing.total),
    ];
    for (component, value) in summary_amounts {
        if value < Decimal::ZERO {
            return Err(PricingViolation::NegativeAmount { component, value });
        }
    }

    let component_sum = costs.component_sum();
    if (component_sum - pricing.subtotal).abs() > PRICE_TOLERANCE {
        return Err(PricingViolation::SubtotalMismatch {
            expected: component_sum,
            supplied: pricing.subtotal,
        });
    }

    let expected = expected_total(pricing);
    if (expected - pricing.total).abs() > PRICE_TOLERANCE {
        return Err(PricingViolation::TotalMismatch { expected, supplied: pricing.total });
    }

    Ok(())
}
