//! Quote calculator: a pure function from [`QuoteInputs`] to [`Breakdown`].
//!
//! Every line amount and every component is rounded to cents (round-half-up)
//! before it is summed, so `total == labor + parts + shopFees + tax` holds
//! exactly. Nothing here touches the store.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::WorkflowError;

use super::types::{
    Breakdown, LaborBreakdown, LaborInput, LaborLine, PartLine, PartsBreakdown, QuoteInputs,
    ShopFees,
};

/// Round to two decimals, half away from zero, and pad the scale to two.
pub fn round_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Derive the breakdown for a set of inputs.
pub fn compute_breakdown(inputs: &QuoteInputs) -> Result<Breakdown, WorkflowError> {
    validate(inputs)?;

    let labor = match &inputs.labor {
        LaborInput::Itemized(lines) => {
            let items = lines
                .iter()
                .enumerate()
                .map(|(i, l)| {
                    Ok(LaborLine {
                        description: l.description.clone(),
                        hours: Some(l.hours),
                        rate: Some(l.rate),
                        amount: round_cents(product(
                            l.hours,
                            l.rate,
                            &format!("labor[{i}]"),
                        )?),
                    })
                })
                .collect::<Result<Vec<LaborLine>, WorkflowError>>()?;
            LaborBreakdown {
                total: round_cents(sum(items.iter().map(|l| l.amount), "labor.total")?),
                items,
            }
        }
        LaborInput::Flat(amount) => {
            let amount = round_cents(*amount);
            LaborBreakdown {
                total: amount,
                items: vec![LaborLine {
                    description: "Labor".to_string(),
                    hours: None,
                    rate: None,
                    amount,
                }],
            }
        }
    };

    let part_items = inputs
        .parts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Ok(PartLine {
                name: p.name.clone(),
                part_number: p.part_number.clone(),
                quantity: p.quantity,
                unit_price: p.unit_price,
                amount: round_cents(product(p.unit_price, p.quantity, &format!("parts[{i}]"))?),
            })
        })
        .collect::<Result<Vec<PartLine>, WorkflowError>>()?;
    let parts = PartsBreakdown {
        total: round_cents(sum(part_items.iter().map(|p| p.amount), "parts.total")?),
        items: part_items,
    };

    let shop_fees = ShopFees {
        total: round_cents(inputs.shop_fees),
    };

    let taxable = sum([labor.total, parts.total], "taxable")?;
    let tax = match inputs.tax_override {
        Some(explicit) => round_cents(explicit),
        None => round_cents(product(taxable, inputs.tax_rate, "tax")?),
    };

    let total = round_cents(sum(
        [labor.total, parts.total, shop_fees.total, tax],
        "total",
    )?);

    Ok(Breakdown {
        labor,
        parts,
        shop_fees,
        tax,
        total,
    })
}

fn product(a: Decimal, b: Decimal, field: &str) -> Result<Decimal, WorkflowError> {
    a.checked_mul(b)
        .ok_or_else(|| WorkflowError::validation(field, "amount out of range"))
}

fn sum(values: impl IntoIterator<Item = Decimal>, field: &str) -> Result<Decimal, WorkflowError> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| WorkflowError::validation(field, "amount out of range"))
    })
}

fn validate(inputs: &QuoteInputs) -> Result<(), WorkflowError> {
    match &inputs.labor {
        LaborInput::Itemized(lines) => {
            for (i, line) in lines.iter().enumerate() {
                if line.hours < Decimal::ZERO {
                    return Err(WorkflowError::validation(
                        format!("labor[{i}].hours"),
                        "must not be negative",
                    ));
                }
                if line.rate < Decimal::ZERO {
                    return Err(WorkflowError::validation(
                        format!("labor[{i}].rate"),
                        "must not be negative",
                    ));
                }
            }
        }
        LaborInput::Flat(amount) => {
            if *amount < Decimal::ZERO {
                return Err(WorkflowError::validation("laborTotal", "must not be negative"));
            }
        }
    }

    for (i, part) in inputs.parts.iter().enumerate() {
        if part.unit_price < Decimal::ZERO {
            return Err(WorkflowError::validation(
                format!("parts[{i}].unitPrice"),
                "must not be negative",
            ));
        }
        if part.quantity <= Decimal::ZERO {
            return Err(WorkflowError::validation(
                format!("parts[{i}].quantity"),
                "must be positive",
            ));
        }
    }

    if inputs.shop_fees < Decimal::ZERO {
        return Err(WorkflowError::validation("shopFees", "must not be negative"));
    }
    if inputs.tax_rate < Decimal::ZERO || inputs.tax_rate > Decimal::ONE {
        return Err(WorkflowError::validation(
            "taxRate",
            "must be a fraction between 0 and 1",
        ));
    }
    if matches!(inputs.tax_override, Some(t) if t < Decimal::ZERO) {
        return Err(WorkflowError::validation("tax", "must not be negative"));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
