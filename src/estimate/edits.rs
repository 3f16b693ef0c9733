//! Mechanic edits to an estimate's priced inputs.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::diagnostics::money;
use crate::diagnostics::types::{LaborItem, PartInfo};
use crate::errors::WorkflowError;
use crate::quote::{LaborInput, LaborLineInput, PartLineInput, QuoteInputs};

/// Changes a mechanic can make. All optional; at least one is required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateEdits {
    /// Collapse labor into one line with these hours.
    #[serde(default, alias = "labor_hours", deserialize_with = "money::de_opt_amount")]
    pub labor_hours: Option<Decimal>,
    /// Collapse labor into one line at this rate.
    #[serde(default, alias = "labor_rate", deserialize_with = "money::de_opt_amount")]
    pub labor_rate: Option<Decimal>,
    /// Replace itemized labor.
    #[serde(default, alias = "labor_items")]
    pub labor_items: Option<Vec<LaborItem>>,
    /// Replace labor with a flat amount.
    #[serde(default, alias = "labor_total", deserialize_with = "money::de_opt_amount")]
    pub labor_total: Option<Decimal>,
    /// Replace all part lines.
    #[serde(default)]
    pub parts: Option<Vec<PartInfo>>,
    #[serde(default, alias = "shop_fees", deserialize_with = "money::de_opt_amount")]
    pub shop_fees: Option<Decimal>,
    #[serde(default, alias = "tax_rate", deserialize_with = "money::de_opt_amount")]
    pub tax_rate: Option<Decimal>,
    /// Explicit tax amount, used verbatim.
    #[serde(default, deserialize_with = "money::de_opt_amount")]
    pub tax: Option<Decimal>,
    /// A blank option counts as absent.
    #[serde(default, alias = "selected_option", deserialize_with = "de_opt_text")]
    pub selected_option: Option<String>,
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}

impl EstimateEdits {
    pub fn is_empty(&self) -> bool {
        self.labor_hours.is_none()
            && self.labor_rate.is_none()
            && self.labor_items.is_none()
            && self.labor_total.is_none()
            && self.parts.is_none()
            && self.shop_fees.is_none()
            && self.tax_rate.is_none()
            && self.tax.is_none()
            && self.selected_option.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    /// Reject empty or self-contradictory edits before anything is loaded.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.is_empty() {
            return Err(WorkflowError::validation("edits", "at least one edit is required"));
        }

        let collapse = self.labor_hours.is_some() || self.labor_rate.is_some();
        let labor_modes = [collapse, self.labor_items.is_some(), self.labor_total.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if labor_modes > 1 {
            return Err(WorkflowError::validation(
                "edits",
                "use only one of laborHours/laborRate, laborItems, or laborTotal",
            ));
        }

        if let Some(rate) = self.tax_rate {
            if rate > Decimal::ONE {
                return Err(WorkflowError::validation(
                    "edits.taxRate",
                    format!("{rate} must be between 0 and 1"),
                ));
            }
        }
        if let Some(items) = &self.labor_items {
            for (i, item) in items.iter().enumerate() {
                if item.task.trim().is_empty() {
                    return Err(WorkflowError::validation(
                        format!("edits.laborItems[{i}].task"),
                        "must not be blank",
                    ));
                }
            }
        }
        if let Some(parts) = &self.parts {
            for (i, part) in parts.iter().enumerate() {
                if part.part_name.trim().is_empty() {
                    return Err(WorkflowError::validation(
                        format!("edits.parts[{i}].partName"),
                        "must not be blank",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Produce new calculator inputs from the current ones.
    ///
    /// A new `taxRate` without an explicit `tax` drops any earlier override.
    pub fn apply(
        &self,
        current: &QuoteInputs,
        default_labor_rate: Decimal,
    ) -> Result<QuoteInputs, WorkflowError> {
        let mut next = current.clone();

        if self.labor_hours.is_some() || self.labor_rate.is_some() {
            let hours = self
                .labor_hours
                .or_else(|| current.labor.total_hours())
                .ok_or_else(|| {
                    WorkflowError::validation(
                        "edits.laborHours",
                        "required when current labor is a flat amount",
                    )
                })?;
            let rate = self
                .labor_rate
                .or_else(|| current.labor.first_rate())
                .unwrap_or(default_labor_rate);
            let description = match &current.labor {
                LaborInput::Itemized(lines) if lines.len() == 1 => lines[0].description.clone(),
                _ => "Labor".to_string(),
            };
            next.labor = LaborInput::Itemized(vec![LaborLineInput {
                description,
                hours,
                rate,
            }]);
        }

        if let Some(items) = &self.labor_items {
            next.labor = LaborInput::Itemized(labor_lines(items, default_labor_rate));
        }
        if let Some(total) = self.labor_total {
            next.labor = LaborInput::Flat(total);
        }
        if let Some(parts) = &self.parts {
            next.parts = part_lines(parts);
        }
        if let Some(fees) = self.shop_fees {
            next.shop_fees = fees;
        }
        if let Some(rate) = self.tax_rate {
            next.tax_rate = rate;
            next.tax_override = None;
        }
        if let Some(tax) = self.tax {
            next.tax_override = Some(tax);
        }

        Ok(next)
    }
}

/// Price captured labor items, filling missing rates with the shop default.
pub fn labor_lines(items: &[LaborItem], default_rate: Decimal) -> Vec<LaborLineInput> {
    items
        .iter()
        .map(|item| LaborLineInput {
            description: item.task.clone(),
            hours: item.hours,
            rate: item.rate.unwrap_or(default_rate),
        })
        .collect()
}

pub fn part_lines(parts: &[PartInfo]) -> Vec<PartLineInput> {
    parts
        .iter()
        .map(|p| PartLineInput {
            name: p.part_name.clone(),
            part_number: p.part_number.clone(),
            unit_price: p.estimated_price,
            quantity: p.quantity,
        })
        .collect()
}
