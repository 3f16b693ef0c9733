//! Calculator inputs and the breakdown it produces.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─── Inputs ─────────────────────────────────────────────────────────────────

/// One labor line to be priced as `hours × rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborLineInput {
    pub description: String,
    pub hours: Decimal,
    pub rate: Decimal,
}

/// Labor is either itemized or a single flat amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum LaborInput {
    Itemized(Vec<LaborLineInput>),
    Flat(Decimal),
}

impl LaborInput {
    /// Sum of hours across itemized lines (`None` for flat labor).
    pub fn total_hours(&self) -> Option<Decimal> {
        match self {
            LaborInput::Itemized(lines) => Some(lines.iter().map(|l| l.hours).sum()),
            LaborInput::Flat(_) => None,
        }
    }

    /// The rate of the first itemized line, if any.
    pub fn first_rate(&self) -> Option<Decimal> {
        match self {
            LaborInput::Itemized(lines) => lines.first().map(|l| l.rate),
            LaborInput::Flat(_) => None,
        }
    }
}

/// One part line to be priced as `unit_price × quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartLineInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    pub unit_price: Decimal,
    pub quantity: Decimal,
}

/// Everything the calculator needs. The editable half of a CostEstimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInputs {
    pub labor: LaborInput,
    pub parts: Vec<PartLineInput>,
    pub shop_fees: Decimal,
    /// Fraction, e.g. `0.0825` for 8.25 %.
    pub tax_rate: Decimal,
    /// When set, used verbatim instead of `taxable × tax_rate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_override: Option<Decimal>,
}

// ─── Breakdown ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborLine {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborBreakdown {
    pub total: Decimal,
    pub items: Vec<LaborLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartLine {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartsBreakdown {
    pub total: Decimal,
    pub items: Vec<PartLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopFees {
    pub total: Decimal,
}

/// Structured cost decomposition. All amounts carry exactly two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub labor: LaborBreakdown,
    pub parts: PartsBreakdown,
    pub shop_fees: ShopFees,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Breakdown {
    /// `labor + parts + shopFees + tax`, independent of the stored total.
    pub fn component_sum(&self) -> Decimal {
        self.labor.total + self.parts.total + self.shop_fees.total + self.tax
    }

    /// Whether the stored total matches its components to the cent.
    pub fn is_balanced(&self) -> bool {
        self.total == self.component_sum()
    }
}
