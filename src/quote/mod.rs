//! Quote Calculator: turns parts, labor, fees, and tax into a breakdown.
//!
//! Submodules:
//! - `types`: Calculator inputs and the `Breakdown` output
//! - `calculator`: The pure `compute_breakdown` function and cent rounding

pub mod calculator;
pub mod types;

pub use calculator::{compute_breakdown, round_cents};
pub use types::{
    Breakdown, LaborBreakdown, LaborInput, LaborLine, LaborLineInput, PartLine, PartLineInput,
    PartsBreakdown, QuoteInputs, ShopFees,
};
