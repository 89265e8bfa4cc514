//! Template vocabulary of the estimate letterpad.

use chrono::{Datelike, Local};

use crate::estimate::model::{format_money, Estimate};

pub const PARTY_NAME: &str = "<partyname>";
pub const DATE: &str = "<date>";
pub const PAVER_BLOCK_TYPE: &str = "<paverblocktype>";
pub const PRICE: &str = "<rate1>";
pub const GST_AMOUNT: &str = "<rate2>";
pub const TRANSPORTATION_LEGACY: &str = "<rate3>";
pub const TRANSPORTATION: &str = "<rate4>";
pub const LOADING_UNLOADING: &str = "<rate5>";
pub const TOTAL: &str = "<rate>";
pub const YEAR: &str = "<year>";
pub const NOTES: &str = "<NOTE>";

/// Token to value mapping for one estimate.
///
/// Older letterpads print the transport charge at `<rate3>`, newer ones at
/// `<rate4>`; both carry the same value. `<rate5>` is always the
/// loading/unloading cost. Amounts are rendered with two decimal places and
/// dates in ISO format.
pub fn build_placeholder_map(
    estimate: &Estimate,
    paver_block_type: &str,
    year: i32,
) -> Vec<(String, String)> {
    let transportation = format_money(estimate.transportation_charge);
    vec![
        (PARTY_NAME.to_string(), estimate.party_name.clone()),
        (DATE.to_string(), estimate.date.format("%Y-%m-%d").to_string()),
        (PAVER_BLOCK_TYPE.to_string(), paver_block_type.to_string()),
        (PRICE.to_string(), format_money(estimate.price)),
        (GST_AMOUNT.to_string(), format_money(estimate.gst_amount)),
        (TRANSPORTATION_LEGACY.to_string(), transportation.clone()),
        (TRANSPORTATION.to_string(), transportation),
        (
            LOADING_UNLOADING.to_string(),
            format_money(estimate.loading_unloading_cost),
        ),
        (TOTAL.to_string(), format_money(estimate.total_amount)),
        (YEAR.to_string(), year.to_string()),
        (NOTES.to_string(), estimate.notes.clone()),
    ]
}

/// The calendar year printed on generated documents.
pub fn current_year() -> i32 {
    Local::now().year()
}
