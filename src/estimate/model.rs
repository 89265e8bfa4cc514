use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::validation::{
    validate_amount, validate_percentage, validate_required, ValidationErrors,
};

/// Money columns are `decimal(10,2)`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);
/// Percentage columns are `decimal(5,2)`.
pub const MAX_PERCENTAGE: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Rounds to two places, half away from zero ("round half up" for the
/// non-negative amounts stored here).
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Formats a stored amount the way it appears on a quotation, always with two places.
pub fn format_money(value: Decimal) -> String {
    round_money(value).to_string()
}

/// Derived monetary fields of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAmounts {
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
}

/// `gst_amount = round(price * gst_percentage / 100, 2)` and
/// `total_amount = price + gst_amount + transportation_charge + loading_unloading_cost`.
pub fn compute_derived_fields(
    price: Decimal,
    gst_percentage: Decimal,
    transportation_charge: Decimal,
    loading_unloading_cost: Decimal,
) -> DerivedAmounts {
    let gst_amount = round_money(price * gst_percentage / HUNDRED);
    let total_amount =
        round_money(price + gst_amount + transportation_charge + loading_unloading_cost);
    DerivedAmounts {
        gst_amount,
        total_amount,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, sqlx::FromRow)]
pub struct PaverBlockType {
    pub id: i64,
    #[schema(example = "Zig-Zag 60mm")]
    pub name: String,
    #[schema(example = "Grey, 60mm thickness")]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a paver block type.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaverBlockTypeForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl PaverBlockTypeForm {
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = ValidationErrors::new();
        validate_required(&self.name, "name", "Paver block name", &mut errors);
        if self.name.chars().count() > 100 {
            errors.add(super::validation::ValidationError::too_long("name", 100));
        }
        errors.into_result()
    }
}

/// A persisted estimate. `gst_amount` and `total_amount` are always the
/// values computed when the record was last saved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, sqlx::FromRow)]
pub struct Estimate {
    pub id: i64,
    #[schema(example = "Acme Co")]
    pub party_name: String,
    #[schema(value_type = String, format = Date, example = "2025-11-05")]
    pub date: NaiveDate,
    pub paver_block_type_id: i64,
    #[schema(value_type = String, example = "1000.00")]
    pub price: Decimal,
    #[schema(value_type = String, example = "18.00")]
    pub gst_percentage: Decimal,
    #[schema(value_type = String, example = "180.00")]
    pub gst_amount: Decimal,
    #[schema(value_type = String, example = "200.00")]
    pub transportation_charge: Decimal,
    #[schema(value_type = String, example = "100.00")]
    pub loading_unloading_cost: Decimal,
    #[schema(value_type = String, example = "1480.00")]
    pub total_amount: Decimal,
    pub notes: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied estimate fields. Derived amounts are not part of the
/// input; any `gst_amount`/`total_amount` sent by a client is ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EstimateForm {
    pub party_name: String,
    #[schema(value_type = String, format = Date, example = "2025-11-05")]
    pub date: NaiveDate,
    pub paver_block_type: i64,
    #[schema(value_type = String, example = "1000.00")]
    pub price: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "18.00")]
    pub gst_percentage: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "200.00")]
    pub transportation_charge: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "100.00")]
    pub loading_unloading_cost: Decimal,
    #[serde(default)]
    pub notes: String,
}

/// Estimate fields that passed validation, normalised to their column scale,
/// with the derived amounts already computed. The store only accepts this
/// type, so every insert and update goes through `compute_derived_fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEstimate {
    party_name: String,
    date: NaiveDate,
    paver_block_type_id: i64,
    price: Decimal,
    gst_percentage: Decimal,
    transportation_charge: Decimal,
    loading_unloading_cost: Decimal,
    notes: String,
    derived: DerivedAmounts,
}

impl EstimateForm {
    pub fn validate(self) -> Result<ValidatedEstimate, String> {
        let mut errors = ValidationErrors::new();

        validate_required(&self.party_name, "party_name", "Party name", &mut errors);
        if self.party_name.chars().count() > 200 {
            errors.add(super::validation::ValidationError::too_long(
                "party_name",
                200,
            ));
        }
        validate_amount(self.price, "price", "Price", &mut errors);
        validate_percentage(self.gst_percentage, "gst_percentage", &mut errors);
        validate_amount(
            self.transportation_charge,
            "transportation_charge",
            "Transportation charge",
            &mut errors,
        );
        validate_amount(
            self.loading_unloading_cost,
            "loading_unloading_cost",
            "Loading/unloading cost",
            &mut errors,
        );
        errors.into_result()?;

        let validated = ValidatedEstimate::new(
            self.party_name.trim().to_string(),
            self.date,
            self.paver_block_type,
            self.price,
            self.gst_percentage,
            self.transportation_charge,
            self.loading_unloading_cost,
            self.notes,
        );

        // Each input fits its column, the derived sums may not.
        let mut errors = ValidationErrors::new();
        validate_amount(validated.gst_amount(), "gst_amount", "GST amount", &mut errors);
        validate_amount(
            validated.total_amount(),
            "total_amount",
            "Total amount",
            &mut errors,
        );
        errors.into_result()?;

        Ok(validated)
    }
}

impl ValidatedEstimate {
    #[allow(clippy::too_many_arguments)]
    fn new(
        party_name: String,
        date: NaiveDate,
        paver_block_type_id: i64,
        price: Decimal,
        gst_percentage: Decimal,
        transportation_charge: Decimal,
        loading_unloading_cost: Decimal,
        notes: String,
    ) -> Self {
        let price = round_money(price);
        let gst_percentage = round_money(gst_percentage);
        let transportation_charge = round_money(transportation_charge);
        let loading_unloading_cost = round_money(loading_unloading_cost);
        let derived = compute_derived_fields(
            price,
            gst_percentage,
            transportation_charge,
            loading_unloading_cost,
        );

        Self {
            party_name,
            date,
            paver_block_type_id,
            price,
            gst_percentage,
            transportation_charge,
            loading_unloading_cost,
            notes,
            derived,
        }
    }

    pub fn party_name(&self) -> &str {
        &self.party_name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn paver_block_type_id(&self) -> i64 {
        self.paver_block_type_id
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn gst_percentage(&self) -> Decimal {
        self.gst_percentage
    }

    pub fn transportation_charge(&self) -> Decimal {
        self.transportation_charge
    }

    pub fn loading_unloading_cost(&self) -> Decimal {
        self.loading_unloading_cost
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn gst_amount(&self) -> Decimal {
        self.derived.gst_amount
    }

    pub fn total_amount(&self) -> Decimal {
        self.derived.total_amount
    }

    /// Builds the persisted record. Used by stores that assign ids and
    /// timestamps themselves.
    pub fn to_estimate(
        &self,
        id: i64,
        created_by: Uuid,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Estimate {
        Estimate {
            id,
            party_name: self.party_name.clone(),
            date: self.date,
            paver_block_type_id: self.paver_block_type_id,
            price: self.price,
            gst_percentage: self.gst_percentage,
            gst_amount: self.derived.gst_amount,
            transportation_charge: self.transportation_charge,
            loading_unloading_cost: self.loading_unloading_cost,
            total_amount: self.derived.total_amount,
            notes: self.notes.clone(),
            created_by,
            created_at,
            updated_at,
        }
    }
}

/// Dashboard row.
#[derive(Debug, Serialize, ToSchema)]
pub struct EstimateSummary {
    pub id: i64,
    pub party_name: String,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Estimate> for EstimateSummary {
    fn from(estimate: &Estimate) -> Self {
        Self {
            id: estimate.id,
            party_name: estimate.party_name.clone(),
            date: estimate.date,
            total_amount: estimate.total_amount,
            created_at: estimate.created_at,
        }
    }
}

/// Shown before a destructive delete is confirmed.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteConfirmation {
    pub id: i64,
    pub name: String,
    /// Estimates removed along with the target (paver block deletes cascade).
    pub cascaded_estimates: i64,
    pub warning: String,
}
