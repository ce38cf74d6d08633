//! Totals and utilization for a cargo list.
//!
//! The aggregator is a pure, total function: malformed rows never raise,
//! they contribute zero and are listed in `degraded_rows` instead.

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{CargoItem, ContainerClass, ContainerSpec};
use crate::types::{MM3_PER_M3, Weighted, lenient};

/// Totals for one category bucket.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub count: u64,
    pub volume_m3: f64,
    pub weight_kg: f64,
}

/// Derived totals for a cargo list against one container.
///
/// Utilization percentages are rounded to one decimal and never clamped:
/// values above 100 mean the cargo overflows the container.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub total_count: u64,
    pub total_volume_m3: f64,
    pub total_weight_kg: f64,
    pub container_volume_m3: f64,
    pub volume_utilization_pct: f64,
    pub weight_utilization_pct: f64,
    /// Category → totals, in first-seen order
    #[schema(value_type = std::collections::HashMap<String, CategoryTotals>)]
    pub categories: IndexMap<String, CategoryTotals>,
    /// Rows whose dimensions were unusable and therefore added no volume
    pub degraded_rows: Vec<usize>,
    /// Cargo volume exceeds the container volume
    pub volume_overflow: bool,
    /// Cargo weight exceeds the payload limit
    pub weight_overflow: bool,
}

/// Rounds to one decimal place.
#[inline]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamps a utilization percentage into `[0, 100]` for progress-bar fills.
#[inline]
pub fn display_fill_pct(pct: f64) -> f64 {
    if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 && whole.is_finite() {
        round_one_decimal(part / whole * 100.0)
    } else {
        0.0
    }
}

/// Computes totals, utilization and the category breakdown.
///
/// # Parameters
/// * `items` - Cargo rows in form order
/// * `container` - Capacity to measure utilization against
///
/// # Examples
/// ```
/// use sea_freight_loader::aggregate::aggregate;
/// use sea_freight_loader::model::{CargoItem, ContainerClass};
///
/// let items = vec![CargoItem::new(1000.0, 1000.0, 1000.0, 30.0, 24)];
/// let result = aggregate(&items, &ContainerClass::Truck.spec());
/// assert_eq!(result.total_volume_m3, 24.0);
/// assert_eq!(result.total_weight_kg, 720.0);
/// ```
pub fn aggregate(items: &[CargoItem], container: &ContainerSpec) -> AggregateResult {
    let mut total_count = 0u64;
    let mut total_volume_mm3 = 0.0;
    let mut total_weight_kg = 0.0;
    let mut categories: IndexMap<String, CategoryTotals> = IndexMap::new();
    let mut degraded_rows = Vec::new();

    for (row, item) in items.iter().enumerate() {
        let quantity = u64::from(item.quantity);
        let length = lenient::sanitize(item.length);
        let width = lenient::sanitize(item.width);
        let height = lenient::sanitize(item.height);
        if length == 0.0 || width == 0.0 || height == 0.0 {
            degraded_rows.push(row);
        }

        let volume_mm3 = length * width * height * quantity as f64;
        let weight_kg = lenient::sanitize(item.weight()) * quantity as f64;

        total_count += quantity;
        total_volume_mm3 += volume_mm3;
        total_weight_kg += weight_kg;

        let bucket = categories
            .entry(item.category_label().to_string())
            .or_default();
        bucket.count += quantity;
        bucket.volume_m3 += volume_mm3 / MM3_PER_M3;
        bucket.weight_kg += weight_kg;
    }

    let total_volume_m3 = total_volume_mm3 / MM3_PER_M3;
    let container_volume_m3 = container.volume_m3();
    let max_weight = lenient::sanitize(container.max_weight);

    if !degraded_rows.is_empty() {
        tracing::debug!(
            rows = ?degraded_rows,
            "cargo rows with unusable dimensions contribute no volume"
        );
    }

    let volume_utilization_pct = percentage(total_volume_m3, container_volume_m3);
    let weight_utilization_pct = percentage(total_weight_kg, max_weight);

    AggregateResult {
        total_count,
        total_volume_m3,
        total_weight_kg,
        container_volume_m3,
        volume_utilization_pct,
        weight_utilization_pct,
        categories,
        degraded_rows,
        volume_overflow: volume_utilization_pct > 100.0,
        weight_overflow: weight_utilization_pct > 100.0,
    }
}

/// Suggested shipping container for a set of totals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSuggestion {
    pub class: ContainerClass,
    /// `false` when even the largest class cannot take the cargo
    pub fits: bool,
}

/// Picks the smallest shipping class whose volume and payload take the totals.
///
/// Falls back to the largest class with `fits == false` on overflow.
pub fn suggest_container(total_volume_m3: f64, total_weight_kg: f64) -> ContainerSuggestion {
    ContainerClass::SHIPPING
        .iter()
        .find(|class| {
            let spec = class.spec();
            total_volume_m3 <= spec.volume_m3() && total_weight_kg <= spec.max_weight
        })
        .map(|class| ContainerSuggestion {
            class: *class,
            fits: true,
        })
        .unwrap_or(ContainerSuggestion {
            class: ContainerClass::FortyHighCube,
            fits: false,
        })
}
