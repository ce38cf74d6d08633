//! Data models for the load calculator.
//!
//! This module defines the plain records the rest of the crate works on:
//! - `CargoItem`: one row of the cargo form (dimensions, weight, quantity)
//! - `ContainerSpec`: the bounding volume and payload ceiling
//! - `ContainerClass`: the shipping container and truck presets
//! - `CargoUnit`: one physical unit after quantity expansion
//!
//! Dimensions are millimetres, weights kilograms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Dimensional, Vec3, Weighted, lenient};

/// Category bucket for items that carry no category of their own.
pub const UNSPECIFIED_CATEGORY: &str = "Unspecified";

/// Validation error for container data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidWeight(format!(
            "Maximum weight must be positive, got: {}",
            value
        )));
    }
    Ok(())
}

/// One cargo row as submitted by the form layer.
///
/// Every numeric field deserializes leniently: numbers, numeric strings and
/// garbage are all accepted, and anything unusable becomes `0`. A row with
/// a zero dimension still counts and weighs, it just contributes no volume.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "name": "Bag",
    "length": 1000.0,
    "width": 1000.0,
    "height": 1000.0,
    "weight": 30.0,
    "quantity": 24,
    "isFragile": false,
    "category": "Sacks"
}))]
pub struct CargoItem {
    #[serde(default)]
    pub name: Option<String>,
    /// Length in mm
    #[serde(default, deserialize_with = "lenient::number")]
    pub length: f64,
    /// Width in mm
    #[serde(default, deserialize_with = "lenient::number")]
    pub width: f64,
    /// Height in mm
    #[serde(default, deserialize_with = "lenient::number")]
    pub height: f64,
    /// Weight of a single unit in kg
    #[serde(default, deserialize_with = "lenient::number")]
    pub weight: f64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity: u32,
    #[serde(default)]
    pub is_fragile: bool,
    #[serde(default, alias = "type")]
    pub category: Option<String>,
}

impl CargoItem {
    /// Creates a regular, uncategorised item.
    pub fn new(length: f64, width: f64, height: f64, weight: f64, quantity: u32) -> Self {
        Self {
            name: None,
            length: lenient::sanitize(length),
            width: lenient::sanitize(width),
            height: lenient::sanitize(height),
            weight: lenient::sanitize(weight),
            quantity,
            is_fragile: false,
            category: None,
        }
    }

    /// Sets the category label.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Marks the item as fragile.
    pub fn fragile(mut self) -> Self {
        self.is_fragile = true;
        self
    }

    /// Whether all three dimensions are usable (positive and finite).
    pub fn has_valid_dimensions(&self) -> bool {
        self.dimensions().is_valid_dimension()
    }

    /// Category bucket this item falls into; blank labels count as unspecified.
    pub fn category_label(&self) -> &str {
        match self.category.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label,
            _ => UNSPECIFIED_CATEGORY,
        }
    }
}

impl Dimensional for CargoItem {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }
}

impl Weighted for CargoItem {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Bounding volume and payload ceiling of a container or truck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "label": "Truck",
    "length": 13600.0,
    "width": 2500.0,
    "height": 2650.0,
    "maxWeight": 24500.0
}))]
pub struct ContainerSpec {
    #[serde(default)]
    pub label: Option<String>,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_weight: f64,
}

impl ContainerSpec {
    /// Creates a container spec with validation.
    ///
    /// # Examples
    /// ```
    /// use sea_freight_loader::model::ContainerSpec;
    ///
    /// assert!(ContainerSpec::new(13600.0, 2500.0, 2650.0, 24500.0).is_ok());
    /// assert!(ContainerSpec::new(0.0, 2500.0, 2650.0, 24500.0).is_err());
    /// ```
    pub fn new(
        length: f64,
        width: f64,
        height: f64,
        max_weight: f64,
    ) -> Result<Self, ValidationError> {
        let spec = Self {
            label: None,
            length,
            width,
            height,
            max_weight,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Checks the dimensions and the weight limit.
    ///
    /// Deserialized specs are not validated automatically; the HTTP layer
    /// calls this before building a visualization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Container length")?;
        validate_dimension(self.width, "Container width")?;
        validate_dimension(self.height, "Container height")?;
        validate_weight_value(self.max_weight)?;
        Ok(())
    }

    /// Attaches a display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Usable volume in m³, or `0.0` when any dimension is unusable.
    pub fn volume_m3(&self) -> f64 {
        let dims = self.dimensions();
        if !dims.is_valid_dimension() {
            return 0.0;
        }
        dims.volume() / crate::types::MM3_PER_M3
    }
}

impl Default for ContainerSpec {
    fn default() -> Self {
        ContainerClass::Truck.spec()
    }
}

impl Dimensional for ContainerSpec {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }
}

/// Known container and trailer presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ContainerClass {
    #[serde(rename = "20ft")]
    TwentyFoot,
    #[serde(rename = "40ft")]
    FortyFoot,
    #[serde(rename = "40HC")]
    FortyHighCube,
    #[serde(rename = "truck")]
    Truck,
}

impl ContainerClass {
    /// Shipping container classes, smallest first. The truck trailer is not a suggestion target.
    pub const SHIPPING: [ContainerClass; 3] = [
        ContainerClass::TwentyFoot,
        ContainerClass::FortyFoot,
        ContainerClass::FortyHighCube,
    ];

    pub const ALL: [ContainerClass; 4] = [
        ContainerClass::TwentyFoot,
        ContainerClass::FortyFoot,
        ContainerClass::FortyHighCube,
        ContainerClass::Truck,
    ];

    /// Short label as used in the form and by the remote calculator.
    pub fn label(&self) -> &'static str {
        match self {
            ContainerClass::TwentyFoot => "20ft",
            ContainerClass::FortyFoot => "40ft",
            ContainerClass::FortyHighCube => "40HC",
            ContainerClass::Truck => "truck",
        }
    }

    /// Interior dimensions and payload for the preset.
    pub fn spec(&self) -> ContainerSpec {
        let (length, width, height, max_weight) = match self {
            ContainerClass::TwentyFoot => (5900.0, 2350.0, 2390.0, 28200.0),
            ContainerClass::FortyFoot => (12030.0, 2350.0, 2390.0, 26700.0),
            ContainerClass::FortyHighCube => (12030.0, 2350.0, 2690.0, 26500.0),
            ContainerClass::Truck => (13600.0, 2500.0, 2650.0, 24500.0),
        };
        ContainerSpec {
            label: Some(self.label().to_string()),
            length,
            width,
            height,
            max_weight,
        }
    }
}

impl fmt::Display for ContainerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContainerClass {
    type Err = ValidationError;

    /// Parses free-form class names such as `"1 x 40ft Standard"`.
    ///
    /// High-cube markers win over plain `40ft`, since `"40ft HC"` contains both.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.contains("hc") || lowered.contains("high cube") {
            Ok(ContainerClass::FortyHighCube)
        } else if lowered.contains("20ft") || lowered.contains("20'") {
            Ok(ContainerClass::TwentyFoot)
        } else if lowered.contains("40ft") || lowered.contains("40'") {
            Ok(ContainerClass::FortyFoot)
        } else if lowered.contains("truck") || lowered.contains("trailer") {
            Ok(ContainerClass::Truck)
        } else {
            Err(ValidationError::InvalidDimension(format!(
                "unknown container class '{}'",
                raw
            )))
        }
    }
}

/// One physical unit after expanding a row's quantity.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CargoUnit {
    /// Position in the expanded sequence (also the animation order)
    pub index: usize,
    /// Index of the originating `CargoItem` row
    pub row: usize,
    pub fragile: bool,
    pub category: String,
}

/// Expands item rows into physical units, row order first, then unit order.
///
/// Lazy, so callers can stop at the grid capacity without materialising
/// huge quantities.
pub fn expand_units(items: &[CargoItem]) -> impl Iterator<Item = CargoUnit> + '_ {
    items
        .iter()
        .enumerate()
        .flat_map(|(row, item)| (0..item.quantity).map(move |_| (row, item)))
        .enumerate()
        .map(|(index, (row, item))| CargoUnit {
            index,
            row,
            fragile: item.is_fragile,
            category: item.category_label().to_string(),
        })
}

/// Total number of physical units across all rows.
pub fn unit_count(items: &[CargoItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cargo_item_parses_form_strings() {
        let json = r#"{
            "name": "Bag",
            "length": "1000",
            "width": 800,
            "height": "",
            "weight": "abc",
            "quantity": "3",
            "isFragile": true,
            "type": "Sacks"
        }"#;
        let item: CargoItem = serde_json::from_str(json).expect("lenient parse");
        assert_eq!(item.length, 1000.0);
        assert_eq!(item.width, 800.0);
        assert_eq!(item.height, 0.0);
        assert_eq!(item.weight, 0.0);
        assert_eq!(item.quantity, 3);
        assert!(item.is_fragile);
        assert_eq!(item.category_label(), "Sacks");
        assert!(!item.has_valid_dimensions());
    }

    #[test]
    fn cargo_item_missing_fields_default_to_zero() {
        let item: CargoItem = serde_json::from_str("{}").unwrap();
        assert_eq!(item.quantity, 0);
        assert_eq!(item.length, 0.0);
        assert_eq!(item.category_label(), UNSPECIFIED_CATEGORY);
    }

    #[test]
    fn negative_and_fractional_quantities_are_floored() {
        let negative: CargoItem = serde_json::from_str(r#"{"quantity": -4}"#).unwrap();
        let fractional: CargoItem = serde_json::from_str(r#"{"quantity": "2.9"}"#).unwrap();
        assert_eq!(negative.quantity, 0);
        assert_eq!(fractional.quantity, 2);
    }

    #[test]
    fn blank_category_is_unspecified() {
        let item = CargoItem::new(1.0, 1.0, 1.0, 1.0, 1).with_category("   ");
        assert_eq!(item.category_label(), UNSPECIFIED_CATEGORY);
    }

    #[test]
    fn container_spec_rejects_invalid_values() {
        assert!(matches!(
            ContainerSpec::new(-1.0, 1.0, 1.0, 1.0),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(matches!(
            ContainerSpec::new(1.0, 1.0, 1.0, f64::NAN),
            Err(ValidationError::InvalidWeight(_))
        ));
    }

    #[test]
    fn truck_preset_volume() {
        let truck = ContainerClass::Truck.spec();
        assert!((truck.volume_m3() - 90.1).abs() < 1e-9);
        assert_eq!(ContainerSpec::default(), truck);
    }

    #[test]
    fn container_class_parses_free_form_labels() {
        assert_eq!(
            "1 x 20ft Standard".parse::<ContainerClass>(),
            Ok(ContainerClass::TwentyFoot)
        );
        assert_eq!("40ft".parse::<ContainerClass>(), Ok(ContainerClass::FortyFoot));
        assert_eq!(
            "40ft HC".parse::<ContainerClass>(),
            Ok(ContainerClass::FortyHighCube)
        );
        assert!("pallet".parse::<ContainerClass>().is_err());
    }

    #[test]
    fn expand_units_follows_row_then_unit_order() {
        let items = vec![
            CargoItem::new(1.0, 1.0, 1.0, 1.0, 2).with_category("A"),
            CargoItem::new(1.0, 1.0, 1.0, 1.0, 0),
            CargoItem::new(1.0, 1.0, 1.0, 1.0, 1).fragile(),
        ];
        let units: Vec<_> = expand_units(&items).collect();
        assert_eq!(units.len(), 3);
        assert_eq!(
            units.iter().map(|u| (u.index, u.row)).collect::<Vec<_>>(),
            vec![(0, 0), (1, 0), (2, 2)]
        );
        assert_eq!(units[0].category, "A");
        assert!(units[2].fragile);
        assert_eq!(unit_count(&items), 3);
    }
}
