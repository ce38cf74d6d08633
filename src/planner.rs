//! Coarse grid layout for the load visualization.
//!
//! Every physical unit gets one uniform cube slot on a fixed-pitch grid.
//! This is not a packing optimizer: slot size ignores the
//! actual item size, and units beyond the grid capacity stay unplaced.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::ContainerSpec;
use crate::types::{BoundingBox, Dimensional, Vec3};

/// Parameters of the slot grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Upper bound for the cube edge in mm; the effective edge is also capped at a quarter of the width
    pub max_slot_size: f64,
    /// Gap between neighbouring slots and between the grid and the walls, in mm
    pub spacing: f64,
    /// Most slots a single plan materialises; units beyond it stay unplaced
    pub max_slots: usize,
}

impl LayoutConfig {
    pub const DEFAULT_MAX_SLOT_SIZE: f64 = 300.0;
    pub const DEFAULT_SPACING: f64 = 50.0;
    pub const DEFAULT_MAX_SLOTS: usize = 5_000;
    /// Smallest slot edge accepted from callers, in mm
    pub const MIN_SLOT_SIZE: f64 = 10.0;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> LayoutConfigBuilder {
        LayoutConfigBuilder::default()
    }

    /// Cube edge used for `container`: `min(max_slot_size, width / 4)`.
    pub fn slot_size_for(&self, container: &ContainerSpec) -> f64 {
        self.max_slot_size.min(container.width / 4.0)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_slot_size: Self::DEFAULT_MAX_SLOT_SIZE,
            spacing: Self::DEFAULT_SPACING,
            max_slots: Self::DEFAULT_MAX_SLOTS,
        }
    }
}

/// Builder for `LayoutConfig`.
#[derive(Clone, Debug, Default)]
pub struct LayoutConfigBuilder {
    config: LayoutConfig,
}

impl LayoutConfigBuilder {
    /// Sets the upper bound for the slot edge.
    pub fn max_slot_size(mut self, size: f64) -> Self {
        self.config.max_slot_size = size;
        self
    }

    /// Sets the spacing between slots.
    pub fn spacing(mut self, spacing: f64) -> Self {
        self.config.spacing = spacing;
        self
    }

    /// Sets the ceiling on materialised slots.
    pub fn max_slots(mut self, max_slots: usize) -> Self {
        self.config.max_slots = max_slots;
        self
    }

    pub fn build(self) -> LayoutConfig {
        self.config
    }
}

/// Slot counts per axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    pub per_length: usize,
    pub per_width: usize,
    pub per_height: usize,
}

impl GridLayout {
    /// Total number of slots in the grid.
    pub fn capacity(&self) -> usize {
        self.per_length
            .saturating_mul(self.per_width)
            .saturating_mul(self.per_height)
    }
}

/// One grid cell assigned to a physical unit.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlannedSlot {
    /// Index of the physical unit (after quantity expansion)
    pub item_index: usize,
    /// Slot centre relative to the container centre
    #[schema(value_type = [f64; 3])]
    pub position: Vec3,
    #[schema(value_type = [f64; 3])]
    pub size: Vec3,
}

impl PlannedSlot {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_center_and_size(self.position, self.size)
    }
}

/// Result of the grid planning.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPlan {
    pub grid: GridLayout,
    pub slot_size: f64,
    pub spacing: f64,
    pub slots: Vec<PlannedSlot>,
    /// Units that received no slot because the grid ran out
    pub unplaced: u64,
}

impl PlacementPlan {
    /// Whether every requested unit received a slot.
    pub fn is_complete(&self) -> bool {
        self.unplaced == 0
    }

    pub fn placed_count(&self) -> usize {
        self.slots.len()
    }
}

/// Number of slots fitting along one axis: `floor((dim - spacing) / (size + spacing))`.
fn slots_along(dim: f64, size: f64, spacing: f64) -> usize {
    if !(dim.is_finite() && size.is_finite() && spacing.is_finite()) {
        return 0;
    }
    if dim <= 0.0 || size <= 0.0 || spacing < 0.0 {
        return 0;
    }
    let fitting = ((dim - spacing) / (size + spacing)).floor();
    if fitting <= 0.0 { 0 } else { fitting as usize }
}

/// Centre of slot `k` among `count` slots, symmetric about 0.
fn axis_center(k: usize, count: usize, size: f64, spacing: f64) -> f64 {
    let span = count as f64 * size + count.saturating_sub(1) as f64 * spacing;
    -span / 2.0 + size / 2.0 + k as f64 * (size + spacing)
}

/// Computes the slot grid for a container without placing anything.
pub fn grid_for(dims: Vec3, slot_size: f64, spacing: f64) -> GridLayout {
    GridLayout {
        per_length: slots_along(dims.x, slot_size, spacing),
        per_width: slots_along(dims.z, slot_size, spacing),
        per_height: slots_along(dims.y, slot_size, spacing),
    }
}

/// Assigns up to `count` slots on a fixed-pitch grid.
///
/// Traversal order is width outermost, then length, then height innermost,
/// so columns fill bottom-up before the next column starts. The output is a
/// pure function of the inputs.
///
/// # Parameters
/// * `count` - Number of physical units to place
/// * `dims` - Container extents (x = length, y = height, z = width) in mm
/// * `slot_size` - Cube edge in mm
/// * `spacing` - Gap in mm
///
/// # Returns
/// `PlacementPlan` with `min(count, capacity)` slots and the unplaced remainder
pub fn plan_grid(count: u64, dims: Vec3, slot_size: f64, spacing: f64) -> PlacementPlan {
    plan_grid_limited(count, dims, slot_size, spacing, usize::MAX)
}

/// Like [`plan_grid`], but materialises at most `max_slots` slots.
///
/// Units past the limit are counted as unplaced, exactly like units past
/// the grid capacity.
pub fn plan_grid_limited(
    count: u64,
    dims: Vec3,
    slot_size: f64,
    spacing: f64,
    max_slots: usize,
) -> PlacementPlan {
    let grid = grid_for(dims, slot_size, spacing);
    let capacity = grid.capacity();
    let placed = usize::try_from(count)
        .unwrap_or(usize::MAX)
        .min(capacity)
        .min(max_slots);

    let size = Vec3::splat(slot_size);
    let column = grid.per_height.max(1);
    let layer = column.saturating_mul(grid.per_length).max(1);
    let slots: Vec<PlannedSlot> = (0..placed)
        .map(|item_index| {
            let y = item_index % column;
            let x = (item_index / column) % grid.per_length.max(1);
            let z = item_index / layer;
            PlannedSlot {
                item_index,
                position: Vec3::new(
                    axis_center(x, grid.per_length, slot_size, spacing),
                    axis_center(y, grid.per_height, slot_size, spacing),
                    axis_center(z, grid.per_width, slot_size, spacing),
                ),
                size,
            }
        })
        .collect();

    let unplaced = count - slots.len() as u64;
    if unplaced > 0 {
        tracing::info!(
            requested = count,
            capacity,
            max_slots,
            unplaced,
            "slot grid exhausted, remaining units stay unplaced"
        );
    }

    PlacementPlan {
        grid,
        slot_size,
        spacing,
        slots,
        unplaced,
    }
}

/// Plans `count` units into `container` using the configured slot size and spacing.
pub fn plan_for_container(
    count: u64,
    container: &ContainerSpec,
    config: &LayoutConfig,
) -> PlacementPlan {
    plan_grid_limited(
        count,
        container.dimensions(),
        config.slot_size_for(container),
        config.spacing,
        config.max_slots,
    )
}
