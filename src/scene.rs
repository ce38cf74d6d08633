//! Retained 3D scene for the load visualization.
//!
//! The renderer owns an object pool indexed by unit slot plus the static
//! scene dressing (camera, lights, translucent container, door, floor grid).
//! Drawing goes through a `RenderSurface`; the service implements one that
//! streams frames to a browser viewer, tests use a recording surface.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::animation::Progress;
use crate::model::{CargoUnit, ContainerSpec};
use crate::planner::PlannedSlot;
use crate::types::{Dimensional, Vec3};

/// Box colours, picked by unit index.
pub const PALETTE: [u32; 6] = [
    0x4CAF50, // green
    0x2196F3, // blue
    0xFFC107, // amber
    0xFF5722, // deep orange
    0x9C27B0, // purple
    0x3F51B5, // indigo
];

pub const FRAGILE_COLOR: u32 = 0xFF4444;
pub const CONTAINER_COLOR: u32 = 0x808080;
pub const CONTAINER_OPACITY: f64 = 0.15;
pub const ITEM_OPACITY: f64 = 0.85;

/// Errors raised by the rendering layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The host cannot provide a drawing surface at all.
    #[error("Render surface unavailable: {0}")]
    RenderSurfaceUnavailable(String),
    /// The surface went away while the scene was live (viewer disconnected).
    #[error("Render surface lost: {0}")]
    SurfaceLost(String),
}

/// Output destination for the scene.
pub trait RenderSurface {
    /// Whether the surface can currently accept output.
    fn is_available(&self) -> bool;

    /// Hands one piece of output to the surface.
    ///
    /// A surface that cannot keep up may skip a frame; the renderer then
    /// carries the skipped changes into the next one.
    fn present(&mut self, output: SurfaceOutput) -> Result<Presented, RenderError>;
}

/// What the surface did with a presented output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Shown,
    Skipped,
}

/// What a surface receives.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum SurfaceOutput {
    /// Complete scene, sent once per build.
    Scene(SceneDescription),
    /// Objects changed since the previous frame.
    Frame(FrameUpdate),
    /// The object set was released.
    Disposed { released: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Normal,
    Wireframe,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Normal => ViewMode::Wireframe,
            ViewMode::Wireframe => ViewMode::Normal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub fov: f64,
    pub near: f64,
    pub far: f64,
    #[schema(value_type = [f64; 3])]
    pub position: Vec3,
    #[schema(value_type = [f64; 3])]
    pub look_at: Vec3,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl Camera {
    fn framing(dims: Vec3) -> Self {
        Self {
            fov: 65.0,
            near: 0.1,
            far: 20_000.0,
            position: Vec3::new(dims.x * 0.8, dims.y * 0.8, dims.z * 1.5),
            look_at: Vec3::zero(),
            min_distance: dims.x * 0.5,
            max_distance: dims.x * 3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Light {
    Ambient {
        intensity: f64,
    },
    Directional {
        intensity: f64,
        #[schema(value_type = [f64; 3])]
        position: Vec3,
    },
}

fn default_lights() -> Vec<Light> {
    vec![
        Light::Ambient { intensity: 0.7 },
        Light::Directional {
            intensity: 0.8,
            position: Vec3::new(1000.0, 1000.0, 1000.0),
        },
        Light::Directional {
            intensity: 0.5,
            position: Vec3::new(-1000.0, 500.0, -1000.0),
        },
    ]
}

/// Translucent bounding volume of the container, centred on the origin.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerVolume {
    pub label: Option<String>,
    #[schema(value_type = [f64; 3])]
    pub size: Vec3,
    pub color: u32,
    pub opacity: f64,
    pub outlined: bool,
}

/// Door marker on the `+x` end wall.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoorIndicator {
    #[schema(value_type = [f64; 3])]
    pub position: Vec3,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FloorGrid {
    pub size: f64,
    pub divisions: u32,
    pub elevation: f64,
}

/// One persistent box in the pool.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub index: usize,
    /// 1-based number painted on the box
    pub label: String,
    #[schema(value_type = [f64; 3])]
    pub size: Vec3,
    pub color: u32,
    pub opacity: f64,
    pub fragile: bool,
    #[schema(value_type = [f64; 3])]
    pub position: Vec3,
    pub visible: bool,
}

/// Full scene as sent to a surface after a build.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescription {
    pub camera: Camera,
    pub lights: Vec<Light>,
    pub container: ContainerVolume,
    pub door: DoorIndicator,
    pub grid: FloorGrid,
    pub view_mode: ViewMode,
    pub objects: Vec<SceneObject>,
}

/// Mutable part of a pooled object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectState {
    pub index: usize,
    #[schema(value_type = [f64; 3])]
    pub position: Vec3,
    pub visible: bool,
}

/// Incremental frame: only objects touched since the last render.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrameUpdate {
    pub frame: u64,
    pub view_mode: ViewMode,
    pub progress: Option<Progress>,
    pub changed: Vec<ObjectState>,
}

/// Colour for a unit: fragile cargo is always red, everything else cycles the palette.
pub fn color_for(index: usize, fragile: bool) -> u32 {
    if fragile {
        FRAGILE_COLOR
    } else {
        PALETTE[index % PALETTE.len()]
    }
}

/// Off-stage start position: beyond the door end, level with the slot.
pub fn start_position_for(container: &ContainerSpec, slot: &PlannedSlot) -> Vec3 {
    Vec3::new(container.length * 1.5, slot.position.y, slot.position.z)
}

/// Owns the scene and the surface it draws to.
#[derive(Debug)]
pub struct SceneRenderer<S: RenderSurface> {
    surface: S,
    camera: Camera,
    lights: Vec<Light>,
    container: ContainerVolume,
    door: DoorIndicator,
    grid: FloorGrid,
    objects: Vec<SceneObject>,
    dirty: Vec<usize>,
    dirty_flags: Vec<bool>,
    view_mode: ViewMode,
    progress: Option<Progress>,
    frame: u64,
    resend: bool,
    disposed: bool,
}

impl<S: RenderSurface> SceneRenderer<S> {
    /// Builds the scene: one hidden box per slot at its start position,
    /// plus the container volume and dressing.
    ///
    /// # Parameters
    /// * `surface` - Output destination
    /// * `container` - Bounding volume
    /// * `slots` - Planned slots, one pooled object each
    /// * `units` - Unit metadata looked up by slot index (fragility)
    ///
    /// # Errors
    /// `RenderError::RenderSurfaceUnavailable` when the surface cannot take output.
    pub fn build(
        surface: S,
        container: &ContainerSpec,
        slots: &[PlannedSlot],
        units: &[CargoUnit],
    ) -> Result<Self, RenderError> {
        if !surface.is_available() {
            return Err(RenderError::RenderSurfaceUnavailable(
                "surface rejected the scene before construction".to_string(),
            ));
        }

        let mut renderer = Self {
            surface,
            camera: Camera::framing(container.dimensions()),
            lights: default_lights(),
            container: Self::container_volume(container),
            door: Self::door_indicator(container),
            grid: Self::floor_grid(container),
            objects: Vec::new(),
            dirty: Vec::new(),
            dirty_flags: Vec::new(),
            view_mode: ViewMode::default(),
            progress: None,
            frame: 0,
            resend: false,
            disposed: true,
        };
        renderer.populate(container, slots, units)?;
        Ok(renderer)
    }

    /// Disposes the current object set and builds a new one.
    pub fn rebuild(
        &mut self,
        container: &ContainerSpec,
        slots: &[PlannedSlot],
        units: &[CargoUnit],
    ) -> Result<(), RenderError> {
        self.dispose();
        if !self.surface.is_available() {
            return Err(RenderError::RenderSurfaceUnavailable(
                "surface went away before rebuild".to_string(),
            ));
        }
        self.camera = Camera::framing(container.dimensions());
        self.container = Self::container_volume(container);
        self.door = Self::door_indicator(container);
        self.grid = Self::floor_grid(container);
        self.populate(container, slots, units)
    }

    fn populate(
        &mut self,
        container: &ContainerSpec,
        slots: &[PlannedSlot],
        units: &[CargoUnit],
    ) -> Result<(), RenderError> {
        self.objects = slots
            .iter()
            .map(|slot| {
                let fragile = units
                    .get(slot.item_index)
                    .map(|unit| unit.fragile)
                    .unwrap_or(false);
                SceneObject {
                    index: slot.item_index,
                    label: (slot.item_index + 1).to_string(),
                    size: slot.size,
                    color: color_for(slot.item_index, fragile),
                    opacity: ITEM_OPACITY,
                    fragile,
                    position: start_position_for(container, slot),
                    visible: false,
                }
            })
            .collect();
        self.dirty.clear();
        self.dirty_flags = vec![false; self.objects.len()];
        self.progress = None;
        self.frame = 0;
        self.resend = false;
        self.disposed = false;

        tracing::debug!(objects = self.objects.len(), "scene built");
        let description = self.description();
        match self.surface.present(SurfaceOutput::Scene(description))? {
            Presented::Shown => Ok(()),
            Presented::Skipped => Err(RenderError::RenderSurfaceUnavailable(
                "surface skipped the scene description".to_string(),
            )),
        }
    }

    fn container_volume(container: &ContainerSpec) -> ContainerVolume {
        ContainerVolume {
            label: container.label.clone(),
            size: container.dimensions(),
            color: CONTAINER_COLOR,
            opacity: CONTAINER_OPACITY,
            outlined: true,
        }
    }

    fn door_indicator(container: &ContainerSpec) -> DoorIndicator {
        DoorIndicator {
            position: Vec3::new(container.length / 2.0, 0.0, 0.0),
            width: container.width * 0.8,
            height: container.height * 0.8,
        }
    }

    fn floor_grid(container: &ContainerSpec) -> FloorGrid {
        FloorGrid {
            size: container.length.max(container.width) * 1.5,
            divisions: 20,
            elevation: -container.height / 2.0 - 10.0,
        }
    }

    fn mark_dirty(&mut self, index: usize) {
        if let Some(flag) = self.dirty_flags.get_mut(index) {
            if !*flag {
                *flag = true;
                self.dirty.push(index);
            }
        }
    }

    /// Moves pooled object `index`. Unknown indexes are ignored.
    pub fn set_object_position(&mut self, index: usize, position: Vec3) {
        match self.objects.get_mut(index) {
            Some(object) if object.position != position => {
                object.position = position;
                self.mark_dirty(index);
            }
            Some(_) => {}
            None => tracing::trace!(index, "position update for unknown scene object"),
        }
    }

    /// Shows or hides pooled object `index`. Unknown indexes are ignored.
    pub fn set_object_visible(&mut self, index: usize, visible: bool) {
        match self.objects.get_mut(index) {
            Some(object) if object.visible != visible => {
                object.visible = visible;
                self.mark_dirty(index);
            }
            Some(_) => {}
            None => tracing::trace!(index, "visibility update for unknown scene object"),
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    /// Flips between normal and wireframe rendering and returns the new mode.
    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.view_mode = self.view_mode.toggled();
        self.view_mode
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Sets the progress readout carried with the next frames.
    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }

    /// Draws the current state once. A disposed renderer draws nothing.
    pub fn render(&mut self) -> Result<(), RenderError> {
        if self.disposed {
            return Ok(());
        }

        let changed = self
            .dirty
            .drain(..)
            .filter_map(|index| {
                let object = self.objects.get(index)?;
                Some(ObjectState {
                    index,
                    position: object.position,
                    visible: object.visible,
                })
            })
            .collect::<Vec<_>>();
        for state in &changed {
            if let Some(flag) = self.dirty_flags.get_mut(state.index) {
                *flag = false;
            }
        }

        let indexes: Vec<usize> = changed.iter().map(|state| state.index).collect();
        let update = FrameUpdate {
            frame: self.frame,
            view_mode: self.view_mode,
            progress: self.progress,
            changed,
        };
        self.frame += 1;

        match self.surface.present(SurfaceOutput::Frame(update))? {
            Presented::Shown => self.resend = false,
            Presented::Skipped => {
                tracing::trace!(frame = self.frame - 1, "frame skipped by surface");
                for index in indexes {
                    self.mark_dirty(index);
                }
                self.resend = true;
            }
        }
        Ok(())
    }

    /// Whether a skipped frame still has to reach the surface.
    pub fn has_pending_frame(&self) -> bool {
        !self.disposed && self.resend
    }

    /// Releases every pooled object. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let released = self.objects.len();
        self.objects.clear();
        self.dirty.clear();
        self.dirty_flags.clear();
        self.progress = None;
        self.resend = false;
        self.disposed = true;

        if let Err(err) = self.surface.present(SurfaceOutput::Disposed { released }) {
            tracing::debug!(%err, "surface gone while disposing scene");
        }
        tracing::debug!(released, "scene disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn object(&self, index: usize) -> Option<&SceneObject> {
        self.objects.get(index)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Snapshot of the complete scene.
    pub fn description(&self) -> SceneDescription {
        SceneDescription {
            camera: self.camera.clone(),
            lights: self.lights.clone(),
            container: self.container.clone(),
            door: self.door.clone(),
            grid: self.grid.clone(),
            view_mode: self.view_mode,
            objects: self.objects.clone(),
        }
    }
}

/// Surfaces for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Keeps every output in memory.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) outputs: Vec<SurfaceOutput>,
        pub(crate) unavailable: bool,
        /// Number of upcoming frames to skip, as a lagging viewer would
        pub(crate) skip_frames: usize,
    }

    impl RecordingSurface {
        pub(crate) fn frames(&self) -> impl Iterator<Item = &FrameUpdate> {
            self.outputs.iter().filter_map(|output| match output {
                SurfaceOutput::Frame(frame) => Some(frame),
                _ => None,
            })
        }

        pub(crate) fn disposals(&self) -> usize {
            self.outputs
                .iter()
                .filter(|output| matches!(output, SurfaceOutput::Disposed { .. }))
                .count()
        }
    }

    impl RenderSurface for RecordingSurface {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn present(&mut self, output: SurfaceOutput) -> Result<Presented, RenderError> {
            if self.unavailable {
                return Err(RenderError::SurfaceLost("recording stopped".to_string()));
            }
            if self.skip_frames > 0 && matches!(output, SurfaceOutput::Frame(_)) {
                self.skip_frames -= 1;
                return Ok(Presented::Skipped);
            }
            self.outputs.push(output);
            Ok(Presented::Shown)
        }
    }
}
