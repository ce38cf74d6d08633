//! Sequential "loading" animation for the scene.
//!
//! One unit at a time travels from its off-stage start position to its
//! slot. The state machine is a pure update, `advance_tick(state, now)`,
//! kept apart from drawing; `AnimationDriver` owns the scene and the state
//! and pushes the result of each tick to the renderer.
//!
//! Phases: `Idle → Loading(0) → Arriving(0) → Loading(1) → … → Complete`,
//! plus `Restarting` while a restart settles. At most one delayed
//! transition is pending at any time.

use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::aggregate::{display_fill_pct, round_one_decimal};
use crate::model::{CargoUnit, ContainerSpec};
use crate::planner::PlannedSlot;
use crate::scene::{RenderError, RenderSurface, SceneRenderer, ViewMode, start_position_for};
use crate::types::Vec3;

/// Pacing constants of the animation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnimationTiming {
    /// Fraction of the remaining distance covered per tick (0, 1]
    pub lerp_fraction: f64,
    /// Distance in mm below which an object snaps onto its target
    pub arrival_threshold: f64,
    /// Delay between building the scene and revealing the first unit
    pub start_delay: Duration,
    /// Delay between one arrival and the next reveal
    pub next_item_delay: Duration,
    /// Settling delay after a restart
    pub restart_delay: Duration,
    /// Host tick period
    pub frame_interval: Duration,
}

impl AnimationTiming {
    pub const DEFAULT_LERP_FRACTION: f64 = 0.05;
    pub const DEFAULT_ARRIVAL_THRESHOLD: f64 = 1.0;
    pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(1000);
    pub const DEFAULT_NEXT_ITEM_DELAY: Duration = Duration::from_millis(200);
    pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(500);
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

    /// Upper bound on the ticks one unit spends moving, from `distance` away.
    pub fn max_travel_ticks(&self, distance: f64) -> u64 {
        if distance <= self.arrival_threshold {
            return 0;
        }
        let keep = 1.0 - self.lerp_fraction;
        if keep <= 0.0 {
            return 1;
        }
        ((self.arrival_threshold / distance).ln() / keep.ln()).ceil() as u64
    }
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            lerp_fraction: Self::DEFAULT_LERP_FRACTION,
            arrival_threshold: Self::DEFAULT_ARRIVAL_THRESHOLD,
            start_delay: Self::DEFAULT_START_DELAY,
            next_item_delay: Self::DEFAULT_NEXT_ITEM_DELAY,
            restart_delay: Self::DEFAULT_RESTART_DELAY,
            frame_interval: Self::DEFAULT_FRAME_INTERVAL,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", content = "index", rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Loading(usize),
    Arriving(usize),
    Complete,
    Restarting,
}

/// Progress readout `(current, total)`; `current` is 1-based while a unit is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    /// Completion in percent, one decimal, clamped to `[0, 100]`
    pub percent: f64,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            display_fill_pct(round_one_decimal(current as f64 / total as f64 * 100.0))
        };
        Self {
            current,
            total,
            percent,
        }
    }
}

/// Motion state of one pooled unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatedObject {
    pub item_index: usize,
    pub start_position: Vec3,
    pub target_position: Vec3,
    pub current_position: Vec3,
    pub visible: bool,
    pub arrived: bool,
}

impl AnimatedObject {
    pub fn new(item_index: usize, start_position: Vec3, target_position: Vec3) -> Self {
        Self {
            item_index,
            start_position,
            target_position,
            current_position: start_position,
            visible: false,
            arrived: false,
        }
    }

    fn reset(&mut self) {
        self.current_position = self.start_position;
        self.visible = false;
        self.arrived = false;
    }
}

/// The single outstanding delayed transition: reveal unit `reveal` at `due`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTransition {
    pub due: Duration,
    pub reveal: usize,
}

/// Everything the state machine needs; owned by the driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationState {
    objects: Vec<AnimatedObject>,
    phase: Phase,
    pending: Option<PendingTransition>,
    timing: AnimationTiming,
    touched: Vec<usize>,
}

impl AnimationState {
    /// New state in `Idle`; nothing is visible and nothing is scheduled.
    pub fn new(objects: Vec<AnimatedObject>, timing: AnimationTiming) -> Self {
        Self {
            objects,
            phase: Phase::Idle,
            pending: None,
            timing,
            touched: Vec::new(),
        }
    }

    /// Builds one object per slot, starting beyond the door end.
    pub fn from_slots(
        container: &ContainerSpec,
        slots: &[PlannedSlot],
        timing: AnimationTiming,
    ) -> Self {
        let objects = slots
            .iter()
            .map(|slot| {
                AnimatedObject::new(
                    slot.item_index,
                    start_position_for(container, slot),
                    slot.position,
                )
            })
            .collect();
        Self::new(objects, timing)
    }

    /// Schedules the first reveal after the start delay.
    ///
    /// With nothing to animate the state goes straight to `Complete`.
    pub fn start(mut self, now: Duration) -> Self {
        if self.objects.is_empty() {
            self.complete();
            return self;
        }
        self.pending = Some(PendingTransition {
            due: now + self.timing.start_delay,
            reveal: 0,
        });
        self
    }

    /// Cancels any pending transition, puts every object back off-stage and
    /// hidden, and schedules `Loading(0)` after the settling delay.
    pub fn restart(mut self, now: Duration) -> Self {
        self.pending = None;
        for (index, object) in self.objects.iter_mut().enumerate() {
            object.reset();
            self.touched.push(index);
        }
        if self.objects.is_empty() {
            self.complete();
            return self;
        }
        self.phase = Phase::Restarting;
        self.pending = Some(PendingTransition {
            due: now + self.timing.restart_delay,
            reveal: 0,
        });
        self
    }

    /// Drops all objects and anything scheduled; back to `Idle`.
    pub fn disposed(self) -> Self {
        Self {
            timing: self.timing,
            ..Self::default()
        }
    }

    fn reveal(&mut self, index: usize) {
        match self.objects.get_mut(index) {
            Some(object) => {
                object.current_position = object.start_position;
                object.visible = true;
                object.arrived = false;
                self.touched.push(index);
                self.phase = Phase::Loading(index);
            }
            None => self.complete(),
        }
    }

    fn step(&mut self, index: usize, now: Duration) {
        let timing = self.timing;
        let Some(object) = self.objects.get_mut(index) else {
            self.complete();
            return;
        };
        if object.arrived {
            return;
        }

        let remaining = object.current_position.distance_to(&object.target_position);
        if remaining > timing.arrival_threshold {
            object.current_position = object
                .current_position
                .lerp(&object.target_position, timing.lerp_fraction);
            self.touched.push(index);
            return;
        }

        object.current_position = object.target_position;
        object.arrived = true;
        self.touched.push(index);

        if index + 1 < self.objects.len() {
            self.pending = Some(PendingTransition {
                due: now + timing.next_item_delay,
                reveal: index + 1,
            });
        } else {
            self.complete();
        }
    }

    /// Final consistency pass: everything visible, nothing scheduled.
    fn complete(&mut self) {
        self.phase = Phase::Complete;
        self.pending = None;
        for (index, object) in self.objects.iter_mut().enumerate() {
            if !object.visible {
                object.visible = true;
                self.touched.push(index);
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn objects(&self) -> &[AnimatedObject] {
        &self.objects
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn timing(&self) -> &AnimationTiming {
        &self.timing
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Whether further ticks can change anything.
    pub fn wants_tick(&self) -> bool {
        match self.phase {
            Phase::Complete => false,
            Phase::Idle => self.pending.is_some(),
            _ => true,
        }
    }

    pub fn progress(&self) -> Progress {
        let total = self.objects.len();
        let current = match self.phase {
            Phase::Idle | Phase::Restarting => 0,
            Phase::Loading(index) | Phase::Arriving(index) => index + 1,
            Phase::Complete => total,
        };
        Progress::new(current, total)
    }

    /// Indexes whose position or visibility changed since the last call.
    pub fn take_touched(&mut self) -> Vec<usize> {
        let mut touched = std::mem::take(&mut self.touched);
        touched.sort_unstable();
        touched.dedup();
        touched
    }
}

/// Advances the state machine by one tick at host time `now`.
///
/// A due pending transition fires first and consumes the tick. Otherwise
/// the active unit moves `lerp_fraction` of its remaining distance, or
/// snaps onto the target once within `arrival_threshold`.
pub fn advance_tick(mut state: AnimationState, now: Duration) -> AnimationState {
    if let Some(pending) = state.pending {
        if now >= pending.due {
            state.pending = None;
            state.reveal(pending.reveal);
            return state;
        }
    }

    match state.phase {
        Phase::Loading(index) => {
            state.phase = Phase::Arriving(index);
            state.step(index, now);
        }
        Phase::Arriving(index) => state.step(index, now),
        Phase::Idle | Phase::Restarting | Phase::Complete => {}
    }
    state
}

/// Proof of which scene build a scheduled tick belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickTicket {
    generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// Animation finished; stop scheduling until restarted.
    Stop,
    /// The ticket belongs to a torn-down build; nothing happened.
    Stale,
}

/// Owning context for one visualization: scene, state, generation.
///
/// Lifecycle is build → tick* → dispose. Every dispose or rebuild bumps the
/// generation, so ticks scheduled against an older build become no-ops.
#[derive(Debug)]
pub struct AnimationDriver<S: RenderSurface> {
    scene: SceneRenderer<S>,
    state: AnimationState,
    generation: u64,
    disposed: bool,
}

impl<S: RenderSurface> AnimationDriver<S> {
    /// Builds the scene and schedules the first reveal.
    ///
    /// # Errors
    /// `RenderError::RenderSurfaceUnavailable` when the surface cannot take output.
    pub fn build(
        surface: S,
        container: &ContainerSpec,
        slots: &[PlannedSlot],
        units: &[CargoUnit],
        timing: AnimationTiming,
        now: Duration,
    ) -> Result<Self, RenderError> {
        let scene = SceneRenderer::build(surface, container, slots, units)?;
        let state = AnimationState::from_slots(container, slots, timing).start(now);
        let mut driver = Self {
            scene,
            state,
            generation: 0,
            disposed: false,
        };
        driver.sync();
        Ok(driver)
    }

    /// Replaces the item set: disposes the current build, then builds anew.
    pub fn rebuild(
        &mut self,
        container: &ContainerSpec,
        slots: &[PlannedSlot],
        units: &[CargoUnit],
        now: Duration,
    ) -> Result<(), RenderError> {
        let timing = *self.state.timing();
        self.dispose();
        self.scene.rebuild(container, slots, units)?;
        self.state = AnimationState::from_slots(container, slots, timing).start(now);
        self.disposed = false;
        self.sync();
        Ok(())
    }

    /// Ticket for ticks scheduled against the current build.
    pub fn ticket(&self) -> TickTicket {
        TickTicket {
            generation: self.generation,
        }
    }

    /// Runs one tick and draws the result.
    pub fn tick(&mut self, ticket: TickTicket, now: Duration) -> Result<TickOutcome, RenderError> {
        if self.disposed || ticket.generation != self.generation {
            tracing::trace!(
                ticket = ticket.generation,
                current = self.generation,
                "stale tick ignored"
            );
            return Ok(TickOutcome::Stale);
        }

        let state = std::mem::take(&mut self.state);
        self.state = advance_tick(state, now);
        self.sync();
        self.scene.render()?;

        if self.state.is_complete() {
            Ok(TickOutcome::Stop)
        } else {
            Ok(TickOutcome::Continue)
        }
    }

    /// Starts the sequence over. Ignored after disposal.
    pub fn restart(&mut self, now: Duration) -> Result<(), RenderError> {
        if self.disposed {
            return Ok(());
        }
        let state = std::mem::take(&mut self.state);
        self.state = state.restart(now);
        self.sync();
        self.scene.render()
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.scene.toggle_view_mode()
    }

    /// Draws a frame without advancing the animation.
    pub fn redraw(&mut self) -> Result<(), RenderError> {
        self.scene.render()
    }

    /// Tears the build down. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.generation += 1;
        self.disposed = true;
        let state = std::mem::take(&mut self.state);
        self.state = state.disposed();
        self.scene.dispose();
    }

    fn sync(&mut self) {
        for index in self.state.take_touched() {
            if let Some(object) = self.state.objects().get(index) {
                self.scene.set_object_position(index, object.current_position);
                self.scene.set_object_visible(index, object.visible);
            }
        }
        self.scene.set_progress(self.state.progress());
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn progress(&self) -> Progress {
        self.state.progress()
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn scene(&self) -> &SceneRenderer<S> {
        &self.scene
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn wants_tick(&self) -> bool {
        !self.disposed && self.state.wants_tick()
    }

    /// Whether a frame the surface skipped still has to be redrawn.
    pub fn has_pending_frame(&self) -> bool {
        !self.disposed && self.scene.has_pending_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CargoItem, ContainerClass, expand_units};
    use crate::planner::{LayoutConfig, PlacementPlan, plan_for_container};
    use crate::scene::testing::RecordingSurface;

    const FRAME: Duration = Duration::from_millis(16);

    fn truck_plan(count: u64) -> (ContainerSpec, PlacementPlan) {
        let container = ContainerClass::Truck.spec();
        let plan = plan_for_container(count, &container, &LayoutConfig::default());
        (container, plan)
    }

    fn started_state(count: u64) -> AnimationState {
        let (container, plan) = truck_plan(count);
        AnimationState::from_slots(&container, &plan.slots, AnimationTiming::default())
            .start(Duration::ZERO)
    }

    /// Ticks every frame until `done` or `limit`; returns (ticks, state, now).
    fn run_until(
        mut state: AnimationState,
        mut now: Duration,
        limit: u64,
        done: impl Fn(&AnimationState) -> bool,
    ) -> (u64, AnimationState, Duration) {
        let mut ticks = 0;
        while !done(&state) && ticks < limit {
            now += FRAME;
            state = advance_tick(state, now);
            ticks += 1;
        }
        (ticks, state, now)
    }

    fn build_driver(count: u32) -> AnimationDriver<RecordingSurface> {
        let (container, plan) = truck_plan(u64::from(count));
        let items = vec![CargoItem::new(1000.0, 1000.0, 1000.0, 30.0, count)];
        let units: Vec<_> = expand_units(&items).collect();
        AnimationDriver::build(
            RecordingSurface::default(),
            &container,
            &plan.slots,
            &units,
            AnimationTiming::default(),
            Duration::ZERO,
        )
        .expect("surface available")
    }

    #[test]
    fn new_state_is_idle_and_hidden() {
        let (container, plan) = truck_plan(3);
        let state = AnimationState::from_slots(&container, &plan.slots, AnimationTiming::default());
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.objects().iter().all(|o| !o.visible));
        assert!(!state.wants_tick());
        assert_eq!(state.progress(), Progress::new(0, 3));
    }

    #[test]
    fn first_reveal_waits_for_start_delay() {
        let state = started_state(2);
        let state = advance_tick(state, Duration::from_millis(999));
        assert_eq!(state.phase(), Phase::Idle);

        let state = advance_tick(state, Duration::from_millis(1000));
        assert_eq!(state.phase(), Phase::Loading(0));
        let first = state.objects()[0];
        assert!(first.visible);
        assert_eq!(first.current_position, first.start_position);
        assert!(!state.objects()[1].visible);
    }

    #[test]
    fn arriving_moves_by_fixed_fraction() {
        let state = advance_tick(started_state(1), Duration::from_secs(1));
        let before = state.objects()[0];
        let distance = before.current_position.distance_to(&before.target_position);

        let state = advance_tick(state, Duration::from_millis(1016));
        assert_eq!(state.phase(), Phase::Arriving(0));
        let after = state.objects()[0];
        let remaining = after.current_position.distance_to(&after.target_position);
        assert!((remaining - distance * 0.95).abs() < 1e-6);
    }

    #[test]
    fn arrival_snaps_exactly_and_schedules_next_reveal() {
        let (ticks, state, now) = run_until(started_state(2), Duration::ZERO, 10_000, |s| {
            s.objects()[0].arrived
        });
        assert!(ticks < 10_000);
        let first = state.objects()[0];
        assert_eq!(first.current_position, first.target_position);
        assert_eq!(state.phase(), Phase::Arriving(0));
        assert_eq!(
            state.pending(),
            Some(PendingTransition {
                due: now + AnimationTiming::DEFAULT_NEXT_ITEM_DELAY,
                reveal: 1,
            })
        );

        // nothing happens until the delay has passed
        let state = advance_tick(state, now + Duration::from_millis(199));
        assert_eq!(state.phase(), Phase::Arriving(0));
        let state = advance_tick(state, now + Duration::from_millis(200));
        assert_eq!(state.phase(), Phase::Loading(1));
        assert_eq!(state.progress(), Progress::new(2, 2));
    }

    #[test]
    fn only_one_object_moves_at_a_time() {
        let (_, state, now) =
            run_until(started_state(3), Duration::ZERO, 10_000, |s| {
                s.phase() == Phase::Arriving(1)
            });
        let state = advance_tick(state, now + FRAME);
        let objects = state.objects();
        assert!(objects[0].arrived);
        assert_eq!(objects[0].current_position, objects[0].target_position);
        assert!(!objects[1].arrived);
        assert!(!objects[2].visible);
        assert_eq!(objects[2].current_position, objects[2].start_position);
    }

    #[test]
    fn reaches_complete_within_bounded_ticks() {
        let count = 12;
        let (container, plan) = truck_plan(count);
        let timing = AnimationTiming::default();
        let state = AnimationState::from_slots(&container, &plan.slots, timing).start(Duration::ZERO);

        let farthest = state
            .objects()
            .iter()
            .map(|o| o.start_position.distance_to(&o.target_position))
            .fold(0.0, f64::max);
        let frames = |delay: Duration| (delay.as_millis() / FRAME.as_millis()) as u64 + 1;
        let per_item = timing.max_travel_ticks(farthest) + 2 + frames(timing.next_item_delay);
        let bound = frames(timing.start_delay) + count * per_item;

        let (ticks, state, _) = run_until(state, Duration::ZERO, bound + 1, |s| s.is_complete());
        assert!(state.is_complete(), "not complete after {ticks} ticks (bound {bound})");
        assert!(ticks <= bound);
        assert!(state.objects().iter().all(|o| o.visible && o.arrived));
        assert!(state.pending().is_none());
        assert!(!state.wants_tick());
    }

    #[test]
    fn empty_scene_is_complete_immediately() {
        let state = AnimationState::new(Vec::new(), AnimationTiming::default()).start(Duration::ZERO);
        assert!(state.is_complete());
        assert_eq!(state.progress(), Progress::new(0, 0));
        assert_eq!(state.progress().percent, 100.0);
    }

    fn assert_restarted(state: AnimationState, at: Duration) {
        assert_eq!(state.phase(), Phase::Restarting);
        assert!(
            state
                .objects()
                .iter()
                .all(|o| !o.visible && !o.arrived && o.current_position == o.start_position)
        );
        let settled = advance_tick(state, at + AnimationTiming::DEFAULT_RESTART_DELAY);
        assert_eq!(settled.phase(), Phase::Loading(0));
        assert!(settled.objects()[0].visible);
        assert!(settled.objects()[1..].iter().all(|o| !o.visible));
    }

    #[test]
    fn restart_from_any_phase_returns_to_loading_zero() {
        // from Idle (start still pending)
        let now = Duration::from_millis(10);
        assert_restarted(started_state(3).restart(now), now);

        // from mid-flight
        let (_, state, now) = run_until(started_state(3), Duration::ZERO, 10_000, |s| {
            s.phase() == Phase::Arriving(1)
        });
        assert_restarted(state.restart(now), now);

        // from Complete
        let (_, state, now) = run_until(started_state(3), Duration::ZERO, 100_000, |s| {
            s.is_complete()
        });
        assert_restarted(state.restart(now), now);

        // repeated restart replaces the pending transition
        let state = started_state(3).restart(now).restart(now + Duration::from_millis(300));
        let still_settling = advance_tick(state, now + Duration::from_millis(500));
        assert_eq!(still_settling.phase(), Phase::Restarting);
    }

    #[test]
    fn driver_mirrors_state_into_scene() {
        let mut driver = build_driver(2);
        let ticket = driver.ticket();
        assert_eq!(
            driver.tick(ticket, Duration::from_millis(1000)),
            Ok(TickOutcome::Continue)
        );
        assert_eq!(driver.phase(), Phase::Loading(0));
        assert!(driver.scene().object(0).unwrap().visible);
        assert!(!driver.scene().object(1).unwrap().visible);

        let frame = driver.scene().surface().frames().last().cloned().unwrap();
        assert_eq!(frame.progress, Some(Progress::new(1, 2)));
        assert_eq!(frame.changed.len(), 1);

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json["progress"],
            serde_json::json!({"current": 1, "total": 2, "percent": 50.0})
        );
    }

    #[test]
    fn progress_percent_is_rounded_and_clamped() {
        assert_eq!(Progress::new(1, 3).percent, 33.3);
        assert_eq!(Progress::new(3, 3).percent, 100.0);
        assert_eq!(Progress::new(5, 3).percent, 100.0);
        assert_eq!(Progress::new(0, 0).percent, 100.0);
    }

    #[test]
    fn driver_stops_when_complete() {
        let mut driver = build_driver(2);
        let ticket = driver.ticket();
        let mut now = Duration::ZERO;
        let mut outcome = TickOutcome::Continue;
        for _ in 0..10_000 {
            now += FRAME;
            outcome = driver.tick(ticket, now).unwrap();
            if outcome != TickOutcome::Continue {
                break;
            }
        }
        assert_eq!(outcome, TickOutcome::Stop);
        assert!(!driver.wants_tick());
        assert!(
            (0..2).all(|i| {
                let object = driver.scene().object(i).unwrap();
                object.visible && object.position == driver.state().objects()[i].target_position
            })
        );
    }

    #[test]
    fn dispose_twice_and_stale_ticks_are_harmless() {
        let mut driver = build_driver(3);
        let ticket = driver.ticket();
        driver.tick(ticket, Duration::from_millis(1000)).unwrap();
        let frames_before = driver.scene().surface().frames().count();

        driver.dispose();
        driver.dispose();
        assert!(driver.is_disposed());
        assert_eq!(driver.phase(), Phase::Idle);
        assert_eq!(driver.scene().surface().disposals(), 1);

        assert_eq!(
            driver.tick(ticket, Duration::from_secs(5)),
            Ok(TickOutcome::Stale)
        );
        assert_eq!(
            driver.tick(driver.ticket(), Duration::from_secs(6)),
            Ok(TickOutcome::Stale)
        );
        driver.restart(Duration::from_secs(7)).unwrap();
        assert_eq!(driver.phase(), Phase::Idle);
        assert_eq!(driver.scene().surface().frames().count(), frames_before);
    }

    #[test]
    fn rebuild_invalidates_old_tickets() {
        let mut driver = build_driver(3);
        let old = driver.ticket();
        let (container, plan) = truck_plan(1);
        driver
            .rebuild(&container, &plan.slots, &[], Duration::from_secs(1))
            .unwrap();

        assert_ne!(driver.ticket(), old);
        assert_eq!(driver.tick(old, Duration::from_secs(3)), Ok(TickOutcome::Stale));
        assert_eq!(driver.scene().object_count(), 1);
        assert_eq!(
            driver.tick(driver.ticket(), Duration::from_secs(2)),
            Ok(TickOutcome::Continue)
        );
        assert_eq!(driver.phase(), Phase::Loading(0));
    }

    #[test]
    fn driver_restart_hides_everything() {
        let mut driver = build_driver(2);
        let ticket = driver.ticket();
        driver.tick(ticket, Duration::from_millis(1000)).unwrap();
        driver.restart(Duration::from_millis(1100)).unwrap();

        assert_eq!(driver.phase(), Phase::Restarting);
        assert!((0..2).all(|i| !driver.scene().object(i).unwrap().visible));
        driver.tick(ticket, Duration::from_millis(1600)).unwrap();
        assert_eq!(driver.phase(), Phase::Loading(0));
    }

    #[test]
    fn max_travel_ticks_matches_decay() {
        let timing = AnimationTiming::default();
        assert_eq!(timing.max_travel_ticks(0.5), 0);
        let ticks = timing.max_travel_ticks(1000.0);
        assert!(1000.0 * 0.95f64.powi(ticks as i32) <= 1.0);
        assert!(1000.0 * 0.95f64.powi(ticks as i32 - 1) > 1.0);
    }
}
