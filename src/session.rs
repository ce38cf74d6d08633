//! Live visualization sessions.
//!
//! Each session is one `AnimationDriver` running on its own tokio task. The
//! driver draws into a `ChannelSurface`, whose events are streamed to the
//! browser as Server-Sent Events; restart and view-mode toggles arrive as
//! commands through the `SessionRegistry`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use crate::animation::{AnimationDriver, AnimationTiming, TickOutcome};
use crate::model::{CargoUnit, ContainerSpec};
use crate::planner::PlacementPlan;
use crate::scene::{
    FrameUpdate, Presented, RenderError, RenderSurface, SceneDescription, SurfaceOutput,
};

/// Commands are rare; a small buffer is plenty.
const COMMAND_BUFFER: usize = 8;
/// Events queued for one viewer before frames start being skipped.
const EVENT_BUFFER: usize = 256;

/// One event on the visualization stream.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualizationEvent {
    SessionStarted {
        session_id: u64,
        total: usize,
        unplaced: u64,
    },
    SceneBuilt {
        scene: SceneDescription,
    },
    Frame {
        frame: FrameUpdate,
    },
    Completed,
    Disposed {
        released: usize,
    },
}

impl From<SurfaceOutput> for VisualizationEvent {
    fn from(output: SurfaceOutput) -> Self {
        match output {
            SurfaceOutput::Scene(scene) => Self::SceneBuilt { scene },
            SurfaceOutput::Frame(frame) => Self::Frame { frame },
            SurfaceOutput::Disposed { released } => Self::Disposed { released },
        }
    }
}

/// Render surface that forwards everything into a bounded event channel.
///
/// When the viewer falls behind and the channel is full, frames are skipped;
/// any other output on a full channel counts as a lost surface.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    tx: mpsc::Sender<VisualizationEvent>,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::Sender<VisualizationEvent>) -> Self {
        Self { tx }
    }

    /// Queues an event that does not come from the renderer, if there is room.
    pub fn try_notify(&self, event: VisualizationEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }

    /// Sends an event that does not come from the renderer, waiting for room.
    ///
    /// Returns `false` once the viewer has gone away.
    pub async fn notify(&self, event: VisualizationEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Resolves once the viewer has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

impl RenderSurface for ChannelSurface {
    fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }

    fn present(&mut self, output: SurfaceOutput) -> Result<Presented, RenderError> {
        let skippable = matches!(output, SurfaceOutput::Frame(_));
        match self.tx.try_send(output.into()) {
            Ok(()) => Ok(Presented::Shown),
            Err(mpsc::error::TrySendError::Full(_)) if skippable => Ok(Presented::Skipped),
            Err(mpsc::error::TrySendError::Full(_)) => Err(RenderError::SurfaceLost(
                "visualization stream is not being read".to_string(),
            )),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RenderError::SurfaceLost(
                "visualization stream closed".to_string(),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Restart,
    ToggleViewMode,
    Shutdown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown visualization session {0}")]
    UnknownSession(u64),
    #[error("Visualization session {0} has already ended")]
    SessionEnded(u64),
    #[error("Visualization session {0} is busy, try again")]
    Busy(u64),
}

/// Live sessions by id.
#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    next_id: Arc<AtomicU64>,
    sessions: Arc<Mutex<HashMap<u64, mpsc::Sender<SessionCommand>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, commands: mpsc::Sender<SessionCommand>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(id, commands);
        id
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<SessionCommand>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delivers `command` to session `id`.
    pub fn send(&self, id: u64, command: SessionCommand) -> Result<(), SessionError> {
        let sender = self
            .lock()
            .get(&id)
            .cloned()
            .ok_or(SessionError::UnknownSession(id))?;
        sender.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Closed(_) => {
                self.remove(id);
                SessionError::SessionEnded(id)
            }
            mpsc::error::TrySendError::Full(_) => {
                tracing::debug!(id, ?command, "session command queue full, dropping");
                SessionError::Busy(id)
            }
        })
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned to the HTTP layer for a freshly started session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: u64,
    pub events: mpsc::Receiver<VisualizationEvent>,
}

/// Builds the scene for `plan` and starts animating it on a new task.
///
/// The first events on the stream are `SessionStarted` and `SceneBuilt`.
///
/// # Errors
/// `RenderError` when the scene cannot be built.
pub fn spawn_session(
    registry: &SessionRegistry,
    container: &ContainerSpec,
    plan: &PlacementPlan,
    units: &[CargoUnit],
    timing: AnimationTiming,
) -> Result<SessionHandle, RenderError> {
    let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
    let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
    let surface = ChannelSurface::new(event_tx);
    let id = registry.register(command_tx);

    surface.try_notify(VisualizationEvent::SessionStarted {
        session_id: id,
        total: plan.slots.len(),
        unplaced: plan.unplaced,
    });

    let clock = Instant::now();
    let driver = match AnimationDriver::build(
        surface,
        container,
        &plan.slots,
        units,
        timing,
        Duration::ZERO,
    ) {
        Ok(driver) => driver,
        Err(err) => {
            registry.remove(id);
            return Err(err);
        }
    };

    tracing::info!(
        session = id,
        objects = plan.slots.len(),
        unplaced = plan.unplaced,
        "visualization session started"
    );

    let registry = registry.clone();
    tokio::spawn(async move {
        run_session(driver, commands, clock, timing.frame_interval).await;
        registry.remove(id);
        tracing::info!(session = id, "visualization session ended");
    });

    Ok(SessionHandle { id, events })
}

/// Host loop: ticks the driver every `frame_interval` while it has work or
/// a skipped frame to redraw, applies commands, and disposes the scene on
/// the way out.
pub async fn run_session(
    mut driver: AnimationDriver<ChannelSurface>,
    mut commands: mpsc::Receiver<SessionCommand>,
    clock: Instant,
    frame_interval: Duration,
) {
    let surface = driver.scene().surface().clone();
    let ticket = driver.ticket();
    let mut ticker = tokio::time::interval(frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick(), if driver.wants_tick() || driver.has_pending_frame() => {
                if !driver.wants_tick() {
                    if let Err(err) = driver.redraw() {
                        tracing::debug!(%err, "stopping session");
                        break;
                    }
                    continue;
                }
                match driver.tick(ticket, clock.elapsed()) {
                    Ok(TickOutcome::Continue) => {}
                    Ok(TickOutcome::Stop) => {
                        if !surface.notify(VisualizationEvent::Completed).await {
                            break;
                        }
                    }
                    Ok(TickOutcome::Stale) => break,
                    Err(err) => {
                        tracing::debug!(%err, "stopping session");
                        break;
                    }
                }
            }
            command = commands.recv() => {
                let result = match command {
                    Some(SessionCommand::Restart) => {
                        tracing::debug!("restarting animation");
                        driver.restart(clock.elapsed())
                    }
                    Some(SessionCommand::ToggleViewMode) => {
                        let mode = driver.toggle_view_mode();
                        tracing::debug!(?mode, "view mode toggled");
                        driver.redraw()
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                };
                if let Err(err) = result {
                    tracing::debug!(%err, "stopping session");
                    break;
                }
            }
            _ = surface.closed() => break,
        }
    }

    driver.dispose();
}
