//! Zone Lifecycle Manager
//!
//! Per-zone orchestration: fetch the zone's descriptors from the registry,
//! restore saved state, mount widgets behind a per-slot isolation boundary,
//! forward state-change events into the state store, and unmount at
//! teardown. One manager instance drives one activation of one zone.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use atrium_core::{Error, PluginDescriptor, PluginError, PluginId, Result, Section, Widget};

use crate::events::{
    restore_event, EventBus, SubscriptionToken, STATE_CHANGE_EVENT, UNREGISTERED_EVENT,
};
use crate::registry::PluginRegistry;
use crate::state::StateStore;

/// Phase of a zone's lifecycle state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZonePhase {
    /// Constructed, not yet activated.
    Idle,

    /// Fetching descriptors, restoring state, mounting widgets.
    Loading,

    /// All slots mounted (or isolated); serving state changes.
    Ready,

    /// Persisting one state change.
    Updating,

    /// Deactivated; slots unmounted and subscriptions released.
    TornDown,
}

impl ZonePhase {
    /// Check if a transition to the given phase is valid.
    ///
    /// Teardown is reachable from every live phase; the forward path is
    /// `Idle → Loading → Ready ⇄ Updating`.
    pub fn can_transition_to(&self, next: ZonePhase) -> bool {
        if *self == ZonePhase::TornDown {
            return false;
        }
        match next {
            ZonePhase::Idle => false,
            ZonePhase::Loading => *self == ZonePhase::Idle,
            ZonePhase::Ready => matches!(self, ZonePhase::Loading | ZonePhase::Updating),
            ZonePhase::Updating => *self == ZonePhase::Ready,
            ZonePhase::TornDown => true,
        }
    }
}

impl fmt::Display for ZonePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Loading => write!(f, "Loading"),
            Self::Ready => write!(f, "Ready"),
            Self::Updating => write!(f, "Updating"),
            Self::TornDown => write!(f, "TornDown"),
        }
    }
}

/// Outcome of instantiating one plugin in a zone.
pub enum SlotOutcome {
    /// The widget restored and mounted normally.
    Mounted(Box<dyn Widget>),

    /// The plugin failed to restore or mount; the host renders a
    /// placeholder for this slot only.
    Failed(PluginError),
}

impl SlotOutcome {
    /// Whether this slot holds a mounted widget.
    pub fn is_mounted(&self) -> bool {
        matches!(self, Self::Mounted(_))
    }
}

impl fmt::Debug for SlotOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mounted(widget) => f.debug_tuple("Mounted").field(&widget.name()).finish(),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// One plugin slot in a rendered zone, in display order.
pub struct ZoneSlot {
    pub descriptor: PluginDescriptor,
    pub outcome: SlotOutcome,
}

/// A plugin this zone is responsible for after activation.
struct ManagedPlugin {
    descriptor: PluginDescriptor,
    mounted: bool,
}

/// A state change lifted off the bus, awaiting persistence.
struct StateChange {
    id: PluginId,
    state: Value,
}

/// Orchestrates one placement zone: load, restore, mount, update, unmount.
///
/// A zone owns the slots it mounted, the bus subscriptions it created, and a
/// single forwarding task that serializes state-change persistence (the
/// zone's one logical owner). `activate` must run inside a tokio runtime.
pub struct ZoneManager {
    section: Section,
    registry: Arc<PluginRegistry>,
    events: EventBus,
    state: Arc<StateStore>,
    channel_capacity: usize,
    phase: Arc<Mutex<ZonePhase>>,
    managed: Arc<Mutex<Vec<ManagedPlugin>>>,
    subscriptions: Mutex<Vec<SubscriptionToken>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl ZoneManager {
    /// Create a manager for `section`. No work happens until [`Self::activate`].
    pub fn new(
        section: Section,
        registry: Arc<PluginRegistry>,
        events: EventBus,
        state: Arc<StateStore>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            section,
            registry,
            events,
            state,
            channel_capacity,
            phase: Arc::new(Mutex::new(ZonePhase::Idle)),
            managed: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Mutex::new(Vec::new()),
            forwarder: Mutex::new(None),
        }
    }

    /// The section this manager drives.
    pub fn section(&self) -> Section {
        self.section
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ZonePhase {
        *self.phase.lock()
    }

    /// Activate the zone: mount every enabled plugin registered for this
    /// section, in display order, and return the resulting slots.
    ///
    /// A single plugin's restore or mount failure isolates that plugin: its
    /// slot carries the error and the rest of the zone proceeds.
    pub async fn activate(&self) -> Result<Vec<ZoneSlot>> {
        self.transition(ZonePhase::Loading)?;
        info!("Activating zone: {}", self.section);

        let descriptors = self.registry.get_by_section(self.section);

        // Wire the zone's subscriptions before anything mounts so nothing a
        // mount publishes is missed.
        self.wire_subscriptions();

        let mut slots = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if !descriptor.config.enabled {
                debug!("Skipping disabled plugin: {}", descriptor.id);
                continue;
            }

            let outcome = match self.restore_and_mount(&descriptor).await {
                Ok(widget) => SlotOutcome::Mounted(widget),
                Err(err) => {
                    warn!("Isolating failed plugin slot: {}", err);
                    SlotOutcome::Failed(err)
                }
            };

            self.managed.lock().push(ManagedPlugin {
                descriptor: descriptor.clone(),
                mounted: outcome.is_mounted(),
            });
            slots.push(ZoneSlot { descriptor, outcome });
        }

        self.transition(ZonePhase::Ready)?;
        info!(
            "Zone {} ready: {} mounted, {} failed",
            self.section,
            slots.iter().filter(|s| s.outcome.is_mounted()).count(),
            slots.iter().filter(|s| !s.outcome.is_mounted()).count()
        );
        Ok(slots)
    }

    /// Deactivate the zone: unmount every mounted plugin (best-effort),
    /// release every subscription exactly once, and stop the forwarding
    /// task. Idempotent.
    pub fn teardown(&self) {
        {
            let mut phase = self.phase.lock();
            if *phase == ZonePhase::TornDown {
                return;
            }
            *phase = ZonePhase::TornDown;
        }
        info!("Tearing down zone: {}", self.section);

        // Drain under the lock, unmount outside it; hooks are opaque code
        // and may publish events of their own.
        let drained: Vec<ManagedPlugin> = {
            let mut managed = self.managed.lock();
            managed.drain(..).collect()
        };
        for plugin in drained {
            if !plugin.mounted {
                continue;
            }
            unmount(&plugin.descriptor);
        }

        for token in self.subscriptions.lock().drain(..) {
            token.unsubscribe();
        }

        if let Some(handle) = self.forwarder.lock().take() {
            handle.abort();
        }
    }

    /// Restore saved state and construct the plugin's widget.
    ///
    /// State restore is delivered as a `"<id>:restore"` publication so the
    /// plugin can pick it up during its own mount.
    async fn restore_and_mount(
        &self,
        descriptor: &PluginDescriptor,
    ) -> std::result::Result<Box<dyn Widget>, PluginError> {
        let fault = |cause: String| PluginError::Runtime {
            id: descriptor.id.clone(),
            cause,
        };

        let saved = self
            .state
            .load(&descriptor.id)
            .await
            .map_err(|e| fault(e.to_string()))?;
        if let Some(state) = saved {
            self.events.publish(&restore_event(&descriptor.id), &state);
        }

        let widget = (descriptor.factory)(&descriptor.config).map_err(|e| fault(e.to_string()))?;

        if let Some(on_mount) = &descriptor.lifecycle.on_mount {
            on_mount().map_err(|e| fault(e.to_string()))?;
        }

        debug!("Mounted plugin: {}", descriptor.id);
        Ok(widget)
    }

    /// Subscribe to the runtime protocol events and start the forwarding
    /// task that persists state changes in arrival order.
    fn wire_subscriptions(&self) {
        let (tx, mut rx) = mpsc::channel::<StateChange>(self.channel_capacity);

        let state = Arc::clone(&self.state);
        let managed = Arc::clone(&self.managed);
        let phase = Arc::clone(&self.phase);
        let handle = tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                if *phase.lock() == ZonePhase::TornDown {
                    break;
                }

                // Ready -> Updating -> Ready around each persisted change.
                // A change arriving while the zone is still loading is
                // persisted without the phase excursion.
                let entered_updating = try_transition(&phase, ZonePhase::Updating);

                if let Err(e) = state.save(&change.id, &change.state).await {
                    warn!("Failed to persist state for plugin {}: {}", change.id, e);
                } else {
                    let hook = {
                        let managed = managed.lock();
                        managed
                            .iter()
                            .find(|m| m.descriptor.id == change.id)
                            .map(|m| {
                                (
                                    m.descriptor.config.clone(),
                                    m.descriptor.lifecycle.on_update.clone(),
                                )
                            })
                    };
                    if let Some((prev_config, Some(on_update))) = hook {
                        if let Err(e) = on_update(&prev_config) {
                            warn!("on_update failed for plugin {}: {}", change.id, e);
                        }
                    }
                }

                if entered_updating {
                    try_transition(&phase, ZonePhase::Ready);
                }
            }
        });
        *self.forwarder.lock() = Some(handle);

        // State changes from plugins this zone manages are queued for the
        // forwarding task; other zones' plugins are ignored.
        let managed = Arc::clone(&self.managed);
        let state_change = self.events.subscribe(STATE_CHANGE_EVENT, move |payload| {
            let Some(id) = payload.get("pluginId").and_then(Value::as_str) else {
                anyhow::bail!("stateChange payload missing pluginId");
            };
            let id = PluginId::new(id);
            if !managed.lock().iter().any(|m| m.descriptor.id == id) {
                return Ok(());
            }
            let change = StateChange {
                id,
                state: payload.get("state").cloned().unwrap_or(Value::Null),
            };
            tx.try_send(change)
                .map_err(|e| anyhow::anyhow!("state-change queue unavailable: {}", e))?;
            Ok(())
        });

        // An unregistered plugin is unmounted immediately and no longer
        // managed; its own subscriptions are its owner's to release.
        let managed = Arc::clone(&self.managed);
        let unregistered = self.events.subscribe(UNREGISTERED_EVENT, move |payload| {
            let Some(id) = payload.get("pluginId").and_then(Value::as_str) else {
                anyhow::bail!("unregistered payload missing pluginId");
            };
            let removed = {
                let mut managed = managed.lock();
                managed
                    .iter()
                    .position(|m| m.descriptor.id.as_str() == id)
                    .map(|pos| managed.remove(pos))
            };
            if let Some(plugin) = removed {
                if plugin.mounted {
                    unmount(&plugin.descriptor);
                }
            }
            Ok(())
        });

        let mut subscriptions = self.subscriptions.lock();
        subscriptions.push(state_change);
        subscriptions.push(unregistered);
    }

    fn transition(&self, next: ZonePhase) -> Result<()> {
        let mut phase = self.phase.lock();
        if !phase.can_transition_to(next) {
            return Err(Error::Runtime(format!(
                "invalid zone transition: {} -> {}",
                *phase, next
            )));
        }
        debug!("Zone {} phase: {} -> {}", self.section, *phase, next);
        *phase = next;
        Ok(())
    }
}

/// Invoke a plugin's `on_unmount` hook. Best-effort: failures are logged,
/// never raised.
fn unmount(descriptor: &PluginDescriptor) {
    if let Some(on_unmount) = &descriptor.lifecycle.on_unmount {
        if let Err(e) = on_unmount() {
            warn!("on_unmount failed for plugin {}: {}", descriptor.id, e);
        }
    }
    debug!("Unmounted plugin: {}", descriptor.id);
}

fn try_transition(phase: &Mutex<ZonePhase>, next: ZonePhase) -> bool {
    let mut guard = phase.lock();
    if guard.can_transition_to(next) {
        *guard = next;
        true
    } else {
        false
    }
}
