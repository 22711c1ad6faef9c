//! Model registry
//!
//! Single source of truth for per-category pipeline readiness.
//!
//! # Slot Lifecycle
//! ```text
//! NotLoaded ──► Loading ──► Ready(handle)
//!                   └─────► Failed(error)
//! ```
//! The key set is fixed at construction. Transitions are only legal along the
//! arrows above, so each slot reaches exactly one terminal state exactly once.
//! After every slot is terminal the registry is read-only for the rest of the
//! process; readers clone the handle `Arc` out and never hold the slot lock
//! across an invocation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;

use crate::pipeline::Pipeline;
use crate::types::{Category, PipelineSpec};

/// Slot lifecycle state
///
/// The handle exists only in `Ready` and the error only in `Failed`.
#[derive(Clone)]
pub enum SlotState {
    NotLoaded,
    Loading,
    Ready(Arc<dyn Pipeline>),
    Failed(String),
}

impl SlotState {
    pub fn status(&self) -> SlotStatus {
        match self {
            SlotState::NotLoaded => SlotStatus::NotLoaded,
            SlotState::Loading => SlotStatus::Loading,
            SlotState::Ready(_) => SlotStatus::Ready,
            SlotState::Failed(_) => SlotStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotState::Ready(_) | SlotState::Failed(_))
    }
}

impl std::fmt::Debug for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::NotLoaded => f.write_str("NotLoaded"),
            SlotState::Loading => f.write_str("Loading"),
            SlotState::Ready(_) => f.write_str("Ready(<pipeline>)"),
            SlotState::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// Handle-free view of a slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

/// Registry errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Category '{0}' configured more than once")]
    DuplicateCategory(Category),

    #[error("Category '{0}' is not configured")]
    UnknownCategory(Category),

    #[error("Illegal transition for '{category}': {from:?} -> {to:?}")]
    IllegalTransition {
        category: Category,
        from: SlotStatus,
        to: SlotStatus,
    },
}

struct SlotRecord {
    state: SlotState,
    changed_at: DateTime<Utc>,
}

/// One registry entry
pub struct ModelSlot {
    spec: PipelineSpec,
    record: RwLock<SlotRecord>,
}

impl ModelSlot {
    fn read(&self) -> (SlotState, DateTime<Utc>) {
        let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
        (record.state.clone(), record.changed_at)
    }
}

/// Point-in-time copy of one slot
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub spec: PipelineSpec,
    pub state: SlotState,
    pub changed_at: DateTime<Utc>,
}

impl SlotSnapshot {
    pub fn pipeline(&self) -> Option<Arc<dyn Pipeline>> {
        match &self.state {
            SlotState::Ready(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SlotState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Point-in-time copy of the whole registry
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub slots: BTreeMap<Category, SlotSnapshot>,
    /// When the last slot reached a terminal state
    pub settled_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    /// Bootstrap is done (some slots may have failed)
    pub fn overall_ready(&self) -> bool {
        self.settled_at.is_some()
    }

    pub fn get(&self, category: Category) -> Option<&SlotSnapshot> {
        self.slots.get(&category)
    }

    pub fn ready_categories(&self) -> Vec<Category> {
        self.slots
            .iter()
            .filter(|(_, s)| s.state.status() == SlotStatus::Ready)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn unready_categories(&self) -> Vec<Category> {
        self.slots
            .iter()
            .filter(|(_, s)| s.state.status() != SlotStatus::Ready)
            .map(|(c, _)| *c)
            .collect()
    }
}

/// Mapping of every configured category to its slot
pub struct ModelRegistry {
    slots: BTreeMap<Category, ModelSlot>,
    settled: watch::Sender<Option<DateTime<Utc>>>,
}

impl ModelRegistry {
    /// Construct with every slot `NotLoaded`
    ///
    /// An empty spec list is settled immediately.
    pub fn new(specs: Vec<PipelineSpec>) -> Result<Self, RegistryError> {
        let now = Utc::now();
        let mut slots = BTreeMap::new();
        for spec in specs {
            let category = spec.category;
            let slot = ModelSlot {
                spec,
                record: RwLock::new(SlotRecord {
                    state: SlotState::NotLoaded,
                    changed_at: now,
                }),
            };
            if slots.insert(category, slot).is_some() {
                return Err(RegistryError::DuplicateCategory(category));
            }
        }

        let initial = if slots.is_empty() { Some(now) } else { None };
        let (settled, _) = watch::channel(initial);
        Ok(Self { slots, settled })
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.slots.keys().copied()
    }

    pub fn specs(&self) -> impl Iterator<Item = &PipelineSpec> + '_ {
        self.slots.values().map(|s| &s.spec)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.slots.contains_key(&category)
    }

    /// Current view of one slot; `None` only for categories outside the key set
    pub fn get(&self, category: Category) -> Option<SlotSnapshot> {
        self.slots.get(&category).map(|slot| {
            let (state, changed_at) = slot.read();
            SlotSnapshot {
                spec: slot.spec.clone(),
                state,
                changed_at,
            }
        })
    }

    /// Ready handle for a category, if any
    pub fn ready_pipeline(&self, category: Category) -> Option<Arc<dyn Pipeline>> {
        self.get(category).and_then(|s| s.pipeline())
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let settled_at = *self.settled.borrow();
        let slots = self
            .slots
            .keys()
            .filter_map(|&c| self.get(c).map(|s| (c, s)))
            .collect();
        RegistrySnapshot { slots, settled_at }
    }

    /// True once every slot is `Ready` or `Failed`
    pub fn overall_ready(&self) -> bool {
        self.settled.borrow().is_some()
    }

    /// Wait until every slot is terminal
    pub async fn wait_until_settled(&self) {
        let mut rx = self.settled.subscribe();
        // The sender lives in `self`, so the channel cannot close while borrowed
        let _ = rx.wait_for(|settled| settled.is_some()).await;
    }

    /// Apply a lifecycle transition
    ///
    /// Only the bootstrapper drives transitions.
    pub(crate) fn transition(&self, category: Category, next: SlotState) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .get(&category)
            .ok_or(RegistryError::UnknownCategory(category))?;

        {
            let mut record = slot.record.write().unwrap_or_else(PoisonError::into_inner);
            let from = record.state.status();
            let to = next.status();
            let legal = matches!(
                (from, to),
                (SlotStatus::NotLoaded, SlotStatus::Loading)
                    | (SlotStatus::Loading, SlotStatus::Ready)
                    | (SlotStatus::Loading, SlotStatus::Failed)
            );
            if !legal {
                return Err(RegistryError::IllegalTransition { category, from, to });
            }
            record.state = next;
            record.changed_at = Utc::now();
        }

        if self.all_terminal() {
            self.settled.send_if_modified(|settled| {
                if settled.is_none() {
                    *settled = Some(Utc::now());
                    true
                } else {
                    false
                }
            });
        }
        Ok(())
    }

    fn all_terminal(&self) -> bool {
        self.slots.values().all(|slot| slot.read().0.is_terminal())
    }
}
