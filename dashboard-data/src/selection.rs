//! Shared selection state and its synchronous change notification.
//!
//! [`SelectionSync`] owns the single [`SelectionState`] of the dashboard. Panels never mutate
//! it directly: they subscribe, receive a snapshot with every effective change and decide from
//! their [`PanelBinding`] whether to re-fetch.

use chrono::NaiveDate;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Currently selected entity and the start of the shared date range.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct SelectionState {
    pub active_entity: Option<String>,
    pub date_range_start: NaiveDate,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub enum SelectionChange {
    EntityChanged,
    DateRangeChanged,
}

/// Notification delivered to every subscriber after an effective mutation.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct SelectionEvent {
    pub change: SelectionChange,
    pub state: SelectionState,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From)]
pub struct SubscriptionId(pub u64);

/// How a panel relates to the shared selection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub enum PanelRole {
    /// Source of the entity selection, never re-fetched because of it.
    Master,
    /// Keyed by the active entity.
    Detail,
    /// Ignores the shared selection.
    Standalone,
}

/// Which selection changes invalidate a panel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct PanelBinding {
    pub role: PanelRole,
    pub entity_bound: bool,
    pub date_bound: bool,
}

impl PanelBinding {
    pub const STANDALONE: Self = Self {
        role: PanelRole::Standalone,
        entity_bound: false,
        date_bound: false,
    };

    pub fn master(date_bound: bool) -> Self {
        Self {
            role: PanelRole::Master,
            entity_bound: false,
            date_bound,
        }
    }

    pub fn detail(date_bound: bool) -> Self {
        Self {
            role: PanelRole::Detail,
            entity_bound: true,
            date_bound,
        }
    }

    /// Whether the panel must re-fetch after `change`.
    ///
    /// Entity-bound panels can only fetch once an entity is selected.
    pub fn requires_refetch(&self, event: &SelectionEvent) -> bool {
        if self.entity_bound && event.state.active_entity.is_none() {
            return false;
        }
        match event.change {
            SelectionChange::EntityChanged => self.entity_bound,
            SelectionChange::DateRangeChanged => self.date_bound,
        }
    }
}

type Listener = Box<dyn FnMut(&SelectionEvent) + Send>;

/// Single source of truth for [`SelectionState`].
pub struct SelectionSync {
    state: SelectionState,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl std::fmt::Debug for SelectionSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionSync")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SelectionSync {
    pub fn new(date_range_start: NaiveDate) -> Self {
        Self {
            state: SelectionState {
                active_entity: None,
                date_range_start,
            },
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn active_entity(&self) -> Option<&str> {
        self.state.active_entity.as_deref()
    }

    pub fn date_range_start(&self) -> NaiveDate {
        self.state.date_range_start
    }

    /// Register a listener, notified in subscription order.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SelectionEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Select an entity. Returns whether the state changed (and listeners ran).
    pub fn set_active_entity<S: Into<String>>(&mut self, entity: S) -> bool {
        let entity = entity.into();
        if self.state.active_entity.as_deref() == Some(entity.as_str()) {
            return false;
        }
        self.state.active_entity = Some(entity);
        self.notify(SelectionChange::EntityChanged);
        true
    }

    /// Move the start of the shared date range. Returns whether the state changed.
    pub fn set_date_range_start(&mut self, date: NaiveDate) -> bool {
        if self.state.date_range_start == date {
            return false;
        }
        self.state.date_range_start = date;
        self.notify(SelectionChange::DateRangeChanged);
        true
    }

    fn notify(&mut self, change: SelectionChange) {
        let event = SelectionEvent {
            change,
            state: self.state.clone(),
        };
        debug!(%change, listeners = self.listeners.len(), state = ?event.state, "selection changed");
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}
