//! Scroll Position Store
//!
//! Remembers the vertical scroll offset of each route so that going back to a
//! page lands where the reader left it. Records are kept in save order and
//! persisted as one JSON list; when the list grows past its capacity the
//! least recently saved record is dropped.
//!
//! If the storage medium fails the store keeps working from memory for the
//! rest of the session.

use crate::platform::{Clock, Page};
use crate::route::RouteKey;
use crate::storage::{keys, load_json, save_json, KeyValueStore, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Scroll store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Maximum number of routes remembered
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Remove a record once it has been restored
    #[serde(default)]
    pub discard_on_restore: bool,
}

fn default_capacity() -> usize {
    50
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            discard_on_restore: false,
        }
    }
}

/// Saved scroll offset of one route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollRecord {
    pub route_key: RouteKey,
    pub offset_y: u32,
    pub saved_at: DateTime<Utc>,
}

/// Bounded, persisted map from route key to scroll offset
pub struct ScrollStore {
    config: ScrollConfig,
    page: Rc<dyn Page>,
    storage: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
    records: RefCell<Vec<ScrollRecord>>,
    degraded: Cell<bool>,
}

impl ScrollStore {
    /// Create the store and load persisted records.
    pub fn new(
        config: ScrollConfig,
        page: Rc<dyn Page>,
        storage: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let capacity = config.capacity.max(1);
        let (mut records, degraded) =
            match load_json::<Vec<ScrollRecord>>(storage.as_ref(), keys::SCROLL_RECORDS) {
                Ok(records) => (records.unwrap_or_default(), false),
                Err(StorageError::Serialization(e)) => {
                    tracing::warn!("Discarding unreadable scroll records: {}", e);
                    (Vec::new(), false)
                }
                Err(e) => {
                    tracing::warn!("Scroll records unavailable, keeping them in memory: {}", e);
                    (Vec::new(), true)
                }
            };

        if records.len() > capacity {
            records.drain(..records.len() - capacity);
        }
        tracing::debug!(records = records.len(), capacity, "Scroll store loaded");

        Self {
            config: ScrollConfig {
                capacity,
                ..config
            },
            page,
            storage,
            clock,
            records: RefCell::new(records),
            degraded: Cell::new(degraded),
        }
    }

    /// Save the page's current offset for `route`.
    pub fn save(&self, route: &RouteKey) -> u32 {
        let offset = to_offset(self.page.scroll_y());
        self.record(route, offset);
        offset
    }

    /// Save an explicit offset for `route`, replacing any previous record.
    pub fn record(&self, route: &RouteKey, offset_y: u32) {
        {
            let mut records = self.records.borrow_mut();
            records.retain(|r| &r.route_key != route);
            records.push(ScrollRecord {
                route_key: route.clone(),
                offset_y,
                saved_at: self.clock.now(),
            });

            let overflow = records.len().saturating_sub(self.config.capacity);
            if overflow > 0 {
                records.drain(..overflow);
                tracing::debug!(evicted = overflow, "Scroll records evicted");
            }
        }

        tracing::debug!(route = %route, offset_y, "Scroll position saved");
        self.persist();
    }

    /// Scroll to the saved offset of `route`, or to the top when none is saved.
    /// Returns the offset scrolled to.
    pub fn restore(&self, route: &RouteKey) -> u32 {
        let offset = self.get(route).map(|r| r.offset_y).unwrap_or(0);
        self.page.scroll_to(f64::from(offset));
        tracing::debug!(route = %route, offset_y = offset, "Scroll position restored");

        if self.config.discard_on_restore && self.remove(route) {
            self.persist();
        }
        offset
    }

    /// Scroll to the top.
    pub fn reset(&self) {
        self.page.scroll_to(0.0);
    }

    pub fn get(&self, route: &RouteKey) -> Option<ScrollRecord> {
        self.records
            .borrow()
            .iter()
            .find(|r| &r.route_key == route)
            .cloned()
    }

    /// All records, least recently saved first
    pub fn records(&self) -> Vec<ScrollRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Whether the store has fallen back to memory only
    pub fn is_degraded(&self) -> bool {
        self.degraded.get()
    }

    /// Forget every record, in memory and in storage.
    pub fn clear(&self) {
        self.records.borrow_mut().clear();
        if self.degraded.get() {
            return;
        }
        if let Err(e) = self.storage.remove(keys::SCROLL_RECORDS) {
            self.degrade(&e);
        }
    }

    fn remove(&self, route: &RouteKey) -> bool {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|r| &r.route_key != route);
        records.len() != before
    }

    fn persist(&self) {
        if self.degraded.get() {
            return;
        }
        let result = {
            let records = self.records.borrow();
            save_json(self.storage.as_ref(), keys::SCROLL_RECORDS, records.as_slice())
        };
        if let Err(e) = result {
            self.degrade(&e);
        }
    }

    fn degrade(&self, error: &dyn std::fmt::Display) {
        tracing::warn!("Scroll storage failed, keeping records in memory: {}", error);
        self.degraded.set(true);
    }
}

fn to_offset(y: f64) -> u32 {
    if y.is_finite() && y > 0.0 {
        y.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}
