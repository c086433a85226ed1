//! Time-ordered event queue shared by the scheduler and every person.
//!
//! Entries are keyed by (time, insertion sequence) so simultaneous events
//! drain in a stable order. Cancellation only flips the executable flag; the
//! drain skips cancelled entries instead of removing them early.

use std::collections::BTreeMap;

use crate::model::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct EventEntry<P> {
    pub time: i32,
    pub executable: bool,
    pub payload: P,
}

#[derive(Debug, Clone)]
pub struct EventQueue<P> {
    entries: BTreeMap<(i32, u64), EventEntry<P>>,
    next_seq: u64,
}

impl<P> Default for EventQueue<P> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<P> EventQueue<P> {
    /// Insert an event, rejecting times outside [current_time, end_time].
    pub fn schedule(
        &mut self,
        time: i32,
        payload: P,
        current_time: i32,
        end_time: i32,
        event_name: &str,
    ) -> Result<()> {
        if time < current_time || time > end_time {
            return Err(SimError::ScheduleOutOfRange {
                event: event_name.to_string(),
                time,
                current_time,
                end_time,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            (time, seq),
            EventEntry {
                time,
                executable: true,
                payload,
            },
        );
        Ok(())
    }

    /// Remove and return every entry with time <= `time`, in order. Entries
    /// scheduled during execution are picked up by calling this again.
    pub fn take_due(&mut self, time: i32) -> Vec<EventEntry<P>> {
        let mut due = Vec::new();
        while let Some((&key, _)) = self.entries.iter().next() {
            if key.0 > time {
                break;
            }
            let (_, entry) = self.entries.remove_entry(&key).expect("key just observed");
            due.push(entry);
        }
        due
    }

    pub fn cancel_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.executable = false;
        }
    }

    /// Mark every entry matching the predicate non-executable.
    pub fn cancel_where<F: Fn(&P) -> bool>(&mut self, predicate: F) {
        for entry in self.entries.values_mut() {
            if predicate(&entry.payload) {
                entry.executable = false;
            }
        }
    }

    #[must_use]
    pub fn has_where<F: Fn(&P) -> bool>(&self, predicate: F) -> bool {
        self.entries
            .values()
            .any(|e| e.executable && predicate(&e.payload))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventEntry<P>> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every remaining entry is cancelled.
    #[must_use]
    pub fn all_cancelled(&self) -> bool {
        self.entries.values().all(|e| !e.executable)
    }
}
