//! Discrete-day scheduler: current time, calendar date and the world event
//! queue. Per-person queues live on the persons themselves.

use chrono::NaiveDate;

use crate::model::events::queue::{EventEntry, EventQueue};
use crate::model::events::WorldEvent;
use crate::model::time;

pub struct Scheduler {
    current_time: i32,
    starting_date: NaiveDate,
    total_time: i32,
    queue: EventQueue<WorldEvent>,
}

impl Scheduler {
    #[must_use]
    pub fn new(starting_date: NaiveDate, total_time: i32) -> Self {
        Self {
            current_time: 0,
            starting_date,
            total_time,
            queue: EventQueue::default(),
        }
    }

    #[must_use]
    pub fn current_time(&self) -> i32 {
        self.current_time
    }

    #[must_use]
    pub fn total_time(&self) -> i32 {
        self.total_time
    }

    /// Day 0 is the configured starting date; the calendar advances exactly
    /// one day per step.
    #[must_use]
    pub fn calendar_date(&self) -> NaiveDate {
        time::add_days(self.starting_date, self.current_time)
    }

    #[must_use]
    pub fn starting_date(&self) -> NaiveDate {
        self.starting_date
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.current_time >= self.total_time
    }

    #[must_use]
    pub fn days_to_next_year(&self) -> i32 {
        time::days_to_next_year(self.calendar_date())
    }

    /// Day index of a calendar date relative to the starting date.
    #[must_use]
    pub fn day_of(&self, date: NaiveDate) -> i32 {
        time::days_between(self.starting_date, date)
    }

    /// Queue a world event; out-of-range times are logged and dropped.
    pub fn schedule_world_event(&mut self, run_at: i32, event: WorldEvent) {
        let name = event.name();
        if let Err(e) = self
            .queue
            .schedule(run_at, event, self.current_time, self.total_time, name)
        {
            if run_at > self.total_time {
                tracing::debug!(error = %e, "dropping world event");
            } else {
                tracing::error!(error = %e, "dropping world event");
            }
        }
    }

    /// Drain world events due at or before the current day. Call repeatedly
    /// until empty so same-day events scheduled during the drain still run.
    pub fn take_due_world_events(&mut self) -> Vec<EventEntry<WorldEvent>> {
        self.queue.take_due(self.current_time)
    }

    #[must_use]
    pub fn pending_world_events(&self) -> usize {
        self.queue.len()
    }

    pub fn advance(&mut self) {
        self.current_time += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Scheduler {
        Scheduler::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 3650)
    }

    #[test]
    fn test_calendar_tracks_current_day() {
        let mut s = scheduler();
        assert_eq!(s.calendar_date(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        for _ in 0..31 {
            s.advance();
        }
        assert_eq!(s.calendar_date(), NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
    }

    #[test]
    fn test_rejects_past_and_beyond_end() {
        let mut s = scheduler();
        s.advance();
        s.schedule_world_event(0, WorldEvent::TurnOnMutation);
        s.schedule_world_event(9999, WorldEvent::TurnOnMutation);
        assert_eq!(s.pending_world_events(), 0);
        s.schedule_world_event(5, WorldEvent::TurnOnMutation);
        assert_eq!(s.pending_world_events(), 1);
    }

    #[test]
    fn test_take_due_is_idempotent_without_new_events() {
        let mut s = scheduler();
        s.schedule_world_event(0, WorldEvent::TurnOnMutation);
        assert_eq!(s.take_due_world_events().len(), 1);
        assert!(s.take_due_world_events().is_empty());
        assert!(s.take_due_world_events().is_empty());
    }
}
