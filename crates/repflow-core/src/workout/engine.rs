//! Workout execution engine.
//!
//! Like the timer it descends from, the engine is a wall-clock-based state
//! machine without internal threads. Triggers (countdown, voice, background
//! notification sync) only ever hand it an [`AdvanceToken`]; the engine
//! decides whether that token still names the current activity.
//!
//! ## State Transitions
//!
//! ```text
//! Running <-> Paused
//!    |          |
//!    +----+-----+
//!         v
//!      Complete
//! ```
//!
//! Draining the postponed queue overlays `Running`/`Paused`; it is a cursor
//! variant, not a state.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = WorkoutEngine::start(routine, Arc::new(SystemClock))?;
//! // In a loop:
//! if engine.time_expired() {
//!     engine.advance(engine.current_token());
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::timeline::{ActivityOutcome, ActivityRecord, CompletedSession};
use crate::clock::Clock;
use crate::error::RoutineError;
use crate::events::Event;
use crate::routine::{sequence, Activity, Position, Routine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutState {
    Running,
    Paused,
    Complete,
}

/// Names one activity start. Bumped every time the current activity changes,
/// so a late request for an activity already left behind is recognisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdvanceToken(u64);

impl AdvanceToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Where the engine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Normal(Position),
    /// Working through postponed activities. `saved` is the normal position
    /// that was active when draining began.
    Draining { queue_index: usize, saved: Position },
}

#[derive(Debug, Clone)]
struct PostponedEntry {
    activity: Activity,
    record: usize,
}

#[derive(Debug, Clone, Copy)]
struct ActivityTiming {
    started_at: DateTime<Utc>,
    paused_ms: u64,
    paused_since: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct WorkoutEngine {
    routine: Routine,
    clock: Arc<dyn Clock>,
    state: WorkoutState,
    cursor: Cursor,
    postponed: Vec<PostponedEntry>,
    token: AdvanceToken,
    timing: ActivityTiming,
    timeline: Vec<ActivityRecord>,
    current_record: usize,
    /// Positions skipped by starting mid-routine.
    start_offset: usize,
    /// Id of the `CompletedSession` this run produces.
    session_id: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    session_paused_ms: u64,
}

impl WorkoutEngine {
    /// Start a run at the first activity.
    ///
    /// # Errors
    ///
    /// Returns the routine's validation error; an invalid routine never runs.
    pub fn start(routine: Routine, clock: Arc<dyn Clock>) -> Result<Self, RoutineError> {
        Self::start_at_position(routine, Position::START, clock)
    }

    /// Start a run at an entry of the expanded sequence.
    ///
    /// # Errors
    ///
    /// Returns the routine's validation error, or
    /// [`RoutineError::StartOutOfRange`] for an index past the last entry.
    pub fn start_at(
        routine: Routine,
        sequence_index: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RoutineError> {
        routine.validate()?;
        let pos = sequence::position_for_index(&routine, sequence_index).ok_or_else(|| {
            RoutineError::StartOutOfRange {
                index: sequence_index,
                len: sequence::generate(&routine).len(),
            }
        })?;
        Self::start_at_position(routine, pos, clock)
    }

    fn start_at_position(
        routine: Routine,
        pos: Position,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RoutineError> {
        routine.validate()?;
        let now = clock.now();
        let start_offset = routine.positions_before(pos);
        let mut engine = Self {
            routine,
            clock,
            state: WorkoutState::Running,
            cursor: Cursor::Normal(pos),
            postponed: Vec::new(),
            token: AdvanceToken(0),
            timing: ActivityTiming {
                started_at: now,
                paused_ms: 0,
                paused_since: None,
            },
            timeline: Vec::new(),
            current_record: 0,
            start_offset,
            session_id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            completed_at: None,
            session_paused_ms: 0,
        };
        engine.begin_activity(now);
        info!(
            routine = %engine.routine.name,
            total = engine.total_activities(),
            "workout started"
        );
        Ok(engine)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> WorkoutState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn current_token(&self) -> AdvanceToken {
        self.token
    }

    pub fn is_draining(&self) -> bool {
        matches!(self.cursor, Cursor::Draining { .. })
    }

    pub fn postponed_len(&self) -> usize {
        self.postponed.len()
    }

    pub fn timeline(&self) -> &[ActivityRecord] {
        &self.timeline
    }

    /// Positions this run covers (the whole routine unless started mid-way).
    pub fn total_activities(&self) -> usize {
        self.routine.total_positions() - self.start_offset
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        match self.cursor {
            Cursor::Normal(pos) => self.routine.activity_at(pos),
            Cursor::Draining { queue_index, .. } => {
                self.postponed.get(queue_index).map(|e| &e.activity)
            }
        }
    }

    /// Whether the current activity may be deferred. An activity with nothing
    /// after it has no later point to come back at.
    pub fn can_defer(&self) -> bool {
        if self.state == WorkoutState::Complete {
            return false;
        }
        match self.cursor {
            Cursor::Normal(pos) => !self.routine.is_terminal(pos),
            Cursor::Draining { queue_index, .. } => queue_index + 1 < self.postponed.len(),
        }
    }

    /// When the current activity started (or resumed from the postponed queue).
    pub fn activity_started_at(&self) -> DateTime<Utc> {
        self.timing.started_at
    }

    /// Paused milliseconds of the current activity, including a pause in progress.
    pub fn activity_paused_ms(&self) -> u64 {
        self.timing.paused_ms + self.ongoing_pause_ms(self.clock.now())
    }

    /// Milliseconds the current activity has actually been running.
    pub fn active_elapsed_ms(&self) -> u64 {
        let now = self.clock.now();
        let wall = millis_between(self.timing.started_at, now);
        wall.saturating_sub(self.timing.paused_ms + self.ongoing_pause_ms(now))
    }

    /// Whole seconds left on a time-based activity, rounded up.
    /// `None` for reps-based activities and after completion.
    pub fn remaining_secs(&self) -> Option<u32> {
        if self.state == WorkoutState::Complete {
            return None;
        }
        let duration_ms = u64::from(self.current_activity()?.measurement.duration_secs()?) * 1000;
        let left_ms = duration_ms.saturating_sub(self.active_elapsed_ms());
        Some(left_ms.div_ceil(1000) as u32)
    }

    /// A running time-based activity has used up its duration.
    pub fn time_expired(&self) -> bool {
        self.state == WorkoutState::Running && self.remaining_secs() == Some(0)
    }

    /// 0.0 ..= 1.0 share of positions left behind. Held while draining,
    /// exactly 1.0 only once complete.
    pub fn progress(&self) -> f64 {
        if self.state == WorkoutState::Complete {
            return 1.0;
        }
        let total = self.routine.total_positions();
        if total == 0 {
            return 0.0;
        }
        let pos = match self.cursor {
            Cursor::Normal(pos) => pos,
            Cursor::Draining { saved, .. } => saved,
        };
        (self.routine.positions_before(pos) as f64 / total as f64).min(1.0)
    }

    pub fn started_event(&self) -> Event {
        Event::WorkoutStarted {
            routine_id: self.routine.id.clone(),
            routine_name: self.routine.name.clone(),
            total_activities: self.total_activities(),
            at: self.started_at,
        }
    }

    /// Event for the activity that is current right now.
    pub fn activity_started_event(&self) -> Option<Event> {
        if self.state == WorkoutState::Complete {
            return None;
        }
        let activity = self.current_activity()?;
        let record = self.timeline.get(self.current_record)?;
        Some(Event::ActivityStarted {
            token: self.token,
            activity_id: activity.id.clone(),
            activity_name: activity.name.clone(),
            measurement: activity.measurement,
            block_index: record.block_index,
            repetition: record.repetition,
            draining: self.is_draining(),
            can_defer: self.can_defer(),
            at: self.timing.started_at,
        })
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let activity = match self.state {
            WorkoutState::Complete => None,
            _ => self.current_activity(),
        };
        Event::StateSnapshot {
            state: self.state,
            activity_name: activity.map(|a| a.name.clone()),
            measurement: activity.map(|a| a.measurement),
            remaining_secs: self.remaining_secs(),
            progress: self.progress(),
            draining: self.is_draining(),
            postponed: self.postponed.len(),
            can_defer: self.can_defer(),
            at: self.clock.now(),
        }
    }

    /// The record handed to the history store. Only available once complete.
    pub fn completed_session(&self) -> Option<CompletedSession> {
        let completed_at = self.completed_at?;
        let count = |f: fn(&ActivityOutcome) -> bool| {
            self.timeline
                .iter()
                .filter(|r| r.outcome.as_ref().is_some_and(f))
                .count()
        };
        Some(CompletedSession {
            id: self.session_id.clone(),
            routine_id: self.routine.id.clone(),
            routine_name: self.routine.name.clone(),
            started_at: self.started_at,
            completed_at,
            duration_secs: millis_between(self.started_at, completed_at) / 1000,
            paused_secs: self.session_paused_ms / 1000,
            total_activities: self.total_activities(),
            completed_activities: count(ActivityOutcome::is_completed),
            skipped_activities: count(|o| *o == ActivityOutcome::Skipped),
            timeline: self.timeline.clone(),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != WorkoutState::Running {
            return None;
        }
        let now = self.clock.now();
        self.timing.paused_since = Some(now);
        self.state = WorkoutState::Paused;
        debug!(token = self.token.0, "paused");
        Some(Event::WorkoutPaused {
            remaining_secs: self.remaining_secs(),
            at: now,
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.state != WorkoutState::Paused {
            return None;
        }
        let now = self.clock.now();
        self.settle_pause(now);
        self.state = WorkoutState::Running;
        debug!(token = self.token.0, "resumed");
        Some(Event::WorkoutResumed {
            remaining_secs: self.remaining_secs(),
            at: now,
        })
    }

    pub fn toggle_pause(&mut self) -> Option<Event> {
        match self.state {
            WorkoutState::Running => self.pause(),
            WorkoutState::Paused => self.resume(),
            WorkoutState::Complete => None,
        }
    }

    /// Finish the current activity as completed and move on.
    ///
    /// A stale token (an activity already left behind) or a completed run
    /// makes this a no-op and returns no events.
    pub fn advance(&mut self, token: AdvanceToken) -> Vec<Event> {
        if !self.accepts(token) {
            debug!(token = token.0, current = self.token.0, "ignored stale advance");
            return Vec::new();
        }
        self.step(ActivityOutcome::Completed)
    }

    /// Leave the current activity for good.
    pub fn skip(&mut self, token: AdvanceToken) -> Vec<Event> {
        if !self.accepts(token) {
            return Vec::new();
        }
        self.step(ActivityOutcome::Skipped)
    }

    /// Queue the current activity for after the normal sequence. A no-op when
    /// [`can_defer`](Self::can_defer) is false.
    pub fn defer(&mut self, token: AdvanceToken) -> Vec<Event> {
        if !self.accepts(token) || !self.can_defer() {
            return Vec::new();
        }
        if let Some(activity) = self.current_activity().cloned() {
            self.postponed.push(PostponedEntry {
                activity,
                record: self.current_record,
            });
        }
        self.step(ActivityOutcome::Postponed)
    }

    /// Leave the run before completion. Consumes the engine; nothing is kept.
    pub fn abandon(self) -> Event {
        info!(routine = %self.routine.name, "workout abandoned");
        Event::WorkoutAbandoned {
            routine_id: self.routine.id,
            at: self.clock.now(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn accepts(&self, token: AdvanceToken) -> bool {
        self.state != WorkoutState::Complete && token == self.token
    }

    fn step(&mut self, outcome: ActivityOutcome) -> Vec<Event> {
        let now = self.clock.now();
        let mut events: Vec<Event> = self.finish_current(outcome, now).into_iter().collect();

        match self.cursor {
            Cursor::Draining { queue_index, saved } => {
                if queue_index + 1 < self.postponed.len() {
                    self.cursor = Cursor::Draining {
                        queue_index: queue_index + 1,
                        saved,
                    };
                } else {
                    self.postponed.clear();
                    match self.routine.next_position(saved) {
                        Some(next) => self.cursor = Cursor::Normal(next),
                        None => {
                            events.push(self.complete(now));
                            return events;
                        }
                    }
                }
            }
            Cursor::Normal(pos) => match self.routine.next_position(pos) {
                Some(next) => self.cursor = Cursor::Normal(next),
                None if !self.postponed.is_empty() => {
                    self.cursor = Cursor::Draining {
                        queue_index: 0,
                        saved: pos,
                    };
                    debug!(queued = self.postponed.len(), "draining postponed activities");
                    events.push(Event::DrainStarted {
                        queued: self.postponed.len(),
                        at: now,
                    });
                }
                None => {
                    events.push(self.complete(now));
                    return events;
                }
            },
        }

        self.begin_activity(now);
        events.extend(self.activity_started_event());
        events
    }

    fn begin_activity(&mut self, now: DateTime<Utc>) {
        self.token = AdvanceToken(self.token.0 + 1);
        self.timing = ActivityTiming {
            started_at: now,
            paused_ms: 0,
            paused_since: (self.state == WorkoutState::Paused).then_some(now),
        };

        match self.cursor {
            Cursor::Normal(pos) => {
                let Some(activity) = self.routine.activity_at(pos) else {
                    return;
                };
                self.timeline.push(ActivityRecord {
                    activity_id: activity.id.clone(),
                    activity_name: activity.name.clone(),
                    block_index: pos.block_index,
                    repetition: pos.repetition_number(),
                    outcome: None,
                    started_at: now,
                    ended_at: None,
                    paused_ms: 0,
                });
                self.current_record = self.timeline.len() - 1;
            }
            Cursor::Draining { queue_index, .. } => {
                let Some(entry) = self.postponed.get(queue_index) else {
                    return;
                };
                self.current_record = entry.record;
                // The record now describes the drained attempt.
                if let Some(record) = self.timeline.get_mut(entry.record) {
                    record.started_at = now;
                    record.ended_at = None;
                }
            }
        }
        debug!(token = self.token.0, cursor = ?self.cursor, "activity started");
    }

    fn finish_current(&mut self, outcome: ActivityOutcome, now: DateTime<Utc>) -> Option<Event> {
        self.settle_pause(now);
        let draining = self.is_draining();
        let record = self.timeline.get_mut(self.current_record)?;
        let outcome = match (draining, outcome) {
            (true, ActivityOutcome::Completed) => ActivityOutcome::PostponedThenCompleted,
            (_, other) => other,
        };
        record.outcome = Some(outcome);
        record.ended_at = Some(now);
        record.paused_ms += self.timing.paused_ms;
        Some(Event::ActivityFinished {
            activity_id: record.activity_id.clone(),
            activity_name: record.activity_name.clone(),
            outcome,
            at: now,
        })
    }

    /// Fold a pause in progress into the accumulated totals. The pause itself
    /// continues if the state is still `Paused`.
    fn settle_pause(&mut self, now: DateTime<Utc>) {
        let ongoing = self.ongoing_pause_ms(now);
        self.timing.paused_ms += ongoing;
        self.session_paused_ms += ongoing;
        self.timing.paused_since = None;
    }

    fn ongoing_pause_ms(&self, now: DateTime<Utc>) -> u64 {
        self.timing
            .paused_since
            .map(|since| millis_between(since, now))
            .unwrap_or(0)
    }

    fn complete(&mut self, now: DateTime<Utc>) -> Event {
        self.state = WorkoutState::Complete;
        self.completed_at = Some(now);
        self.timing.paused_since = None;
        let completed = self
            .timeline
            .iter()
            .filter(|r| r.outcome.as_ref().is_some_and(ActivityOutcome::is_completed))
            .count();
        info!(
            routine = %self.routine.name,
            completed,
            total = self.total_activities(),
            "workout complete"
        );
        Event::WorkoutCompleted {
            routine_id: self.routine.id.clone(),
            completed_activities: completed,
            total_activities: self.total_activities(),
            at: now,
        }
    }
}

fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::routine::Block;

    fn engine_for(routine: Routine) -> (WorkoutEngine, ManualClock) {
        let clock = ManualClock::default();
        let engine = WorkoutEngine::start(routine, Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    fn two_by_two() -> Routine {
        Routine::new(
            "Two by two",
            vec![Block::new(
                "Main",
                2,
                vec![Activity::timed("a", 30), Activity::reps("b", 10)],
            )],
        )
    }

    fn names(engine: &WorkoutEngine) -> String {
        engine.current_activity().unwrap().name.clone()
    }

    #[test]
    fn starts_running_at_first_activity() {
        let (engine, _) = engine_for(two_by_two());
        assert_eq!(engine.state(), WorkoutState::Running);
        assert_eq!(engine.cursor(), Cursor::Normal(Position::START));
        assert_eq!(names(&engine), "a");
        assert_eq!(engine.remaining_secs(), Some(30));
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn invalid_routine_refuses_to_start() {
        let routine = Routine::new("Bad", vec![Block::new("Empty", 1, vec![])]);
        let err = WorkoutEngine::start(routine, Arc::new(ManualClock::default())).unwrap_err();
        assert!(matches!(err, RoutineError::EmptyBlock { block_index: 0, .. }));
    }

    #[test]
    fn advance_walks_repetitions_then_completes() {
        let (mut engine, _) = engine_for(two_by_two());
        let mut seen = vec![names(&engine)];
        for _ in 0..3 {
            engine.advance(engine.current_token());
            seen.push(names(&engine));
        }
        assert_eq!(seen, vec!["a", "b", "a", "b"]);
        let events = engine.advance(engine.current_token());
        assert!(matches!(events.last(), Some(Event::WorkoutCompleted { .. })));
        assert_eq!(engine.state(), WorkoutState::Complete);
        assert_eq!(engine.progress(), 1.0);
    }

    #[test]
    fn stale_token_is_a_noop() {
        let (mut engine, _) = engine_for(two_by_two());
        let token = engine.current_token();
        assert!(!engine.advance(token).is_empty());
        assert!(engine.advance(token).is_empty());
        assert_eq!(names(&engine), "b");
        assert_eq!(engine.cursor(), Cursor::Normal(Position::new(0, 0, 1)));
    }

    #[test]
    fn nothing_is_accepted_after_complete() {
        let routine = Routine::new("One", vec![Block::new("B", 1, vec![Activity::reps("x", 5)])]);
        let (mut engine, _) = engine_for(routine);
        engine.advance(engine.current_token());
        assert_eq!(engine.state(), WorkoutState::Complete);
        let token = engine.current_token();
        assert!(engine.advance(token).is_empty());
        assert!(engine.skip(token).is_empty());
        assert!(engine.defer(token).is_empty());
        assert!(engine.pause().is_none());
        assert!(engine.resume().is_none());
    }

    #[test]
    fn single_activity_cannot_be_deferred() {
        let routine = Routine::new("One", vec![Block::new("B", 1, vec![Activity::timed("x", 5)])]);
        let (mut engine, _) = engine_for(routine);
        assert!(!engine.can_defer());
        assert!(matches!(
            engine.activity_started_event(),
            Some(Event::ActivityStarted { can_defer: false, .. })
        ));
        assert!(engine.defer(engine.current_token()).is_empty());
        assert_eq!(engine.state(), WorkoutState::Running);
        let events = engine.skip(engine.current_token());
        assert!(matches!(
            events.first(),
            Some(Event::ActivityFinished {
                outcome: ActivityOutcome::Skipped,
                ..
            })
        ));
        assert_eq!(engine.state(), WorkoutState::Complete);
    }

    #[test]
    fn pause_freezes_remaining_time() {
        let (mut engine, clock) = engine_for(two_by_two());
        clock.advance_secs(10);
        assert_eq!(engine.remaining_secs(), Some(20));
        engine.pause().unwrap();
        clock.advance_secs(120);
        assert_eq!(engine.remaining_secs(), Some(20));
        assert!(!engine.time_expired());
        engine.resume().unwrap();
        assert_eq!(engine.remaining_secs(), Some(20));
        clock.advance_secs(20);
        assert!(engine.time_expired());
    }

    #[test]
    fn redundant_pause_and_resume_are_noops() {
        let (mut engine, _) = engine_for(two_by_two());
        assert!(engine.resume().is_none());
        assert!(engine.pause().is_some());
        assert!(engine.pause().is_none());
        assert!(engine.toggle_pause().is_some());
        assert_eq!(engine.state(), WorkoutState::Running);
    }

    #[test]
    fn remaining_rounds_up_partial_seconds() {
        let (engine, clock) = engine_for(two_by_two());
        clock.advance(chrono::Duration::milliseconds(29_001));
        assert_eq!(engine.remaining_secs(), Some(1));
        clock.advance(chrono::Duration::milliseconds(999));
        assert_eq!(engine.remaining_secs(), Some(0));
    }

    #[test]
    fn reps_activity_has_no_countdown() {
        let (mut engine, clock) = engine_for(two_by_two());
        engine.advance(engine.current_token());
        clock.advance_secs(3600);
        assert_eq!(engine.remaining_secs(), None);
        assert!(!engine.time_expired());
    }

    #[test]
    fn deferred_activity_runs_after_the_last_position() {
        let routine = Routine::new(
            "Defer",
            vec![Block::new(
                "B",
                1,
                vec![
                    Activity::reps("first", 5),
                    Activity::reps("second", 5),
                    Activity::reps("third", 5),
                ],
            )],
        );
        let (mut engine, _) = engine_for(routine);
        engine.advance(engine.current_token());
        // Second-to-last is deferrable.
        assert!(engine.can_defer());
        engine.defer(engine.current_token());
        assert_eq!(names(&engine), "third");
        assert!(!engine.can_defer());

        let events = engine.advance(engine.current_token());
        assert!(events.iter().any(|e| matches!(e, Event::DrainStarted { queued: 1, .. })));
        assert_eq!(engine.state(), WorkoutState::Running);
        assert!(engine.is_draining());
        assert_eq!(names(&engine), "second");

        engine.advance(engine.current_token());
        assert_eq!(engine.state(), WorkoutState::Complete);
        let session = engine.completed_session().unwrap();
        assert_eq!(session.completed_activities, 3);
        assert_eq!(session.timeline.len(), 3);
        assert_eq!(
            session.timeline[1].outcome,
            Some(ActivityOutcome::PostponedThenCompleted)
        );
    }

    #[test]
    fn drained_activity_records_its_second_attempt() {
        let routine = Routine::new(
            "Drain times",
            vec![Block::new("B", 1, vec![Activity::reps("x", 5), Activity::reps("y", 5)])],
        );
        let (mut engine, clock) = engine_for(routine);
        let t0 = engine.now();
        clock.advance_secs(5);
        engine.defer(engine.current_token());
        clock.advance_secs(100);
        engine.advance(engine.current_token());
        assert!(engine.is_draining());
        let drain_start = engine.now();
        assert_eq!(engine.timeline()[0].ended_at, None);

        clock.advance_secs(10);
        engine.advance(engine.current_token());
        let session = engine.completed_session().unwrap();
        let x = &session.timeline[0];
        assert_eq!(x.outcome, Some(ActivityOutcome::PostponedThenCompleted));
        assert_eq!(x.started_at, drain_start);
        assert_eq!(x.ended_at, Some(drain_start + chrono::Duration::seconds(10)));
        assert_eq!(session.timeline[1].started_at, t0 + chrono::Duration::seconds(5));
    }

    #[test]
    fn completed_session_id_is_stable() {
        let routine = Routine::new("Once", vec![Block::new("B", 1, vec![Activity::reps("a", 3)])]);
        let (mut engine, _) = engine_for(routine);
        engine.advance(engine.current_token());
        let first = engine.completed_session().unwrap();
        let second = engine.completed_session().unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn progress_holds_while_draining() {
        let routine = Routine::new(
            "Hold",
            vec![Block::new(
                "B",
                1,
                vec![Activity::reps("x", 1), Activity::reps("y", 1), Activity::reps("z", 1)],
            )],
        );
        let (mut engine, _) = engine_for(routine);
        engine.defer(engine.current_token());
        engine.defer(engine.current_token());
        assert_eq!(names(&engine), "z");
        let at_last = engine.progress();
        assert!((at_last - 2.0 / 3.0).abs() < 1e-9);

        engine.advance(engine.current_token());
        assert!(engine.is_draining());
        assert_eq!(engine.progress(), at_last);
        engine.advance(engine.current_token());
        assert_eq!(engine.progress(), at_last);
        assert!(engine.progress() < 1.0);
        engine.advance(engine.current_token());
        assert_eq!(engine.progress(), 1.0);
    }

    #[test]
    fn deferring_while_draining_requeues_behind_current_entries() {
        let routine = Routine::new(
            "Requeue",
            vec![Block::new(
                "B",
                1,
                vec![Activity::reps("x", 1), Activity::reps("y", 1), Activity::reps("z", 1)],
            )],
        );
        let (mut engine, _) = engine_for(routine);
        engine.defer(engine.current_token()); // x
        engine.defer(engine.current_token()); // y
        engine.advance(engine.current_token()); // z done, drain begins at x
        assert_eq!(names(&engine), "x");
        assert!(engine.can_defer());
        engine.defer(engine.current_token()); // x again, behind y
        assert_eq!(names(&engine), "y");
        assert_eq!(engine.postponed_len(), 3);
        engine.advance(engine.current_token());
        assert_eq!(names(&engine), "x");
        assert!(!engine.can_defer());
        engine.advance(engine.current_token());
        assert_eq!(engine.state(), WorkoutState::Complete);
        let session = engine.completed_session().unwrap();
        assert_eq!(session.completed_activities, 3);
        assert_eq!(engine.postponed_len(), 0);
    }

    #[test]
    fn skipping_a_postponed_activity_records_skip() {
        let routine = Routine::new(
            "Skip later",
            vec![Block::new("B", 1, vec![Activity::reps("x", 1), Activity::reps("y", 1)])],
        );
        let (mut engine, _) = engine_for(routine);
        engine.defer(engine.current_token());
        engine.advance(engine.current_token());
        engine.skip(engine.current_token());
        let session = engine.completed_session().unwrap();
        assert_eq!(session.completed_activities, 1);
        assert_eq!(session.skipped_activities, 1);
        assert_eq!(session.timeline[0].outcome, Some(ActivityOutcome::Skipped));
    }

    #[test]
    fn start_at_sequence_index_skips_earlier_positions() {
        let routine = Routine::new(
            "Mid",
            vec![Block::new("B", 2, vec![Activity::timed("a", 30), Activity::timed("b", 20)])
                .with_rest(15)],
        );
        // Index 2 is the rest entry; it resolves to the start of repetition 2.
        let engine = WorkoutEngine::start_at(routine, 2, Arc::new(ManualClock::default())).unwrap();
        assert_eq!(engine.cursor(), Cursor::Normal(Position::new(0, 1, 0)));
        assert_eq!(engine.total_activities(), 2);
        assert_eq!(engine.progress(), 0.5);
    }

    #[test]
    fn start_index_past_the_end_is_rejected() {
        let routine = Routine::new("Short", vec![Block::new("B", 2, vec![Activity::reps("a", 3)])]);
        let err = WorkoutEngine::start_at(routine, 999, Arc::new(ManualClock::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            RoutineError::StartOutOfRange { index: 999, len: 2 }
        ));
        assert!(!err.is_invalid_routine());
    }

    #[test]
    fn pause_time_is_recorded_in_the_session() {
        let routine = Routine::new("P", vec![Block::new("B", 1, vec![Activity::timed("a", 30)])]);
        let (mut engine, clock) = engine_for(routine);
        clock.advance_secs(10);
        engine.pause();
        clock.advance_secs(45);
        engine.resume();
        clock.advance_secs(20);
        assert!(engine.time_expired());
        engine.advance(engine.current_token());
        let session = engine.completed_session().unwrap();
        assert_eq!(session.duration_secs, 75);
        assert_eq!(session.paused_secs, 45);
        assert_eq!(session.active_secs(), 30);
        assert_eq!(session.timeline[0].paused_ms, 45_000);
    }

    #[test]
    fn manual_completion_while_paused_keeps_paused() {
        let (mut engine, clock) = engine_for(two_by_two());
        engine.pause();
        clock.advance_secs(5);
        engine.advance(engine.current_token());
        assert_eq!(engine.state(), WorkoutState::Paused);
        clock.advance_secs(5);
        engine.resume();
        assert_eq!(engine.timeline()[0].paused_ms, 5_000);
        assert_eq!(engine.activity_paused_ms(), 5_000);
    }
}
