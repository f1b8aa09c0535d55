//! The alarm state machine and its background polling thread.
//!
//! There is one alarm. Every [`AlarmScheduler::arm`] bumps a generation
//! counter and spawns a poller bound to that generation, a poller whose
//! generation is stale exits without touching anything. State, target and
//! generation sit behind one mutex, so disarming and re-arming can't race a
//! poller that is about to ring the old target. A ringing poller grabs the
//! playback lock before releasing the state lock, so a disarm always sees the
//! sound it has to stop.

use std::{
    fmt,
    sync::{mpsc::Sender, Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{
    communication::AlarmEvent,
    error::AlarmError,
    playback::PlaybackController,
    time::{TargetTime, TimeSource, SECONDS_PER_DAY},
};

pub const DEFAULT_SNOOZE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmState {
    #[default]
    Idle,
    Armed,
    Ringing,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Ringing => "ringing",
        })
    }
}

/// how a poll decides the alarm time has come
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// the clock reads exactly the target second, a stalled poll can miss it
    #[default]
    Exact,
    /// the target second fell anywhere since the previous poll
    Passed,
}

impl MatchRule {
    /// `previous` is the time of the last poll (or of arming)
    #[must_use]
    pub fn is_due(self, target: TargetTime, previous: NaiveTime, now: NaiveTime) -> bool {
        match self {
            Self::Exact => target.matches(now),
            Self::Passed => {
                let previous = TargetTime::from(previous).seconds_from_midnight();
                let now = TargetTime::from(now).seconds_from_midnight();
                let elapsed = (now + SECONDS_PER_DAY - previous) % SECONDS_PER_DAY;
                let until_target =
                    (target.seconds_from_midnight() + SECONDS_PER_DAY - previous) % SECONDS_PER_DAY;
                // (previous, now] going forward around the clock
                until_target != 0 && until_target <= elapsed
            }
        }
    }
}

struct Inner {
    state: AlarmState,
    target: Option<TargetTime>,
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    // wakes a sleeping poller when the generation changes
    wake: Condvar,
    playback: Arc<Mutex<PlaybackController>>,
    clock: Arc<dyn TimeSource>,
    events: Sender<AlarmEvent>,
    poll_interval: Duration,
    rule: MatchRule,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_playback(&self) {
        lock_playback(&self.playback).stop();
    }
}

fn lock_playback(playback: &Mutex<PlaybackController>) -> MutexGuard<'_, PlaybackController> {
    playback.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AlarmScheduler {
    shared: Arc<Shared>,
    snooze: Duration,
}

impl fmt::Debug for AlarmScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("AlarmScheduler")
            .field("state", &inner.state)
            .field("target", &inner.target)
            .field("generation", &inner.generation)
            .finish_non_exhaustive()
    }
}

impl AlarmScheduler {
    #[must_use]
    pub fn new(
        playback: Arc<Mutex<PlaybackController>>,
        clock: Arc<dyn TimeSource>,
        events: Sender<AlarmEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: AlarmState::Idle,
                    target: None,
                    generation: 0,
                }),
                wake: Condvar::new(),
                playback,
                clock,
                events,
                poll_interval: DEFAULT_POLL_INTERVAL,
                rule: MatchRule::default(),
            }),
            snooze: DEFAULT_SNOOZE,
        }
    }

    /// only takes effect before the first arm
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.poll_interval = poll_interval;
        }
        self
    }

    /// only takes effect before the first arm
    #[must_use]
    pub fn with_match_rule(mut self, rule: MatchRule) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.rule = rule;
        }
        self
    }

    #[must_use]
    pub fn with_snooze(mut self, snooze: Duration) -> Self {
        self.snooze = snooze;
        self
    }

    /// Arm the alarm for `target`, replacing any previous target.
    ///
    /// Valid from any state. If the alarm is ringing the sound is stopped
    /// first. Any poller from an earlier arm is invalidated before the new
    /// one starts.
    ///
    /// # Errors
    /// [`AlarmError::Poller`] if the polling thread can't be started, the
    /// alarm is left idle then
    pub fn arm(&self, target: TargetTime) -> Result<(), AlarmError> {
        let generation = self.arm_locked(&mut self.shared.lock(), target);
        self.start_poller(generation)
    }

    // must be called with the state lock held
    fn arm_locked(&self, inner: &mut Inner, target: TargetTime) -> u64 {
        if inner.state == AlarmState::Ringing {
            self.shared.stop_playback();
        }
        inner.generation += 1;
        inner.state = AlarmState::Armed;
        inner.target = Some(target);
        log::info!("alarm set for {target}");
        inner.generation
    }

    fn start_poller(&self, generation: u64) -> Result<(), AlarmError> {
        self.shared.wake.notify_all();
        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name(format!("alarm-poll-{generation}"))
            .spawn(move || poll(&shared, generation))
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("couldn't start alarm polling thread: {e}");
                self.abandon(generation);
                Err(AlarmError::Poller(e.to_string()))
            }
        }
    }

    // back to idle, unless something re-armed in the meantime
    fn abandon(&self, generation: u64) {
        let mut inner = self.shared.lock();
        if inner.generation == generation {
            inner.state = AlarmState::Idle;
            inner.target = None;
        }
    }

    /// Cancel the alarm, silencing it if it is ringing.
    ///
    /// # Errors
    /// [`AlarmError::InvalidStateTransition`] if there is no alarm
    pub fn disarm(&self) -> Result<(), AlarmError> {
        {
            let mut inner = self.shared.lock();
            match inner.state {
                AlarmState::Idle => {
                    return Err(AlarmError::InvalidStateTransition {
                        from: AlarmState::Idle,
                        operation: "disarm",
                    })
                }
                AlarmState::Ringing => self.shared.stop_playback(),
                AlarmState::Armed => {}
            }
            inner.generation += 1;
            inner.state = AlarmState::Idle;
            inner.target = None;
        }
        self.shared.wake.notify_all();
        log::info!("alarm stopped");
        Ok(())
    }

    /// Silence a ringing alarm and ring again `offset` from now.
    ///
    /// Returns the new target.
    ///
    /// # Errors
    /// [`AlarmError::InvalidStateTransition`] unless the alarm is ringing
    pub fn snooze(&self, offset: Duration) -> Result<TargetTime, AlarmError> {
        let offset = chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::zero());
        let (target, generation) = {
            let mut inner = self.shared.lock();
            if inner.state != AlarmState::Ringing {
                return Err(AlarmError::InvalidStateTransition {
                    from: inner.state,
                    operation: "snooze",
                });
            }
            let target = TargetTime::from(self.shared.clock.now()).offset_by(offset);
            log::info!("snoozed, ringing again at {target}");
            (target, self.arm_locked(&mut inner, target))
        };
        self.start_poller(generation)?;
        Ok(target)
    }

    /// [`AlarmScheduler::snooze`] with the configured snooze length
    ///
    /// # Errors
    /// [`AlarmError::InvalidStateTransition`] unless the alarm is ringing
    pub fn snooze_default(&self) -> Result<TargetTime, AlarmError> {
        self.snooze(self.snooze)
    }

    #[must_use]
    pub fn state(&self) -> AlarmState {
        self.shared.lock().state
    }

    /// `None` unless armed
    #[must_use]
    pub fn target(&self) -> Option<TargetTime> {
        self.shared.lock().target
    }

    #[must_use]
    pub const fn snooze_length(&self) -> Duration {
        self.snooze
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.shared.lock().generation += 1;
        self.shared.wake.notify_all();
    }
}

fn poll(shared: &Shared, generation: u64) {
    // a second back so the window of the first check covers the arming second
    let mut previous = shared.clock.now() - chrono::Duration::seconds(1);
    let mut inner = shared.lock();
    loop {
        if inner.generation != generation || inner.state != AlarmState::Armed {
            log::debug!("alarm poller {generation} cancelled");
            return;
        }
        let Some(target) = inner.target else {
            return;
        };
        let now = shared.clock.now();
        if shared.rule.is_due(target, previous, now) {
            inner.state = AlarmState::Ringing;
            inner.target = None;
            log::info!("alarm for {target} ringing");
            if shared.events.send(AlarmEvent::Ringing(target)).is_err() {
                log::warn!("nobody is listening for alarm events");
            }
            // take playback before letting go of the state so a disarm waits for the
            // sound to start and stops it, while readers of the state don't wait on audio
            let mut playback = lock_playback(&shared.playback);
            drop(inner);
            if let Err(e) = playback.start() {
                log::error!("alarm is ringing without sound: {e}");
                let _ = shared.events.send(AlarmEvent::PlaybackFailed(e.to_string()));
            }
            return;
        }
        previous = now;
        inner = shared
            .wake
            .wait_timeout(inner, shared.poll_interval)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}
