use std::{
    fs::File,
    io::{BufReader, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, Receiver},
        Arc, Barrier, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use chrono::NaiveTime;
use rooster_alarm::{
    AlarmError, AlarmEvent, AlarmScheduler, AlarmState, AudioOutput, MatchRule,
    PlaybackController, PlaybackError, PlaybackState, TargetTime, TimeSource,
};

const POLL: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(2);
// long enough for a stray poller to have acted
const SETTLE: Duration = Duration::from_millis(150);

struct ManualClock {
    time: Mutex<NaiveTime>,
    // the next reader of the clock waits on this twice
    gate: Mutex<Option<Arc<Barrier>>>,
}

impl ManualClock {
    fn at(time: &str) -> Arc<Self> {
        Arc::new(Self {
            time: Mutex::new(t(time).into()),
            gate: Mutex::new(None),
        })
    }

    fn set(&self, time: &str) {
        *self.time.lock().unwrap() = t(time).into();
    }

    fn hold_next_read(&self, gate: Arc<Barrier>) {
        *self.gate.lock().unwrap() = Some(gate);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> NaiveTime {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.wait();
            gate.wait();
        }
        *self.time.lock().unwrap()
    }
}

#[derive(Clone, Default)]
struct Counts {
    plays: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    // how long starting playback takes
    play_delay: Duration,
}

impl Counts {
    fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

struct CountingOutput(Counts);

impl AudioOutput for CountingOutput {
    fn play_looping(&mut self, _: BufReader<File>, _: f32) -> Result<(), PlaybackError> {
        thread::sleep(self.0.play_delay);
        self.0.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    scheduler: AlarmScheduler,
    clock: Arc<ManualClock>,
    playback: Arc<Mutex<PlaybackController>>,
    events: Receiver<AlarmEvent>,
    counts: Counts,
    // keeps the sound file alive
    _sound: Option<tempfile::NamedTempFile>,
}

impl Harness {
    fn new(now: &str, rule: MatchRule) -> Self {
        Self::with_play_delay(now, rule, Duration::ZERO)
    }

    fn with_play_delay(now: &str, rule: MatchRule, play_delay: Duration) -> Self {
        let mut sound = tempfile::NamedTempFile::new().unwrap();
        sound.write_all(b"ring ring").unwrap();
        let mut harness = Self::build(now, rule, sound.path().to_path_buf(), play_delay);
        harness._sound = Some(sound);
        harness
    }

    fn with_sound(now: &str, rule: MatchRule, sound: PathBuf) -> Self {
        Self::build(now, rule, sound, Duration::ZERO)
    }

    fn build(now: &str, rule: MatchRule, sound: PathBuf, play_delay: Duration) -> Self {
        let counts = Counts {
            play_delay,
            ..Counts::default()
        };
        let clock = ManualClock::at(now);
        let playback = Arc::new(Mutex::new(PlaybackController::new(
            Box::new(CountingOutput(counts.clone())),
            sound,
            80.0,
        )));
        let (tx, events) = mpsc::channel();
        let scheduler = AlarmScheduler::new(Arc::clone(&playback), clock.clone(), tx)
            .with_poll_interval(POLL)
            .with_match_rule(rule);
        Self {
            scheduler,
            clock,
            playback,
            events,
            counts,
            _sound: None,
        }
    }

    fn playback_state(&self) -> PlaybackState {
        self.playback.lock().unwrap().state()
    }

    fn expect_ringing(&self, target: &str) {
        assert_eq!(
            self.events.recv_timeout(WAIT),
            Ok(AlarmEvent::Ringing(t(target)))
        );
        assert_eq!(self.scheduler.state(), AlarmState::Ringing);
        // the poller holds playback until the sound has started
        drop(self.playback.lock().unwrap());
    }

    fn assert_quiet(&self) {
        thread::sleep(SETTLE);
        assert!(self.events.try_recv().is_err());
    }
}

fn t(s: &str) -> TargetTime {
    s.parse().unwrap()
}

#[test]
fn disarm_before_target_never_plays() {
    let h = Harness::new("06:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    assert_eq!(h.scheduler.state(), AlarmState::Armed);
    assert_eq!(h.scheduler.target(), Some(t("07:00:00")));

    thread::sleep(SETTLE);
    h.scheduler.disarm().unwrap();
    assert_eq!(h.scheduler.state(), AlarmState::Idle);
    assert_eq!(h.scheduler.target(), None);

    h.clock.set("07:00:00");
    h.assert_quiet();
    assert_eq!(h.counts.plays(), 0);
}

#[test]
fn rings_exactly_once_at_target() {
    let h = Harness::new("06:59:59", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    thread::sleep(SETTLE);
    assert_eq!(h.counts.plays(), 0);

    h.clock.set("07:00:00");
    h.expect_ringing("07:00:00");
    assert_eq!(h.counts.plays(), 1);
    assert_eq!(h.playback_state(), PlaybackState::Playing);
    // the target is used up
    assert_eq!(h.scheduler.target(), None);

    h.assert_quiet();
    assert_eq!(h.counts.plays(), 1);
}

#[test]
fn rearming_leaves_a_single_poller() {
    let h = Harness::new("06:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.scheduler.arm(t("08:00:00")).unwrap();
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.scheduler.arm(t("07:00:00")).unwrap();
    thread::sleep(SETTLE);

    h.clock.set("07:00:00");
    h.expect_ringing("07:00:00");
    h.assert_quiet();
    assert_eq!(h.counts.plays(), 1);
}

#[test]
fn replaced_target_does_not_ring() {
    let h = Harness::new("06:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.scheduler.arm(t("09:30:00")).unwrap();
    h.clock.set("07:00:00");
    h.assert_quiet();
    assert_eq!(h.scheduler.state(), AlarmState::Armed);
    assert_eq!(h.counts.plays(), 0);
}

#[test]
fn snooze_wraps_past_midnight() {
    let h = Harness::new("23:58:30", MatchRule::Exact);
    h.scheduler.arm(t("23:58:30")).unwrap();
    h.expect_ringing("23:58:30");

    assert_eq!(
        h.scheduler.snooze(Duration::from_secs(5 * 60)),
        Ok(t("00:03:30"))
    );
    assert_eq!(h.scheduler.state(), AlarmState::Armed);
    assert_eq!(h.scheduler.target(), Some(t("00:03:30")));
    assert_eq!(h.playback_state(), PlaybackState::Stopped);
    assert_eq!(h.counts.stops(), 1);

    h.clock.set("00:03:30");
    h.expect_ringing("00:03:30");
    assert_eq!(h.counts.plays(), 2);
}

#[test]
fn default_snooze_is_five_minutes() {
    let h = Harness::new("12:00:00", MatchRule::Exact);
    assert_eq!(h.scheduler.snooze_length(), Duration::from_secs(300));
    h.scheduler.arm(t("12:00:00")).unwrap();
    h.expect_ringing("12:00:00");
    assert_eq!(h.scheduler.snooze_default(), Ok(t("12:05:00")));
}

#[test]
fn misuse_is_rejected() {
    let h = Harness::new("12:00:00", MatchRule::Exact);
    assert_eq!(
        h.scheduler.snooze(Duration::from_secs(60)),
        Err(AlarmError::InvalidStateTransition {
            from: AlarmState::Idle,
            operation: "snooze",
        })
    );
    assert_eq!(
        h.scheduler.disarm(),
        Err(AlarmError::InvalidStateTransition {
            from: AlarmState::Idle,
            operation: "disarm",
        })
    );

    h.scheduler.arm(t("13:00:00")).unwrap();
    assert!(matches!(
        h.scheduler.snooze(Duration::from_secs(60)),
        Err(AlarmError::InvalidStateTransition {
            from: AlarmState::Armed,
            ..
        })
    ));
    assert_eq!(h.scheduler.target(), Some(t("13:00:00")));
}

#[test]
fn stop_while_ringing_silences() {
    let h = Harness::new("07:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.expect_ringing("07:00:00");

    h.scheduler.disarm().unwrap();
    assert_eq!(h.scheduler.state(), AlarmState::Idle);
    assert_eq!(h.playback_state(), PlaybackState::Stopped);
    assert_eq!(h.counts.stops(), 1);

    // stopping again is harmless
    h.playback.lock().unwrap().stop();
    assert_eq!(h.counts.stops(), 1);
}

#[test]
fn rearm_while_ringing_silences() {
    let h = Harness::new("07:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.expect_ringing("07:00:00");

    h.scheduler.arm(t("07:30:00")).unwrap();
    assert_eq!(h.scheduler.state(), AlarmState::Armed);
    assert_eq!(h.playback_state(), PlaybackState::Stopped);
}

#[test]
fn missing_sound_still_rings_silently() {
    let h = Harness::with_sound(
        "07:00:00",
        MatchRule::Exact,
        PathBuf::from("/definitely/not/here.mp3"),
    );
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.expect_ringing("07:00:00");

    match h.events.recv_timeout(WAIT) {
        Ok(AlarmEvent::PlaybackFailed(message)) => assert!(message.contains("not found")),
        other => panic!("expected a playback failure, got {other:?}"),
    }
    assert_eq!(h.counts.plays(), 0);
    assert_eq!(h.playback_state(), PlaybackState::Stopped);

    // can still be snoozed or stopped
    assert_eq!(h.scheduler.state(), AlarmState::Ringing);
    h.scheduler.disarm().unwrap();
    assert_eq!(h.scheduler.state(), AlarmState::Idle);
}

#[test]
fn exact_rule_misses_a_skipped_second() {
    let h = Harness::new("06:59:58", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    thread::sleep(SETTLE);
    h.clock.set("07:00:02");
    h.assert_quiet();
    assert_eq!(h.scheduler.state(), AlarmState::Armed);
}

#[test]
fn passed_rule_catches_a_skipped_second() {
    let h = Harness::new("06:59:58", MatchRule::Passed);
    h.scheduler.arm(t("07:00:00")).unwrap();
    thread::sleep(SETTLE);
    assert_eq!(h.scheduler.state(), AlarmState::Armed);
    h.clock.set("07:00:02");
    h.expect_ringing("07:00:00");
    assert_eq!(h.counts.plays(), 1);
}

#[test]
fn passed_rule_rings_for_the_current_second() {
    let h = Harness::new("10:15:00", MatchRule::Passed);
    h.scheduler.arm(t("10:15:00")).unwrap();
    h.expect_ringing("10:15:00");
}

#[test]
fn disarm_then_rearm_rings_once() {
    let h = Harness::new("06:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    thread::sleep(SETTLE);
    h.scheduler.disarm().unwrap();
    h.scheduler.arm(t("07:00:00")).unwrap();

    h.clock.set("07:00:00");
    h.expect_ringing("07:00:00");
    h.assert_quiet();
    assert_eq!(h.counts.plays(), 1);
}

#[test]
fn slow_audio_start_does_not_block_state_reads() {
    let h = Harness::with_play_delay("07:00:00", MatchRule::Exact, Duration::from_secs(1));
    h.scheduler.arm(t("07:00:00")).unwrap();
    assert_eq!(
        h.events.recv_timeout(WAIT),
        Ok(AlarmEvent::Ringing(t("07:00:00")))
    );

    let started = Instant::now();
    assert_eq!(h.scheduler.state(), AlarmState::Ringing);
    assert_eq!(h.scheduler.target(), None);
    assert!(started.elapsed() < Duration::from_millis(500));

    // stopping waits for the sound to start and then silences it
    h.scheduler.disarm().unwrap();
    assert_eq!(h.counts.plays(), 1);
    assert_eq!(h.counts.stops(), 1);
    assert_eq!(h.playback_state(), PlaybackState::Stopped);
}

#[test]
fn disarm_during_snooze_wins() {
    let h = Harness::new("07:00:00", MatchRule::Exact);
    h.scheduler.arm(t("07:00:00")).unwrap();
    h.expect_ringing("07:00:00");

    let gate = Arc::new(Barrier::new(2));
    h.clock.hold_next_read(Arc::clone(&gate));
    let scheduler = &h.scheduler;
    let (snoozed, disarmed) = thread::scope(|s| {
        let snooze = s.spawn(|| scheduler.snooze(Duration::from_secs(5 * 60)));
        // snooze is now reading the clock
        gate.wait();
        let disarm = s.spawn(|| scheduler.disarm());
        thread::sleep(Duration::from_millis(50));
        gate.wait();
        (snooze.join().unwrap(), disarm.join().unwrap())
    });

    // the snooze went through first and the disarm cancelled it
    assert_eq!(snoozed, Ok(t("07:05:00")));
    assert_eq!(disarmed, Ok(()));
    assert_eq!(h.scheduler.state(), AlarmState::Idle);
    assert_eq!(h.scheduler.target(), None);
    assert_eq!(h.playback_state(), PlaybackState::Stopped);
}
