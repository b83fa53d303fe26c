//! the BeepEngine aggregates the session pieces into a single structure.
//!
//! One owner for every keyed map (emitters, cursors, skews), fed from
//! two directions: wire messages from the transport thread and local
//! actions from the UI side.  Outbound messages go through an mpsc
//! Sender so the engine never touches the socket.  Both callers pass
//! in the current wall clock (microseconds) and emitter clock
//! (seconds); the engine never conflates the two.
//!
//! Local actions make sound immediately with no compensation; only
//! remote events get the skew/latency treatment.
use std::collections::{HashMap, HashSet};
use std::sync::mpsc;

use log::{debug, info, trace, warn};

use crate::common::config::Settings;
use crate::common::timekeeper::StreamTimeStat;
use crate::common::wire_message::{Operator, WireMessage};
use crate::morse::code_table;
use crate::morse::keying;

use super::clock_sync::ClockSync;
use super::emitter::{EmitterFactory, ToneEmitter};
use super::freq_debounce::FreqDebounce;
use super::roster;
use super::scheduler::PlaybackScheduler;

// Cursor key for the local operator.  Server ids only ever arrive via
// the roster, so this can never collide, and local keying works before
// the hello has assigned us an id.
const LOCAL_CURSOR_KEY: &str = "#local";

pub struct BeepEngine {
    local_id: Option<String>,
    frequency: f64,
    volume_db: f64,
    wpm: u32,
    factory: Box<dyn EmitterFactory>,
    local_emitter: Box<dyn ToneEmitter>,
    emitters: HashMap<String, Box<dyn ToneEmitter>>,
    clock_sync: ClockSync,
    scheduler: PlaybackScheduler,
    debounce: FreqDebounce,
    outbound_tx: mpsc::Sender<WireMessage>,
}

impl BeepEngine {
    pub fn new(
        mut factory: Box<dyn EmitterFactory>,
        settings: &Settings,
        outbound_tx: mpsc::Sender<WireMessage>,
        wall_now: u128,
    ) -> BeepEngine {
        let local_emitter = factory.create(settings.frequency, settings.volume_db);
        BeepEngine {
            local_id: None,
            frequency: settings.frequency,
            volume_db: settings.volume_db,
            wpm: settings.wpm,
            factory,
            local_emitter,
            emitters: HashMap::new(),
            clock_sync: ClockSync::new(settings.target_latency_msec),
            scheduler: PlaybackScheduler::new(),
            debounce: FreqDebounce::new(wall_now),
            outbound_tx,
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn operator_count(&self) -> usize {
        self.emitters.len()
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn wpm(&self) -> u32 {
        self.wpm
    }

    pub fn transit_stats(&self) -> &StreamTimeStat {
        self.clock_sync.transit_stats()
    }

    /// Process one inbound wire message.
    pub fn handle_message(&mut self, msg: WireMessage, wall_now: u128, audio_now: f64) -> () {
        trace!("engine message: {}", msg);
        match msg {
            WireMessage::Hello {
                operator_id,
                frequency,
            } => self.handle_hello(operator_id, frequency),
            WireMessage::Operators { operators } => self.apply_roster(&operators, audio_now),
            WireMessage::Start {
                timestamp,
                operator_id,
            } => self.remote_key_down(operator_id, timestamp, wall_now, audio_now),
            WireMessage::Stop {
                timestamp,
                operator_id,
            } => self.remote_key_up(operator_id, timestamp, wall_now, audio_now),
            WireMessage::Code {
                code,
                wpm,
                operator_id,
            } => self.remote_code(operator_id, &code, wpm, wall_now, audio_now),
            WireMessage::Frequency { frequency } => {
                // outbound-only; peers' frequencies arrive via the roster
                debug!("ignoring inbound frequency message ({})", frequency);
            }
        }
    }

    /// Check timers.  Call this every trip around the main loop.
    pub fn poll(&mut self, wall_now: u128) -> () {
        if let Some(frequency) = self.debounce.poll(wall_now) {
            info!("broadcasting settled frequency {:.0}", frequency);
            self.send(WireMessage::Frequency { frequency });
        }
    }

    // Local key pressed: sound now, tell everyone.
    pub fn key_down(&mut self, wall_now: u128, audio_now: f64) -> () {
        self.scheduler
            .key_down(LOCAL_CURSOR_KEY, audio_now, self.local_emitter.as_mut());
        self.send(WireMessage::Start {
            timestamp: Some(wall_now as u64),
            operator_id: None,
        });
    }

    pub fn key_up(&mut self, wall_now: u128, audio_now: f64) -> () {
        self.scheduler
            .key_up(LOCAL_CURSOR_KEY, audio_now, self.local_emitter.as_mut());
        self.send(WireMessage::Stop {
            timestamp: Some(wall_now as u64),
            operator_id: None,
        });
    }

    /// Encode text and transmit it.  Plays locally right away and goes
    /// out as code so receivers key it at their own compensated time.
    pub fn transmit(&mut self, text: &str, audio_now: f64) -> () {
        let code = code_table::encode(text);
        if code.is_empty() {
            warn!("nothing transmittable in {:?}", text);
            return;
        }
        let sequence = keying::keying_sequence(0.0, &code, self.wpm);
        self.scheduler.schedule(
            LOCAL_CURSOR_KEY,
            &sequence,
            audio_now,
            self.local_emitter.as_mut(),
        );
        self.send(WireMessage::Code {
            code,
            wpm: self.wpm,
            operator_id: None,
        });
    }

    /// Local frequency change: retune our oscillator now, broadcast
    /// once the control settles.
    pub fn set_frequency(&mut self, frequency: f64, wall_now: u128) -> () {
        self.frequency = frequency;
        self.local_emitter.set_frequency(frequency);
        self.debounce.update(frequency, wall_now);
    }

    pub fn set_volume(&mut self, volume_db: f64) -> () {
        self.volume_db = volume_db;
        self.local_emitter.set_volume(volume_db);
        for emitter in self.emitters.values_mut() {
            emitter.set_volume(volume_db);
        }
    }

    pub fn set_wpm(&mut self, wpm: u32) -> () {
        if wpm == 0 {
            warn!("ignoring wpm of zero");
            return;
        }
        self.wpm = wpm;
    }

    fn handle_hello(&mut self, operator_id: String, frequency: f64) -> () {
        match &self.local_id {
            Some(existing) if *existing != operator_id => {
                // The id is fixed for the session once assigned
                warn!(
                    "ignoring hello with id {} (already assigned {})",
                    operator_id, existing
                );
            }
            Some(_) => {}
            None => {
                info!("assigned operator id {} at {:.0} Hz", operator_id, frequency);
                self.local_id = Some(operator_id);
                self.frequency = frequency;
                self.local_emitter.set_frequency(frequency);
            }
        }
    }

    fn apply_roster(&mut self, operators: &[Operator], audio_now: f64) -> () {
        let held: HashSet<String> = self.emitters.keys().cloned().collect();
        let diff = roster::reconcile(operators, &held, self.local_id.as_deref());
        for op in diff.to_create {
            info!("operator {} joined at {:.0} Hz", op.id, op.frequency);
            let emitter = self.factory.create(op.frequency, self.volume_db);
            self.emitters.insert(op.id, emitter);
        }
        for op in diff.to_update {
            if let Some(emitter) = self.emitters.get_mut(&op.id) {
                emitter.set_frequency(op.frequency);
                emitter.set_volume(self.volume_db);
            }
        }
        for id in diff.to_stop {
            info!("operator {} left", id);
            if let Some(mut emitter) = self.emitters.remove(&id) {
                // leaving silences immediately, including anything
                // already scheduled but not yet sounded
                emitter.stop(audio_now);
                emitter.release();
            }
            self.scheduler.forget(&id);
            self.clock_sync.forget(&id);
        }
    }

    fn remote_key_down(
        &mut self,
        operator_id: Option<String>,
        timestamp: Option<u64>,
        wall_now: u128,
        audio_now: f64,
    ) -> () {
        let Some(id) = operator_id else {
            warn!("start with no operator id");
            return;
        };
        let Some(emitter) = self.emitters.get_mut(&id) else {
            debug!("start for unknown operator {}", id);
            return;
        };
        let delay = self
            .clock_sync
            .compensated_delay(&id, timestamp, wall_now)
            .max(0.0);
        self.scheduler
            .key_down(&id, audio_now + delay, emitter.as_mut());
    }

    fn remote_key_up(
        &mut self,
        operator_id: Option<String>,
        timestamp: Option<u64>,
        wall_now: u128,
        audio_now: f64,
    ) -> () {
        let Some(id) = operator_id else {
            warn!("stop with no operator id");
            return;
        };
        let Some(emitter) = self.emitters.get_mut(&id) else {
            debug!("stop for unknown operator {}", id);
            return;
        };
        let delay = self
            .clock_sync
            .compensated_delay(&id, timestamp, wall_now)
            .max(0.0);
        self.scheduler
            .key_up(&id, audio_now + delay, emitter.as_mut());
    }

    fn remote_code(
        &mut self,
        operator_id: Option<String>,
        code: &str,
        wpm: u32,
        wall_now: u128,
        audio_now: f64,
    ) -> () {
        let Some(id) = operator_id else {
            warn!("code with no operator id");
            return;
        };
        if wpm == 0 {
            warn!("code from {} with wpm of zero", id);
            return;
        }
        let Some(emitter) = self.emitters.get_mut(&id) else {
            debug!("code for unknown operator {}", id);
            return;
        };
        // code messages carry no timestamp, so this is the flat
        // target latency fallback
        let delay = self
            .clock_sync
            .compensated_delay(&id, None, wall_now)
            .max(0.0);
        let sequence = keying::keying_sequence(0.0, code, wpm);
        self.scheduler
            .schedule(&id, &sequence, audio_now + delay, emitter.as_mut());
    }

    fn send(&mut self, msg: WireMessage) -> () {
        trace!("engine outbound: {}", msg);
        let _res = self.outbound_tx.send(msg);
    }
}

impl Drop for BeepEngine {
    fn drop(&mut self) {
        self.local_emitter.release();
        for emitter in self.emitters.values_mut() {
            emitter.release();
        }
    }
}

#[cfg(test)]
mod test_engine {
    use super::*;
    use crate::session::emitter::recording::{EmitterEvent, EventLog, RecordingFactory};
    use crate::session::emitter::{MockEmitterFactory, MockToneEmitter};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn op(id: &str, frequency: f64) -> Operator {
        Operator {
            id: String::from(id),
            frequency,
        }
    }

    // engine with a recording factory; created[0] is the local emitter
    fn build_engine() -> (
        BeepEngine,
        Rc<RefCell<Vec<(f64, f64, EventLog)>>>,
        mpsc::Receiver<WireMessage>,
    ) {
        let factory = RecordingFactory::new();
        let created = factory.created.clone();
        let (tx, rx) = mpsc::channel();
        let engine = BeepEngine::new(Box::new(factory), &Settings::default(), tx, 0);
        (engine, created, rx)
    }

    fn events_for(created: &Rc<RefCell<Vec<(f64, f64, EventLog)>>>, idx: usize) -> Vec<EmitterEvent> {
        created.borrow()[idx].2.borrow().clone()
    }

    #[test]
    fn hello_assigns_the_id_once() {
        let (mut engine, created, _rx) = build_engine();
        engine.handle_message(
            WireMessage::Hello {
                operator_id: String::from("op-1"),
                frequency: 650.0,
            },
            0,
            0.0,
        );
        assert_eq!(engine.local_id(), Some("op-1"));
        assert!(close(engine.frequency(), 650.0));
        // the local oscillator was retuned to the assigned frequency
        assert!(events_for(&created, 0).contains(&EmitterEvent::Frequency(650.0)));

        engine.handle_message(
            WireMessage::Hello {
                operator_id: String::from("op-2"),
                frequency: 700.0,
            },
            0,
            0.0,
        );
        assert_eq!(engine.local_id(), Some("op-1"));
        assert!(close(engine.frequency(), 650.0));
    }

    #[test]
    fn roster_creates_updates_and_stops() {
        let (mut engine, created, _rx) = build_engine();
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("a", 440.0), op("b", 550.0)],
            },
            0,
            1.0,
        );
        assert_eq!(engine.operator_count(), 2);
        // local emitter plus a and b
        assert_eq!(created.borrow().len(), 3);
        assert!(close(created.borrow()[1].0, 440.0));

        // a leaves, c joins, b changes frequency
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("b", 551.0), op("c", 500.0)],
            },
            0,
            2.0,
        );
        assert_eq!(engine.operator_count(), 2);
        assert_eq!(created.borrow().len(), 4);
        // a was silenced immediately and its handle dropped
        let a_events = events_for(&created, 1);
        assert_eq!(
            a_events,
            vec![EmitterEvent::Stop(2.0), EmitterEvent::Release]
        );
        // b got the refreshed settings
        let b_events = events_for(&created, 2);
        assert!(b_events.contains(&EmitterEvent::Frequency(551.0)));
    }

    #[test]
    fn unchanged_roster_creates_nothing() {
        let (mut engine, created, _rx) = build_engine();
        let roster = WireMessage::Operators {
            operators: vec![op("a", 440.0)],
        };
        engine.handle_message(roster.clone(), 0, 1.0);
        engine.handle_message(roster, 0, 1.5);
        assert_eq!(engine.operator_count(), 1);
        assert_eq!(created.borrow().len(), 2);
        // no stop was ever issued to a
        assert!(!events_for(&created, 1)
            .iter()
            .any(|e| matches!(e, EmitterEvent::Stop(_))));
    }

    #[test]
    fn messages_about_unknown_operators_are_noops() {
        let (mut engine, created, rx) = build_engine();
        engine.handle_message(
            WireMessage::Start {
                timestamp: Some(1_000_000),
                operator_id: Some(String::from("ghost")),
            },
            1_050_000,
            1.0,
        );
        engine.handle_message(
            WireMessage::Code {
                code: String::from("..."),
                wpm: 20,
                operator_id: Some(String::from("ghost")),
            },
            1_060_000,
            1.0,
        );
        assert_eq!(engine.operator_count(), 0);
        assert_eq!(created.borrow().len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn first_remote_event_plays_at_target_latency() {
        let (mut engine, created, _rx) = build_engine();
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("a", 440.0)],
            },
            0,
            0.0,
        );
        engine.handle_message(
            WireMessage::Start {
                timestamp: Some(1_000_000),
                operator_id: Some(String::from("a")),
            },
            1_050_000,
            10.0,
        );
        let events = events_for(&created, 1);
        match events.last().unwrap() {
            EmitterEvent::Start(at) => assert!(close(*at, 10.2)),
            other => panic!("expected a start, got {:?}", other),
        }
    }

    #[test]
    fn steady_transit_keeps_the_target_latency_exactly() {
        let (mut engine, created, _rx) = build_engine();
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("a", 440.0)],
            },
            0,
            0.0,
        );
        // both events take 50 msec on the wire
        engine.handle_message(
            WireMessage::Start {
                timestamp: Some(1_000_000),
                operator_id: Some(String::from("a")),
            },
            1_050_000,
            10.0,
        );
        engine.handle_message(
            WireMessage::Stop {
                timestamp: Some(1_500_000),
                operator_id: Some(String::from("a")),
            },
            1_550_000,
            10.5,
        );
        let events = events_for(&created, 1);
        match events.last().unwrap() {
            EmitterEvent::Stop(at) => assert!(close(*at, 10.7)),
            other => panic!("expected a stop, got {:?}", other),
        }
    }

    #[test]
    fn code_during_held_tone_never_overlaps() {
        let (mut engine, created, _rx) = build_engine();
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("a", 440.0)],
            },
            0,
            0.0,
        );
        // key goes down and a transmission arrives before the key_up
        engine.handle_message(
            WireMessage::Start {
                timestamp: Some(1_000_000),
                operator_id: Some(String::from("a")),
            },
            1_050_000,
            10.0,
        );
        engine.handle_message(
            WireMessage::Code {
                code: String::from("."),
                wpm: 20,
                operator_id: Some(String::from("a")),
            },
            1_150_000,
            10.1,
        );
        engine.handle_message(
            WireMessage::Stop {
                timestamp: Some(2_000_000),
                operator_id: Some(String::from("a")),
            },
            2_050_000,
            11.0,
        );
        // the held tone is closed where the batch begins, and the late
        // key_up finds nothing left to stop
        let events = events_for(&created, 1);
        assert_eq!(events.len(), 4);
        match (&events[0], &events[1], &events[2], &events[3]) {
            (
                EmitterEvent::Start(held_on),
                EmitterEvent::Stop(held_off),
                EmitterEvent::Start(dot_on),
                EmitterEvent::Stop(dot_off),
            ) => {
                assert!(close(*held_on, 10.2));
                assert!(close(*held_off, 10.3));
                assert!(close(*dot_on, 10.3));
                assert!(close(*dot_off, 10.36));
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn local_key_sounds_immediately_and_goes_out() {
        let (mut engine, created, rx) = build_engine();
        engine.key_down(500_000, 3.0);
        engine.key_up(1_000_000, 3.5);
        let events = events_for(&created, 0);
        // no compensation on local actions
        assert_eq!(
            events,
            vec![EmitterEvent::Start(3.0), EmitterEvent::Stop(3.5)]
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            WireMessage::Start {
                timestamp: Some(500_000),
                operator_id: None
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            WireMessage::Stop {
                timestamp: Some(1_000_000),
                operator_id: None
            }
        );
    }

    #[test]
    fn transmit_plays_locally_and_sends_code() {
        let (mut engine, created, rx) = build_engine();
        engine.transmit("e", 1.0);
        let events = events_for(&created, 0);
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (EmitterEvent::Start(on), EmitterEvent::Stop(off)) => {
                assert!(close(*on, 1.0));
                assert!(close(*off, 1.06));
            }
            other => panic!("expected start/stop, got {:?}", other),
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            WireMessage::Code {
                code: String::from("."),
                wpm: 20,
                operator_id: None
            }
        );
    }

    #[test]
    fn untransmittable_text_sends_nothing() {
        let (mut engine, created, rx) = build_engine();
        engine.transmit("~~~", 1.0);
        assert!(events_for(&created, 0).is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn rapid_transmissions_queue_back_to_back() {
        let (mut engine, created, _rx) = build_engine();
        engine.transmit("e", 1.0);
        engine.transmit("e", 1.01);
        let events = events_for(&created, 0);
        // dot ends at 1.06, trailing gap runs to 1.24, second dot there
        match events[2] {
            EmitterEvent::Start(at) => assert!(close(at, 1.24)),
            ref other => panic!("expected a start, got {:?}", other),
        }
    }

    #[test]
    fn frequency_broadcast_is_debounced_to_the_settled_value() {
        let (mut engine, created, rx) = build_engine();
        engine.set_frequency(550.0, 1_000_000);
        engine.set_frequency(575.0, 1_100_000);
        engine.poll(1_200_000);
        assert!(rx.try_recv().is_err());
        engine.poll(1_500_000);
        assert_eq!(
            rx.try_recv().unwrap(),
            WireMessage::Frequency { frequency: 575.0 }
        );
        // but the local oscillator tracked every change right away
        let events = events_for(&created, 0);
        assert_eq!(
            events,
            vec![
                EmitterEvent::Frequency(550.0),
                EmitterEvent::Frequency(575.0)
            ]
        );
    }

    #[test]
    fn volume_applies_to_every_emitter() {
        let (mut engine, created, _rx) = build_engine();
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("a", 440.0)],
            },
            0,
            0.0,
        );
        engine.set_volume(-12.0);
        assert!(events_for(&created, 0).contains(&EmitterEvent::Volume(-12.0)));
        assert!(events_for(&created, 1).contains(&EmitterEvent::Volume(-12.0)));
    }

    #[test]
    fn departed_operator_emitter_verified_with_mocks() {
        let mut factory = MockEmitterFactory::new();
        let mut creations = 0;
        factory.expect_create().returning(move |_, _| {
            creations += 1;
            let mut emitter = MockToneEmitter::new();
            if creations == 2 {
                // operator "a": must be stopped at the removal time
                // and released exactly once
                emitter
                    .expect_stop()
                    .with(mockall::predicate::eq(5.0))
                    .times(1)
                    .return_const(());
                emitter.expect_release().times(1).return_const(());
            } else {
                emitter.expect_release().return_const(());
            }
            emitter.expect_set_frequency().return_const(());
            emitter.expect_set_volume().return_const(());
            Box::new(emitter)
        });
        let (tx, _rx) = mpsc::channel();
        let mut engine = BeepEngine::new(Box::new(factory), &Settings::default(), tx, 0);
        engine.handle_message(
            WireMessage::Operators {
                operators: vec![op("a", 440.0)],
            },
            0,
            0.0,
        );
        engine.handle_message(
            WireMessage::Operators { operators: vec![] },
            0,
            5.0,
        );
        // mock expectations check on drop
    }
}
