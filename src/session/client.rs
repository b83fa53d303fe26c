//! top level entry point called by main to run the beep client
//!
//! Reads settings, starts the websocket thread against the relay
//! server, builds a [`BeepEngine`] around the supplied emitter
//! factory, then loops relaying traffic: inbound wire messages and
//! local actions go into the engine, and the engine's outbound
//! messages ride the channel to the websocket thread.
//!
//! The websocket thread owns reconnection; if the server goes away the
//! engine simply hears nothing for a while and local keying keeps
//! sounding.  The loop ends when the local action channel closes.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, sleep},
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::common::{
    box_error::BoxError,
    config::Settings,
    get_micro_time,
    timekeeper::MicroTimer,
    websocket::{websocket_thread, WebSocketThreadFn},
    wire_message::WireMessage,
};
use crate::session::emitter::{EmitterFactory, MonotonicClock};
use crate::session::engine::BeepEngine;

const STATS_INTERVAL: u128 = 10_000_000; // 10 seconds

/// Something the operator did on their end of the client.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalAction {
    KeyDown,
    KeyUp,
    Transmit(String),
    SetFrequency(f64),
    SetVolume(f64),
    SetWpm(u32),
}

/// Run the client until the action channel closes.
///
/// The emitter factory is the audio backend; anything that can make a
/// timed tone will do.
pub fn run(
    config_file: Option<&str>,
    factory: Box<dyn EmitterFactory>,
    action_rx: mpsc::Receiver<LocalAction>,
) -> Result<(), BoxError> {
    let settings = init_config(config_file)?;
    let (to_ws_tx, from_ws_rx, connected, _ws_handle) =
        init_websocket_thread(&settings.ws_url, None)?;
    debug!("client::run - websocket thread started");

    let clock = MonotonicClock::new();
    let mut engine = BeepEngine::new(factory, &settings, to_ws_tx, get_micro_time());
    debug!("client::run - engine built, entering main loop");

    let mut stats_timer = MicroTimer::build(get_micro_time(), STATS_INTERVAL);
    let mut was_connected = false;
    loop {
        let wall_now = get_micro_time();
        let audio_now = clock.now();

        match from_ws_rx.try_recv() {
            Ok(msg) => engine.handle_message(msg, wall_now, audio_now),
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                warn!("websocket: disconnected channel");
            }
        }
        match action_rx.try_recv() {
            Ok(action) => apply_action(&mut engine, action, wall_now, audio_now),
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                info!("input closed, shutting down");
                break;
            }
        }
        engine.poll(wall_now);
        let is_connected = connected.load(Ordering::Relaxed);
        if is_connected != was_connected {
            info!("relay link {}", if is_connected { "up" } else { "down" });
            was_connected = is_connected;
        }
        if stats_timer.expired(wall_now) {
            debug!("transit stats: {}", engine.transit_stats());
            stats_timer.reset(wall_now);
        }

        sleep(Duration::new(0, 200_000));
    }
    Ok(())
}

fn apply_action(engine: &mut BeepEngine, action: LocalAction, wall_now: u128, audio_now: f64) {
    match action {
        LocalAction::KeyDown => engine.key_down(wall_now, audio_now),
        LocalAction::KeyUp => engine.key_up(wall_now, audio_now),
        LocalAction::Transmit(text) => engine.transmit(&text, audio_now),
        LocalAction::SetFrequency(hz) => engine.set_frequency(hz, wall_now),
        LocalAction::SetVolume(db) => engine.set_volume(db),
        LocalAction::SetWpm(wpm) => engine.set_wpm(wpm),
    }
}

fn init_config(config_file: Option<&str>) -> Result<Settings, BoxError> {
    let filename = config_file.unwrap_or("settings.json");
    info!("Using config file: {}", filename);
    let settings = Settings::build(filename).map_err(|e| {
        error!("Issue with config file or parameter: {}", e);
        e
    })?;
    Ok(settings)
}

/// Spawn the websocket thread.  Takes an optional thread function so
/// tests can substitute one without a live server.
fn init_websocket_thread(
    ws_url: &str,
    websocket_thread_fn: Option<WebSocketThreadFn>,
) -> Result<
    (
        mpsc::Sender<WireMessage>,
        mpsc::Receiver<WireMessage>,
        Arc<AtomicBool>,
        thread::JoinHandle<()>,
    ),
    BoxError,
> {
    let websocket_thread_fn = websocket_thread_fn.unwrap_or(websocket_thread);
    let (to_ws_tx, to_ws_rx) = mpsc::channel();
    let (from_ws_tx, from_ws_rx) = mpsc::channel();
    let connected = Arc::new(AtomicBool::new(false));

    let ws_url_clone = ws_url.to_string();
    let connected_clone = connected.clone();
    let websocket_handle = thread::spawn(move || {
        if let Err(e) = websocket_thread_fn(&ws_url_clone, from_ws_tx, to_ws_rx, connected_clone) {
            error!("Websocket thread encountered an error: {}", e);
        }
    });

    Ok((to_ws_tx, from_ws_rx, connected, websocket_handle))
}
