//! Thread used to talk to the relay server over a websocket.
//!
//! The rest of the client never touches the socket.  This thread owns
//! the connection, decodes inbound json into [`WireMessage`] at the
//! boundary, and relays traffic over a pair of mpsc channels.  If the
//! server goes away it reconnects forever with exponential backoff
//! (1s doubling, capped at 10s); the engine just stops hearing
//! messages in the meantime and local tones keep working.
use std::{
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::sleep,
    time::Duration,
};

use log::{debug, info, trace, warn};
use tungstenite::{
    client,
    error::{Error, UrlError},
    http::Uri,
    stream::{Mode, NoDelay},
    Message, WebSocket,
};
use url::Url;

use crate::common::box_error::BoxError;
use crate::common::wire_message::WireMessage;

/// Used for dependency injection to test the client runner without a live server
pub type WebSocketThreadFn = fn(
    &str,
    mpsc::Sender<WireMessage>,
    mpsc::Receiver<WireMessage>,
    Arc<AtomicBool>,
) -> Result<(), BoxError>;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

fn next_backoff(current: Duration) -> Duration {
    std::cmp::min(current * 2, MAX_BACKOFF)
}

/// start a thread with this function.  Pass it the websocket url, two
/// channels, and a connection flag.  The first channel forwards
/// messages received from the server to the engine; the second reads
/// messages from the engine to write to the server.  The flag holds
/// the observable connection state.  Never returns; on any connection
/// failure it backs off and reconnects.
pub fn websocket_thread(
    ws_url: &str,                          // URL of the relay server
    inbound_tx: mpsc::Sender<WireMessage>, // channel to the engine
    outbound_rx: mpsc::Receiver<WireMessage>, // channel from the engine
    connected: Arc<AtomicBool>,            // observable connection state
) -> Result<(), BoxError> {
    info!("websocket_thread - connecting to {}", ws_url);
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match Connection::new(ws_url) {
            Ok(mut conn) => {
                info!("websocket connected to {}", ws_url);
                connected.store(true, Ordering::Relaxed);
                backoff = INITIAL_BACKOFF;
                loop {
                    // The read blocks for a short timeout before returning None
                    match conn.get_message() {
                        Ok(Some(msg)) => {
                            trace!("websocket inbound: {}", msg);
                            let _res = inbound_tx.send(msg);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("websocket read failed: {}", e);
                            break;
                        }
                    }
                    // Relay anything the engine wants sent
                    let mut failed = false;
                    while let Ok(msg) = outbound_rx.try_recv() {
                        if let Err(e) = conn.send_message(&msg) {
                            warn!("websocket write failed: {}", e);
                            failed = true;
                            break;
                        }
                    }
                    if failed {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("websocket connect failed: {}", e);
            }
        }
        connected.store(false, Ordering::Relaxed);
        debug!("websocket retrying in {:?}", backoff);
        sleep(backoff);
        backoff = next_backoff(backoff);
    }
}

struct Connection {
    sock: WebSocket<TcpStream>,
}

impl Connection {
    fn new(url: &str) -> Result<Self, BoxError> {
        let stream = Self::make_stream(url)?;
        let (sock, _resp) = client::client(Url::parse(url)?, stream)?;
        Ok(Connection { sock })
    }

    fn make_stream(url: &str) -> Result<TcpStream, BoxError> {
        let url = Url::parse(url)?;
        let request = client::IntoClientRequest::into_client_request(url)?;
        let uri = request.uri();
        let mode = client::uri_mode(uri)?;
        let host = request
            .uri()
            .host()
            .ok_or(Error::Url(UrlError::NoHostName))?;
        let port = uri.port_u16().unwrap_or(match mode {
            Mode::Plain => 80,
            Mode::Tls => 443,
        });
        let addrs = (host, port).to_socket_addrs()?;
        let mut stream = Self::connect_to_some(addrs.as_slice(), request.uri())?;
        NoDelay::set_nodelay(&mut stream, true)?;
        stream.set_read_timeout(Some(Duration::new(0, 200_000_000)))?; // poll 5 times per second
        Ok(stream)
    }

    fn connect_to_some(addrs: &[SocketAddr], uri: &Uri) -> Result<TcpStream, Error> {
        for addr in addrs {
            debug!("Trying to contact {} at {}...", uri, addr);
            if let Ok(stream) = TcpStream::connect(addr) {
                return Ok(stream);
            }
        }
        Err(Error::Url(UrlError::UnableToConnect(uri.to_string())))
    }

    fn send_message(&mut self, msg: &WireMessage) -> Result<(), BoxError> {
        self.sock
            .write_message(Message::Text(serde_json::to_string(msg)?))?;
        Ok(())
    }

    fn get_message(&mut self) -> Result<Option<WireMessage>, BoxError> {
        match self.sock.read_message() {
            Ok(msg) => {
                if !msg.is_text() {
                    return Ok(None);
                }
                match serde_json::from_str(msg.to_text()?) {
                    Ok(wire_msg) => Ok(Some(wire_msg)),
                    Err(e) => {
                        // Not one of ours.  Drop it and keep the connection
                        warn!("dropping unparseable message: {}", e);
                        Ok(None)
                    }
                }
            }
            Err(e) => {
                match e {
                    Error::Io(ioerr) => {
                        if ioerr.kind() == std::io::ErrorKind::WouldBlock {
                            // timeout reading the websocket
                            return Ok(None);
                        } else {
                            return Err(ioerr.into());
                        }
                    }
                    _ => return Err(e.into()),
                };
            }
        }
    }
}
