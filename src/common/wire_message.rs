//! wire messages exchanged with the relay server.
//!
//! Everything on the websocket is one of these six JSON shapes, tagged
//! by a "type" field.  Decoding happens once at the transport boundary
//! into this closed enum; nothing past that point pokes at loose json.
//! Fields that a peer might legitimately omit (timestamps, the
//! operator id on our own outbound start/stop) are Options so a
//! partial message degrades per-field instead of failing the decode.
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A session participant as announced in the roster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Operator {
    pub id: String,
    pub frequency: f64,
}

/// The six message kinds.  Timestamps are sender wall clock in
/// microseconds.  The operator id is present on inbound traffic and
/// omitted on outbound (the server knows who we are).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Hello {
        #[serde(rename = "operatorId")]
        operator_id: String,
        frequency: f64,
    },
    Operators {
        operators: Vec<Operator>,
    },
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
        #[serde(rename = "operatorId", default, skip_serializing_if = "Option::is_none")]
        operator_id: Option<String>,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
        #[serde(rename = "operatorId", default, skip_serializing_if = "Option::is_none")]
        operator_id: Option<String>,
    },
    Frequency {
        frequency: f64,
    },
    Code {
        code: String,
        wpm: u32,
        #[serde(rename = "operatorId", default, skip_serializing_if = "Option::is_none")]
        operator_id: Option<String>,
    },
}

impl fmt::Display for WireMessage {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "<unserializable message>"),
        }
    }
}
