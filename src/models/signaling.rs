//! Signaling wire format
//!
//! Every frame on the signaling socket is a JSON text frame of the shape
//! `{"event": "<name>", "data": <payload>}`. The socket is shared with other
//! features (chat), so frames are first decoded into an [`Envelope`] and only
//! then, when the event name is a call event, into a typed payload.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Opaque signaling payload produced and consumed by the peer-session library
/// (SDP offers/answers and ICE candidates).
pub type SignalData = Value;

pub const EVENT_ME: &str = "me";
pub const EVENT_CALL_USER: &str = "call-user";
pub const EVENT_CALL_MADE: &str = "call-made";
pub const EVENT_ANSWER_CALL: &str = "answer-call";
pub const EVENT_CALL_ANSWERED: &str = "call-answered";
pub const EVENT_ICE_CANDIDATE: &str = "ice-candidate";
pub const EVENT_END_CALL: &str = "end-call";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(event: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Envelope {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let data = if self.data.is_null() {
            Value::Object(Default::default())
        } else {
            self.data.clone()
        };
        serde_json::from_value(data)
    }
}

// ============== Client -> Server ==============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallUserPayload {
    #[serde(rename = "userToCall")]
    pub user_to_call: i64,
    #[serde(rename = "signalData")]
    pub signal_data: SignalData,
    pub from: i64,
    pub name: String,
    #[serde(rename = "isVideoCall")]
    pub is_video_call: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerCallPayload {
    pub signal: SignalData,
    pub to: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingCandidatePayload {
    pub candidate: SignalData,
    pub to: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingEndCallPayload {
    pub to: i64,
}

/// Call events a client emits. The relay routes each one to the user named
/// by its target field.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    CallUser(CallUserPayload),
    AnswerCall(AnswerCallPayload),
    IceCandidate(OutgoingCandidatePayload),
    EndCall(OutgoingEndCallPayload),
}

impl ClientEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientEvent::CallUser(_) => EVENT_CALL_USER,
            ClientEvent::AnswerCall(_) => EVENT_ANSWER_CALL,
            ClientEvent::IceCandidate(_) => EVENT_ICE_CANDIDATE,
            ClientEvent::EndCall(_) => EVENT_END_CALL,
        }
    }

    /// User id the relay should deliver this event to
    pub fn target(&self) -> i64 {
        match self {
            ClientEvent::CallUser(p) => p.user_to_call,
            ClientEvent::AnswerCall(p) => p.to,
            ClientEvent::IceCandidate(p) => p.to,
            ClientEvent::EndCall(p) => p.to,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ClientEvent::CallUser(p) => Envelope::new(EVENT_CALL_USER, p),
            ClientEvent::AnswerCall(p) => Envelope::new(EVENT_ANSWER_CALL, p),
            ClientEvent::IceCandidate(p) => Envelope::new(EVENT_ICE_CANDIDATE, p),
            ClientEvent::EndCall(p) => Envelope::new(EVENT_END_CALL, p),
        }
    }

    /// Decode a call event; `Ok(None)` for events that belong to other features.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, serde_json::Error> {
        let event = match envelope.event.as_str() {
            EVENT_CALL_USER => ClientEvent::CallUser(envelope.payload()?),
            EVENT_ANSWER_CALL => ClientEvent::AnswerCall(envelope.payload()?),
            EVENT_ICE_CANDIDATE => ClientEvent::IceCandidate(envelope.payload()?),
            EVENT_END_CALL => ClientEvent::EndCall(envelope.payload()?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// ============== Server -> Client ==============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedPayload {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallMadePayload {
    pub from: i64,
    pub name: String,
    pub signal: SignalData,
    #[serde(rename = "isVideoCall")]
    pub is_video_call: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallAnsweredPayload {
    pub signal: SignalData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomingCandidatePayload {
    pub candidate: SignalData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncomingEndCallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
}

/// Call events the relay delivers to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Sent once per socket; carries the peer id the relay assigned.
    Connected(ConnectedPayload),
    CallMade(CallMadePayload),
    CallAnswered(CallAnsweredPayload),
    IceCandidate(IncomingCandidatePayload),
    EndCall(IncomingEndCallPayload),
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => EVENT_ME,
            ServerEvent::CallMade(_) => EVENT_CALL_MADE,
            ServerEvent::CallAnswered(_) => EVENT_CALL_ANSWERED,
            ServerEvent::IceCandidate(_) => EVENT_ICE_CANDIDATE,
            ServerEvent::EndCall(_) => EVENT_END_CALL,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ServerEvent::Connected(p) => Envelope::new(EVENT_ME, p),
            ServerEvent::CallMade(p) => Envelope::new(EVENT_CALL_MADE, p),
            ServerEvent::CallAnswered(p) => Envelope::new(EVENT_CALL_ANSWERED, p),
            ServerEvent::IceCandidate(p) => Envelope::new(EVENT_ICE_CANDIDATE, p),
            ServerEvent::EndCall(p) => Envelope::new(EVENT_END_CALL, p),
        }
    }

    /// Decode a call event; `Ok(None)` for events that belong to other features.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, serde_json::Error> {
        let event = match envelope.event.as_str() {
            EVENT_ME => ServerEvent::Connected(envelope.payload()?),
            EVENT_CALL_MADE => ServerEvent::CallMade(envelope.payload()?),
            EVENT_CALL_ANSWERED => ServerEvent::CallAnswered(envelope.payload()?),
            EVENT_ICE_CANDIDATE => ServerEvent::IceCandidate(envelope.payload()?),
            EVENT_END_CALL => ServerEvent::EndCall(envelope.payload()?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Sender id stamped by the relay, when present
    pub fn sender(&self) -> Option<i64> {
        match self {
            ServerEvent::Connected(_) => None,
            ServerEvent::CallMade(p) => Some(p.from),
            ServerEvent::CallAnswered(p) => p.from,
            ServerEvent::IceCandidate(p) => p.from,
            ServerEvent::EndCall(p) => p.from,
        }
    }
}
