//! Signals and the rules used to subscribe to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An asynchronous notification delivered by a transport.
///
/// The payload is opaque to the reactor: it is handed to the handler
/// exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Signal (member) name, e.g. `"JobFinished"`.
    pub name: String,

    /// Interface the signal was emitted on, if the transport knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    /// Object path of the emitter.
    pub path: String,

    /// Positional arguments.
    #[serde(default)]
    pub payload: Vec<Value>,
}

impl Signal {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface: None,
            path: path.into(),
            payload: Vec::new(),
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_payload(mut self, payload: impl IntoIterator<Item = Value>) -> Self {
        self.payload = payload.into_iter().collect();
        self
    }

    /// Returns the positional argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.payload.get(index)
    }
}

/// Describes which signals a subscription is interested in.
///
/// A signal matches when its name equals [`signal`](Self::signal) and every
/// filter that is present equals the corresponding field of the signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    pub signal: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl MatchRule {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            interface: None,
            path: None,
        }
    }

    /// Only match signals emitted on `interface`.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Only match signals emitted by the object at `path`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        if self.signal != signal.name {
            return false;
        }

        if let Some(interface) = &self.interface {
            if signal.interface.as_deref() != Some(interface.as_str()) {
                return false;
            }
        }

        match &self.path {
            Some(path) => *path == signal.path,
            None => true,
        }
    }
}

impl From<&str> for MatchRule {
    fn from(signal: &str) -> Self {
        Self::new(signal)
    }
}

impl From<String> for MatchRule {
    fn from(signal: String) -> Self {
        Self::new(signal)
    }
}
