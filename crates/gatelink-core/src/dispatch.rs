//! Inbound message decoding and routing.
//!
//! Every text frame from the gateway is one JSON envelope:
//!
//! ```json
//! { "ResponseType": 0, "Data": [ { "Id": 1, "Type": 2, "Intensity": 30, "Duration": 1000, "Model": 0 } ] }
//! { "ResponseType": 1, "Data": true }
//! ```
//!
//! Decoding validates each field explicitly. A field that is missing or of
//! the wrong shape degrades to its zero value and is reported in
//! [`DecodeOutcome::Partial`]; only an unreadable document or a missing
//! discriminator fails the whole message. Unknown discriminators decode to
//! [`Envelope::Unknown`] and are ignored by the dispatcher.

use std::sync::Arc;

use serde_json::Value;
use strum::{Display, FromRepr};
use tracing::{debug, warn};

use crate::error::CommandRejected;

// ── Wire types ───────────────────────────────────────────────────────

const RESPONSE_TYPE_CONTROL: i64 = 0;
const RESPONSE_TYPE_FEATURE_TOGGLE: i64 = 1;

/// What a shocker should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum ShockerCommandType {
    #[default]
    Stop = 0,
    Shock = 1,
    Vibrate = 2,
    Sound = 3,
}

/// One entry of a control command batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShockerCommand {
    pub shocker_id: u16,
    pub command_type: ShockerCommandType,
    pub intensity: u8,
    pub duration_ms: u32,
    pub model: u8,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    ControlCommands(Vec<ShockerCommand>),
    /// Turns the local always-on debug mode on or off.
    FeatureToggle(bool),
    /// Discriminator this firmware does not know.
    Unknown(i64),
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Complete(Envelope),
    /// Decoded, but the listed fields were missing or malformed and were
    /// replaced by their zero value (or, for batch entries, dropped).
    Partial {
        envelope: Envelope,
        defaulted: Vec<String>,
    },
    Failed(String),
}

impl DecodeOutcome {
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Complete(envelope) | Self::Partial { envelope, .. } => Some(envelope),
            Self::Failed(_) => None,
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode one text frame.
pub fn decode(frame: &str) -> DecodeOutcome {
    let doc: Value = match serde_json::from_str(frame) {
        Ok(doc) => doc,
        Err(e) => return DecodeOutcome::Failed(format!("invalid JSON: {e}")),
    };

    let Some(response_type) = doc.get("ResponseType").and_then(Value::as_i64) else {
        return DecodeOutcome::Failed("missing or non-integer ResponseType".into());
    };

    let mut defaulted = Vec::new();
    let envelope = match response_type {
        RESPONSE_TYPE_CONTROL => {
            Envelope::ControlCommands(decode_commands(doc.get("Data"), &mut defaulted))
        }
        RESPONSE_TYPE_FEATURE_TOGGLE => {
            let enabled = doc.get("Data").and_then(Value::as_bool).unwrap_or_else(|| {
                defaulted.push("Data".to_owned());
                false
            });
            Envelope::FeatureToggle(enabled)
        }
        other => Envelope::Unknown(other),
    };

    if defaulted.is_empty() {
        DecodeOutcome::Complete(envelope)
    } else {
        DecodeOutcome::Partial {
            envelope,
            defaulted,
        }
    }
}

fn decode_commands(data: Option<&Value>, defaulted: &mut Vec<String>) -> Vec<ShockerCommand> {
    let Some(entries) = data.and_then(Value::as_array) else {
        defaulted.push("Data".to_owned());
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            if !entry.is_object() {
                defaulted.push(format!("Data[{idx}]"));
                return None;
            }
            let shocker_id = field(entry, idx, "Id", defaulted);
            let raw_type: u8 = field(entry, idx, "Type", defaulted);
            let intensity = field(entry, idx, "Intensity", defaulted);
            let duration_ms = field(entry, idx, "Duration", defaulted);
            let model = field(entry, idx, "Model", defaulted);

            let command_type = ShockerCommandType::from_repr(raw_type).unwrap_or_else(|| {
                defaulted.push(format!("Data[{idx}].Type"));
                ShockerCommandType::Stop
            });

            Some(ShockerCommand {
                shocker_id,
                command_type,
                intensity,
                duration_ms,
                model,
            })
        })
        .collect()
}

/// Read one unsigned field. Missing, non-numeric and out-of-range values
/// all degrade to zero and are recorded.
fn field<T: TryFrom<u64> + Default>(
    entry: &Value,
    idx: usize,
    name: &str,
    defaulted: &mut Vec<String>,
) -> T {
    match entry
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| T::try_from(v).ok())
    {
        Some(value) => value,
        None => {
            defaulted.push(format!("Data[{idx}].{name}"));
            T::default()
        }
    }
}

// ── Collaborators ────────────────────────────────────────────────────

/// Carries out shocker commands on local hardware.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &ShockerCommand) -> Result<(), CommandRejected>;
}

/// Switches the local always-on debug mode.
pub trait FeatureToggle: Send + Sync {
    fn set_always_enabled(&self, enabled: bool);
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// Routes decoded envelopes to the host collaborators.
#[derive(Clone)]
pub struct MessageDispatcher {
    executor: Arc<dyn CommandExecutor>,
    toggle: Arc<dyn FeatureToggle>,
}

impl MessageDispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>, toggle: Arc<dyn FeatureToggle>) -> Self {
        Self { executor, toggle }
    }

    /// Decode and route one complete text frame. Never fails.
    pub fn dispatch(&self, frame: &str) {
        debug!(len = frame.len(), "parsing gateway message");

        let envelope = match decode(frame) {
            DecodeOutcome::Complete(envelope) => envelope,
            DecodeOutcome::Partial {
                envelope,
                defaulted,
            } => {
                warn!(fields = ?defaulted, "gateway message had malformed fields, using defaults");
                envelope
            }
            DecodeOutcome::Failed(reason) => {
                warn!(%reason, "dropping undecodable gateway message");
                return;
            }
        };

        self.route(envelope);
    }

    fn route(&self, envelope: Envelope) {
        match envelope {
            Envelope::ControlCommands(commands) => {
                for command in &commands {
                    if let Err(e) = self.executor.execute(command) {
                        warn!(
                            shocker_id = command.shocker_id,
                            command_type = %command.command_type,
                            error = %e,
                            "remote command failed or was rejected"
                        );
                    }
                }
            }
            Envelope::FeatureToggle(enabled) => {
                debug!(enabled, "always-on debug mode toggled by gateway");
                self.toggle.set_always_enabled(enabled);
            }
            Envelope::Unknown(response_type) => {
                debug!(response_type, "ignoring unknown gateway message type");
            }
        }
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher").finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
