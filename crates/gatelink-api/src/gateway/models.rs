// Gateway API response models
//
// Every endpoint wraps its payload as `{ "message": "...", "data": ... }`.
// `data` is optional on the wire; a missing payload decodes to the type's
// default so callers can apply their own emptiness checks.

use serde::Deserialize;

/// Standard gateway response envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GatewayResponse<T> {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// Device identity returned by `GET /1/device/self`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceSelf {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shockers: Vec<ShockerDescriptor>,
}

/// One shocker bound to this device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShockerDescriptor {
    #[serde(default)]
    pub id: String,
    /// Numeric radio identifier the transmitter uses on air.
    #[serde(default)]
    pub rf_id: u16,
    /// Hardware model discriminator.
    #[serde(default)]
    pub model: u8,
}

/// Realtime gateway assignment from `GET /1/device/assignLCG`.
///
/// Both fields are required before a connection can be attempted; the
/// caller checks for presence rather than relying on decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LcgAssignment {
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl LcgAssignment {
    /// Returns `(fqdn, country)` when both are present and non-empty.
    pub fn endpoint(&self) -> Option<(&str, &str)> {
        let fqdn = self.fqdn.as_deref().filter(|s| !s.is_empty())?;
        let country = self.country.as_deref().filter(|s| !s.is_empty())?;
        Some((fqdn, country))
    }
}
