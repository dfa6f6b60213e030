// ── Pairing and credential verification ──
//
// One-shot HTTP exchanges that decide whether the device holds a usable
// credential. Each call checks the network flag first and fails fast
// without touching the store when the network is down.

use std::sync::Arc;

use gatelink_api::{DeviceSelf, GatewayClient};
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::credential::CredentialStore;
use crate::error::CoreError;
use crate::flags::ConnectionFlags;

pub struct PairingClient {
    api: GatewayClient,
    credentials: Arc<dyn CredentialStore>,
}

impl PairingClient {
    pub fn new(api: GatewayClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { api, credentials }
    }

    pub fn api(&self) -> &GatewayClient {
        &self.api
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Exchange a pair code for a credential and persist it.
    ///
    /// Any non-200 reply or an empty credential leaves the store and the
    /// flags exactly as they were.
    pub async fn pair(&self, flags: &mut ConnectionFlags, code: u32) -> Result<(), CoreError> {
        if !flags.has_network() {
            return Err(CoreError::NoNetwork);
        }

        debug!(code, "attempting to pair");

        let token = match self.api.pair(code).await {
            Ok(token) => token,
            Err(e) => {
                error!(code, error = %e, "error while getting device credential");
                return Err(match e {
                    gatelink_api::Error::InvalidDeviceToken => CoreError::PairingRejected {
                        status: 401,
                        message: "unauthorized".into(),
                    },
                    gatelink_api::Error::Gateway { status, message } => {
                        CoreError::PairingRejected { status, message }
                    }
                    other => other.into(),
                });
            }
        };

        if token.is_empty() {
            error!(code, "gateway returned an empty device credential");
            return Err(CoreError::EmptyCredential);
        }

        self.credentials.set_credential(SecretString::from(token));
        flags.set_authenticated();
        info!(code, "paired with gateway");

        Ok(())
    }

    /// Check the credential against the gateway's self lookup.
    ///
    /// A 401 means the token is unambiguously dead: it is cleared from the
    /// store along with the authenticated flag. Anything else that is not a
    /// 200 leaves the credential alone so the caller can retry later.
    ///
    /// Any 200 accepts the credential. The identity payload is only logged,
    /// so a body that does not decode yields an empty `DeviceSelf`.
    pub async fn verify_credential(
        &self,
        flags: &mut ConnectionFlags,
        token: &SecretString,
    ) -> Result<DeviceSelf, CoreError> {
        if !flags.has_network() {
            return Err(CoreError::NoNetwork);
        }

        match self.api.device_self(token).await {
            Ok(device) => {
                debug!(device_id = %device.id, device_name = %device.name, "device credential accepted");
                for shocker in &device.shockers {
                    debug!(
                        shocker_id = %shocker.id,
                        rf_id = shocker.rf_id,
                        model = shocker.model,
                        "found shocker"
                    );
                }
                flags.set_authenticated();
                Ok(device)
            }
            Err(gatelink_api::Error::Deserialization { message, .. }) => {
                warn!(%message, "unreadable device identity, accepting credential");
                flags.set_authenticated();
                Ok(DeviceSelf::default())
            }
            Err(gatelink_api::Error::InvalidDeviceToken) => {
                info!("device credential is invalid, clearing it");
                self.credentials.clear_credential();
                flags.clear_credential();
                Err(CoreError::InvalidCredential)
            }
            Err(e) => {
                warn!(error = %e, "error while verifying device credential");
                Err(e.into())
            }
        }
    }

    /// Forget the credential. Never touches the network.
    pub fn unpair(&self, flags: &mut ConnectionFlags) {
        info!("unpairing device");
        self.credentials.clear_credential();
        flags.clear_credential();
    }
}

impl std::fmt::Debug for PairingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingClient")
            .field("api", &self.api.base_url().as_str())
            .finish_non_exhaustive()
    }
}
