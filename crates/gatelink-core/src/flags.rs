// Process-wide connection flags.
//
// Two bits: the host reported a usable network, and the stored credential
// was accepted by the gateway. Only network events and pairing /
// verification outcomes touch them.

const HAS_NETWORK: u8 = 1 << 0;
const AUTHENTICATED: u8 = 1 << 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionFlags(u8);

impl ConnectionFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn has_network(self) -> bool {
        self.0 & HAS_NETWORK != 0
    }

    pub fn is_authenticated(self) -> bool {
        self.0 & AUTHENTICATED != 0
    }

    pub fn set_network(&mut self) {
        self.0 |= HAS_NETWORK;
    }

    pub fn set_authenticated(&mut self) {
        self.0 |= AUTHENTICATED;
    }

    /// Credential gone (unpair, rejected token): keep only the network bit.
    pub fn clear_credential(&mut self) {
        self.0 &= HAS_NETWORK;
    }

    /// Network gone: nothing survives.
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
