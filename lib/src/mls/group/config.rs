use serde::{Deserialize, Serialize};

use crate::mls::crypto::cipher_suite::CipherSuite;

/// How far past a sender's last seen generation a receiver will look for the
/// key of an incoming message.
pub const DEFAULT_MAX_GENERATION_LOOKAHEAD: u32 = 1024;

/// Settings of one group on this device. Not shared with other members.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub(crate) cipher_suite: CipherSuite,
    pub(crate) max_generation_lookahead: u32,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            cipher_suite: CipherSuite::default(),
            max_generation_lookahead: DEFAULT_MAX_GENERATION_LOOKAHEAD,
        }
    }
}

impl GroupConfig {
    /// Create a group config builder
    pub fn builder() -> GroupConfigBuilder {
        GroupConfigBuilder::new()
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn max_generation_lookahead(&self) -> u32 {
        self.max_generation_lookahead
    }
}

#[derive(Default, Debug)]
pub struct GroupConfigBuilder {
    group_config: GroupConfig,
}

impl GroupConfigBuilder {
    /// Create a group config
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with cipher suite
    #[must_use]
    pub fn with_cipher_suite(mut self, cipher_suite: CipherSuite) -> Self {
        self.group_config.cipher_suite = cipher_suite;
        self
    }

    /// Build with the number of generations a receiver tries past the last
    /// one it saw from a sender
    #[must_use]
    pub fn with_max_generation_lookahead(mut self, max_generation_lookahead: u32) -> Self {
        self.group_config.max_generation_lookahead = max_generation_lookahead;
        self
    }

    /// Finalize and build the group config
    pub fn build(self) -> GroupConfig {
        self.group_config
    }
}
