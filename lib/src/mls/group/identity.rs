use crate::identifiers::UserId;
use crate::mls::crypto::key_pair::{HpkeKeyPair, SignatureKeyPair};
use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::framing::AddProposal;
use crate::mls::utilities::error::{Error, Result};

const SECRET_LABEL_IDENTITY_HPKE: &[u8] = b"identity hpke";

/// A device's long-term keys for one user.
///
/// The HPKE key pair is derived from the signing seed, so the signing key is
/// the only secret that needs to be kept outside of group state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LocalIdentity {
    user_id: UserId,
    signature_key_pair: SignatureKeyPair,
    hpke_key_pair: HpkeKeyPair,
}

impl LocalIdentity {
    pub fn generate(user_id: UserId, crypto_provider: &impl CryptoProvider) -> Result<Self> {
        let signature_key_pair = crypto_provider.signature().generate_key_pair()?;
        Self::from_signature_key_pair(user_id, signature_key_pair, crypto_provider)
    }

    pub fn from_signature_key_pair(
        user_id: UserId,
        signature_key_pair: SignatureKeyPair,
        crypto_provider: &impl CryptoProvider,
    ) -> Result<Self> {
        let seed = crypto_provider
            .derive_secret(&signature_key_pair.private_key, SECRET_LABEL_IDENTITY_HPKE)?;
        let seed: [u8; 32] = seed[..].try_into().map_err(|_| Error::InvalidKeyLength)?;
        let hpke_key_pair = crypto_provider.hpke().derive_key_pair(&seed)?;

        Ok(Self {
            user_id,
            signature_key_pair,
            hpke_key_pair,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn signature_key_pair(&self) -> &SignatureKeyPair {
        &self.signature_key_pair
    }

    pub fn hpke_key_pair(&self) -> &HpkeKeyPair {
        &self.hpke_key_pair
    }

    /// What an existing member needs to invite this identity.
    pub fn add_proposal(&self) -> AddProposal {
        AddProposal {
            user_id: self.user_id.clone(),
            identity_key: self.signature_key_pair.public_key.clone(),
            hpke_public_key: self.hpke_key_pair.public_key.clone(),
        }
    }
}
