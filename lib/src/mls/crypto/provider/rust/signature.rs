use bytes::Bytes;
use signature::{Signer, Verifier};

use crate::mls::crypto::rng::get_rng;
use crate::mls::crypto::{key_pair::SignatureKeyPair, provider::SignatureScheme, Key, Secret};
use crate::mls::utilities::error::{Error, Result};

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct SignatureSchemeWrapper(pub(super) SignatureScheme);

impl crate::mls::crypto::provider::Signature for SignatureSchemeWrapper {
    fn signature_scheme(&self) -> SignatureScheme {
        self.0
    }

    fn generate_key_pair(&self) -> Result<SignatureKeyPair> {
        match self.0 {
            SignatureScheme::ED25519 => {
                let signing_key = ed25519_dalek::SigningKey::generate(&mut get_rng());
                Ok(SignatureKeyPair {
                    private_key: Secret::from(signing_key.to_bytes().to_vec()),
                    public_key: Key::from(signing_key.verifying_key().to_bytes().to_vec()),
                })
            }
        }
    }

    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Bytes> {
        match self.0 {
            SignatureScheme::ED25519 => {
                let signing_key = ed25519_dalek::SigningKey::from_bytes(
                    &private_key
                        .try_into()
                        .map_err(|_| Error::InvalidEd25519Key)?,
                );
                let signature: ed25519_dalek::Signature = signing_key.sign(message);
                Ok(Bytes::from(signature.to_vec()))
            }
        }
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        match self.0 {
            SignatureScheme::ED25519 => {
                let Ok(public_key) = <&[u8; ed25519_dalek::PUBLIC_KEY_LENGTH]>::try_from(public_key)
                else {
                    return false;
                };
                let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(public_key) else {
                    return false;
                };
                let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                verifying_key.verify(message, &signature).is_ok()
            }
        }
    }
}
