use bytes::Bytes;
use hpke::aead::{AeadCtxR, AeadCtxS, AesGcm256};
use hpke::kdf::HkdfSha256;
use hpke::kem::X25519HkdfSha256;
use hpke::{Deserializable, Kem, OpModeR, OpModeS, Serializable};

use crate::mls::crypto::key_pair::HpkeKeyPair;
use crate::mls::crypto::provider::{self, HpkeOpeningContext, HpkeSealingContext, HpkeSuite};
use crate::mls::crypto::rng::get_rng;
use crate::mls::crypto::{AeadId, KdfId, Key, KemId, Secret};
use crate::mls::utilities::error::{Error, Result};

type X25519Sealer = AeadCtxS<AesGcm256, HkdfSha256, X25519HkdfSha256>;
type X25519Opener = AeadCtxR<AesGcm256, HkdfSha256, X25519HkdfSha256>;

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct HpkeSuiteWrapper(pub(super) HpkeSuite);

struct SealingContext(X25519Sealer);

impl HpkeSealingContext for SealingContext {
    fn seal(&mut self, plaintext: &[u8], aad: &[u8]) -> Result<Bytes> {
        Ok(Bytes::from(self.0.seal(plaintext, aad)?))
    }
}

struct OpeningContext(X25519Opener);

impl HpkeOpeningContext for OpeningContext {
    fn open(&mut self, ciphertext: &[u8], aad: &[u8]) -> Result<Bytes> {
        Ok(Bytes::from(self.0.open(ciphertext, aad)?))
    }
}

fn to_key_pair(
    private_key: &<X25519HkdfSha256 as Kem>::PrivateKey,
    public_key: &<X25519HkdfSha256 as Kem>::PublicKey,
) -> HpkeKeyPair {
    HpkeKeyPair {
        private_key: Secret::from(private_key.to_bytes().to_vec()),
        public_key: Key::from(public_key.to_bytes().to_vec()),
    }
}

impl provider::Hpke for HpkeSuiteWrapper {
    fn hpke_suite(&self) -> HpkeSuite {
        self.0
    }

    fn generate_key_pair(&self) -> Result<HpkeKeyPair> {
        match self.0.kem {
            KemId::X25519HkdfSha256 => {
                let (private_key, public_key) = X25519HkdfSha256::gen_keypair(&mut get_rng());
                Ok(to_key_pair(&private_key, &public_key))
            }
        }
    }

    fn derive_key_pair(&self, seed: &[u8; 32]) -> Result<HpkeKeyPair> {
        match self.0.kem {
            KemId::X25519HkdfSha256 => {
                let (private_key, public_key) = X25519HkdfSha256::derive_keypair(seed);
                Ok(to_key_pair(&private_key, &public_key))
            }
        }
    }

    fn setup_base_sender(
        &self,
        recipient_public_key: &[u8],
        info: &[u8],
    ) -> Result<(Bytes, Box<dyn HpkeSealingContext>)> {
        match (self.0.kem, self.0.kdf, self.0.aead) {
            (KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes256Gcm) => {
                let public_key =
                    <X25519HkdfSha256 as Kem>::PublicKey::from_bytes(recipient_public_key)
                        .map_err(|_| Error::InvalidKeyLength)?;
                let (encapsulated_key, context) =
                    hpke::setup_sender::<AesGcm256, HkdfSha256, X25519HkdfSha256, _>(
                        &OpModeS::Base,
                        &public_key,
                        info,
                        &mut get_rng(),
                    )?;
                Ok((
                    Bytes::from(encapsulated_key.to_bytes().to_vec()),
                    Box::new(SealingContext(context)),
                ))
            }
        }
    }

    fn setup_base_recipient(
        &self,
        encapsulated_key: &[u8],
        recipient_private_key: &[u8],
        info: &[u8],
    ) -> Result<Box<dyn HpkeOpeningContext>> {
        match (self.0.kem, self.0.kdf, self.0.aead) {
            (KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes256Gcm) => {
                let private_key =
                    <X25519HkdfSha256 as Kem>::PrivateKey::from_bytes(recipient_private_key)
                        .map_err(|_| Error::InvalidKeyLength)?;
                let encapsulated_key =
                    <X25519HkdfSha256 as Kem>::EncappedKey::from_bytes(encapsulated_key)
                        .map_err(|_| Error::Decryption)?;
                let context = hpke::setup_receiver::<AesGcm256, HkdfSha256, X25519HkdfSha256>(
                    &OpModeR::Base,
                    &private_key,
                    &encapsulated_key,
                    info,
                )?;
                Ok(Box::new(OpeningContext(context)))
            }
        }
    }
}
