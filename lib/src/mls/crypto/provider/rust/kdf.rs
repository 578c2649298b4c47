use bytes::Bytes;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::mls::crypto::KdfId;
use crate::mls::utilities::error::{Error, Result};

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct KdfWrapper(pub(super) KdfId);

impl crate::mls::crypto::provider::Kdf for KdfWrapper {
    fn extract_size(&self) -> u16 {
        match self.0 {
            KdfId::HkdfSha256 => 32,
        }
    }

    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Result<Bytes> {
        match self.0 {
            KdfId::HkdfSha256 => {
                let mut m = Hmac::<Sha256>::new_from_slice(salt)?;
                m.update(ikm);
                Ok(Bytes::from(m.finalize().into_bytes().to_vec()))
            }
        }
    }

    fn expand(&self, prk: &[u8], info: &[u8], length: u16) -> Result<Bytes> {
        let mut out = vec![0u8; length as usize];

        match self.0 {
            KdfId::HkdfSha256 => {
                let hkdf = Hkdf::<Sha256>::from_prk(prk)
                    .map_err(|err| Error::RustCryptoError(err.to_string()))?;
                hkdf.expand(info, &mut out)
                    .map_err(|err| Error::RustCryptoError(err.to_string()))?;
            }
        }

        Ok(Bytes::from(out))
    }
}
