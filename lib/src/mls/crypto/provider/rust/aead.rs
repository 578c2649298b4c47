use aes_gcm::{
    aead::{consts::U12, AeadInPlace, KeyInit},
    Aes256Gcm, Key as AesKey, Nonce,
};
use bytes::Bytes;

use crate::mls::crypto::AeadId;
use crate::mls::utilities::error::{Error, Result};

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct AeadWrapper(pub(super) AeadId);

impl AeadWrapper {
    fn check_lengths(&self, key: &[u8], nonce: &[u8]) -> Result<()> {
        use crate::mls::crypto::provider::Aead;

        if key.len() != self.key_size() as usize || nonce.len() != self.nonce_size() as usize {
            return Err(Error::InvalidKeyLength);
        }
        Ok(())
    }
}

impl crate::mls::crypto::provider::Aead for AeadWrapper {
    fn key_size(&self) -> u16 {
        match self.0 {
            AeadId::Aes256Gcm => 32,
        }
    }

    fn nonce_size(&self) -> u16 {
        match self.0 {
            AeadId::Aes256Gcm => 12,
        }
    }

    fn seal(&self, key: &[u8], nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Bytes> {
        self.check_lengths(key, nonce)?;

        match self.0 {
            AeadId::Aes256Gcm => {
                let key: &AesKey<Aes256Gcm> = key.into();
                let nonce: &Nonce<U12> = nonce.into();

                let cipher = Aes256Gcm::new(key);
                let mut in_out = plaintext.to_vec();
                cipher
                    .encrypt_in_place(nonce, aad, &mut in_out)
                    .map_err(|err| Error::RustCryptoError(err.to_string()))?;

                Ok(Bytes::from(in_out))
            }
        }
    }

    fn open(&self, key: &[u8], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Bytes> {
        self.check_lengths(key, nonce)?;

        match self.0 {
            AeadId::Aes256Gcm => {
                let key: &AesKey<Aes256Gcm> = key.into();
                let nonce: &Nonce<U12> = nonce.into();

                let cipher = Aes256Gcm::new(key);
                let mut in_out = ciphertext.to_vec();
                cipher
                    .decrypt_in_place(nonce, aad, &mut in_out)
                    .map_err(|_| Error::Decryption)?;

                Ok(Bytes::from(in_out))
            }
        }
    }
}
