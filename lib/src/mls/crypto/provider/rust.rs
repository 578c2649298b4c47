mod aead;
mod hash;
mod hpke;
mod kdf;
mod signature;

use self::aead::AeadWrapper;
use self::hash::HashSchemeWrapper;
use self::hpke::HpkeSuiteWrapper;
use self::kdf::KdfWrapper;
use self::signature::SignatureSchemeWrapper;
use super::{
    Aead, CipherSuite, CryptoProvider, Hash, HashScheme, Hpke, HpkeSuite, Kdf, Signature,
    SignatureScheme,
};
use crate::mls::crypto::{AeadId, KdfId, KemId};
use crate::mls::utilities::error::{Error, Result};

struct CipherSuiteDescription {
    hash: HashSchemeWrapper,
    kdf: KdfWrapper,
    aead: AeadWrapper,
    hpke: HpkeSuiteWrapper,
    signature: SignatureSchemeWrapper,
}

static CIPHER_SUITE_DESCRIPTIONS: [CipherSuiteDescription; 1] = [
    //0xF001: CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519
    CipherSuiteDescription {
        hash: HashSchemeWrapper(HashScheme::SHA256),
        kdf: KdfWrapper(KdfId::HkdfSha256),
        aead: AeadWrapper(AeadId::Aes256Gcm),
        hpke: HpkeSuiteWrapper(HpkeSuite {
            kem: KemId::X25519HkdfSha256,
            kdf: KdfId::HkdfSha256,
            aead: AeadId::Aes256Gcm,
        }),
        signature: SignatureSchemeWrapper(SignatureScheme::ED25519),
    },
];

/// [RustCrypto](https://github.com/RustCrypto) based crypto provider
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RustCryptoProvider {
    cipher_suite: CipherSuite,
}

impl Default for RustCryptoProvider {
    fn default() -> Self {
        Self {
            cipher_suite: CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519,
        }
    }
}

impl RustCryptoProvider {
    pub fn new(cipher_suite: CipherSuite) -> Result<Self> {
        match cipher_suite {
            CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519 => Ok(Self { cipher_suite }),
            CipherSuite::Unknown(_) => Err(Error::UnsupportedCipherSuite),
        }
    }

    fn description(&self) -> &'static CipherSuiteDescription {
        match self.cipher_suite {
            CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519 | CipherSuite::Unknown(_) => {
                &CIPHER_SUITE_DESCRIPTIONS[0]
            }
        }
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    fn hash(&self) -> &dyn Hash {
        &self.description().hash
    }

    fn kdf(&self) -> &dyn Kdf {
        &self.description().kdf
    }

    fn aead(&self) -> &dyn Aead {
        &self.description().aead
    }

    fn signature(&self) -> &dyn Signature {
        &self.description().signature
    }

    fn hpke(&self) -> &dyn Hpke {
        &self.description().hpke
    }
}
