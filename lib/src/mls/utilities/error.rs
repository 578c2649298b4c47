//! Errors produced by the group engine.
//!
//! Every failure is a variant of [`Error`]. Callers that only care about the
//! broad category (precondition violation, rejected commit, failed decryption)
//! should match on [`Error::kind`] instead of individual variants.

use crate::mls::storage::StorageError;
use crate::mls::utilities::tree_math::LeafIndex;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure category of an [`Error`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// A precondition of the requested operation was not met. Nothing changed.
    Mls,
    /// An incoming commit was rejected before any state was touched.
    InvalidCommit,
    /// Authentication of a ciphertext failed (wrong key, generation, or
    /// tampered data). Only the message in question is affected.
    Decryption,
    /// Bytes could not be decoded.
    Codec,
    /// A cryptographic primitive could not be used with the given input.
    Crypto,
    /// The storage collaborator failed.
    Storage,
}

/// Why an incoming commit was rejected.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CommitRejection {
    GroupIdMismatch,
    UnexpectedEpoch { current: u64, received: u64 },
    NotACommit,
    UnknownCommitter(LeafIndex),
    EnvelopeUndecryptable,
    EnvelopeMismatch,
    BadSignature,
    MissingUpdatePath,
    MalformedUpdatePath,
    NoDecryptablePathSecret,
    InvalidProposal,
}

impl std::fmt::Display for CommitRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupIdMismatch => f.write_str("commit belongs to another group"),
            Self::UnexpectedEpoch { current, received } => write!(
                f,
                "commit targets epoch {received} but the group is at epoch {current}"
            ),
            Self::NotACommit => f.write_str("envelope does not carry a commit"),
            Self::UnknownCommitter(leaf) => write!(f, "no member at committer leaf {leaf}"),
            Self::EnvelopeUndecryptable => f.write_str("commit envelope could not be opened"),
            Self::EnvelopeMismatch => f.write_str("commit does not match its envelope"),
            Self::BadSignature => f.write_str("committer signature does not verify"),
            Self::MissingUpdatePath => f.write_str("commit has no update path"),
            Self::MalformedUpdatePath => f.write_str("update path does not fit the tree"),
            Self::NoDecryptablePathSecret => {
                f.write_str("no path secret in the update path is encrypted to us")
            }
            Self::InvalidProposal => f.write_str("commit carries a proposal that cannot apply"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    // Preconditions
    #[error("proposal list is empty")]
    EmptyProposalList,
    #[error("no member at leaf {0}")]
    UnknownMember(LeafIndex),
    #[error("a member can't remove itself, it has to be removed by someone else")]
    CannotRemoveSelf,
    #[error("leaf {0} appears more than once in the proposal list")]
    DuplicateRemoval(LeafIndex),
    #[error("user {0} is already a member or is being added twice")]
    DuplicateMember(String),
    #[error("update proposal key was not generated by this group")]
    UnknownUpdateKey,
    #[error("leaf {0} has used every message generation of this epoch")]
    GenerationExhausted(LeafIndex),
    #[error("message belongs to another group")]
    GroupIdMismatch,
    #[error("message is for epoch {received} but the group is at epoch {current}")]
    EpochMismatch { current: u64, received: u64 },
    #[error("we were removed from the group by this commit")]
    RemovedFromGroup,
    #[error("welcome message is not addressed to this identity")]
    WelcomeNotForUs,
    #[error("welcome message is inconsistent: {0}")]
    InvalidWelcome(&'static str),

    #[error("invalid commit: {0}")]
    InvalidCommit(CommitRejection),

    #[error("decryption failed")]
    Decryption,
    #[error("failed to decrypt with any generation")]
    NoMatchingGeneration,
    #[error("message sender {0} is not a member")]
    UnknownSender(LeafIndex),

    // Codec
    #[error("buffer is too small")]
    BufferTooSmall,
    #[error("invalid variable length integer prefix")]
    InvalidVariableLengthIntegerPrefix,
    #[error("minimum encoding was not used")]
    MinimumEncodingWasNotUsed,
    #[error("varint exceeds 30 bits")]
    VarintExceeds30Bits,
    #[error("opaque size exceeds maximum value of u32")]
    OpaqueSizeExceedsMaximumValueOfU32,
    #[error("invalid optional value")]
    InvalidOptionalValue,
    #[error("invalid enum value {0}")]
    InvalidEnumValue(u16),
    #[error("unsupported format version {0}")]
    UnsupportedFormatVersion(u8),
    #[error("required record {0} is missing")]
    MissingRecord(&'static str),
    #[error("unexpected trailing bytes")]
    TrailingBytes,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("ratchet tree encoding is malformed")]
    MalformedTree,

    // Crypto
    #[error("cipher suite is not supported by this crypto provider")]
    UnsupportedCipherSuite,
    #[error("key or nonce has the wrong length")]
    InvalidKeyLength,
    #[error("invalid Ed25519 key")]
    InvalidEd25519Key,
    #[error("HPKE error: {0}")]
    Hpke(String),
    #[error("RustCrypto error: {0}")]
    RustCryptoError(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyProposalList
            | Error::UnknownMember(_)
            | Error::CannotRemoveSelf
            | Error::DuplicateRemoval(_)
            | Error::DuplicateMember(_)
            | Error::UnknownUpdateKey
            | Error::GenerationExhausted(_)
            | Error::GroupIdMismatch
            | Error::EpochMismatch { .. }
            | Error::RemovedFromGroup
            | Error::WelcomeNotForUs
            | Error::InvalidWelcome(_) => ErrorKind::Mls,
            Error::InvalidCommit(_) => ErrorKind::InvalidCommit,
            Error::Decryption | Error::NoMatchingGeneration | Error::UnknownSender(_) => {
                ErrorKind::Decryption
            }
            Error::BufferTooSmall
            | Error::InvalidVariableLengthIntegerPrefix
            | Error::MinimumEncodingWasNotUsed
            | Error::VarintExceeds30Bits
            | Error::OpaqueSizeExceedsMaximumValueOfU32
            | Error::InvalidOptionalValue
            | Error::InvalidEnumValue(_)
            | Error::UnsupportedFormatVersion(_)
            | Error::MissingRecord(_)
            | Error::TrailingBytes
            | Error::InvalidUtf8
            | Error::MalformedTree => ErrorKind::Codec,
            Error::UnsupportedCipherSuite
            | Error::InvalidKeyLength
            | Error::InvalidEd25519Key
            | Error::Hpke(_)
            | Error::RustCryptoError(_) => ErrorKind::Crypto,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<CommitRejection> for Error {
    fn from(value: CommitRejection) -> Self {
        Error::InvalidCommit(value)
    }
}

impl From<hpke::HpkeError> for Error {
    fn from(value: hpke::HpkeError) -> Self {
        match value {
            hpke::HpkeError::OpenError => Error::Decryption,
            other => Error::Hpke(format!("{other:?}")),
        }
    }
}

impl From<hmac::digest::InvalidLength> for Error {
    fn from(_: hmac::digest::InvalidLength) -> Self {
        Error::InvalidKeyLength
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(_: ed25519_dalek::SignatureError) -> Self {
        Error::InvalidEd25519Key
    }
}
