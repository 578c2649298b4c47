//! Group key agreement: a ratchet tree of HPKE keys, an epoch key schedule
//! and per-sender message keys, driven by [`MlsGroup`].

pub mod crypto;
pub mod framing;
pub mod group;
pub mod key_schedule;
pub mod ratchet_tree;
pub mod storage;
pub mod utilities;

pub use self::group::config::GroupConfig;
pub use self::group::identity::LocalIdentity;
pub use self::group::state::{GroupMember, GroupState};
pub use self::group::{CommitBundle, MlsGroup};
pub use self::utilities::error::{CommitRejection, Error, ErrorKind, Result};
