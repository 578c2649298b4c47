//! [RFC9420 Sec.12.1](https://www.rfc-editor.org/rfc/rfc9420.html#section-12.1) Proposals
//!
//! Only the three membership proposals exist here. They are never sent on
//! their own, only inside the [`Commit`](super::Commit) that applies them.

use bytes::{Buf, BufMut};

use crate::identifiers::UserId;
use crate::mls::crypto::{HpkePublicKey, SignaturePublicKey};
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{deserialize_u32, Deserializer, Serializer};
use crate::mls::utilities::tree_math::LeafIndex;

/// Invites a user, given their already authenticated public keys.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct AddProposal {
    pub user_id: UserId,
    /// Ed25519 key the new member will sign its commits with.
    pub identity_key: SignaturePublicKey,
    /// Key the Welcome is encrypted to. It also becomes the member's leaf key.
    pub hpke_public_key: HpkePublicKey,
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct RemoveProposal {
    pub removed: LeafIndex,
}

/// A fresh leaf key for the committer, produced by
/// [`MlsGroup::propose_update`](crate::mls::group::MlsGroup::propose_update).
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct UpdateProposal {
    pub hpke_public_key: HpkePublicKey,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Proposal {
    Add(AddProposal),
    Remove(RemoveProposal),
    Update(UpdateProposal),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u16)]
pub enum ProposalType {
    Add = 0x0001,
    Update = 0x0002,
    Remove = 0x0003,
}

impl TryFrom<u16> for ProposalType {
    type Error = Error;

    fn try_from(v: u16) -> Result<Self> {
        match v {
            0x0001 => Ok(ProposalType::Add),
            0x0002 => Ok(ProposalType::Update),
            0x0003 => Ok(ProposalType::Remove),
            _ => Err(Error::InvalidEnumValue(v)),
        }
    }
}

impl Proposal {
    pub fn proposal_type(&self) -> ProposalType {
        match self {
            Proposal::Add(_) => ProposalType::Add,
            Proposal::Update(_) => ProposalType::Update,
            Proposal::Remove(_) => ProposalType::Remove,
        }
    }
}

impl Deserializer for AddProposal {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let user_id = UserId::deserialize(buf)?;
        let identity_key = SignaturePublicKey::deserialize(buf)?;
        let hpke_public_key = HpkePublicKey::deserialize(buf)?;

        Ok(Self {
            user_id,
            identity_key,
            hpke_public_key,
        })
    }
}

impl Serializer for AddProposal {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.user_id.serialize(buf)?;
        self.identity_key.serialize(buf)?;
        self.hpke_public_key.serialize(buf)
    }
}

impl Deserializer for Proposal {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if buf.remaining() < 2 {
            return Err(Error::BufferTooSmall);
        }
        let proposal_type = ProposalType::try_from(buf.get_u16())?;

        match proposal_type {
            ProposalType::Add => Ok(Proposal::Add(AddProposal::deserialize(buf)?)),
            ProposalType::Update => Ok(Proposal::Update(UpdateProposal {
                hpke_public_key: HpkePublicKey::deserialize(buf)?,
            })),
            ProposalType::Remove => Ok(Proposal::Remove(RemoveProposal {
                removed: LeafIndex(deserialize_u32(buf)?),
            })),
        }
    }
}

impl Serializer for Proposal {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        buf.put_u16(self.proposal_type() as u16);
        match self {
            Proposal::Add(add) => add.serialize(buf),
            Proposal::Update(update) => update.hpke_public_key.serialize(buf),
            Proposal::Remove(remove) => {
                buf.put_u32(remove.removed.0);
                Ok(())
            }
        }
    }
}
