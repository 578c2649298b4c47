use bytes::Bytes;

use crate::identifiers::{GroupId, UserId};
use crate::mls::crypto::provider::{CryptoProvider, RustCryptoProvider};
use crate::mls::crypto::Secret;
use crate::mls::framing::*;
use crate::mls::group::state::GroupMember;
use crate::mls::key_schedule::{EpochSecrets, GroupContext};
use crate::mls::ratchet_tree::{HpkeCiphertext, RatchetTree, UpdatePath, UpdatePathNode};
use crate::mls::utilities::error::{Error, ErrorKind, Result};
use crate::mls::utilities::serde::{Deserializer, Serializer};
use crate::mls::utilities::tree_math::LeafIndex;

fn context(epoch: u64) -> GroupContext {
    GroupContext {
        group_id: GroupId::from(&b"framing"[..]),
        epoch,
        tree_hash: Bytes::from_static(&[7; 32]),
        confirmed_transcript_hash: Bytes::from_static(&[8; 32]),
        extensions_hash: None,
    }
}

fn commit() -> Commit {
    Commit {
        proposals: vec![
            Proposal::Remove(RemoveProposal {
                removed: LeafIndex(2),
            }),
            Proposal::Add(AddProposal {
                user_id: UserId::from("dave"),
                identity_key: vec![1u8; 32].into(),
                hpke_public_key: vec![2u8; 32].into(),
            }),
        ],
        update_path: Some(UpdatePath {
            leaf_public_key: vec![3u8; 32].into(),
            nodes: vec![UpdatePathNode {
                public_key: vec![4u8; 32].into(),
                encrypted_path_secrets: vec![HpkeCiphertext {
                    kem_output: Bytes::from_static(&[5; 32]),
                    ciphertext: Bytes::from_static(&[6; 48]),
                }],
            }],
        }),
    }
}

#[test]
fn ciphertext_codec() -> Result<()> {
    let message = MlsCiphertext {
        group_id: GroupId::generate(),
        epoch: u64::from(u32::MAX) + 1,
        sender_index: LeafIndex(5),
        nonce: Bytes::from_static(&[1; 12]),
        ciphertext: Bytes::from_static(b"sealed"),
        content_type: ContentType::Commit,
    };

    let bytes = message.serialize_detached()?;
    assert_eq!(MlsCiphertext::deserialize_exact(&bytes)?, message);

    let mut truncated = bytes.to_vec();
    truncated.pop();
    assert!(MlsCiphertext::deserialize_exact(&truncated).is_err());
    Ok(())
}

#[test]
fn unknown_content_type_is_rejected() {
    assert_eq!(ContentType::try_from(1), Ok(ContentType::Application));
    assert_eq!(ContentType::try_from(2), Ok(ContentType::Commit));

    let err = ContentType::deserialize_exact([3u8]).expect_err("3 is not a content type");
    assert_eq!(err, Error::InvalidEnumValue(3));
    assert_eq!(err.kind(), ErrorKind::Codec);
}

#[test]
fn commit_codec_keeps_proposal_order() -> Result<()> {
    let commit = commit();
    let decoded = Commit::deserialize_exact(commit.serialize_detached()?)?;
    assert_eq!(decoded, commit);

    let without_path = Commit {
        update_path: None,
        ..commit
    };
    let decoded = Commit::deserialize_exact(without_path.serialize_detached()?)?;
    assert_eq!(decoded.update_path, None);
    assert_eq!(decoded.proposals.len(), 2);
    Ok(())
}

#[test]
fn signed_content_binds_the_epoch() -> Result<()> {
    let commit = commit();
    let tbs = SignedCommit::to_be_signed(&context(3), &commit)?;

    assert_ne!(tbs, SignedCommit::to_be_signed(&context(4), &commit)?);
    assert_ne!(
        tbs,
        SignedCommit::to_be_signed(
            &context(3),
            &Commit {
                proposals: vec![],
                ..commit.clone()
            }
        )?
    );
    Ok(())
}

#[test]
fn additional_data_binds_sender_and_content_type() -> Result<()> {
    let context = context(1);
    let base = MlsCiphertext::additional_data(&context, LeafIndex(0), ContentType::Application)?;

    assert_ne!(
        base,
        MlsCiphertext::additional_data(&context, LeafIndex(1), ContentType::Application)?
    );
    assert_ne!(
        base,
        MlsCiphertext::additional_data(&context, LeafIndex(0), ContentType::Commit)?
    );
    Ok(())
}

fn group_info(provider: &impl CryptoProvider) -> Result<(GroupInfo, GroupSecrets)> {
    let signer = provider.signature().generate_key_pair()?;
    let leaf = provider.hpke().generate_key_pair()?;
    let tree = RatchetTree::new(leaf.public_key.clone(), leaf.private_key).public_only();

    let mut group_context = context(1);
    group_context.tree_hash = tree.tree_hash(provider)?;

    let mut group_info = GroupInfo {
        group_context,
        group_name: "book club".to_owned(),
        tree,
        members: vec![GroupMember {
            user_id: UserId::from("alice"),
            leaf_index: LeafIndex(0),
            identity_key: signer.public_key,
            hpke_public_key: leaf.public_key,
        }],
        signer: LeafIndex(0),
        signature: Bytes::new(),
    };
    group_info.sign(provider, &signer.private_key)?;

    let group_secrets = GroupSecrets {
        init_secret: Secret::from(vec![1u8; 32]),
        epoch_secrets: EpochSecrets {
            epoch_secret: Secret::from(vec![3u8; 32]),
            sender_data_secret: Secret::from(vec![4u8; 32]),
            handshake_secret: Secret::from(vec![5u8; 32]),
            application_secret: Secret::from(vec![6u8; 32]),
        },
        leaf_index: LeafIndex(1),
        path_secret: Some(Secret::from(vec![2u8; 32])),
    };
    Ok((group_info, group_secrets))
}

#[test]
fn group_info_signature_covers_its_content() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (group_info, _) = group_info(&provider)?;
    assert!(group_info.verify(&provider)?);

    let mut renamed = group_info.clone();
    renamed.group_name = "chess club".to_owned();
    assert!(!renamed.verify(&provider)?);

    let mut wrong_signer = group_info;
    wrong_signer.signer = LeafIndex(4);
    assert!(!wrong_signer.verify(&provider)?);
    Ok(())
}

#[test]
fn welcome_opens_only_for_its_recipient() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (group_info, group_secrets) = group_info(&provider)?;
    let invitee = provider.hpke().generate_key_pair()?;
    let stranger = provider.hpke().generate_key_pair()?;

    let welcome = Welcome::seal(&provider, &invitee.public_key, &group_secrets, &group_info)?;
    let welcome = Welcome::deserialize_exact(welcome.serialize_detached()?)?;
    assert_eq!(welcome.group_id, group_info.group_context.group_id);

    let (secrets, info) = welcome.open(&provider, &invitee.private_key)?;
    assert_eq!(secrets, group_secrets);
    assert_eq!(info, group_info);

    let err = welcome
        .open(&provider, &stranger.private_key)
        .expect_err("stranger can't open the welcome");
    assert_eq!(err, Error::WelcomeNotForUs);

    let mut swapped = welcome.clone();
    swapped.encrypted_group_info = Bytes::from_static(b"not the group info");
    assert!(matches!(
        swapped.open(&provider, &invitee.private_key),
        Err(Error::InvalidWelcome(_))
    ));
    Ok(())
}
