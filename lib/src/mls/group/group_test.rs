use bytes::Bytes;

use crate::identifiers::{GroupId, UserId};
use crate::mls::crypto::cipher_suite::CipherSuite;
use crate::mls::crypto::provider::{CryptoProvider, RustCryptoProvider};
use crate::mls::framing::{ContentType, MlsCiphertext, RemoveProposal, SignedCommit, Welcome};
use crate::mls::group::config::{GroupConfig, DEFAULT_MAX_GENERATION_LOOKAHEAD};
use crate::mls::group::identity::LocalIdentity;
use crate::mls::group::state::{GenerationMap, GroupStateUpdate};
use crate::mls::group::{CommitBundle, MlsGroup};
use crate::mls::key_schedule::commit_envelope_key;
use crate::mls::storage::{MemoryPublicStore, MemorySecureKeyStore, PartitionedStorage};
use crate::mls::utilities::error::{CommitRejection, Error, ErrorKind, Result};
use crate::mls::utilities::serde::{Deserializer, Serializer};
use crate::mls::utilities::tree_math::LeafIndex;

type Storage = PartitionedStorage<MemoryPublicStore, MemorySecureKeyStore>;
type Group = MlsGroup<RustCryptoProvider, Storage>;

fn identity(user: &str) -> Result<LocalIdentity> {
    LocalIdentity::generate(UserId::from(user), &RustCryptoProvider::default())
}

fn create(identity: &LocalIdentity) -> Result<Group> {
    MlsGroup::create_group_with_identity(
        identity,
        "test group",
        GroupConfig::default(),
        RustCryptoProvider::default(),
        Storage::in_memory(),
    )
}

fn join(welcome: &Welcome, identity: &LocalIdentity) -> Result<Group> {
    MlsGroup::join_from_welcome(
        welcome,
        identity,
        GroupConfig::default(),
        RustCryptoProvider::default(),
        Storage::in_memory(),
    )
}

fn envelope(bundle: &CommitBundle) -> &MlsCiphertext {
    bundle
        .commit_message()
        .expect("every commit bundle carries an envelope")
}

/// Alice created the group and added Bob, both at epoch 1.
fn alice_and_bob() -> Result<(Group, Group)> {
    let mut alice = create(&identity("alice")?)?;
    let bob_identity = identity("bob")?;
    let bundle = alice.add_members(vec![bob_identity.add_proposal()])?;
    let bob = join(&bundle.welcomes[0], &bob_identity)?;
    Ok((alice, bob))
}

#[test]
fn creator_is_alone_at_epoch_zero() -> Result<()> {
    let alice_identity = identity("alice")?;
    let alice = create(&alice_identity)?;

    assert_eq!(alice.epoch(), 0);
    assert_eq!(alice.member_count(), 1);
    assert_eq!(alice.name(), "test group");
    assert_eq!(alice.own_leaf_index(), LeafIndex(0));
    assert_eq!(alice.id().as_bytes().len(), 16, "group ids are UUIDs");

    let member = alice
        .member_by_user_id(&UserId::from("alice"))
        .expect("creator is a member");
    assert_eq!(member.identity_key, alice_identity.signature_key_pair().public_key);
    assert_eq!(member.hpke_public_key, alice_identity.hpke_key_pair().public_key);
    assert!(alice.member_by_user_id(&UserId::from("bob")).is_none());
    Ok(())
}

#[test]
fn unsupported_cipher_suite_is_rejected() -> Result<()> {
    let config = GroupConfig::builder()
        .with_cipher_suite(CipherSuite::Unknown(0x0001))
        .build();
    let err = MlsGroup::create_group_with_identity(
        &identity("alice")?,
        "test group",
        config,
        RustCryptoProvider::default(),
        Storage::in_memory(),
    )
    .expect_err("provider only supports its own suite");

    assert_eq!(err, Error::UnsupportedCipherSuite);
    Ok(())
}

#[test]
fn invalid_proposal_lists_change_nothing() -> Result<()> {
    let (mut alice, _bob) = alice_and_bob()?;
    let before = alice.state().clone();
    let carol = identity("carol")?;

    let cases = [
        (alice.add_members(vec![]), Error::EmptyProposalList),
        (
            alice.add_members(vec![identity("bob")?.add_proposal()]),
            Error::DuplicateMember("bob".to_owned()),
        ),
        (
            alice.add_members(vec![carol.add_proposal(), carol.add_proposal()]),
            Error::DuplicateMember("carol".to_owned()),
        ),
        (alice.remove_members(vec![]), Error::EmptyProposalList),
        (
            alice.remove_members(vec![RemoveProposal {
                removed: LeafIndex(7),
            }]),
            Error::UnknownMember(LeafIndex(7)),
        ),
        (
            alice.remove_members(vec![RemoveProposal {
                removed: LeafIndex(0),
            }]),
            Error::CannotRemoveSelf,
        ),
        (
            alice.remove_members(vec![
                RemoveProposal {
                    removed: LeafIndex(1),
                },
                RemoveProposal {
                    removed: LeafIndex(1),
                },
            ]),
            Error::DuplicateRemoval(LeafIndex(1)),
        ),
    ];

    for (result, expected) in cases {
        let err = result.expect_err("invalid proposal list must fail");
        assert_eq!(err, expected);
        assert_eq!(err.kind(), ErrorKind::Mls);
    }
    assert_eq!(alice.state(), &before, "state is untouched");
    Ok(())
}

#[test]
fn update_needs_a_key_from_propose_update() -> Result<()> {
    let (mut alice, mut bob) = alice_and_bob()?;

    let foreign = bob.propose_update()?;
    let err = alice
        .update_self(foreign)
        .expect_err("key was proposed by another group");
    assert_eq!(err, Error::UnknownUpdateKey);
    assert_eq!(alice.epoch(), 1);
    Ok(())
}

#[test]
fn update_self_rotates_the_leaf_key() -> Result<()> {
    let (mut alice, mut bob) = alice_and_bob()?;
    let old_key = alice.members()[0].hpke_public_key.clone();

    let proposal = alice.propose_update()?;
    let bundle = alice.update_self(proposal.clone())?;
    assert!(bundle.welcomes.is_empty());
    bob.handle_commit(&bundle.commit, envelope(&bundle))?;

    assert_eq!(alice.epoch(), 2);
    assert_eq!(bob.epoch(), 2);
    assert_ne!(alice.members()[0].hpke_public_key, old_key);
    assert_eq!(alice.members()[0].hpke_public_key, proposal.hpke_public_key);
    assert_eq!(bob.members(), alice.members());
    assert_eq!(bob.group_context(), alice.group_context());
    assert_eq!(bob.state().epoch_secrets(), alice.state().epoch_secrets());

    let err = alice
        .update_self(proposal)
        .expect_err("a proposal is only committed once");
    assert_eq!(err, Error::UnknownUpdateKey);
    Ok(())
}

#[test]
fn tampered_commits_are_rejected() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (mut alice, mut bob) = alice_and_bob()?;
    let before = bob.state().clone();

    let bundle = alice.add_members(vec![identity("carol")?.add_proposal()])?;
    let message = envelope(&bundle);

    let mut other_group = message.clone();
    other_group.group_id = GroupId::generate();

    let mut skipped_epoch = message.clone();
    skipped_epoch.epoch += 1;

    let mut replayed_epoch = message.clone();
    replayed_epoch.epoch -= 1;

    let mut not_a_commit = message.clone();
    not_a_commit.content_type = ContentType::Application;

    let mut unknown_committer = message.clone();
    unknown_committer.sender_index = LeafIndex(9);

    let mut flipped = message.clone();
    let mut ciphertext = flipped.ciphertext.to_vec();
    ciphertext[0] ^= 1;
    flipped.ciphertext = Bytes::from(ciphertext);

    let mut other_commit = bundle.commit.clone();
    other_commit.proposals.clear();

    // Re-seal the envelope with a corrupted signature, as a member holding the
    // handshake secret could.
    let key = commit_envelope_key(&provider, &bob.state().epoch_secrets().handshake_secret)?;
    let aad = MlsCiphertext::additional_data(bob.group_context(), LeafIndex(0), ContentType::Commit)?;
    let plaintext = provider
        .aead()
        .open(&key, &message.nonce, &message.ciphertext, &aad)?;
    let mut signed = SignedCommit::deserialize_exact(&plaintext)?;
    let mut signature = signed.signature.to_vec();
    signature[0] ^= 1;
    signed.signature = Bytes::from(signature);
    let mut forged = message.clone();
    forged.ciphertext =
        provider
            .aead()
            .seal(&key, &message.nonce, &signed.serialize_detached()?, &aad)?;

    let cases = [
        (&bundle.commit, &other_group, CommitRejection::GroupIdMismatch),
        (
            &bundle.commit,
            &skipped_epoch,
            CommitRejection::UnexpectedEpoch {
                current: 1,
                received: 3,
            },
        ),
        (
            &bundle.commit,
            &replayed_epoch,
            CommitRejection::UnexpectedEpoch {
                current: 1,
                received: 1,
            },
        ),
        (&bundle.commit, &not_a_commit, CommitRejection::NotACommit),
        (
            &bundle.commit,
            &unknown_committer,
            CommitRejection::UnknownCommitter(LeafIndex(9)),
        ),
        (&bundle.commit, &flipped, CommitRejection::EnvelopeUndecryptable),
        (&other_commit, message, CommitRejection::EnvelopeMismatch),
        (&bundle.commit, &forged, CommitRejection::BadSignature),
    ];

    for (commit, message, expected) in cases {
        let err = bob
            .handle_commit(commit, message)
            .expect_err("tampered commit must be rejected");
        assert_eq!(err, Error::InvalidCommit(expected));
        assert_eq!(err.kind(), ErrorKind::InvalidCommit);
        assert_eq!(bob.state(), &before, "rejected commit leaves state untouched");
    }

    bob.handle_commit(&bundle.commit, message)?;
    assert_eq!(bob.epoch(), 2);
    assert_eq!(bob.group_context(), alice.group_context());

    let err = bob
        .handle_commit(&bundle.commit, message)
        .expect_err("a commit applies once");
    assert_eq!(err.kind(), ErrorKind::InvalidCommit);
    Ok(())
}

#[test]
fn removed_member_keeps_its_last_state() -> Result<()> {
    let (mut alice, mut bob) = alice_and_bob()?;
    let before = bob.state().clone();

    let bundle = alice.remove_members(vec![RemoveProposal {
        removed: bob.own_leaf_index(),
    }])?;
    assert_eq!(alice.member_count(), 1);

    let err = bob
        .handle_commit(&bundle.commit, envelope(&bundle))
        .expect_err("bob was removed");
    assert_eq!(err, Error::RemovedFromGroup);
    assert_eq!(bob.state(), &before);
    Ok(())
}

#[test]
fn messages_outside_the_current_epoch_are_rejected() -> Result<()> {
    let (mut alice, mut bob) = alice_and_bob()?;
    let message = alice.encrypt_application_message(b"hello")?;

    let mut other_group = message.clone();
    other_group.group_id = GroupId::generate();
    assert_eq!(
        bob.decrypt_application_message(&other_group),
        Err(Error::GroupIdMismatch)
    );

    let mut old_epoch = message.clone();
    old_epoch.epoch = 0;
    let err = bob
        .decrypt_application_message(&old_epoch)
        .expect_err("epoch 0 is over");
    assert_eq!(
        err,
        Error::EpochMismatch {
            current: 1,
            received: 0
        }
    );
    assert_eq!(err.kind(), ErrorKind::Mls);

    let mut as_commit = message.clone();
    as_commit.content_type = ContentType::Commit;
    assert_eq!(
        bob.decrypt_application_message(&as_commit)
            .map_err(|err| err.kind()),
        Err(ErrorKind::Decryption)
    );

    let mut unknown_sender = message.clone();
    unknown_sender.sender_index = LeafIndex(5);
    assert_eq!(
        bob.decrypt_application_message(&unknown_sender),
        Err(Error::UnknownSender(LeafIndex(5)))
    );

    let mut misattributed = message.clone();
    misattributed.sender_index = bob.own_leaf_index();
    assert_eq!(
        bob.decrypt_application_message(&misattributed)
            .map_err(|err| err.kind()),
        Err(ErrorKind::Decryption)
    );

    assert_eq!(bob.decrypt_application_message(&message)?, b"hello");
    Ok(())
}

#[test]
fn generations_advance_per_sender() -> Result<()> {
    let (mut alice, mut bob) = alice_and_bob()?;
    let alice_leaf = alice.own_leaf_index();

    let first = alice.encrypt_application_message(b"one")?;
    let second = alice.encrypt_application_message(b"two")?;
    assert_eq!(alice.state().generations().get(alice_leaf), 2);
    assert_ne!(first.nonce, second.nonce);

    // Out of order: the watermark jumps to 2, so the first message is late.
    assert_eq!(bob.decrypt_application_message(&second)?, b"two");
    assert_eq!(bob.state().generations().get(alice_leaf), 2);
    assert_eq!(
        bob.decrypt_application_message(&first),
        Err(Error::NoMatchingGeneration)
    );

    let reply = bob.encrypt_application_message(b"three")?;
    assert_eq!(alice.decrypt_application_message(&reply)?, b"three");

    // Commits reset every counter.
    let proposal = bob.propose_update()?;
    let bundle = bob.update_self(proposal)?;
    alice.handle_commit(&bundle.commit, envelope(&bundle))?;
    assert_eq!(alice.state().generations().get(alice_leaf), 0);
    assert_eq!(bob.state().generations().get(alice_leaf), 0);
    Ok(())
}

#[test]
fn generation_watermark_only_moves_up() -> Result<()> {
    let leaf = LeafIndex(1);
    let other = LeafIndex(2);
    let mut generations = GenerationMap::default();
    assert_eq!(generations.get(leaf), 0);

    generations.set(leaf, 5);
    assert_eq!(generations.get(leaf), 5);
    generations.set(leaf, 3);
    assert_eq!(generations.get(leaf), 5, "lower generation is ignored");
    generations.set(leaf, 5);
    assert_eq!(generations.get(leaf), 5, "equal generation is ignored");
    generations.set(leaf, 6);
    assert_eq!(generations.get(leaf), 6);

    assert_eq!(generations.increment(leaf)?, 7);
    assert_eq!(generations.get(other), 0, "watermarks are per sender");
    Ok(())
}

#[test]
fn exhausted_generations_block_sending_until_the_next_epoch() -> Result<()> {
    let (mut alice, mut bob) = alice_and_bob()?;
    let alice_leaf = alice.own_leaf_index();

    let mut generations = GenerationMap::default();
    generations.set(alice_leaf, u32::MAX);
    assert_eq!(
        generations.clone().increment(alice_leaf),
        Err(Error::GenerationExhausted(alice_leaf))
    );

    alice.state = alice.state.clone().copy_with(GroupStateUpdate {
        generations: Some(generations),
        ..GroupStateUpdate::default()
    });
    let before = alice.state().clone();

    let err = alice
        .encrypt_application_message(b"no nonce left")
        .expect_err("generation counter is exhausted");
    assert_eq!(err, Error::GenerationExhausted(alice_leaf));
    assert_eq!(err.kind(), ErrorKind::Mls);
    assert_eq!(alice.state(), &before);

    let proposal = alice.propose_update()?;
    let bundle = alice.update_self(proposal)?;
    bob.handle_commit(&bundle.commit, envelope(&bundle))?;

    let message = alice.encrypt_application_message(b"fresh epoch")?;
    assert_eq!(alice.state().generations().get(alice_leaf), 1);
    assert_eq!(bob.decrypt_application_message(&message)?, b"fresh epoch");
    Ok(())
}

#[test]
fn config_from_json() -> Result<()> {
    let config: GroupConfig = serde_json::from_str("{}").expect("empty config is valid");
    assert_eq!(config, GroupConfig::default());
    assert_eq!(config.max_generation_lookahead(), DEFAULT_MAX_GENERATION_LOOKAHEAD);

    let config: GroupConfig =
        serde_json::from_str(r#"{ "cipher_suite": 61441, "max_generation_lookahead": 8 }"#)
            .expect("config parses");
    assert_eq!(
        config.cipher_suite(),
        CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519
    );
    assert_eq!(config.max_generation_lookahead(), 8);

    let round_trip: GroupConfig =
        serde_json::from_str(&serde_json::to_string(&config).expect("config serializes"))
            .expect("config parses");
    assert_eq!(round_trip, config);

    let provider = RustCryptoProvider::default();
    assert!(provider.supports(config.cipher_suite()));
    Ok(())
}
