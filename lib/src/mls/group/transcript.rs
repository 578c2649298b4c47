use bytes::{Bytes, BytesMut};

use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::Secret;
use crate::mls::key_schedule::{
    derive_epoch_secrets, joiner_secret, next_init_secret, EpochSecrets, GroupContext,
};
use crate::mls::ratchet_tree::RatchetTree;
use crate::mls::utilities::error::Result;
use crate::mls::utilities::serde::Serializer;

use super::state::GroupState;

/// Context and secrets of the epoch a commit moves the group to.
#[derive(Debug, Clone)]
pub(crate) struct NextEpoch {
    pub context: GroupContext,
    pub epoch_secrets: EpochSecrets,
    pub init_secret: Secret,
}

/// As described in <https://www.rfc-editor.org/rfc/rfc9420.html#name-transcript-hashes>
///
/// "A `confirmed_transcript_hash` that represents a transcript over the whole history
/// of Commit messages, up to and including the signature of the most recent Commit."
///
/// ```text
/// confirmed_transcript_hash_[epoch] =
///     Hash(confirmed_transcript_hash_[epoch - 1] || Commit || signature);
/// ```
pub(crate) fn next_confirmed_transcript_hash(
    crypto_provider: &impl CryptoProvider,
    previous: &[u8],
    signed_commit: &impl Serializer,
) -> Result<Bytes> {
    let mut input = BytesMut::from(previous);
    signed_commit.serialize(&mut input)?;
    Ok(crypto_provider.hash().digest(&input))
}

impl GroupState {
    /// Everything about the next epoch that both the committer and the
    /// receivers compute the same way once they agree on the new tree.
    pub(crate) fn next_epoch(
        &self,
        crypto_provider: &impl CryptoProvider,
        tree: &RatchetTree,
        signed_commit: &impl Serializer,
        commit_secret: &[u8],
    ) -> Result<NextEpoch> {
        let previous = self.context();
        let context = GroupContext {
            group_id: previous.group_id.clone(),
            epoch: previous.epoch + 1,
            tree_hash: tree.tree_hash(crypto_provider)?,
            confirmed_transcript_hash: next_confirmed_transcript_hash(
                crypto_provider,
                &previous.confirmed_transcript_hash,
                signed_commit,
            )?,
            extensions_hash: previous.extensions_hash.clone(),
        };

        let joiner_secret = joiner_secret(crypto_provider, self.init_secret(), commit_secret)?;
        let epoch_secrets =
            derive_epoch_secrets(crypto_provider, &joiner_secret, &context.hash(crypto_provider)?)?;
        let init_secret = next_init_secret(crypto_provider, &epoch_secrets)?;

        Ok(NextEpoch {
            context,
            epoch_secrets,
            init_secret,
        })
    }
}
