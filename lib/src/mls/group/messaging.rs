use bytes::Bytes;

use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::Secret;
use crate::mls::framing::{ContentType, MlsCiphertext};
use crate::mls::key_schedule::derive_application_keys;
use crate::mls::storage::GroupStorage;
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::tree_math::LeafIndex;

use super::state::GroupStateUpdate;
use super::MlsGroup;

impl<C: CryptoProvider, S: GroupStorage> MlsGroup<C, S> {
    /// Encrypts `plaintext` under this member's next generation key of the
    /// current epoch.
    pub fn encrypt_application_message(&mut self, plaintext: &[u8]) -> Result<MlsCiphertext> {
        let own_leaf = self.own_leaf_index();
        let mut generations = self.state.generations().clone();
        let generation = generations.increment(own_leaf)?;

        let (key, nonce) = derive_application_keys(
            &self.crypto_provider,
            &self.state.epoch_secrets().application_secret,
            own_leaf,
            generation,
        )?;
        let aad = MlsCiphertext::additional_data(
            self.group_context(),
            own_leaf,
            ContentType::Application,
        )?;
        let ciphertext = self
            .crypto_provider
            .aead()
            .seal(&key, &nonce, plaintext, &aad)?;

        let message = MlsCiphertext {
            group_id: self.id().clone(),
            epoch: self.epoch(),
            sender_index: own_leaf,
            nonce,
            ciphertext,
            content_type: ContentType::Application,
        };

        let next = self.state.clone().copy_with(GroupStateUpdate {
            generations: Some(generations),
            ..Default::default()
        });
        self.install(next)?;

        Ok(message)
    }

    /// Decrypts a message sent in the current epoch.
    ///
    /// Only generations above the last one accepted from the sender, and at
    /// most [`GroupConfig::max_generation_lookahead`] past it, are tried, so a
    /// replayed message fails.
    ///
    /// [`GroupConfig::max_generation_lookahead`]: super::config::GroupConfig::max_generation_lookahead
    pub fn decrypt_application_message(&mut self, message: &MlsCiphertext) -> Result<Vec<u8>> {
        let (generation, plaintext) = match self.open_application_message(message) {
            Ok(opened) => opened,
            Err(err) => {
                log::warn!(
                    "Dropped message from leaf {} for {} at epoch {}: {err}",
                    message.sender_index,
                    self.id(),
                    self.epoch()
                );
                return Err(err);
            }
        };

        let mut generations = self.state.generations().clone();
        generations.set(message.sender_index, generation);
        let next = self.state.clone().copy_with(GroupStateUpdate {
            generations: Some(generations),
            ..Default::default()
        });
        self.install(next)?;

        Ok(plaintext.to_vec())
    }

    fn open_application_message(&self, message: &MlsCiphertext) -> Result<(u32, Bytes)> {
        if message.group_id != *self.id() {
            return Err(Error::GroupIdMismatch);
        }
        if message.epoch != self.epoch() {
            return Err(Error::EpochMismatch {
                current: self.epoch(),
                received: message.epoch,
            });
        }
        if message.content_type != ContentType::Application {
            return Err(Error::Decryption);
        }

        let sender = message.sender_index;
        if self.state.member(sender).is_none() {
            return Err(Error::UnknownSender(sender));
        }

        let (generation, key) = self.find_generation(sender, &message.nonce)?;
        let aad =
            MlsCiphertext::additional_data(self.group_context(), sender, ContentType::Application)?;
        let plaintext = self
            .crypto_provider
            .aead()
            .open(&key, &message.nonce, &message.ciphertext, &aad)?;

        Ok((generation, plaintext))
    }

    /// Walks the generations after `sender`'s watermark, looking for the one
    /// whose nonce the message was sealed with.
    fn find_generation(&self, sender: LeafIndex, nonce: &[u8]) -> Result<(u32, Secret)> {
        let watermark = self.state.generations().get(sender);
        let first = watermark
            .checked_add(1)
            .ok_or(Error::NoMatchingGeneration)?;
        let last = watermark.saturating_add(self.config.max_generation_lookahead());
        let application_secret = &self.state.epoch_secrets().application_secret;

        for generation in first..=last {
            let (key, candidate_nonce) = derive_application_keys(
                &self.crypto_provider,
                application_secret,
                sender,
                generation,
            )?;
            if candidate_nonce == nonce {
                return Ok((generation, key));
            }
        }

        Err(Error::NoMatchingGeneration)
    }
}
