use crate::mls::crypto::key_pair::HpkeKeyPair;
use crate::mls::crypto::provider::{CryptoProvider, RustCryptoProvider};
use crate::mls::ratchet_tree::*;
use crate::mls::utilities::error::{CommitRejection, Error, Result};
use crate::mls::utilities::serde::{Deserializer, Serializer};
use crate::mls::utilities::tree_math::{LeafIndex, NodeIndex};

const CONTEXT: &[u8] = b"group 1";

fn nodes(indices: &[u32]) -> Vec<NodeIndex> {
    indices.iter().copied().map(NodeIndex).collect()
}

/// One view of the same public tree per member, each holding its own leaf key.
fn member_trees(
    provider: &impl CryptoProvider,
    members: u32,
) -> Result<(Vec<RatchetTree>, Vec<HpkeKeyPair>)> {
    let key_pairs = (0..members)
        .map(|_| provider.hpke().generate_key_pair())
        .collect::<Result<Vec<_>>>()?;

    let mut public = RatchetTree::new(
        key_pairs[0].public_key.clone(),
        key_pairs[0].private_key.clone(),
    )
    .public_only();
    for key_pair in &key_pairs[1..] {
        public.append_leaf(key_pair.public_key.clone());
    }

    let mut trees = vec![];
    for (i, key_pair) in (0..members).zip(&key_pairs) {
        let mut tree = public.clone();
        tree.set_leaf_private_key(LeafIndex(i), key_pair.private_key.clone())?;
        trees.push(tree);
    }
    Ok((trees, key_pairs))
}

#[test]
fn appending_grows_the_right_edge() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (trees, _) = member_trees(&provider, 3)?;
    let tree = &trees[0];

    assert_eq!(tree.num_leaves().0, 3);
    assert_eq!(tree.num_leaves().width(), 5);
    assert_eq!(
        tree.resolution(NodeIndex(3)),
        nodes(&[0, 2, 4]),
        "blank parents resolve to their leaves"
    );
    assert_eq!(tree.resolution(NodeIndex(4)), nodes(&[4]));
    Ok(())
}

#[test]
fn tree_grows_by_two_nodes_per_leaf() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let first = provider.hpke().generate_key_pair()?;
    let mut tree = RatchetTree::new(first.public_key, first.private_key).public_only();

    let mut widths = vec![];
    for leaves in 1..=4u32 {
        if leaves > 1 {
            let key_pair = provider.hpke().generate_key_pair()?;
            assert_eq!(tree.append_leaf(key_pair.public_key), LeafIndex(leaves - 1));
        }
        widths.push(tree.nodes.len());
        assert_eq!(tree.num_leaves().0, leaves);
        assert_eq!(tree.num_leaves().width() as usize, tree.nodes.len());

        let bytes = tree.serialize_detached()?;
        let restored = RatchetTree::deserialize_exact(&bytes)?;
        assert_eq!(restored, tree);
        assert_eq!(restored.serialize_detached()?, bytes, "{leaves} leaves");
    }

    assert_eq!(widths, vec![1, 3, 5, 7]);
    Ok(())
}

#[test]
fn removed_leaves_drop_out_of_resolutions() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (mut trees, _) = member_trees(&provider, 4)?;
    let tree = &mut trees[0];

    tree.blank_subtree(LeafIndex(1));
    assert!(tree.get_leaf(LeafIndex(1)).is_none(), "leaf is blanked");
    assert_eq!(tree.resolution(NodeIndex(1)), nodes(&[0]));
    assert_eq!(tree.num_leaves().0, 4, "trees never shrink");

    let next = tree.append_leaf(provider.hpke().generate_key_pair()?.public_key);
    assert_eq!(next, LeafIndex(4), "blank leaves are not reused");
    Ok(())
}

#[test]
#[allow(clippy::cast_possible_truncation)]
fn update_path_gives_everyone_the_same_commit_secret() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (mut trees, _) = member_trees(&provider, 4)?;

    let new_leaf = provider.hpke().generate_key_pair()?;
    let update = trees[0].encap(&provider, LeafIndex(0), new_leaf, &[], CONTEXT)?;
    assert_eq!(update.update_path.nodes.len(), 2, "direct path of leaf 0 is [1, 3]");
    assert_eq!(
        update.update_path.nodes[1].encrypted_path_secrets.len(),
        2,
        "root secret goes to leaves 2 and 3"
    );

    for i in 1..4 {
        let commit_secret = trees[i].decap(
            &provider,
            LeafIndex(i as u32),
            LeafIndex(0),
            &update.update_path,
            &[],
            CONTEXT,
        )?;
        assert_eq!(commit_secret, update.commit_secret, "member {i} agrees");
        assert_eq!(
            trees[i].serialize_detached()?,
            trees[0].serialize_detached()?,
            "member {i} has the same public tree"
        );
    }

    // Member 1 now owns node 1 and can decrypt a commit from leaf 3 through it
    let new_leaf = provider.hpke().generate_key_pair()?;
    let update = trees[3].encap(&provider, LeafIndex(3), new_leaf, &[], CONTEXT)?;
    assert_eq!(
        update.update_path.nodes[1].encrypted_path_secrets.len(),
        1,
        "node 1 covers both leaves on the left"
    );
    let commit_secret = trees[1].decap(
        &provider,
        LeafIndex(1),
        LeafIndex(3),
        &update.update_path,
        &[],
        CONTEXT,
    )?;
    assert_eq!(commit_secret, update.commit_secret);
    Ok(())
}

#[test]
fn excluded_leaves_get_no_ciphertext() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (mut trees, _) = member_trees(&provider, 3)?;

    let new_leaf = provider.hpke().generate_key_pair()?;
    let update = trees[0].encap(&provider, LeafIndex(0), new_leaf, &[LeafIndex(2)], CONTEXT)?;
    assert!(
        update.update_path.nodes[1].encrypted_path_secrets.is_empty(),
        "leaf 2 was excluded"
    );

    let result = trees[2].decap(
        &provider,
        LeafIndex(2),
        LeafIndex(0),
        &update.update_path,
        &[LeafIndex(2)],
        CONTEXT,
    );
    assert!(matches!(
        result,
        Err(Error::InvalidCommit(CommitRejection::NoDecryptablePathSecret))
    ));
    Ok(())
}

#[test]
fn path_keys_are_checked_against_the_secret() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (mut trees, _) = member_trees(&provider, 2)?;

    let new_leaf = provider.hpke().generate_key_pair()?;
    let mut update = trees[0].encap(&provider, LeafIndex(0), new_leaf, &[], CONTEXT)?;
    update.update_path.nodes[0].public_key = provider.hpke().generate_key_pair()?.public_key;

    let result = trees[1].decap(
        &provider,
        LeafIndex(1),
        LeafIndex(0),
        &update.update_path,
        &[],
        CONTEXT,
    );
    assert!(matches!(
        result,
        Err(Error::InvalidCommit(CommitRejection::MalformedUpdatePath))
    ));

    let result = trees[1].decap(
        &provider,
        LeafIndex(1),
        LeafIndex(0),
        &UpdatePath::default(),
        &[],
        CONTEXT,
    );
    assert!(
        matches!(
            result,
            Err(Error::InvalidCommit(CommitRejection::MalformedUpdatePath))
        ),
        "path length must match the direct path"
    );
    Ok(())
}

#[test]
fn public_and_private_parts_serialize_separately() -> Result<()> {
    let provider = RustCryptoProvider::default();
    let (mut trees, key_pairs) = member_trees(&provider, 5)?;
    let new_leaf = provider.hpke().generate_key_pair()?;
    let new_leaf_private = new_leaf.private_key.clone();
    trees[0].encap(&provider, LeafIndex(0), new_leaf, &[], CONTEXT)?;
    let tree = &trees[0];

    let public = tree.serialize_detached()?;
    let private = tree.serialize_private()?;

    let mut restored = RatchetTree::deserialize_exact(&public)?;
    assert_eq!(restored, tree.public_only(), "public part carries no private keys");

    restored.restore_private(private.clone())?;
    restored.set_leaf_private_key(LeafIndex(0), new_leaf_private)?;
    assert_eq!(&restored, tree, "both parts together restore the tree");
    assert_eq!(restored.serialize_private()?, private, "private part round trips exactly");

    assert_ne!(
        tree.get_leaf(LeafIndex(1)).map(|node| &node.public_key),
        None,
        "other leaves are present"
    );
    assert_eq!(
        tree.get_leaf(LeafIndex(4)).map(|node| node.public_key.clone()),
        Some(key_pairs[4].public_key.clone())
    );
    Ok(())
}

#[test]
fn malformed_trees_are_rejected() {
    assert!(matches!(
        RatchetTree::deserialize_exact([0u8, 0, 0, 2, 0, 0]),
        Err(Error::MalformedTree)
    ));
}
