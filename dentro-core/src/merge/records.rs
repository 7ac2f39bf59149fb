//! Per-record resolution shared by every collection.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::TieBreak;
use crate::models::{Millis, Record, Timestamped};

/// Which replica a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// Picks the side holding the newer version of one record.
///
/// Strictly greater `updatedAt` wins; an exact tie is settled by `tie_break`.
pub fn newer_side<T>(local: &T, remote: &T, tie_break: TieBreak) -> Side
where
    T: Timestamped + Serialize,
{
    match local.updated_at().cmp(&remote.updated_at()) {
        std::cmp::Ordering::Greater => Side::Local,
        std::cmp::Ordering::Less => Side::Remote,
        std::cmp::Ordering::Equal => settle_tie(local, remote, tie_break),
    }
}

/// Resolves a tie between two equally-stamped values.
pub fn settle_tie<T: Serialize + ?Sized>(local: &T, remote: &T, tie_break: TieBreak) -> Side {
    match tie_break {
        TieBreak::PreferLocal => Side::Local,
        TieBreak::ContentDigest => {
            // Equal digests mean equal content, either side is correct.
            if content_digest(remote) > content_digest(local) {
                Side::Remote
            } else {
                Side::Local
            }
        }
    }
}

/// SHA-256 of the canonical JSON encoding.
///
/// Struct fields serialize in declaration order and maps are ordered, so
/// equal values always hash equally on every device.
pub fn content_digest<T: Serialize + ?Sized>(value: &T) -> [u8; 32] {
    // Record types have string keys and no fallible Serialize impls.
    let bytes = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("failed to encode record for digest: {}", e);
            Vec::new()
        }
    };
    Sha256::digest(&bytes).into()
}

/// Clone of whichever record is newer.
pub fn pick_newer<T>(local: &T, remote: &T, tie_break: TieBreak) -> T
where
    T: Timestamped + Serialize + Clone,
{
    match newer_side(local, remote, tie_break) {
        Side::Local => local.clone(),
        Side::Remote => remote.clone(),
    }
}

/// Id-union merge of one collection.
///
/// Records on one side only are kept as-is; records on both sides go
/// through `resolve`. Local order is kept, remote-only records follow in
/// remote order. A record whose resolved `updatedAt` is not newer than its
/// tombstone is dropped.
pub fn merge_by_id<T, F>(
    local: &[T],
    remote: &[T],
    tombstones: Option<&BTreeMap<String, Millis>>,
    mut resolve: F,
) -> Vec<T>
where
    T: Record,
    F: FnMut(&T, &T) -> T,
{
    let remote_by_id: HashMap<&str, &T> = remote.iter().map(|r| (r.id(), r)).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len());
    let mut merged = Vec::with_capacity(local.len().max(remote.len()));

    for record in local {
        if !seen.insert(record.id()) {
            continue;
        }
        match remote_by_id.get(record.id()) {
            Some(theirs) => merged.push(resolve(record, theirs)),
            None => merged.push(record.clone()),
        }
    }
    for record in remote {
        if seen.insert(record.id()) {
            merged.push(record.clone());
        }
    }

    if let Some(tombstones) = tombstones {
        merged.retain(|record| match tombstones.get(record.id()) {
            Some(deleted_at) => record.updated_at() > *deleted_at,
            None => true,
        });
    }
    merged
}

/// Key-union merge of a map of stamped values.
pub fn merge_map<K, V>(
    local: &BTreeMap<K, V>,
    remote: &BTreeMap<K, V>,
    tie_break: TieBreak,
) -> BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Timestamped + Serialize + Clone,
{
    let mut merged = remote.clone();
    for (key, ours) in local {
        let value = match remote.get(key) {
            Some(theirs) => pick_newer(ours, theirs, tie_break),
            None => ours.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Memo;

    fn memo(id: &str, title: &str, at: Millis) -> Memo {
        Memo {
            id: id.into(),
            title: title.into(),
            updated_at: at,
            ..Default::default()
        }
    }

    fn ids(memos: &[Memo]) -> Vec<&str> {
        memos.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_order_local_first_then_remote_only() {
        let local = vec![memo("b", "", 1), memo("a", "", 1)];
        let remote = vec![memo("c", "", 1), memo("a", "", 1), memo("d", "", 1)];

        let merged = merge_by_id(&local, &remote, None, |l, r| {
            pick_newer(l, r, TieBreak::PreferLocal)
        });
        assert_eq!(ids(&merged), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_tombstone_drops_older_record_only() {
        let local = vec![memo("a", "", 10), memo("b", "", 50)];
        let mut tombstones = BTreeMap::new();
        tombstones.insert("a".to_string(), 20);
        tombstones.insert("b".to_string(), 20);

        let merged = merge_by_id(&local, &[], Some(&tombstones), |l, _| l.clone());
        assert_eq!(ids(&merged), vec!["b"]);
    }

    #[test]
    fn test_digest_tie_break_is_symmetric() {
        let ours = memo("a", "left", 5);
        let theirs = memo("a", "right", 5);

        let one = pick_newer(&ours, &theirs, TieBreak::ContentDigest);
        let two = pick_newer(&theirs, &ours, TieBreak::ContentDigest);
        assert_eq!(one, two);
    }

    #[test]
    fn test_prefer_local_on_tie() {
        let ours = memo("a", "left", 5);
        let theirs = memo("a", "right", 5);
        assert_eq!(pick_newer(&ours, &theirs, TieBreak::PreferLocal).title, "left");
        assert_eq!(pick_newer(&theirs, &ours, TieBreak::PreferLocal).title, "right");
    }
}
