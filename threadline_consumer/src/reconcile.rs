//! Friend-list reconciliation.
//!
//! A user's friends are exactly the ids present in both their `follower` and
//! `following` lists. Both lists are kept sorted and duplicate-free so the
//! intersection is a single merge pass.

use crate::database::models::UserRecord;
use std::cmp::Ordering;

/// Sorts lexicographically and drops adjacent duplicates.
pub fn sort_dedup(ids: &mut Vec<String>) {
    ids.sort_unstable();
    ids.dedup();
}

/// Two-cursor intersection of two sorted, duplicate-free lists.
pub fn intersect_sorted(follower: &[String], following: &[String]) -> Vec<String> {
    let mut friends = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < follower.len() && j < following.len() {
        match follower[i].cmp(&following[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                friends.push(follower[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    friends
}

/// Normalizes `follower`/`following` and recomputes `friends` from scratch.
/// Returns whether any of the three lists changed, i.e. whether the user
/// document needs to be written back.
pub fn reconcile_friends(user: &mut UserRecord) -> bool {
    let before = (
        user.follower.clone(),
        user.following.clone(),
        user.friends.clone(),
    );
    sort_dedup(&mut user.follower);
    sort_dedup(&mut user.following);
    user.friends = intersect_sorted(&user.follower, &user.following);
    before != (
        user.follower.clone(),
        user.following.clone(),
        user.friends.clone(),
    )
}
