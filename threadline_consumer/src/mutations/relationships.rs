use super::sets::insert_unique;
use super::Outcome;
use crate::actions::FriendRequest;
use crate::database::models::UserRecord;
use crate::database::Repositories;
use crate::error::MutationResult;
use crate::reconcile::reconcile_friends;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Change {
    Follow,
    Unfollow,
}

impl Change {
    /// Applies the change to one list; returns whether it changed.
    fn apply(self, list: &mut Vec<String>, id: &str) -> bool {
        match self {
            Change::Follow => insert_unique(list, id),
            Change::Unfollow => {
                let before = list.len();
                list.retain(|existing| existing != id);
                list.len() != before
            }
        }
    }
}

/// Follows or unfollows every id in the request's list, then recomputes the
/// friend list of each user whose follower/following lists were touched.
///
/// Every target is read before anything is written, so an unknown id rejects
/// the whole request untouched. Targets are written before the acting user.
pub(super) fn update(
    repos: &Repositories<'_>,
    req: FriendRequest,
    change: Change,
) -> MutationResult<Outcome> {
    let users = repos.users();
    let original = users.require(&req.user)?;

    let mut targets: Vec<UserRecord> = Vec::with_capacity(req.friend_list.len());
    for target_id in &req.friend_list {
        let target_id = target_id.as_str();
        if target_id.is_empty() || target_id == original.id {
            continue;
        }
        if targets.iter().any(|target| target.id == target_id) {
            continue;
        }
        targets.push(users.require(target_id)?);
    }

    let mut actor = original.clone();
    let mut writes = 0;
    for target in &mut targets {
        change.apply(&mut actor.following, &target.id);
        let follower_changed = change.apply(&mut target.follower, &actor.id);
        let friends_changed = reconcile_friends(target);
        if follower_changed || friends_changed {
            users.set(target)?;
            writes += 1;
        }
    }

    reconcile_friends(&mut actor);
    if actor != original {
        users.set(&actor)?;
        writes += 1;
    }

    tracing::debug!(
        user = %actor.id,
        targets = targets.len(),
        friends = actor.friends.len(),
        ?change,
        "relationships updated"
    );
    Ok(Outcome::from_writes(writes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::error::MutationError;
    use crate::mutations::testing::{seed_users, user};
    use crate::reconcile::{intersect_sorted, sort_dedup};

    fn request(user: &str, targets: &[&str]) -> FriendRequest {
        FriendRequest {
            user: user.into(),
            friend_list: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn assert_friends_invariant(store: &MemoryStore, id: &str) {
        let record = user(store, id);
        let mut follower = record.follower.clone();
        let mut following = record.following.clone();
        sort_dedup(&mut follower);
        sort_dedup(&mut following);
        assert_eq!(record.friends, intersect_sorted(&follower, &following), "user {id}");
    }

    #[test]
    fn mutual_follows_become_friends() {
        let store = MemoryStore::new();
        seed_users(&store, &["alice", "bob", "carol"]);
        let repos = Repositories::new(&store);

        update(&repos, request("alice", &["bob", "carol"]), Change::Follow).unwrap();
        assert_eq!(user(&store, "alice").following, vec!["bob".to_string(), "carol".to_string()]);
        assert_eq!(user(&store, "bob").follower, vec!["alice".to_string()]);
        assert!(user(&store, "alice").friends.is_empty());

        update(&repos, request("bob", &["alice"]), Change::Follow).unwrap();
        assert_eq!(user(&store, "alice").friends, vec!["bob".to_string()]);
        assert_eq!(user(&store, "bob").friends, vec!["alice".to_string()]);
        for id in ["alice", "bob", "carol"] {
            assert_friends_invariant(&store, id);
        }
    }

    #[test]
    fn unfollow_removes_the_actor_from_the_target_followers() {
        let store = MemoryStore::new();
        seed_users(&store, &["alice", "bob"]);
        let repos = Repositories::new(&store);
        update(&repos, request("alice", &["bob"]), Change::Follow).unwrap();
        update(&repos, request("bob", &["alice"]), Change::Follow).unwrap();

        update(&repos, request("alice", &["bob"]), Change::Unfollow).unwrap();
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        assert!(alice.following.is_empty());
        assert!(alice.friends.is_empty());
        assert!(bob.follower.is_empty());
        assert!(bob.friends.is_empty());
        assert_eq!(bob.following, vec!["alice".to_string()]);
        assert_eq!(alice.follower, vec!["bob".to_string()]);
    }

    #[test]
    fn repeated_follows_do_not_duplicate_entries() {
        let store = MemoryStore::new();
        seed_users(&store, &["alice", "bob"]);
        let repos = Repositories::new(&store);

        update(&repos, request("alice", &["bob", "bob"]), Change::Follow).unwrap();
        let outcome = update(&repos, request("alice", &["bob"]), Change::Follow).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(user(&store, "alice").following, vec!["bob".to_string()]);
        assert_eq!(user(&store, "bob").follower, vec!["alice".to_string()]);
    }

    #[test]
    fn self_targets_and_blank_ids_are_skipped() {
        let store = MemoryStore::new();
        seed_users(&store, &["alice"]);
        let repos = Repositories::new(&store);

        let outcome = update(&repos, request("alice", &["alice", ""]), Change::Follow).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(user(&store, "alice").following.is_empty());
    }

    #[test]
    fn unknown_target_rejects_the_whole_request() {
        let store = MemoryStore::new();
        seed_users(&store, &["alice", "bob"]);
        let repos = Repositories::new(&store);

        let err = update(&repos, request("alice", &["bob", "ghost"]), Change::Follow).unwrap_err();
        assert!(matches!(err, MutationError::NotFound { bucket: "User", .. }));
        assert!(user(&store, "alice").following.is_empty());
        assert!(user(&store, "bob").follower.is_empty());
    }

    #[test]
    fn invariant_holds_across_a_mixed_sequence() {
        let store = MemoryStore::new();
        let ids = ["a", "b", "c", "d"];
        seed_users(&store, &ids);
        let repos = Repositories::new(&store);

        let steps: &[(&str, &[&str], Change)] = &[
            ("a", &["b", "c", "d"], Change::Follow),
            ("b", &["a", "c"], Change::Follow),
            ("c", &["a", "b", "a"], Change::Follow),
            ("a", &["c"], Change::Unfollow),
            ("d", &["a"], Change::Follow),
            ("b", &["c"], Change::Unfollow),
            ("a", &["c"], Change::Follow),
        ];
        for (actor, targets, change) in steps {
            update(&repos, request(actor, targets), *change).unwrap();
            for id in ids {
                assert_friends_invariant(&store, id);
            }
        }
        assert_eq!(
            user(&store, "a").friends,
            vec!["b".to_string(), "c".to_string(), "d".to_string()]
        );
    }
}
