use super::sets::{insert_unique, remove_first};
use super::Outcome;
use crate::database::models::{CommentRecord, ThreadRecord, UserRecord};
use crate::database::repositories::{Collection, Document};
use crate::error::MutationResult;

/// The four per-user reactions a thread or comment supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Like,
    Unlike,
    Report,
    Block,
}

/// Documents users can like, report and block.
pub(super) trait Reactable: Document {
    fn author(&self) -> &str;
    fn likers(&mut self) -> &mut Vec<String>;
    fn reporters(&mut self) -> &mut Vec<String>;
    fn blockers(&mut self) -> &mut Vec<String>;
    /// The back-reference list on the user side of a like.
    fn liked_by(user: &mut UserRecord) -> &mut Vec<String>;
}

impl Reactable for ThreadRecord {
    fn author(&self) -> &str {
        &self.author
    }

    fn likers(&mut self) -> &mut Vec<String> {
        &mut self.likers
    }

    fn reporters(&mut self) -> &mut Vec<String> {
        &mut self.reporters
    }

    fn blockers(&mut self) -> &mut Vec<String> {
        &mut self.blockers
    }

    fn liked_by(user: &mut UserRecord) -> &mut Vec<String> {
        &mut user.liked_threads
    }
}

impl Reactable for CommentRecord {
    fn author(&self) -> &str {
        &self.author
    }

    fn likers(&mut self) -> &mut Vec<String> {
        &mut self.likers
    }

    fn reporters(&mut self) -> &mut Vec<String> {
        &mut self.reporters
    }

    fn blockers(&mut self) -> &mut Vec<String> {
        &mut self.blockers
    }

    fn liked_by(user: &mut UserRecord) -> &mut Vec<String> {
        &mut user.liked_comments
    }
}

/// Applies `toggle` by `user_id` to the target document and the user's
/// back-references.
///
/// The target is written before the user. If the second write fails the
/// message is redelivered, and because every toggle is idempotent the retry
/// converges both sides without a compensating write.
pub(super) fn apply_toggle<D: Reactable>(
    targets: Collection<'_, D>,
    users: Collection<'_, UserRecord>,
    toggle: Toggle,
    target_id: &str,
    user_id: &str,
) -> MutationResult<Outcome> {
    let mut target = targets.require(target_id)?;
    let mut user = users.require(user_id)?;

    let (target_changed, user_changed) = match toggle {
        Toggle::Like => (
            insert_unique(target.likers(), user_id),
            insert_unique(D::liked_by(&mut user), target_id),
        ),
        Toggle::Unlike => (
            remove_first(target.likers(), user_id),
            remove_first(D::liked_by(&mut user), target_id),
        ),
        Toggle::Report => (insert_unique(target.reporters(), user_id), false),
        Toggle::Block => {
            let author = target.author().to_string();
            let user_changed = author != user_id && insert_unique(&mut user.blocked_users, &author);
            (insert_unique(target.blockers(), user_id), user_changed)
        }
    };

    let mut writes = 0;
    if target_changed {
        targets.set(&target)?;
        writes += 1;
    }
    if user_changed {
        users.set(&user)?;
        writes += 1;
    }
    Ok(Outcome::from_writes(writes))
}
