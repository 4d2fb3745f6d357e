use super::reactions::{apply_toggle, Toggle};
use super::sets::insert_unique;
use super::{log_compensation, Outcome};
use crate::actions::{CommentRequest, NewCommentRequest};
use crate::database::models::{CommentRecord, COMMENT_BUCKET, THREAD_BUCKET};
use crate::database::Repositories;
use crate::error::MutationResult;
use crate::utils::now_unix;

/// Creates a comment and links it from its thread and its author.
///
/// Writes go comment, thread, author. A failure after the comment exists
/// undoes the earlier writes so a redelivery starts from a clean slate
/// instead of appending a second comment id to the thread.
pub(super) fn add_comment(
    repos: &Repositories<'_>,
    req: NewCommentRequest,
) -> MutationResult<Outcome> {
    let users = repos.users();
    let threads = repos.threads();
    let comments = repos.comments();

    let original_thread = threads.require(&req.thread_id)?;
    let mut author = users.require(&req.author)?;

    let id = comments.next_id()?;
    let pub_date = req.published_at().unwrap_or_else(now_unix);
    let record = CommentRecord {
        id: id.clone(),
        thread_id: req.thread_id,
        author: req.author,
        content: req.content,
        pub_date,
        ..CommentRecord::default()
    };
    comments.add(&record)?;

    let mut thread = original_thread.clone();
    thread.comments.push(id.clone());
    if let Err(err) = threads.set(&thread) {
        log_compensation(comments.remove(&id), COMMENT_BUCKET, &id);
        return Err(err.into());
    }

    insert_unique(&mut author.written_comments, &id);
    if let Err(err) = users.set(&author) {
        log_compensation(threads.set(&original_thread), THREAD_BUCKET, &original_thread.id);
        log_compensation(comments.remove(&id), COMMENT_BUCKET, &id);
        return Err(err.into());
    }

    Ok(Outcome::Created {
        bucket: COMMENT_BUCKET,
        id,
    })
}

pub(super) fn toggle(
    repos: &Repositories<'_>,
    toggle: Toggle,
    req: CommentRequest,
) -> MutationResult<Outcome> {
    apply_toggle(repos.comments(), repos.users(), toggle, &req.comment_id, &req.user)
}
