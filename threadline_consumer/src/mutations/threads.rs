use super::reactions::{apply_toggle, Toggle};
use super::sets::{insert_unique, remove_first};
use super::{log_compensation, Outcome};
use crate::actions::{NewThreadRequest, ThreadRequest};
use crate::database::models::{ThreadRecord, UserRecord, THREAD_BUCKET, USER_BUCKET};
use crate::database::repositories::Collection;
use crate::database::Repositories;
use crate::error::{MutationResult, StoreError};
use crate::utils::now_unix;

/// Creates a thread, links it from its author and, when enabled, marks it
/// unread for each of the author's friends.
///
/// A retryable failure anywhere after the thread is stored undoes the earlier
/// writes before the error is returned, so the redelivered message starts
/// from the state it first saw.
pub(super) fn create_thread(
    repos: &Repositories<'_>,
    req: NewThreadRequest,
    fan_out_unread: bool,
) -> MutationResult<Outcome> {
    let users = repos.users();
    let threads = repos.threads();

    // Checked before an id is burned on a thread nobody could own.
    let original_author = users.require(&req.author)?;

    let id = threads.next_id()?;
    let record = ThreadRecord {
        id: id.clone(),
        author: req.author.clone(),
        is_public: req.is_public,
        pub_date: req.published_at().unwrap_or_else(now_unix),
        content: req.content,
        image_url: req.image_url.filter(|url| !url.trim().is_empty()),
        ..ThreadRecord::default()
    };
    threads.add(&record)?;

    let mut author = original_author.clone();
    insert_unique(&mut author.written_threads, &id);
    if let Err(err) = users.set(&author) {
        log_compensation(threads.remove(&id), THREAD_BUCKET, &id);
        return Err(err.into());
    }

    if fan_out_unread {
        match fan_out(&users, &author, &id) {
            Ok(delivered) => {
                tracing::debug!(thread_id = %id, delivered, "fanned new thread out to friends");
            }
            Err(err) => {
                log_compensation(users.set(&original_author), USER_BUCKET, &original_author.id);
                log_compensation(threads.remove(&id), THREAD_BUCKET, &id);
                return Err(err);
            }
        }
    }

    Ok(Outcome::Created {
        bucket: THREAD_BUCKET,
        id,
    })
}

/// Marks `thread_id` unread for every friend of `author` that exists.
///
/// Friends that are missing or hold a document that no longer decodes are
/// skipped. A retryable failure takes back the markers already written and
/// is returned.
fn fan_out(
    users: &Collection<'_, UserRecord>,
    author: &UserRecord,
    thread_id: &str,
) -> MutationResult<usize> {
    let mut marked: Vec<&str> = Vec::new();
    for friend_id in &author.friends {
        if friend_id == &author.id {
            continue;
        }
        match mark_unread(users, friend_id, thread_id) {
            Ok(true) => marked.push(friend_id),
            Ok(false) => {}
            Err(err) if err.is_retryable() => {
                for id in &marked {
                    log_compensation(unmark_unread(users, id, thread_id), USER_BUCKET, id);
                }
                return Err(err.into());
            }
            Err(err) => {
                tracing::warn!(error = %err, friend = %friend_id, thread_id, "skipping friend during fan-out");
            }
        }
    }
    Ok(marked.len())
}

fn mark_unread(
    users: &Collection<'_, UserRecord>,
    friend_id: &str,
    thread_id: &str,
) -> Result<bool, StoreError> {
    let Some(mut friend) = users.get(friend_id)? else {
        tracing::debug!(friend = %friend_id, thread_id, "skipping unknown friend");
        return Ok(false);
    };
    if !insert_unique(&mut friend.unread_threads, thread_id) {
        return Ok(false);
    }
    users.set(&friend)?;
    Ok(true)
}

fn unmark_unread(
    users: &Collection<'_, UserRecord>,
    friend_id: &str,
    thread_id: &str,
) -> Result<(), StoreError> {
    if let Some(mut friend) = users.get(friend_id)? {
        if remove_first(&mut friend.unread_threads, thread_id) {
            users.set(&friend)?;
        }
    }
    Ok(())
}

pub(super) fn toggle(
    repos: &Repositories<'_>,
    toggle: Toggle,
    req: ThreadRequest,
) -> MutationResult<Outcome> {
    apply_toggle(repos.threads(), repos.users(), toggle, &req.thread_id, &req.user)
}
