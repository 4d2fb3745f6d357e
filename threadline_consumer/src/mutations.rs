mod comments;
mod reactions;
mod registration;
mod relationships;
pub mod sets;
mod threads;

use crate::actions::Action;
use crate::config::MutationConfig;
use crate::database::{EntityStore, Repositories};
use crate::error::{MutationResult, StoreError};
use std::sync::Arc;

pub use reactions::Toggle;

/// What a successfully handled action did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { bucket: &'static str, id: String },
    Updated { writes: usize },
    /// The action was valid but every touched list already had the requested shape.
    Unchanged,
}

impl Outcome {
    fn from_writes(writes: usize) -> Self {
        if writes == 0 {
            Outcome::Unchanged
        } else {
            Outcome::Updated { writes }
        }
    }
}

/// Applies decoded actions to the entity store.
///
/// Every handler reads the documents it needs, changes them in memory and
/// writes back only the documents that changed. Handlers are synchronous; the
/// consumer loop runs them on the blocking pool one at a time.
#[derive(Clone)]
pub struct MutationService {
    store: Arc<dyn EntityStore>,
    config: MutationConfig,
}

impl MutationService {
    pub fn new(store: Arc<dyn EntityStore>, config: MutationConfig) -> Self {
        Self { store, config }
    }

    pub fn apply(&self, action: Action) -> MutationResult<Outcome> {
        let repos = Repositories::new(self.store.as_ref());
        match action {
            Action::NewThread(req) => threads::create_thread(&repos, req, self.config.fan_out_unread),
            Action::ThreadLike(req) => threads::toggle(&repos, Toggle::Like, req),
            Action::ThreadUnlike(req) => threads::toggle(&repos, Toggle::Unlike, req),
            Action::ThreadReport(req) => threads::toggle(&repos, Toggle::Report, req),
            Action::ThreadBlock(req) => threads::toggle(&repos, Toggle::Block, req),
            Action::CommentAdd(req) => comments::add_comment(&repos, req),
            Action::CommentLike(req) => comments::toggle(&repos, Toggle::Like, req),
            Action::CommentUnlike(req) => comments::toggle(&repos, Toggle::Unlike, req),
            Action::CommentReport(req) => comments::toggle(&repos, Toggle::Report, req),
            Action::CommentBlock(req) => comments::toggle(&repos, Toggle::Block, req),
            Action::FriendAdd(req) => relationships::update(&repos, req, relationships::Change::Follow),
            Action::FriendDelete(req) => {
                relationships::update(&repos, req, relationships::Change::Unfollow)
            }
            Action::UserRegister(req) => registration::register_user(&repos, req),
        }
    }
}

/// Logs a failed compensating write. The original failure is what gets reported.
fn log_compensation<T>(result: Result<T, StoreError>, bucket: &'static str, id: &str) {
    if let Err(err) = result {
        tracing::error!(
            error = %err,
            bucket,
            id,
            "compensating write failed; store may hold a partially applied action"
        );
    }
}
