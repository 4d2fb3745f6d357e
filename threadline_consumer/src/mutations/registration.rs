use super::Outcome;
use crate::actions::RegisterRequest;
use crate::database::models::{UserRecord, USER_BUCKET};
use crate::database::Repositories;
use crate::error::MutationResult;
use crate::utils::now_unix;

pub(super) fn register_user(
    repos: &Repositories<'_>,
    req: RegisterRequest,
) -> MutationResult<Outcome> {
    let record = UserRecord::new(req.id, req.time.unwrap_or_else(now_unix));
    let id = record.id.clone();
    repos.users().add(&record)?;
    tracing::info!(user = %id, "registered user");
    Ok(Outcome::Created {
        bucket: USER_BUCKET,
        id,
    })
}
