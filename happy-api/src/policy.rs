//! Role and ownership checks for every mutation that depends on who owns
//! the target.

use uuid::Uuid;

use happy_shared::errors::{AppError, ErrorCode};
use happy_shared::types::auth::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EditReview,
    DeleteReview,
    BlockAccount,
    ChangeRole,
    DeleteAccount,
    ReadNotification,
}

/// `owner` is the account that owns the target: the review author, the
/// account being moderated, or the notification recipient.
pub fn authorize(actor: &AuthUser, action: Action, owner: Uuid) -> Result<(), AppError> {
    match action {
        Action::EditReview | Action::DeleteReview => {
            if actor.id == owner || actor.is_admin() {
                Ok(())
            } else {
                Err(AppError::new(
                    ErrorCode::NotReviewOwner,
                    "you can only modify your own reviews",
                ))
            }
        }
        Action::BlockAccount | Action::ChangeRole | Action::DeleteAccount => {
            if !actor.is_admin() {
                return Err(AppError::forbidden("admin access required"));
            }
            if actor.id == owner {
                let verb = match action {
                    Action::BlockAccount => "block",
                    Action::ChangeRole => "change the role of",
                    _ => "delete",
                };
                return Err(AppError::new(
                    ErrorCode::CannotActOnSelf,
                    format!("you cannot {verb} your own account"),
                ));
            }
            Ok(())
        }
        // Someone else's notification is reported as missing
        Action::ReadNotification => {
            if actor.id == owner {
                Ok(())
            } else {
                Err(AppError::new(ErrorCode::NotificationNotFound, "notification not found"))
            }
        }
    }
}
