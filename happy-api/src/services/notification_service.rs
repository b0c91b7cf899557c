use uuid::Uuid;

use happy_shared::errors::AppResult;

use crate::models::{NewNotification, NotificationView, Review, NOTIFICATION_LIKE_REVIEW};
use crate::repositories::notification_repo;
use crate::socket::handlers::push_notification;
use crate::AppState;

pub const LIKE_MESSAGE: &str = "あなたのレビューが「いいね」されました！";

/// Persists a `like_review` notification for the review's author and pushes
/// it to their live connection. Self-likes notify nobody.
pub fn notify_review_liked(
    state: &AppState,
    conn: &mut diesel::PgConnection,
    review: &Review,
    liker_id: Uuid,
) -> AppResult<Option<NotificationView>> {
    if review.user_id == liker_id {
        return Ok(None);
    }

    let notification = notification_repo::create(
        conn,
        &NewNotification {
            id: Uuid::now_v7(),
            user_id: review.user_id,
            notification_type: NOTIFICATION_LIKE_REVIEW.to_string(),
            reference_id: Some(review.id),
            message: LIKE_MESSAGE.to_string(),
        },
    )?;

    let view = notification_repo::with_restaurants(conn, vec![notification])?
        .pop()
        .ok_or_else(|| happy_shared::errors::AppError::internal("notification vanished after insert"))?;

    let pushed = push_notification(&state.io, &state.connections, review.user_id, &view);
    tracing::info!(
        review_id = %review.id,
        recipient = %review.user_id,
        liker = %liker_id,
        pushed,
        "like notification sent"
    );

    Ok(Some(view))
}
