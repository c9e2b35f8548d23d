use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::notification::db::NotificationDb;
use crate::data::notification::{NotificationListResponse, NotificationResponse};
use crate::data::Db;
use crate::error::WorkflowError;
use crate::resp::problem::Problem;
use crate::route::guard::Caller;
use crate::route::CountMessageResponse;

/// The caller's most recent notifications
///
/// Reading the list doesn't mark anything read.
#[utoipa::path(
    responses((status = 200, description = "Notifications and unread count", body = NotificationListResponse)),
    security(("jwt" = []))
)]
#[get("/notifications")]
#[tracing::instrument(skip(db, config))]
pub async fn list_notifications(
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<NotificationListResponse>, Problem> {
    let notifications = db
        .list_notifications(caller.user.id, config.notification_limit)
        .await?;
    let unread_count = db.count_unread(caller.user.id).await?;

    Ok(Json(NotificationListResponse {
        notifications: notifications.into_iter().map(Into::into).collect(),
        unread_count,
    }))
}

/// Mark one notification read
#[utoipa::path(
    params(("id", description = "notification ID")),
    responses(
        (status = 200, description = "Marked read", body = NotificationResponse),
        (status = 404, description = "Caller has no such notification", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/notifications/<id>/read")]
#[tracing::instrument(skip(db))]
pub async fn read_notification(
    id: Uuid,
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<NotificationResponse>, Problem> {
    let notification = db
        .mark_read(caller.user.id, id)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Notification not found"))?;

    Ok(Json(notification.into()))
}

/// Mark every notification read
#[utoipa::path(
    responses((status = 200, description = "Marked read", body = CountMessageResponse)),
    security(("jwt" = []))
)]
#[patch("/notifications/read-all")]
#[tracing::instrument(skip(db))]
pub async fn read_all_notifications(
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<CountMessageResponse>, Problem> {
    let count = db.mark_all_read(caller.user.id).await?;
    Ok(Json(CountMessageResponse::new("All notifications marked as read", count)))
}

/// Delete notifications already read
#[utoipa::path(
    responses((status = 200, description = "Read notifications deleted", body = CountMessageResponse)),
    security(("jwt" = []))
)]
#[delete("/notifications/clear")]
#[tracing::instrument(skip(db))]
pub async fn clear_notifications(
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<CountMessageResponse>, Problem> {
    let count = db.clear_read(caller.user.id).await?;
    Ok(Json(CountMessageResponse::new("Read notifications cleared", count)))
}

#[cfg(test)]
mod notification_endpoints {
    use rocket::http::Status;

    use crate::data::notification::{Notification, NotificationKind};
    use crate::role::Role;
    use crate::route::tests::{bearer, TestApp};

    use super::*;

    async fn list(app: &TestApp, token: &str) -> NotificationListResponse {
        let response = app
            .client
            .get("/api/v1/notifications")
            .header(bearer(token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.expect("notifications json")
    }

    #[rocket::async_test]
    async fn v1_listing_is_idempotent_and_read_state_is_explicit() {
        let app = TestApp::new().await;
        let student = app.user("amina@example.com", Role::Student).await;
        let token = app.token(&student);
        for title in ["First", "Second"] {
            app.db
                .insert_notification(Notification::new(
                    student.id,
                    NotificationKind::General,
                    title,
                    "hello",
                ))
                .await
                .expect("insert");
        }

        let first = list(&app, &token).await;
        let second = list(&app, &token).await;
        assert_eq!(first.unread_count, 2);
        assert_eq!(second.unread_count, 2);
        assert_eq!(first.notifications.len(), second.notifications.len());
        assert_eq!(first.notifications[0].title, "Second");

        let id = first.notifications[0].id;
        let response = app
            .client
            .patch(format!("/api/v1/notifications/{}/read", id))
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(list(&app, &token).await.unread_count, 1);

        let response = app
            .client
            .delete("/api/v1/notifications/clear")
            .header(bearer(&token))
            .dispatch()
            .await;
        let cleared: CountMessageResponse = response.into_json().await.expect("count json");
        assert_eq!(cleared.count, 1);

        let response = app
            .client
            .patch("/api/v1/notifications/read-all")
            .header(bearer(&token))
            .dispatch()
            .await;
        let marked: CountMessageResponse = response.into_json().await.expect("count json");
        assert_eq!(marked.count, 1);

        let remaining = list(&app, &token).await;
        assert_eq!(remaining.notifications.len(), 1);
        assert_eq!(remaining.unread_count, 0);
    }

    #[rocket::async_test]
    async fn v1_other_users_notifications_are_not_found() {
        let app = TestApp::new().await;
        let owner = app.user("amina@example.com", Role::Student).await;
        let other = app.user("omar@example.com", Role::Student).await;
        let notification = app
            .db
            .insert_notification(Notification::new(
                owner.id,
                NotificationKind::General,
                "Private",
                "hello",
            ))
            .await
            .expect("insert");

        let response = app
            .client
            .patch(format!("/api/v1/notifications/{}/read", notification.id))
            .header(bearer(&app.token(&other)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        assert_eq!(list(&app, &app.token(&owner)).await.unread_count, 1);
    }
}
