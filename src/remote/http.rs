use async_trait::async_trait;
use chrono::Weekday;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::dto::{
    into_activities, ActivitiesEnvelope, CreateActivityRequest, CreateActivityResponse,
    JournalEntryResponse, JournalWeekQuery, JournalWeekResponse, MoodCheckQuery, MoodCheckResponse,
    MoodUpdateRequest, SaveJournalRequest, ToggleResponse, UserQuery, UserRef,
};
use crate::error::{AppError, AppResult};
use crate::models::activity::{Activity, ActivityId, NewActivity};
use crate::models::journal::{JournalDraft, JournalEntry};
use crate::models::mood::{MoodTrends, MoodValue, TimeOfDay};
use crate::models::user::UserId;
use crate::remote::{CreatedActivities, RemoteApi};
use crate::tracking::week_clock::weekday_full_name;

/// `RemoteApi` over the JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    session_token: Option<String>,
    http: Client,
}

impl HttpRemote {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session_token: config.session_token.clone(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn prepare(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("x-request-id", Uuid::new_v4().to_string());
        match &self.session_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder) -> AppResult<reqwest::Response> {
        let resp = self.prepare(req).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let url = resp.url().path().to_string();
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(status = %status, path = %url, "remote call failed");
        Err(AppError::from_status(status, body))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> AppResult<T> {
        Ok(self.execute(req).await?.json::<T>().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> AppResult<()> {
        self.execute(req).await.map(|_| ())
    }

    async fn patch_toggle(&self, user: &UserId, id: &ActivityId, action: &str) -> AppResult<Activity> {
        let req = self
            .http
            .patch(self.url(&format!("/selfcare/{id}/{action}")))
            .json(&UserRef {
                user_id: user.clone(),
            });
        let resp: ToggleResponse = self.send(req).await?;
        match resp.activity {
            Some(activity) if resp.success => Activity::try_from(activity),
            _ => Err(AppError::Remote {
                status: 200,
                message: format!("{action} of {id} was not applied"),
            }),
        }
    }

    async fn save_journal(
        &self,
        req: RequestBuilder,
        user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()> {
        let body = SaveJournalRequest::new(week, day, draft, user.clone());
        let resp: JournalEntryResponse = self.send(req.json(&body)).await?;
        resp.into_result().map(|_| ())
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn list_activities(&self, user: &UserId) -> AppResult<Vec<Activity>> {
        let req = self
            .http
            .get(self.url("/selfcare"))
            .query(&UserQuery { user_id: user });
        let resp: ActivitiesEnvelope = self.send(req).await?;
        into_activities(resp.activities)
    }

    async fn create_activity(&self, user: &UserId, draft: &NewActivity) -> AppResult<CreatedActivities> {
        let body = CreateActivityRequest::new(draft.clone(), user.clone());
        body.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let resp: CreateActivityResponse = self
            .send(self.http.post(self.url("/selfcare")).json(&body))
            .await?;
        match (resp.activities, resp.activity) {
            (Some(list), _) => Ok(CreatedActivities::List(into_activities(list)?)),
            (None, Some(single)) => Ok(CreatedActivities::Single(Activity::try_from(single)?)),
            (None, None) => Ok(CreatedActivities::List(Vec::new())),
        }
    }

    async fn increment(&self, user: &UserId, id: &ActivityId) -> AppResult<Activity> {
        self.patch_toggle(user, id, "increment").await
    }

    async fn decrement(&self, user: &UserId, id: &ActivityId) -> AppResult<Activity> {
        self.patch_toggle(user, id, "decrement").await
    }

    async fn delete_activity(&self, user: &UserId, id: &ActivityId) -> AppResult<Vec<Activity>> {
        let req = self
            .http
            .delete(self.url(&format!("/selfcare/{id}")))
            .query(&UserQuery { user_id: user });
        let resp: ActivitiesEnvelope = self.send(req).await?;
        into_activities(resp.activities)
    }

    async fn update_mood(&self, user: &UserId, mood: MoodValue, slot: TimeOfDay) -> AppResult<()> {
        let body = MoodUpdateRequest::new(mood, slot, user.clone());
        body.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.send_empty(self.http.post(self.url("/mood/update")).json(&body))
            .await
    }

    async fn check_mood(&self, user: &UserId, slot: TimeOfDay) -> AppResult<Option<MoodValue>> {
        let req = self.http.get(self.url("/mood/check")).query(&MoodCheckQuery {
            user_id: user,
            time_of_day: slot,
        });
        let resp: MoodCheckResponse = self.send(req).await?;
        Ok(resp.logged_value())
    }

    async fn mood_trends(&self, user: &UserId) -> AppResult<MoodTrends> {
        let req = self
            .http
            .get(self.url("/mood/trends"))
            .query(&UserQuery { user_id: user });
        self.send(req).await
    }

    async fn journal_week(&self, user: &UserId, week: u32, year: i32) -> AppResult<Option<Vec<JournalEntry>>> {
        let req = self
            .http
            .get(self.url(&format!("/journal/week/{week}")))
            .query(&JournalWeekQuery { year, user_id: user });

        let resp: JournalWeekResponse = match self.send(req).await {
            Ok(resp) => resp,
            Err(AppError::NotFound(_)) => {
                tracing::debug!(week, "no journal entries for this week yet");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let entries = resp
            .into_result()?
            .unwrap_or_default()
            .into_iter()
            .map(|wire| wire.into_entry(week))
            .collect();
        Ok(Some(entries))
    }

    async fn journal_entry(&self, user: &UserId, week: u32, day: Weekday) -> AppResult<Option<JournalEntry>> {
        let req = self
            .http
            .get(self.url(&format!("/journal/{week}/{}", weekday_full_name(day))))
            .query(&UserQuery { user_id: user });

        match self.send::<JournalEntryResponse>(req).await {
            Ok(resp) => Ok(resp.into_result()?.map(|wire| wire.into_entry(week))),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_journal_entry(
        &self,
        user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()> {
        let url = self.url(&format!("/journal/{week}/{}", weekday_full_name(day)));
        self.save_journal(self.http.post(url), user, week, day, draft)
            .await
    }

    async fn update_journal_entry(
        &self,
        user: &UserId,
        week: u32,
        day: Weekday,
        draft: &JournalDraft,
    ) -> AppResult<()> {
        let url = self.url(&format!("/journal/{week}/{}", weekday_full_name(day)));
        self.save_journal(self.http.put(url), user, week, day, draft)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn serve(app: Router) -> HttpRemote {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = Config::from_lookup(|key| match key {
            "WELLNESS_API_URL" => Some(format!("http://{addr}/api/")),
            "WELLNESS_SESSION_TOKEN" => Some("tok".into()),
            _ => None,
        })
        .unwrap();
        HttpRemote::new(&config).unwrap()
    }

    fn user() -> UserId {
        UserId::new("u1")
    }

    #[tokio::test]
    async fn lists_activities_with_user_query_and_auth_header() {
        let app = Router::new().route(
            "/api/selfcare",
            get(|Query(q): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                assert_eq!(q.get("userId").map(String::as_str), Some("u1"));
                assert_eq!(headers["authorization"], "Bearer tok");
                assert!(headers.contains_key("x-request-id"));
                Json(json!({
                    "activities": [
                        {"_id": "a1", "title": "Walk", "description": "20 min",
                         "performedDates": ["2024-05-10T07:00:00.000Z"]}
                    ]
                }))
            }),
        );
        let remote = serve(app).await;

        let activities = remote.list_activities(&user()).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].id.as_str(), "a1");
        assert!(activities[0]
            .performed_dates
            .contains(&NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()));
    }

    #[tokio::test]
    async fn increment_returns_server_activity() {
        let app = Router::new().route(
            "/api/selfcare/:id/increment",
            patch(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                assert_eq!(body["userId"], "u1");
                Json(json!({
                    "success": true,
                    "activity": {"_id": id, "title": "Walk",
                                 "performedDates": ["2024-05-10T09:00:00Z"]}
                }))
            }),
        );
        let remote = serve(app).await;

        let activity = remote.toggle(&user(), &"a1".into(), true).await.unwrap();
        assert_eq!(activity.performed_dates.len(), 1);
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let app = Router::new()
            .route(
                "/api/selfcare/:id/decrement",
                patch(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "db down") }),
            )
            .route(
                "/api/mood/trends",
                get(|| async { StatusCode::UNAUTHORIZED }),
            );
        let remote = serve(app).await;

        let err = remote.decrement(&user(), &"a1".into()).await.unwrap_err();
        assert!(matches!(err, AppError::Remote { status: 500, ref message } if message == "db down"));

        let err = remote.mood_trends(&user()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn journal_404_means_no_entries() {
        let app = Router::new()
            .route("/api/journal/week/:week", get(|| async { StatusCode::NOT_FOUND }))
            .route("/api/journal/:week/:day", get(|| async { StatusCode::NOT_FOUND }));
        let remote = serve(app).await;

        assert_eq!(remote.journal_week(&user(), 19, 2024).await.unwrap(), None);
        assert_eq!(
            remote.journal_entry(&user(), 19, Weekday::Fri).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn journal_week_passes_year_and_converts_entries() {
        let app = Router::new().route(
            "/api/journal/week/:week",
            get(|Path(week): Path<u32>, Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(week, 19);
                assert_eq!(q.get("year").map(String::as_str), Some("2024"));
                Json(json!({
                    "success": true,
                    "data": [
                        {"day": "Monday", "exists": true, "content": "<p>hi</p>",
                         "wordCount": 1, "characterCount": 2},
                        {"day": "Tuesday", "exists": false, "content": null}
                    ]
                }))
            }),
        );
        let remote = serve(app).await;

        let entries = remote.journal_week(&user(), 19, 2024).await.unwrap().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].has_content());
        assert!(!entries[1].exists);
    }

    #[tokio::test]
    async fn journal_save_uses_post_then_put() {
        let app = Router::new().route(
            "/api/journal/:week/:day",
            post(|Path((_, day)): Path<(u32, String)>, Json(body): Json<Value>| async move {
                assert_eq!(day, "Friday");
                assert_eq!(body["wordCount"], 2);
                Json(json!({"success": true, "data": body}))
            })
            .put(|| async { Json(json!({"success": false, "error": "stale"})) }),
        );
        let remote = serve(app).await;
        let draft = JournalDraft::new("<p>good day</p>").unwrap();

        remote
            .create_journal_entry(&user(), 19, Weekday::Fri, &draft)
            .await
            .unwrap();
        let err = remote
            .update_journal_entry(&user(), 19, Weekday::Fri, &draft)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Remote { .. }));
    }

    #[tokio::test]
    async fn mood_check_reads_logged_value() {
        let app = Router::new().route(
            "/api/mood/check",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let value = if q.get("timeOfDay").map(String::as_str) == Some("morning") { 4 } else { 0 };
                Json(json!({ "moodValue": value }))
            }),
        );
        let remote = serve(app).await;

        let morning = remote.check_mood(&user(), TimeOfDay::Morning).await.unwrap();
        assert_eq!(morning.map(MoodValue::get), Some(4));
        assert_eq!(
            remote.check_mood(&user(), TimeOfDay::Evening).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn create_accepts_single_activity_reply() {
        let app = Router::new().route(
            "/api/selfcare",
            post(|Json(body): Json<Value>| async move {
                Json(json!({"activity": {"_id": "a9", "title": body["title"], "description": body["description"]}}))
            }),
        );
        let remote = serve(app).await;
        let draft = NewActivity::new(" Stretch ", "10 min").unwrap();

        match remote.create_activity(&user(), &draft).await.unwrap() {
            CreatedActivities::Single(activity) => assert_eq!(activity.title, "Stretch"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
