//! Axum JSON API over the hearth [`Catalog`].

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hearth_core::{ApplicationStatus, ParticipationRecord};
use hearth_mapping::StatusDescriptor;
use hearth_reconcile::{Catalog, ReconcileError};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub mod params;

use params::{
    page, ApplicationsQuery, EventsQuery, HousesQuery, ParticipationBody, RoomsQuery, UserScope,
    UsersQuery,
};

pub const CRATE_NAME: &str = "hearth-web";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/events", get(events_handler))
        .route("/events/{id}", get(event_handler))
        .route(
            "/events/{id}/participation",
            axum::routing::put(participation_handler),
        )
        .route("/houses", get(houses_handler))
        .route("/houses/{id}", get(house_handler))
        .route("/rooms", get(rooms_handler))
        .route("/rooms/{id}", get(room_handler))
        .route("/users", get(users_handler))
        .route("/users/{id}", get(user_handler))
        .route("/applications", get(applications_handler))
        .route("/applications/{id}", get(application_handler))
        .route("/application-statuses", get(statuses_handler))
        .route("/application-statuses/{status}", get(status_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "hearth api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Error body: `{ "error": <code>, "message": <text> }`.
#[derive(Debug)]
pub struct ApiError(pub ReconcileError);

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(ReconcileError::validation(rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ReconcileError::validation(rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ReconcileError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ReconcileError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            ReconcileError::MergeConflict { .. } => (StatusCode::CONFLICT, "merge_conflict"),
            ReconcileError::SourceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "source_unavailable")
            }
        };
        let message = self.0.to_string();
        if status.is_server_error() {
            error!(error = %message, "request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(error = %message, "request hit a merge conflict");
        }
        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn events_handler(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let Query(query) = query?;
        let filters = query.filters()?;
        let page = page(&state.catalog, query.offset, query.limit);
        let listing = state
            .catalog
            .list_events(&filters, page, query.user_id.as_deref())
            .await?;
        Ok::<_, ApiError>(Json(listing))
    };
    respond(result.await)
}

async fn event_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    scope: Result<Query<UserScope>, QueryRejection>,
) -> Response {
    let result = async {
        let Query(scope) = scope?;
        let event = state
            .catalog
            .get_event(&id, scope.user_id.as_deref())
            .await?;
        Ok::<_, ApiError>(Json(event))
    };
    respond(result.await)
}

async fn participation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ParticipationBody>, JsonRejection>,
) -> Response {
    let result = async {
        let Json(body) = body?;
        let record = ParticipationRecord {
            user_id: body.user_id,
            event_id: id,
            status: body.status,
            updated_at: state.catalog.now(),
        };
        let saved = state.catalog.record_participation(record).await?;
        Ok::<_, ApiError>(Json(saved))
    };
    respond(result.await)
}

async fn houses_handler(
    State(state): State<AppState>,
    query: Result<Query<HousesQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let Query(query) = query?;
        let filters = query.filters()?;
        let page = page(&state.catalog, query.offset, query.limit);
        Ok::<_, ApiError>(Json(state.catalog.list_houses(&filters, page).await?))
    };
    respond(result.await)
}

async fn house_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(state.catalog.get_house(&id).await.map(Json).map_err(ApiError))
}

async fn rooms_handler(
    State(state): State<AppState>,
    query: Result<Query<RoomsQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let Query(query) = query?;
        let filters = query.filters()?;
        let page = page(&state.catalog, query.offset, query.limit);
        Ok::<_, ApiError>(Json(state.catalog.list_rooms(&filters, page).await?))
    };
    respond(result.await)
}

async fn room_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(state.catalog.get_room(&id).await.map(Json).map_err(ApiError))
}

async fn users_handler(
    State(state): State<AppState>,
    query: Result<Query<UsersQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let Query(query) = query?;
        let filters = query.filters()?;
        let page = page(&state.catalog, query.offset, query.limit);
        Ok::<_, ApiError>(Json(state.catalog.list_users(&filters, page).await?))
    };
    respond(result.await)
}

async fn user_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(state.catalog.get_user(&id).await.map(Json).map_err(ApiError))
}

async fn applications_handler(
    State(state): State<AppState>,
    query: Result<Query<ApplicationsQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let Query(query) = query?;
        let filters = query.filters()?;
        let page = page(&state.catalog, query.offset, query.limit);
        Ok::<_, ApiError>(Json(state.catalog.list_applications(&filters, page).await?))
    };
    respond(result.await)
}

async fn application_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(
        state
            .catalog
            .get_application(&id)
            .await
            .map(Json)
            .map_err(ApiError),
    )
}

#[derive(Serialize)]
struct StatusEntry {
    status: ApplicationStatus,
    #[serde(flatten)]
    descriptor: StatusDescriptor,
}

async fn statuses_handler(State(state): State<AppState>) -> Json<Vec<StatusEntry>> {
    Json(
        state
            .catalog
            .status_catalog()
            .into_iter()
            .map(|(status, descriptor)| StatusEntry { status, descriptor })
            .collect(),
    )
}

async fn status_handler(State(state): State<AppState>, Path(status): Path<String>) -> Response {
    let result: ApiResult<StatusDescriptor> = state
        .catalog
        .describe_status(&status)
        .map(Json)
        .map_err(ApiError);
    respond(result)
}

fn respond<T: Serialize>(result: ApiResult<T>) -> Response {
    match result {
        Ok(json) => json.into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::{TimeZone, Utc};
    use hearth_core::{
        ApplicationRow, ApplicationStatus, EventDoc, EventRow, EventStatus, HouseDoc, HouseRow,
        HouseStatus, RoomRow, RoomStatus, RoomType, UserRow, UserRole,
    };
    use hearth_reconcile::{FixedClock, ReconcileConfig, Stores};
    use hearth_storage::{MemoryCollection, MemoryParticipation, MemoryTable};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Harness {
        events: Arc<MemoryTable<EventRow>>,
        event_docs: Arc<MemoryCollection<EventDoc>>,
        router: Router,
    }

    fn house() -> HouseRow {
        HouseRow {
            id: "h-1".into(),
            content_ref: Some("house-doc-1".into()),
            name: "Maple House".into(),
            status: HouseStatus::Active,
            city: Some("Portland".into()),
            capacity: 6,
            occupancy: 5,
            monthly_rent_cents: None,
            created_at: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).single().unwrap(),
        }
    }

    fn house_doc() -> HouseDoc {
        HouseDoc {
            content_id: "house-doc-1".into(),
            name: None,
            slug: Some("maple".into()),
            tagline: Some("Porch and garden".into()),
            description: None,
            hero_image: None,
            gallery: Vec::new(),
            amenities: Vec::new(),
            city: None,
        }
    }

    fn room() -> RoomRow {
        RoomRow {
            id: "rm-1".into(),
            content_ref: None,
            house_id: "h-1".into(),
            name: "Attic".into(),
            room_type: RoomType::Shared,
            status: RoomStatus::Available,
            capacity: 2,
            occupied: 1,
            monthly_price_cents: Some(55_000),
            available_from: None,
        }
    }

    fn user() -> UserRow {
        UserRow {
            id: "u-1".into(),
            content_ref: None,
            email: "ada@hearth.example".into(),
            display_name: "Ada".into(),
            role: UserRole::Host,
            house_id: Some("h-1".into()),
            joined_at: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).single().unwrap(),
        }
    }

    fn application() -> ApplicationRow {
        ApplicationRow {
            id: "app-1".into(),
            content_ref: None,
            user_id: "u-1".into(),
            house_id: "h-1".into(),
            status: ApplicationStatus::Waitlisted,
            submitted_at: Some(Utc.with_ymd_and_hms(2026, 4, 20, 0, 0, 0).single().unwrap()),
            reviewed_at: None,
            move_in_date: None,
        }
    }

    fn harness() -> Harness {
        let starts_at = Utc.with_ymd_and_hms(2026, 5, 2, 17, 0, 0).single().unwrap();
        let events = Arc::new(MemoryTable::new(vec![EventRow {
            id: "ev-1".into(),
            content_ref: Some("doc-1".into()),
            house_id: None,
            title: None,
            status: EventStatus::Scheduled,
            starts_at,
            ends_at: None,
            location: Some("Back garden".into()),
            capacity: Some(12),
            participant_count: 3,
        }]));
        let docs = Arc::new(MemoryCollection::new(vec![EventDoc {
            content_id: "doc-1".into(),
            title: Some("Seed swap".into()),
            slug: Some("seed-swap".into()),
            summary: None,
            body: None,
            cover_image: None,
            tags: vec!["garden".into()],
            starts_at: Some(starts_at),
            ends_at: None,
            is_public: Some(true),
            featured: Some(true),
        }]));
        let stores = Stores {
            houses: Arc::new(MemoryTable::new(vec![house()])),
            house_docs: Arc::new(MemoryCollection::new(vec![house_doc()])),
            rooms: Arc::new(MemoryTable::new(vec![room()])),
            room_docs: Arc::new(MemoryCollection::new(Vec::new())),
            events: events.clone(),
            event_docs: docs.clone(),
            users: Arc::new(MemoryTable::new(vec![user()])),
            user_docs: Arc::new(MemoryCollection::new(Vec::new())),
            applications: Arc::new(MemoryTable::new(vec![application()])),
            application_docs: Arc::new(MemoryCollection::new(Vec::new())),
            participation: Arc::new(MemoryParticipation::new(Vec::new())),
        };
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).single().unwrap(),
        ));
        let catalog = Catalog::new(stores, ReconcileConfig::default(), clock);
        Harness {
            events,
            event_docs: docs,
            router: app(AppState::new(catalog)),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let h = harness();
        let (status, body) = send(&h.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn events_listing_returns_merged_items() {
        let h = harness();
        let (status, body) = send(&h.router, get("/events?status=scheduled&tag=garden")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_more"], false);
        assert_eq!(body["degraded"], false);
        let item = &body["items"][0];
        assert_eq!(item["id"], "ev-1");
        assert_eq!(item["source"], "both");
        assert_eq!(item["fields"]["title"]["value"], "Seed swap");
        assert_eq!(item["metrics"]["spots_left"], 9);
    }

    #[tokio::test]
    async fn bad_query_values_are_400s_with_error_bodies() {
        let h = harness();
        for uri in [
            "/events?status=postponed",
            "/events?limit=0",
            "/events?limit=lots",
            "/events?from=2026-06-01T00:00:00Z&to=2026-05-01T00:00:00Z",
        ] {
            let (status, body) = send(&h.router, get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "validation", "{uri}");
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }
    }

    #[tokio::test]
    async fn unknown_ids_are_404s() {
        let h = harness();
        let (status, body) = send(&h.router, get("/events/ev-404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn operational_outage_is_503() {
        let h = harness();
        h.events.fail_with("connection refused");
        let (status, body) = send(&h.router, get("/events")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "source_unavailable");
    }

    #[tokio::test]
    async fn content_outage_on_a_document_lookup_is_503() {
        let h = harness();
        h.event_docs.fail_with("content api down");
        let (status, body) = send(&h.router, get("/events/doc-404")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "source_unavailable");

        let (status, body) = send(&h.router, get("/events/ev-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "operational");
    }

    #[tokio::test]
    async fn house_and_room_routes_filter_and_merge() {
        let h = harness();
        let (status, body) = send(&h.router, get("/houses?city=portland")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["id"], "h-1");
        assert_eq!(body["items"][0]["source"], "both");
        assert_eq!(body["items"][0]["fields"]["tagline"]["value"], "Porch and garden");

        let (_, body) = send(&h.router, get("/houses?city=seattle")).await;
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

        let (status, body) = send(&h.router, get("/houses/house-doc-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "h-1");

        let (status, body) = send(&h.router, get("/rooms?house_id=h-1&room_type=shared")).await;
        assert_eq!(status, StatusCode::OK);
        let room = &body["items"][0];
        assert_eq!(room["id"], "rm-1");
        assert_eq!(room["fields"]["house_name"]["value"], "Maple House");
        assert_eq!(room["fields"]["house_name"]["origin"], "lookup");

        let (status, _) = send(&h.router, get("/rooms?room_type=closet")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&h.router, get("/rooms/rm-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"]["house_name"]["value"], "Maple House");
    }

    #[tokio::test]
    async fn user_and_application_routes_filter_and_merge() {
        let h = harness();
        let (status, body) = send(&h.router, get("/users?role=host,resident")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["id"], "u-1");
        assert_eq!(body["items"][0]["metrics"]["is_resident"], true);

        let (_, body) = send(&h.router, get("/users?role=guest")).await;
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

        let (status, body) = send(&h.router, get("/users/u-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "operational");

        let (status, body) = send(&h.router, get("/applications?user_id=u-1&open_only=true")).await;
        assert_eq!(status, StatusCode::OK);
        let application = &body["items"][0];
        assert_eq!(application["id"], "app-1");
        assert_eq!(application["metrics"]["status"]["label"], "Waitlisted");

        let (_, body) = send(&h.router, get("/applications?status=accepted")).await;
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

        let (status, body) = send(&h.router, get("/applications/app-404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn participation_round_trips_through_the_event() {
        let h = harness();
        let put = Request::builder()
            .method("PUT")
            .uri("/events/doc-1/participation")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"user_id":"u-7","status":"interested"}"#))
            .unwrap();
        let (status, body) = send(&h.router, put).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event_id"], "ev-1");

        let (_, event) = send(&h.router, get("/events/ev-1?user_id=u-7")).await;
        assert_eq!(event["participation_data"]["status"], "interested");
    }

    #[tokio::test]
    async fn status_catalog_and_lookup() {
        let h = harness();
        let (status, body) = send(&h.router, get("/application-statuses")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(8));
        assert_eq!(body[0]["status"], "draft");

        let (status, body) = send(&h.router, get("/application-statuses/accepted")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["color"], "green");

        let (status, _) = send(&h.router, get("/application-statuses/lost")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
