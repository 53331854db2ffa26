//! HTTP surface of the engine.
//!
//! Handlers only translate between JSON payloads and engine calls; no
//! matching logic lives here.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::types::{
    Choice, CollectionId, CollectionMode, DrawingResult, DrawingView, MatchMode, RoomView, UserId,
};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub user: UserId,
    pub name: String,
    pub match_mode: MatchMode,
    pub collection_mode: CollectionMode,
    #[serde(default)]
    pub password: Option<String>,
    pub collection_id: CollectionId,
}

#[derive(Debug, Serialize)]
pub struct RoomIdResponse {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRoomRequest {
    pub user: UserId,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub collection_id: Option<CollectionId>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    pub user: UserId,
    pub choose: Choice,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SaveDrawingRequest {
    pub user: UserId,
    pub points: serde_json::Value,
    #[serde(default)]
    pub snapshot: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// POST /api/rooms
pub async fn create_room(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<CreateRoomRequest>,
) -> EngineResult<Json<RoomIdResponse>> {
    let room_id = engine
        .create_room(
            &req.user,
            &req.name,
            req.match_mode,
            req.collection_mode,
            req.password.as_deref(),
            &req.collection_id,
        )
        .await?;
    Ok(Json(RoomIdResponse { room_id }))
}

/// POST /api/rooms/{room_id}/connect
pub async fn connect_to_room(
    State(engine): State<Arc<Engine>>,
    Path(room_id): Path<String>,
    Json(req): Json<ConnectRoomRequest>,
) -> EngineResult<Json<RoomIdResponse>> {
    let room_id = engine
        .connect_to_room(
            &req.user,
            &room_id,
            req.password.as_deref(),
            req.collection_id.as_deref(),
        )
        .await?;
    Ok(Json(RoomIdResponse { room_id }))
}

/// GET /api/rooms/{room_id}/state?user=
pub async fn room_state(
    State(engine): State<Arc<Engine>>,
    Path(room_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> EngineResult<Json<RoomView>> {
    let view = engine.get_room_state(&query.user, &room_id).await?;
    Ok(Json(view))
}

/// POST /api/rooms/{room_id}/choice
pub async fn submit_choice(
    State(engine): State<Arc<Engine>>,
    Path(room_id): Path<String>,
    Json(req): Json<ChoiceRequest>,
) -> EngineResult<Json<RoomView>> {
    let view = engine.submit_choice(&req.user, &room_id, req.choose).await?;
    Ok(Json(view))
}

/// GET /api/rooms/{room_id}/drawing?user=
pub async fn get_drawing(
    State(engine): State<Arc<Engine>>,
    Path(room_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> EngineResult<Json<DrawingView>> {
    let view = engine.get_room_drawing(&query.user, &room_id).await?;
    Ok(Json(view))
}

/// POST /api/rooms/{room_id}/drawing
pub async fn save_drawing(
    State(engine): State<Arc<Engine>>,
    Path(room_id): Path<String>,
    Json(req): Json<SaveDrawingRequest>,
) -> EngineResult<Json<OkResponse>> {
    engine
        .save_room_drawing(&req.user, &room_id, req.points, req.snapshot)
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/rooms/{room_id}/drawings?user=
pub async fn drawing_results(
    State(engine): State<Arc<Engine>>,
    Path(room_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> EngineResult<Json<Vec<DrawingResult>>> {
    let results = engine
        .get_room_drawings_results(&query.user, &room_id)
        .await?;
    Ok(Json(results))
}

/// Build the API router. The engine handle is the only state.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{room_id}/connect", post(connect_to_room))
        .route("/api/rooms/{room_id}/state", get(room_state))
        .route("/api/rooms/{room_id}/choice", post(submit_choice))
        .route(
            "/api/rooms/{room_id}/drawing",
            get(get_drawing).post(save_drawing),
        )
        .route("/api/rooms/{room_id}/drawings", get(drawing_results))
        .with_state(engine)
}
