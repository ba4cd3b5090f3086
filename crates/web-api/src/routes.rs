use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, HeaderValue},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use application::{
    AuthenticateUserRequest, CreateRoomRequest, Identity, RegisterUserRequest, SessionGateway,
    UserDto,
};
use domain::{Message, Room, RoomId, User};

use crate::{
    auth::bearer_token, error::ApiError, state::AppState, ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
    #[serde(default)]
    participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyPayload {
    public_key: String,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{room_id}/messages", get(list_messages))
        .route("/public-key", post(update_public_key))
}

/// `*` 表示放开所有来源；无法解析的来源会被忽略
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            password: payload.password,
        })
        .await?;

    session_response(&state, &user)
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            username: payload.username,
            password: payload.password,
        })
        .await?;

    tracing::info!(username = %user.username, "user logged in");
    session_response(&state, &user)
}

fn session_response(state: &AppState, user: &User) -> Result<Json<Value>, ApiError> {
    let token = state.jwt_service.issue(&Identity::from(user))?;
    Ok(Json(json!({ "token": token, "user": UserDto::from(user) })))
}

/// 校验 token，且要求用户仍存在于目录中
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let identity = state.jwt_service.extract_identity_from_headers(headers)?;
    ensure_registered(state, identity).await
}

async fn ensure_registered(state: &AppState, identity: Identity) -> Result<Identity, ApiError> {
    match state.user_service.find(&identity.username).await {
        Some(user) if user.id == identity.user_id => Ok(identity),
        _ => Err(ApiError::unauthorized("unknown user")),
    }
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<Json<Value>, ApiError> {
    let identity = authorize(&state, &headers).await?;
    let room: Room = state
        .chat_service
        .create_room(CreateRoomRequest {
            name: payload.name,
            creator: identity.username,
            participants: payload.participants,
        })
        .await?;

    Ok(Json(json!({ "room": room })))
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let identity = authorize(&state, &headers).await?;
    let rooms = state.chat_service.list_rooms(&identity.username).await;
    Ok(Json(json!({ "rooms": rooms })))
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Value>, ApiError> {
    let identity = authorize(&state, &headers).await?;
    let messages: Vec<Message> = state
        .chat_service
        .list_messages(&identity.username, room_id)
        .await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn update_public_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PublicKeyPayload>,
) -> Result<Json<Value>, ApiError> {
    let identity = authorize(&state, &headers).await?;
    state
        .user_service
        .register_public_key(&identity.username, payload.public_key)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// 握手阶段完成认证；token 可以放在查询参数或 Authorization 头里
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .as_deref()
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| ApiError::unauthorized("missing token"))?;
    let identity = state.jwt_service.authenticate(token)?;
    let identity = ensure_registered(&state, identity).await?;

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(state, identity).run(socket)))
}
