//! 관리자 endpoint.
//!
//! 게이트가 상위 역할을 확인한 뒤에만 도달합니다.
//!
//! - `POST /admin/addUser`
//! - `DELETE /admin/removeUser/{user_id}`
//! - `POST /admin/assignRole`

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::user::{MessageResponse, RegisterRequest};
use super::validated;
use crate::auth::AuthenticatedUser;
use crate::error::AuthError;
use crate::state::AppState;

/// 사용자 추가 요청.
#[derive(Deserialize, Validate)]
pub struct AddUserRequest {
    #[validate(nested)]
    pub user: RegisterRequest,
    #[serde(rename = "roleName")]
    #[validate(length(min = 1))]
    pub role_name: String,
}

/// 역할 할당 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[serde(rename = "roleName")]
    #[validate(length(min = 1))]
    pub role_name: String,
}

/// 사용자 추가.
///
/// POST /admin/addUser
pub async fn add_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    payload: Result<Json<AddUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = validated(payload)?;
    let (user, password) = request.user.into_parts();

    info!(admin = %caller.username, username = %user.username, role = %request.role_name, "사용자 추가 요청");
    state
        .auth
        .add_user(user, &password, &request.role_name)
        .await?;

    Ok(Json(MessageResponse::new("User successfully created")))
}

/// 사용자 삭제.
///
/// DELETE /admin/removeUser/{user_id}
pub async fn remove_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    info!(admin = %caller.username, user_id = %user_id, "사용자 삭제 요청");
    state.auth.remove_user(&user_id).await?;
    Ok(Json(MessageResponse::new("User successfully removed")))
}

/// 역할 할당.
///
/// POST /admin/assignRole
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    payload: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let request = validated(payload)?;

    info!(admin = %caller.username, username = %request.username, role = %request.role_name, "역할 할당 요청");
    state
        .auth
        .assign_role(&request.username, &request.role_name)
        .await?;

    Ok(Json(MessageResponse::new("Role successfully assigned")))
}

/// 관리자 라우터 생성.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/addUser", post(add_user))
        .route("/removeUser/{user_id}", delete(remove_user))
        .route("/assignRole", post(assign_role))
}
