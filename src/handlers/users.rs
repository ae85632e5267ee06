use crate::auth::hash_password_blocking;
use crate::error::{ApiError, ApiResult};
use crate::permissions::{authorize, Operation, Principal};
use crate::schemas::{AppState, ErrorResponse};
use crate::validation::{FieldErrors, Mode, USERNAME_TAKEN};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use model::entities::user;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

pub use crate::validation::UserPayload;

/// User representation returned by every write. Never carries the password.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
        }
    }
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users/",
    tag = "users",
    request_body = UserPayload,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<UserPayload>, ApiError>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    trace!("Entering create_user function");
    debug!("Creating user with username: {:?}", payload.username);

    let changes = state.policy.validate(&payload, Mode::Create, None)?;
    authorize(&Principal::Anonymous, Operation::Create)?;

    let txn = state.db.begin().await?;
    ensure_username_available(&txn, changes.username.as_deref(), None).await?;

    let password = changes.password.clone().unwrap_or_default();
    let password_hash = hash_password_blocking(password).await?;
    let new_user = user::ActiveModel {
        username: Set(changes.username.unwrap_or_default()),
        first_name: Set(changes.first_name.unwrap_or_default()),
        last_name: Set(changes.last_name.unwrap_or_default()),
        email: Set(changes.email.unwrap_or_default()),
        password_hash: Set(password_hash),
        is_staff: Set(false),
        is_superuser: Set(false),
        is_active: Set(true),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };

    trace!("Attempting to insert new user into database");
    let created = new_user.insert(&txn).await.map_err(map_write_error)?;
    txn.commit().await?;

    info!(
        "User created successfully with ID: {}, username: {}",
        created.id, created.username
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Replace a user's writable fields
#[utoipa::path(
    put,
    path = "/users/{user_id}/",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UserPayload,
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not permitted to modify this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn update_user(
    principal: Principal,
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    trace!("Entering update_user function");
    principal.require_authenticated()?;
    let Path(user_id) = path?;
    let Json(payload) = payload?;

    apply_update(&state, &principal, user_id, &payload, Mode::Replace)
        .await
        .map(Json)
}

/// Update a subset of a user's writable fields
#[utoipa::path(
    patch,
    path = "/users/{user_id}/",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UserPayload,
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not permitted to modify this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn partial_update_user(
    principal: Principal,
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    trace!("Entering partial_update_user function");
    principal.require_authenticated()?;
    let Path(user_id) = path?;
    let Json(payload) = payload?;

    apply_update(&state, &principal, user_id, &payload, Mode::Partial)
        .await
        .map(Json)
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{user_id}/",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    security(("basic_auth" = [])),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 403, description = "Not permitted to delete this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    principal: Principal,
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_user function");
    principal.require_authenticated()?;
    let Path(user_id) = path?;

    if let Err(denial) = authorize(&principal, Operation::Delete { target: user_id }) {
        warn!("Delete of user {} denied: {:?}", user_id, denial);
        return Err(denial.into());
    }

    let txn = state.db.begin().await?;
    let delete_result = user::Entity::delete_by_id(user_id).exec(&txn).await?;
    debug!(
        "Delete operation completed. Rows affected: {}",
        delete_result.rows_affected
    );

    if delete_result.rows_affected == 0 {
        warn!("User with ID {} not found for deletion", user_id);
        return Err(ApiError::NotFound);
    }
    txn.commit().await?;

    info!("User with ID {} deleted successfully", user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Shared PUT/PATCH pipeline: look up the target, authorize, validate, persist.
///
/// Validation messages about an account are only produced for callers that
/// may modify it.
async fn apply_update(
    state: &AppState,
    principal: &Principal,
    user_id: i32,
    payload: &UserPayload,
    mode: Mode,
) -> ApiResult<UserResponse> {
    principal.require_authenticated()?;

    let operation = match mode {
        Mode::Partial => Operation::PartialUpdate { target: user_id },
        _ => Operation::Update { target: user_id },
    };

    let txn = state.db.begin().await?;

    trace!("Looking up existing user with ID: {}", user_id);
    let existing = match user::Entity::find_by_id(user_id).one(&txn).await? {
        Some(user) => user,
        None => {
            warn!("User with ID {} not found for update", user_id);
            return Err(ApiError::NotFound);
        }
    };
    debug!("Found existing user: {}", existing.username);

    if let Err(denial) = authorize(principal, operation) {
        warn!("Update of user {} denied: {:?}", user_id, denial);
        return Err(denial.into());
    }

    let changes = state.policy.validate(payload, mode, Some(&existing))?;
    ensure_username_available(&txn, changes.username.as_deref(), Some(user_id)).await?;

    let mut user_active: user::ActiveModel = existing.clone().into();
    let mut updated_fields = Vec::new();

    if let Some(username) = changes.username {
        updated_fields.push("username");
        user_active.username = Set(username);
    }
    if let Some(first_name) = changes.first_name {
        updated_fields.push("first_name");
        user_active.first_name = Set(first_name);
    }
    if let Some(last_name) = changes.last_name {
        updated_fields.push("last_name");
        user_active.last_name = Set(last_name);
    }
    if let Some(email) = changes.email {
        updated_fields.push("email");
        user_active.email = Set(email);
    }
    if let Some(password) = changes.password.as_deref() {
        updated_fields.push("password");
        user_active.password_hash = Set(hash_password_blocking(password.to_string()).await?);
    }

    if !user_active.is_changed() {
        debug!("No fields to update for user ID: {}", user_id);
        txn.commit().await?;
        return Ok(UserResponse::from(existing));
    }

    trace!("Attempting to update user in database");
    let updated = user_active.update(&txn).await.map_err(map_write_error)?;
    txn.commit().await?;

    info!(
        "User with ID {} updated successfully. Updated fields: {}",
        user_id,
        updated_fields.join(", ")
    );
    Ok(UserResponse::from(updated))
}

async fn ensure_username_available<C: ConnectionTrait>(
    conn: &C,
    username: Option<&str>,
    exclude_id: Option<i32>,
) -> ApiResult<()> {
    let Some(username) = username else {
        return Ok(());
    };

    let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
    if let Some(id) = exclude_id {
        query = query.filter(user::Column::Id.ne(id));
    }

    if query.one(conn).await?.is_some() {
        debug!("Username {} is already taken", username);
        return Err(FieldErrors::single("username", USERNAME_TAKEN).into());
    }
    Ok(())
}

/// A unique-index violation that slipped past the availability check is
/// still a username conflict, not a server fault.
fn map_write_error(db_error: DbErr) -> ApiError {
    match db_error.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            FieldErrors::single("username", USERNAME_TAKEN).into()
        }
        _ => ApiError::Database(db_error),
    }
}
