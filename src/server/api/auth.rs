use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{hash_password, sign_token, verify_password};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{AuthResponse, LoginRequest, RegisterRequest, UserSummary};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{validate_email, validate_password};
use crate::types::User;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if store
        .get_user_by_email(&req.email)
        .api_err("Failed to check email")?
        .is_some()
    {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let password_hash =
        hash_password(&req.password).map_err(|_| ApiError::internal("Failed to hash password"))?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: req.email,
        password_hash,
        created_at: now,
        updated_at: now,
    };

    // The UNIQUE email constraint backstops the pre-check under races.
    if let Err(e) = store.create_user(&user) {
        return Err(match e {
            Error::AlreadyExists => ApiError::conflict("A user with this email already exists"),
            _ => ApiError::internal("Failed to create user"),
        });
    }

    let token = sign_token(&user.id, &user.email, &state.jwt_secret, state.jwt_ttl_hours)
        .map_err(|_| ApiError::internal("Failed to issue session token"))?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthResponse {
            user: UserSummary {
                id: user.id,
                email: user.email,
            },
            token,
        })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    // Unknown email and wrong password must be indistinguishable.
    let user = store
        .get_user_by_email(&req.email)
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = verify_password(&req.password, &user.password_hash)
        .map_err(|_| ApiError::internal("Failed to verify password"))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let token = sign_token(&user.id, &user.email, &state.jwt_secret, state.jwt_ttl_hours)
        .map_err(|_| ApiError::internal("Failed to issue session token"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(AuthResponse {
        user: UserSummary {
            id: user.id,
            email: user.email,
        },
        token,
    })))
}
