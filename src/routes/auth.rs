use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dto::auth_dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::{Error, Result};
use crate::models::user::{User, ROLE_EXAMINER, ROLE_STUDENT};
use crate::utils::{crypto, token};
use crate::AppState;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response> {
    req.validate()?;

    let role = match req.role.as_deref() {
        None | Some(ROLE_STUDENT) => ROLE_STUDENT,
        Some(ROLE_EXAMINER) => ROLE_EXAMINER,
        Some(other) => {
            return Err(Error::BadRequest(format!("Unknown role: {}", other)));
        }
    };

    let password_hash = crypto::hash_password(&req.password)
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;

    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(req.name)
    .bind(req.email.to_lowercase())
    .bind(password_hash)
    .bind(role)
    .fetch_one(&state.pool)
    .await;

    let user = match inserted {
        Ok(user) => user,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(Error::Conflict("Email is already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let token = token::issue_jwt(user.id, &user.role)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user_id: user.id,
            name: user.name,
            role: user.role,
        }),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response> {
    req.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"SELECT * FROM users WHERE email = $1 AND is_active"#,
    )
    .bind(req.email.to_lowercase())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| Error::Unauthorized("Invalid credentials".to_string()))?;

    let ok = crypto::verify_password(&req.password, &user.password_hash)
        .map_err(|e| Error::Internal(format!("Failed to verify password: {}", e)))?;
    if !ok {
        return Err(Error::Unauthorized("Invalid credentials".to_string()));
    }

    let token = token::issue_jwt(user.id, &user.role)?;
    Ok(Json(AuthResponse {
        token,
        user_id: user.id,
        name: user.name,
        role: user.role,
    })
    .into_response())
}
