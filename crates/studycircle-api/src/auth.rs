use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use studycircle_db::is_unique_violation;
use studycircle_rules::validate;
use studycircle_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ServiceError;
use crate::state::{AppState, AppStateInner};

pub async fn register_user(state: &AppStateInner, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
    let email = req.email.trim().to_lowercase();
    validate::email(&email)?;
    validate::password(&req.password)?;

    let full_name = match req.full_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            validate::title("full_name", name)?;
            name.to_string()
        }
        _ => validate::default_full_name(&email),
    };

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    if let Err(e) = state.db.create_user_with_profile(user_id, &email, &password_hash, &full_name) {
        if is_unique_violation(&e) {
            return Err(ServiceError::conflict("email already registered"));
        }
        return Err(e.into());
    }

    info!("Registered {} as {}", email, user_id);
    let token = create_token(&state.jwt_secret, user_id, &email)?;
    Ok(RegisterResponse { user_id, token })
}

pub async fn login_user(state: &AppStateInner, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .get_credentials_by_email(&email)?
        .ok_or(ServiceError::Unauthenticated)?;

    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ServiceError::Unauthenticated)?;

    let full_name = state.db.display_name(user.id)?;
    let token = create_token(&state.jwt_secret, user.id, &user.email)?;

    Ok(LoginResponse {
        user_id: user.id,
        full_name,
        token,
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = register_user(&state, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(login_user(&state, req).await?))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;
    Ok(token)
}
