use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use studycircle_rules::policy::Actor;
use studycircle_types::api::Claims;

use crate::error::ServiceError;
use crate::state::AppState;

/// Resolve the request's actor and store it as an extension.
/// No Authorization header means Anonymous; a bad or expired token is 401.
pub async fn resolve_actor(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ServiceError> {
    let actor = if req.headers().contains_key(header::AUTHORIZATION) {
        let bearer = req
            .headers()
            .typed_get::<Authorization<Bearer>>()
            .ok_or(ServiceError::Unauthenticated)?;
        let claims = decode_token(&state.jwt_secret, bearer.token()).ok_or(ServiceError::Unauthenticated)?;
        Actor::User(claims.sub)
    } else {
        Actor::Anonymous
    };

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .ok()
        .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use uuid::Uuid;

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_token("secret", user_id, "ana@school.edu").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ana@school.edu");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "ana@school.edu").unwrap();
        assert!(decode_token("other", &token).is_none());
        assert!(decode_token("secret", "not-a-jwt").is_none());
    }
}
