//! Bearer-token extractors.
//!
//! [`AuthUser`] rejects requests without a valid token (401). [`Viewer`]
//! lets anonymous requests through but still rejects a malformed token.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::service::AuthUser;

/// The caller, if a bearer token was sent.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<AuthUser>);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        state.auth.authenticate(token).await
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(Self(Some(state.auth.authenticate(token).await?))),
            None => Ok(Self(None)),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("expected a bearer token".into()))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        match builder.body(()) {
            Ok(req) => req.into_parts().0,
            Err(e) => unreachable!("static request is valid: {e}"),
        }
    }

    #[test]
    fn reads_bearer_tokens() {
        let p = parts(Some("Bearer abc.def"));
        assert!(matches!(bearer_token(&p), Ok(Some("abc.def"))));
        assert!(matches!(bearer_token(&parts(None)), Ok(None)));
    }

    #[test]
    fn rejects_other_schemes() {
        let p = parts(Some("Basic dXNlcg=="));
        assert!(matches!(bearer_token(&p), Err(AppError::Unauthorized(_))));
        let p = parts(Some("Bearer"));
        assert!(matches!(bearer_token(&p), Err(AppError::Unauthorized(_))));
    }
}
