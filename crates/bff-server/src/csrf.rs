//! Double-submit CSRF guard.
//!
//! `issue_csrf` hands a token to any browser that lacks one; `require_csrf`
//! demands the cookie and the `x-csrf-token` header agree on every
//! state-changing request. The token is never stored server-side: the check
//! relies on a cross-site attacker being unable to read the cookie.

use crate::cookies::{self, CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use rand::RngCore;
use std::sync::Arc;

fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Set a CSRF cookie on any response to a browser that does not already
/// carry one, including CSRF rejections themselves so a fresh client can
/// recover by retrying.
pub async fn issue_csrf(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let needs_token = jar.get(CSRF_COOKIE_NAME).is_none();
    let response = next.run(request).await;

    if needs_token {
        let jar = jar.add(cookies::csrf_cookie(&state.config, generate_csrf_token()));
        (jar, response).into_response()
    } else {
        response
    }
}

/// Reject any non-safe request whose CSRF cookie and header are missing or
/// disagree. Safe methods pass through untouched.
pub async fn require_csrf(jar: CookieJar, request: Request, next: Next) -> Response {
    let method = request.method();
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        return next.run(request).await;
    }

    let cookie = jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_owned());
    let header = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match (cookie, header) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => {
            next.run(request).await
        }
        (cookie, header) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                has_cookie = cookie.is_some(),
                has_header = header.is_some(),
                "rejecting request with missing or mismatched CSRF token"
            );
            ApiError::CsrfMismatch.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use crate::state::test_support::cognito_state;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn post_without_csrf_token_is_forbidden() {
        let (state, _) = cognito_state();
        let app = create_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_with_mismatched_tokens_is_forbidden() {
        let (state, _) = cognito_state();
        let app = create_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/logout")
                    .header(header::COOKIE, "csrf_token=aaaa")
                    .header(CSRF_HEADER_NAME, "bbbb")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn get_is_exempt_and_receives_a_token() {
        let (state, _) = cognito_state();
        let app = create_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let issued = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("csrf_token="));
        assert!(issued);
    }

    #[tokio::test]
    async fn existing_token_is_not_reissued() {
        let (state, _) = cognito_state();
        let app = create_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::COOKIE, "csrf_token=already-there")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let reissued = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("csrf_token="));
        assert!(!reissued);
    }

    #[tokio::test]
    async fn csrf_rejection_still_issues_a_token() {
        let (state, _) = cognito_state();
        let app = create_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let issued = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("csrf_token="));
        assert!(issued);
    }
}
