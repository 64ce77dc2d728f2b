//! The five authentication endpoints.
//!
//! `/login` and `/callback` drive the authorization-code flow with PKCE;
//! `/logout`, `/me`, and `/refresh` operate on the established session. All
//! token material stays server-side; the browser only ever holds the opaque
//! session id.

use crate::cookies::{self, SESSION_COOKIE_NAME};
use crate::config::Config;
use crate::error::ApiError;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use bff_oidc::{
    generate_nonce, generate_state, AccessTokenClaims, IdTokenClaims, OidcError, PkceCodes,
    TokenResponse,
};
use bff_session::{PendingAuthorization, SessionError, SessionRecord, SessionTokens};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Begin a login attempt: mint PKCE material, state, and nonce, stash them
/// under the state value, and send the browser to the Hosted UI.
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let pkce = PkceCodes::generate();
    let auth_state = generate_state();
    let nonce = generate_nonce();

    state
        .pending
        .save(
            &auth_state,
            &PendingAuthorization {
                code_verifier: pkce.verifier.clone(),
                nonce: nonce.clone(),
            },
        )
        .await?;

    let url = state
        .provider
        .build_authorize_url(&pkce.challenge, &auth_state, &nonce)?;

    tracing::info!(state = preview(&auth_state), "redirecting to hosted UI");
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Complete the flow when the provider redirects back. The `state` value is
/// consumed exactly once; a replayed or forged callback finds nothing and is
/// rejected before any token exchange happens.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        let detail = query.error_description.as_deref().unwrap_or(error);
        tracing::warn!(error, "provider returned an authorization error");
        return error_redirect(&state.config, detail);
    }

    let (Some(code), Some(cb_state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return ApiError::InvalidRequest("Missing code or state parameter".to_string())
            .into_response();
    };

    let pending = match state.pending.consume(cb_state).await {
        Ok(Some(pending)) => pending,
        Ok(None) => {
            tracing::warn!(
                state = preview(cb_state),
                "callback state unknown, expired, or already used"
            );
            return ApiError::InvalidState.into_response();
        }
        Err(e) => return ApiError::Internal(e.into()).into_response(),
    };

    match establish_session(&state, code, &pending).await {
        Ok(session_id) => {
            tracing::info!("session established");
            let jar = jar.add(cookies::session_cookie(&state.config, session_id));
            (jar, Redirect::temporary(&state.config.frontend_origin)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to establish session from callback");
            error_redirect(&state.config, "authentication_failed")
        }
    }
}

/// Redeem the code and verify everything the provider handed back before any
/// of it is persisted.
async fn establish_session(
    state: &AppState,
    code: &str,
    pending: &PendingAuthorization,
) -> anyhow::Result<String> {
    let tokens = state
        .provider
        .exchange_code(code, &pending.code_verifier)
        .await?;

    let id_token_claims = state
        .verifier
        .verify_id_token(&tokens.id_token, Some(&pending.nonce))
        .await?;
    let access_token_claims = state.verifier.verify_access_token(&tokens.access_token).await?;

    let refresh_token = tokens
        .refresh_token
        .context("token response carried no refresh token")?;

    let record = SessionRecord {
        tokens: SessionTokens {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token,
        },
        id_token_claims,
        access_token_claims,
    };

    Ok(state.sessions.create(&record).await?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logout_url: String,
}

/// Destroy the server-side session, clear the cookie, and hand the SPA the
/// Hosted UI logout URL so it can finish the provider-side logout itself.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        state.sessions.destroy(cookie.value()).await?;
        tracing::info!("session destroyed on logout");
    }

    let logout_url = state.provider.build_logout_url()?;
    let jar = jar.add(cookies::clear_session_cookie(&state.config));
    Ok((jar, Json(LogoutResponse { logout_url })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub authenticated: bool,
    pub user: UserInfo,
    pub claims: ClaimsInfo,
    pub token_status: TokenStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub sub: String,
    pub email_verified: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsInfo {
    pub id_token: IdTokenClaims,
    pub access_token: AccessTokenClaims,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub access_token_expired: bool,
    pub access_token_expires_at: String,
}

/// Report the current identity. The expiry flag is advisory; the SPA uses it
/// to decide when to call `/refresh`.
pub async fn me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let session = match current_session(&state, &jar).await {
        Ok(Some((_, session))) => session,
        Ok(None) => return not_authenticated(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    let id = &session.id_token_claims;
    let user = UserInfo {
        email: id.email.clone(),
        name: id.name.clone(),
        sub: id.sub.clone(),
        email_verified: id.email_verified,
    };

    let token_status = token_status(&session.access_token_claims);
    Json(MeResponse {
        authenticated: true,
        user,
        claims: ClaimsInfo {
            id_token: session.id_token_claims,
            access_token: session.access_token_claims,
        },
        token_status,
    })
    .into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub token_status: TokenStatus,
}

/// Exchange the stored refresh token for fresh access and ID tokens, in
/// place. A rejected refresh token means the grant was revoked or expired;
/// the session is destroyed so the client starts over at `/login`. A
/// transport failure reaching the token endpoint proves nothing about the
/// grant and leaves the session intact.
pub async fn refresh(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (session_id, session) = match current_session(&state, &jar).await {
        Ok(Some(found)) => found,
        Ok(None) => return not_authenticated(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    if session.tokens.refresh_token.is_empty() {
        return unauthorized("No refresh token available");
    }

    let tokens = match state.provider.refresh(&session.tokens.refresh_token).await {
        Ok(tokens) => tokens,
        // Only a 4xx from the token endpoint is a definitive rejection of
        // the grant itself.
        Err(OidcError::ExchangeFailed { status, .. }) if status < 500 => {
            tracing::warn!(status, "refresh grant rejected, destroying session");
            if let Err(e) = state.sessions.destroy(&session_id).await {
                tracing::error!(error = %e, "failed to destroy session after refresh rejection");
            }
            let jar = jar.add(cookies::clear_session_cookie(&state.config));
            return (jar, unauthorized("Token refresh failed")).into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "token endpoint unavailable, keeping session");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "upstream_unavailable",
                    "message": "Token refresh temporarily unavailable",
                })),
            )
                .into_response();
        }
    };

    match apply_refresh(&state, &session_id, &session, tokens).await {
        Ok(token_status) => Json(RefreshResponse {
            success: true,
            message: "Tokens refreshed".to_string(),
            token_status,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Verify the refreshed tokens and swap them into the existing session. The
/// refresh grant reissues no refresh token, so the stored one is kept. Every
/// failure on this path surfaces as 401, never 500; the session itself is
/// left untouched.
async fn apply_refresh(
    state: &AppState,
    session_id: &str,
    session: &SessionRecord,
    tokens: TokenResponse,
) -> Result<TokenStatus, ApiError> {
    let id_token_claims = state
        .verifier
        .verify_id_token(&tokens.id_token, None)
        .await
        .map_err(refresh_verify_failure)?;
    let access_token_claims = state
        .verifier
        .verify_access_token(&tokens.access_token)
        .await
        .map_err(refresh_verify_failure)?;

    let refresh_token = tokens
        .refresh_token
        .unwrap_or_else(|| session.tokens.refresh_token.clone());

    let record = SessionRecord {
        tokens: SessionTokens {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token,
        },
        id_token_claims,
        access_token_claims: access_token_claims.clone(),
    };

    state.sessions.replace(session_id, &record).await?;
    Ok(token_status(&access_token_claims))
}

fn refresh_verify_failure(e: OidcError) -> ApiError {
    tracing::warn!(error = %e, "refreshed tokens failed verification");
    ApiError::Unauthorized("Token refresh failed".to_string())
}

async fn current_session(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Option<(String, SessionRecord)>, SessionError> {
    let Some(cookie) = jar.get(SESSION_COOKIE_NAME) else {
        return Ok(None);
    };
    let session_id = cookie.value().to_string();
    Ok(state
        .sessions
        .read(&session_id)
        .await?
        .map(|record| (session_id, record)))
}

fn token_status(claims: &AccessTokenClaims) -> TokenStatus {
    let now = chrono::Utc::now().timestamp();
    let exp = claims.exp as i64;
    TokenStatus {
        access_token_expired: exp <= now,
        access_token_expires_at: chrono::DateTime::from_timestamp(exp, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default(),
    }
}

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "authenticated": false, "message": "Not authenticated" })),
    )
        .into_response()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized", "message": message })),
    )
        .into_response()
}

fn error_redirect(config: &Config, message: &str) -> Response {
    let target = match Url::parse(&config.frontend_origin) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("error", message);
            url.to_string()
        }
        Err(_) => config.frontend_origin.clone(),
    };
    Redirect::temporary(&target).into_response()
}

/// Log-safe prefix of a secret-adjacent value: at most eight characters,
/// truncated on a character boundary.
fn preview(s: &str) -> &str {
    s.char_indices().nth(8).map_or(s, |(i, _)| &s[..i])
}
