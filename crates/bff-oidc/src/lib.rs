//! # bff-oidc
//!
//! Server-side OAuth2/OIDC plumbing for the BFF: PKCE, state, and nonce
//! generation, the authorization-code and refresh-token exchanges against
//! Cognito's token endpoint, and signature/claim verification of the returned
//! tokens against the user pool's published JWKS.
//!
//! Tokens obtained here never leave the server; the browser only ever sees an
//! opaque session id.

#![warn(clippy::all)]

pub mod errors;
pub mod params;
pub mod provider;
pub mod types;
pub mod verify;

pub use errors::{OidcError, Result};
pub use params::{generate_nonce, generate_state, PkceCodes};
pub use provider::{ProviderClient, ProviderConfig};
pub use types::{AccessTokenClaims, IdTokenClaims, Jwk, JwkSet, TokenResponse};
pub use verify::TokenVerifier;
