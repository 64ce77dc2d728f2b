use thiserror::Error;

#[derive(Error, Debug)]
pub enum OidcError {
    #[error("Invalid provider configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Token exchange failed ({status}): {body}")]
    ExchangeFailed { status: u16, body: String },

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch JWKS: {0}")]
    JwksFetch(String),

    #[error("Token invalid: {0}")]
    TokenInvalid(String),
}

pub type Result<T> = std::result::Result<T, OidcError>;
