//! Cookie construction.
//!
//! Two cookies, two trust models: `bff_session` is HttpOnly and carries the
//! opaque session id; `csrf_token` is deliberately script-readable so the SPA
//! can echo it back in the `x-csrf-token` header.

use crate::config::Config;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const SESSION_COOKIE_NAME: &str = "bff_session";
pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

const COOKIE_MAX_AGE: Duration = Duration::hours(24);

fn site_attrs(config: &Config) -> (SameSite, bool) {
    if config.cross_site_cookies {
        // SameSite=None is only honored over HTTPS.
        (SameSite::None, true)
    } else {
        (SameSite::Lax, config.secure_cookies)
    }
}

pub fn session_cookie(config: &Config, session_id: String) -> Cookie<'static> {
    let (same_site, secure) = site_attrs(config);
    Cookie::build((SESSION_COOKIE_NAME, session_id))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .max_age(COOKIE_MAX_AGE)
        .build()
}

pub fn clear_session_cookie(config: &Config) -> Cookie<'static> {
    let (same_site, secure) = site_attrs(config);
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .max_age(Duration::ZERO)
        .build()
}

pub fn csrf_cookie(config: &Config, token: String) -> Cookie<'static> {
    let (same_site, secure) = site_attrs(config);
    Cookie::build((CSRF_COOKIE_NAME, token))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(same_site)
        .max_age(COOKIE_MAX_AGE)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_config;

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie(&test_config(), "abc123".to_string());
        let rendered = cookie.to_string();
        assert!(rendered.starts_with("bff_session=abc123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("SameSite=Lax"));
    }

    #[test]
    fn csrf_cookie_is_script_readable() {
        let cookie = csrf_cookie(&test_config(), "tok".to_string());
        assert!(!cookie.to_string().contains("HttpOnly"));
    }

    #[test]
    fn cross_site_mode_forces_none_and_secure() {
        let mut config = test_config();
        config.cross_site_cookies = true;
        let rendered = session_cookie(&config, "abc".to_string()).to_string();
        assert!(rendered.contains("SameSite=None"));
        assert!(rendered.contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let rendered = clear_session_cookie(&test_config()).to_string();
        assert!(rendered.starts_with("bff_session="));
        assert!(rendered.contains("Max-Age=0"));
    }
}
