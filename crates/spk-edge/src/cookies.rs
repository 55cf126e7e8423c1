//! Session cookie construction.
//!
//! The edge is the only place session cookies are written. The cookie is
//! deliberately **not** HttpOnly: the client reads it to decide whether to
//! render logged-in UI before the first API round-trip. `Secure` is
//! environment-driven so local HTTP development keeps working.

/// Environment variable overriding the session cookie name.
pub const SESSION_COOKIE_ENV: &str = "SPK_SESSION_COOKIE";

/// Environment variable enabling the `Secure` attribute ("1" or "true").
pub const COOKIE_SECURE_ENV: &str = "SPK_COOKIE_SECURE";

/// Cookie name used when no override is configured.
pub const DEFAULT_COOKIE_NAME: &str = "spk_session";

/// Session cookie lifetime: 7 days.
pub const SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// How the edge writes session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
}

impl CookieConfig {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    pub fn from_env() -> Self {
        let name = std::env::var(SESSION_COOKIE_ENV)
            .ok()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_owned());
        let secure = std::env::var(COOKIE_SECURE_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self { name, secure }
    }

    /// `Set-Cookie` value installing a session token.
    pub fn build_set(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={token}; Max-Age={SESSION_MAX_AGE_SECS}; Path=/; SameSite=Lax",
            self.name
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value expiring the session immediately.
    pub fn build_expire(&self) -> String {
        let mut cookie = format!("{}=; Max-Age=0; Path=/; SameSite=Lax", self.name);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_owned(),
            secure: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
