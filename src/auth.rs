// ABOUTME: HTTP Basic-auth predicate with a precomputed credential string
// ABOUTME: Comparison stays entirely in base64-encoded space, matching the original wire behavior

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Auth mode selected via `-a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthMode {
    Off,
    Basic,
}

/// Holds a precomputed Basic credential string and realm; immutable once
/// built. `authorize` never decodes the presented token — both sides of
/// the comparison stay base64-encoded, so a byte-exact string compare is
/// sufficient and avoids round-tripping through plaintext at all.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    mode: AuthMode,
    realm: String,
    credential: String,
}

impl AuthConfig {
    /// Auth disabled; `authorize` is never consulted in this mode.
    pub fn off() -> Self {
        Self {
            mode: AuthMode::Off,
            realm: String::new(),
            credential: String::new(),
        }
    }

    /// Precomputes the Basic credential by base64-encoding `user:pass`
    /// exactly once.
    pub fn basic(user: &str, pass: &str, realm: &str) -> Self {
        let credential = BASE64.encode(format!("{user}:{pass}"));
        Self {
            mode: AuthMode::Basic,
            realm: realm.to_string(),
            credential,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Byte-exact compare of `presented` (the raw token following `Basic `
    /// in the `Authorization` header) against the stored credential.
    /// Always `true` when auth is off.
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        match self.mode {
            AuthMode::Off => true,
            AuthMode::Basic => presented.is_some_and(|p| p == self.credential),
        }
    }
}
