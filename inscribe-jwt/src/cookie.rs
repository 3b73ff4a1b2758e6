// Session cookie formatting

use std::time::Duration;

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Builds `Set-Cookie` values for the session token
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Duration,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// `Set-Cookie` value carrying `token`
    pub fn build(&self, token: &str) -> String {
        self.render(token, self.max_age.as_secs())
    }

    /// `Set-Cookie` value that deletes the cookie
    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}",
            self.name, value, self.path, max_age
        );

        if let Some(domain) = &self.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));

        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cookie() {
        let cookie = SessionCookie::new("inscribe_session")
            .with_max_age(Duration::from_secs(3600))
            .build("abc.def.ghi");
        assert_eq!(
            cookie,
            "inscribe_session=abc.def.ghi; Path=/; Max-Age=3600; Secure; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = SessionCookie::new("inscribe_session")
            .with_secure(false)
            .with_domain("inscribe.so")
            .clear();
        assert_eq!(
            cookie,
            "inscribe_session=; Path=/; Max-Age=0; Domain=inscribe.so; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_same_site_strings() {
        assert_eq!(SameSite::Strict.as_str(), "Strict");
        assert_eq!(SameSite::None.as_str(), "None");
    }
}
