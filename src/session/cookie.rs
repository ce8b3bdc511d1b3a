use std::fmt;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Thirty days, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

// -----------------------------------------------------------------------------
// ----- CookieOptions ---------------------------------------------------------

/// Attributes every new session cookie starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: false,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Cookie ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    /// Seconds. Zero leaves the attribute out, negative expires the cookie.
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: &CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: options.path.clone(),
            domain: options.domain.clone(),
            max_age: options.max_age,
            secure: options.secure,
            http_only: options.http_only,
        }
    }

    /// Same cookie, told to expire immediately.
    pub fn expired(&self) -> Self {
        Self {
            max_age: -1,
            ..self.clone()
        }
    }

    /// True when the cookie can be rendered as a `Set-Cookie` value without
    /// mangling anything.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && self.name.bytes().all(is_token_byte)
            && self.value.bytes().all(is_cookie_octet)
            && is_attribute_value(&self.path)
            && self.domain.as_deref().is_none_or(is_attribute_value)
    }
}

/// Renders the `Set-Cookie` header value.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;

        if !self.path.is_empty() {
            write!(f, "; Path={}", self.path)?;
        }
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            write!(f, "; Domain={}", domain.trim_start_matches('.'))?;
        }
        if self.max_age > 0 {
            write!(f, "; Max-Age={}", self.max_age)?;
        } else if self.max_age < 0 {
            f.write_str("; Max-Age=0")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

// RFC 6265 cookie-name is an RFC 2616 token.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

// RFC 6265 cookie-octet.
fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
}

fn is_attribute_value(value: &str) -> bool {
    value.bytes().all(|b| (0x20..0x7F).contains(&b) && b != b';')
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
