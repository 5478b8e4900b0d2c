use std::fmt;

use crate::error::Error;

/// Access key pair used to sign requests.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        if access_key_id.trim().is_empty() {
            return Err(Error::invalid_config("access_key_id must not be empty"));
        }
        if secret_access_key.trim().is_empty() {
            return Err(Error::invalid_config("secret_access_key must not be empty"));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Keeps a four character hint at each end of values long enough to hide a middle.
fn redact(value: &str) -> String {
    let chars: Vec<char> = value.trim().chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Request authentication mode.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Auth {
    /// Unsigned requests.
    Anonymous,
    Static(Credentials),
}

impl Auth {
    /// Reads `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env() -> Result<Self, Error> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::invalid_config("missing AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::invalid_config("missing AWS_SECRET_ACCESS_KEY"))?;

        Ok(Self::Static(Credentials::new(access_key_id, secret_access_key)?))
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Anonymous => None,
            Self::Static(creds) => Some(creds),
        }
    }
}

/// Delegated-auth tokens sent as `x-amz-security-token`.
#[derive(Clone)]
pub struct DevPayTokens {
    pub user_token: String,
    pub product_token: Option<String>,
}

impl DevPayTokens {
    pub fn new(user_token: impl Into<String>, product_token: Option<String>) -> Self {
        Self {
            user_token: user_token.into(),
            product_token,
        }
    }

    pub(crate) fn header_value(&self) -> String {
        match self.product_token.as_deref() {
            Some(product) => format!("{},{product}", self.user_token),
            None => self.user_token.clone(),
        }
    }
}

impl fmt::Debug for DevPayTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevPayTokens")
            .field("user_token", &redact(&self.user_token))
            .field("product_token", &self.product_token.as_deref().map(redact))
            .finish()
    }
}

/// Multi-factor authentication device serial and current code.
#[derive(Clone)]
pub struct Mfa {
    pub serial_number: String,
    pub code: String,
}

impl Mfa {
    pub fn new(serial_number: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            code: code.into(),
        }
    }

    pub(crate) fn header_value(&self) -> String {
        format!("{} {}", self.serial_number, self.code)
    }
}

impl fmt::Debug for Mfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mfa")
            .field("serial_number", &self.serial_number)
            .field("code", &"<redacted>")
            .finish()
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingStyle {
    Auto,
    Path,
    VirtualHosted,
}
