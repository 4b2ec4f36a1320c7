//! Email address types.

use crate::error::{Error, Result};

/// Maximum length of the local part (RFC 5321 section 4.5.3.1.1).
const MAX_LOCAL_LEN: usize = 64;

/// Maximum length of a forward-path (RFC 5321 section 4.5.3.1.3).
const MAX_ADDRESS_LEN: usize = 254;

/// Special characters permitted in an unquoted local part.
const LOCAL_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~-";

/// Email address for SMTP envelope.
///
/// Only the dot-atom form is accepted, which excludes anything that could
/// break out of `MAIL FROM:<...>` or a header line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.len() > MAX_ADDRESS_LEN {
            return Err(Error::InvalidAddress(format!(
                "Address longer than {MAX_ADDRESS_LEN} characters"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        if local.len() > MAX_LOCAL_LEN {
            return Err(Error::InvalidAddress(format!(
                "Local part longer than {MAX_LOCAL_LEN} characters"
            )));
        }

        let local_ok = local.split('.').all(|atom| {
            !atom.is_empty()
                && atom
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c))
        });
        if !local_ok {
            return Err(Error::InvalidAddress(format!("Invalid local part: {local}")));
        }

        let labels: Vec<&str> = domain.split('.').collect();
        let domain_ok = labels.len() >= 2
            && labels.iter().all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !domain_ok {
            return Err(Error::InvalidAddress(format!("Invalid domain: {domain}")));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
