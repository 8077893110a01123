//! Notification target addressing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a notification target is not `domain.service`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid notification target {0:?}: expected \"domain.service\"")]
pub struct TargetError(String);

/// A host capability addressed as `domain.service`, e.g. `notify.mobile_app_phone`.
///
/// Both parts are validated on construction, so a `ServiceTarget` held by a
/// watched trip is always deliverable as far as addressing goes.
///
/// # Examples
///
/// ```
/// use departure_board::domain::ServiceTarget;
///
/// let target = ServiceTarget::parse("notify.mobile_app_phone").unwrap();
/// assert_eq!(target.domain(), "notify");
/// assert_eq!(target.service(), "mobile_app_phone");
///
/// assert!(ServiceTarget::parse("notify").is_err());
/// assert!(ServiceTarget::parse(".phone").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceTarget {
    domain: String,
    service: String,
}

impl ServiceTarget {
    /// Parse a `domain.service` string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let (domain, service) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| TargetError(s.to_string()))?;

        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        if !valid(domain) || !valid(service) {
            return Err(TargetError(s.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            service: service.to_string(),
        })
    }

    /// The capability domain (e.g. `notify`).
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The service within the domain.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl FromStr for ServiceTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServiceTarget {
    type Error = TargetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ServiceTarget> for String {
    fn from(target: ServiceTarget) -> Self {
        target.to_string()
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

impl fmt::Debug for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceTarget({self})")
    }
}
