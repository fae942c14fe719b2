use sigv4_core::time::{format_date, format_iso8601, DateTime};

use crate::constants::AWS4_REQUEST;
use crate::Credential;

/// The date, region and service a signature is bound to.
///
/// Created once per sign operation from the signing clock and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    region: String,
    service: String,
    instant: DateTime,
}

impl CredentialScope {
    /// Create a new scope.
    pub fn new(region: impl Into<String>, service: impl Into<String>, instant: DateTime) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
            instant,
        }
    }

    /// Region of this scope.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Service signing name of this scope.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Signing instant of this scope.
    pub fn instant(&self) -> DateTime {
        self.instant
    }

    /// `YYYYMMDD` in UTC.
    pub fn date(&self) -> String {
        format_date(self.instant)
    }

    /// `YYYYMMDDTHHMMSSZ` in UTC.
    pub fn datetime(&self) -> String {
        format_iso8601(self.instant)
    }

    /// `date/region/service/aws4_request`
    pub fn scope(&self) -> String {
        format!(
            "{}/{}/{}/{AWS4_REQUEST}",
            self.date(),
            self.region,
            self.service
        )
    }

    /// `access_key_id/date/region/service/aws4_request`
    pub fn scope_with_credential(&self, cred: &Credential) -> String {
        format!("{}/{}", cred.access_key_id, self.scope())
    }
}
