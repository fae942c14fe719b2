use std::str::FromStr;

use http::header::HeaderName;
use http::uri::Authority;
use http::uri::PathAndQuery;
use http::uri::Scheme;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::Uri;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

use crate::Error;
use crate::Result;

/// Unreserved characters of RFC 3986, used when writing query pairs back
/// onto the wire.
static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A mutable view over `http::request::Parts` used while signing.
///
/// Headers keep every value of a multi-valued header. Query parameters are
/// stored percent-decoded, in the order they appeared, and may repeat.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path, percent-encoded as it will be sent.
    pub path: String,
    /// HTTP query parameters, percent-decoded.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing request from http::request::Parts.
    ///
    /// `parts` is left untouched until [`SigningRequest::apply`] writes the
    /// signed request back, so a failed signing keeps the caller's request.
    pub fn build(parts: &http::request::Parts) -> Result<Self> {
        let uri = parts.uri.clone().into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let Some(authority) = uri.authority else {
            return Err(Error::request_invalid(
                "request without authority is invalid for signing",
            ));
        };

        let path = match paq.path() {
            "" => "/".to_string(),
            v => v.to_string(),
        };

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTP),
            authority,
            path,
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),
            headers: parts.headers.clone(),
        })
    }

    /// Apply the signing request back to http::request::Parts.
    pub fn apply(self, parts: &mut http::request::Parts) -> Result<()> {
        let mut paq = self.path;
        for (idx, (k, v)) in self.query.iter().enumerate() {
            paq.push(if idx == 0 { '?' } else { '&' });
            paq.extend(utf8_percent_encode(k, &QUERY_ENCODE_SET));
            if !v.is_empty() {
                paq.push('=');
                paq.extend(utf8_percent_encode(v, &QUERY_ENCODE_SET));
            }
        }

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(self.scheme);
        uri_parts.authority = Some(self.authority);
        uri_parts.path_and_query = Some(PathAndQuery::from_str(&paq)?);

        parts.uri = Uri::from_parts(uri_parts)?;
        parts.method = self.method;
        parts.headers = self.headers;
        Ok(())
    }

    /// Is this request sent over https?
    #[inline]
    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    /// Get the first value of a header.
    ///
    /// Returns `None` if the header is absent or its value is not visible ascii.
    pub fn header_get(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get all values of a header in insertion order.
    pub fn header_values(&self, name: impl http::header::AsHeaderName) -> Result<Vec<&str>> {
        self.headers
            .get_all(name)
            .iter()
            .map(|v| v.to_str().map_err(Error::from))
            .collect()
    }

    /// Replace all values of a header with the given value.
    pub fn header_put(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let name = HeaderName::from_str(name.as_ref())?;
        let value = HeaderValue::from_str(value.as_ref())?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Replace all values of a header with a sensitive value.
    ///
    /// Sensitive values are hidden from `Debug` output of the header map.
    pub fn header_put_sensitive(
        &mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<()> {
        let name = HeaderName::from_str(name.as_ref())?;
        let mut value = HeaderValue::from_str(value.as_ref())?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a value to a header, keeping existing values.
    pub fn header_append(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let name = HeaderName::from_str(name.as_ref())?;
        let value = HeaderValue::from_str(value.as_ref())?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Remove a header and return its values.
    pub fn header_remove(&mut self, name: &str) -> Result<Vec<String>> {
        let Ok(name) = HeaderName::from_str(name) else {
            return Ok(Vec::new());
        };
        let values = match self.headers.entry(name) {
            http::header::Entry::Occupied(entry) => entry
                .remove_entry_mult()
                .1
                .map(|v| v.to_str().map(str::to_string))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            http::header::Entry::Vacant(_) => Vec::new(),
        };
        Ok(values)
    }

    /// Check whether any header name starts with the given lower-case prefix.
    pub fn header_has_prefix(&self, prefix: &str) -> bool {
        self.headers.keys().any(|k| k.as_str().starts_with(prefix))
    }

    /// Get the first value of a query parameter.
    pub fn query_get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of a query parameter with the given value.
    pub fn query_put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.query.retain(|(k, _)| *k != key);
        self.query.push((key, value.into()));
    }

    /// Push a new query pair into query list, keeping existing values.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }
}
