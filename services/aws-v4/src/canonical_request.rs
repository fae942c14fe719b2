use std::collections::BTreeMap;
use std::fmt::Write;

use once_cell::unsync::OnceCell;
use percent_encoding::{percent_decode_str, percent_encode, utf8_percent_encode};
use sigv4_core::{Error, Result, SigningRequest};

use crate::constants::{AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, IGNORED_HEADERS};

/// Options controlling how the canonical uri is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalOptions {
    /// Percent-encode the path a second time.
    pub double_url_encode: bool,
    /// Resolve `.` and `..` segments.
    pub normalize_path: bool,
}

impl Default for CanonicalOptions {
    fn default() -> Self {
        Self {
            double_url_encode: true,
            normalize_path: true,
        }
    }
}

/// Canonical form of a request.
///
/// Every derived string is computed on first access and cached, so calling
/// a getter repeatedly never recomputes it.
///
/// ```text
/// <HTTPMethod>\n
/// <CanonicalURI>\n
/// <CanonicalQueryString>\n
/// <CanonicalHeaders>\n
/// <SignedHeaders>\n
/// <HashedPayload>
/// ```
#[derive(Debug)]
pub struct CanonicalRequest<'a> {
    req: &'a SigningRequest,
    content_hash: String,
    options: CanonicalOptions,

    uri: OnceCell<String>,
    query: OnceCell<String>,
    headers: OnceCell<(String, String)>,
    canonical: OnceCell<String>,
}

impl<'a> CanonicalRequest<'a> {
    /// Create a canonical view over `req`.
    ///
    /// `content_hash` is the final line of the canonical request: a hex
    /// sha256 or one of the payload placeholders.
    pub fn new(
        req: &'a SigningRequest,
        content_hash: impl Into<String>,
        options: CanonicalOptions,
    ) -> Self {
        Self {
            req,
            content_hash: content_hash.into(),
            options,
            uri: OnceCell::new(),
            query: OnceCell::new(),
            headers: OnceCell::new(),
            canonical: OnceCell::new(),
        }
    }

    /// Content hash this request was built with.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Canonical uri.
    pub fn canonical_uri(&self) -> &str {
        self.uri.get_or_init(|| {
            let path = if self.options.normalize_path {
                normalize_path(&self.req.path)
            } else {
                self.req.path.clone()
            };
            let path = encode_path(&path);

            if self.options.double_url_encode {
                utf8_percent_encode(&path, &AWS_URI_ENCODE_SET).to_string()
            } else {
                path
            }
        })
    }

    /// Canonical query string.
    pub fn canonical_query_string(&self) -> &str {
        self.query.get_or_init(|| {
            let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (k, v) in &self.req.query {
                if k.is_empty() {
                    continue;
                }
                params
                    .entry(utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string())
                    .or_default()
                    .push(utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string());
            }

            let mut f = String::new();
            for (k, mut values) in params {
                values.sort();
                for v in values {
                    if !f.is_empty() {
                        f.push('&');
                    }
                    f.push_str(&k);
                    f.push('=');
                    f.push_str(&v);
                }
            }
            f
        })
    }

    /// Canonical headers, every line terminated by `\n`.
    pub fn canonical_headers(&self) -> Result<&str> {
        Ok(&self.headers()?.0)
    }

    /// Lower-cased header names joined by `;`.
    pub fn signed_headers(&self) -> Result<&str> {
        Ok(&self.headers()?.1)
    }

    /// The full canonical request.
    pub fn canonical_request(&self) -> Result<&str> {
        self.canonical
            .get_or_try_init(|| -> Result<String> {
                let mut f = String::with_capacity(256);
                writeln!(f, "{}", self.req.method)?;
                writeln!(f, "{}", self.canonical_uri())?;
                writeln!(f, "{}", self.canonical_query_string())?;
                writeln!(f, "{}", self.canonical_headers()?)?;
                writeln!(f, "{}", self.signed_headers()?)?;
                write!(f, "{}", self.content_hash)?;
                Ok(f)
            })
            .map(String::as_str)
    }

    fn headers(&self) -> Result<&(String, String)> {
        self.headers.get_or_try_init(|| -> Result<(String, String)> {
            let mut headers: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for (name, value) in self.req.headers.iter() {
                let name = name.as_str();
                if IGNORED_HEADERS.contains(&name) {
                    continue;
                }
                let value = value.to_str().map_err(|e| {
                    Error::request_invalid(format!("header {name} is not visible ascii"))
                        .with_source(e)
                })?;
                headers.entry(name).or_default().push(trim_all(value));
            }

            let mut canonical = String::new();
            for (name, values) in &headers {
                canonical.push_str(name);
                canonical.push(':');
                canonical.push_str(&values.join(","));
                canonical.push('\n');
            }
            let signed = headers.keys().copied().collect::<Vec<_>>().join(";");

            Ok((canonical, signed))
        })
    }
}

/// Trim a header value and collapse every inner run of whitespace into a
/// single space.
fn trim_all(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `.` and `..` segments and collapse empty ones.
///
/// A trailing slash is kept only if the input had one.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            v => segments.push(v),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Bring every segment of an already encoded path into AWS UriEncode form.
fn encode_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            let raw: Vec<u8> = percent_decode_str(segment).collect();
            percent_encode(&raw, &AWS_QUERY_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}
