// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

// Algorithms and scope terminator.
pub const AWS4_HMAC_SHA256: &str = "AWS4-HMAC-SHA256";
pub const AWS4_HMAC_SHA256_PAYLOAD: &str = "AWS4-HMAC-SHA256-PAYLOAD";
pub const AWS4_HMAC_SHA256_TRAILER: &str = "AWS4-HMAC-SHA256-TRAILER";
pub const AWS4_REQUEST: &str = "aws4_request";

// Headers used in aws services.
pub const X_AMZ_CONTENT_SHA_256: &str = "x-amz-content-sha256";
pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
pub const X_AMZ_DECODED_CONTENT_LENGTH: &str = "x-amz-decoded-content-length";
pub const X_AMZ_TRAILER: &str = "x-amz-trailer";
pub const X_AMZ_TRAILER_SIGNATURE: &str = "x-amz-trailer-signature";
pub const X_AMZ_CHECKSUM_PREFIX: &str = "x-amz-checksum-";
pub const AWS_CHUNKED: &str = "aws-chunked";

// Query parameters used by query string signing.
pub const X_AMZ_ALGORITHM_QUERY: &str = "X-Amz-Algorithm";
pub const X_AMZ_CREDENTIAL_QUERY: &str = "X-Amz-Credential";
pub const X_AMZ_DATE_QUERY: &str = "X-Amz-Date";
pub const X_AMZ_EXPIRES_QUERY: &str = "X-Amz-Expires";
pub const X_AMZ_SIGNED_HEADERS_QUERY: &str = "X-Amz-SignedHeaders";
pub const X_AMZ_SECURITY_TOKEN_QUERY: &str = "X-Amz-Security-Token";
pub const X_AMZ_SIGNATURE_QUERY: &str = "X-Amz-Signature";

// Content hash placeholders.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
pub const STREAMING_UNSIGNED_PAYLOAD_TRAILER: &str = "STREAMING-UNSIGNED-PAYLOAD-TRAILER";
pub const STREAMING_AWS4_HMAC_SHA256_PAYLOAD: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";
pub const STREAMING_AWS4_HMAC_SHA256_PAYLOAD_TRAILER: &str =
    "STREAMING-AWS4-HMAC-SHA256-PAYLOAD-TRAILER";
pub const STREAMING_AWS4_HMAC_SHA256_EVENTS: &str = "STREAMING-AWS4-HMAC-SHA256-EVENTS";

/// Hex encoded sha256 of empty input.
pub const EMPTY_SHA_256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Headers that never take part in the signature, compared lower-cased.
pub const IGNORED_HEADERS: [&str; 4] = ["connection", "x-amzn-trace-id", "user-agent", "expect"];

/// Presigned URLs may live for 7 days at most.
pub const PRESIGN_MAX_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Default size of a single aws-chunked frame: 128 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Each frame is buffered in memory, so frames are capped at 16 MiB.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// `;chunk-signature=` followed by a hex encoded sha256 signature.
pub const SIGNED_CHUNK_EXTENSION_LEN: u64 = 17 + 64;

/// `x-amz-trailer-signature:` followed by a signature and CRLF.
pub const TRAILER_SIGNATURE_LINE_LEN: u64 = 24 + 64 + 2;

// Env values used to load config.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";

/// AsciiSet for [AWS UriEncode](https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html)
///
/// Used on paths: slashes are kept as is.
pub static AWS_URI_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// AsciiSet for [AWS UriEncode](https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html)
///
/// But used in query.
pub static AWS_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
