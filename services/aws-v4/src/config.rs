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

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::Deserialize;
use sigv4_core::{Error, Result};

use crate::constants::{AWS_ACCESS_KEY_ID, AWS_REGION, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN};
use crate::{AuthLocation, Credential, SigningClock, SigningProperties};

/// Config carries the signing settings as a loosely typed property bag.
///
/// Every field is optional. Use [`Config::into_properties`] to turn it into
/// validated [`SigningProperties`].
#[derive(Clone, Default, Deserialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(default)]
pub struct Config {
    /// `access_key_id` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_ACCESS_KEY_ID`]
    pub access_key_id: Option<String>,
    /// `secret_access_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_SECRET_ACCESS_KEY`]
    pub secret_access_key: Option<String>,
    /// `session_token` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_SESSION_TOKEN`]
    pub session_token: Option<String>,
    /// Account id of the credential, only used for diagnostics.
    pub account_id: Option<String>,
    /// `region` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_REGION`]
    pub region: Option<String>,
    /// Service signing name, e.g. `s3`.
    pub service: Option<String>,
    /// See [`SigningPropertiesBuilder::double_url_encode`](crate::SigningPropertiesBuilder::double_url_encode).
    pub double_url_encode: Option<bool>,
    /// See [`SigningPropertiesBuilder::normalize_path`](crate::SigningPropertiesBuilder::normalize_path).
    pub normalize_path: Option<bool>,
    /// Flexible checksum algorithm name, e.g. `crc32`.
    pub checksum_algorithm: Option<String>,
    /// Presign expiration in seconds.
    pub expiration: Option<u64>,
    /// `header` or `query_string`.
    pub auth_location: Option<String>,
    /// Sign the payload hash, enabled by default.
    pub payload_signing: Option<bool>,
    /// Send the payload with aws-chunked framing.
    pub chunk_encoding: Option<bool>,
    /// Chunk size in bytes.
    pub chunk_size: Option<usize>,
    /// The payload is an event stream.
    pub event_streaming: Option<bool>,
    /// Comma separated SigV4A region set, e.g. `us-east-1,us-west-2`.
    pub region_set: Option<String>,
}

impl Config {
    /// Load config from env, keeping values that are already set.
    pub fn from_env(mut self) -> Self {
        let envs = env::vars().collect::<HashMap<_, _>>();

        if let Some(v) = envs.get(AWS_ACCESS_KEY_ID) {
            self.access_key_id.get_or_insert(v.clone());
        }
        if let Some(v) = envs.get(AWS_SECRET_ACCESS_KEY) {
            self.secret_access_key.get_or_insert(v.clone());
        }
        if let Some(v) = envs.get(AWS_SESSION_TOKEN) {
            self.session_token.get_or_insert(v.clone());
        }
        if let Some(v) = envs.get(AWS_REGION) {
            self.region.get_or_insert(v.clone());
        }

        self
    }

    /// Validate this config into signing properties.
    ///
    /// Without any key the credential is anonymous. Setting only one of
    /// the two keys is an error.
    pub fn into_properties(self, clock: SigningClock) -> Result<SigningProperties> {
        let mut credential = match (self.access_key_id, self.secret_access_key) {
            (Some(ak), Some(sk)) => Credential::new(ak, sk),
            (None, None) => Credential::anonymous(),
            _ => {
                return Err(Error::config_invalid(
                    "access_key_id and secret_access_key must be set together",
                ))
            }
        };
        if let Some(token) = self.session_token {
            credential = credential.with_session_token(token);
        }
        if let Some(account_id) = self.account_id {
            credential = credential.with_account_id(account_id);
        }

        let mut builder = SigningProperties::builder()
            .credential(credential)
            .clock(clock)
            .chunk_encoding(self.chunk_encoding.unwrap_or_default())
            .event_streaming(self.event_streaming.unwrap_or_default());
        if let Some(v) = self.region {
            builder = builder.region(v);
        }
        if let Some(v) = self.service {
            builder = builder.service(v);
        }
        if let Some(v) = self.double_url_encode {
            builder = builder.double_url_encode(v);
        }
        if let Some(v) = self.normalize_path {
            builder = builder.normalize_path(v);
        }
        if let Some(v) = self.checksum_algorithm {
            builder = builder.checksum_algorithm(v.parse()?);
        }
        if let Some(v) = self.expiration {
            builder = builder.expiration(Duration::from_secs(v));
        }
        if let Some(v) = self.auth_location {
            builder = builder.auth_location(v.parse::<AuthLocation>()?);
        }
        if let Some(v) = self.payload_signing {
            builder = builder.payload_signing(v);
        }
        if let Some(v) = self.chunk_size {
            builder = builder.chunk_size(v);
        }
        if let Some(v) = self.region_set {
            builder = builder.region_set(v.split(','));
        }

        builder.build()
    }
}
