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

use sigv4_core::utils::Redact;
use std::fmt::{Debug, Formatter};

/// Credential that holds the access_key and secret_key.
///
/// The signer treats credentials as read-only: the same value may be shared
/// by concurrent sign operations.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Access key id for aws services.
    pub access_key_id: String,
    /// Secret access key for aws services.
    pub secret_access_key: String,
    /// Session token for aws services.
    pub session_token: Option<String>,
    /// Account id the credential belongs to.
    pub account_id: Option<String>,
    /// Name of the provider that resolved this credential.
    ///
    /// Only used for diagnostics.
    pub provider_name: Option<String>,
}

impl Credential {
    /// Create a credential from an access key pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            ..Default::default()
        }
    }

    /// Attach a session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Attach an account id.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Attach the name of the provider that resolved this credential.
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Credential that signals "do not sign".
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Requests signed with anonymous credentials are sent unchanged.
    pub fn is_anonymous(&self) -> bool {
        self.access_key_id.is_empty() && self.secret_access_key.is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("account_id", &self.account_id)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}
