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

use super::{init_signing_test, load_properties};
use anyhow::Result;
use http::{Method, Request, StatusCode};
use log::{debug, warn};
use reqwest::Client;
use sigv4_aws_v4::{Config, SignRequest};

#[tokio::test]
async fn test_get_object_with_presigned_url() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| Config {
        expiration: Some(3600),
        ..cfg
    })?;

    let (mut parts, _) = Request::builder()
        .method(Method::GET)
        .uri(format!("{url}/not_exist_file"))
        .body(())?
        .into_parts();
    signer
        .sign(&mut parts, None, &props)
        .expect("sign request must succeed");

    // A presigned url works without any extra header.
    let presigned = parts.uri.to_string();
    debug!("presigned url: {presigned}");
    assert!(presigned.contains("X-Amz-Signature="));
    assert!(parts.headers.get(http::header::AUTHORIZATION).is_none());

    let resp = Client::new().get(presigned).send().await?;
    debug!("got response: {resp:?}");
    assert_eq!(StatusCode::NOT_FOUND, resp.status());
    Ok(())
}
