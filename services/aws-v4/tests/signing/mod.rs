mod chunked;
mod presigned;
mod special_chars;
mod standard;

use std::env;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use http::{Request, StatusCode};
use log::debug;
use reqwest::Client;
use sigv4_aws_v4::{
    Config, RequestSigner, SignRequest, SigningClock, SigningKeyCache, SigningProperties,
};
use sigv4_core::read_to_vec;

/// Load signing config from environment variables.
pub fn load_config() -> Config {
    Config {
        access_key_id: Some(
            env::var("SIGV4_AWS_V4_ACCESS_KEY").expect("SIGV4_AWS_V4_ACCESS_KEY must be set"),
        ),
        secret_access_key: Some(
            env::var("SIGV4_AWS_V4_SECRET_KEY").expect("SIGV4_AWS_V4_SECRET_KEY must be set"),
        ),
        session_token: env::var("SIGV4_AWS_V4_SESSION_TOKEN").ok(),
        region: Some(env::var("SIGV4_AWS_V4_REGION").expect("SIGV4_AWS_V4_REGION must be set")),
        service: Some(env::var("SIGV4_AWS_V4_SERVICE").unwrap_or_else(|_| "s3".to_string())),
        ..Default::default()
    }
}

/// Initialize test environment
pub fn init_signing_test() -> Option<(RequestSigner, String)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("SIGV4_AWS_V4_TEST").is_err() || env::var("SIGV4_AWS_V4_TEST").unwrap() != "on" {
        return None;
    }

    let url = env::var("SIGV4_AWS_V4_URL").expect("SIGV4_AWS_V4_URL must be set");
    let signer = RequestSigner::new().with_key_cache(Arc::new(SigningKeyCache::default()));

    Some((signer, url))
}

/// Build signing properties from env, letting the caller adjust the config.
pub fn load_properties(f: impl FnOnce(Config) -> Config) -> Result<SigningProperties> {
    Ok(f(load_config()).into_properties(SigningClock::System)?)
}

/// Sign request, send it and return the response.
pub async fn send_signed_request(
    signer: &RequestSigner,
    req: Request<Bytes>,
    props: &SigningProperties,
) -> Result<(StatusCode, String)> {
    let (mut parts, body) = req.into_parts();
    let signed = signer
        .sign(&mut parts, Some(Arc::new(body)), props)
        .expect("sign request must succeed");
    let body = match signed.payload {
        Some(payload) => read_to_vec(&*payload)?,
        None => Vec::new(),
    };
    let req = Request::from_parts(parts, body);

    debug!("signed request: {req:?}");

    let client = Client::new();
    let resp = client.execute(req.try_into()?).await?;

    let status = resp.status();
    let body = resp.text().await?;

    debug!("response status: {status}, body: {body}");
    Ok((status, body))
}
