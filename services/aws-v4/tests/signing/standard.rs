use super::{init_signing_test, load_properties, send_signed_request};
use anyhow::Result;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use log::warn;
use sigv4_aws_v4::Config;

#[tokio::test]
async fn test_head_object() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| cfg)?;

    let req = Request::builder()
        .method(Method::HEAD)
        .uri(format!("{url}/not_exist_file"))
        .body(Bytes::new())?;

    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| cfg)?;

    let body = Bytes::from_static(b"Hello, World!");
    let req = Request::builder()
        .method(Method::PUT)
        .uri(format!("{url}/put_object_test"))
        .header(http::header::CONTENT_LENGTH, body.len())
        .body(body)?;

    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object_with_flexible_checksum() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| Config {
        checksum_algorithm: Some("crc32c".to_string()),
        ..cfg
    })?;

    let body = Bytes::from_static(b"Hello, World!");
    let req = Request::builder()
        .method(Method::PUT)
        .uri(format!("{url}/put_object_flexible_checksum_test"))
        .header(http::header::CONTENT_LENGTH, body.len())
        .body(body)?;

    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_list_bucket() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| cfg)?;

    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("{url}?list-type=2&delimiter=/&encoding-type=url"))
        .body(Bytes::new())?;

    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}
