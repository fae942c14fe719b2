use super::{init_signing_test, load_properties, send_signed_request};
use anyhow::Result;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use log::warn;
use sigv4_aws_v4::Config;

fn chunked_request(url: &str, name: &str) -> Result<Request<Bytes>> {
    // Three full chunks and a remainder at the minimum S3 chunk size.
    let body = Bytes::from(vec![b'x'; 3 * 8192 + 100]);
    Ok(Request::builder()
        .method(Method::PUT)
        .uri(format!("{url}/{name}"))
        .header(http::header::CONTENT_LENGTH, body.len())
        .body(body)?)
}

#[tokio::test]
async fn test_put_object_signed_chunks() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| Config {
        chunk_encoding: Some(true),
        chunk_size: Some(8192),
        ..cfg
    })?;

    let req = chunked_request(&url, "put_object_signed_chunks_test")?;
    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object_signed_chunks_with_checksum_trailer() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    let props = load_properties(|cfg| Config {
        chunk_encoding: Some(true),
        chunk_size: Some(8192),
        checksum_algorithm: Some("crc32".to_string()),
        ..cfg
    })?;

    let req = chunked_request(&url, "put_object_signed_chunks_trailer_test")?;
    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object_unsigned_chunks_with_checksum_trailer() -> Result<()> {
    let Some((signer, url)) = init_signing_test() else {
        warn!("SIGV4_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };
    if !url.starts_with("https") {
        warn!("unsigned payloads need https, skipped");
        return Ok(());
    }
    let props = load_properties(|cfg| Config {
        chunk_encoding: Some(true),
        payload_signing: Some(false),
        checksum_algorithm: Some("sha256".to_string()),
        ..cfg
    })?;

    let req = chunked_request(&url, "put_object_unsigned_chunks_trailer_test")?;
    let (status, _body) = send_signed_request(&signer, req, &props).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}
