//! aws-chunked payload framing.
//!
//! Signed chunks look like:
//!
//! ```text
//! <hex-length>;chunk-signature=<signature>\r\n<chunk-bytes>\r\n
//! ...
//! 0;chunk-signature=<signature>\r\n
//! <trailer-name>:<trailer-value>\r\n
//! x-amz-trailer-signature:<signature>\r\n
//! \r\n
//! ```
//!
//! Unsigned chunks drop the `;chunk-signature=` extension and the trailer
//! signature.

use std::io;
use std::io::Read;
use std::sync::Arc;

use sigv4_core::hash::{base64_encode, hex_sha256};
use sigv4_core::{ContentStreamProvider, PayloadReader};

use crate::constants::{
    AWS4_HMAC_SHA256_PAYLOAD, AWS4_HMAC_SHA256_TRAILER, EMPTY_SHA_256,
    SIGNED_CHUNK_EXTENSION_LEN, TRAILER_SIGNATURE_LINE_LEN, X_AMZ_TRAILER_SIGNATURE,
};
use crate::{ChecksumAlgorithm, ChecksumHasher, ChecksumStore, CredentialScope, RollingSigner};

/// A payload re-framed as aws-chunked.
///
/// Every call to `new_stream` reads the wrapped payload from the start and
/// restarts the signature chain from its seed, so a retried request can
/// simply ask for a new stream.
pub struct ChunkedPayload {
    payload: Arc<dyn ContentStreamProvider>,
    chunk_size: usize,
    signing: Option<(RollingSigner, CredentialScope)>,
    checksum: Option<(ChecksumAlgorithm, Option<ChecksumStore>)>,
    trailers: Vec<(String, String)>,
}

impl ChunkedPayload {
    /// Frame `payload` into unsigned chunks of `chunk_size` bytes.
    pub fn new(payload: Arc<dyn ContentStreamProvider>, chunk_size: usize) -> Self {
        Self {
            payload,
            chunk_size: chunk_size.max(1),
            signing: None,
            checksum: None,
            trailers: Vec::new(),
        }
    }

    /// Sign every chunk and the trailers, chaining from the signer's seed.
    pub fn with_signer(mut self, signer: RollingSigner, scope: CredentialScope) -> Self {
        self.signing = Some((signer, scope));
        self
    }

    /// Emit a checksum of the decoded payload as the last trailer.
    ///
    /// A value found in `store` is used as is, otherwise the checksum is
    /// computed while streaming and saved into `store`.
    pub fn with_checksum_trailer(
        mut self,
        algorithm: ChecksumAlgorithm,
        store: Option<ChecksumStore>,
    ) -> Self {
        self.checksum = Some((algorithm, store));
        self
    }

    /// Emit an extra trailer. Extra trailers keep the order they are added
    /// in and come before the checksum trailer.
    pub fn with_trailer(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.trailers.push((name.into(), value.into()));
        self
    }

    /// Does this payload end with any trailer?
    pub fn has_trailers(&self) -> bool {
        self.checksum.is_some() || !self.trailers.is_empty()
    }

    /// Length of the framed payload for a decoded payload of `decoded_length`
    /// bytes.
    pub fn encoded_length(&self, decoded_length: u64) -> u64 {
        self.framed_length(decoded_length, self.signing.is_some())
    }

    /// Like [`ChunkedPayload::encoded_length`], for a payload that will be
    /// signed once the seed signature is known.
    pub(crate) fn framed_length(&self, decoded_length: u64, signed: bool) -> u64 {
        let chunk_size = self.chunk_size as u64;
        let ext = if signed {
            SIGNED_CHUNK_EXTENSION_LEN
        } else {
            0
        };
        let chunk_len = |n: u64| format!("{n:x}").len() as u64 + ext + 2 + n + 2;

        let mut length = (decoded_length / chunk_size) * chunk_len(chunk_size);
        let remaining = decoded_length % chunk_size;
        if remaining > 0 {
            length += chunk_len(remaining);
        }
        // Final zero sized chunk.
        length += 1 + ext + 2;

        if let Some((algorithm, _)) = &self.checksum {
            length += trailer_line_len(&algorithm.header_name(), algorithm.encoded_size());
        }
        for (name, value) in &self.trailers {
            length += trailer_line_len(name, value.len());
        }
        if signed && self.has_trailers() {
            length += TRAILER_SIGNATURE_LINE_LEN;
        }

        length + 2
    }
}

/// Trailers as covered by the trailer signature: lower-cased names sorted
/// by name, one `name:value\n` per trailer.
fn canonical_trailers(lines: &[(String, String)]) -> String {
    let mut canonical: Vec<(String, &str)> = lines
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    canonical.sort_by(|a, b| a.0.cmp(&b.0));
    canonical
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn trailer_line_len(name: &str, value_len: usize) -> u64 {
    (name.len() + 1 + value_len + 2) as u64
}

impl ContentStreamProvider for ChunkedPayload {
    fn new_stream(&self) -> io::Result<PayloadReader> {
        let signing = self.signing.as_ref().map(|(signer, scope)| {
            let mut signer = signer.clone();
            signer.reset();
            ChunkSigning {
                signer,
                datetime: scope.datetime(),
                scope: scope.scope(),
            }
        });

        let checksum = match &self.checksum {
            None => None,
            Some((algorithm, store)) => {
                let cached = store.as_ref().and_then(|s| s.get(*algorithm));
                Some(TrailerChecksum {
                    algorithm: *algorithm,
                    store: store.clone(),
                    hasher: cached.is_none().then(|| algorithm.hasher()),
                    cached,
                })
            }
        };

        Ok(Box::new(ChunkedReader {
            inner: self.payload.new_stream()?,
            chunk_size: self.chunk_size,
            signing,
            checksum,
            trailers: self.trailers.clone(),
            buf: Vec::new(),
            pos: 0,
            finished: false,
        }))
    }
}

struct ChunkSigning {
    signer: RollingSigner,
    datetime: String,
    scope: String,
}

struct TrailerChecksum {
    algorithm: ChecksumAlgorithm,
    store: Option<ChecksumStore>,
    hasher: Option<ChecksumHasher>,
    cached: Option<Vec<u8>>,
}

impl TrailerChecksum {
    fn finish(&mut self) -> Vec<u8> {
        if let Some(v) = &self.cached {
            return v.clone();
        }
        let value = self
            .hasher
            .take()
            .map(ChecksumHasher::finalize)
            .unwrap_or_default();
        if let Some(store) = &self.store {
            store.put(self.algorithm, value.clone());
        }
        self.cached = Some(value.clone());
        value
    }
}

struct ChunkedReader {
    inner: PayloadReader,
    chunk_size: usize,
    signing: Option<ChunkSigning>,
    checksum: Option<TrailerChecksum>,
    trailers: Vec<(String, String)>,

    buf: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl ChunkedReader {
    /// Read up to one full chunk from the inner reader.
    fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        let mut chunk = vec![0; self.chunk_size];
        let mut filled = 0;
        while filled < chunk.len() {
            match self.inner.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        chunk.truncate(filled);
        Ok(chunk)
    }

    fn frame_chunk(&mut self, chunk: &[u8]) {
        self.buf.clear();
        self.pos = 0;

        self.buf.extend_from_slice(format!("{:x}", chunk.len()).as_bytes());
        if let Some(ChunkSigning {
            signer,
            datetime,
            scope,
        }) = &mut self.signing
        {
            let chunk_hash = hex_sha256(chunk);
            let signature = signer.sign(|prev| {
                format!(
                    "{AWS4_HMAC_SHA256_PAYLOAD}\n{datetime}\n{scope}\n{prev}\n{EMPTY_SHA_256}\n{chunk_hash}"
                )
            });
            self.buf.extend_from_slice(b";chunk-signature=");
            self.buf.extend_from_slice(signature.as_bytes());
        }
        self.buf.extend_from_slice(b"\r\n");
        if !chunk.is_empty() {
            self.buf.extend_from_slice(chunk);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    fn frame_trailers(&mut self) {
        let mut lines = std::mem::take(&mut self.trailers);
        if let Some(checksum) = &mut self.checksum {
            let value = base64_encode(&checksum.finish());
            lines.push((checksum.algorithm.header_name(), value));
        }

        for (name, value) in &lines {
            self.buf
                .extend_from_slice(format!("{name}:{value}\r\n").as_bytes());
        }

        if let Some(ChunkSigning {
            signer,
            datetime,
            scope,
        }) = &mut self.signing
        {
            if !lines.is_empty() {
                let trailer_hash = hex_sha256(canonical_trailers(&lines).as_bytes());
                let signature = signer.sign(|prev| {
                    format!("{AWS4_HMAC_SHA256_TRAILER}\n{datetime}\n{scope}\n{prev}\n{trailer_hash}")
                });
                self.buf.extend_from_slice(
                    format!("{X_AMZ_TRAILER_SIGNATURE}:{signature}\r\n").as_bytes(),
                );
            }
        }

        self.buf.extend_from_slice(b"\r\n");
    }

    fn fill(&mut self) -> io::Result<()> {
        let chunk = self.read_chunk()?;
        if let Some(checksum) = &mut self.checksum {
            if let Some(hasher) = &mut checksum.hasher {
                hasher.update(&chunk);
            }
        }

        self.frame_chunk(&chunk);
        if chunk.is_empty() {
            self.frame_trailers();
            self.finished = true;
        }
        Ok(())
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.buf.len() {
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }

        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SigningKey;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use sigv4_core::read_to_vec;

    const BODY: &str = r#"{"TableName": "foo"}"#;

    fn epoch_scope() -> CredentialScope {
        CredentialScope::new("us-east-1", "s3", Utc.timestamp_opt(0, 0).unwrap())
    }

    fn signed(chunk_size: usize) -> ChunkedPayload {
        ChunkedPayload::new(Arc::new(Bytes::from_static(BODY.as_bytes())), chunk_size)
            .with_signer(
                RollingSigner::new(SigningKey::from_bytes(b"key"), "sig"),
                epoch_scope(),
            )
    }

    const SIGNED_CHUNKS: &str = "4;chunk-signature=082f5b0e588893570e152b401a886161ee772ed066948f68c8f01aee11cca4f8\r\n{\"Ta\r\n\
4;chunk-signature=777b02ec61ce7934578b1efe6fbe08c21ae4a8cdf66a709d3b4fd320dddd2839\r\nbleN\r\n\
4;chunk-signature=84abdae650f64dee4d703d41c7d87c8bc251c22b8c493c75ce24431b60b73937\r\name\"\r\n\
4;chunk-signature=aff22ddad9d4388233fe9bc47e9c552a6e9ba9285af79555d2ce7fdaab726320\r\n: \"f\r\n\
4;chunk-signature=30e55f4e1c1fd444c06e9be42d9594b8fd7ead436bc67a58b5350ffd58b6aaa5\r\noo\"}\r\n\
0;chunk-signature=825ad80195cae47f54984835543ff2179c2c5a53c324059cd632e50259384ee3\r\n";

    #[test]
    fn test_signed_chunks() {
        let payload = signed(4);
        let framed = String::from_utf8(read_to_vec(&payload).unwrap()).unwrap();

        assert_eq!(framed, format!("{SIGNED_CHUNKS}\r\n"));
        assert_eq!(payload.encoded_length(20), framed.len() as u64);
    }

    #[test]
    fn test_signed_chunks_with_checksum_trailer() {
        let payload = signed(4).with_checksum_trailer(ChecksumAlgorithm::Crc32, None);
        let framed = String::from_utf8(read_to_vec(&payload).unwrap()).unwrap();

        assert_eq!(
            framed,
            format!(
                "{SIGNED_CHUNKS}x-amz-checksum-crc32:oL+a/g==\r\n\
x-amz-trailer-signature:23457d04f4a8e279780cb91e28d4fbd1c6a2dd678d419705461a80514cea206c\r\n\r\n"
            )
        );
        assert_eq!(payload.encoded_length(20), framed.len() as u64);
    }

    #[test]
    fn test_unsigned_chunks_with_trailers() {
        let payload = ChunkedPayload::new(Arc::new(Bytes::from_static(BODY.as_bytes())), 16)
            .with_checksum_trailer(ChecksumAlgorithm::Crc32, None)
            .with_trailer("x-amz-meta-a", "1,2");
        let framed = String::from_utf8(read_to_vec(&payload).unwrap()).unwrap();

        assert_eq!(
            framed,
            "10\r\n{\"TableName\": \"f\r\n4\r\noo\"}\r\n0\r\nx-amz-meta-a:1,2\r\nx-amz-checksum-crc32:oL+a/g==\r\n\r\n"
        );
        assert_eq!(payload.encoded_length(20), framed.len() as u64);
    }

    #[test]
    fn test_signed_trailers_keep_declared_order() {
        let payload = signed(4)
            .with_trailer("zzz", "123")
            .with_trailer("PreExistingHeader1", "someValue1")
            .with_trailer("x-amz-checksum-crc32", "a0bf9afe");
        let framed = String::from_utf8(read_to_vec(&payload).unwrap()).unwrap();

        assert_eq!(
            framed,
            format!(
                "{SIGNED_CHUNKS}zzz:123\r\n\
PreExistingHeader1:someValue1\r\n\
x-amz-checksum-crc32:a0bf9afe\r\n\
x-amz-trailer-signature:6df1f5fff22281fd2e64ed859b0242a2651d06ec3f772a9f36c6bc6a1e006a3d\r\n\r\n"
            )
        );
        assert_eq!(payload.encoded_length(20), framed.len() as u64);
    }

    #[test]
    fn test_signed_trailers_with_checksum_last() {
        let payload = signed(4)
            .with_trailer("zzz", "123")
            .with_trailer("PreExistingHeader1", "someValue1")
            .with_checksum_trailer(ChecksumAlgorithm::Crc32, None);
        let framed = String::from_utf8(read_to_vec(&payload).unwrap()).unwrap();

        assert_eq!(
            framed,
            format!(
                "{SIGNED_CHUNKS}zzz:123\r\n\
PreExistingHeader1:someValue1\r\n\
x-amz-checksum-crc32:oL+a/g==\r\n\
x-amz-trailer-signature:3f65ab57ede6a5fb7c77b14b35faf2d9dd2c6d89828bdae189a04f3677bc16f2\r\n\r\n"
            )
        );
        assert_eq!(payload.encoded_length(20), framed.len() as u64);
    }

    #[test]
    fn test_encoded_length_default_chunk_size() {
        let payload = signed(128 * 1024);
        assert_eq!(payload.encoded_length(20), 193);

        let payload = signed(128 * 1024).with_checksum_trailer(ChecksumAlgorithm::Crc32, None);
        assert_eq!(payload.encoded_length(20), 314);

        let payload = ChunkedPayload::new(Arc::new(Bytes::from_static(BODY.as_bytes())), 128 * 1024)
            .with_checksum_trailer(ChecksumAlgorithm::Crc32, None);
        assert_eq!(payload.encoded_length(20), 62);
        assert_eq!(read_to_vec(&payload).unwrap().len(), 62);
    }

    #[test]
    fn test_new_stream_restarts_chain() {
        let payload = signed(4);
        let first = read_to_vec(&payload).unwrap();
        let second = read_to_vec(&payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_checksum_store() {
        let store = ChecksumStore::new();
        let payload = ChunkedPayload::new(Arc::new(Bytes::from_static(BODY.as_bytes())), 8)
            .with_checksum_trailer(ChecksumAlgorithm::Crc32, Some(store.clone()));
        read_to_vec(&payload).unwrap();
        assert_eq!(
            store.get(ChecksumAlgorithm::Crc32),
            Some(ChecksumAlgorithm::Crc32.checksum(BODY.as_bytes()))
        );

        // A stored value wins over what the payload hashes to.
        let store = ChecksumStore::new();
        store.put(ChecksumAlgorithm::Crc32, vec![0, 0, 0, 1]);
        let payload = ChunkedPayload::new(Arc::new(Bytes::from_static(BODY.as_bytes())), 8)
            .with_checksum_trailer(ChecksumAlgorithm::Crc32, Some(store));
        let framed = String::from_utf8(read_to_vec(&payload).unwrap()).unwrap();
        assert!(framed.contains("x-amz-checksum-crc32:AAAAAQ==\r\n"));
    }

    #[test]
    fn test_empty_payload() {
        let payload = ChunkedPayload::new(Arc::new(Bytes::new()), 8);
        let framed = read_to_vec(&payload).unwrap();
        assert_eq!(framed, b"0\r\n\r\n");
        assert_eq!(payload.encoded_length(0), 5);
    }
}
