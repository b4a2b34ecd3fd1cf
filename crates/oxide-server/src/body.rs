//! Size-limited request body reading.

use http_body_util::BodyExt;
use hyper::body::{Body, Buf};
use hyper::header::{HeaderMap, CONTENT_LENGTH};

/// Outcome of reading a request body.
#[derive(Debug, PartialEq, Eq)]
pub enum BodyRead {
    /// The whole body, within the limit.
    Complete(Vec<u8>),
    /// The body went past the limit; reading stopped there.
    Overflowed,
}

/// Whether the declared `Content-Length` is already over `limit`.
pub fn declared_too_large(headers: &HeaderMap, limit: usize) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<usize>().ok())
        .is_some_and(|length| length > limit)
}

/// Reads `body` frame by frame, giving up as soon as more than `limit`
/// bytes have arrived.
pub async fn read_limited<B>(mut body: B, limit: usize) -> Result<BodyRead, B::Error>
where
    B: Body + Unpin,
{
    let mut buf = Vec::new();

    while let Some(frame) = body.frame().await {
        let Ok(mut data) = frame?.into_data() else {
            continue;
        };

        if buf.len() + data.remaining() > limit {
            return Ok(BodyRead::Overflowed);
        }

        while data.has_remaining() {
            let chunk = data.chunk();
            let len = chunk.len();
            buf.extend_from_slice(chunk);
            data.advance(len);
        }
    }

    Ok(BodyRead::Complete(buf))
}

#[cfg(test)]
mod tests {
    use http_body_util::{Empty, Full};
    use hyper::body::Bytes;
    use hyper::header::HeaderValue;

    use super::*;

    #[tokio::test]
    async fn test_reads_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"hello"));
        assert_eq!(
            read_limited(body, 5).await.unwrap(),
            BodyRead::Complete(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn test_stops_past_limit() {
        let body = Full::new(Bytes::from_static(b"hello world"));
        assert_eq!(read_limited(body, 5).await.unwrap(), BodyRead::Overflowed);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let body = Empty::<Bytes>::new();
        assert_eq!(
            read_limited(body, 0).await.unwrap(),
            BodyRead::Complete(Vec::new())
        );
    }

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert!(!declared_too_large(&headers, 10));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("10"));
        assert!(!declared_too_large(&headers, 10));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("11"));
        assert!(declared_too_large(&headers, 10));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("bogus"));
        assert!(!declared_too_large(&headers, 10));
    }
}
