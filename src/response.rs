//! The fixed response written to every connection.

/// Pre-rendered HTTP/1.1 response whose `Content-Length` always matches its body.
#[derive(Debug, Clone)]
pub struct Response {
    bytes: Vec<u8>,
    body_len: usize,
}

impl Response {
    pub fn new(body: &str) -> Self {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );

        let mut bytes = Vec::with_capacity(head.len() + body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(body.as_bytes());

        Self {
            bytes,
            body_len: body.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn body_len(&self) -> usize {
        self.body_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(response: &Response) -> (String, Vec<u8>) {
        let bytes = response.as_bytes();
        let end = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator");
        (
            String::from_utf8(bytes[..end].to_vec()).unwrap(),
            bytes[end + 4..].to_vec(),
        )
    }

    #[test]
    fn default_body_is_framed() {
        let response = Response::new("Hello world!");
        assert_eq!(
            response.as_bytes(),
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 12\r\nConnection: close\r\n\r\nHello world!"
        );
        assert_eq!(response.body_len(), 12);
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let response = Response::new("héllo ✓");
        let (head, body) = split(&response);

        assert_eq!(body.len(), "héllo ✓".len());
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
    }

    #[test]
    fn empty_body() {
        let response = Response::new("");
        let (head, body) = split(&response);

        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("Content-Length: 0"));
        assert!(body.is_empty());
    }
}
