//! HTTP client capability implementation.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use futures::FutureExt;
use lyre_core::linkme::distributed_slice;
use lyre_core::{
    Bytes, HTTP_REQUEST_REGISTRY, HttpClientOptions, HttpRequest, HttpRequestFn, HttpResponse,
    TransportError, TransportResult,
};
use parking_lot::Mutex;
use reqwest::{Client, ClientBuilder, Method};
use tracing::debug;

/// The client for the most recently used options.
///
/// Options only change when the runtime is reconfigured, so one cached
/// client keeps connection pooling effective.
static CLIENT: LazyLock<Mutex<Option<(HttpClientOptions, Client)>>> =
    LazyLock::new(|| Mutex::new(None));

fn client(options: &HttpClientOptions) -> TransportResult<Client> {
    let mut cached = CLIENT.lock();
    if let Some((current, client)) = cached.as_ref()
        && current == options
    {
        return Ok(client.clone());
    }

    let client = ClientBuilder::new()
        .timeout(options.default_timeout)
        .user_agent(options.user_agent.clone())
        .build()
        .map_err(|e| TransportError::Io(e.to_string()))?;
    *cached = Some((options.clone(), client.clone()));
    Ok(client)
}

fn method(name: &str) -> TransportResult<Method> {
    if name.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(name.to_ascii_uppercase().as_bytes())
        .map_err(|_| TransportError::InvalidParams(format!("invalid method '{name}'")))
}

/// Performs one HTTP request.
///
/// Any answer from the server, including error statuses, is a successful
/// [`HttpResponse`]; only transport failures are errors.
///
/// This function is registered as the `HttpRequestFn` capability.
pub async fn http_request(
    request: HttpRequest,
    options: HttpClientOptions,
) -> TransportResult<HttpResponse> {
    if request.url.is_empty() {
        return Err(TransportError::InvalidParams("missing url".into()));
    }

    let client = client(&options)?;
    let timeout = request
        .timeout
        .map_or(options.default_timeout, Duration::from_millis);
    let mut builder = client
        .request(method(&request.method)?, &request.url)
        .timeout(timeout);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body.into_vec());
    }

    debug!(method = %request.method, url = %request.url, "Sending HTTP request");
    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            TransportError::Timeout(timeout.as_millis() as u64)
        } else if e.is_connect() {
            TransportError::ConnectionFailed {
                target: request.url.clone(),
                reason: e.to_string(),
            }
        } else {
            TransportError::Request(e.to_string())
        }
    })?;

    let status = response.status();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let data = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            TransportError::Timeout(timeout.as_millis() as u64)
        } else {
            TransportError::Io(e.to_string())
        }
    })?;

    debug!(url = %request.url, status = status.as_u16(), len = data.len(), "HTTP response received");
    Ok(HttpResponse {
        data: Bytes::from(&data[..]),
        headers,
        status: match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => status.as_u16().to_string(),
        },
        status_code: status.as_u16(),
    })
}

#[distributed_slice(HTTP_REQUEST_REGISTRY)]
#[linkme(crate = lyre_core::linkme)]
static HTTP_REQUEST: HttpRequestFn = |request, options| http_request(request, options).boxed();

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Accepts one connection, returns the raw request head and answers with `reply`.
    async fn one_shot_server(reply: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
            if !reply.is_empty() {
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            } else {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });
        (format!("http://{addr}/status"), rx)
    }

    #[tokio::test]
    async fn test_request_and_response() {
        let (url, head) = one_shot_server(
            "HTTP/1.1 201 Created\r\nContent-Length: 5\r\nX-Test: yes\r\nConnection: close\r\n\r\nhello",
        )
        .await;

        let request = HttpRequest {
            method: "delete".into(),
            ..HttpRequest::get(url)
        }
        .with_header("X-Token", "abc");
        let response = http_request(request, HttpClientOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status_code, 201);
        assert_eq!(response.status, "201 Created");
        assert_eq!(response.data.as_str(), Some("hello"));
        assert_eq!(response.headers.get("x-test").map(String::as_str), Some("yes"));

        let head = head.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("delete /status"));
        assert!(head.contains("x-token: abc"));
        assert!(head.contains("user-agent: lyre/"));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let (url, _head) = one_shot_server("").await;
        let err = http_request(
            HttpRequest::get(url).with_timeout(50),
            HttpClientOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(50)));
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let err = http_request(HttpRequest::default(), HttpClientOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidParams(_)));

        let request = HttpRequest {
            method: "NOT A METHOD".into(),
            ..HttpRequest::get("http://127.0.0.1:1/")
        };
        let err = http_request(request, HttpClientOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid method"));
    }
}
