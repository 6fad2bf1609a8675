use crate::configuration::options::ExecutionOptions;
use crate::connection::{Request, Response, Transport};
use crate::error::TransportError;
use futures::future::BoxFuture;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use hyper_tls::HttpsConnector;
use std::collections::BTreeMap;
use std::time::Instant;

/// HTTP(S) transport backed by a pooled hyper client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: Request,
        options: &ExecutionOptions,
    ) -> BoxFuture<'static, Result<Response, TransportError>> {
        let client = self.client.clone();
        let timeout = request.timeout().unwrap_or(options.request_timeout);
        Box::pin(async move {
            let url = request.url().unwrap_or_default().to_owned();
            let uri: Uri = url
                .parse()
                .map_err(|_| TransportError::InvalidUrl(url.clone()))?;
            let mut builder = hyper::Request::builder()
                .method(request.method().clone())
                .uri(uri);
            for (name, value) in request.headers() {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let body = request.body().cloned().map(Body::from).unwrap_or_else(Body::empty);
            let prepared = builder.body(body)?;

            trace!("Sending {} {}", request.method(), url);
            let now = Instant::now();
            let exchange = async {
                let response = client.request(prepared).await?;
                let status = response.status().as_u16();
                let mut headers = BTreeMap::new();
                for (name, value) in response.headers() {
                    headers.insert(
                        name.as_str().to_owned(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    );
                }
                let body = to_bytes(response.into_body()).await?;
                Ok::<_, TransportError>((status, headers, body))
            };
            let (status, headers, body) = match tokio::time::timeout(timeout, exchange).await {
                Ok(exchange) => exchange?,
                Err(_) => return Err(TransportError::Timeout(timeout.as_millis())),
            };
            let elapsed = now.elapsed();
            debug!(
                "Received {} from {} in {} ms",
                status,
                url,
                elapsed.as_millis()
            );
            Ok(Response::new(status, headers, body).with_elapsed(elapsed))
        })
    }
}

#[cfg(test)]
mod test {
    use super::HttpTransport;
    use crate::configuration::options::ExecutionOptions;
    use crate::connection::{Request, Transport};
    use crate::error::TransportError;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let transport = HttpTransport::new();
        let result = transport
            .send(Request::get("not a url"), &ExecutionOptions::default())
            .await;
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_slow_body_is_bounded_by_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 1024];
            let _ = socket.read(&mut buffer).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nab")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let request = Request::get(format!("http://{}/slow", address))
            .with_timeout(Duration::from_millis(200));
        let result = HttpTransport::new()
            .send(request, &ExecutionOptions::default())
            .await;
        assert!(matches!(result, Err(TransportError::Timeout(200))));
    }
}
