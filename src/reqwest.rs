//! [`Connect`] over [`reqwest`]

use futures_core::future::BoxFuture;
use futures_util::TryStreamExt;
use http_body_util::BodyDataStream;
use reqwest::{
    Body, Client, Proxy, RequestBuilder, Response,
    header::{CONTENT_ENCODING, CONTENT_TYPE},
};
use url::Url;

use crate::{
    config::{Method, StreamConfig},
    decoder::Decoder,
    item_stream::ItemStream,
    session::StreamSession,
    status::ContentEncoding,
    transport::{Connect, Headers, StreamResponse, TransportError},
};

/// Sends the configured request with a [`Client`] built once per session
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    client: Client,
}

impl ReqwestConnector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client with the proxy, user agent and timeouts from `config`.
    ///
    /// The timeout is applied to connecting and to every read, so a connection that goes quiet for longer than that
    /// fails with a transport error.
    pub fn from_config(config: &StreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());

        if let Some(proxy) = &config.proxy {
            let mut reqwest_proxy = Proxy::all(proxy.uri())?;
            if let Some(credentials) = &proxy.credentials {
                reqwest_proxy = reqwest_proxy.basic_auth(&credentials.username, &credentials.password);
            }
            builder = builder.proxy(reqwest_proxy);
        }

        if let Some(timeout) = config.timeout() {
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }

        Ok(Self::new(builder.build()?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn request(&self, config: &StreamConfig) -> Result<RequestBuilder, TransportError> {
        let mut url = Url::parse(&config.url()).map_err(TransportError::new)?;

        let mut request = match config.method {
            Method::Get => {
                if !config.params.is_empty() {
                    url.query_pairs_mut().extend_pairs(&config.params);
                }
                self.client.get(url)
            }
            Method::Post => {
                let form = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&config.params)
                    .finish();
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(form)
            }
        };

        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(credentials) = &config.basic_auth {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        Ok(request)
    }
}

impl Connect for ReqwestConnector {
    fn connect(&self, config: &StreamConfig) -> BoxFuture<'static, Result<StreamResponse, TransportError>> {
        let request = self.request(config);
        Box::pin(async move {
            let response = request?.send().await.map_err(TransportError::new)?;
            tracing::debug!(status = response.status().as_u16(), "response headers received");
            Ok(into_stream_response(response))
        })
    }
}

fn response_headers(response: &Response) -> Headers {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
        .collect()
}

fn into_stream_response(response: Response) -> StreamResponse {
    let status = response.status().as_u16();
    let headers = response_headers(&response);
    let body = BodyDataStream::new(Body::from(response)).map_err(TransportError::new);
    StreamResponse::new(status, headers, Box::pin(body))
}

impl StreamSession<ReqwestConnector> {
    /// Session over a [`ReqwestConnector`] built from `config`
    pub fn from_config(config: StreamConfig) -> Result<Self, reqwest::Error> {
        let connector = ReqwestConnector::from_config(&config)?;
        Ok(Self::new(connector, config))
    }
}

/// Reads items out of a single [`Response`] with no reconnecting, decompressing it when the server says it is gzip
pub fn response_to_stream(response: Response) -> ItemStream<BodyDataStream<Body>> {
    let encoding = ContentEncoding::from_header(
        response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok()),
    );
    ItemStream::with_decoder(
        BodyDataStream::new(Body::from(response)),
        Decoder::for_encoding(encoding),
    )
}
