use std::sync::Arc;
use std::time::Duration;

use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::chat::{ModelError, ModelResult};

type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

fn build_https_client() -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    // Pooled connections are bound to the runtime that opened them, and callers
    // may alternate between their own runtime and a blocking one.
    Client::builder()
        .pool_max_idle_per_host(0)
        .build::<_, Body>(HttpsConnector::from((http, Arc::new(config))))
}

/// A bearer-authenticated endpoint accepting and returning JSON.
pub(crate) struct JsonEndpoint {
    client: HyperClient,
    uri: Uri,
    api_key: String,
    timeout: Duration,
}

impl JsonEndpoint {
    pub(crate) fn new(uri: Uri, api_key: String, timeout: Duration) -> Self {
        Self {
            client: build_https_client(),
            uri,
            api_key,
            timeout,
        }
    }

    pub(crate) fn uri(&self) -> &Uri {
        &self.uri
    }

    /// POSTs `body` and decodes the response; `operation` labels errors.
    pub(crate) async fn post<B, R>(&self, operation: &'static str, body: &B) -> ModelResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let transport = |reason: String| ModelError::Transport { operation, reason };

        let payload = serde_json::to_vec(body)
            .map_err(|err| transport(format!("request encoding failed: {err}")))?;
        let request = Request::post(self.uri.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Body::from(payload))
            .map_err(|err| transport(format!("request could not be built: {err}")))?;

        // The deadline covers the whole exchange, body included.
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|err| transport(err.to_string()))?;
            let status = response.status();
            let bytes = to_bytes(response.into_body())
                .await
                .map_err(|err| transport(format!("response body interrupted: {err}")))?;
            Ok::<_, ModelError>((status, bytes))
        };
        let (status, bytes) = timeout(self.timeout, exchange)
            .await
            .map_err(|_| transport(format!("no complete response within {:?}", self.timeout)))??;

        if !status.is_success() {
            return Err(ModelError::Status {
                operation,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| ModelError::Decode {
            operation,
            reason: err.to_string(),
        })
    }
}
