//! HTTP/2 client used by channels to POST to the paired peer.
//!
//! Built on `reqwest` with `http2_prior_knowledge()`, matching the
//! source's h2-only client (no HTTP/1.1 fallback is ever attempted
//! against another instance of this service).

use link_core::transport::{Transport, TransportError};
use link_wire::{CONSUMER_SEQ_HEADER, ID_HEADER, TARGET_HEADER};

pub struct HttpTransport {
    client: reqwest::Client,
    remote: String,
    id: String,
    target: String,
}

impl HttpTransport {
    pub fn new(
        remote: impl Into<String>,
        id: impl Into<String>,
        target: impl Into<String>,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().http2_prior_knowledge().build()?;
        Ok(Self {
            client,
            remote: remote.into(),
            id: id.into(),
            target: target.into(),
        })
    }
}

impl Transport for HttpTransport {
    async fn post_message(
        &self,
        channel: &str,
        seq: u64,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        let url = format!("{}{}", self.remote, link_wire::post_path(channel));
        let response = self
            .client
            .post(url)
            .header(ID_HEADER, &self.id)
            .header(TARGET_HEADER, &self.target)
            .header(CONSUMER_SEQ_HEADER, seq.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                channel: channel.to_owned(),
                message: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                channel: channel.to_owned(),
                status: response.status().as_u16(),
            })
        }
    }

    async fn post_sync(&self, channel: &str) -> Result<(), TransportError> {
        let url = format!("{}{}", self.remote, link_wire::sync_path(channel));
        let response = self
            .client
            .post(url)
            .header(ID_HEADER, &self.id)
            .header(TARGET_HEADER, &self.target)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                channel: channel.to_owned(),
                message: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                channel: channel.to_owned(),
                status: response.status().as_u16(),
            })
        }
    }
}
