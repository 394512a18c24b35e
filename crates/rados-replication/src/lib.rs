//! The replication client: synchronous PUT/DELETE fanout to peer nodes.

use rados_core::ContentHash;
use reqwest::{Client, StatusCode};

/// Talks to peer nodes' cluster-internal endpoints on behalf of a primary.
pub struct ReplicationClient {
    client: Client,
    cluster_bearer_token: Option<String>,
}

impl ReplicationClient {
    pub fn new(cluster_bearer_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            cluster_bearer_token,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.cluster_bearer_token {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }

    /// Replicate `content` to every host in `peers`, sequentially, stopping at the
    /// first failure. On failure, compensates by deleting the object from *all*
    /// peers (including ones not yet attempted), then returns the original error.
    pub async fn replicate(
        &self,
        key: &ContentHash,
        content: &[u8],
        peers: &[String],
    ) -> Result<(), String> {
        for host in peers {
            if let Err(err) = self.replicate_to_host(key, content, host).await {
                tracing::error!(
                    object_hash = %key,
                    error = %err,
                    "failed to replicate object; deleting created replicas from all hosts",
                );
                if let Err(delete_err) = self.delete(key, peers).await {
                    return Err(format!(
                        "replicate to {host}: {err}; additionally failed to delete replicas after \
                         failed replication attempt: {delete_err}"
                    ));
                }
                return Err(format!("replicate to {host}: {err}"));
            }
        }

        Ok(())
    }

    async fn replicate_to_host(
        &self,
        key: &ContentHash,
        content: &[u8],
        host: &str,
    ) -> Result<(), String> {
        let url = build_url(key, host);
        let part = reqwest::multipart::Part::bytes(content.to_vec()).file_name("");
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self.authorize(self.client.put(&url)).multipart(form);
        let response = request
            .send()
            .await
            .map_err(|err| format!("PUT {url}: {err}"))?;

        if response.status() != StatusCode::OK {
            return Err(format!(
                "PUT {url} yielded unexpected http status code {}",
                response.status()
            ));
        }

        Ok(())
    }

    /// Delete the object from every host in `peers`. Does not abort on first
    /// failure; collects and aggregates errors. A 404 from a peer is not an error
    /// here — delete is idempotent.
    pub async fn delete(&self, key: &ContentHash, peers: &[String]) -> Result<(), String> {
        let mut errors = Vec::new();

        for host in peers {
            if let Err(err) = self.delete_from_host(key, host).await {
                errors.push(format!("delete replica from host {host}: {err}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    async fn delete_from_host(&self, key: &ContentHash, host: &str) -> Result<(), String> {
        let url = build_url(key, host);
        let request = self.authorize(self.client.delete(&url));
        let response = request
            .send()
            .await
            .map_err(|err| format!("perform DELETE request to url {url}: {err}"))?;

        match response.status() {
            StatusCode::OK | StatusCode::NOT_FOUND => Ok(()),
            status => Err(format!(
                "requested DELETE {url}, server responded with unexpected status code {status}"
            )),
        }
    }
}

fn build_url(key: &ContentHash, host: &str) -> String {
    format!("http://{host}/internal/{key}")
}
