//! Megaport API v2 client
//!
//! Covers what the sync and metric commands need: client-credentials login,
//! MCR prefix lists, the product catalog and bandwidth telemetry.

mod models;

pub use models::{CspConnection, LocationDetail, Product, TelemetrySeries, Vxc, VxcEnd, VxcResources};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::reconcile::{AddressFamily, PrefixListStore, PrefixSet, RemoteId, RemotePrefixList};
use models::{DataResponse, PrefixListDetail, PrefixListEntry, PrefixListUpdate, TokenResponse};

/// OAuth2 client credentials for the Megaport machine-to-machine API
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

// Keep the secret out of debug logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

pub struct MegaportClient {
    client: Client,
    api_url: String,
}

impl MegaportClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange client credentials for a bearer token
    pub async fn login(self, token_url: &str, credentials: &Credentials) -> Result<MegaportSession> {
        let response = self
            .client
            .post(token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|err| Error::Auth(format!("{}: {}", token_url, err)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("{}: {} {}", token_url, status, body)));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| Error::Auth(format!("{}: {}", token_url, err)))?;
        info!("Got Megaport token for {}", credentials.client_id);
        Ok(MegaportSession {
            client: self.client,
            api_url: self.api_url,
            token: token.access_token,
        })
    }
}

/// An authenticated Megaport API session
pub struct MegaportSession {
    client: Client,
    api_url: String,
    token: String,
}

impl MegaportSession {
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| Error::read(&url, err))?;
        let response = check_read(&url, response).await?;
        let body: DataResponse<T> = response.json().await.map_err(|err| Error::read(&url, err))?;
        Ok(body.data)
    }

    /// Prefix lists of a single MCR
    pub fn mcr(&self, mcr_id: &str) -> McrPrefixLists<'_> {
        McrPrefixLists {
            session: self,
            mcr_id: mcr_id.to_string(),
        }
    }

    pub async fn products(&self, live_only: bool) -> Result<Vec<Product>> {
        let path = if live_only {
            "/products?provisioningStatus=LIVE"
        } else {
            "/products"
        };
        let products: Vec<Product> = self.get(path).await?;
        info!("Got {} Megaport products", products.len());
        Ok(products)
    }

    /// Bits in/out telemetry for an MCR between `from` and `to`
    pub async fn telemetry(
        &self,
        product_uid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TelemetrySeries>> {
        let path = format!(
            "/product/mcr2/{}/telemetry?type=BITS&from={}&to={}",
            product_uid,
            from.timestamp_millis(),
            to.timestamp_millis()
        );
        self.get(&path).await
    }
}

async fn check_read(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::read(url, format!("{} {}", status, body)))
}

pub struct McrPrefixLists<'a> {
    session: &'a MegaportSession,
    mcr_id: String,
}

impl<'a> McrPrefixLists<'a> {
    fn list_path(&self, id: &RemoteId) -> String {
        format!("/product/mcr2/{}/prefixList/{}", self.mcr_id, id)
    }
}

#[async_trait]
impl<'a> PrefixListStore for McrPrefixLists<'a> {
    async fn catalog(&self) -> Result<Vec<RemotePrefixList>> {
        let lists: Vec<RemotePrefixList> = self
            .session
            .get(&format!("/product/mcr2/{}/prefixLists", self.mcr_id))
            .await?;
        info!("Got {} Megaport prefix lists for MCR {}", lists.len(), self.mcr_id);
        Ok(lists)
    }

    async fn entries(&self, id: &RemoteId) -> Result<PrefixSet> {
        let detail: PrefixListDetail = self.session.get(&self.list_path(id)).await?;
        info!("Got prefix list routes | Prefix ID: {}", id);
        Ok(detail.entries.into_iter().map(|e| e.prefix).collect())
    }

    async fn replace(
        &self,
        id: &RemoteId,
        label: &str,
        family: AddressFamily,
        entries: &PrefixSet,
    ) -> Result<()> {
        let url = format!("{}{}", self.session.api_url, self.list_path(id));
        let update = PrefixListUpdate {
            description: label,
            address_family: family,
            entries: entries.iter().map(PrefixListEntry::permit_prefix).collect(),
        };
        let response = self
            .session
            .client
            .put(&url)
            .bearer_auth(&self.session.token)
            .json(&update)
            .send()
            .await
            .map_err(|err| Error::Write {
                target: url.clone(),
                status: "no response".to_string(),
                reason: err.to_string(),
            })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        info!(
            "Updated prefix list | Prefix ID: {} | response: {}",
            id, status
        );
        debug!("Response payload: {}", body);
        if !status.is_success() {
            return Err(Error::Write {
                target: url,
                status: status.to_string(),
                reason: body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use crate::reconcile::PrefixEntry;

    /// Whole request seen once headers and `content-length` bytes of body are in
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let header_end = match text.find("\r\n\r\n") {
            Some(pos) => pos + 4,
            None => return false,
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= header_end + content_length
    }

    /// Answer a single HTTP request with `status` and a JSON `body`
    ///
    /// Returns the base URL and a handle yielding the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                stream.readable().await.unwrap();
                match stream.try_read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(err) => panic!("read failed: {}", err),
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let bytes = response.as_bytes();
            let mut written = 0;
            while written < bytes.len() {
                stream.writable().await.unwrap();
                match stream.try_write(&bytes[written..]) {
                    Ok(n) => written += n,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(err) => panic!("write failed: {}", err),
                }
            }
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    fn credentials() -> Credentials {
        Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    fn http_client() -> Client {
        Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    fn client(api_url: &str) -> MegaportClient {
        MegaportClient {
            client: http_client(),
            api_url: api_url.to_string(),
        }
    }

    fn session(api_url: &str) -> MegaportSession {
        MegaportSession {
            client: http_client(),
            api_url: api_url.to_string(),
            token: "token-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login() {
        let (url, server) = serve_once("200 OK", r#"{"access_token": "abc", "token_type": "Bearer"}"#).await;
        let client = client(&url);
        let session = client
            .login(&format!("{}/oauth2/token", url), &credentials())
            .await
            .unwrap();
        assert_eq!(session.token, "abc");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /oauth2/token"));
        assert!(request.to_lowercase().contains("authorization: basic"));
        assert!(request.ends_with("grant_type=client_credentials"));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let (url, server) = serve_once("401 Unauthorized", "{}").await;
        let client = client(&url);
        let result = client
            .login(&format!("{}/oauth2/token", url), &credentials())
            .await;
        match result {
            Err(err @ Error::Auth(_)) => {
                assert!(err.is_fatal());
                assert!(err.to_string().contains("401"));
            }
            Err(err) => panic!("Unexpected error {:?}", err),
            Ok(_) => panic!("Login should fail on 401"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_entries() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"message": "ok", "data": {"id": 5, "description": "aws", "entries": [
                {"action": "permit", "prefix": "10.0.1.0/24"},
                {"action": "permit", "prefix": "10.0.0.0/24"}
            ]}}"#,
        )
        .await;
        let session = session(&url);
        let entries = session.mcr("m1").entries(&RemoteId::new("5")).await.unwrap();
        let expected: PrefixSet = vec![PrefixEntry::from("10.0.0.0/24"), PrefixEntry::from("10.0.1.0/24")]
            .into_iter()
            .collect();
        assert_eq!(entries, expected);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /product/mcr2/m1/prefixList/5"));
        assert!(request.to_lowercase().contains("authorization: bearer token-1"));
    }

    #[tokio::test]
    async fn test_replace_server_error() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"message":"boom"}"#).await;
        let session = session(&url);
        let entries: PrefixSet = vec![PrefixEntry::from("10.0.0.0/24")].into_iter().collect();
        let result = session
            .mcr("m1")
            .replace(&RemoteId::new("5"), "aws", AddressFamily::IPv4, &entries)
            .await;
        match result {
            Err(Error::Write { target, status, reason }) => {
                assert!(target.ends_with("/product/mcr2/m1/prefixList/5"));
                assert!(status.starts_with("500"));
                assert!(reason.contains("boom"));
            }
            other => panic!("Expected a write error, got {:?}", other),
        }

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /product/mcr2/m1/prefixList/5"));
        assert!(request.contains(r#""addressFamily":"IPv4""#));
        assert!(request.contains(r#""prefix":"10.0.0.0/24""#));
    }

    #[tokio::test]
    async fn test_replace_ok() {
        let (url, server) = serve_once("200 OK", r#"{"message": "updated"}"#).await;
        let session = session(&url);
        let result = session
            .mcr("m1")
            .replace(&RemoteId::new("5"), "aws", AddressFamily::IPv4, &PrefixSet::new())
            .await;
        assert!(result.is_ok());
        let request = server.await.unwrap();
        assert!(request.contains(r#""entries":[]"#));
    }
}
