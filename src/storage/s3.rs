use super::{ObjectStore, StorageError, validate_key};
use crate::config::S3Settings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// S3-compatible store (AWS, MinIO, R2, ...) addressed with path-style URLs.
pub struct S3Store {
    endpoint: Url,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
    client: Client,
}

impl S3Store {
    pub fn new(settings: S3Settings) -> anyhow::Result<Self> {
        let endpoint = Url::parse(settings.endpoint.trim_end_matches('/'))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            endpoint,
            bucket: settings.bucket,
            region: settings.region,
            access_key: settings.access_key,
            secret_key: settings.secret_key,
            client,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn canonical_uri(&self, key: &str) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        format!("{}/{}/{}", base, uri_encode(&self.bucket, false), uri_encode(key, true))
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn authorization(
        &self,
        method: &Method,
        canonical_uri: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, String), StorageError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let canonical_request = canonical_request(
            method.as_str(),
            canonical_uri,
            &self.host_header(),
            payload_hash,
            &amz_date,
        );
        let scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let key = signing_key(&self.secret_key, &date_stamp, &self.region, SERVICE)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        Ok((
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
                self.access_key
            ),
            amz_date,
        ))
    }

    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        validate_key(key)?;

        let canonical_uri = self.canonical_uri(key);
        let payload_hash = sha256_hex(&body);
        let (authorization, amz_date) =
            self.authorization(&method, &canonical_uri, &payload_hash, Utc::now())?;

        let mut url = self.endpoint.clone();
        url.set_path(&canonical_uri);

        let mut request = self
            .client
            .request(method, url)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header(reqwest::header::AUTHORIZATION, authorization);
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))
    }
}

async fn failure(key: &str, response: reqwest::Response) -> StorageError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return StorageError::NotFound(key.to_string());
    }
    let body = response.text().await.unwrap_or_default();
    StorageError::Http(format!("{status}: {}", body.chars().take(300).collect::<String>()))
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let size = body.len();
        let response = self.send(Method::PUT, key, body, Some(content_type)).await?;
        if !response.status().is_success() {
            return Err(failure(key, response).await);
        }
        tracing::debug!(key, size, "Uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.send(Method::GET, key, Vec::new(), None).await?;
        if !response.status().is_success() {
            return Err(failure(key, response).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self.send(Method::DELETE, key, Vec::new(), None).await?;
        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            _ => Err(failure(key, response).await),
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Http(format!("signing key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 signing key for one day, region and service.
pub fn signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn canonical_request(
    method: &str,
    canonical_uri: &str,
    host: &str,
    payload_hash: &str,
    amz_date: &str,
) -> String {
    format!(
        "{method}\n{canonical_uri}\n\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{payload_hash}"
    )
}

/// Percent-encodes per the SigV4 rules; `/` survives only in object keys.
pub fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> S3Store {
        S3Store::new(S3Settings {
            endpoint: "http://minio.local:9000/".into(),
            bucket: "erp".into(),
            region: "us-east-1".into(),
            access_key: "AKIDEXAMPLE".into(),
            secret_key: "secret".into(),
        })
        .unwrap()
    }

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn empty_payload_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn encodes_keys_but_keeps_separators() {
        assert_eq!(uri_encode("documents/a b+c.pdf", true), "documents/a%20b%2Bc.pdf");
        assert_eq!(uri_encode("a/b", false), "a%2Fb");
    }

    #[test]
    fn path_style_uri_and_host_with_port() {
        let s3 = store();
        assert_eq!(s3.canonical_uri("backups/x.json"), "/erp/backups/x.json");
        assert_eq!(s3.host_header(), "minio.local:9000");
    }

    #[test]
    fn authorization_header_shape() {
        let s3 = store();
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let (auth, amz_date) =
            s3.authorization(&Method::PUT, "/erp/k", &sha256_hex(b"x"), now).unwrap();

        assert_eq!(amz_date, "20261015T120000Z");
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20261015/us-east-1/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn canonical_request_layout() {
        let req = canonical_request("GET", "/erp/k", "h", "abc", "20260101T000000Z");
        assert_eq!(
            req,
            "GET\n/erp/k\n\nhost:h\nx-amz-content-sha256:abc\nx-amz-date:20260101T000000Z\n\nhost;x-amz-content-sha256;x-amz-date\nabc"
        );
    }
}
