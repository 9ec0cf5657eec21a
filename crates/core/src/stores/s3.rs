use crate::error::SyncError;
use crate::presign::{PostPolicySigner, PresignedPost};
use crate::store::ObjectStore;
use crate::stores::sigv4::{self, Credentials};
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_REGION: &str = "us-east-1";

/// S3 (or S3-compatible) bucket accessed over HTTPS with SigV4-signed requests.
pub struct S3Client {
    bucket: String,
    region: String,
    bucket_url: Url,
    credentials: Credentials,
    signer: PostPolicySigner,
    client: Client,
}

impl S3Client {
    /// `endpoint` selects path-style addressing against an S3-compatible server;
    /// without it the AWS virtual-hosted endpoint for `region` is used.
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<&str>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let bucket = bucket.into();
        let region = region.into();

        let bucket_url = match endpoint {
            Some(endpoint) => {
                let base = Url::parse(&format!("{}/", endpoint.trim_end_matches('/')))?;
                base.join(&format!("{}/", urlencoding::encode(&bucket)))?
            }
            None => Url::parse(&format!("https://{bucket}.s3.{region}.amazonaws.com/"))?,
        };

        let signer = PostPolicySigner::new(
            bucket.clone(),
            region.clone(),
            bucket_url.to_string(),
            credentials.clone(),
        );

        Ok(Self {
            bucket,
            region,
            bucket_url,
            credentials,
            signer,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Credentials and region from the standard AWS environment variables.
    pub fn from_env(
        bucket: impl Into<String>,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());
        Self::new(bucket, region, endpoint, Credentials::from_env()?, timeout)
    }

    pub fn bucket_url(&self) -> &Url {
        &self.bucket_url
    }

    fn object_url(&self, key: &str) -> Result<Url, SyncError> {
        Ok(self.bucket_url.join(&sigv4::encode_key_path(key))?)
    }

    async fn signed_get(&self, url: &Url) -> Result<Response, SyncError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in sigv4::sign_get(&self.credentials, &self.region, url, Utc::now()) {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let details = response.text().await.unwrap_or_default();
        if status == 404 {
            return Err(SyncError::NotFound(format!("{url}: {details}")));
        }
        Err(SyncError::BackendResponse { status, details })
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_keys(&self) -> Result<Vec<String>, SyncError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut url = self.bucket_url.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2");
                if let Some(token) = &continuation {
                    query.append_pair("continuation-token", token);
                }
            }

            let body = self.signed_get(&url).await?.text().await?;
            let page = parse_list_objects(&body)?;
            debug!(bucket = %self.bucket, keys = page.keys.len(), "listed bucket page");
            keys.extend(page.keys);

            match page.next_token {
                Some(token) if page.truncated => continuation = Some(token),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<(), SyncError> {
        let url = self.object_url(key)?;
        let bytes = self.signed_get(&url).await?.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    fn presign_upload(&self, key: &str) -> Result<PresignedPost, SyncError> {
        Ok(self.signer.presign_pdf_upload(key))
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct ListPage {
    pub keys: Vec<String>,
    pub truncated: bool,
    pub next_token: Option<String>,
}

/// Parses one `ListObjectsV2` response body.
pub(crate) fn parse_list_objects(xml: &str) -> Result<ListPage, SyncError> {
    // Text is kept verbatim: object keys may start or end with whitespace.
    let mut reader = Reader::from_str(xml);

    let mut page = ListPage::default();
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|error| SyncError::Listing(error.to_string()))?
                    .to_string();
                let leaf = path.last().map(String::as_str);
                let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

                match (parent, leaf) {
                    (Some("Contents"), Some("Key")) => page.keys.push(text),
                    (Some("ListBucketResult"), Some("IsTruncated")) => {
                        page.truncated = text.trim().eq_ignore_ascii_case("true")
                    }
                    (Some("ListBucketResult"), Some("NextContinuationToken")) => {
                        page.next_token = Some(text.trim().to_string())
                    }
                    (_, Some("Code")) if path.first().map(String::as_str) == Some("Error") => {
                        return Err(SyncError::Listing(format!(
                            "bucket listing error: {}",
                            text.trim()
                        )));
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(error) => {
                return Err(SyncError::Listing(format!(
                    "malformed xml at {}: {error}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(page)
}
