use crate::stores::sigv4::{self, Credentials, ALGORITHM};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const UPLOAD_CONTENT_TYPE: &str = "application/pdf";
pub const UPLOAD_EXPIRY_SECS: i64 = 3600;

/// Form target and fields a browser posts to upload one object directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresignedPost {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

impl PresignedPost {
    /// Decoded policy document, if the `policy` field is present and well formed.
    pub fn policy(&self) -> Option<Value> {
        let bytes = STANDARD.decode(self.fields.get("policy")?).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[derive(Debug, Clone)]
pub struct PostPolicySigner {
    pub bucket: String,
    pub region: String,
    pub url: String,
    credentials: Credentials,
}

impl PostPolicySigner {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        url: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            url: url.into(),
            credentials,
        }
    }

    /// Signs a POST policy limited to `key`, `content_type`, and `expires_in` from `now`.
    pub fn presign_post(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
        now: DateTime<Utc>,
    ) -> PresignedPost {
        let amz_date = sigv4::amz_date(now);
        let credential = format!(
            "{}/{}",
            self.credentials.access_key_id,
            sigv4::credential_scope(now, &self.region)
        );

        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), key.to_string());
        fields.insert("Content-Type".to_string(), content_type.to_string());
        fields.insert("x-amz-algorithm".to_string(), ALGORITHM.to_string());
        fields.insert("x-amz-credential".to_string(), credential);
        fields.insert("x-amz-date".to_string(), amz_date);
        if let Some(token) = &self.credentials.session_token {
            fields.insert("x-amz-security-token".to_string(), token.clone());
        }

        let mut conditions = vec![json!({ "bucket": self.bucket })];
        conditions.extend(fields.iter().map(|(name, value)| {
            let mut condition = Map::new();
            condition.insert(name.clone(), Value::String(value.clone()));
            Value::Object(condition)
        }));

        let policy = json!({
            "expiration": (now + expires_in).format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "conditions": conditions,
        });
        let encoded = STANDARD.encode(policy.to_string());
        let signature = sigv4::sign(&self.credentials, &self.region, now, &encoded);

        fields.insert("policy".to_string(), encoded);
        fields.insert("x-amz-signature".to_string(), signature);

        PresignedPost {
            url: self.url.clone(),
            fields,
        }
    }

    /// The PDF upload descriptor handed to browsers: one hour, `application/pdf` only.
    pub fn presign_pdf_upload(&self, key: &str) -> PresignedPost {
        self.presign_post(
            key,
            UPLOAD_CONTENT_TYPE,
            Duration::seconds(UPLOAD_EXPIRY_SECS),
            Utc::now(),
        )
    }
}
