use anyhow::{Result, anyhow};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Characters allowed in a bucket name (S3 naming rules)
static BUCKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap());

/// Characters allowed in a key prefix. This is the S3 "safe characters" set
/// minus the single quote, so a prefix can always sit inside a SQL literal.
static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/!_.*()=+-]+$").unwrap());

/// A parsed object-storage location (`s3://bucket/prefix`)
///
/// The prefix may name a single object (a JSONPath file) or a "directory" of
/// objects that the bulk loader reads recursively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    bucket: String,
    prefix: String,
}

impl StorageUri {
    /// Parse and validate a URI string
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let url = Url::parse(uri).map_err(|e| anyhow!("Invalid storage URI '{}': {}", uri, e))?;

        if url.scheme() != "s3" {
            return Err(anyhow!(
                "Unsupported URI scheme: {} (expected s3://bucket/prefix)",
                url.scheme()
            ));
        }

        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| anyhow!("S3 URI missing bucket: {}", uri))?
            .to_string();

        if !BUCKET_RE.is_match(&bucket) {
            return Err(anyhow!("Invalid S3 bucket name '{}'", bucket));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(anyhow!("S3 URI must not carry a query or fragment: {}", uri));
        }

        // Remove leading '/' from path
        let prefix = url.path().trim_start_matches('/').to_string();

        if prefix.is_empty() {
            return Err(anyhow!("S3 URI missing key prefix: {}", uri));
        }

        if !PREFIX_RE.is_match(&prefix) {
            return Err(anyhow!(
                "S3 key prefix '{}' contains characters that are not allowed",
                prefix
            ));
        }

        Ok(StorageUri { bucket, prefix })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}
