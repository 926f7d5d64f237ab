//! String literals interpolated into statements
//!
//! Only values that come from configuration end up inside SQL text, and each of
//! them is validated against a strict pattern before it gets here. Quoting is
//! still applied on top of validation.

use anyhow::{Result, anyhow};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static IAM_ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws(-[a-z]+)*:iam::\d{12}:role/[A-Za-z0-9+=,.@_/-]{1,512}$").unwrap()
});

static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d{1,2}$").unwrap());

/// Render `value` as a single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// IAM role ARN the warehouse assumes to read object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRole(String);

impl IamRole {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if IAM_ROLE_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(anyhow!(
                "'{}' is not an IAM role ARN (expected arn:aws:iam::<account>:role/<name>)",
                value
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AWS region of the source bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsRegion(String);

impl AwsRegion {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if REGION_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(anyhow!("'{}' is not an AWS region name", value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
