//! 🪣 `oci://bucket@namespace/prefix`: three facts wearing one string.

use std::fmt;
use std::str::FromStr;

use crate::error::{AquaError, AquaResult};

const OCI_SCHEME: &str = "oci://";

/// 🪣 A parsed object-storage location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectStorageUri {
    pub bucket: String,
    pub namespace: String,
    /// 📁 Object name or prefix inside the bucket. May be empty.
    pub prefix: String,
}

impl ObjectStorageUri {
    pub fn new(
        bucket: impl Into<String>,
        namespace: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            namespace: namespace.into(),
            prefix: prefix.into(),
        }
    }

    /// 🔍 Does this string even claim to be an object-storage path?
    pub fn is_oci_path(path: &str) -> bool {
        path.trim().to_ascii_lowercase().starts_with(OCI_SCHEME)
    }

    pub fn parse(uri: &str) -> AquaResult<Self> {
        let the_trimmed = uri.trim();
        if !Self::is_oci_path(the_trimmed) {
            return Err(AquaError::InvalidArgument(format!(
                "The path `{uri}` is not an object storage path. Expected `oci://<bucket_name>@<namespace>/<prefix>`."
            )));
        }
        let the_rest = &the_trimmed[OCI_SCHEME.len()..];
        let (the_authority, the_prefix) = match the_rest.split_once('/') {
            Some((authority, prefix)) => (authority, prefix),
            None => (the_rest, ""),
        };
        let (bucket, namespace) = the_authority.split_once('@').ok_or_else(|| {
            AquaError::InvalidArgument(format!(
                "The path `{uri}` is missing the namespace. Expected `oci://<bucket_name>@<namespace>/<prefix>`."
            ))
        })?;
        if bucket.is_empty() || namespace.is_empty() {
            return Err(AquaError::InvalidArgument(format!(
                "The path `{uri}` must contain both a bucket name and a namespace."
            )));
        }
        Ok(Self::new(bucket, namespace, the_prefix))
    }

    /// 📎 A sibling object under this prefix. Slashes are de-duplicated.
    pub fn join(&self, name: &str) -> Self {
        let the_name = name.trim_start_matches('/');
        let prefix = if self.prefix.is_empty() {
            the_name.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), the_name)
        };
        Self::new(&self.bucket, &self.namespace, prefix)
    }
}

impl FromStr for ObjectStorageUri {
    type Err = AquaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectStorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oci://{}@{}/{}", self.bucket, self.namespace, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_a_uri_splits_into_its_three_true_selves() {
        let uri = ObjectStorageUri::parse("oci://models@tenancyns/llama/v2/").unwrap();
        assert_eq!(uri.bucket, "models");
        assert_eq!(uri.namespace, "tenancyns");
        assert_eq!(uri.prefix, "llama/v2/");
        assert_eq!(uri.to_string(), "oci://models@tenancyns/llama/v2/");
    }

    #[test]
    fn the_one_where_the_prefix_is_optional() {
        let uri: ObjectStorageUri = "oci://models@ns".parse().unwrap();
        assert_eq!(uri.prefix, "");
        assert_eq!(uri.join("a.bin").prefix, "a.bin");
        assert_eq!(
            ObjectStorageUri::new("b", "n", "dir/").join("/x.zip").prefix,
            "dir/x.zip"
        );
    }

    #[test]
    fn the_one_where_impostors_are_turned_away() {
        assert!(!ObjectStorageUri::is_oci_path("/tmp/model"));
        assert!(ObjectStorageUri::is_oci_path("OCI://b@n/p"));
        assert!(ObjectStorageUri::parse("/tmp/model").is_err());
        assert!(ObjectStorageUri::parse("oci://bucket-without-namespace/p").is_err());
        assert!(ObjectStorageUri::parse("oci://@ns/p").is_err());
    }
}
