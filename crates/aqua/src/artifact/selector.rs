//! 🚦 Transfer strategy selection: small, large, or "don't copy it at all".
//!
//! Pure decisions. Nothing here touches the network, so a size error always
//! arrives before the first byte leaves. The only side channel is the
//! `measure` closure, which the uploader points at the local filesystem.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{AquaError, AquaResult};
use crate::model::datascience_model::ArtifactLocation;
use crate::object_storage_uri::ObjectStorageUri;
use crate::progress::human_size;

/// 📦 Where a large upload's bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LargeSource {
    /// 🗜️ Local folder or file, zipped and staged into the bucket first.
    Local(PathBuf),
    /// 🪣 Already sitting in object storage; the catalog pulls it directly.
    InBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadStrategy {
    /// 🔗 Build a manifest over these URIs, copy nothing.
    ByReference { uris: Vec<String> },
    /// 📬 Zip and PUT straight into the catalog.
    Small { path: PathBuf },
    /// 🚛 Stage in `bucket_uri`, then ask the catalog to export from it.
    Large {
        bucket_uri: ObjectStorageUri,
        source: LargeSource,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStrategy {
    /// 🔗 Read the manifest, fetch each pinned object version.
    ByReference,
    /// 📬 GET the artifact straight from the catalog.
    Small { size: u64 },
    /// 🚛 Ask the catalog to import into `bucket_uri`, then fetch from there.
    Large {
        bucket_uri: ObjectStorageUri,
        size: u64,
    },
}

fn size_error(threshold: u64) -> AquaError {
    AquaError::ModelArtifactSizeError {
        max_size: human_size(threshold),
    }
}

/// 🚦 Pick an upload strategy.
///
/// `measure` is only called for local artifacts, and only when no bucket was
/// given.
pub fn select_upload<F>(
    artifact: &ArtifactLocation,
    bucket_uri: Option<&str>,
    model_by_reference: bool,
    threshold: u64,
    measure: F,
) -> AquaResult<UploadStrategy>
where
    F: FnOnce(&Path) -> AquaResult<u64>,
{
    if model_by_reference {
        return Ok(UploadStrategy::ByReference {
            uris: artifact.as_list(),
        });
    }

    if let Some(the_location) = artifact.as_oci_path() {
        if let Some(other) = bucket_uri.filter(|b| *b != the_location) {
            warn!(
                "⚠️ The `bucket_uri` ({other}) will be ignored and the artifact location {the_location} will be used instead."
            );
        }
        return Ok(UploadStrategy::Large {
            bucket_uri: ObjectStorageUri::parse(the_location)?,
            source: LargeSource::InBucket,
        });
    }

    let Some(the_path) = artifact.as_local_path().map(Path::to_path_buf) else {
        return Err(AquaError::InvalidArtifactType(
            "Multiple artifacts are only allowed for models created by reference.".to_string(),
        ));
    };

    match bucket_uri {
        Some(bucket) => Ok(UploadStrategy::Large {
            bucket_uri: ObjectStorageUri::parse(bucket)?,
            source: LargeSource::Local(the_path),
        }),
        None => {
            let size = measure(&the_path)?;
            if size > threshold {
                return Err(size_error(threshold));
            }
            Ok(UploadStrategy::Small { path: the_path })
        }
    }
}

/// 🚦 Pick a download strategy from the artifact HEAD's `content-length`.
pub fn select_download(
    model_by_reference: bool,
    content_length: Option<&str>,
    bucket_uri: Option<&str>,
    threshold: u64,
) -> AquaResult<DownloadStrategy> {
    if model_by_reference {
        if let Some(bucket) = bucket_uri {
            warn!(
                "⚠️ The model was created by reference; artifacts come from its manifest and `bucket_uri` ({bucket}) is ignored."
            );
        }
        return Ok(DownloadStrategy::ByReference);
    }

    let size = content_length
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            AquaError::MissingField(
                "The model artifact size is unknown: the `content-length` header is missing or invalid."
                    .to_string(),
            )
        })?;

    match bucket_uri {
        Some(bucket) => Ok(DownloadStrategy::Large {
            bucket_uri: ObjectStorageUri::parse(bucket)?,
            size,
        }),
        None if size > threshold => Err(size_error(threshold)),
        None => Ok(DownloadStrategy::Small { size }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_GIB: u64 = 2_147_483_648;

    fn never_measure(_: &Path) -> AquaResult<u64> {
        panic!("💀 nobody should have measured anything")
    }

    #[test]
    fn the_one_where_too_big_without_a_bucket_is_refused() {
        let err = select_upload(
            &ArtifactLocation::from("/models/huge"),
            None,
            false,
            TWO_GIB,
            |_| Ok(TWO_GIB + 1),
        )
        .unwrap_err();
        assert!(matches!(err, AquaError::ModelArtifactSizeError { ref max_size } if max_size == "2.00 GiB"));
        assert!(err.is_local_precondition());
    }

    #[test]
    fn the_one_where_exactly_the_threshold_is_still_small() {
        let strategy = select_upload(
            &ArtifactLocation::from("/models/ok"),
            None,
            false,
            TWO_GIB,
            |_| Ok(TWO_GIB),
        )
        .unwrap();
        assert_eq!(strategy, UploadStrategy::Small { path: PathBuf::from("/models/ok") });
    }

    #[test]
    fn the_one_where_a_bucket_means_large_no_matter_the_size() {
        let strategy = select_upload(
            &ArtifactLocation::from("/models/tiny"),
            Some("oci://stage@ns/tmp/"),
            false,
            TWO_GIB,
            never_measure,
        )
        .unwrap();
        assert_eq!(
            strategy,
            UploadStrategy::Large {
                bucket_uri: ObjectStorageUri::new("stage", "ns", "tmp/"),
                source: LargeSource::Local(PathBuf::from("/models/tiny")),
            }
        );
    }

    #[test]
    fn the_one_where_the_artifact_in_a_bucket_beats_the_bucket_argument() {
        let strategy = select_upload(
            &ArtifactLocation::from("oci://models@ns/m.zip"),
            Some("oci://elsewhere@ns/"),
            false,
            TWO_GIB,
            never_measure,
        )
        .unwrap();
        assert_eq!(
            strategy,
            UploadStrategy::Large {
                bucket_uri: ObjectStorageUri::new("models", "ns", "m.zip"),
                source: LargeSource::InBucket,
            }
        );
    }

    #[test]
    fn the_one_where_lists_need_a_reference() {
        let many = ArtifactLocation::Multiple(vec!["oci://a@n/x".into(), "oci://b@n/y".into()]);
        let err = select_upload(&many, None, false, TWO_GIB, never_measure).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Multiple artifacts are only allowed for models created by reference."
        );

        let by_ref = select_upload(&many, None, true, TWO_GIB, never_measure).unwrap();
        assert_eq!(
            by_ref,
            UploadStrategy::ByReference {
                uris: vec!["oci://a@n/x".into(), "oci://b@n/y".into()]
            }
        );
    }

    #[test]
    fn the_one_where_downloads_read_the_content_length() {
        assert_eq!(
            select_download(false, Some("1024"), None, TWO_GIB).unwrap(),
            DownloadStrategy::Small { size: 1024 }
        );
        assert!(matches!(
            select_download(false, Some("3000000000"), None, TWO_GIB),
            Err(AquaError::ModelArtifactSizeError { .. })
        ));
        assert!(matches!(
            select_download(false, Some("3000000000"), Some("oci://b@n/p/"), TWO_GIB).unwrap(),
            DownloadStrategy::Large { size: 3_000_000_000, .. }
        ));
        assert!(select_download(false, None, None, TWO_GIB).is_err());
        assert!(select_download(false, Some("lots"), None, TWO_GIB).is_err());
        assert_eq!(
            select_download(true, None, Some("oci://ignored@n/"), TWO_GIB).unwrap(),
            DownloadStrategy::ByReference
        );
    }
}
