//! Units of work flowing through the pipeline
//!
//! A [`FileSpec`] is what enumeration produces, a [`File`] is a spec bound to
//! its job, and a [`FileState`] is the fingerprint used on both sides of the
//! copy to decide whether the destination is stale.

use crate::job::Job;
use crate::storage::ObjectStore;
use mirror_common::checksum::Checksum;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const META_SIZE: &str = "source-size";
pub const META_ETAG: &str = "source-etag";
pub const META_LAST_MODIFIED: &str = "source-last-modified";
pub const META_CHECKSUM: &str = "source-checksum";

/// Identity of a file (or directory) at a source, relative to the source root
///
/// Directory paths end with `/`; the source root is the empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub path: String,
    pub is_directory: bool,
    /// Fingerprint already known from enumeration (e.g. Yum metadata)
    pub hint: Option<FileState>,
}

impl FileSpec {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            hint: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: FileState) -> Self {
        if !hint.is_empty() {
            self.hint = Some(hint);
        }
        self
    }
}

/// Fingerprint snapshot of one side of a copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileState {
    pub size_bytes: Option<u64>,
    pub etag: Option<String>,
    /// HTTP date as sent by the origin
    pub last_modified: Option<String>,
    pub checksum: Option<Checksum>,
    /// Not part of the fingerprint
    pub content_type: Option<String>,
}

/// `Some(equal)` when the field is present on both sides, `Some(false)` when
/// only one side has it, `None` when neither does
fn compare_field<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a == b),
        (None, None) => None,
        _ => Some(false),
    }
}

impl FileState {
    /// True when no fingerprint field is known
    pub fn is_empty(&self) -> bool {
        self.size_bytes.is_none()
            && self.etag.is_none()
            && self.last_modified.is_none()
            && self.checksum.is_none()
    }

    /// Whether both fingerprints describe the same content
    ///
    /// At least one field must be known on both sides, every shared field must
    /// be equal, and a field known on only one side counts as a difference.
    pub fn matches(&self, other: &FileState) -> bool {
        let fields = [
            compare_field(&self.size_bytes, &other.size_bytes),
            compare_field(&self.etag, &other.etag),
            compare_field(&self.last_modified, &other.last_modified),
            compare_field(&self.checksum, &other.checksum),
        ];

        fields.iter().any(Option::is_some) && fields.iter().flatten().all(|equal| *equal)
    }

    /// Object metadata recording this fingerprint
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        if let Some(size) = self.size_bytes {
            metadata.insert(META_SIZE.to_string(), size.to_string());
        }
        if let Some(ref etag) = self.etag {
            metadata.insert(META_ETAG.to_string(), etag.clone());
        }
        if let Some(ref last_modified) = self.last_modified {
            metadata.insert(META_LAST_MODIFIED.to_string(), last_modified.clone());
        }
        if let Some(ref checksum) = self.checksum {
            metadata.insert(META_CHECKSUM.to_string(), checksum.to_string());
        }
        metadata
    }

    /// Rebuild a fingerprint from object metadata; unparseable fields are dropped
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        Self {
            size_bytes: metadata.get(META_SIZE).and_then(|s| s.parse().ok()),
            etag: metadata.get(META_ETAG).cloned(),
            last_modified: metadata.get(META_LAST_MODIFIED).cloned(),
            checksum: metadata.get(META_CHECKSUM).and_then(|s| s.parse().ok()),
            content_type: None,
        }
    }
}

/// A file bound to the job that found it
#[derive(Debug, Clone)]
pub struct File {
    pub job: Arc<Job>,
    pub spec: FileSpec,
    /// Fingerprint the checker compared, recorded on upload
    pub source_state: Option<FileState>,
    pub target_state: Option<FileState>,
}

impl File {
    pub fn new(job: Arc<Job>, spec: FileSpec) -> Self {
        Self {
            job,
            spec,
            source_state: None,
            target_state: None,
        }
    }

    /// Sentinel marking the end of a stage's input
    pub fn end_of_stream(job: Arc<Job>) -> Self {
        Self::new(job, FileSpec::file(""))
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.spec.path.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.spec.path
    }

    pub fn object_name(&self) -> String {
        self.job.target.object_name(&self.spec.path)
    }
}

/// Outcome of [`perform_transfer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    /// Content was written to the destination
    Transferred,
    /// The source reported the content as not modified
    Unchanged,
    /// Fetch, verification, or write failed
    Failed,
}

impl TransferResult {
    pub fn is_success(self) -> bool {
        matches!(self, TransferResult::Transferred)
    }
}

/// Decide whether the destination copy of `file` is stale
///
/// Records the compared source and destination states on `file` so that the
/// transfer can reuse them.
pub async fn needs_transfer(file: &mut File, store: &dyn ObjectStore) -> bool {
    let job = Arc::clone(&file.job);
    let object = file.object_name();

    let source_state = match file.spec.hint {
        Some(ref hint) => hint.clone(),
        None => match job.source.probe_file(file.path()).await {
            Ok(state) => state,
            Err(e) => {
                warn!(job = %job.name, path = %file.path(), error = %e, "Could not probe source file");
                return true;
            },
        },
    };
    file.source_state = Some(source_state.clone());

    let target_state = match store.object_state(&job.target.container, &object).await {
        Ok(Some(state)) => state,
        Ok(None) => {
            debug!(job = %job.name, object = %object, "Object does not exist yet");
            return true;
        },
        Err(e) => {
            warn!(job = %job.name, object = %object, error = %e, "Could not read object state");
            return true;
        },
    };

    let unchanged = source_state.matches(&target_state);
    file.target_state = Some(target_state);

    debug!(job = %job.name, path = %file.path(), needs_transfer = !unchanged, "Checked file");
    !unchanged
}

/// Copy `file` from its source to the destination container
pub async fn perform_transfer(file: &mut File, store: &dyn ObjectStore) -> TransferResult {
    let job = Arc::clone(&file.job);
    let object = file.object_name();
    let previous = file.target_state.clone().unwrap_or_default();

    let fetched = match job.source.get_file(file.path(), &previous).await {
        Ok(fetched) => fetched,
        Err(e) => {
            error!(job = %job.name, path = %file.path(), error = %e, "Could not fetch file");
            return TransferResult::Failed;
        },
    };

    let Some(body) = fetched.body else {
        debug!(job = %job.name, path = %file.path(), "Source reports file as not modified");
        return TransferResult::Unchanged;
    };

    if let Some(expected) = file.spec.hint.as_ref().and_then(|hint| hint.checksum.as_ref()) {
        if expected.is_verifiable() {
            if let Err(e) = expected.verify(&body) {
                error!(job = %job.name, path = %file.path(), error = %e, "Downloaded file failed verification");
                return TransferResult::Failed;
            }
        }
    }

    let mut recorded = file.source_state.clone().unwrap_or_else(|| fetched.state.clone());
    if recorded.content_type.is_none() {
        recorded.content_type = fetched.state.content_type.clone();
    }

    let size = body.len();
    match store
        .put_object(&job.target.container, &object, body, &recorded)
        .await
    {
        Ok(()) => {
            info!(job = %job.name, object = %object, size, "Transferred file");
            file.source_state = Some(recorded);
            TransferResult::Transferred
        },
        Err(e) => {
            error!(job = %job.name, object = %object, error = %e, "Could not write object");
            TransferResult::Failed
        },
    }
}
