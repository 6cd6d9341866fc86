//! Output directory handle shared by the capture controller and the retention manager
//!
//! Every frame is stored as `{session_id}_{index}.png`. The controller only ever
//! adds files and the retention manager only ever removes them; names are
//! namespaced by session so neither side needs a lock.

use crate::{is_safe_artifact_name, CaptureError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SESSION_ID_LEN: usize = 32;

/// Opaque per-request token used as the prefix of every artifact a session produces
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accepts externally supplied ids for manual cleanup.
    ///
    /// Only the generated shape is accepted (32 lowercase hex digits), so a
    /// short prefix cannot sweep several sessions at once.
    pub fn parse(raw: &str) -> Result<Self, CaptureError> {
        let well_formed = raw.len() == SESSION_ID_LEN
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(CaptureError::InvalidInput(format!(
                "invalid session id: {raw:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored frame
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub index: usize,
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Stable relative reference, e.g. `/static/{name}`
    pub relative_url: String,
    pub size: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub removed: Vec<String>,
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<CaptureError>,
}

fn serialize_failures<S>(failures: &[CaptureError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(failures.iter().map(|f| f.to_string()))
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    route: String,
}

impl ArtifactStore {
    /// Opens (creating if needed) the output directory.
    pub fn open(root: impl Into<PathBuf>, route: impl Into<String>) -> Result<Self, CaptureError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let route = route.into().trim_end_matches('/').to_string();
        Ok(Self { root, route })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn artifact_name(session: &SessionId, index: usize) -> String {
        format!("{session}_{index}.png")
    }

    pub fn relative_url(&self, name: &str) -> String {
        format!("{}/{}", self.route, name)
    }

    pub async fn write_frame(
        &self,
        session: &SessionId,
        index: usize,
        bytes: &[u8],
    ) -> Result<Artifact, CaptureError> {
        let name = Self::artifact_name(session, index);
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored frame {} ({})", name, crate::format_bytes(bytes.len()));

        Ok(Artifact {
            index,
            relative_url: self.relative_url(&name),
            name,
            path,
            size: bytes.len(),
        })
    }

    /// Reads a stored artifact by file name; unsafe names are reported as missing.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, CaptureError> {
        if !is_safe_artifact_name(name) {
            return Err(CaptureError::NotFound(name.to_string()));
        }
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CaptureError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, CaptureError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn count(&self) -> Result<usize, CaptureError> {
        Ok(self.list("").await?.len())
    }

    /// Deletes every file whose name begins with the session id.
    ///
    /// Per-file failures are collected and logged; the sweep always visits every match.
    pub async fn sweep(&self, session: &SessionId) -> SweepReport {
        let mut report = SweepReport::default();

        let names = match self.list(session.as_str()).await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list {}: {}", self.root.display(), e);
                report.failures.push(CaptureError::CleanupFailed {
                    file: self.root.display().to_string(),
                    reason: e.to_string(),
                });
                return report;
            }
        };

        for name in names {
            match tokio::fs::remove_file(self.root.join(&name)).await {
                Ok(()) => report.removed.push(name),
                Err(e) => {
                    warn!("Failed to remove artifact {}: {}", name, e);
                    report.failures.push(CaptureError::CleanupFailed {
                        file: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    pub async fn is_writable(&self) -> bool {
        let probe = self.root.join(format!(".probe-{}", uuid::Uuid::new_v4().simple()));
        let ok = tokio::fs::write(&probe, b"").await.is_ok();
        let _ = tokio::fs::remove_file(&probe).await;
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique_hex() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_parse() {
        let generated = SessionId::generate();
        assert_eq!(SessionId::parse(generated.as_str()).unwrap(), generated);

        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("a").is_err());
        assert!(SessionId::parse("abc123").is_err());
        assert!(SessionId::parse("../etc").is_err());
        assert!(SessionId::parse(&"A".repeat(32)).is_err());
        assert!(SessionId::parse(&"g".repeat(32)).is_err());
        assert!(SessionId::parse(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_artifact_naming() {
        let session = SessionId::parse("deadbeefdeadbeefdeadbeefdeadbeef").unwrap();
        assert_eq!(
            ArtifactStore::artifact_name(&session, 3),
            "deadbeefdeadbeefdeadbeefdeadbeef_3.png"
        );
    }

    #[tokio::test]
    async fn test_write_and_read_frame() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "/static/").unwrap();
        let session = SessionId::generate();

        let artifact = store.write_frame(&session, 0, b"png-bytes").await.unwrap();
        assert_eq!(artifact.relative_url, format!("/static/{session}_0.png"));
        assert_eq!(artifact.size, 9);
        assert_eq!(store.read(&artifact.name).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_read_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "/static").unwrap();
        assert!(matches!(
            store.read("../secret.png").await,
            Err(CaptureError::NotFound(_))
        ));
        assert!(matches!(
            store.read("nothing_0.png").await,
            Err(CaptureError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_matching_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "/static").unwrap();
        let mine = SessionId::generate();
        let other = SessionId::generate();

        for i in 0..3 {
            store.write_frame(&mine, i, b"x").await.unwrap();
        }
        store.write_frame(&other, 0, b"y").await.unwrap();

        let report = store.sweep(&mine).await;
        assert_eq!(report.removed.len(), 3);
        assert!(report.failures.is_empty());
        assert!(store.list(mine.as_str()).await.unwrap().is_empty());
        assert_eq!(
            store.list(other.as_str()).await.unwrap(),
            vec![format!("{other}_0.png")]
        );
    }

    #[tokio::test]
    async fn test_sweep_continues_past_undeletable_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "/static").unwrap();
        let session = SessionId::generate();

        store.write_frame(&session, 0, b"a").await.unwrap();
        // remove_file fails on a directory regardless of privileges
        std::fs::create_dir(dir.path().join(format!("{session}_1.png"))).unwrap();
        store.write_frame(&session, 2, b"c").await.unwrap();

        let report = store.sweep(&session).await;

        assert_eq!(
            report.removed,
            vec![format!("{session}_0.png"), format!("{session}_2.png")]
        );
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            CaptureError::CleanupFailed { file, .. } => {
                assert_eq!(file, &format!("{session}_1.png"))
            }
            other => panic!("unexpected failure {other:?}"),
        }
        assert_eq!(
            store.list(session.as_str()).await.unwrap(),
            vec![format!("{session}_1.png")]
        );
    }

    #[tokio::test]
    async fn test_store_is_writable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("nested"), "/static").unwrap();
        assert!(store.is_writable().await);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
