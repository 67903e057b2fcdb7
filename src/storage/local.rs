use super::{ObjectStore, PutObject, StorageError};
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Object store backed by a local directory.
///
/// Each bucket is a subdirectory of `root` and each key a relative path
/// inside it, so `s3://photos/2024/dawn.jpg` lives at
/// `<root>/photos/2024/dawn.jpg`. Keys that would escape their bucket are
/// rejected.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let bucket_path = Path::new(bucket);
        if bucket.is_empty() || !is_plain_relative(bucket_path) || bucket_path.components().count() != 1 {
            return Err(StorageError::InvalidKey(format!("bucket {bucket:?}")));
        }
        let key_path = Path::new(key);
        if key.is_empty() || key.ends_with('/') || !is_plain_relative(key_path) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(bucket_path).join(key_path))
    }
}

/// True when every component is a normal name (no `..`, `.`, or root).
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Write `body` to a fresh temp file beside `path`, then rename it into
/// place. Readers never see a partial object, and the temp file is created
/// exclusively so it cannot replace another object. On failure it is removed
/// when dropped.
fn write_atomically(path: &Path, body: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(parent)?;
    tmp.write_all(body)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn put(&self, object: PutObject) -> Result<(), StorageError> {
        object.verify()?;
        let path = self.object_path(&object.bucket, &object.key)?;
        let body = object.body;
        tokio::task::spawn_blocking(move || write_atomically(&path, &body))
            .await
            .map_err(|e| StorageError::Unavailable(format!("write task failed: {e}")))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put(PutObject::new("photos", "2024/dawn.avif", vec![9, 8, 7], "image/avif"))
            .await
            .unwrap();

        assert!(tmp.path().join("photos/2024/dawn.avif").exists());
        assert_eq!(entries(&tmp.path().join("photos/2024")), vec!["dawn.avif"]);
        assert_eq!(
            store.get("photos", "2024/dawn.avif").await.unwrap(),
            vec![9, 8, 7]
        );
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let err = store.get("photos", "missing.jpg").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn parent_traversal_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let err = store.get("photos", "../secrets.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn absolute_key_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let err = store
            .put(PutObject::new("photos", "/etc/passwd", vec![1], "image/avif"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn nested_bucket_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(matches!(
            store.get("a/b", "k.jpg").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn tampered_put_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let mut put = PutObject::new("photos", "x.avif", vec![1, 2, 3], "image/avif");
        put.body.push(4);
        assert!(store.put(put).await.is_err());
        assert!(!tmp.path().join("photos/x.avif").exists());
    }

    #[tokio::test]
    async fn put_leaves_sibling_objects_alone() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put(PutObject::new("photos", "report.partial", b"user data".to_vec(), "text/plain"))
            .await
            .unwrap();
        store
            .put(PutObject::new("photos", "report.avif", vec![1, 2, 3], "image/avif"))
            .await
            .unwrap();

        assert_eq!(
            store.get("photos", "report.partial").await.unwrap(),
            b"user data"
        );
        assert_eq!(store.get("photos", "report.avif").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(
            entries(&tmp.path().join("photos")),
            vec!["report.avif", "report.partial"]
        );
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        // A directory in the way makes the final rename fail.
        std::fs::create_dir_all(tmp.path().join("photos/x.avif")).unwrap();

        let err = store
            .put(PutObject::new("photos", "x.avif", vec![1, 2, 3], "image/avif"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(entries(&tmp.path().join("photos")), vec!["x.avif"]);
        assert!(tmp.path().join("photos/x.avif").is_dir());
    }
}
