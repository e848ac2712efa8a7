//! Test helpers: a storage fake whose behaviour is scripted by file contents.
//!
//! Files are tiny non-image byte strings, so the compression engine passes
//! them through unchanged and the storage sees exactly what the test sent:
//!
//! * `slow:<ms>:<label>` sleeps `<ms>` milliseconds, then succeeds
//! * `fail:<label>` fails the upload
//! * `hang:<label>` sleeps for a minute
//! * anything else succeeds immediately
//!
//! The URL of a stored object ends with its label, so ordering is easy to assert.

#![allow(dead_code)]

use async_trait::async_trait;
use sitereview_core::StorageBackend;
use sitereview_storage::{Storage, StorageError, StorageResult, UploadResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct ScriptedStorage {
    uploads: AtomicUsize,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn stored_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

fn label(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data).to_string();
    text.rsplit(':').next().unwrap_or_default().to_string()
}

#[async_trait]
impl Storage for ScriptedStorage {
    async fn upload(
        &self,
        folder: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<UploadResult> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let text = String::from_utf8_lossy(&data).to_string();

        if let Some(rest) = text.strip_prefix("slow:") {
            let ms: u64 = rest
                .split(':')
                .next()
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        } else if text.starts_with("fail:") {
            return Err(StorageError::UploadFailed(format!("scripted failure {}", text)));
        } else if text.starts_with("hang:") {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        let key = format!("{}/{}-{}", folder, n, label(&data));
        self.objects.lock().unwrap().insert(key.clone(), data);

        Ok(UploadResult {
            url: format!("https://cdn.test/{}", key),
            key,
            folder: folder.to_string(),
        })
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

pub fn file(field: &str, contents: &str) -> sitereview_core::ImageAsset {
    sitereview_core::ImageAsset::new(field, contents.as_bytes().to_vec(), "image/jpeg")
        .with_filename(format!("{}.jpg", label(contents.as_bytes())))
}
