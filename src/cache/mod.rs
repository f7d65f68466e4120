//! Cache: content-addressed storage of detection results keyed by video
//! fingerprint and detector configuration.

pub mod single_flight;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::DetectorConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::DetectionResult;
use crate::wire;

/// Current on-disk format version. An explicit version field lets a corrupt
/// or stale-format blob be distinguished from a merely-absent one.
pub const CACHE_FORMAT_VERSION: u32 = 2;

/// Identifies the video a cache entry was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFingerprint {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_unix_nanos: u128,
}

impl VideoFingerprint {
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)
            .map_err(|e| CoreError::input(format!("cannot stat '{}': {e}", path.display())))?;
        let modified = metadata
            .modified()
            .map_err(|e| CoreError::input(format!("cannot read mtime of '{}': {e}", path.display())))?;
        let modified_unix_nanos = modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Ok(VideoFingerprint {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            modified_unix_nanos,
        })
    }
}

/// Opaque, filesystem-safe cache key: a `blake3` digest of the fingerprint,
/// detector name, and sorted config pairs, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(fingerprint: &VideoFingerprint, detector_name: &str, config: &DetectorConfig) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(fingerprint.path.to_string_lossy().as_bytes());
        hasher.update(&fingerprint.size_bytes.to_le_bytes());
        hasher.update(&fingerprint.modified_unix_nanos.to_le_bytes());
        hasher.update(detector_name.as_bytes());
        for (key, value) in config.canonical_pairs() {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b";");
        }
        CacheKey(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Directory-backed cache storing one `.blob` file per [`CacheKey`].
pub struct Cache {
    directory: PathBuf,
}

impl Cache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Cache {
            directory: directory.into(),
        }
    }

    fn blob_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(format!("{}.blob", key.as_str()))
    }

    /// Looks up `key`. A structurally-invalid or version-mismatched blob is
    /// treated as a miss and the stale file is deleted.
    pub fn lookup(&self, key: &CacheKey) -> CoreResult<Option<DetectionResult>> {
        let path = self.blob_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::CacheIo { message: e.to_string() }),
        };

        match wire::decode_cache_entry(&bytes) {
            Ok(entry) if entry.version == CACHE_FORMAT_VERSION => Ok(Some(entry.result)),
            _ => {
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Writes `result` for `key` atomically: serialize to a temp file in the
    /// same directory, then rename over the final path so a concurrent
    /// reader never observes a partially-written blob.
    pub fn store(&self, key: &CacheKey, result: &DetectionResult) -> CoreResult<()> {
        fs::create_dir_all(&self.directory)
            .map_err(|e| CoreError::CacheIo { message: e.to_string() })?;

        let bytes = wire::encode_cache_entry(CACHE_FORMAT_VERSION, result);
        let final_path = self.blob_path(key);
        let tmp_path = self.directory.join(format!("{}.blob.tmp-{}", key.as_str(), std::process::id()));

        let mut file = fs::File::create(&tmp_path)
            .map_err(|e| CoreError::CacheIo { message: e.to_string() })?;
        file.write_all(&bytes)
            .map_err(|e| CoreError::CacheIo { message: e.to_string() })?;
        file.sync_all().map_err(|e| CoreError::CacheIo { message: e.to_string() })?;
        drop(file);

        fs::rename(&tmp_path, &final_path).map_err(|e| CoreError::CacheIo { message: e.to_string() })?;
        Ok(())
    }

    pub fn clear(&self) -> CoreResult<()> {
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::CacheIo { message: e.to_string() }),
        }
    }

    /// Number of cache entries currently stored, for diagnostics.
    pub fn entry_count(&self) -> usize {
        fs::read_dir(&self.directory)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().map(|ext| ext == "blob").unwrap_or(false))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;

    fn sample_result() -> DetectionResult {
        DetectionResult {
            boundaries: vec![],
            algorithm: "frame_difference".to_string(),
            processing_time_sec: 0.5,
            frame_count: 100,
            scores: vec![0.1, 0.2],
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn store_then_lookup_round_trips() {
        let dir = std::env::temp_dir().join(format!("shotbound-cache-test-{}", std::process::id()));
        let cache = Cache::new(&dir);
        let fingerprint = VideoFingerprint {
            path: PathBuf::from("clip.mp4"),
            size_bytes: 1234,
            modified_unix_nanos: 99,
        };
        let key = CacheKey::compute(&fingerprint, "frame_difference", &DetectorConfig::default());

        assert!(cache.lookup(&key).unwrap().is_none());
        cache.store(&key, &sample_result()).unwrap();
        let loaded = cache.lookup(&key).unwrap().unwrap();
        assert_eq!(loaded.algorithm, "frame_difference");
        assert_eq!(loaded.scores, vec![0.1, 0.2]);

        cache.clear().unwrap();
        assert!(cache.lookup(&key).unwrap().is_none());
    }

    #[test]
    fn corrupt_blob_is_treated_as_a_miss_and_removed() {
        let dir = std::env::temp_dir().join(format!("shotbound-cache-test-corrupt-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let cache = Cache::new(&dir);
        let fingerprint = VideoFingerprint {
            path: PathBuf::from("clip.mp4"),
            size_bytes: 1,
            modified_unix_nanos: 1,
        };
        let key = CacheKey::compute(&fingerprint, "histogram", &DetectorConfig::default());
        fs::write(cache.blob_path(&key), b"not valid json").unwrap();

        assert!(cache.lookup(&key).unwrap().is_none());
        assert!(!cache.blob_path(&key).exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cache_key_is_deterministic() {
        let fingerprint = VideoFingerprint {
            path: PathBuf::from("a.mp4"),
            size_bytes: 10,
            modified_unix_nanos: 20,
        };
        let config = DetectorConfig::default();
        let k1 = CacheKey::compute(&fingerprint, "frame_difference", &config);
        let k2 = CacheKey::compute(&fingerprint, "frame_difference", &config);
        assert_eq!(k1, k2);
    }
}
