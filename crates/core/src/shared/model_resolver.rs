use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    EYE_CASCADE_NAME, EYE_CASCADE_URL, FRONTAL_FACE_CASCADE_NAME, FRONTAL_FACE_CASCADE_URL,
    SEETA_MODEL_NAME, SEETA_MODEL_URL,
};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// A trained classifier known by file name and where to fetch it from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelLocation {
    pub name: &'static str,
    pub url: &'static str,
}

pub const FRONTAL_FACE_CASCADE: ModelLocation = ModelLocation {
    name: FRONTAL_FACE_CASCADE_NAME,
    url: FRONTAL_FACE_CASCADE_URL,
};

pub const EYE_CASCADE: ModelLocation = ModelLocation {
    name: EYE_CASCADE_NAME,
    url: EYE_CASCADE_URL,
};

pub const SEETA_FRONTAL_FACE: ModelLocation = ModelLocation {
    name: SEETA_MODEL_NAME,
    url: SEETA_MODEL_URL,
};

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model file, checking local copies before downloading.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled directory (for development / pre-packaged installs)
/// 3. Download from the model's URL into the cache
pub fn resolve(
    model: ModelLocation,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    resolve_in(&cache_dir, model, bundled_dir, progress)
}

fn resolve_in(
    cache_dir: &Path,
    model: ModelLocation,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(model.name);
    if cached_path.exists() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(model.name);
        if bundled_path.exists() {
            log::debug!("Using bundled model {}", bundled_path.display());
            return Ok(bundled_path);
        }
    }

    log::info!("Downloading {} from {}", model.name, model.url);
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(model.url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/facewatch/models/`
/// - Linux: `$XDG_CACHE_HOME/facewatch/models/` or `~/.cache/facewatch/models/`
/// - Windows: `%LOCALAPPDATA%/facewatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("facewatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("facewatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url).map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    if !response.status().is_success() {
        return Err(ModelResolveError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    // Written under a temp name and renamed, so a failed download never
    // leaves a truncated model in the cache.
    let temp_path = dest.with_extension("part");
    let mut file = fs::File::create(&temp_path).map_err(|e| ModelResolveError::Write {
        path: temp_path.clone(),
        source: e,
    })?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(64 * 1024) {
        file.write_all(chunk).map_err(|e| ModelResolveError::Write {
            path: temp_path.clone(),
            source: e,
        })?;
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(|e| ModelResolveError::Write {
        path: temp_path.clone(),
        source: e,
    })?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FAKE: ModelLocation = ModelLocation {
        name: "fake_cascade.xml",
        url: "not a url",
    };

    #[test]
    fn test_resolve_prefers_cached_file() {
        let cache = TempDir::new().unwrap();
        let cached = cache.path().join(FAKE.name);
        fs::write(&cached, b"<cascade/>").unwrap();

        let bundled = TempDir::new().unwrap();
        fs::write(bundled.path().join(FAKE.name), b"<bundled/>").unwrap();

        let resolved = resolve_in(cache.path(), FAKE, Some(bundled.path()), None).unwrap();
        assert_eq!(resolved, cached);
    }

    #[test]
    fn test_resolve_falls_back_to_bundled_file() {
        let cache = TempDir::new().unwrap();
        let bundled = TempDir::new().unwrap();
        let bundled_path = bundled.path().join(FAKE.name);
        fs::write(&bundled_path, b"<bundled/>").unwrap();

        let resolved = resolve_in(cache.path(), FAKE, Some(bundled.path()), None).unwrap();
        assert_eq!(resolved, bundled_path);
    }

    #[test]
    fn test_resolve_download_failure_is_reported() {
        let cache = TempDir::new().unwrap();
        let result = resolve_in(cache.path(), FAKE, None, None);
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
    }

    #[test]
    fn test_download_failure_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.xml");
        let _ = download("not a url", &dest, None);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_model_cache_dir_is_namespaced() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("facewatch"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_known_models_have_matching_extensions() {
        assert!(FRONTAL_FACE_CASCADE.name.ends_with(".xml"));
        assert!(EYE_CASCADE.name.ends_with(".xml"));
        assert!(SEETA_FRONTAL_FACE.name.ends_with(".bin"));
    }
}
