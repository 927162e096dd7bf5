use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("model {name} not found in {searched} and no download URL configured")]
    Unresolved { name: String, searched: String },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for the detection model.
#[derive(Debug, Clone, Default)]
pub struct ModelLocation<'a> {
    /// A path given by the operator; used as-is and never downloaded.
    pub explicit: Option<&'a Path>,
    pub name: &'a str,
    pub url: Option<&'a str>,
    /// Training output directory checked after the cache.
    pub bundled_dir: Option<&'a Path>,
}

/// Resolve the model file.
///
/// Resolution order:
/// 1. Explicit path (error if missing)
/// 2. User cache directory (platform-specific)
/// 3. Bundled path (training output / pre-packaged installs)
/// 4. Download from URL to cache, when a URL is configured
pub fn resolve(
    location: &ModelLocation<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = location.explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::NotFound(path.to_path_buf()))
        };
    }
    resolve_in(&model_cache_dir()?, location, progress)
}

fn resolve_in(
    cache_dir: &Path,
    location: &ModelLocation<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(location.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = location.bundled_dir {
        let bundled_path = dir.join(location.name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = location.url else {
        let mut searched = vec![cache_dir.display().to_string()];
        if let Some(dir) = location.bundled_dir {
            searched.push(dir.display().to_string());
        }
        return Err(ModelResolveError::Unresolved {
            name: location.name.to_string(),
            searched: searched.join(", "),
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {url}", location.name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Maskwatch/models/`
/// - Linux: `$XDG_CACHE_HOME/Maskwatch/models/` or `~/.cache/Maskwatch/models/`
/// - Windows: `%LOCALAPPDATA%/Maskwatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Maskwatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Maskwatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    // Clean up .part file on any error
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn location<'a>(bundled: Option<&'a Path>, url: Option<&'a str>) -> ModelLocation<'a> {
        ModelLocation {
            explicit: None,
            name: "test_model.onnx",
            url,
            bundled_dir: bundled,
        }
    }

    #[test]
    fn test_explicit_path_is_used_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.onnx");
        fs::write(&path, b"model").unwrap();

        let loc = ModelLocation {
            explicit: Some(&path),
            ..location(None, None)
        };
        assert_eq!(resolve(&loc, None).unwrap(), path);
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let loc = ModelLocation {
            explicit: Some(Path::new("/nonexistent/custom.onnx")),
            ..location(None, Some("http://invalid.example.com/m.onnx"))
        };
        assert!(matches!(
            resolve(&loc, None),
            Err(ModelResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_cache_wins_over_bundled() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(cache.join("test_model.onnx"), b"cached").unwrap();
        fs::write(bundled.join("test_model.onnx"), b"bundled").unwrap();

        let found = resolve_in(&cache, &location(Some(&bundled), None), None).unwrap();
        assert_eq!(found, cache.join("test_model.onnx"));
    }

    #[test]
    fn test_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("test_model.onnx"), b"bundled").unwrap();

        let found =
            resolve_in(&tmp.path().join("cache"), &location(Some(&bundled), None), None).unwrap();
        assert_eq!(found, bundled.join("test_model.onnx"));
    }

    #[test]
    fn test_unresolved_without_url() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_in(tmp.path(), &location(None, None), None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Unresolved { .. }));
        assert!(err.to_string().contains("test_model.onnx"));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("Maskwatch"));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
