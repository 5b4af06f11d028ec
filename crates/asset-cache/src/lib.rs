//! # asset-cache
//!
//! Download-once, reuse-forever local storage for the binary assets the
//! translation pipeline needs at runtime:
//!
//! - the [PDFium](https://pdfium.googlesource.com/pdfium/) shared library used
//!   by `pdfium-render` (shipped as a `.tgz`, one member extracted), and
//! - target-script TrueType fonts (plain files).
//!
//! ## How it works
//!
//! [`AssetStore::ensure`] is idempotent:
//!
//! 1. If `<root>/<file_name>` exists, its path is returned immediately.
//! 2. Otherwise a `<file_name>.lock` file is created with `create_new`. Only the
//!    holder downloads; other callers (threads or processes) poll until the
//!    asset appears or the lock goes stale.
//! 3. The payload is written to a hidden `.part` file and `rename`d into place,
//!    so a reader never observes a half-written asset.
//!
//! ## Environment variable overrides
//!
//! - `PDFIUM_LIB_PATH` — path to an existing pdfium library; skips download.
//! - `ASSET_CACHE_DIR` — override the default cache directory.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Public constants ─────────────────────────────────────────────────────────

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const PDFIUM_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A lock file older than this is assumed to belong to a crashed process.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(600);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by asset-cache operations.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The current OS/architecture combination has no pdfium build.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Could not create or write inside the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// Another holder kept the asset lock for longer than the timeout.
    #[error("Timed out after {secs}s waiting for lock '{path}'")]
    LockTimeout { path: PathBuf, secs: u64 },

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Asset descriptions ───────────────────────────────────────────────────────

/// How the downloaded bytes map to the stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    /// The response body is the asset.
    File,
    /// The response body is a gzipped tarball; store only this member.
    TarGzMember(String),
}

/// A remote asset that is fetched once and then served from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    /// File name inside the store root. Doubles as the cache key.
    pub file_name: String,
    pub url: String,
    pub kind: AssetKind,
}

impl RemoteAsset {
    pub fn file(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
            kind: AssetKind::File,
        }
    }

    pub fn tar_gz_member(
        file_name: impl Into<String>,
        url: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
            kind: AssetKind::TarGzMember(member.into()),
        }
    }
}

/// Regular and bold faces of one font family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPair {
    pub regular: RemoteAsset,
    pub bold: RemoteAsset,
}

impl FontPair {
    /// Describe a family whose faces are stored as `<family>-Regular.ttf`
    /// and `<family>-Bold.ttf`.
    pub fn new(family: &str, regular_url: impl Into<String>, bold_url: impl Into<String>) -> Self {
        Self {
            regular: RemoteAsset::file(format!("{family}-Regular.ttf"), regular_url),
            bold: RemoteAsset::file(format!("{family}-Bold.ttf"), bold_url),
        }
    }
}

/// Local paths of a provisioned [`FontPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPaths {
    pub regular: PathBuf,
    pub bold: PathBuf,
}

/// Callback receiving `(bytes_downloaded, total_bytes)` during a download.
pub type ProgressFn<'a> = &'a dyn Fn(u64, Option<u64>);

// ── Cache directory resolution ───────────────────────────────────────────────

/// Root directory shared by every store created with default locations.
///
/// - **macOS**: `~/Library/Caches/pdftranslate/`
/// - **Linux**: `~/.cache/pdftranslate/`
/// - **Windows**: `%LOCALAPPDATA%\pdftranslate\`
///
/// Override by setting `ASSET_CACHE_DIR`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ASSET_CACHE_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("pdftranslate")
}

// ── Store ────────────────────────────────────────────────────────────────────

/// A directory of downloaded assets keyed by file name.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    timeout: Duration,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Store for fonts under [`default_cache_dir`].
    pub fn fonts() -> Self {
        Self::new(default_cache_dir().join("fonts"))
    }

    /// Network and lock-wait timeout. Default: 120 s.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, asset: &RemoteAsset) -> PathBuf {
        self.root.join(&asset.file_name)
    }

    pub fn is_cached(&self, asset: &RemoteAsset) -> bool {
        self.path_for(asset).is_file()
    }

    /// Return the local path of `asset`, downloading it first if absent.
    ///
    /// Safe under concurrent first use from several threads or processes:
    /// exactly one caller downloads, the rest wait for the renamed file.
    pub fn ensure(
        &self,
        asset: &RemoteAsset,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<PathBuf, AssetError> {
        let dest = self.path_for(asset);
        if dest.is_file() {
            return Ok(dest);
        }

        fs::create_dir_all(&self.root).map_err(AssetError::CacheDir)?;

        let lock_path = self.root.join(format!("{}.lock", asset.file_name));
        let Some(_lock) = FileLock::acquire(&lock_path, &dest, self.timeout)? else {
            debug!("{} provisioned by another holder", asset.file_name);
            return Ok(dest);
        };

        // The previous holder may have finished between our check and the lock.
        if dest.is_file() {
            return Ok(dest);
        }

        info!("Downloading {} from {}", asset.file_name, asset.url);
        let body = download_bytes(&asset.url, self.timeout, on_progress)?;
        let payload = match &asset.kind {
            AssetKind::File => body,
            AssetKind::TarGzMember(member) => extract_member(&body, member)?,
        };

        write_atomically(&dest, &payload)?;
        info!("Cached {} ({} bytes)", dest.display(), payload.len());
        Ok(dest)
    }

    /// Provision both faces of a font family.
    pub fn ensure_fonts(&self, fonts: &FontPair) -> Result<FontPaths, AssetError> {
        Ok(FontPaths {
            regular: self.ensure(&fonts.regular, None)?,
            bold: self.ensure(&fonts.bold, None)?,
        })
    }
}

// ── PDFium ───────────────────────────────────────────────────────────────────

struct PlatformInfo {
    /// Asset filename in the GitHub release, e.g. `pdfium-mac-arm64.tgz`.
    archive_name: &'static str,
    /// Relative path inside the archive, e.g. `lib/libpdfium.dylib`.
    member: &'static str,
    /// Filename to write on disk, e.g. `libpdfium.dylib`.
    lib_name: &'static str,
}

fn detect_platform() -> Result<PlatformInfo, AssetError> {
    const DYLIB: (&str, &str) = ("lib/libpdfium.dylib", "libpdfium.dylib");
    const SO: (&str, &str) = ("lib/libpdfium.so", "libpdfium.so");
    const DLL: (&str, &str) = ("bin/pdfium.dll", "pdfium.dll");

    let (archive_name, (member, lib_name)) =
        match (std::env::consts::OS, std::env::consts::ARCH) {
            ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", DYLIB),
            ("macos", "x86_64") => ("pdfium-mac-x64.tgz", DYLIB),
            ("linux", "x86_64") => ("pdfium-linux-x64.tgz", SO),
            ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", SO),
            ("windows", "x86_64") => ("pdfium-win-x64.tgz", DLL),
            ("windows", "aarch64") => ("pdfium-win-arm64.tgz", DLL),
            ("windows", "x86") => ("pdfium-win-x86.tgz", DLL),
            (os, arch) => {
                return Err(AssetError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };

    Ok(PlatformInfo {
        archive_name,
        member,
        lib_name,
    })
}

/// The pdfium library for the current platform as a [`RemoteAsset`].
pub fn pdfium_asset() -> Result<RemoteAsset, AssetError> {
    let info = detect_platform()?;
    Ok(RemoteAsset::tar_gz_member(
        info.lib_name,
        format!(
            "{PDFIUM_BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}",
            info.archive_name
        ),
        info.member,
    ))
}

/// Per-version store holding the pdfium library.
pub fn pdfium_store() -> AssetStore {
    AssetStore::new(default_cache_dir().join(format!("pdfium-{PDFIUM_VERSION}")))
}

static RESOLVED_PDFIUM: OnceLock<PathBuf> = OnceLock::new();

/// Returns `true` if no network access is needed to bind pdfium.
pub fn is_pdfium_cached() -> bool {
    if let Some(p) = env_pdfium_path() {
        return p.exists();
    }
    pdfium_asset()
        .map(|asset| pdfium_store().is_cached(&asset))
        .unwrap_or(false)
}

/// Ensures the PDFium dynamic library is present locally and returns its path.
///
/// `PDFIUM_LIB_PATH` wins when it points at an existing file.
pub fn ensure_pdfium_library(on_progress: Option<ProgressFn<'_>>) -> Result<PathBuf, AssetError> {
    if let Some(path) = RESOLVED_PDFIUM.get() {
        return Ok(path.clone());
    }

    let path = match env_pdfium_path() {
        Some(p) if p.exists() => p,
        other => {
            if let Some(missing) = other {
                warn!(
                    "PDFIUM_LIB_PATH '{}' not found; falling back to the cache",
                    missing.display()
                );
            }
            pdfium_store().ensure(&pdfium_asset()?, on_progress)?
        }
    };

    let _ = RESOLVED_PDFIUM.set(path.clone());
    Ok(path)
}

/// Binds to PDFium, downloading it first if necessary.
pub fn bind_pdfium(on_progress: Option<ProgressFn<'_>>) -> Result<Pdfium, AssetError> {
    let lib_path = ensure_pdfium_library(on_progress)?;
    bind_pdfium_from_path(&lib_path)
}

/// Binds to a PDFium library at an explicit `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, AssetError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| AssetError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn env_pdfium_path() -> Option<PathBuf> {
    std::env::var("PDFIUM_LIB_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Exclusive lock file, removed on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Take the lock, or return `Ok(None)` once `dest` shows up while waiting.
    fn acquire(path: &Path, dest: &Path, timeout: Duration) -> Result<Option<Self>, AssetError> {
        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut f) => {
                    let _ = writeln!(f, "{}", std::process::id());
                    return Ok(Some(Self {
                        path: path.to_path_buf(),
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if dest.is_file() {
                        return Ok(None);
                    }
                    if lock_is_stale(path) {
                        warn!("Removing stale lock {}", path.display());
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    if start.elapsed() >= timeout {
                        return Err(AssetError::LockTimeout {
                            path: path.to_path_buf(),
                            secs: timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(AssetError::CacheDir(e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > LOCK_STALE_AFTER)
}

/// Write to a sibling `.part` file, then rename over `dest`.
fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<(), AssetError> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string());
    let tmp = dest.with_file_name(format!(".{name}.{}.part", std::process::id()));

    let result = (|| {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, dest)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(AssetError::CacheDir(e));
    }
    Ok(())
}

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
fn download_bytes(
    url: &str,
    timeout: Duration,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<Vec<u8>, AssetError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("asset-cache/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| AssetError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| AssetError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(AssetError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(1024 * 1024) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(AssetError::Download(format!("Read error: {e}"))),
        }
    }

    Ok(buf)
}

/// Pull a single member out of a gzipped tar archive.
fn extract_member(archive_bytes: &[u8], member: &str) -> Result<Vec<u8>, AssetError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive_bytes));
    let entries = archive
        .entries()
        .map_err(|e| AssetError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| AssetError::Extract(e.to_string()))?;
        let is_member = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .map_err(|e| AssetError::Extract(e.to_string()))?;
        if is_member {
            let mut out = Vec::new();
            entry
                .read_to_end(&mut out)
                .map_err(|e| AssetError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(out);
        }
    }

    Err(AssetError::Extract(format!(
        "'{member}' not found in archive"
    )))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_asset(name: &str) -> RemoteAsset {
        RemoteAsset::file(name, "http://127.0.0.1:9/never")
    }

    #[test]
    fn detect_platform_is_supported() {
        detect_platform().expect("current platform should be supported");
    }

    #[test]
    fn pdfium_asset_points_at_release() {
        let asset = pdfium_asset().unwrap();
        assert!(asset.url.contains(PDFIUM_VERSION));
        assert!(matches!(asset.kind, AssetKind::TarGzMember(_)));
    }

    #[test]
    fn cache_dir_override_via_env() {
        std::env::set_var("ASSET_CACHE_DIR", "/tmp/test_asset_cache_override");
        let d = default_cache_dir();
        std::env::remove_var("ASSET_CACHE_DIR");
        assert_eq!(d, PathBuf::from("/tmp/test_asset_cache_override"));
    }

    #[test]
    fn font_pair_file_names() {
        let pair = FontPair::new("NotoSansDevanagari", "https://a/r.ttf", "https://a/b.ttf");
        assert_eq!(pair.regular.file_name, "NotoSansDevanagari-Regular.ttf");
        assert_eq!(pair.bold.file_name, "NotoSansDevanagari-Bold.ttf");
    }

    #[test]
    fn ensure_serves_existing_file_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path());
        let asset = unreachable_asset("Cached-Regular.ttf");
        fs::write(store.path_for(&asset), b"font").unwrap();

        assert!(store.is_cached(&asset));
        let path = store.ensure(&asset, None).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"font");
    }

    #[test]
    fn ensure_reports_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path()).with_timeout(Duration::from_secs(2));
        let asset = unreachable_asset("Missing.ttf");

        let err = store.ensure(&asset, None).unwrap_err();
        assert!(matches!(err, AssetError::Download(_)), "got {err:?}");
        // Lock is released and nothing half-written is left behind.
        assert!(!dir.path().join("Missing.ttf.lock").exists());
        assert!(!store.is_cached(&asset));
    }

    #[test]
    fn lock_yields_when_asset_appears() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("a.lock");
        let dest = dir.path().join("a");

        let held = FileLock::acquire(&lock, &dest, Duration::from_secs(1))
            .unwrap()
            .expect("first caller takes the lock");
        fs::write(&dest, b"done").unwrap();

        let second = FileLock::acquire(&lock, &dest, Duration::from_secs(1)).unwrap();
        assert!(second.is_none());

        drop(held);
        assert!(!lock.exists());
    }

    #[test]
    fn lock_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("b.lock");
        let dest = dir.path().join("b");

        let _held = FileLock::acquire(&lock, &dest, Duration::from_secs(1)).unwrap();
        let err = FileLock::acquire(&lock, &dest, Duration::from_millis(150)).unwrap_err();
        assert!(matches!(err, AssetError::LockTimeout { .. }));
    }

    #[test]
    fn write_atomically_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.ttf");
        write_atomically(&dest, b"abc").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"abc");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn extract_member_from_tarball() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (name, body) in [("lib/other.txt", &b"no"[..]), ("lib/libpdfium.so", &b"elf"[..])] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body).unwrap();
        }
        let gz = builder.into_inner().unwrap().finish().unwrap();

        assert_eq!(extract_member(&gz, "lib/libpdfium.so").unwrap(), b"elf");
        assert!(matches!(
            extract_member(&gz, "lib/missing.so"),
            Err(AssetError::Extract(_))
        ));
    }
}
