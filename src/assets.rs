/// Bundled asset lookup
///
/// Effects are addressed either by absolute path or by a path relative to the
/// application bundle. Bundled assets are opened as a descriptor plus the
/// byte range holding the content.
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Prefix under which bundled assets are addressed
pub const ASSETS_PREFIX: &str = "assets/";

/// Upper bound on what `read_range` reserves before reading
const MAX_PREALLOCATION: u64 = 1 << 20;

/// An open bundled asset: the content lives in `file` at
/// `offset..offset + length`. Closing happens on drop.
#[derive(Debug)]
pub struct AssetDescriptor {
    pub file: File,
    pub offset: u64,
    pub length: u64,
}

impl AssetDescriptor {
    /// Read the whole asset into memory
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        read_range(&self.file, self.offset, self.length)
    }
}

/// Read `length` bytes at `offset` without moving the caller's cursor
pub fn read_range(file: &File, offset: u64, length: u64) -> io::Result<Vec<u8>> {
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    let mut data = Vec::with_capacity(length.min(MAX_PREALLOCATION) as usize);
    file.take(length).read_to_end(&mut data)?;
    Ok(data)
}

pub trait AssetStore {
    /// Open a bundled asset by its path relative to the bundle root
    fn open(&self, relative_path: &str) -> io::Result<AssetDescriptor>;

    /// Resolve a name to the path effects are played from: absolute for
    /// files found on disk, `assets/`-prefixed for bundled ones
    fn full_path(&self, name: &str) -> String;
}

/// Asset store backed by a directory tree
#[derive(Debug, Clone)]
pub struct DirectoryAssetStore {
    root: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl DirectoryAssetStore {
    /// Create a store whose bundled assets live under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            search_dirs: Vec::new(),
        }
    }

    /// Directories searched before the bundle, e.g. downloaded content
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirectoryAssetStore {
    fn open(&self, relative_path: &str) -> io::Result<AssetDescriptor> {
        let path = self.root.join(relative_path);
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        Ok(AssetDescriptor {
            file,
            offset: 0,
            length: metadata.len(),
        })
    }

    fn full_path(&self, name: &str) -> String {
        if name.is_empty() || Path::new(name).is_absolute() {
            return name.to_string();
        }

        for dir in &self.search_dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                if let Ok(absolute) = candidate.canonicalize() {
                    return absolute.to_string_lossy().into_owned();
                }
            }
        }

        if name.starts_with(ASSETS_PREFIX) {
            name.to_string()
        } else {
            format!("{}{}", ASSETS_PREFIX, name)
        }
    }
}

/// Strip a leading `assets/` from a bundled asset path
pub fn bundle_relative(path: &str) -> &str {
    path.strip_prefix(ASSETS_PREFIX).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_bundle_relative() {
        assert_eq!(bundle_relative("assets/sfx/boom.ogg"), "sfx/boom.ogg");
        assert_eq!(bundle_relative("sfx/boom.ogg"), "sfx/boom.ogg");
        // Only a leading prefix is stripped
        assert_eq!(bundle_relative("sfx/assets/boom.ogg"), "sfx/assets/boom.ogg");
    }

    #[test]
    fn test_open_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("click.wav"), b"0123456789").unwrap();

        let store = DirectoryAssetStore::new(dir.path());
        let asset = store.open("click.wav").unwrap();
        assert_eq!(asset.offset, 0);
        assert_eq!(asset.length, 10);
    }

    #[test]
    fn test_read_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.bin");
        fs::write(&path, b"headerPAYLOADtrailer").unwrap();

        let file = File::open(&path).unwrap();
        assert_eq!(read_range(&file, 6, 7).unwrap(), b"PAYLOAD");
        // Reported length past the end of the file only yields what is there
        assert_eq!(read_range(&file, 6, u64::MAX).unwrap(), b"PAYLOADtrailer");

        let store = DirectoryAssetStore::new(dir.path());
        let asset = store.open("pack.bin").unwrap();
        assert_eq!(asset.read_all().unwrap(), b"headerPAYLOADtrailer");
    }

    #[test]
    fn test_open_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryAssetStore::new(dir.path());
        let err = store.open("missing.wav").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_full_path_resolution() {
        let bundle = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();
        fs::write(downloads.path().join("dlc.ogg"), b"x").unwrap();

        let store = DirectoryAssetStore::new(bundle.path())
            .with_search_dirs(vec![downloads.path().to_path_buf()]);

        assert_eq!(store.full_path("/abs/boom.ogg"), "/abs/boom.ogg");
        assert_eq!(store.full_path("sfx/boom.ogg"), "assets/sfx/boom.ogg");
        assert_eq!(store.full_path("assets/sfx/boom.ogg"), "assets/sfx/boom.ogg");

        let resolved = store.full_path("dlc.ogg");
        assert!(Path::new(&resolved).is_absolute());
        assert!(resolved.ends_with("dlc.ogg"));
    }
}
