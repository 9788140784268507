/// Content access: where chapter and ending documents come from.
///
/// The engine only needs raw JSON by id. Ids starting with `ending_` are
/// served from the ending store, everything else from the chapter store.
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::chapter::is_ending_id;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ContentKind, id: String },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Host(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Chapter,
    Ending,
}

impl ContentKind {
    pub fn for_id(id: &str) -> ContentKind {
        if is_ending_id(id) {
            ContentKind::Ending
        } else {
            ContentKind::Chapter
        }
    }

    /// Store directory name.
    pub fn dir(self) -> &'static str {
        match self {
            ContentKind::Chapter => "chapters",
            ContentKind::Ending => "endings",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Chapter => write!(f, "chapter"),
            ContentKind::Ending => write!(f, "ending"),
        }
    }
}

/// Host-side URL path of a document: `/chapters/<id>.json` or
/// `/endings/<id>.json`.
pub fn content_path(id: &str) -> String {
    format!("/{}/{}.json", ContentKind::for_id(id).dir(), id)
}

/// A load the engine has started and is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub id: String,
    pub kind: ContentKind,
    pub path: String,
}

impl ContentRequest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: ContentKind::for_id(id),
            path: content_path(id),
        }
    }
}

/// Supplies raw chapter and ending documents.
pub trait ContentSource {
    fn fetch_chapter(&self, id: &str) -> Result<String, FetchError>;
    fn fetch_ending(&self, id: &str) -> Result<String, FetchError>;

    /// Route by id prefix.
    fn fetch(&self, id: &str) -> Result<String, FetchError> {
        match ContentKind::for_id(id) {
            ContentKind::Chapter => self.fetch_chapter(id),
            ContentKind::Ending => self.fetch_ending(id),
        }
    }
}

/// Documents on disk under `<root>/chapters/` and `<root>/endings/`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: ContentKind, id: &str) -> PathBuf {
        self.root.join(kind.dir()).join(format!("{id}.json"))
    }

    /// Ids of every `.json` document in a store, sorted.
    pub fn ids(&self, kind: ContentKind) -> Result<Vec<String>, FetchError> {
        let dir = self.root.join(kind.dir());
        let mut ids = Vec::new();
        if !dir.exists() {
            return Ok(ids);
        }
        load_json_files_from_dir(&dir, |path| {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        })?;
        ids.sort();
        Ok(ids)
    }

    fn read(&self, kind: ContentKind, id: &str) -> Result<String, FetchError> {
        let path = self.path_for(kind, id);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound {
                kind,
                id: id.to_string(),
            }),
            Err(source) => Err(FetchError::Io { path, source }),
        }
    }
}

impl ContentSource for DirectorySource {
    fn fetch_chapter(&self, id: &str) -> Result<String, FetchError> {
        self.read(ContentKind::Chapter, id)
    }

    fn fetch_ending(&self, id: &str) -> Result<String, FetchError> {
        self.read(ContentKind::Ending, id)
    }
}

/// Call `visit` for every `.json` file in `dir`.
fn load_json_files_from_dir<F>(dir: &Path, mut visit: F) -> Result<(), FetchError>
where
    F: FnMut(&Path),
{
    let io_err = |source| FetchError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            visit(&path);
        }
    }
    Ok(())
}

/// Documents held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    chapters: FxHashMap<String, String>,
    endings: FxHashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document; the id prefix decides which store.
    pub fn insert(&mut self, id: &str, raw: impl Into<String>) {
        let store = match ContentKind::for_id(id) {
            ContentKind::Chapter => &mut self.chapters,
            ContentKind::Ending => &mut self.endings,
        };
        store.insert(id.to_string(), raw.into());
    }

    pub fn with(mut self, id: &str, raw: impl Into<String>) -> Self {
        self.insert(id, raw);
        self
    }
}

impl ContentSource for MemorySource {
    fn fetch_chapter(&self, id: &str) -> Result<String, FetchError> {
        self.chapters
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                kind: ContentKind::Chapter,
                id: id.to_string(),
            })
    }

    fn fetch_ending(&self, id: &str) -> Result<String, FetchError> {
        self.endings
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                kind: ContentKind::Ending,
                id: id.to_string(),
            })
    }
}
