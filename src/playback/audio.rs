use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::dataset::level_of;
use crate::error::{DrillError, Result};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Chinese,
}

impl Language {
    fn file_suffix(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
        }
    }
}

/// Audio files of one batch, keyed by sentence id and language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioManifest {
    clips: HashMap<(u32, Language), PathBuf>,
}

impl AudioManifest {
    pub fn insert(&mut self, sentence_id: u32, language: Language, asset: PathBuf) {
        self.clips.insert((sentence_id, language), asset);
    }

    pub fn get(&self, sentence_id: u32, language: Language) -> Option<&Path> {
        self.clips.get(&(sentence_id, language)).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// One playback request: a single repeat of one language of one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    pub sentence_id: u32,
    pub language: Language,
    /// 1-based repeat number within the language.
    pub repeat: u32,
    pub asset: PathBuf,
}

/// Plays clips. `release` must be safe to call more than once and on a finished handle.
pub trait AudioService: Send + Sync {
    type Handle: Send + Sync;

    fn play(
        &self,
        clip: &ClipRequest,
        speed: f32,
    ) -> impl Future<Output = Result<Self::Handle>> + Send;

    fn wait(&self, handle: &Self::Handle) -> impl Future<Output = Result<()>> + Send;

    fn release(&self, handle: &Self::Handle) -> impl Future<Output = ()> + Send;
}

pub trait ManifestResolver: Send + Sync {
    fn resolve(&self, level: &str, batch: u32) -> impl Future<Output = Result<AudioManifest>> + Send;
}

/// Looks for `<root>/hsk<level>/batch<batch>/<id>_en.*` and `<id>_zh.*`.
#[derive(Debug, Clone)]
pub struct DirectoryManifest {
    root: PathBuf,
}

impl DirectoryManifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn batch_dir(&self, level: &str, batch: u32) -> PathBuf {
        self.root
            .join(format!("hsk{}", level.to_lowercase()))
            .join(format!("batch{}", batch))
    }
}

impl ManifestResolver for DirectoryManifest {
    async fn resolve(&self, level: &str, batch: u32) -> Result<AudioManifest> {
        let dir = self.batch_dir(level, batch);
        let failure = |reason: String| DrillError::ManifestLoadFailure {
            level: level.to_string(),
            batch,
            reason,
        };

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| failure(format!("{}: {}", dir.display(), e)))?;

        let mut manifest = AudioManifest::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| failure(e.to_string()))?
        {
            let path = entry.path();
            match parse_clip_name(&path) {
                Some((id, language)) => manifest.insert(id, language, path),
                None => debug!("Ignoring {} in audio directory", path.display()),
            }
        }
        Ok(manifest)
    }
}

fn parse_clip_name(path: &Path) -> Option<(u32, Language)> {
    let stem = path.file_stem()?.to_str()?;
    let (id, suffix) = stem.rsplit_once('_')?;
    let language = [Language::English, Language::Chinese]
        .into_iter()
        .find(|l| l.file_suffix() == suffix)?;
    Some((id.parse().ok()?, language))
}

/// Resolves the manifest for a batch, retrying a bounded number of times.
/// Exhausted retries give an empty manifest: the batch still opens, just without sound.
pub async fn load_manifest(
    resolver: &impl ManifestResolver,
    group: &str,
    batch: u32,
    retries: u32,
) -> AudioManifest {
    let level = level_of(group);
    let mut attempt = 0;
    loop {
        match resolver.resolve(level, batch).await {
            Ok(manifest) => return manifest,
            Err(e) if attempt < retries => {
                attempt += 1;
                debug!("Manifest attempt {} failed: {}", attempt, e);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => {
                warn!("{}", e);
                return AudioManifest::default();
            }
        }
    }
}
