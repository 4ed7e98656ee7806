//! # Search Pipeline
//!
//! The reverse image search flow, one step per method:
//! ensure the collection, optionally ingest a directory, embed the query,
//! search, and write each match out as `0.png`, `1.png`, ...

use std::fs;
use std::path::{Path, PathBuf};

use kagami_core::{load_image, ImageEmbedder, KagamiError};
use kagami_vecdb::{Hit, Record, SearchRequest, VectorIndex};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// File extensions treated as images during ingest.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"];

/// Whether `path` has one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Outcome of an ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records stored in the index.
    pub inserted: usize,
    /// Image files that could not be decoded, or whose path is not UTF-8
    /// and so cannot be stored as a filename.
    pub skipped: usize,
}

/// One search result, resolved to the image file it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// Position in the result list, starting at 0.
    pub rank: usize,
    pub id: String,
    pub score: f32,
    pub filename: PathBuf,
}

/// Matches found for a query and the files written for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub matches: Vec<Match>,
    pub saved: Vec<PathBuf>,
}

/// Reverse image search over an embedder and a vector index.
pub struct Pipeline<E, I> {
    embedder: E,
    index: I,
    config: PipelineConfig,
}

impl<E: ImageEmbedder, I: VectorIndex> Pipeline<E, I> {
    /// Builds a pipeline, checking that the embedder's output fits the collection.
    pub fn new(embedder: E, index: I, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.collection.dimension {
            return Err(PipelineError::Config(format!(
                "embedder produces {}-d vectors but collection {:?} is {}-d",
                embedder.dimension(),
                config.collection.name,
                config.collection.dimension
            )));
        }
        Ok(Self {
            embedder,
            index,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Creates the collection if it is missing. Returns `true` if it was created.
    pub fn ensure_collection(&self) -> Result<bool> {
        let created = self.index.ensure_collection(&self.config.collection)?;
        if created {
            info!(collection = %self.config.collection.name, "collection created");
        } else {
            debug!(collection = %self.config.collection.name, "collection ready");
        }
        Ok(created)
    }

    /// Embeds every image under `dir` and inserts one record per file,
    /// storing the walked path in the filename field.
    ///
    /// Files that fail to decode or whose path is not valid UTF-8 are
    /// skipped with a warning; any other failure aborts the ingest.
    pub fn ingest(&self, dir: &Path) -> Result<IngestReport> {
        info!(dir = %dir.display(), "ingesting images");
        let mut report = IngestReport::default();
        let mut batch: Vec<Record> = Vec::with_capacity(self.config.batch_size);

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_image_path(entry.path()) {
                continue;
            }

            let path = entry.path();
            let Some(filename) = path.to_str() else {
                warn!(path = %path.display(), "skipping non-UTF-8 path");
                report.skipped += 1;
                continue;
            };
            let embedding = match self.embedder.embed_path(path) {
                Ok(embedding) => embedding,
                Err(KagamiError::ImageDecode { path, reason }) => {
                    warn!(path = %path.display(), %reason, "skipping undecodable image");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            batch.push(
                Record::new(embedding.into_vec())
                    .with_field(self.config.filename_field.clone(), filename),
            );
            if batch.len() == self.config.batch_size {
                report.inserted += self.flush(&mut batch)?;
            }
        }

        if !batch.is_empty() {
            report.inserted += self.flush(&mut batch)?;
        }

        info!(inserted = report.inserted, skipped = report.skipped, "ingest complete");
        Ok(report)
    }

    fn flush(&self, batch: &mut Vec<Record>) -> Result<usize> {
        let inserted = self.index.insert(&self.config.collection, batch)?;
        debug!(inserted, "flushed batch");
        batch.clear();
        Ok(inserted)
    }

    /// Embeds `query` and returns the top-k matches, best first.
    pub fn search(&self, query: &Path) -> Result<Vec<Match>> {
        info!(query = %query.display(), limit = self.config.limit, "searching");
        let embedding = self.embedder.embed_path(query)?;

        let request = SearchRequest::new(embedding.into_vec(), self.config.limit)
            .with_metric(self.config.collection.metric)
            .with_output_field(self.config.filename_field.clone());
        let hits = self.index.search(&self.config.collection, &request)?;

        hits.into_iter()
            .enumerate()
            .map(|(rank, hit)| self.to_match(rank, hit))
            .collect()
    }

    fn to_match(&self, rank: usize, hit: Hit) -> Result<Match> {
        let field = &self.config.filename_field;
        let filename = hit
            .field_str(field)
            .map(PathBuf::from)
            .ok_or_else(|| PipelineError::MissingField {
                id: hit.id.clone(),
                field: field.clone(),
            })?;
        info!(rank, id = %hit.id, score = hit.score, filename = %filename.display(), "hit");
        Ok(Match {
            rank,
            id: hit.id,
            score: hit.score,
            filename,
        })
    }

    /// Opens each match's image and writes it as `{out_dir}/{rank}.png`.
    pub fn save_matches(&self, matches: &[Match], out_dir: &Path) -> Result<Vec<PathBuf>> {
        if matches.is_empty() {
            warn!("no matches to save");
            return Ok(Vec::new());
        }
        fs::create_dir_all(out_dir)?;

        let mut saved = Vec::with_capacity(matches.len());
        for (idx, found) in matches.iter().enumerate() {
            let image = load_image(&found.filename)?;
            let target = out_dir.join(format!("{idx}.png"));
            image
                .save_with_format(&target, image::ImageFormat::Png)
                .map_err(|source| PipelineError::ImageSave {
                    path: target.clone(),
                    source,
                })?;
            debug!(from = %found.filename.display(), to = %target.display(), "saved match");
            saved.push(target);
        }

        info!(count = saved.len(), dir = %out_dir.display(), "saved matches");
        Ok(saved)
    }

    /// Ensure, search, and save into the configured output directory.
    pub fn run(&self, query: &Path) -> Result<RunReport> {
        self.ensure_collection()?;
        let matches = self.search(query)?;
        let saved = self.save_matches(&matches, &self.config.output_dir)?;
        Ok(RunReport { matches, saved })
    }
}
