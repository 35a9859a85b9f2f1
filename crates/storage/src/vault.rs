//! Markdown vault backend.
//!
//! Resources are notes under `04_resources/` whose YAML frontmatter carries
//! the learning-state fields. The learning path is a note under `02_projects/`
//! with `type: learning_path`. Writes merge into the existing frontmatter and
//! keep the note body untouched.

use std::fs;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use coach_core::model::{
    CompletionStatus, LearningPath, LearningStatus, ResourceId, ResourceRecord, ResourceUpdate,
    RetentionScore, RiskLevel, DEFAULT_WEEKLY_TARGET_HOURS,
};
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::repository::{LearningPathRepository, ResourceRepository, StorageError};

pub const RESOURCES_DIR: &str = "04_resources";
pub const PROJECTS_DIR: &str = "02_projects";
const LEARNING_PATH_TYPE: &str = "learning_path";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    #[error("vault directory does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("frontmatter in {0} is not a mapping")]
    NotAMapping(PathBuf),
}

impl From<VaultError> for StorageError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                StorageError::NotFound
            }
            VaultError::Io { .. } | VaultError::MissingRoot(_) => {
                StorageError::Connection(err.to_string())
            }
            VaultError::Frontmatter { .. } | VaultError::NotAMapping(_) => {
                StorageError::Serialization(err.to_string())
            }
        }
    }
}

//
// ─── NOTES ─────────────────────────────────────────────────────────────────────
//

/// A markdown note split into frontmatter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub frontmatter: Mapping,
    pub body: String,
}

/// Split `---`-delimited frontmatter from the body.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    let after = &rest[end + 4..];
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);
    Some((yaml, body.trim_start_matches(['\r', '\n'])))
}

impl Note {
    /// Parse note text. A note without frontmatter gets an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns `VaultError` if the frontmatter is not valid YAML or not a mapping.
    pub fn parse(path: &Path, content: &str) -> Result<Self, VaultError> {
        let Some((yaml, body)) = split_frontmatter(content) else {
            return Ok(Self {
                frontmatter: Mapping::new(),
                body: content.to_owned(),
            });
        };

        let frontmatter = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(yaml).map_err(|source| VaultError::Frontmatter {
                path: path.to_path_buf(),
                source,
            })? {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => return Err(VaultError::NotAMapping(path.to_path_buf())),
            }
        };

        Ok(Self {
            frontmatter,
            body: body.to_owned(),
        })
    }

    /// Render back to markdown.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Frontmatter` if the mapping cannot be serialized.
    pub fn render(&self, path: &Path) -> Result<String, VaultError> {
        let yaml = serde_yaml::to_string(&self.frontmatter).map_err(|source| {
            VaultError::Frontmatter {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let mut out = String::with_capacity(yaml.len() + self.body.len() + 16);
        out.push_str("---\n");
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n");
        if !self.body.is_empty() {
            out.push('\n');
            out.push_str(&self.body);
        }
        Ok(out)
    }
}

//
// ─── FRONTMATTER FIELDS ────────────────────────────────────────────────────────
//

fn get_str<'a>(fm: &'a Mapping, key: &str) -> Option<&'a str> {
    fm.get(key).and_then(Value::as_str).map(str::trim)
}

fn get_f64(fm: &Mapping, key: &str) -> Option<f64> {
    let value = match fm.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn get_i64(fm: &Mapping, key: &str) -> Option<i64> {
    match fm.get(key)? {
        // whole-number floats such as `72.0`
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_date(path: &Path, fm: &Mapping, key: &str) -> Option<NaiveDate> {
    let raw = get_str(fm, key).filter(|s| !s.is_empty())?;
    let day = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(err) => {
            warn!(note = %path.display(), field = key, value = raw, error = %err, "unparsable date treated as absent");
            None
        }
    }
}

fn get_enum<T: std::str::FromStr + Default>(path: &Path, fm: &Mapping, key: &str) -> T {
    match get_str(fm, key) {
        None | Some("") => T::default(),
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(note = %path.display(), field = key, value = raw, "unknown value, using default");
            T::default()
        }),
    }
}

fn get_string_list(fm: &Mapping, key: &str) -> Vec<String> {
    match fm.get(key) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_owned()],
        _ => Vec::new(),
    }
}

fn set(fm: &mut Mapping, key: &str, value: impl Into<Value>) {
    fm.insert(Value::String(key.to_owned()), value.into());
}

fn set_opt_date(fm: &mut Mapping, key: &str, value: Option<NaiveDate>) {
    match value {
        Some(day) => set(fm, key, day.format("%Y-%m-%d").to_string()),
        None => {
            fm.remove(key);
        }
    }
}

/// Build a record from frontmatter, defaulting anything missing or malformed.
fn record_from_frontmatter(path: &Path, id: ResourceId, fm: &Mapping) -> ResourceRecord {
    let title = get_str(fm, "title")
        .filter(|t| !t.is_empty())
        .map_or_else(|| id.title_hint().to_owned(), str::to_owned);

    let retention_score = match get_i64(fm, "retention_score") {
        None => RetentionScore::INITIAL,
        Some(raw) => RetentionScore::try_from(raw).unwrap_or_else(|_| {
            warn!(note = %path.display(), value = raw, "retention score out of range, clamping");
            RetentionScore::saturating(raw)
        }),
    };

    let mut record = ResourceRecord::new(id, title);
    record.learning_status = get_enum::<LearningStatus>(path, fm, "learning_status");
    record.last_reviewed = get_date(path, fm, "last_reviewed");
    record.next_review = get_date(path, fm, "next_review");
    record.review_count = get_i64(fm, "review_count")
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(0);
    record.retention_score = retention_score;
    record.abandonment_risk = get_enum::<RiskLevel>(path, fm, "abandonment_risk");
    record.hours_invested = get_f64(fm, "hours_invested").unwrap_or(0.0).max(0.0);
    record.estimated_hours = get_f64(fm, "estimated_hours").unwrap_or(0.0).max(0.0);
    record.completion_status = get_enum::<CompletionStatus>(path, fm, "completion_status");
    record.key_insights = get_string_list(fm, "key_insights");
    record.learning_path = get_str(fm, "learning_path")
        .filter(|p| !p.is_empty())
        .map(str::to_owned);
    record
}

/// Merge record fields into existing frontmatter, keeping unknown keys.
fn merge_into_frontmatter(record: &ResourceRecord, fm: &mut Mapping) {
    set(fm, "title", record.title.clone());
    set(fm, "learning_status", record.learning_status.as_str());
    set_opt_date(fm, "last_reviewed", record.last_reviewed);
    set_opt_date(fm, "next_review", record.next_review);
    set(fm, "review_count", u64::from(record.review_count));
    set(fm, "retention_score", u64::from(record.retention_score.value()));
    set(fm, "abandonment_risk", record.abandonment_risk.as_str());
    set(fm, "hours_invested", record.hours_invested);
    set(fm, "estimated_hours", record.estimated_hours);
    set(fm, "completion_status", record.completion_status.as_str());
    set(
        fm,
        "key_insights",
        Value::Sequence(
            record
                .key_insights
                .iter()
                .map(|s| Value::String(s.clone()))
                .collect(),
        ),
    );
    match &record.learning_path {
        Some(p) => set(fm, "learning_path", p.clone()),
        None => {
            fm.remove("learning_path");
        }
    }
}

fn path_from_frontmatter(note_path: &Path, fm: &Mapping) -> LearningPath {
    let name = get_str(fm, "path_name")
        .or_else(|| get_str(fm, "title"))
        .filter(|n| !n.is_empty())
        .map_or_else(
            || {
                note_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            },
            str::to_owned,
        );

    let progress = get_i64(fm, "overall_progress").unwrap_or(0).clamp(0, 100);

    LearningPath {
        name,
        weekly_target_hours: get_f64(fm, "weekly_target_hours")
            .unwrap_or(DEFAULT_WEEKLY_TARGET_HOURS)
            .max(0.0),
        current_milestone: get_str(fm, "current_milestone")
            .filter(|m| !m.is_empty())
            .map(str::to_owned),
        overall_progress: u8::try_from(progress).unwrap_or(0),
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "learning-path".to_owned()
    } else {
        trimmed.to_owned()
    }
}

//
// ─── REPOSITORY ────────────────────────────────────────────────────────────────
//

/// Vault-backed resource and learning-path repository.
#[derive(Debug, Clone)]
pub struct VaultRepository {
    root: PathBuf,
}

impl VaultRepository {
    /// Open an existing vault directory.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::MissingRoot` if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VaultError::MissingRoot(root));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a resource note. `None` for ids that escape the vault.
    fn note_path(&self, id: &ResourceId) -> Option<PathBuf> {
        let rel = Path::new(id.as_str());
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(rel))
    }

    fn relative_id(&self, path: &Path) -> Option<ResourceId> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(ResourceId::new(parts.join("/")))
    }

    fn markdown_files(&self, dir: &str) -> Vec<PathBuf> {
        let base = self.root.join(dir);
        if !base.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(&base)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .filter(|p| {
                !p.strip_prefix(&base)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .split('/')
                    .any(|seg| seg.starts_with('.'))
            })
            .collect();
        files.sort();
        files
    }

    fn read_note(path: &Path) -> Result<Note, VaultError> {
        let content = fs::read_to_string(path).map_err(|source| VaultError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Note::parse(path, &content)
    }

    fn write_note(path: &Path, note: &Note) -> Result<(), VaultError> {
        let rendered = note.render(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| VaultError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, rendered).map_err(|source| VaultError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load every resource note. Notes with broken frontmatter are listed with defaults.
    fn load_resources(&self) -> Vec<ResourceRecord> {
        let mut out = Vec::new();
        for path in self.markdown_files(RESOURCES_DIR) {
            let Some(id) = self.relative_id(&path) else {
                continue;
            };
            let frontmatter = match Self::read_note(&path) {
                Ok(note) => note.frontmatter,
                Err(VaultError::Io { source, .. }) => {
                    warn!(note = %path.display(), error = %source, "skipping unreadable note");
                    continue;
                }
                Err(err) => {
                    warn!(note = %path.display(), error = %err, "ignoring invalid frontmatter");
                    Mapping::new()
                }
            };
            out.push(record_from_frontmatter(&path, id, &frontmatter));
        }
        out
    }

    fn learning_path_notes(&self) -> Vec<(PathBuf, Note)> {
        self.markdown_files(PROJECTS_DIR)
            .into_iter()
            .filter_map(|path| match Self::read_note(&path) {
                Ok(note) => Some((path, note)),
                Err(err) => {
                    warn!(note = %path.display(), error = %err, "skipping project note");
                    None
                }
            })
            .filter(|(_, note)| get_str(&note.frontmatter, "type") == Some(LEARNING_PATH_TYPE))
            .collect()
    }
}

#[async_trait]
impl ResourceRepository for VaultRepository {
    async fn active_resources(&self) -> Result<Vec<ResourceRecord>, StorageError> {
        Ok(self
            .load_resources()
            .into_iter()
            .filter(|r| r.learning_status.is_tracked())
            .collect())
    }

    async fn all_resources(&self) -> Result<Vec<ResourceRecord>, StorageError> {
        Ok(self.load_resources())
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<ResourceRecord, StorageError> {
        let path = self.note_path(id).ok_or(StorageError::NotFound)?;
        let note = Self::read_note(&path)?;
        Ok(record_from_frontmatter(&path, id.clone(), &note.frontmatter))
    }

    async fn upsert_resource(&self, record: &ResourceRecord) -> Result<(), StorageError> {
        let path = self.note_path(&record.id).ok_or(StorageError::Conflict)?;
        let mut note = if path.exists() {
            Self::read_note(&path)?
        } else {
            Note {
                frontmatter: Mapping::new(),
                body: format!("# {}\n", record.title),
            }
        };
        merge_into_frontmatter(record, &mut note.frontmatter);
        Self::write_note(&path, &note)?;
        Ok(())
    }

    async fn update_resource(
        &self,
        id: &ResourceId,
        update: &ResourceUpdate,
    ) -> Result<ResourceRecord, StorageError> {
        let path = self.note_path(id).ok_or(StorageError::NotFound)?;
        // a note with broken frontmatter is not rewritten
        let mut note = Self::read_note(&path)?;
        let mut record = record_from_frontmatter(&path, id.clone(), &note.frontmatter);
        record.apply(update);
        merge_into_frontmatter(&record, &mut note.frontmatter);
        Self::write_note(&path, &note)?;
        Ok(record)
    }
}

#[async_trait]
impl LearningPathRepository for VaultRepository {
    async fn learning_path(&self) -> Result<Option<LearningPath>, StorageError> {
        Ok(self
            .learning_path_notes()
            .first()
            .map(|(path, note)| path_from_frontmatter(path, &note.frontmatter)))
    }

    async fn upsert_learning_path(&self, path: &LearningPath) -> Result<(), StorageError> {
        let existing = self
            .learning_path_notes()
            .into_iter()
            .find(|(p, note)| path_from_frontmatter(p, &note.frontmatter).name == path.name);

        let (note_path, mut note) = existing.unwrap_or_else(|| {
            let mut frontmatter = Mapping::new();
            set(&mut frontmatter, "type", LEARNING_PATH_TYPE);
            (
                self.root
                    .join(PROJECTS_DIR)
                    .join(format!("{}.md", slug(&path.name))),
                Note {
                    frontmatter,
                    body: format!("# {}\n", path.name),
                },
            )
        });

        let fm = &mut note.frontmatter;
        set(fm, "path_name", path.name.clone());
        set(fm, "weekly_target_hours", path.weekly_target_hours);
        match &path.current_milestone {
            Some(m) => set(fm, "current_milestone", m.clone()),
            None => {
                fm.remove("current_milestone");
            }
        }
        set(fm, "overall_progress", u64::from(path.overall_progress));

        Self::write_note(&note_path, &note)?;
        Ok(())
    }
}
