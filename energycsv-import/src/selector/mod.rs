//! Folder validation, file listing and meter id discovery used during setup.

mod flow;

pub use flow::{AbortReason, ConfigEntry, ConfigFlow, EntryData, FlowPhase, FlowResult, FlowStep, Form};

use std::{
    fmt, fs,
    path::{Component, Path, PathBuf, MAIN_SEPARATOR},
    time::SystemTime,
};

use serde::Deserialize;

use crate::sources::meter_csv_file::{header_index, open_reader};

const CSV_PATTERN: &str = "*.csv";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Folder '{0}' does not exist")]
    FolderNotFound(String),
    #[error("No CSV files found in '{0}'")]
    NoCsvFiles(String),
    #[error("No meter id found in csv file '{}'", .0.display())]
    NoMeterId(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Mtime,
}

/// An absolute, lexically normalized directory.
///
/// Displays with exactly one trailing separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPath(PathBuf);

impl FolderPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.to_string_lossy();
        if s.ends_with(MAIN_SEPARATOR) {
            write!(f, "{s}")
        } else {
            write!(f, "{s}{MAIN_SEPARATOR}")
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Absolute form of `input` with `.` and `..` folded away.
pub fn normalize_folder(input: &str) -> FolderPath {
    let raw = Path::new(input.trim());
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(raw)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    FolderPath(out)
}

/// Check that `input` names an existing folder holding at least one CSV file.
///
/// A path to a regular file is reported as [`SelectorError::FolderNotFound`].
pub fn validate_folder(input: &str) -> Result<FolderPath, SelectorError> {
    let folder = normalize_folder(input);

    if !folder.as_path().is_dir() {
        tracing::error!(folder = %folder, "folder does not exist");
        return Err(SelectorError::FolderNotFound(input.to_string()));
    }

    if list_files(folder.as_path(), CSV_PATTERN, SortKey::Name, false).is_empty() {
        tracing::error!(folder = %folder, "folder does not contain any CSV files");
        return Err(SelectorError::NoCsvFiles(input.to_string()));
    }

    Ok(folder)
}

/// Files under `folder` whose names match `pattern`, ascending by `sort`.
///
/// `pattern` supports `*` and `?`. Names starting with a dot only match a
/// pattern that starts with a dot. Unreadable directories contribute nothing.
pub fn list_files(folder: &Path, pattern: &str, sort: SortKey, recursive: bool) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    collect_matches(folder, pattern, recursive, &mut entries);

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    match sort {
        SortKey::Name => {}
        SortKey::Size => entries.sort_by_key(|e| e.size),
        SortKey::Mtime => entries.sort_by(|a, b| a.modified.cmp(&b.modified)),
    }

    tracing::debug!(folder = %folder.display(), pattern, count = entries.len(), "listed files");
    entries.into_iter().map(|e| e.path).collect()
}

fn collect_matches(dir: &Path, pattern: &str, recursive: bool, out: &mut Vec<FileEntry>) {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot read directory");
            return;
        }
    };

    for entry in read.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        let path = entry.path();

        if meta.is_dir() {
            if recursive {
                collect_matches(&path, pattern, recursive, out);
            }
            continue;
        }

        let name = entry.file_name();
        if !wildcard_match(pattern, &name.to_string_lossy()) {
            continue;
        }

        out.push(FileEntry {
            path,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    if name.starts_with('.') && !pattern.starts_with('.') {
        return false;
    }

    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ni));
                pi += 1;
            }
            Some(&c) if c == '?' || c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    pi = sp + 1;
                    ni = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Meter id (`Anlid`) of the first data row of `path`.
pub fn extract_meter_id(path: &Path) -> Result<String, SelectorError> {
    extract_meter_id_with(path, "Anlid")
}

/// Like [`extract_meter_id`] with a custom meter id column.
pub fn extract_meter_id_with(path: &Path, column: &str) -> Result<String, SelectorError> {
    let no_meter_id = || SelectorError::NoMeterId(path.to_path_buf());

    let mut rdr = open_reader(path).map_err(|e| {
        tracing::warn!(error = %e, "cannot open csv file");
        no_meter_id()
    })?;
    let idx = match rdr.headers() {
        Ok(headers) => header_index(headers, column),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read csv headers");
            None
        }
    }
    .ok_or_else(no_meter_id)?;

    let first = match rdr.records().next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read first csv row");
            return Err(no_meter_id());
        }
        None => return Err(no_meter_id()),
    };

    match first.get(idx).map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(no_meter_id()),
    }
}
