//! Markdown Spec Document
//!
//! The living spec is an ordered list of lines, each keeping its own line
//! terminator. It is only ever persisted by rewriting the whole file, so an
//! interrupted turn leaves the previous version on disk untouched.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Content written when the spec file does not exist yet
pub const SEED_SKETCH: &str = "# Rough Sketch\n\n_TODO: describe your idea here._\n";

lazy_static! {
    static ref TOP_LEVEL_HEADING: Regex =
        Regex::new(r"(?m)^# (.+)$").expect("top-level heading pattern is valid");
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {}", .path.display(), .source)]
    Write { path: PathBuf, source: io::Error },
}

/// In-memory copy of a spec file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        fs::read_to_string(path)
            .map(|text| Self::from_text(&text))
            .map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Replace the file at `path` with this document's full text.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        write_whole_file(path, &self.to_text())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    /// Index of the first line whose text equals `needle`, ignoring line terminators.
    pub fn find_line(&self, needle: &str) -> Option<usize> {
        let needle = strip_terminator(needle);
        self.lines
            .iter()
            .position(|line| strip_terminator(line) == needle)
    }

    /// Heading level of the line at `index`, if that line is an ATX heading.
    pub fn heading_at(&self, index: usize) -> Option<usize> {
        self.lines.get(index).and_then(|line| heading_level(line))
    }

    /// Insert `new_lines` so the first of them lands at `index`.
    ///
    /// A final line without a terminator gets one first, otherwise the
    /// inserted text would be glued onto it.
    pub fn insert_lines(&mut self, index: usize, new_lines: &[String]) {
        let index = index.min(self.lines.len());
        if index == self.lines.len() {
            if let Some(last) = self.lines.last_mut() {
                if !last.ends_with('\n') {
                    last.push('\n');
                }
            }
        }
        self.lines
            .splice(index..index, new_lines.iter().cloned());
    }
}

/// ATX heading level (1-6) of `line`, or `None` when it is not a heading.
pub fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        Some(hashes)
    } else {
        None
    }
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// `path` with `.suffix` appended to its file name (`spec.md` -> `spec.md.tmp`).
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Write `text` to a sibling file, then rename it over `path`.
pub fn write_whole_file(path: &Path, text: &str) -> Result<(), DocumentError> {
    let staging = sibling_path(path, "partial");
    let to_write_error = |source| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&staging, text).map_err(to_write_error)?;
    fs::rename(&staging, path).map_err(|source| {
        let _ = fs::remove_file(&staging);
        to_write_error(source)
    })
}

/// Create the spec (and its parent directories) with the seed sketch if absent.
/// Returns true when the file was created.
pub fn seed_if_missing(path: &Path) -> Result<bool, DocumentError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DocumentError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_whole_file(path, SEED_SKETCH)?;
    Ok(true)
}

/// Sort the level-1 sections of `text` by title, case-insensitively.
/// Anything before the first `# ` heading stays in front.
pub fn reorder_top_level_sections(text: &str) -> String {
    let matches: Vec<_> = TOP_LEVEL_HEADING.captures_iter(text).collect();
    let Some(first) = matches.first().and_then(|c| c.get(0)) else {
        return text.to_string();
    };

    let intro = &text[..first.start()];
    let mut sections: Vec<(&str, &str)> = Vec::with_capacity(matches.len());
    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        sections.push((title.as_str(), &text[whole.end()..body_end]));
    }
    sections.sort_by_key(|(title, _)| title.to_lowercase());

    let mut out = String::with_capacity(text.len() + sections.len());
    out.push_str(intro);
    let count = sections.len();
    for (i, (title, body)) in sections.into_iter().enumerate() {
        out.push_str("# ");
        out.push_str(title);
        out.push_str(body);
        if i + 1 < count && !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
