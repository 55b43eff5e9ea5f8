//! Diff Parsing
//!
//! Turns LLM output that carries a unified diff into ordered hunks.
//! The text is often wrapped in one or more Markdown code fences, sometimes
//! nested, and the hunk headers' line counts are frequently wrong, so the
//! input is cleaned up before each hunk is handed to `diffy`.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::patch::PatchError;

lazy_static! {
    static ref HUNK_HEADER: Regex = Regex::new(r"^@@ -(\d+)(?:,\d+)? \+(\d+)(?:,\d+)? @@")
        .expect("hunk header pattern is valid");
}

/// A hunk in a unified diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Starting line in old file (1-indexed, 0 for an empty range at the top)
    pub old_start: usize,
    /// Number of lines in old file
    pub old_count: usize,
    /// Starting line in new file (1-indexed)
    pub new_start: usize,
    /// Number of lines in new file
    pub new_count: usize,
    /// The diff lines, in order
    pub lines: Vec<DiffLine>,
}

/// A line in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Type of line
    pub kind: DiffLineKind,
    /// The content without prefix, always newline-terminated
    pub content: String,
}

/// Kind of diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Context,
    Added,
    Removed,
}

impl DiffLine {
    pub fn new(kind: DiffLineKind, content: &str) -> Self {
        let mut content = content.to_string();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        Self { kind, content }
    }

    /// Get the prefix character for this line kind
    pub fn prefix(&self) -> char {
        match self.kind {
            DiffLineKind::Context => ' ',
            DiffLineKind::Added => '+',
            DiffLineKind::Removed => '-',
        }
    }
}

impl DiffHunk {
    /// Format the hunk header
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }

    /// First unchanged line of the hunk, used to anchor it by text
    pub fn first_context(&self) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.kind == DiffLineKind::Context)
            .map(|l| l.content.as_str())
    }

    pub fn added_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Added)
            .map(|l| l.content.clone())
            .collect()
    }

    pub fn has_additions(&self) -> bool {
        self.lines.iter().any(|l| l.kind == DiffLineKind::Added)
    }

    fn from_diffy(hunk: &diffy::Hunk<'_, str>) -> Self {
        let lines = hunk
            .lines()
            .iter()
            .map(|line| match line {
                diffy::Line::Context(text) => DiffLine::new(DiffLineKind::Context, text),
                diffy::Line::Delete(text) => DiffLine::new(DiffLineKind::Removed, text),
                diffy::Line::Insert(text) => DiffLine::new(DiffLineKind::Added, text),
            })
            .collect();
        Self {
            old_start: hunk.old_range().start(),
            old_count: hunk.old_range().len(),
            new_start: hunk.new_range().start(),
            new_count: hunk.new_range().len(),
            lines,
        }
    }
}

impl fmt::Display for DiffHunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            write!(f, "{}{}", line.prefix(), line.content)?;
        }
        Ok(())
    }
}

/// Drop every line that is a code fence delimiter (```` ``` ````, ```` ```diff ````, ...).
pub fn strip_fences(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !line.trim().starts_with("```"))
        .collect()
}

/// Parse diff text into the hunks of its first file.
///
/// Additional files in a multi-file diff are ignored.
pub fn parse_diff(text: &str) -> Result<Vec<DiffHunk>, PatchError> {
    let cleaned = strip_fences(text);
    let raw_hunks = split_first_file(&cleaned)?;
    if raw_hunks.is_empty() {
        return Err(PatchError::Parse("no hunks found".to_string()));
    }

    let mut hunks = Vec::with_capacity(raw_hunks.len());
    for raw in &raw_hunks {
        let text = raw.render();
        let patch = diffy::Patch::from_str(&text)
            .map_err(|e| PatchError::Parse(format!("{}: {}", raw.header_line, e)))?;
        hunks.extend(patch.hunks().iter().map(DiffHunk::from_diffy));
    }
    Ok(hunks)
}

#[derive(Debug)]
enum BodyLine {
    Line(String),
    /// An empty line inside a hunk, usually a context line that lost its leading space
    Blank,
}

#[derive(Debug)]
struct RawHunk {
    header_line: String,
    old_start: usize,
    new_start: usize,
    body: Vec<BodyLine>,
}

impl RawHunk {
    /// Re-emit the hunk with a header whose counts match its body.
    fn render(&self) -> String {
        let mut old_count = 0;
        let mut new_count = 0;
        let mut body = String::new();
        for line in &self.body {
            let line = match line {
                BodyLine::Line(l) => l.as_str(),
                BodyLine::Blank => " ",
            };
            match line.as_bytes().first() {
                Some(b'-') => old_count += 1,
                Some(b'+') => new_count += 1,
                _ => {
                    old_count += 1;
                    new_count += 1;
                }
            }
            body.push_str(line);
            body.push('\n');
        }
        format!(
            "@@ -{},{} +{},{} @@\n{}",
            self.old_start, old_count, self.new_start, new_count, body
        )
    }

    fn finish(mut self) -> Self {
        while matches!(self.body.last(), Some(BodyLine::Blank)) {
            self.body.pop();
        }
        self
    }
}

/// Collect the hunks of the first file in `text`, skipping any preamble
/// and stopping at the next file header or trailing prose.
fn split_first_file(text: &str) -> Result<Vec<RawHunk>, PatchError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut hunks = Vec::new();
    let mut current: Option<RawHunk> = None;

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("@@") {
            if let Some(done) = current.take() {
                hunks.push(done.finish());
            }
            let caps = HUNK_HEADER
                .captures(line)
                .ok_or_else(|| PatchError::Parse(format!("malformed hunk header: {}", line)))?;
            let old_start = caps[1]
                .parse()
                .map_err(|_| PatchError::Parse(format!("bad hunk start: {}", line)))?;
            let new_start = caps[2]
                .parse()
                .map_err(|_| PatchError::Parse(format!("bad hunk start: {}", line)))?;
            current = Some(RawHunk {
                header_line: line.to_string(),
                old_start,
                new_start,
                body: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // file headers, `diff --git` lines or prose before the first hunk
            continue;
        };
        if starts_next_file(&lines, i) {
            break;
        }
        match line.as_bytes().first() {
            Some(b' ') | Some(b'+') | Some(b'-') => hunk.body.push(BodyLine::Line(line.to_string())),
            None => hunk.body.push(BodyLine::Blank),
            Some(b'\\') => {}
            _ => break,
        }
    }

    if let Some(done) = current.take() {
        hunks.push(done.finish());
    }
    Ok(hunks)
}

fn starts_next_file(lines: &[&str], i: usize) -> bool {
    let line = lines[i];
    if line.starts_with("diff ") || line.starts_with("Index: ") {
        return true;
    }
    line.starts_with("--- ")
        && lines
            .get(i + 1)
            .map(|next| next.starts_with("+++ "))
            .unwrap_or(false)
}
