use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::lock::FileLock;

/// Past this size, entries older than `PRUNE_AGE_DAYS` are dropped before
/// the next append.
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

const LOG_FILE: &str = ".recovery.log";

const FILE_HEADER: &str = "\
<!-- tally recovery log
     Data that tally could not save normally ends up here.
     View with: tl recovery
     Prune old entries: tl recovery prune -->

---
";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryCategory {
    /// A commit that did not reach disk; the body holds the unsaved store
    Write,
    /// A deleted item or group, kept so it can be re-entered by hand
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "write" => Some(RecoveryCategory::Write),
            "delete" => Some(RecoveryCategory::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: IndexMap<String, String>,
    pub body: String,
}

impl RecoveryEntry {
    /// A new entry stamped with the current time.
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: IndexMap::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Render as a markdown block:
    ///
    /// ```text
    /// ## 2026-01-02T03:04:05Z write: store.json not saved
    ///
    /// path: /home/me/tally/store.json
    ///
    /// ```json
    /// { ... }
    /// ```
    ///
    /// ---
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} {}: {}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{key}: {value}\n"));
        }
        if !self.body.is_empty() {
            let lang = if self.body.trim_start().starts_with('{') { "json" } else { "text" };
            let fence = fence_for(&self.body);
            out.push_str(&format!("\n{fence}{lang}\n{}", self.body));
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("{fence}\n"));
        }
        out.push_str("\n---\n");
        out
    }
}

/// A backtick fence longer than any backtick run in `body`, so no body line
/// can close it.
fn fence_for(body: &str) -> String {
    let longest = body.split(|c| c != '`').map(str::len).max().unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

pub fn recovery_log_path(tally_dir: &Path) -> PathBuf {
    tally_dir.join(LOG_FILE)
}

// ---------------------------------------------------------------------------
// Atomic file write
// ---------------------------------------------------------------------------

/// Write `content` to `path` by persisting a sibling temp file over it, so
/// readers never observe a half-written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append an entry to the log. A failure here must not mask the error that
/// caused the entry, so it is only reported on stderr.
pub fn log_recovery(tally_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(tally_dir, &entry) {
        eprintln!("warning: could not write to recovery log: {e}");
    }
}

fn append_entry(tally_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(tally_dir);
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    if size > MAX_LOG_SIZE {
        let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
        let entries = parse_entries(&std::fs::read_to_string(&path)?);
        let kept: Vec<_> = entries.into_iter().filter(|e| e.timestamp >= cutoff).collect();
        atomic_write(&path, render_log(&kept).as_bytes())?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if size == 0 {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())
}

/// Record a deleted item so its name, count and groups survive the delete.
pub fn log_item_deletion(tally_dir: &Path, name: &str, count: i64, groups: &[String]) {
    let mut entry = RecoveryEntry::new(RecoveryCategory::Delete, format!("item \"{name}\" deleted"))
        .field("name", name)
        .field("count", count);
    if !groups.is_empty() {
        entry = entry.field("groups", groups.join(", "));
    }
    log_recovery(tally_dir, entry);
}

/// Record a deleted group with the items that belonged to it.
pub fn log_group_deletion(tally_dir: &Path, name: &str, color: &str, members: &[String]) {
    let entry = RecoveryEntry::new(RecoveryCategory::Delete, format!("group \"{name}\" deleted"))
        .field("name", name)
        .field("color", color)
        .body(members.join("\n"));
    log_recovery(tally_dir, entry);
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries newest first, at most `limit` of them. A missing log reads as empty.
pub fn read_recovery_entries(tally_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(tally_dir)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<RecoveryEntry> = None;
    // Open fence and the lines collected so far
    let mut body: Option<(&str, Vec<&str>)> = None;

    for line in content.lines() {
        if let Some((fence, lines)) = body.as_mut() {
            if line == *fence {
                if let Some(entry) = current.as_mut() {
                    entry.body = lines.join("\n");
                }
                body = None;
            } else {
                lines.push(line);
            }
            continue;
        }

        if let Some(header) = line.strip_prefix("## ") {
            entries.extend(current.take());
            current = parse_header(header);
        } else if line == "---" {
            entries.extend(current.take());
        } else if line.starts_with("```") {
            let fence_len = line.len() - line.trim_start_matches('`').len();
            body = Some((&line[..fence_len], Vec::new()));
        } else if let Some(entry) = current.as_mut()
            && let Some((key, value)) = line.split_once(": ")
        {
            entry.fields.insert(key.trim().to_string(), value.to_string());
        }
    }
    entries.extend(current);
    entries
}

/// `<rfc3339> <category>: <description>`
fn parse_header(header: &str) -> Option<RecoveryEntry> {
    let (stamp, rest) = header.split_once(' ')?;
    let (category, description) = rest.split_once(": ")?;
    Some(RecoveryEntry {
        timestamp: DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Utc),
        category: RecoveryCategory::parse_category(category)?,
        description: description.to_string(),
        fields: IndexMap::new(),
        body: String::new(),
    })
}

fn render_log(entries: &[RecoveryEntry]) -> String {
    let mut out = FILE_HEADER.to_string();
    for entry in entries {
        out.push_str(&entry.to_markdown());
    }
    out
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Drop entries older than `before` (default: `PRUNE_AGE_DAYS` ago), or every
/// entry when `all` is set. Returns how many were removed.
///
/// Holds the workspace lock while rewriting so a concurrent commit failure
/// cannot append between the read and the write.
pub fn prune_recovery(tally_dir: &Path, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
    let path = recovery_log_path(tally_dir);
    if !path.exists() {
        return Ok(0);
    }
    let _lock = FileLock::acquire(tally_dir, Duration::from_secs(1))
        .map_err(|e| io::Error::new(io::ErrorKind::WouldBlock, e.to_string()))?;

    let entries = parse_entries(&std::fs::read_to_string(&path)?);
    let total = entries.len();
    let kept: Vec<RecoveryEntry> = if all {
        Vec::new()
    } else {
        let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
        entries.into_iter().filter(|e| e.timestamp >= cutoff).collect()
    };

    atomic_write(&path, render_log(&kept).as_bytes())?;
    Ok(total - kept.len())
}
