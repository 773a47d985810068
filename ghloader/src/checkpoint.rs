//! Loader state: where archives live, how far loading got, and the hour
//! window the downloader covers. Stored as a properties file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{LoaderError, Result};
use crate::timestamp::ArchiveHour;

pub const DOWNLOAD_DIRECTORY: &str = "downloadDirectory";
pub const LAST_FILE_LOADED: &str = "lastFileLoaded";
pub const START_HOUR: &str = "startHour";
pub const END_HOUR: &str = "endHour";
pub const ARCHIVE_BASE_URL: &str = "archive.baseUrl";

/// Earliest archive hour published in the expected format.
pub const DEFAULT_START_HOUR: &str = "2012-03-10-22";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    entries: BTreeMap<String, String>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// All keys, including ones this crate does not interpret.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn download_directory(&self) -> Option<PathBuf> {
        self.get(DOWNLOAD_DIRECTORY)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn set_download_directory(&mut self, dir: &Path) {
        self.set(DOWNLOAD_DIRECTORY, dir.to_string_lossy());
    }

    pub fn last_file_loaded(&self) -> Option<&str> {
        self.get(LAST_FILE_LOADED).filter(|name| !name.trim().is_empty())
    }

    /// Hour token of the last fully loaded file.
    pub fn last_hour_loaded(&self) -> Result<Option<ArchiveHour>> {
        self.last_file_loaded()
            .map(|file| ArchiveHour::from_path(Path::new(file)))
            .transpose()
    }

    pub fn set_last_file_loaded(&mut self, file: &Path) {
        self.set(LAST_FILE_LOADED, file.to_string_lossy());
    }

    pub fn start_hour(&self) -> Result<ArchiveHour> {
        self.get(START_HOUR)
            .unwrap_or(DEFAULT_START_HOUR)
            .trim()
            .parse()
    }

    pub fn end_hour(&self) -> Result<Option<ArchiveHour>> {
        self.get(END_HOUR)
            .filter(|hour| !hour.trim().is_empty())
            .map(|hour| hour.trim().parse())
            .transpose()
    }

    pub fn archive_base_url(&self) -> Option<&str> {
        self.get(ARCHIVE_BASE_URL)
    }

    /// Reads the `.properties` format: `#` and `!` comment lines, keys
    /// ended by `=`, `:` or whitespace, backslash escapes including
    /// `\uXXXX`, and lines continued by a trailing backslash.
    pub fn parse(text: &str) -> Self {
        let entries = logical_lines(text)
            .iter()
            .map(|line| split_entry(line))
            .collect();
        Self { entries }
    }

    /// Writes entries in sorted order. Characters outside printable ASCII
    /// are written as `\uXXXX`.
    pub fn to_properties_string(&self) -> String {
        let mut out = String::from("# loader state\n");
        for (key, value) in &self.entries {
            out.push_str(&escape(key, true));
            out.push('=');
            out.push_str(&escape(value, false));
            out.push('\n');
        }
        out
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Joins continued lines and drops comments and blank lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continued = false;
    for raw in text.lines() {
        let line = raw.trim_start_matches(is_blank);
        if !continued && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            current.push_str(&line[..line.len() - 1]);
            continued = true;
        } else {
            current.push_str(line);
            lines.push(std::mem::take(&mut current));
            continued = false;
        }
    }
    if continued {
        lines.push(current);
    }
    lines
}

fn split_entry(line: &str) -> (String, String) {
    let mut chars = line.chars().peekable();
    let mut raw_key = String::new();
    let mut escaped = false;
    while let Some(&c) = chars.peek() {
        if !escaped && (c == '=' || c == ':' || is_blank(c)) {
            break;
        }
        escaped = !escaped && c == '\\';
        raw_key.push(c);
        chars.next();
    }
    while chars.next_if(|&c| is_blank(c)).is_some() {}
    chars.next_if(|&c| c == '=' || c == ':');
    while chars.next_if(|&c| is_blank(c)).is_some() {}
    let raw_value: String = chars.collect();
    (unescape(&raw_key), unescape(&raw_value))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // UTF-16 units from consecutive `\u` escapes, so surrogate pairs combine.
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut out, &mut units);
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()) {
                    if let Ok(unit) = u16::from_str_radix(&hex, 16) {
                        units.push(unit);
                        continue;
                    }
                }
                log::warn!("malformed \\u escape in properties text: \\u{hex}");
                flush_units(&mut out, &mut units);
                out.push('u');
                out.push_str(&hex);
            }
            Some(other) => {
                flush_units(&mut out, &mut units);
                out.push(unescape_char(other));
            }
            None => {}
        }
    }
    flush_units(&mut out, &mut units);
    out
}

fn flush_units(out: &mut String, units: &mut Vec<u16>) {
    if !units.is_empty() {
        out.push_str(&String::from_utf16_lossy(units));
        units.clear();
    }
}

fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'f' => '\x0c',
        other => other,
    }
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            ' '..='~' => out.push(c),
            _ => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
            }
        }
    }
    out
}

/// Persistence for [`Checkpoint`] values.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> Result<Checkpoint>;
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// A properties file rewritten atomically through a sibling temp file.
#[derive(Debug, Clone)]
pub struct PropertiesCheckpointStore {
    path: PathBuf,
}

impl PropertiesCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            LoaderError::Config(format!("state path {} has no file name", self.path.display()))
        })?;
        let mut temp = name.to_os_string();
        temp.push(".tmp");
        Ok(self.path.with_file_name(temp))
    }
}

impl CheckpointStore for PropertiesCheckpointStore {
    fn load(&self) -> Result<Checkpoint> {
        if !self.path.exists() {
            log::info!(
                "no loader state at {}, starting from an empty checkpoint",
                self.path.display()
            );
            return Ok(Checkpoint::default());
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Checkpoint::parse(&text))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let temp = self.temp_path()?;
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(checkpoint.to_properties_string().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        log::debug!("saved loader state to {}", self.path.display());
        Ok(())
    }
}

/// Keeps every saved checkpoint in memory.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    saved: Mutex<Vec<Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Checkpoint> {
        self.saved.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Checkpoint> {
        Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.saved.lock().unwrap().push(checkpoint.clone());
        Ok(())
    }
}
