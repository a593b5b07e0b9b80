//! Env file - dotenv-style local parameter files
//!
//! One `KEY=VALUE` per line. Blank lines and `#` comments are ignored, an
//! optional `export ` prefix is accepted, and values may be single- or
//! double-quoted. Values are taken literally: `$VAR` is never expanded.
//!
//! Saving writes a sibling temp file and renames it over the target, so a
//! failed save leaves the previous file intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Local parameters keyed by name
pub type LocalMapping = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum EnvFileError {
    #[error("environment file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("{}:{line}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A dotenv file on disk
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file
    pub fn load(&self) -> Result<LocalMapping, EnvFileError> {
        if !self.path.is_file() {
            return Err(EnvFileError::NotFound(self.path.clone()));
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| EnvFileError::Io {
            path: self.path.clone(),
            source,
        })?;

        parse(&content).map_err(|(line, reason)| EnvFileError::Parse {
            path: self.path.clone(),
            line,
            reason,
        })
    }

    /// Replace the file with `mapping`, keys in sorted order
    pub fn save(&self, mapping: &LocalMapping) -> Result<(), EnvFileError> {
        let content = render(mapping)?;
        let io_err = |source: std::io::Error| EnvFileError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

/// Parse file content. Errors carry the 1-based line number.
pub fn parse(content: &str) -> Result<LocalMapping, (usize, String)> {
    let mut mapping = LocalMapping::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = parse_line(line).map_err(|reason| (idx + 1, reason))?;
        // Last occurrence wins
        mapping.insert(key, value);
    }

    Ok(mapping)
}

fn parse_line(line: &str) -> Result<(String, String), String> {
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", line))?;

    let key = key.trim();
    if !is_valid_key(key) {
        return Err(format!("invalid key {:?}", key));
    }

    Ok((key.to_string(), parse_value(value.trim())?))
}

fn parse_value(value: &str) -> Result<String, String> {
    if let Some(rest) = value.strip_prefix('"') {
        let mut out = String::with_capacity(rest.len());
        let mut chars = rest.char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    check_trailing(&rest[i + 1..])?;
                    return Ok(out);
                }
                '\\' => match chars.next().map(|(_, c)| c) {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                c => out.push(c),
            }
        }
        return Err("unterminated double-quoted value".to_string());
    }

    if let Some(rest) = value.strip_prefix('\'') {
        let end = rest
            .find('\'')
            .ok_or_else(|| "unterminated single-quoted value".to_string())?;
        check_trailing(&rest[end + 1..])?;
        return Ok(rest[..end].to_string());
    }

    // Unquoted: ` #` starts an inline comment
    let end = value
        .char_indices()
        .find(|&(i, c)| c == '#' && i > 0 && value[..i].ends_with(char::is_whitespace))
        .map(|(i, _)| i)
        .unwrap_or(value.len());

    Ok(value[..end].trim_end().to_string())
}

/// After a closing quote only whitespace or a comment may follow
fn check_trailing(rest: &str) -> Result<(), String> {
    let rest = rest.trim_start();
    if rest.is_empty() || rest.starts_with('#') {
        Ok(())
    } else {
        Err(format!("unexpected {:?} after closing quote", rest))
    }
}

/// `[A-Za-z_][A-Za-z0-9_.-]*`
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn render(mapping: &LocalMapping) -> Result<String, EnvFileError> {
    let mut out = String::new();

    for (key, value) in mapping {
        if !is_valid_key(key) {
            return Err(EnvFileError::InvalidKey(key.clone()));
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&render_value(value));
        out.push('\n');
    }

    Ok(out)
}

fn render_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '=' | '\\'));
    if !needs_quotes {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
