//! Parsing of upstream checksum files.
//!
//! Upstream projects publish digests in many shapes: a bare digest, a
//! `sha256sum`-style listing, or something only a registry-supplied regex can
//! make sense of. All of them reduce to either one digest for the whole
//! release or a map from asset name to digest.

use std::collections::BTreeMap;

use regex::Regex;
use rig_schema::{ChecksumConfig, ChecksumFileFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No checksum found in checksum file")]
    NoChecksum,

    #[error("Invalid checksum pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Digests extracted from a checksum file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedChecksums {
    /// One digest applies to whatever asset the file was fetched for.
    Single(String),
    /// Asset name to digest, for every platform listed in the file.
    Map(BTreeMap<String, String>),
}

impl ParsedChecksums {
    /// Digest for `asset`. Map entries are matched by exact name first,
    /// then by their last path segment.
    pub fn get(&self, asset: &str) -> Option<&str> {
        match self {
            Self::Single(digest) => Some(digest),
            Self::Map(map) => map.get(asset).map(String::as_str).or_else(|| {
                map.iter()
                    .find(|(name, _)| name.rsplit('/').next() == Some(asset))
                    .map(|(_, digest)| digest.as_str())
            }),
        }
    }
}

enum Mode {
    Raw,
    Whitespace,
    Pattern { checksum: Regex, file: Option<Regex> },
}

/// Parser configured from a package's checksum metadata.
pub struct ChecksumFileParser {
    mode: Mode,
}

impl std::fmt::Debug for ChecksumFileParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            Mode::Raw => "raw",
            Mode::Whitespace => "whitespace",
            Mode::Pattern { .. } => "pattern",
        };
        f.debug_struct("ChecksumFileParser").field("mode", &mode).finish()
    }
}

fn compile(pattern: &str) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|source| ParseError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn normalize_name(name: &str) -> String {
    name.trim_start_matches('*').trim_start_matches("./").to_string()
}

impl ChecksumFileParser {
    /// # Errors
    ///
    /// Returns [`ParseError::Pattern`] if a declared regex does not compile.
    pub fn from_config(cfg: &ChecksumConfig) -> Result<Self, ParseError> {
        let mode = match (cfg.file_format, &cfg.pattern) {
            (ChecksumFileFormat::Raw, _) => Mode::Raw,
            (ChecksumFileFormat::Regexp, None) => Mode::Whitespace,
            (ChecksumFileFormat::Regexp, Some(p)) => Mode::Pattern {
                checksum: compile(&p.checksum)?,
                file: p.file.as_deref().map(compile).transpose()?,
            },
        };
        Ok(Self { mode })
    }

    /// # Errors
    ///
    /// Returns [`ParseError::NoChecksum`] when nothing in `content` matches.
    pub fn parse(&self, content: &str) -> Result<ParsedChecksums, ParseError> {
        match &self.mode {
            Mode::Raw => {
                let digest = content.trim();
                if digest.is_empty() {
                    return Err(ParseError::NoChecksum);
                }
                Ok(ParsedChecksums::Single(digest.to_string()))
            }
            Mode::Whitespace => parse_whitespace(content),
            Mode::Pattern { checksum, file: None } => content
                .lines()
                .find_map(|line| checksum.captures(line)?.get(1))
                .map(|m| ParsedChecksums::Single(m.as_str().to_string()))
                .ok_or(ParseError::NoChecksum),
            Mode::Pattern {
                checksum,
                file: Some(file),
            } => {
                let mut map = BTreeMap::new();
                for line in content.lines() {
                    let digest = checksum.captures(line).and_then(|c| c.get(1));
                    let name = file.captures(line).and_then(|c| c.get(1));
                    if let (Some(digest), Some(name)) = (digest, name) {
                        map.insert(normalize_name(name.as_str()), digest.as_str().to_string());
                    }
                }
                if map.is_empty() {
                    return Err(ParseError::NoChecksum);
                }
                Ok(ParsedChecksums::Map(map))
            }
        }
    }
}

fn parse_whitespace(content: &str) -> Result<ParsedChecksums, ParseError> {
    let lines: Vec<Vec<&str>> = content
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
        .filter(|tokens| !tokens.is_empty())
        .collect();

    if let [only] = lines.as_slice() {
        if only.len() == 1 {
            return Ok(ParsedChecksums::Single(only[0].to_string()));
        }
    }

    let map: BTreeMap<String, String> = lines
        .iter()
        .filter(|tokens| tokens.len() >= 2)
        .map(|tokens| (normalize_name(tokens[tokens.len() - 1]), tokens[0].to_string()))
        .collect();

    if map.is_empty() {
        return Err(ParseError::NoChecksum);
    }
    Ok(ParsedChecksums::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_schema::ChecksumPattern;

    fn cfg(format: ChecksumFileFormat, pattern: Option<(&str, Option<&str>)>) -> ChecksumConfig {
        ChecksumConfig {
            file_format: format,
            pattern: pattern.map(|(c, f)| ChecksumPattern {
                checksum: c.to_string(),
                file: f.map(str::to_string),
            }),
            ..ChecksumConfig::default()
        }
    }

    #[test]
    fn raw_is_trimmed_text() {
        let p = ChecksumFileParser::from_config(&cfg(ChecksumFileFormat::Raw, None)).unwrap();
        assert_eq!(
            p.parse("abc123\n").unwrap(),
            ParsedChecksums::Single("abc123".to_string())
        );
        assert!(matches!(p.parse("  \n"), Err(ParseError::NoChecksum)));
    }

    #[test]
    fn pattern_with_file_builds_map() {
        let p = ChecksumFileParser::from_config(&cfg(
            ChecksumFileFormat::Regexp,
            Some((r"^(\S+)\s", Some(r"^\S+\s+(\S+)$"))),
        ))
        .unwrap();
        let parsed = p.parse("h1  asset-a\nh2  asset-b\n").unwrap();
        assert_eq!(parsed.get("asset-a"), Some("h1"));
        assert_eq!(parsed.get("asset-b"), Some("h2"));
        assert_eq!(parsed.get("asset-c"), None);
    }

    #[test]
    fn pattern_without_file_takes_first_match() {
        let p = ChecksumFileParser::from_config(&cfg(
            ChecksumFileFormat::Regexp,
            Some((r"^SHA256:\s*(\S+)", None)),
        ))
        .unwrap();
        let parsed = p.parse("# header\nSHA256: d1\nSHA256: d2\n").unwrap();
        assert_eq!(parsed, ParsedChecksums::Single("d1".to_string()));
    }

    #[test]
    fn default_is_sha256sum_style() {
        let p = ChecksumFileParser::from_config(&cfg(ChecksumFileFormat::Regexp, None)).unwrap();
        let parsed = p.parse("aa *tool_linux.tar.gz\nbb  ./tool_darwin.tar.gz\n").unwrap();
        assert_eq!(parsed.get("tool_linux.tar.gz"), Some("aa"));
        assert_eq!(parsed.get("tool_darwin.tar.gz"), Some("bb"));

        assert_eq!(
            p.parse("abc123\n").unwrap(),
            ParsedChecksums::Single("abc123".to_string())
        );
    }

    #[test]
    fn map_lookup_falls_back_to_basename() {
        let p = ChecksumFileParser::from_config(&cfg(ChecksumFileFormat::Regexp, None)).unwrap();
        let parsed = p.parse("cc  dist/tool.zip\n").unwrap();
        assert_eq!(parsed.get("tool.zip"), Some("cc"));
    }

    #[test]
    fn bad_regex_is_reported() {
        let err = ChecksumFileParser::from_config(&cfg(
            ChecksumFileFormat::Regexp,
            Some(("(unclosed", None)),
        ))
        .unwrap_err();
        assert!(matches!(err, ParseError::Pattern { .. }));
    }

    #[test]
    fn no_match_is_an_error() {
        let p = ChecksumFileParser::from_config(&cfg(
            ChecksumFileFormat::Regexp,
            Some((r"^([0-9a-f]{64})", Some(r"\s(\S+)$"))),
        ))
        .unwrap();
        assert!(matches!(p.parse("nothing here\n"), Err(ParseError::NoChecksum)));
    }
}
