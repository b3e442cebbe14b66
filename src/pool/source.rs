//! Reading the pool source file.
//!
//! The file is a document with a `servers` list of address strings. Unknown
//! keys are ignored; a missing or non-list `servers` is an error.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::pool::PoolError;

#[derive(Debug, Deserialize)]
struct PoolFile {
    servers: Vec<String>,
}

/// Encoding of the pool file, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Toml,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SourceFormat::Toml,
            _ => SourceFormat::Json,
        }
    }
}

/// Read the whole file and return its server list.
pub fn read_servers(path: &Path) -> Result<Vec<String>, PoolError> {
    let content = fs::read_to_string(path).map_err(|source| PoolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_servers(&content, SourceFormat::from_path(path))
}

/// Parse a server list from file content.
pub fn parse_servers(content: &str, format: SourceFormat) -> Result<Vec<String>, PoolError> {
    let file: PoolFile = match format {
        SourceFormat::Json => serde_json::from_str(content)?,
        SourceFormat::Toml => toml::from_str(content)?,
    };
    Ok(file.servers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let servers = parse_servers(
            r#"{"servers": ["https://a:1/x", "https://b:2/y"], "comment": "ignored"}"#,
            SourceFormat::Json,
        )
        .unwrap();
        assert_eq!(servers, vec!["https://a:1/x", "https://b:2/y"]);
    }

    #[test]
    fn test_parse_toml() {
        let servers = parse_servers("servers = [\"https://a:1/x\"]\n", SourceFormat::Toml).unwrap();
        assert_eq!(servers, vec!["https://a:1/x"]);
    }

    #[test]
    fn test_empty_list_is_valid() {
        assert!(parse_servers(r#"{"servers": []}"#, SourceFormat::Json).unwrap().is_empty());
    }

    #[test]
    fn test_missing_or_wrong_shape() {
        assert!(parse_servers(r#"{"hosts": []}"#, SourceFormat::Json).is_err());
        assert!(parse_servers(r#"{"servers": "https://a"}"#, SourceFormat::Json).is_err());
        assert!(parse_servers(r#"{"servers": [1, 2]}"#, SourceFormat::Json).is_err());
        assert!(parse_servers(r#"{"servers": ["a""#, SourceFormat::Json).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("pool.TOML")), SourceFormat::Toml);
        assert_eq!(SourceFormat::from_path(Path::new("servers.json")), SourceFormat::Json);
        assert_eq!(SourceFormat::from_path(Path::new("servers")), SourceFormat::Json);
    }
}
