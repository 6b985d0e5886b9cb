//! Reading repository descriptors from disk.
//!
//! Files ending in `.json` or `.toml` are parsed as [`RepositoryDescriptor`]s;
//! directories are walked recursively for such files. Resources that fail
//! validation are dropped with a warning, the rest of the file still loads.

use obr_schema::{Repository, RepositoryDescriptor};
use std::path::{Path, PathBuf};

/// Errors raised while loading repositories.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON descriptor.
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        /// Path being parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Malformed TOML descriptor.
    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        /// Path being parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// Neither `.json` nor `.toml`.
    #[error("Unsupported repository format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Directory traversal failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Descriptor encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl Format {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else {
            None
        }
    }
}

/// Load one repository file, or every repository file below a directory in
/// path order.
///
/// # Errors
///
/// Returns [`LoadError`] if a file cannot be read or parsed, or the path is
/// a file of unknown format.
pub fn load_path(path: &Path) -> Result<Vec<Repository>, LoadError> {
    if !path.is_dir() {
        return Ok(vec![load_file(path)?]);
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && Format::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    tracing::debug!("Found {} repository files in {}", files.len(), path.display());

    files.iter().map(|file| load_file(file)).collect()
}

/// Load a single repository file. Relative resource locations are resolved
/// against the file's directory.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or parsed.
pub fn load_file(path: &Path) -> Result<Repository, LoadError> {
    let format =
        Format::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut descriptor = parse(&text, format, path)?;
    if let Some(base) = absolute.parent() {
        for resource in &mut descriptor.resources {
            if let Some(uri) = resource.uri.as_mut() {
                *uri = absolutize(uri, base);
            }
        }
    }
    Ok(finish(descriptor, &file_uri(&absolute)))
}

/// Parse a descriptor held in memory; `source` names it in logs and becomes
/// the repository URI when the document has none.
///
/// # Errors
///
/// Returns [`LoadError::Json`] or [`LoadError::Toml`] for malformed input.
pub fn load_str(text: &str, format: Format, source: &str) -> Result<Repository, LoadError> {
    let descriptor = parse(text, format, Path::new(source))?;
    Ok(finish(descriptor, source))
}

fn parse(text: &str, format: Format, origin: &Path) -> Result<RepositoryDescriptor, LoadError> {
    match format {
        Format::Json => serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: origin.to_path_buf(),
            source,
        }),
        Format::Toml => toml::from_str(text).map_err(|source| LoadError::Toml {
            path: origin.to_path_buf(),
            source,
        }),
    }
}

fn finish(descriptor: RepositoryDescriptor, source: &str) -> Repository {
    let (repository, rejected) = descriptor.into_repository(source);
    if !rejected.is_empty() {
        tracing::warn!(
            "{}: skipped {} invalid resources",
            repository,
            rejected.len()
        );
    }
    tracing::debug!(
        "Loaded {} ({} resources)",
        repository,
        repository.resources().len()
    );
    repository
}

fn absolutize(uri: &str, base: &Path) -> String {
    match uri_to_path(uri) {
        Some(path) if !uri.is_empty() && path.is_relative() => file_uri(&base.join(path)),
        _ => uri.to_string(),
    }
}

/// `file://` URI for an absolute path.
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// The filesystem path behind a `file:` URI, or the input itself when it
/// has no scheme.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        Some(PathBuf::from(rest))
    } else if let Some(rest) = uri.strip_prefix("file:") {
        Some(PathBuf::from(rest))
    } else if uri.contains("://") {
        None
    } else {
        Some(PathBuf::from(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JSON: &str = r#"{
        "name": "json",
        "resources": [
            { "symbolicName": "a", "version": "1.0.0" },
            { "symbolicName": "" }
        ]
    }"#;

    const TOML: &str = r#"
        name = "toml"

        [[resources]]
        symbolicName = "b"
        version = "2.0"
    "#;

    #[test]
    fn test_load_directory_in_path_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.json"), JSON).unwrap();
        std::fs::write(dir.path().join("nested/b.toml"), TOML).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let repos = load_path(dir.path()).unwrap();
        let names: Vec<_> = repos.iter().map(Repository::name).collect();
        assert_eq!(names, ["json", "toml"]);
        assert_eq!(repos[0].resources().len(), 1);
        assert!(repos[0].uri().starts_with("file://"));
        assert_eq!(repos[1].resources()[0].version().to_string(), "2.0.0");
    }

    #[test]
    fn test_relative_resource_uris_resolve_against_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo.json");
        std::fs::write(
            &path,
            r#"{ "resources": [
                { "symbolicName": "a", "uri": "bundles/a.jar" },
                { "symbolicName": "b", "uri": "https://example.com/b.jar" }
            ] }"#,
        )
        .unwrap();

        let repo = load_file(&path).unwrap();
        let expected = file_uri(&std::path::absolute(dir.path()).unwrap().join("bundles/a.jar"));
        assert_eq!(repo.resources()[0].uri(), expected);
        assert_eq!(repo.resources()[1].uri(), "https://example.com/b.jar");
    }

    #[test]
    fn test_reports_parse_errors_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        match load_file(&path) {
            Err(LoadError::Json { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected JSON error, got {other:?}"),
        }
        assert!(matches!(
            load_file(&dir.path().join("repo.xml")),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_uri_to_path() {
        assert_eq!(uri_to_path("file:///tmp/a.jar"), Some(PathBuf::from("/tmp/a.jar")));
        assert_eq!(uri_to_path("file:a.jar"), Some(PathBuf::from("a.jar")));
        assert_eq!(uri_to_path("bundles/a.jar"), Some(PathBuf::from("bundles/a.jar")));
        assert_eq!(uri_to_path("https://example.com/a.jar"), None);
    }
}
