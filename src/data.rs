//! Corpus loading: one document per non-empty line of a UTF-8 file.

use std::fmt;
use std::fs;
use std::path::Path;

/// Errors produced while loading the training corpus.
///
/// # Variants
///
/// - **Io**: The file could not be read (missing, unreadable, or not UTF-8).
/// - **EmptyCorpus**: The file was read but contains no non-empty lines.
#[derive(Debug)]
pub enum DataError {
    /// I/O error while reading the input file.
    Io(std::io::Error),

    /// The input file yields no documents.
    EmptyCorpus,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io(e) => write!(f, "data io: {e}"),
            DataError::EmptyCorpus => write!(f, "data: input file has no non-empty lines"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io(e) => Some(e),
            DataError::EmptyCorpus => None,
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e)
    }
}

/// Reads the corpus at `path`: one trimmed document per line, empty lines
/// skipped.
///
/// # Errors
///
/// - [`DataError::Io`] when the file cannot be read.
/// - [`DataError::EmptyCorpus`] when no non-empty lines remain.
pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<String>, DataError> {
    let content = fs::read_to_string(path)?;
    let docs: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if docs.is_empty() {
        return Err(DataError::EmptyCorpus);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{contents}").unwrap();
        f.sync_all().unwrap();
        path
    }

    #[test]
    fn loads_trimmed_non_empty_lines() {
        let path = temp_file("microlm_data_lines.txt", "first\n  second  \n\n   \nthird\n");
        let result = load_documents(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(result.unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn empty_file_is_empty_corpus() {
        let path = temp_file("microlm_data_empty.txt", "");
        let result = load_documents(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(DataError::EmptyCorpus)));
    }

    #[test]
    fn whitespace_only_file_is_empty_corpus() {
        let path = temp_file("microlm_data_ws.txt", "  \n\t\n");
        let result = load_documents(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(DataError::EmptyCorpus)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_documents("/nonexistent/microlm_never_exists.txt");
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
