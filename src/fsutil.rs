use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Errors from reading small procfs/sysfs files.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("failed to open file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns [`FsError::Open`] if the file cannot be opened.
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FsError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Reads a single-value file such as `/sys/class/net/eth0/ifindex`, without the
/// trailing newline.
///
/// # Errors
///
/// Returns [`FsError::Read`] if the file cannot be read.
pub fn read_trimmed(path: impl AsRef<Path>) -> Result<String, FsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| FsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_open_file_reader_error() {
        let err = open_file_reader("/definitely/does/not/exist").unwrap_err();
        match err {
            FsError::Open { path, source } => {
                assert_eq!(path, PathBuf::from("/definitely/does/not/exist"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_trimmed() {
        let mut tmp = tempfile::NamedTempFile::new().expect("failed to create temp file");
        writeln!(tmp, "  42").unwrap();
        assert_eq!(read_trimmed(tmp.path()).unwrap(), "42");
        assert!(matches!(
            read_trimmed("/definitely/does/not/exist"),
            Err(FsError::Read { .. })
        ));
    }
}
