//! CSV output sinks.
//!
//! Position and coverage logs are truncated when a run starts. The run
//! summary file accumulates one row per run, so its header is written only
//! when the file is new or empty.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum OutputError {
    OpenError(PathBuf, io::Error),
    WriteError(PathBuf, io::Error),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::OpenError(path, e) => write!(f, "Failed to open {}: {}", path.display(), e),
            OutputError::WriteError(path, e) => write!(f, "Failed to write {}: {}", path.display(), e),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::OpenError(_, e) | OutputError::WriteError(_, e) => Some(e),
        }
    }
}

pub type FileLog = CsvLog<BufWriter<File>>;

/// A CSV file with a known header.
pub struct CsvLog<W: Write> {
    path: PathBuf,
    writer: W,
    rows: u64,
}

impl FileLog {
    /// Create (or truncate) `path` and write `header`.
    pub fn create(path: &Path, header: &str) -> Result<Self, OutputError> {
        let file = File::create(path).map_err(|e| OutputError::OpenError(path.to_path_buf(), e))?;
        let mut log = Self::from_writer(path, BufWriter::new(file));
        log.write_line(header)?;
        Ok(log)
    }

    /// Open `path` for appending; `header` is written only if the file is empty.
    pub fn append_with_header(path: &Path, header: &str) -> Result<Self, OutputError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OutputError::OpenError(path.to_path_buf(), e))?;
        let is_empty = file.metadata().map_err(|e| OutputError::OpenError(path.to_path_buf(), e))?.len() == 0;
        let mut log = Self::from_writer(path, BufWriter::new(file));
        if is_empty {
            log.write_line(header)?;
        }
        Ok(log)
    }
}

impl<W: Write> CsvLog<W> {
    pub fn from_writer(path: &Path, writer: W) -> Self {
        Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), OutputError> {
        writeln!(self.writer, "{}", line).map_err(|e| OutputError::WriteError(self.path.clone(), e))
    }

    /// Write one data row produced by `write_row`.
    pub fn write_with<F>(&mut self, write_row: F) -> Result<(), OutputError>
    where
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        write_row(&mut self.writer).map_err(|e| OutputError::WriteError(self.path.clone(), e))?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written through this handle (the header is not counted).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush().map_err(|e| OutputError::WriteError(self.path.clone(), e))
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("maritime-relay-{}-{}", std::process::id(), name));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn create_truncates_and_writes_header() {
        let path = temp_path("create.csv");
        fs::write(&path, "stale\n").unwrap();
        {
            let mut log = CsvLog::create(&path, "a,b").unwrap();
            log.write_with(|w| writeln!(w, "1,2")).unwrap();
            log.flush().unwrap();
            assert_eq!(log.rows(), 1);
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn append_writes_header_once() {
        let path = temp_path("append.csv");
        for run in 0..3 {
            let mut log = CsvLog::append_with_header(&path, "run").unwrap();
            log.write_with(|w| writeln!(w, "{}", run)).unwrap();
            log.flush().unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "run\n0\n1\n2\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_failure_names_the_path() {
        let path = Path::new("/nonexistent-dir/out.csv");
        let err = CsvLog::create(path, "x").err().unwrap();
        assert!(matches!(err, OutputError::OpenError(..)));
        assert!(err.to_string().contains("/nonexistent-dir/out.csv"));
    }

    #[test]
    fn in_memory_writer() {
        let mut log = CsvLog::from_writer(Path::new("mem"), Vec::new());
        log.write_with(|w| writeln!(w, "x")).unwrap();
        assert_eq!(log.into_inner(), b"x\n");
    }
}
