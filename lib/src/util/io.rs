use std::{
    backtrace::Backtrace,
    fs::{self, File},
    io,
    path::Path,
};

use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum FileError {
    #[snafu(transparent)]
    Io { source: io::Error },
    #[snafu(display("the file '{path}' was not found:\n{backtrace}"))]
    FileNotFound { path: String, backtrace: Backtrace },
    #[snafu(display("parent directory does not exist for file '{path}':\n{backtrace}"))]
    FileParentNotFound { path: String, backtrace: Backtrace },
}

/// Wrapper for [`File::open`] with clearer errors.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<File, FileError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            let path = path.to_string_lossy();
            match err.kind() {
                io::ErrorKind::NotFound => return FileNotFoundSnafu { path }.fail(),
                _ => Err(err)?,
            }
        }
    };
    Ok(file)
}

/// Wrapper for [`File::create`] with clearer errors.
pub fn create_file<P: AsRef<Path>>(path: P) -> Result<File, FileError> {
    let path = path.as_ref();
    let file = match File::create(path) {
        Ok(file) => file,
        Err(err) => {
            let path = path.to_string_lossy();
            match err.kind() {
                io::ErrorKind::NotFound => return FileParentNotFoundSnafu { path }.fail(),
                _ => Err(err)?,
            }
        }
    };
    Ok(file)
}

/// Wrapper for [`fs::read`] with clearer errors.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, FileError> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(err) => {
            let path = path.to_string_lossy();
            match err.kind() {
                io::ErrorKind::NotFound => FileNotFoundSnafu { path }.fail(),
                _ => Err(err)?,
            }
        }
    }
}
