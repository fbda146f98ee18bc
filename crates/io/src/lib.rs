// File I/O operations

pub mod error;
pub mod gold;
pub mod model;
pub mod report;
pub mod text;

pub use error::IoError;

use std::io::Read;
use std::path::Path;

/// Read a file and convert it to UTF-8 if needed. Gold standards exported
/// from office tools are often Windows-1252.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::read(path, e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
