//! Assorted utility functions and structures.

use std::{
    cell::RefCell,
    fs::File,
    io::Read,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::error::Error;

/// Shared mutable type able to be passed between types
/// allowing for circular referencing and interior mutability.
pub type SharedMut<T> = Rc<RefCell<T>>;

/// Reads the contents of the file at the given path into
/// a vector of bytes.
pub fn read_file(path: &str) -> Result<Vec<u8>, Error> {
    let mut file =
        File::open(path).map_err(|_| Error::CustomError(format!("Failed to open file: {path}")))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|_| Error::CustomError(format!("Failed to read from file: {path}")))?;
    Ok(data)
}

/// Current Unix timestamp in seconds.
pub fn timestamp() -> u64 {
    let now = SystemTime::now();
    now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::read_file;

    #[test]
    fn test_read_file_missing() {
        let result = read_file("/path/that/does/not/exist.gb");
        assert!(result.is_err());
    }
}
