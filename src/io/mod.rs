//! Input and output utility.
use std::io;
use std::error::Error;
use std::fs::File;
use std::path::{self, Path};
use flate2;
use xz2;

/// Helper function for creating `io::Error` with
/// `io::ErrorKind::InvalidData`.
pub fn invalid_data<E: Into<Box<dyn Error + Send + Sync>>>(error: E)
                                                           -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}

/// Works just like Python's `os.path.splitext`.  Note that the returned
/// extension includes the dot.  If there is no extension, returns an empty
/// string as the extension.  Only works on UTF-8 strings due to limitations
/// of the `std::path::Path` API.
pub fn split_extension(path: &Path) -> io::Result<(&str, &str)> {
    let path = path.to_str()
        .ok_or_else(|| invalid_data("path is not UTF-8"))?;
    match path.rfind('.') {
        None => Ok((path, "")),
        Some(i) => {
            let ext = &path[i ..];
            if ext.chars().any(path::is_separator) {
                Ok((path, ""))
            } else {
                Ok((&path[.. i], ext))
            }
        }
    }
}

fn compression_ext(path: &Path) -> io::Result<&str> {
    let (_, ext) = split_extension(path)?;
    if !ext.ends_with('z') {
        return Ok("");
    }
    match ext {
        ".gz" | ".xz" => Ok(ext),
        _ => Err(invalid_data(
            format!("unrecognized compression format: {}", ext),
        )),
    }
}

/// Open a compressed file and decode based on the file extension.
/// If the extension does not end in "z", the file is read as-is.
pub fn open_compressed(path: &Path) -> io::Result<Box<dyn io::Read>> {
    let ext = compression_ext(path)?;
    let file = io::BufReader::new(File::open(path)?);
    Ok(match ext {
        ".gz" => Box::new(flate2::read::GzDecoder::new(file)),
        ".xz" => Box::new(xz2::read::XzDecoder::new(file)),
        _ => Box::new(file),
    })
}

/// Create a file that is compressed based on the file extension, the
/// counterpart of `open_compressed`.
pub fn create_compressed(path: &Path) -> io::Result<Box<dyn io::Write>> {
    let ext = compression_ext(path)?;
    let file = io::BufWriter::new(File::create(path)?);
    Ok(match ext {
        ".gz" => Box::new(flate2::write::GzEncoder::new(
            file, flate2::Compression::default())),
        ".xz" => Box::new(xz2::write::XzEncoder::new(file, 6)),
        _ => Box::new(file),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        let p = Path::new("a/b.tbme.gz");
        assert_eq!(split_extension(p).unwrap(), ("a/b.tbme", ".gz"));
        assert_eq!(split_extension(Path::new("a.b/c")).unwrap(),
                   ("a.b/c", ""));
        assert_eq!(compression_ext(Path::new("x.bin")).unwrap(), "");
        assert!(compression_ext(Path::new("x.bz")).is_err());
    }
}
