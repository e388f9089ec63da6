use crate::error::RustyCoverError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// Workbook content from a path or from an upload
pub enum UnifiedReader {
    Local(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<UnifiedReader, RustyCoverError> {
        Ok(UnifiedReader::Local(BufReader::new(File::open(path)?)))
    }

    /// Wraps the bytes of an uploaded file
    pub fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }

    fn inner(&mut self) -> &mut dyn ReadSeek {
        match self {
            UnifiedReader::Local(file) => file,
            UnifiedReader::Memory(upload) => upload,
        }
    }
}

trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner().read(buf)
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner().seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_register_file() {
        assert!(UnifiedReader::open("Cargo.toml").is_ok());
        let error = UnifiedReader::open("реестр_нет.xlsx").err();
        assert!(matches!(error, Some(RustyCoverError::IoError(_))));
    }

    #[test]
    fn uploaded_bytes_rewind() {
        let mut reader = UnifiedReader::from_bytes(b"PK\x03\x04".to_vec());
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"PK");
        reader.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"PK\x03\x04");
    }
}
