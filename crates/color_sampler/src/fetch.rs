use std::sync::Arc;

use bridge_protocol::{ImageBytes, ImageSource};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("history source `{0}` not found")]
    NotFound(String),
    #[error("history source `{image}` could not be read: {reason}")]
    Io { image: String, reason: String },
}

/// Retrieves the encoded bytes behind an image reference.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, source: &ImageSource) -> Result<ImageBytes, FetchError>;
}

impl<T: ByteFetcher + ?Sized> ByteFetcher for Arc<T> {
    fn fetch(&self, source: &ImageSource) -> Result<ImageBytes, FetchError> {
        (**self).fetch(source)
    }
}

/// Treats the source as a filesystem path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileByteFetcher;

impl ByteFetcher for FileByteFetcher {
    fn fetch(&self, source: &ImageSource) -> Result<ImageBytes, FetchError> {
        std::fs::read(source.as_str())
            .map(ImageBytes::new)
            .map_err(|error| match error.kind() {
                std::io::ErrorKind::NotFound => FetchError::NotFound(source.to_string()),
                _ => FetchError::Io {
                    image: source.to_string(),
                    reason: error.to_string(),
                },
            })
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MapByteFetcher;

#[cfg(any(test, feature = "test-helpers"))]
mod memory {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Default, Clone)]
    pub struct MapByteFetcher {
        entries: HashMap<String, Vec<u8>>,
    }

    impl MapByteFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entry(mut self, source: &str, bytes: Vec<u8>) -> Self {
            self.entries.insert(source.to_owned(), bytes);
            self
        }
    }

    impl ByteFetcher for MapByteFetcher {
        fn fetch(&self, source: &ImageSource) -> Result<ImageBytes, FetchError> {
            self.entries
                .get(source.as_str())
                .map(|bytes| ImageBytes::new(bytes.clone()))
                .ok_or_else(|| FetchError::NotFound(source.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let error = FileByteFetcher
            .fetch(&ImageSource::new("/definitely/not/here.bin"))
            .expect_err("missing file must fail");
        assert_eq!(
            error,
            FetchError::NotFound("/definitely/not/here.bin".to_owned())
        );
    }

    #[test]
    fn map_fetcher_serves_entries() {
        let fetcher = MapByteFetcher::new().with_entry("history://1", vec![1, 2, 3]);
        let bytes = fetcher
            .fetch(&ImageSource::new("history://1"))
            .expect("registered");
        assert_eq!(bytes.as_slice(), &[1, 2, 3]);
    }
}
