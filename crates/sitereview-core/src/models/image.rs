use serde::{Deserialize, Serialize};

/// An uploaded image waiting to be compressed and stored.
///
/// Lives only for the duration of one submission; once a URL is produced (or
/// the attempt fails) the bytes are dropped.
#[derive(Clone)]
pub struct ImageAsset {
    pub field_name: String,
    pub data: Vec<u8>,
    /// Content type announced by the client. Used only when the bytes
    /// themselves cannot be sniffed.
    pub mime_hint: String,
    pub original_filename: Option<String>,
}

impl ImageAsset {
    pub fn new(field_name: impl Into<String>, data: Vec<u8>, mime_hint: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            data,
            mime_hint: mime_hint.into(),
            original_filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.original_filename = Some(filename.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAsset")
            .field("field_name", &self.field_name)
            .field("size_bytes", &self.data.len())
            .field("mime_hint", &self.mime_hint)
            .field("original_filename", &self.original_filename)
            .finish()
    }
}

/// Expected upload field: which files go to which storage folder, and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_name: String,
    pub folder: String,
    pub max_count: usize,
}

impl FieldSpec {
    pub fn new(field_name: impl Into<String>, folder: impl Into<String>, max_count: usize) -> Self {
        Self {
            field_name: field_name.into(),
            folder: folder.into(),
            max_count,
        }
    }
}
