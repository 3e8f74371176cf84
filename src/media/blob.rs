//! Finalized recording output

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};

/// Encoded video with its container type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoBlob {
    mime_type: String,
    data: Bytes,
}

impl VideoBlob {
    /// Blob over `data`
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Concatenate `chunks` in order
    #[must_use]
    pub fn assemble(mime_type: &str, chunks: &[Bytes]) -> Self {
        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }
        Self::new(mime_type, data.freeze())
    }

    /// Container/codec type
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Encoded bytes
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no media was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `data:<mime>;base64,<payload>` encoding for transport
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}
