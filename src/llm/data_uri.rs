use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Decode(String),
}

/// A `data:<mime>;base64,<payload>` string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: String,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    pub fn parse(uri: &str) -> Result<Self, DataUriError> {
        let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (header, data) = rest.split_once(',').ok_or(DataUriError::MissingScheme)?;
        let mime_type = header.strip_suffix(";base64").ok_or(DataUriError::NotBase64)?;
        Ok(Self::new(mime_type, data))
    }

    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        STANDARD.decode(self.data.trim()).map_err(|e| DataUriError::Decode(e.to_string()))
    }

    /// Suggested file extension for saving the payload.
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "audio/pcm" => "pcm",
            _ => "bin",
        }
    }
}

impl std::fmt::Display for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_parses() {
        let uri = DataUri::new("image/png", "aGVsbG8=");
        let text = uri.to_string();
        assert_eq!(text, "data:image/png;base64,aGVsbG8=");
        let parsed = DataUri::parse(&text).unwrap();
        assert_eq!(parsed, uri);
        assert_eq!(parsed.decode().unwrap(), b"hello");
        assert_eq!(parsed.extension(), "png");
    }

    #[test]
    fn rejects_non_data_uris() {
        assert_eq!(DataUri::parse("https://x/y.png"), Err(DataUriError::MissingScheme));
        assert_eq!(DataUri::parse("data:text/plain,hi"), Err(DataUriError::NotBase64));
    }
}
