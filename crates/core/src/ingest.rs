//! Resolution of an ingest request into exactly one video source.
//!
//! Clients submit either a file or a URL. Blank form values count as
//! absent, matching how browsers submit empty inputs.

use validator::Validate;

use crate::error::CoreError;
use crate::lifecycle::SourceType;

/// Supported video file extensions for upload.
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi"];

/// The single source an ingest request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    /// An uploaded file; `extension` is lowercase and supported.
    Upload { file_name: String, extension: String },
    /// A remote video URL.
    Url(String),
}

impl IngestSource {
    pub fn source_type(&self) -> SourceType {
        match self {
            IngestSource::Upload { .. } => SourceType::Upload,
            IngestSource::Url(_) => SourceType::Url,
        }
    }
}

#[derive(Validate)]
struct UrlSubmission {
    #[validate(url)]
    video_url: String,
}

/// Resolve the `file` / `video_url` pair of an ingest request.
///
/// `file_name` is `Some` when a file part was present in the request.
pub fn resolve_source(
    file_name: Option<&str>,
    video_url: Option<&str>,
) -> Result<IngestSource, CoreError> {
    let video_url = video_url.map(str::trim).filter(|u| !u.is_empty());

    match (file_name, video_url) {
        (None, None) => Err(CoreError::Validation(
            "Either file or video_url must be provided".into(),
        )),
        (Some(_), Some(_)) => Err(CoreError::Validation(
            "Provide only one of file or video_url".into(),
        )),
        (None, Some(url)) => {
            validate_video_url(url)?;
            Ok(IngestSource::Url(url.to_string()))
        }
        (Some(name), None) => {
            let extension = video_extension(name)?;
            Ok(IngestSource::Upload {
                file_name: name.to_string(),
                extension,
            })
        }
    }
}

/// Validate that `url` is an absolute http(s) URL.
pub fn validate_video_url(url: &str) -> Result<(), CoreError> {
    let submission = UrlSubmission {
        video_url: url.to_string(),
    };
    let scheme_ok = url.starts_with("http://") || url.starts_with("https://");
    if !scheme_ok || submission.validate().is_err() {
        return Err(CoreError::Validation(format!(
            "Invalid video_url '{url}'. Must be an absolute http(s) URL"
        )));
    }
    Ok(())
}

/// Extract and check the extension of an uploaded file name.
pub fn video_extension(file_name: &str) -> Result<String, CoreError> {
    let ext = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    };

    if SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported video format '{file_name}'. Supported: {}",
            SUPPORTED_VIDEO_EXTENSIONS.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn url_only_resolves_to_url() {
        let source = resolve_source(None, Some("https://example.com/video.mp4")).unwrap();
        assert_eq!(source, IngestSource::Url("https://example.com/video.mp4".into()));
        assert_eq!(source.source_type(), SourceType::Url);
    }

    #[test]
    fn file_only_resolves_to_upload() {
        let source = resolve_source(Some("Clip.MP4"), None).unwrap();
        assert_matches!(source, IngestSource::Upload { ref extension, .. } if extension == "mp4");
    }

    #[test]
    fn neither_is_rejected() {
        assert_matches!(resolve_source(None, None), Err(CoreError::Validation(_)));
        assert_matches!(resolve_source(None, Some("   ")), Err(CoreError::Validation(_)));
    }

    #[test]
    fn both_is_rejected() {
        let err = resolve_source(Some("a.mp4"), Some("https://example.com/a.mp4")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Provide only one of file or video_url"
        );
    }

    #[test]
    fn non_http_urls_are_rejected() {
        assert!(validate_video_url("ftp://example.com/a.mp4").is_err());
        assert!(validate_video_url("not a url").is_err());
        assert!(validate_video_url("http://localhost:8080/v.webm").is_ok());
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        assert!(video_extension("notes.txt").is_err());
        assert!(video_extension("noextension").is_err());
        assert!(video_extension(".mp4").is_err());
        assert_eq!(video_extension("a.b.mov").unwrap(), "mov");
    }
}
