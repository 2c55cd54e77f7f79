// Playback resilience controller - source classifier
//
// Decides between manifest-based adaptive streaming and progressive
// download from nothing but the source URL.

use common::PlaybackMode;

/// Extensions that identify a segment manifest when nothing else is configured
pub const DEFAULT_MANIFEST_EXTENSIONS: &[&str] = &["m3u8"];

/// Classify `url` with the default manifest extensions.
///
/// Unrecognized or missing extensions fall back to `Progressive`.
pub fn classify(url: &str) -> PlaybackMode {
    match path_extension(url) {
        Some(ext) if DEFAULT_MANIFEST_EXTENSIONS.contains(&ext.as_str()) => PlaybackMode::Manifest,
        _ => PlaybackMode::Progressive,
    }
}

/// Classifier with a configurable manifest extension set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceClassifier {
    manifest_extensions: Vec<String>,
}

impl SourceClassifier {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            manifest_extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn classify(&self, url: &str) -> PlaybackMode {
        match path_extension(url) {
            Some(ext) if self.manifest_extensions.iter().any(|known| *known == ext) => {
                PlaybackMode::Manifest
            }
            _ => PlaybackMode::Progressive,
        }
    }
}

impl Default for SourceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST_EXTENSIONS)
    }
}

/// Lowercased extension of the last path segment, ignoring scheme,
/// authority, query string and fragment.
fn path_extension(url: &str) -> Option<String> {
    let url = url.trim();
    let end = url.find(|c| c == '?' || c == '#').unwrap_or(url.len());
    let url = &url[..end];

    let path = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        None => url,
    };

    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }

    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_urls() {
        let urls = [
            "https://cdn.example.com/live/master.m3u8",
            "https://cdn.example.com/live/MASTER.M3U8",
            "https://cdn.example.com/live/master.m3u8?token=abc.mp4",
            "https://cdn.example.com/live/master.m3u8#t=10",
            "/videos/7/index.m3u8",
            "index.m3u8",
        ];

        for url in urls {
            assert_eq!(classify(url), PlaybackMode::Manifest, "{url}");
        }
    }

    #[test]
    fn test_progressive_urls() {
        let urls = [
            "https://cdn.example.com/clips/a.mp4",
            "https://cdn.example.com/clips/a.webm?x=master.m3u8",
            "https://cdn.example.com/m3u8/file",
            "https://cdn.example.com/clips/.m3u8",
            "https://cdn.example.com/clips/video.",
            "https://host.m3u8",
            "",
        ];

        for url in urls {
            assert_eq!(classify(url), PlaybackMode::Progressive, "{url}");
        }
    }

    #[test]
    fn test_configured_extensions() {
        let classifier = SourceClassifier::new([".MPD", "m3u8"]);

        assert_eq!(
            classifier.classify("https://cdn.example.com/a/manifest.mpd"),
            PlaybackMode::Manifest
        );
        assert_eq!(
            classifier.classify("https://cdn.example.com/a/index.m3u8"),
            PlaybackMode::Manifest
        );
        assert_eq!(
            classifier.classify("https://cdn.example.com/a/clip.mp4"),
            PlaybackMode::Progressive
        );
    }

    #[test]
    fn test_default_classifier_matches_free_function() {
        let classifier = SourceClassifier::default();

        for url in ["a.m3u8", "a.mp4", "https://x/y/z.M3U8?q", "noext"] {
            assert_eq!(classifier.classify(url), classify(url));
        }
    }
}
