//! Source URL classification.

/// How a channel's source should be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A continuous MPEG-TS stream, demuxed while it downloads.
    ContinuousTs,
    /// A segmented HLS playlist.
    SegmentedHls,
    /// Anything the playback surface can load natively.
    Direct,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ContinuousTs => "continuous-ts",
            SourceKind::SegmentedHls => "segmented-hls",
            SourceKind::Direct => "direct",
        }
    }
}

/// Classify a source URL by its shape.
///
/// Continuous transport streams are recognized by a `.ts` marker or a
/// `/live/` path segment, segmented HLS by `.m3u8` or `/play/`. Everything
/// else is handed to the playback surface as-is. Checked in that order, so
/// `/live/` wins over a `.m3u8` suffix.
pub fn classify(source_url: &str) -> SourceKind {
    if source_url.contains(".ts") || source_url.contains("/live/") {
        SourceKind::ContinuousTs
    } else if source_url.contains(".m3u8") || source_url.contains("/play/") {
        SourceKind::SegmentedHls
    } else {
        SourceKind::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_path_is_continuous() {
        assert_eq!(classify("http://host/live/chan1"), SourceKind::ContinuousTs);
    }

    #[test]
    fn ts_extension_is_continuous() {
        assert_eq!(
            classify("http://host/media/feed.ts"),
            SourceKind::ContinuousTs
        );
    }

    #[test]
    fn play_path_is_segmented() {
        assert_eq!(
            classify("http://host/play/chan1.m3u8"),
            SourceKind::SegmentedHls
        );
    }

    #[test]
    fn m3u8_without_play_path_is_segmented() {
        assert_eq!(
            classify("http://host/hls/index.m3u8"),
            SourceKind::SegmentedHls
        );
    }

    #[test]
    fn anything_else_is_direct() {
        assert_eq!(classify("http://host/video.mp4"), SourceKind::Direct);
    }

    #[test]
    fn live_playlist_counts_as_continuous() {
        // The continuous check runs first.
        assert_eq!(
            classify("http://host/live/chan1.m3u8"),
            SourceKind::ContinuousTs
        );
    }

    #[test]
    fn ts_marker_in_query_counts() {
        assert_eq!(
            classify("http://host/get?file=feed.ts"),
            SourceKind::ContinuousTs
        );
    }
}
