//! Transform parameters shared by the engine and the fingerprint.

use std::fmt;

/// Output encodings the proxy can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Jpeg, OutputFormat::Webp];

    /// Pick the output format from an `Accept` header value.
    pub fn negotiate(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.contains("image/webp") => OutputFormat::Webp,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Stable numeric code folded into fingerprints.
    pub fn code(self) -> u8 {
        match self {
            OutputFormat::Jpeg => 1,
            OutputFormat::Webp => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed compression level passed to every transform.
pub const COMPRESSION_LEVEL: u32 = 1;

/// Everything that determines the bytes a transform produces.
///
/// A zero `width`, `height` or `quality` means "unset": the engine falls back
/// to its own default for that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u32,
    pub format: OutputFormat,
    pub force: bool,
    pub enlarge: bool,
    pub strip_metadata: bool,
    pub compression: u32,
}

impl TransformOptions {
    /// Options for the given request values with the proxy's fixed policy.
    pub fn new(width: u32, height: u32, quality: u32, format: OutputFormat) -> Self {
        Self {
            width,
            height,
            quality,
            format,
            force: false,
            enlarge: false,
            strip_metadata: true,
            compression: COMPRESSION_LEVEL,
        }
    }
}

/// Parse a numeric query parameter, treating absence or garbage as unset.
pub fn parse_dimension(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate() {
        assert_eq!(OutputFormat::negotiate(None), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::negotiate(Some("image/png,*/*")), OutputFormat::Jpeg);
        assert_eq!(
            OutputFormat::negotiate(Some("image/avif,image/webp,*/*;q=0.8")),
            OutputFormat::Webp
        );
    }

    #[test]
    fn test_policy_constants() {
        let opts = TransformOptions::new(200, 0, 0, OutputFormat::Jpeg);
        assert!(!opts.force);
        assert!(!opts.enlarge);
        assert!(opts.strip_metadata);
        assert_eq!(opts.compression, COMPRESSION_LEVEL);
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension(Some("200")), 200);
        assert_eq!(parse_dimension(Some("0")), 0);
        assert_eq!(parse_dimension(Some("-5")), 0);
        assert_eq!(parse_dimension(Some("wide")), 0);
        assert_eq!(parse_dimension(None), 0);
    }
}
