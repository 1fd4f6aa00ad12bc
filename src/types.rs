use std::fmt;

/// Kind of media asset held in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum MediaKind {
    Images,
    Songs,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Images, MediaKind::Songs];

    /// Directory name under the cache root.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Images => "images",
            MediaKind::Songs => "songs",
        }
    }

    /// The catalog's `mediaType` code: `p` for pictures, `a` for audio.
    pub fn catalog_code(&self) -> &'static str {
        match self {
            MediaKind::Images => "p",
            MediaKind::Songs => "a",
        }
    }

    /// Extensions that may be written to disk for this kind.
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Images => &["png", "jpeg"],
            MediaKind::Songs => &["mp3", "wav"],
        }
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.accepted_extensions().contains(&ext.as_str())
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
