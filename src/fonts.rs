//! Chart font discovery and registration.
//!
//! The bitmap backend renders glyphs with `ab_glyph`, which has no built-in
//! font database, so a usable face has to be found on disk and registered
//! under the `sans-serif` family before any text is drawn. A CJK-capable
//! face is preferred so Chinese chart titles and column names render;
//! absence of one degrades to a Latin face and English titles, never an
//! error. Collection formats (`.ttc`) that the glyph engine cannot parse are
//! simply skipped in favor of the next candidate.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use log::{debug, warn};
use plotters::style::{FontStyle, register_font};

/// Family name every chart text style refers to.
pub const CHART_FONT_FAMILY: &str = "sans-serif";

/// Outcome of font discovery for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSupport {
    /// A CJK-capable face is registered; bilingual chart text is safe.
    Cjk,
    /// Only a Latin face is registered; chart text falls back to English.
    Latin,
    /// No usable face was found; text drawing will fail and the affected
    /// charts get skipped by the renderer's local recovery.
    None,
}

impl FontSupport {
    pub fn cjk(self) -> bool {
        matches!(self, FontSupport::Cjk)
    }
}

/// Well-known CJK font locations across Windows, Linux, and macOS.
const CJK_CANDIDATES: &[&str] = &[
    "C:/Windows/Fonts/msyh.ttc",
    "C:/Windows/Fonts/msyhbd.ttc",
    "C:/Windows/Fonts/simhei.ttf",
    "C:/Windows/Fonts/simsun.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
];

const CJK_KEYWORDS: &[&str] = &[
    "yahei", "simhei", "simsun", "notosanscjk", "pingfang", "cjk", "wqy", "heiti", "songti",
    "fangsong",
];

const LATIN_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:/Windows/Fonts/arial.ttf",
    "C:/Windows/Fonts/segoeui.ttf",
];

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:/Windows/Fonts",
];

static SUPPORT: OnceLock<FontSupport> = OnceLock::new();

/// Discovers and registers a chart font once per process.
pub fn ensure_chart_font() -> FontSupport {
    *SUPPORT.get_or_init(|| {
        for candidate in cjk_candidate_paths() {
            if try_register(&candidate) {
                debug!("Registered CJK chart font {candidate:?}");
                return FontSupport::Cjk;
            }
        }
        for candidate in LATIN_CANDIDATES {
            let path = Path::new(candidate);
            if try_register(path) {
                debug!("Registered Latin chart font {path:?}");
                return FontSupport::Latin;
            }
        }
        warn!("No usable chart font found; charts with text will be skipped");
        FontSupport::None
    })
}

fn cjk_candidate_paths() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = CJK_CANDIDATES.iter().map(PathBuf::from).collect();
    for dir in SYSTEM_FONT_DIRS {
        scan_for_cjk(Path::new(dir), &mut candidates, 0);
    }
    candidates
}

fn scan_for_cjk(dir: &Path, found: &mut Vec<PathBuf>, depth: usize) {
    if depth > 3 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_for_cjk(&path, found, depth + 1);
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let is_font = name.ends_with(".ttf") || name.ends_with(".otf") || name.ends_with(".ttc");
        if is_font && CJK_KEYWORDS.iter().any(|kw| name.contains(kw)) {
            found.push(path);
        }
    }
}

fn try_register(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    // The registry keeps a 'static borrow of the face for the process
    // lifetime; at most a handful of candidates ever get leaked.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(CHART_FONT_FAMILY, FontStyle::Normal, bytes).is_ok()
}
