//! Source acquisition for `to_json`.
//!
//! Files are read as UTF-8 first (a leading BOM is dropped). A PEP 263 coding
//! declaration naming a supported legacy encoding is honoured before the
//! configured fallbacks are tried in order. Modules are resolved against the
//! configured search roots the way the import system finds plain source
//! modules and packages.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::diagnostics::Result;
use crate::err_msg;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

static CODING_COOKIE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t\x0c]*#.*?coding[:=][ \t]*([-\w.]+)").expect("coding cookie pattern compiles")
});

/// Single-byte encodings tried when a file is not UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyEncoding {
    Cp1252,
    Latin1,
    Ascii,
}

/// cp1252 assignments for 0x80..=0x9F; `None` marks undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20ac}'), None, Some('\u{201a}'), Some('\u{0192}'),
    Some('\u{201e}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02c6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017d}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201c}'),
    Some('\u{201d}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02dc}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203a}'),
    Some('\u{0153}'), None, Some('\u{017e}'), Some('\u{0178}'),
];

impl LegacyEncoding {
    /// Accepts the usual Python spellings of each codec.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "cp1252" | "windows-1252" => Some(LegacyEncoding::Cp1252),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Some(LegacyEncoding::Latin1),
            "ascii" | "us-ascii" => Some(LegacyEncoding::Ascii),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LegacyEncoding::Cp1252 => "cp1252",
            LegacyEncoding::Latin1 => "latin-1",
            LegacyEncoding::Ascii => "ascii",
        }
    }

    /// Strict decode; `None` if any byte is unmapped.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        bytes
            .iter()
            .map(|&b| match self {
                LegacyEncoding::Ascii => b.is_ascii().then_some(char::from(b)),
                LegacyEncoding::Latin1 => Some(char::from(b)),
                LegacyEncoding::Cp1252 => match b {
                    0x80..=0x9f => CP1252_HIGH[usize::from(b - 0x80)],
                    _ => Some(char::from(b)),
                },
            })
            .collect()
    }
}

/// Decoded source text and the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub encoding: &'static str,
}

/// Encoding named by a coding declaration on one of the first two lines.
fn declared_encoding(bytes: &[u8]) -> Option<LegacyEncoding> {
    bytes
        .split(|&b| b == b'\n')
        .take(2)
        .find_map(|line| CODING_COOKIE.captures(line))
        .and_then(|caps| caps.get(1))
        .and_then(|label| std::str::from_utf8(label.as_bytes()).ok())
        .and_then(LegacyEncoding::from_label)
}

pub fn decode_source(bytes: &[u8], fallbacks: &[LegacyEncoding]) -> Option<SourceText> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(SourceText {
            text: text.to_string(),
            encoding: "utf-8",
        });
    }
    let declared = declared_encoding(bytes);
    declared
        .iter()
        .chain(fallbacks.iter().filter(|e| Some(**e) != declared))
        .find_map(|encoding| {
            encoding.decode(bytes).map(|text| SourceText {
                text,
                encoding: encoding.label(),
            })
        })
}

pub fn read_source_file(path: &Path, fallbacks: &[LegacyEncoding]) -> Result<SourceText> {
    let bytes = std::fs::read(path).map_err(|e| {
        let message = if e.kind() == std::io::ErrorKind::NotFound {
            err_msg!(Input, "File not found: {}", path.display())
        } else {
            err_msg!(Input, "Cannot read {}", path.display())
        };
        message.caused_by(e)
    })?;
    let source = decode_source(&bytes, fallbacks).ok_or_else(|| {
        let tried: Vec<&str> = fallbacks.iter().map(LegacyEncoding::label).collect();
        err_msg!(
            Input,
            "Cannot decode {} as utf-8 or any of: {}",
            path.display(),
            tried.join(", ")
        )
    })?;
    if source.encoding != "utf-8" {
        tracing::info!(path = %path.display(), encoding = source.encoding, "decoded with fallback encoding");
    }
    Ok(source)
}

/// Finds `a.b.c` as `a/b/c.py` or `a/b/c/__init__.py` under the first root that has it.
pub fn resolve_module(name: &str, search_paths: &[PathBuf]) -> Result<PathBuf> {
    let parts: Vec<&str> = name.split('.').collect();
    if name.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(err_msg!(Input, "Invalid module name '{}'", name));
    }
    let relative: PathBuf = parts.iter().collect();
    for root in search_paths {
        let base = root.join(&relative);
        let candidates = [base.with_extension("py"), base.join("__init__.py")];
        if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
            tracing::debug!(module = name, path = %found.display(), "resolved module");
            return Ok(found);
        }
    }
    let searched: Vec<String> = search_paths.iter().map(|p| p.display().to_string()).collect();
    Err(err_msg!(Input, "Module not found: {}", name)
        .with_help(format!("searched: {}", searched.join(", "))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_python_spellings() {
        assert_eq!(LegacyEncoding::from_label("Windows_1252"), Some(LegacyEncoding::Cp1252));
        assert_eq!(LegacyEncoding::from_label("ISO-8859-1"), Some(LegacyEncoding::Latin1));
        assert_eq!(LegacyEncoding::from_label("utf-16"), None);
    }

    #[test]
    fn cp1252_maps_the_c1_range() {
        assert_eq!(LegacyEncoding::Cp1252.decode(b"\x93hi\x94 \x80"), Some("\u{201c}hi\u{201d} \u{20ac}".into()));
        assert_eq!(LegacyEncoding::Cp1252.decode(b"\x81"), None);
        assert_eq!(LegacyEncoding::Latin1.decode(b"\x81"), Some("\u{81}".into()));
        assert_eq!(LegacyEncoding::Ascii.decode(b"\xe9"), None);
    }

    #[test]
    fn utf8_wins_and_bom_is_dropped() {
        let source = decode_source(b"\xef\xbb\xbfx = '\xc3\xa9'\n", &[LegacyEncoding::Latin1]).unwrap();
        assert_eq!(source.text, "x = 'é'\n");
        assert_eq!(source.encoding, "utf-8");
    }

    #[test]
    fn fallbacks_apply_in_order() {
        let fallbacks = [LegacyEncoding::Cp1252, LegacyEncoding::Latin1];
        let source = decode_source(b"s = '\x93q\x94'\n", &fallbacks).unwrap();
        assert_eq!(source.encoding, "cp1252");
        let source = decode_source(b"s = '\x81'\n", &fallbacks).unwrap();
        assert_eq!(source.encoding, "latin-1");
        assert!(decode_source(b"\xff", &[LegacyEncoding::Ascii]).is_none());
    }

    #[test]
    fn coding_declaration_is_honoured() {
        let bytes = b"# -*- coding: latin-1 -*-\ns = '\x93'\n";
        let source = decode_source(bytes, &[LegacyEncoding::Cp1252]).unwrap();
        assert_eq!(source.encoding, "latin-1");
        assert!(source.text.contains('\u{93}'));
    }

    #[test]
    fn modules_resolve_to_files_and_packages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        std::fs::write(dir.path().join("pkg/__init__.py"), "").unwrap();
        std::fs::write(dir.path().join("pkg/sub/mod.py"), "x = 1\n").unwrap();
        let roots = vec![dir.path().join("missing"), dir.path().to_path_buf()];
        assert_eq!(
            resolve_module("pkg.sub.mod", &roots).unwrap(),
            dir.path().join("pkg/sub/mod.py")
        );
        assert_eq!(resolve_module("pkg", &roots).unwrap(), dir.path().join("pkg/__init__.py"));
        let err = resolve_module("nope", &roots).unwrap_err();
        assert_eq!(err.message(), "Module not found: nope");
        assert!(resolve_module("a..b", &roots).is_err());
    }
}
