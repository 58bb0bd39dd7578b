//! Cross-platform filename sanitizing.
//!
//! Turns arbitrary titles into names that are safe to create on the target
//! filesystem. Every function here is pure and total: any input maps to a
//! non-empty name within the byte limit of the selected rule set.

use std::fmt;
use std::str::FromStr;

/// Maximum byte length of a single path component.
pub const MAX_COMPONENT_BYTES: usize = 255;

/// Maximum length of a whole path (in characters) under the Windows rule set.
pub const WINDOWS_MAX_PATH_CHARS: usize = 259;

const WINDOWS_EXTENSION_CAP: usize = 4;
const PORTABLE_EXTENSION_CAP: usize = 16;

const WINDOWS_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Filesystem rule set used when sanitizing names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetOs {
    /// Unix-like filesystems: only `/`, NUL and `\` are rejected.
    #[default]
    Portable,
    /// Windows-compatible names: reserved characters, device names and the
    /// whole-path ceiling apply.
    Windows,
}

impl TargetOs {
    /// Rule set matching the host the binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Portable
        }
    }

    fn extension_cap(self) -> usize {
        match self {
            Self::Portable => PORTABLE_EXTENSION_CAP,
            Self::Windows => WINDOWS_EXTENSION_CAP,
        }
    }

    fn is_invalid(self, c: char) -> bool {
        match self {
            Self::Portable => matches!(c, '/' | '\0' | '\\'),
            Self::Windows => {
                matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
                    || u32::from(c) < 0x20
            }
        }
    }

    fn is_separator(self, c: char) -> bool {
        match self {
            Self::Portable => c == '/',
            Self::Windows => c == '/' || c == '\\',
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Portable => f.write_str("portable"),
            Self::Windows => f.write_str("windows"),
        }
    }
}

impl FromStr for TargetOs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::current()),
            "portable" | "unix" => Ok(Self::Portable),
            "windows" => Ok(Self::Windows),
            other => Err(format!(
                "unknown target OS '{other}' (expected auto, portable or windows)"
            )),
        }
    }
}

/// Sanitizes a single filename component for `os`.
///
/// Invalid and non-printable characters become `_`, leading and trailing
/// spaces and dots are trimmed, Windows device names get a `_` prefix, and
/// the result is held to [`MAX_COMPONENT_BYTES`] while keeping the extension.
///
/// # Examples
///
/// ```
/// use ytdl_core::{TargetOs, sanitize_filename};
///
/// assert_eq!(sanitize_filename("a/b: c?.mp3", TargetOs::Windows), "a_b_ c_.mp3");
/// assert_eq!(sanitize_filename("nul.txt", TargetOs::Windows), "_nul.txt");
/// assert_eq!(sanitize_filename(" .. ", TargetOs::Portable), "_");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str, os: TargetOs) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if os.is_invalid(c) || is_non_printable(c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = trim_spaces_and_dots(&mapped);
    let truncated = truncate_component(trimmed, MAX_COMPONENT_BYTES, os.extension_cap());
    let mut out = trim_spaces_and_dots(&truncated).to_string();

    if out.is_empty() || out == "." || out == ".." {
        return "_".to_string();
    }

    if os == TargetOs::Windows && is_reserved_windows_name(&out) {
        out.insert(0, '_');
        if out.len() > MAX_COMPONENT_BYTES {
            let shortened = truncate_component(&out, MAX_COMPONENT_BYTES, os.extension_cap());
            out = shortened.trim_end_matches([' ', '.']).to_string();
        }
    }

    out
}

/// Sanitizes the final component of `path`, leaving the directory untouched.
///
/// Under [`TargetOs::Windows`] the rejoined path is additionally held to
/// [`WINDOWS_MAX_PATH_CHARS`] by shortening the component's base name. When
/// the directory alone exceeds the ceiling, the component keeps one base
/// character.
#[must_use]
pub fn sanitize_path(path: &str, os: TargetOs) -> String {
    let (dir, component) = match path.char_indices().rev().find(|(_, c)| os.is_separator(*c)) {
        Some((idx, sep)) => path.split_at(idx + sep.len_utf8()),
        None => ("", path),
    };

    let mut file = sanitize_filename(component, os);

    if os == TargetOs::Windows {
        let dir_chars = dir.chars().count();
        let file_chars = file.chars().count();
        if dir_chars + file_chars > WINDOWS_MAX_PATH_CHARS {
            let budget = WINDOWS_MAX_PATH_CHARS.saturating_sub(dir_chars);
            file = shorten_to_chars(&file, budget);
        }
    }

    format!("{dir}{file}")
}

fn shorten_to_chars(file: &str, budget: usize) -> String {
    let (base, ext) = split_extension(file);
    let keep = budget.saturating_sub(ext.chars().count()).max(1);
    let shortened = shorten_base(base, keep, ext);
    if !is_reserved_windows_name(&shortened) {
        return shortened;
    }
    // The `_` prefix costs one base character.
    format!("_{}", shorten_base(base, keep.saturating_sub(1).max(1), ext))
}

fn shorten_base(base: &str, keep: usize, ext: &str) -> String {
    let base: String = base.chars().take(keep).collect();
    let base = base.trim_end_matches([' ', '.']);
    let base = if base.is_empty() { "_" } else { base };
    format!("{base}{ext}")
}

fn trim_spaces_and_dots(s: &str) -> &str {
    s.trim_matches([' ', '.'])
}

/// Splits at the last dot, keeping the dot on the extension.
/// Names whose only dot is the first character have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn truncate_component(name: &str, max_bytes: usize, ext_cap: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (base, ext) = split_extension(name);
    let ext = truncate_bytes(ext, ext_cap);
    let base = truncate_bytes(base, max_bytes - ext.len());
    format!("{base}{ext}")
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn is_reserved_windows_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).trim_end_matches(' ');
    WINDOWS_RESERVED
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}

fn is_non_printable(c: char) -> bool {
    if c.is_control() || (c.is_whitespace() && c != ' ') {
        return true;
    }
    matches!(
        u32::from(c),
        0x00AD
            | 0x061C
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0xE000..=0xF8FF
            | 0xF_0000..=0xF_FFFD
            | 0x10_0000..=0x10_FFFD
    )
}
