//! Editor surfaces: the document model behind the input and output panes.
//!
//! The playground never talks to a concrete widget. It creates surfaces
//! through an [`EditorFactory`] and reads or replaces their text through
//! [`EditorSurface`]. [`TextDocument`] is the in-memory implementation used
//! by headless hosts and tests.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};

/// Highlighting language of a pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Rust syntax.
    #[default]
    Rust,
    /// No highlighting.
    Plain,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rust" => Ok(Self::Rust),
            "plain" => Ok(Self::Plain),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rust => f.write_str("rust"),
            Self::Plain => f.write_str("plain"),
        }
    }
}

/// Behaviour options a surface is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorOptions {
    /// Whether user edits are accepted.
    pub editable: bool,
    /// Highlighting language.
    pub language: Language,
    /// Whether Tab indents instead of moving focus.
    pub indent_with_tab: bool,
}

impl EditorOptions {
    /// Options of the editable input pane.
    #[must_use]
    pub fn input(language: Language, indent_with_tab: bool) -> Self {
        Self {
            editable: true,
            language,
            indent_with_tab,
        }
    }

    /// Options of the read-only output pane.
    #[must_use]
    pub fn output(language: Language) -> Self {
        Self {
            editable: false,
            language,
            indent_with_tab: false,
        }
    }
}

/// A text document bound to a mount point.
///
/// `replace` and `replace_all` are programmatic writes and succeed regardless
/// of [`EditorOptions::editable`]. User input goes through
/// [`EditorSurface::apply_user_edit`], which a read-only surface rejects.
pub trait EditorSurface: Send {
    /// Mount point the surface was created on.
    fn mount(&self) -> &str;

    /// Full document text.
    fn text(&self) -> String;

    /// Replace `range` (byte offsets) with `text`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidRange`] if the range is out of bounds or
    /// splits a character.
    fn replace(&mut self, range: Range<usize>, text: &str) -> EditorResult<()>;

    /// Counter increased by every change to the document.
    fn revision(&self) -> u64;

    /// Options the surface was created with.
    fn options(&self) -> &EditorOptions;

    /// Replace the whole document.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`EditorSurface::replace`].
    fn replace_all(&mut self, text: &str) -> EditorResult<()> {
        let len = self.text().len();
        self.replace(0..len, text)
    }

    /// Apply an edit typed by the user.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::ReadOnly`] on a non-editable surface, or the
    /// error of [`EditorSurface::replace`].
    fn apply_user_edit(&mut self, range: Range<usize>, text: &str) -> EditorResult<()> {
        if !self.options().editable {
            return Err(EditorError::ReadOnly {
                mount: self.mount().to_owned(),
            });
        }
        self.replace(range, text)
    }
}

/// Creates editor surfaces.
pub trait EditorFactory: Send + Sync {
    /// Create a surface on `mount` holding `initial`.
    fn create(&self, mount: &str, initial: &str, options: EditorOptions)
    -> Box<dyn EditorSurface>;
}

/// In-memory document.
#[derive(Debug, Clone)]
pub struct TextDocument {
    mount: String,
    text: String,
    revision: u64,
    options: EditorOptions,
}

impl TextDocument {
    /// Create a document holding `initial`.
    #[must_use]
    pub fn new(mount: impl Into<String>, initial: impl Into<String>, options: EditorOptions) -> Self {
        Self {
            mount: mount.into(),
            text: initial.into(),
            revision: 0,
            options,
        }
    }

    /// Borrow the document text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl EditorSurface for TextDocument {
    fn mount(&self) -> &str {
        &self.mount
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn replace(&mut self, range: Range<usize>, text: &str) -> EditorResult<()> {
        let len = self.text.len();
        if range.start > range.end
            || range.end > len
            || !self.text.is_char_boundary(range.start)
            || !self.text.is_char_boundary(range.end)
        {
            return Err(EditorError::InvalidRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
        if self.text.get(range.clone()) == Some(text) {
            return Ok(());
        }
        self.text.replace_range(range, text);
        self.revision = self.revision.saturating_add(1);
        Ok(())
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn options(&self) -> &EditorOptions {
        &self.options
    }
}

/// Factory producing [`TextDocument`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDocumentFactory;

impl EditorFactory for TextDocumentFactory {
    fn create(
        &self,
        mount: &str,
        initial: &str,
        options: EditorOptions,
    ) -> Box<dyn EditorSurface> {
        Box::new(TextDocument::new(mount, initial, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str) -> TextDocument {
        TextDocument::new("input", text, EditorOptions::input(Language::Rust, true))
    }

    #[test]
    fn replace_splices_and_bumps_revision() {
        let mut doc = input("foo!()");
        doc.replace(5..5, "x").unwrap();
        assert_eq!(doc.as_str(), "foo!(x)");
        assert_eq!(doc.revision(), 1);
    }

    #[test]
    fn identical_replacement_keeps_revision() {
        let mut doc = input("struct A;");
        doc.replace_all("struct A;").unwrap();
        assert_eq!(doc.revision(), 0);
    }

    #[test]
    fn out_of_bounds_range_is_rejected() {
        let mut doc = input("abc");
        assert_eq!(
            doc.replace(2..9, "z"),
            Err(EditorError::InvalidRange {
                start: 2,
                end: 9,
                len: 3
            })
        );
        assert_eq!(doc.as_str(), "abc");
    }

    #[test]
    fn range_inside_a_character_is_rejected() {
        let mut doc = input("é");
        assert!(matches!(
            doc.replace(1..2, ""),
            Err(EditorError::InvalidRange { .. })
        ));
    }

    #[test]
    fn read_only_surface_rejects_user_edits() {
        let mut doc = TextDocument::new("output", "// out", EditorOptions::output(Language::Rust));
        let err = doc.apply_user_edit(0..0, "x").unwrap_err();
        assert_eq!(
            err,
            EditorError::ReadOnly {
                mount: "output".into()
            }
        );
        doc.replace_all("generated").unwrap();
        assert_eq!(doc.as_str(), "generated");
    }

    #[test]
    fn factory_applies_options() {
        let surface =
            TextDocumentFactory.create("input", "", EditorOptions::input(Language::Plain, false));
        assert!(surface.options().editable);
        assert_eq!(surface.options().language, Language::Plain);
        assert_eq!(surface.mount(), "input");
    }

    #[test]
    fn language_parses_config_names() {
        assert_eq!("rust".parse::<Language>().unwrap(), Language::Rust);
        assert!("cobol".parse::<Language>().is_err());
    }
}
