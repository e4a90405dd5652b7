//! Backend-aware text markup.
//!
//! TeamSpeak renders BBCode, Discord renders Markdown. Scripts build chat
//! messages through [`Format`] and get the right syntax for the instance they
//! run on.

use crate::foundation::model::BackendKind;

/// Markup helper bound to one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    backend: BackendKind,
}

impl Format {
    pub fn new(backend: BackendKind) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Colours `text` with a `#rgb` or `#rrggbb` value.
    ///
    /// Backends without colour support, and invalid colours, leave the text
    /// unchanged.
    pub fn color(&self, text: &str, color: &str) -> String {
        match self.backend {
            BackendKind::Ts3 if is_hex_color(color) => {
                format!("[color={color}]{text}[/color]")
            }
            _ => text.to_string(),
        }
    }

    pub fn italic(&self, text: &str) -> String {
        match self.backend {
            BackendKind::Ts3 => format!("[i]{text}[/i]"),
            BackendKind::Discord => format!("*{text}*"),
        }
    }

    pub fn bold(&self, text: &str) -> String {
        match self.backend {
            BackendKind::Ts3 => format!("[b]{text}[/b]"),
            BackendKind::Discord => format!("**{text}**"),
        }
    }

    pub fn underline(&self, text: &str) -> String {
        match self.backend {
            BackendKind::Ts3 => format!("[u]{text}[/u]"),
            BackendKind::Discord => format!("__{text}__"),
        }
    }

    /// Formats `text` as code. Multi-line text becomes a block on Discord.
    pub fn code(&self, text: &str) -> String {
        match self.backend {
            BackendKind::Ts3 => format!("[code]{text}[/code]"),
            BackendKind::Discord if text.contains('\n') => format!("```\n{text}\n```"),
            BackendKind::Discord => format!("`{text}`"),
        }
    }
}

fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts3_bbcode() {
        let f = Format::new(BackendKind::Ts3);
        assert_eq!(f.color("hi", "#aa0000"), "[color=#aa0000]hi[/color]");
        assert_eq!(f.color("hi", "#f00"), "[color=#f00]hi[/color]");
        assert_eq!(f.bold("x"), "[b]x[/b]");
        assert_eq!(f.italic("x"), "[i]x[/i]");
        assert_eq!(f.underline("x"), "[u]x[/u]");
        assert_eq!(f.code("x"), "[code]x[/code]");
    }

    #[test]
    fn test_discord_markdown() {
        let f = Format::new(BackendKind::Discord);
        assert_eq!(f.color("hi", "#aa0000"), "hi");
        assert_eq!(f.bold("x"), "**x**");
        assert_eq!(f.italic("x"), "*x*");
        assert_eq!(f.underline("x"), "__x__");
        assert_eq!(f.code("x"), "`x`");
        assert_eq!(f.code("a\nb"), "```\na\nb\n```");
    }

    #[test]
    fn test_invalid_color_is_ignored() {
        let f = Format::new(BackendKind::Ts3);
        assert_eq!(f.color("hi", "red"), "hi");
        assert_eq!(f.color("hi", "#12345"), "hi");
        assert_eq!(f.color("hi", "#gg0000"), "hi");
    }
}
