//! Formatting attributes carried by text and element nodes

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Inline text formatting bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextFormat: u32 {
        const BOLD = 1;
        const ITALIC = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE = 1 << 3;
        const CODE = 1 << 4;
        const SUBSCRIPT = 1 << 5;
        const SUPERSCRIPT = 1 << 6;
    }
}

bitflags! {
    /// Text node detail bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextDetail: u32 {
        const DIRECTIONLESS = 1;
        const UNMERGEABLE = 1 << 1;
    }
}

impl TextFormat {
    /// Toggle one format, clearing the opposite script format when needed
    pub fn toggled(self, format: TextFormat) -> TextFormat {
        let mut next = self ^ format;
        if format.contains(TextFormat::SUBSCRIPT) && next.contains(TextFormat::SUBSCRIPT) {
            next.remove(TextFormat::SUPERSCRIPT);
        }
        if format.contains(TextFormat::SUPERSCRIPT) && next.contains(TextFormat::SUPERSCRIPT) {
            next.remove(TextFormat::SUBSCRIPT);
        }
        next
    }
}

/// How a text node behaves under editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Normal,
    /// Edited and deleted as a single unit
    Token,
    /// Deleted segment by segment
    Segmented,
}

impl TextMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextMode::Normal => "normal",
            TextMode::Token => "token",
            TextMode::Segmented => "segmented",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Block alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormat {
    #[default]
    #[serde(rename = "")]
    Unset,
    Left,
    Start,
    Center,
    Right,
    End,
    Justify,
}

impl ElementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementFormat::Unset => "",
            ElementFormat::Left => "left",
            ElementFormat::Start => "start",
            ElementFormat::Center => "center",
            ElementFormat::Right => "right",
            ElementFormat::End => "end",
            ElementFormat::Justify => "justify",
        }
    }
}
