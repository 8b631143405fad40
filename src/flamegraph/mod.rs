//! Rendering folded stacks as flame graphs.

pub mod color;
pub mod html;
pub mod svg;

pub use color::Palette;

use crate::error::{Error, Result};

/// Everything the renderers can be told about.
///
/// `Default` gives the classic flame-graph look: 1200px wide, 16px frames,
/// Verdana 12, the `hot` palette on a pale yellow gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Heading centered at the top of the image.
    pub title: String,
    /// Smaller heading under the title.
    pub subtitle: Option<String>,
    /// Free text embedded as an XML comment.
    pub notes: String,

    /// Image width in pixels.
    pub width: usize,
    /// Height of one frame row in pixels.
    pub frame_height: usize,
    /// Left and right padding in pixels.
    pub xpad: usize,

    pub font_type: String,
    pub font_size: usize,
    /// Average character width relative to `font_size`.
    pub font_width: f64,

    /// Colour scheme tag; unknown tags fall back to `hot`.
    pub colors: Palette,
    /// Background gradient start.
    pub bgcolor1: String,
    /// Background gradient end.
    pub bgcolor2: String,
    /// Highlight colour for search matches.
    pub search_color: String,

    /// Label prefix shown in `#details` ("Function:", "Method:", ...).
    pub name_type: String,
    /// Unit shown in tooltips ("samples", "bytes", ...).
    pub count_name: String,

    /// Reverse every stack before folding, so graphs grow from the leaves.
    pub reverse: bool,
    /// Icicle layout: root at the top, children growing downward.
    pub inverted: bool,

    /// Frames narrower than this many pixels are not emitted (their slot
    /// width still is, so neighbours stay put).
    pub min_width: f64,
    /// Truncate stacks to this many frames at folding time; 0 = unlimited.
    pub max_depth: usize,
    /// Prune subtrees whose share of their parent falls below this ratio;
    /// 0 = off.
    pub min_heat_threshold: f64,

    /// Embed the interactive search/zoom script.
    pub interactive: bool,
    /// Also write the folded form next to the output as `<out>.collapse`.
    pub write_folded_file: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            title: "Flame Graph".to_string(),
            subtitle: None,
            notes: String::new(),
            width: 1200,
            frame_height: 16,
            xpad: 10,
            font_type: "Verdana".to_string(),
            font_size: 12,
            font_width: 0.6,
            colors: Palette::default(),
            bgcolor1: "#eeeeee".to_string(),
            bgcolor2: "#eeeeb0".to_string(),
            search_color: "rgb(230,0,230)".to_string(),
            name_type: "Function:".to_string(),
            count_name: "samples".to_string(),
            reverse: false,
            inverted: false,
            min_width: 0.1,
            max_depth: 0,
            min_heat_threshold: 0.0,
            interactive: true,
            write_folded_file: false,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(Error::Config("width must be positive".into()));
        }
        if self.frame_height == 0 {
            return Err(Error::Config("frame height must be positive".into()));
        }
        if self.font_size == 0 {
            return Err(Error::Config("font size must be positive".into()));
        }
        if !(self.font_width > 0.0 && self.font_width <= 1.0) {
            return Err(Error::Config("font width must be in (0, 1]".into()));
        }
        if !(self.min_width >= 0.0) {
            return Err(Error::Config("min width cannot be negative".into()));
        }
        if !(self.min_heat_threshold >= 0.0 && self.min_heat_threshold < 1.0) {
            return Err(Error::Config("heat threshold must be in [0, 1)".into()));
        }
        Ok(())
    }

    /// Top padding: room for the title.
    pub(crate) fn ypad1(&self) -> usize {
        self.font_size * 3
    }

    /// Bottom padding: room for the detail and match labels.
    pub(crate) fn ypad2(&self) -> usize {
        self.font_size * 2 + 10
    }

    pub(crate) fn ypad_subtitle(&self) -> usize {
        if self.subtitle.is_some() {
            self.font_size * 2
        } else {
            0
        }
    }

    /// Canvas height for a tree `depth` frame levels deep: one row for the
    /// root plus one per level, between the pads.
    pub(crate) fn image_height(&self, depth: usize) -> usize {
        (depth + 1) * self.frame_height + self.ypad1() + self.ypad2() + self.ypad_subtitle()
    }
}
