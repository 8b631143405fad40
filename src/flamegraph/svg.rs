//! Geometric layout and SVG emission.
//!
//! Layout maps the tree onto the canvas with width proportional to each
//! node's inclusive count; emission streams the shell (gradient, style,
//! script, controls) and one `<g><title/><rect/><text/></g>` group per
//! placed frame through a `quick_xml` event writer.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::Write;
use std::iter;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use str_stack::StrStack;

use super::color;
use super::Options;
use crate::error::Result;
use crate::tree::{FlameTree, NodeId, ROOT};

/// The generic font families should not have quotes around them in the CSS.
const GENERIC_FONT_FAMILIES: &[&str] = &["cursive", "fantasy", "monospace", "serif", "sans-serif"];

/// One placed frame: where a node's rectangle goes on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRect {
    pub node: NodeId,
    /// 0 at the root, +1 per level.
    pub depth: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

/// Compute every emitted rectangle.
///
/// Children are laid out left-to-right in frame order, each receiving
/// `total_count * pixels_per_sample` of width. A child narrower than
/// `min_width` is omitted together with its subtree, but its slot width is
/// still consumed so horizontal neighbours stay correctly placed. In flame
/// orientation the root sits near the bottom and children stack upward; in
/// icicle orientation the root sits below the top pad and children descend.
pub fn layout(tree: &FlameTree, opt: &Options) -> Vec<FrameRect> {
    let depth = tree.depth();
    let imageheight = opt.image_height(depth);
    let frame_height = opt.frame_height as f64;
    let total = tree.root().total_count as f64;
    let width_per_sample = (opt.width as f64 - 2.0 * opt.xpad as f64) / total;

    let root_y = if opt.inverted {
        (opt.ypad1() + opt.ypad_subtitle()) as f64
    } else {
        (imageheight - opt.ypad2() - opt.frame_height) as f64
    };

    let mut rects = vec![FrameRect {
        node: ROOT,
        depth: 0,
        x: opt.xpad as f64,
        y: root_y,
        width: opt.width as f64 - 2.0 * opt.xpad as f64,
    }];

    let mut stack = vec![(ROOT, opt.xpad as f64, root_y, 1usize)];
    while let Some((id, x, parent_y, depth)) = stack.pop() {
        let child_y = if opt.inverted {
            parent_y + frame_height
        } else {
            parent_y - frame_height
        };
        let mut child_x = x;
        for child in tree.children_in_frame_order(id) {
            let child_width = tree.node(child).total_count as f64 * width_per_sample;
            if child_width >= opt.min_width {
                rects.push(FrameRect {
                    node: child,
                    depth,
                    x: child_x,
                    y: child_y,
                    width: child_width,
                });
                if !tree.node(child).is_leaf() {
                    stack.push((child, child_x, child_y, depth + 1));
                }
            }
            child_x += child_width;
        }
    }
    rects
}

pub fn render<W: Write>(tree: &FlameTree, opt: &Options, writer: W) -> Result<()> {
    let depth = tree.depth();
    let imageheight = opt.image_height(depth);
    let mut svg = Writer::new(writer);

    write_header(&mut svg, imageheight, opt)?;
    write_prelude(&mut svg, imageheight, opt)?;

    svg.write_event(Event::Start(
        BytesStart::borrowed_name(b"g").with_attributes(iter::once(("id", "frames"))),
    ))?;

    let total = tree.root().total_count;
    let mut buffer = StrStack::new();
    for rect in layout(tree, opt) {
        write_frame(&mut svg, &mut buffer, tree, opt, &rect, total, depth)?;
        buffer.clear();
    }

    svg.write_event(Event::End(BytesEnd::borrowed(b"g")))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"svg")))?;
    svg.write_event(Event::Eof)?;
    Ok(())
}

fn write_header<W: Write>(svg: &mut Writer<W>, imageheight: usize, opt: &Options) -> Result<()> {
    svg.write(br#"<?xml version="1.0" standalone="no"?>"#)?;
    svg.write(br#"<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">"#)?;
    svg.write_event(Event::Start(
        BytesStart::borrowed_name(b"svg").with_attributes(vec![
            ("version", "1.1"),
            ("width", &*format!("{}", opt.width)),
            ("height", &*format!("{}", imageheight)),
            ("onload", "init(evt)"),
            ("viewBox", &*format!("0 0 {} {}", opt.width, imageheight)),
            ("xmlns", "http://www.w3.org/2000/svg"),
            ("xmlns:xlink", "http://www.w3.org/1999/xlink"),
            ("xmlns:fg", "http://github.com/flamecrafter/flamecrafter"),
        ]),
    ))?;
    svg.write_event(Event::Comment(BytesText::from_plain_str(
        "Flame graph stack visualization. \
         See https://github.com/brendangregg/FlameGraph for latest version, \
         and http://www.brendangregg.com/flamegraphs.html for examples.",
    )))?;
    svg.write_event(Event::Comment(BytesText::from_plain_str(
        format!("NOTES: {}", opt.notes).as_str(),
    )))?;
    Ok(())
}

fn write_prelude<W: Write>(svg: &mut Writer<W>, imageheight: usize, opt: &Options) -> Result<()> {
    svg.write_event(Event::Start(BytesStart::borrowed_name(b"defs")))?;
    svg.write_event(Event::Start(BytesStart::borrowed(
        br#"linearGradient id="background" y1="0" y2="1" x1="0" x2="0""#,
        "linearGradient".len(),
    )))?;
    svg.write_event(Event::Empty(BytesStart::borrowed_name(b"stop").with_attributes(
        iter::once(("stop-color", opt.bgcolor1.as_str())).chain(iter::once(("offset", "5%"))),
    )))?;
    svg.write_event(Event::Empty(BytesStart::borrowed_name(b"stop").with_attributes(
        iter::once(("stop-color", opt.bgcolor2.as_str())).chain(iter::once(("offset", "95%"))),
    )))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"linearGradient")))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"defs")))?;

    svg.write_event(Event::Start(
        BytesStart::borrowed_name(b"style").with_attributes(iter::once(("type", "text/css"))),
    ))?;
    let font_type: Cow<str> = if GENERIC_FONT_FAMILIES.contains(&opt.font_type.as_str()) {
        Cow::Borrowed(&opt.font_type)
    } else {
        Cow::Owned(enquote('\"', &opt.font_type))
    };
    svg.write_event(Event::Text(BytesText::from_escaped_str(&format!(
        "
text {{ font-family:{}; font-size:{}px; fill:rgb(0,0,0); }}
#title {{ text-anchor:middle; font-size:{}px; }}
#subtitle {{ text-anchor:middle; fill:rgb(160,160,160); }}
",
        font_type,
        opt.font_size,
        opt.font_size + 5,
    ))))?;
    svg.write_event(Event::Text(BytesText::from_escaped_str(include_str!(
        "flamegraph.css"
    ))))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"style")))?;

    svg.write_event(Event::Start(
        BytesStart::borrowed_name(b"script")
            .with_attributes(iter::once(("type", "text/ecmascript"))),
    ))?;
    svg.write_event(Event::CData(BytesText::from_escaped_str(format!(
        "
var fontsize = {};
var fontwidth = {:.2};
var xpad = {};
var inverted = {};
var searchcolor = '{}';
var nametype = {};
",
        opt.font_size,
        opt.font_width,
        opt.xpad,
        opt.inverted,
        opt.search_color,
        enquote('\'', &opt.name_type),
    ))))?;
    if opt.interactive {
        svg.write_event(Event::CData(BytesText::from_escaped_str(include_str!(
            "flamegraph.js"
        ))))?;
    }
    svg.write_event(Event::End(BytesEnd::borrowed(b"script")))?;

    svg.write_event(Event::Empty(
        BytesStart::borrowed_name(b"rect").with_attributes(vec![
            ("x", "0"),
            ("y", "0"),
            ("width", &*format!("{}", opt.width)),
            ("height", &*format!("{}", imageheight)),
            ("fill", "url(#background)"),
        ]),
    ))?;

    let mut buf = StrStack::new();
    let center = (opt.width / 2) as f64;
    let corner = (opt.width - opt.xpad) as f64;
    let label_y = (imageheight - opt.ypad2() / 2) as f64;

    write_text(svg, &mut buf, center, (opt.font_size * 2) as f64, &opt.title, vec![("id", "title")])?;
    if let Some(ref subtitle) = opt.subtitle {
        write_text(svg, &mut buf, center, (opt.font_size * 4) as f64, subtitle, vec![("id", "subtitle")])?;
    }
    write_text(svg, &mut buf, opt.xpad as f64, label_y, " ", vec![("id", "details")])?;
    write_text(
        svg,
        &mut buf,
        opt.xpad as f64,
        (opt.font_size * 2) as f64,
        "Reset Zoom",
        vec![("id", "unzoom"), ("class", "hide")],
    )?;
    write_text(svg, &mut buf, corner - 100.0, (opt.font_size * 2) as f64, "Search", vec![("id", "search")])?;
    write_text(svg, &mut buf, corner - 16.0, (opt.font_size * 2) as f64, "ic", vec![("id", "ignorecase")])?;
    write_text(svg, &mut buf, corner - 100.0, label_y, " ", vec![("id", "matched")])?;

    Ok(())
}

fn write_text<W: Write>(
    svg: &mut Writer<W>,
    buf: &mut StrStack,
    x: f64,
    y: f64,
    text: &str,
    extra: Vec<(&str, &str)>,
) -> Result<()> {
    let xi = write!(buf, "{:.2}", x);
    let yi = write!(buf, "{:.2}", y);
    let mut start = BytesStart::borrowed_name(b"text");
    start.extend_attributes(extra);
    start.extend_attributes(vec![("x", &buf[xi]), ("y", &buf[yi])]);
    svg.write_event(Event::Start(start))?;
    svg.write_event(Event::Text(BytesText::from_plain_str(text)))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"text")))?;
    Ok(())
}

fn write_frame<W: Write>(
    svg: &mut Writer<W>,
    buffer: &mut StrStack,
    tree: &FlameTree,
    opt: &Options,
    rect: &FrameRect,
    total: usize,
    tree_depth: usize,
) -> Result<()> {
    let node = tree.node(rect.node);

    // tooltip: "name (count unit, pct.xx%)"
    let info = {
        let mut w = buffer.writer();
        match node.frame {
            None => w.write_str("root"),
            Some(frame) => write!(w, "{}", frame),
        }
        .expect("writing to buffer shouldn't fail");
        let unit = if opt.count_name.is_empty() {
            "samples"
        } else {
            &opt.count_name
        };
        write!(w, " ({} {}", node.total_count, unit).expect("writing to buffer shouldn't fail");
        if total > 0 {
            let pct = node.total_count as f64 * 100.0 / total as f64;
            write!(w, ", {:.2}%)", pct).expect("writing to buffer shouldn't fail");
        } else {
            w.write_str(")").expect("writing to buffer shouldn't fail");
        }
        w.finish()
    };

    let fill: Cow<str> = match node.frame {
        None => Cow::from(color::ROOT_COLOR),
        Some(frame) if frame.name == "--" || frame.name == "-" => {
            Cow::from(color::SEPARATOR_COLOR)
        }
        Some(frame) => {
            let heat = if tree_depth > 0 {
                rect.depth as f64 / tree_depth as f64
            } else {
                0.0
            };
            Cow::from(opt.colors.color(frame.name, heat))
        }
    };

    svg.write_event(Event::Start(BytesStart::borrowed_name(b"g")))?;

    svg.write_event(Event::Start(BytesStart::borrowed_name(b"title")))?;
    svg.write_event(Event::Text(BytesText::from_plain_str(&buffer[info])))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"title")))?;

    let x = write!(buffer, "{:.1}", rect.x);
    let y = write!(buffer, "{:.0}", rect.y);
    let width = write!(buffer, "{:.1}", rect.width);
    let height = write!(buffer, "{}", opt.frame_height - 1);
    svg.write_event(Event::Empty(
        BytesStart::borrowed_name(b"rect").with_attributes(vec![
            ("x", &buffer[x]),
            ("y", &buffer[y]),
            ("width", &buffer[width]),
            ("height", &buffer[height]),
            ("fill", &*fill),
            ("rx", "2"),
            ("ry", "2"),
        ]),
    ))?;

    // left empty on purpose; the embedded script fills in truncated labels
    // from the tooltip at load time
    let tx = write!(buffer, "{:.2}", rect.x + 3.0);
    let ty = write!(buffer, "{:.1}", rect.y + opt.frame_height as f64 - 5.0);
    svg.write_event(Event::Start(
        BytesStart::borrowed_name(b"text")
            .with_attributes(vec![("x", &buffer[tx]), ("y", &buffer[ty])]),
    ))?;
    svg.write_event(Event::End(BytesEnd::borrowed(b"text")))?;

    svg.write_event(Event::End(BytesEnd::borrowed(b"g")))?;
    Ok(())
}

// Imported from the `enquote` crate @ 1.0.3.
// It's "unlicense" licensed, so that's fine.
fn enquote(quote: char, s: &str) -> String {
    let escaped = s
        .chars()
        .map(|c| match c {
            _ if c == quote => format!("\\{}", quote),
            '\\' => "\\\\".into(),
            _ => c.to_string(),
        })
        .collect::<String>();
    quote.to_string() + &escaped + &quote.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::{fold, FoldOptions};
    use crate::parse::{Frame, Sample};
    use crate::tree::FlameTree;

    fn tree_of<'a>(stacks: &[&[&'a str]]) -> (Vec<Sample<'a>>, Options) {
        let samples = stacks
            .iter()
            .map(|names| {
                let mut s = Sample::new();
                s.frames = names.iter().map(|n| Frame::function(n)).collect();
                s
            })
            .collect();
        (samples, Options::default())
    }

    fn rect_for<'a>(rects: &'a [FrameRect], tree: &FlameTree, name: &str) -> &'a FrameRect {
        rects
            .iter()
            .find(|r| tree.node(r.node).frame.map(|f| f.name) == Some(name))
            .unwrap()
    }

    #[test]
    fn flame_orientation_stacks_upward_from_the_bottom() {
        let (samples, opt) = tree_of(&[&["a", "b"]]);
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);
        let rects = layout(&tree, &opt);

        let imageheight = opt.image_height(2);
        let root = &rects[0];
        assert_eq!(root.y, (imageheight - opt.ypad2() - opt.frame_height) as f64);
        let a = rect_for(&rects, &tree, "a");
        assert_eq!(a.y, root.y - opt.frame_height as f64);
        let b = rect_for(&rects, &tree, "b");
        assert_eq!(b.y, a.y - opt.frame_height as f64);
    }

    #[test]
    fn icicle_orientation_descends_from_the_top_pad() {
        let (samples, mut opt) = tree_of(&[&["a", "b"]]);
        opt.inverted = true;
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);
        let rects = layout(&tree, &opt);

        let root = &rects[0];
        assert_eq!(root.y, opt.ypad1() as f64);
        let a = rect_for(&rects, &tree, "a");
        assert_eq!(a.y, root.y + opt.frame_height as f64);

        opt.subtitle = Some("with subtitle".to_string());
        let rects = layout(&tree, &opt);
        assert_eq!(rects[0].y, (opt.ypad1() + opt.ypad_subtitle()) as f64);
    }

    #[test]
    fn widths_are_proportional_to_inclusive_counts() {
        let (samples, opt) = tree_of(&[&["a", "b"], &["a", "b"], &["a", "c"], &["d"]]);
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);
        let rects = layout(&tree, &opt);

        let per_sample = (opt.width as f64 - 2.0 * opt.xpad as f64) / 4.0;
        let a = rect_for(&rects, &tree, "a");
        assert!((a.width - 3.0 * per_sample).abs() < 1e-9);
        let d = rect_for(&rects, &tree, "d");
        assert!((d.width - per_sample).abs() < 1e-9);
        // siblings are adjacent: a's slot ends where d's begins
        assert!((a.x + a.width - d.x).abs() < 1e-9);
    }

    #[test]
    fn narrow_frames_are_omitted_but_keep_their_slot() {
        let mut stacks: Vec<&[&str]> = vec![&["wide"]; 20_000];
        stacks.push(&["sliver", "child"]);
        stacks.push(&["z_wide"]);
        let (samples, opt) = tree_of(&stacks);
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);
        let rects = layout(&tree, &opt);

        // 1 sample over 20002 at 1180px is far below the 0.1px default
        assert!(rects
            .iter()
            .all(|r| tree.node(r.node).frame.map(|f| f.name) != Some("sliver")));
        assert!(rects
            .iter()
            .all(|r| tree.node(r.node).frame.map(|f| f.name) != Some("child")));

        // the omitted sliver sits first in frame order, so its slot shifts
        // both visible siblings to the right
        let per_sample = (opt.width as f64 - 2.0 * opt.xpad as f64) / 20_002.0;
        let wide = rect_for(&rects, &tree, "wide");
        let z = rect_for(&rects, &tree, "z_wide");
        assert!((wide.x - (opt.xpad as f64 + per_sample)).abs() < 1e-9);
        assert!((z.x - (wide.x + wide.width)).abs() < 1e-9);
    }

    #[test]
    fn min_width_zero_emits_every_node() {
        let mut stacks: Vec<&[&str]> = vec![&["wide"]; 5000];
        stacks.push(&["sliver", "child"]);
        let (samples, mut opt) = tree_of(&stacks);
        opt.min_width = 0.0;
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);
        let rects = layout(&tree, &opt);
        assert_eq!(rects.len(), 4); // root, wide, sliver, child
    }

    #[test]
    fn svg_escapes_frame_names_in_tooltips() {
        let (samples, opt) = tree_of(&[&["operator<&>\"fun\"'s"]]);
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);

        let mut out = Vec::new();
        render(&tree, &opt, &mut out).unwrap();
        let svg = String::from_utf8(out).unwrap();

        let start = svg.find("<title>operator").unwrap() + "<title>".len();
        let end = start + svg[start..].find("</title>").unwrap();
        let escaped = &svg[start..end];
        assert!(escaped.starts_with("operator&lt;&amp;&gt;&quot;fun&quot;&apos;s"));

        // unescaping recovers the original name exactly
        let unescaped = escaped
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&");
        assert!(unescaped.starts_with("operator<&>\"fun\"'s ("));
    }

    #[test]
    fn shell_declares_script_globals_and_controls() {
        let (samples, mut opt) = tree_of(&[&["main", "worker", "compute"]]);
        opt.subtitle = Some("one run".to_string());
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);

        let mut out = Vec::new();
        render(&tree, &opt, &mut out).unwrap();
        let svg = String::from_utf8(out).unwrap();

        for global in &[
            "var fontsize = 12;",
            "var fontwidth = 0.60;",
            "var xpad = 10;",
            "var inverted = false;",
            "var searchcolor = 'rgb(230,0,230)';",
            "var nametype = 'Function:';",
        ] {
            assert!(svg.contains(global), "missing {:?}", global);
        }
        for id in &[
            "id=\"background\"",
            "id=\"frames\"",
            "id=\"title\"",
            "id=\"subtitle\"",
            "id=\"details\"",
            "id=\"unzoom\"",
            "id=\"search\"",
            "id=\"ignorecase\"",
            "id=\"matched\"",
        ] {
            assert!(svg.contains(id), "missing {:?}", id);
        }
        // root + 3 frames
        assert_eq!(svg.matches("<title>").count(), 4);
        assert!(svg.contains("<title>root (1 samples, 100.00%)</title>"));
    }

    #[test]
    fn non_interactive_output_skips_the_script_body() {
        let (samples, mut opt) = tree_of(&[&["main"]]);
        opt.interactive = false;
        let folded = fold(&samples, &FoldOptions::default());
        let tree = FlameTree::from_folded(&folded);

        let mut out = Vec::new();
        render(&tree, &opt, &mut out).unwrap();
        let svg = String::from_utf8(out).unwrap();
        assert!(svg.contains("var fontsize"));
        assert!(!svg.contains("function init("));
    }
}
