//! The HTML renderer: a self-contained d3-flamegraph viewer document with
//! the tree embedded as JSON.
//!
//! The three asset blobs (d3, the d3-flamegraph plugin, and its stylesheet)
//! are shipped next to the binary and inlined verbatim at render time; their
//! contents are not this crate's concern.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Result;
use crate::tree::{FlameTree, NodeId, ROOT};

/// Directory the asset blobs are loaded from, relative to the working
/// directory, unless the caller redirects it.
pub const ASSETS_DIR: &str = "d3";

const D3_JS: &str = "d3.v7.min.js";
const D3_FLAMEGRAPH_JS: &str = "d3-flamegraph.js";
const D3_FLAMEGRAPH_CSS: &str = "d3-flamegraph.css";

struct JsonNode<'t, 'a> {
    tree: &'t FlameTree<'a>,
    id: NodeId,
}

struct JsonChildren<'t, 'a> {
    tree: &'t FlameTree<'a>,
    id: NodeId,
}

impl<'t, 'a> Serialize for JsonNode<'t, 'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let name = match node.frame {
            None => "root".to_string(),
            Some(frame) => frame.to_string(),
        };
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &name)?;
        map.serialize_entry("value", &node.total_count)?;
        if !node.is_leaf() {
            map.serialize_entry(
                "children",
                &JsonChildren {
                    tree: self.tree,
                    id: self.id,
                },
            )?;
        }
        map.end()
    }
}

impl<'t, 'a> Serialize for JsonChildren<'t, 'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(
            self.tree
                .children_in_frame_order(self.id)
                .into_iter()
                .map(|child| JsonNode {
                    tree: self.tree,
                    id: child,
                }),
        )
    }
}

/// The `{"name", "value", "children": [...]}` form the d3 plugin consumes.
pub fn tree_json(tree: &FlameTree) -> String {
    serde_json::to_string(&JsonNode { tree, id: ROOT })
        .expect("serialising the tree to a string shouldn't fail")
}

pub fn render<P: AsRef<Path>>(tree: &FlameTree, out_path: P) -> Result<()> {
    render_with_assets(tree, out_path, Path::new(ASSETS_DIR))
}

pub fn render_with_assets<P: AsRef<Path>>(
    tree: &FlameTree,
    out_path: P,
    assets_dir: &Path,
) -> Result<()> {
    let d3_css = fs::read_to_string(assets_dir.join(D3_FLAMEGRAPH_CSS))?;
    let d3_js = fs::read_to_string(assets_dir.join(D3_JS))?;
    let flamegraph_js = fs::read_to_string(assets_dir.join(D3_FLAMEGRAPH_JS))?;

    let mut out = std::io::BufWriter::new(fs::File::create(out_path.as_ref())?);
    write!(
        out,
        r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Flamegraph Viewer</title>
  <style>
{d3_css}
  </style>
</head>
<body>
  <h1>Flamegraph</h1>
  <div id="chart"></div>

  <script>
{d3_js}
  </script>
  <script>
{flamegraph_js}
  </script>
  <script>
    const rawData = {data};

    const flameGraph = flamegraph()
      .width(1200)
      .cellHeight(18)
      .transitionDuration(750)
      .minFrameSize(5)
      .selfValue(true)
      .tooltip(true)
      .title("");

    d3.select("#chart")
      .datum(rawData)
      .call(flameGraph);
  </script>
</body>
</html>"##,
        d3_css = d3_css,
        d3_js = d3_js,
        flamegraph_js = flamegraph_js,
        data = tree_json(tree),
    )?;
    out.flush()?;
    Ok(())
}
