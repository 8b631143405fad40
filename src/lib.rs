//! FlameCrafter turns raw stack-trace samples, as produced by Linux
//! [`perf script`] or similar stack profilers, into interactive [flame
//! graph] visualisations (SVG, or a self-contained HTML viewer).
//!
//! The pipeline memory-maps the capture, detects the input dialect,
//! parses it into zero-copy samples, folds identical call stacks into a
//! multiset, aggregates that into a flame tree, and renders the tree with
//! width proportional to inclusive sample counts. Large perf captures are
//! parsed and folded block-parallel on all cores; the result is identical
//! to the single-threaded path.
//!
//! # Command-line use
//!
//! ```console
//! $ perf record --call-graph dwarf target/release/mybin
//! $ perf script > stacks.perf
//! $ flamecrafter stacks.perf profile.svg
//! ```
//!
//! And then open `profile.svg` in your browser; frames can be zoomed,
//! searched, and hovered for exact counts.
//!
//! # Programmatic use
//!
//! ```no_run
//! use flamecrafter::flamegraph::Options;
//!
//! let mut opt = Options::default();
//! opt.title = "my service, 60s of cpu".to_string();
//! flamecrafter::generate("stacks.perf", "profile.svg", &opt)?;
//! # Ok::<(), flamecrafter::Error>(())
//! ```
//!
//!   [`perf script`]: https://perf.wiki.kernel.org/index.php/Main_Page
//!   [flame graph]: http://www.brendangregg.com/flamegraphs.html

/// Memory-mapped input buffers.
pub mod buffer;

/// Crate-wide error and result types.
pub mod error;

/// Flame-graph configuration and the SVG/HTML renderers.
pub mod flamegraph;

/// Folding identical call stacks into a counted multiset.
pub mod fold;

/// Stack-sample parsing for the perf-script and generic dialects.
pub mod parse;

/// The end-to-end pipeline entry point.
pub mod pipeline;

/// Line scanning over mapped buffers.
pub mod scan;

/// The flame tree: per-node inclusive/exclusive counts and heights.
pub mod tree;

pub use crate::error::Error;
pub use crate::pipeline::generate;
