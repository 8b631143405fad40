//! The profile-to-graph pipeline: validate, map, detect, parse, fold, build,
//! render. Every stage completes before the next begins; the mapped buffer
//! outlives them all because frames borrow from it end to end.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::buffer::InputBuffer;
use crate::error::{Error, Result};
use crate::flamegraph::{html, svg, Options};
use crate::fold::{self, FoldOptions};
use crate::parse::{self, parallel, Format};
use crate::tree::FlameTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Renderer {
    Svg,
    Html,
}

fn renderer_for(path: &Path) -> Result<Renderer> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => Ok(Renderer::Svg),
        Some("html") => Ok(Renderer::Html),
        other => Err(Error::SuffixUnknown(other.unwrap_or("").to_string())),
    }
}

fn sidecar_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.as_os_str().to_os_string();
    name.push(".collapse");
    PathBuf::from(name)
}

/// Run the whole pipeline from an input capture to a rendered graph.
pub fn generate<P, Q>(in_path: P, out_path: Q, opt: &Options) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (in_path, out_path) = (in_path.as_ref(), out_path.as_ref());

    opt.validate()?;
    let renderer = renderer_for(out_path)?;

    let buffer = InputBuffer::open(in_path)?;
    let data = buffer.as_str()?;
    let format = parse::detect(data);
    info!(
        "detected {} input in {} ({} bytes)",
        format.tag(),
        in_path.display(),
        buffer.len()
    );

    let parallelise = format == Format::PerfScript && parallel::should_parallelise(data);
    let mut samples = if parallelise {
        parallel::parse(data)?
    } else {
        parse::parser_for(format).parse(data)?
    };
    debug!("parsed {} samples", samples.len());

    if opt.reverse {
        for sample in &mut samples {
            sample.frames.reverse();
        }
    }

    let fold_opts = FoldOptions {
        max_depth: opt.max_depth,
        ..Default::default()
    };
    let folded = if parallelise {
        parallel::fold_samples(&samples, &fold_opts)
    } else {
        fold::fold(&samples, &fold_opts)
    };
    if folded.is_empty() {
        return Err(Error::PipelineEmpty("folding"));
    }
    debug!("folded into {} unique stacks", folded.len());

    if opt.write_folded_file {
        let sidecar = sidecar_path(out_path);
        let mut writer = BufWriter::new(File::create(&sidecar)?);
        folded.write(&mut writer)?;
        writer.flush()?;
        info!("wrote folded stacks to {}", sidecar.display());
    }

    let mut tree = FlameTree::from_folded(&folded);
    if tree.root().total_count == 0 {
        return Err(Error::PipelineEmpty("tree"));
    }
    if opt.min_heat_threshold > 0.0 {
        tree.prune(opt.min_heat_threshold);
    }
    let stats = tree.stats();
    debug!(
        "tree: {} nodes, {} leaves, depth {}, {} samples",
        stats.total_nodes, stats.leaf_nodes, stats.max_depth, stats.total_samples
    );

    match renderer {
        Renderer::Svg => {
            let mut writer = BufWriter::new(File::create(out_path)?);
            svg::render(&tree, opt, &mut writer)?;
            writer.flush()?;
        }
        Renderer::Html => html::render(&tree, out_path)?,
    }
    Ok(())
}
