use std::path::PathBuf;

use env_logger::Env;
use structopt::StructOpt;

use flamecrafter::flamegraph::{Options, Palette};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "flamecrafter",
    about = "Turn raw perf-script stack samples into an interactive flame graph"
)]
struct Opt {
    /// Heading for the graph
    #[structopt(long = "title", default_value = "Flame Graph")]
    title: String,

    /// Second line under the title
    #[structopt(long = "subtitle")]
    subtitle: Option<String>,

    /// Free text embedded as a comment in the SVG
    #[structopt(long = "notes", default_value = "")]
    notes: String,

    /// Image width in pixels
    #[structopt(long = "width", default_value = "1200")]
    width: usize,

    /// Height of each frame in pixels
    #[structopt(long = "height", default_value = "16")]
    frame_height: usize,

    /// Color scheme (hot, mem, io); unknown names fall back to hot
    #[structopt(long = "colors", default_value = "hot")]
    colors: Palette,

    /// Count unit shown in tooltips (samples, bytes, ...)
    #[structopt(long = "countname", default_value = "samples")]
    count_name: String,

    /// Name prefix shown in the details line
    #[structopt(long = "nametype", default_value = "Function:")]
    name_type: String,

    /// Reverse each stack before folding, growing the graph from the leaves
    #[structopt(long = "reverse")]
    reverse: bool,

    /// Icicle layout: root at the top, stacks growing downward
    #[structopt(long = "inverted")]
    inverted: bool,

    /// Omit frames narrower than this many pixels
    #[structopt(long = "minwidth", default_value = "0.1")]
    min_width: f64,

    /// Keep at most this many frames per stack; 0 keeps everything
    #[structopt(long = "maxdepth", default_value = "0")]
    max_depth: usize,

    /// Prune subtrees below this share of their parent; 0 disables
    #[structopt(long = "prune", default_value = "0")]
    min_heat_threshold: f64,

    /// Skip the embedded search/zoom script
    #[structopt(long = "static")]
    no_interactive: bool,

    /// Also write the folded stacks next to the output as <OUTFILE>.collapse
    #[structopt(long = "folded")]
    write_folded_file: bool,

    /// Silence all log output
    #[structopt(short = "q", long = "quiet")]
    quiet: bool,

    /// Verbose logging mode (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// Raw profile to read (perf-script output, or one frame per line)
    #[structopt(value_name = "INFILE")]
    infile: PathBuf,

    /// Where to write the graph; .svg and .html are understood
    #[structopt(value_name = "OUTFILE")]
    outfile: PathBuf,
}

impl Opt {
    fn into_parts(self) -> (PathBuf, PathBuf, Options) {
        let opt = Options {
            title: self.title,
            subtitle: self.subtitle,
            notes: self.notes,
            width: self.width,
            frame_height: self.frame_height,
            colors: self.colors,
            count_name: self.count_name,
            name_type: self.name_type,
            reverse: self.reverse,
            inverted: self.inverted,
            min_width: self.min_width,
            max_depth: self.max_depth,
            min_heat_threshold: self.min_heat_threshold,
            interactive: !self.no_interactive,
            write_folded_file: self.write_folded_file,
            ..Default::default()
        };
        (self.infile, self.outfile, opt)
    }
}

fn main() {
    let opt = Opt::from_args();

    if !opt.quiet {
        env_logger::Builder::from_env(Env::default().default_filter_or(match opt.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }))
        .format_timestamp(None)
        .init();
    }

    let (infile, outfile, options) = opt.into_parts();
    if let Err(e) = flamecrafter::generate(&infile, &outfile, &options) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
