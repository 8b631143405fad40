//! Block-parallel parsing and folding for large perf-script captures.
//!
//! The indexed scanner partitions the line range into contiguous blocks.
//! Every block start (except the first) is first advanced to a safe sample
//! boundary, a blank line or a header line; headers and blank lines
//! unambiguously delimit samples, so after adjustment each worker owns whole
//! samples and the merged result equals the single-threaded one. Workers are
//! a static fork-join: spawned, run to completion over their line range with
//! no blocking or cross-talk, joined.
//!
//! Folding shares one concurrent multiset whose accessor locks per bucket;
//! increments either add under that lock or insert on first occurrence.
//! Aggregation is commutative, so worker ordering never shows in the counts.

use chashmap::CHashMap;
use lazy_static::lazy_static;
use log::debug;

use super::perf::{PerfParser, PerfState};
use super::{Sample, Samples, StackParser};
use crate::error::{Error, Result};
use crate::fold::{self, FoldOptions, Folded, FramesKey};
use crate::scan::IndexedLineScanner;

/// Below this many lines per worker the fork-join overhead wins.
const MIN_LINES_PER_WORKER: usize = 10_000;

/// Same idea for the folding stage, counted in samples.
const MIN_SAMPLES_PER_WORKER: usize = 10_000;

const CAPACITY_HASHMAP: usize = 512;

lazy_static! {
    static ref DEFAULT_NTHREADS: usize = num_cpus::get();
}

/// Whether the input is big enough for the parallel path at all.
pub fn should_parallelise(buffer: &str) -> bool {
    let lines = buffer.bytes().filter(|&b| b == b'\n').count();
    lines >= *DEFAULT_NTHREADS * MIN_LINES_PER_WORKER
}

pub fn parse(buffer: &str) -> Result<Samples> {
    let scanner = IndexedLineScanner::new(buffer);
    let nworkers = (*DEFAULT_NTHREADS)
        .min(scanner.line_count() / MIN_LINES_PER_WORKER)
        .max(1);
    if nworkers <= 1 {
        return PerfParser.parse(buffer);
    }
    debug!(
        "parsing {} lines across {} workers",
        scanner.line_count(),
        nworkers
    );
    parse_blocks(&scanner, nworkers)
}

pub(crate) fn parse_blocks<'a>(
    scanner: &IndexedLineScanner<'a>,
    nworkers: usize,
) -> Result<Samples<'a>> {
    // resolve every block start to a sample boundary up front, so each
    // worker's range holds whole samples
    let mut bounds = Vec::with_capacity(nworkers + 1);
    bounds.push(0);
    for worker in 1..nworkers {
        let (raw_start, _) = scanner.block_range(worker, nworkers);
        bounds.push(seek_sample_boundary(scanner, raw_start));
    }
    bounds.push(scanner.line_count());

    let samples = crossbeam::thread::scope(|scope| -> Result<Samples<'a>> {
        let mut handles = Vec::with_capacity(nworkers);
        for worker in 0..nworkers {
            let (start, end) = (bounds[worker], bounds[worker + 1]);
            handles.push(scope.spawn(move |_| -> Result<Samples<'a>> {
                let mut state = PerfState::new();
                for index in start..end {
                    state.on_line(scanner.line(index))?;
                }
                Ok(state.finish())
            }));
        }
        let mut all = Samples::new();
        for handle in handles {
            all.extend(handle.join().unwrap()?);
        }
        Ok(all)
    })
    .unwrap()?;

    if samples.is_empty() {
        return Err(Error::ParseEmpty);
    }
    Ok(samples)
}

// A blank line or a header (the first `:`-bearing line) is a safe place to
// start: whatever sample straddles the raw boundary is parsed to completion
// by the previous worker, whose range extends to this adjusted start.
fn seek_sample_boundary(scanner: &IndexedLineScanner, mut start: usize) -> usize {
    while start < scanner.line_count() {
        let line = scanner.line(start);
        if line.is_empty() || line.contains(':') {
            break;
        }
        start += 1;
    }
    start
}

/// Fold on all cores, merging through the shared concurrent multiset, then
/// copy into the sequential structure the rest of the pipeline expects.
pub fn fold_samples<'a>(samples: &'a [Sample<'a>], opts: &FoldOptions) -> Folded<'a> {
    let nworkers = (*DEFAULT_NTHREADS)
        .min(samples.len() / MIN_SAMPLES_PER_WORKER)
        .max(1);
    if nworkers <= 1 {
        return fold::fold(samples, opts);
    }
    fold_chunks(samples, opts, nworkers)
}

pub(crate) fn fold_chunks<'a>(
    samples: &'a [Sample<'a>],
    opts: &FoldOptions,
    nworkers: usize,
) -> Folded<'a> {
    let concurrent: CHashMap<FramesKey<'a>, usize> = CHashMap::with_capacity(CAPACITY_HASHMAP);
    let chunk_size = (samples.len() + nworkers - 1) / nworkers;

    crossbeam::thread::scope(|scope| {
        for chunk in samples.chunks(chunk_size.max(1)) {
            let concurrent = &concurrent;
            scope.spawn(move |_| {
                for sample in chunk {
                    if !sample.is_valid() {
                        continue;
                    }
                    let key = FramesKey::new(fold::keyed_frames(sample, opts));
                    concurrent.upsert(key, || sample.count, |count| *count += sample.count);
                }
            });
        }
    })
    .unwrap();

    let mut folded = Folded::default();
    for (key, count) in concurrent.into_iter() {
        folded.insert_or_add(key, count);
    }
    if opts.min_count_threshold > 1 {
        folded.retain_at_least(opts.min_count_threshold);
    }
    folded
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::Frame;

    fn perf_input(nsamples: usize) -> String {
        let mut input = String::new();
        for i in 0..nsamples {
            input.push_str(&format!("prog {} {}.000000: cpu-clock:\n", i, i + 1));
            input.push_str("\tdeadbeef compute+0x10 (/usr/bin/prog)\n");
            if i % 3 == 0 {
                input.push_str("\tfeedface worker+0x20 (/usr/bin/prog)\n");
            }
            input.push_str("\tcafebabe main+0x30 (/usr/bin/prog)\n");
            input.push('\n');
        }
        input
    }

    #[test]
    fn block_parse_equals_sequential_parse() {
        let input = perf_input(40);
        let sequential = PerfParser.parse(&input).unwrap();
        let scanner = IndexedLineScanner::new(&input);
        for nworkers in 2..=7 {
            let parallel = parse_blocks(&scanner, nworkers).unwrap();
            assert_eq!(parallel, sequential, "{} workers diverged", nworkers);
        }
    }

    #[test]
    fn boundary_seek_keeps_straddled_samples_whole() {
        // two 4-line samples; any 2-way split lands mid-sample
        let input = perf_input(2);
        let scanner = IndexedLineScanner::new(&input);
        let sequential = PerfParser.parse(&input).unwrap();
        let parallel = parse_blocks(&scanner, 2).unwrap();
        assert_eq!(parallel.len(), sequential.len());
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn chunked_fold_equals_sequential_fold() {
        let input = perf_input(50);
        let samples = PerfParser.parse(&input).unwrap();
        let sequential = fold::fold(&samples, &FoldOptions::default());
        for nworkers in 2..=5 {
            let parallel = fold_chunks(&samples, &FoldOptions::default(), nworkers);
            assert_eq!(parallel, sequential, "{} workers diverged", nworkers);
        }
    }

    #[test]
    fn chunked_fold_applies_depth_truncation() {
        let mut deep = Sample::new();
        deep.frames = vec![
            Frame::function("a"),
            Frame::function("b"),
            Frame::function("c"),
        ];
        let mut shallow = Sample::new();
        shallow.frames = vec![Frame::function("a"), Frame::function("b")];
        let samples = vec![deep, shallow];

        let opts = FoldOptions {
            max_depth: 2,
            ..Default::default()
        };
        let folded = fold_chunks(&samples, &opts, 2);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded.total_count(), 2);
    }

    #[test]
    fn small_inputs_stay_sequential() {
        assert!(!should_parallelise("prog 1 1.0: cycles:\n\ta b (/c)\n"));
    }
}
