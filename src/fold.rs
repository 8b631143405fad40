//! Folding: aggregate samples by whole-stack equality into a multiset
//! `frames → count`.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::io;

use fnv::FnvHashMap;

use crate::parse::{Frame, Sample};

/// A borrowed view over one sample's frame sequence; the key of the folding
/// multiset. Equality is element-wise; the hash is an order-sensitive
/// combination of the frames' cached hashes, memoised at construction.
#[derive(Debug, Clone, Copy)]
pub struct FramesKey<'a> {
    frames: &'a [Frame<'a>],
    hash: u64,
}

impl<'a> FramesKey<'a> {
    pub fn new(frames: &'a [Frame<'a>]) -> Self {
        let mut hash: u64 = 0;
        for frame in frames {
            hash ^= frame
                .cached_hash()
                .wrapping_add(0x9e37_79b9_7f4a_7c15)
                .wrapping_add(hash << 6)
                .wrapping_add(hash >> 2);
        }
        FramesKey { frames, hash }
    }

    pub fn frames(&self) -> &'a [Frame<'a>] {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<'a> PartialEq for FramesKey<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.frames == other.frames
    }
}

impl<'a> Eq for FramesKey<'a> {}

impl<'a> Hash for FramesKey<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl<'a> Ord for FramesKey<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frames.cmp(other.frames)
    }
}

impl<'a> PartialOrd for FramesKey<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FoldOptions {
    /// Truncate every stack to its first `max_depth` frames before keying;
    /// 0 means unlimited.
    pub max_depth: usize,
    /// Drop folded keys whose total count ends up below this.
    pub min_count_threshold: usize,
}

/// The collapsed multiset. Every key is a non-empty frame sequence and every
/// count is positive.
#[derive(Debug, Default, PartialEq)]
pub struct Folded<'a> {
    map: FnvHashMap<FramesKey<'a>, usize>,
}

impl<'a> Folded<'a> {
    pub fn insert_or_add(&mut self, key: FramesKey<'a>, count: usize) {
        debug_assert!(!key.is_empty() && count > 0);
        *self.map.entry(key).or_insert(0) += count;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FramesKey<'a>, &usize)> {
        self.map.iter()
    }

    pub fn total_count(&self) -> usize {
        self.map.values().sum()
    }

    pub(crate) fn retain_at_least(&mut self, min_count: usize) {
        self.map.retain(|_, count| *count >= min_count);
    }

    /// Write the folded form, one `frame1;frame2;…;frameN count` line per
    /// key, sorted so output is deterministic. Library frames that were not
    /// already bracketed are wrapped in `[...]` here. Unix line endings on
    /// every platform; downstream flame-graph tooling expects them.
    pub fn write<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        let mut entries: Vec<_> = self.map.iter().collect();
        entries.sort();
        for (key, count) in entries {
            let mut first = true;
            for frame in key.frames() {
                if !first {
                    write!(writer, ";")?;
                }
                write!(writer, "{}", frame)?;
                first = false;
            }
            write!(writer, " {}\n", count)?;
        }
        Ok(())
    }
}

/// Fold samples by whole-stack equality, truncating to `max_depth` first so
/// deeper variants of a stack merge into their prefix.
pub fn fold<'a>(samples: &'a [Sample<'a>], opts: &FoldOptions) -> Folded<'a> {
    let mut folded = Folded::default();
    for sample in samples {
        if !sample.is_valid() {
            continue;
        }
        folded.insert_or_add(FramesKey::new(keyed_frames(sample, opts)), sample.count);
    }
    if opts.min_count_threshold > 1 {
        folded.retain_at_least(opts.min_count_threshold);
    }
    folded
}

pub(crate) fn keyed_frames<'a>(sample: &'a Sample<'a>, opts: &FoldOptions) -> &'a [Frame<'a>] {
    if opts.max_depth > 0 && sample.frames.len() > opts.max_depth {
        &sample.frames[..opts.max_depth]
    } else {
        &sample.frames[..]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::seq::SliceRandom;

    use super::*;
    use crate::parse::{Frame, Sample};

    fn sample<'a>(names: &[&'a str]) -> Sample<'a> {
        let mut s = Sample::new();
        s.frames = names.iter().map(|n| Frame::function(n)).collect();
        s
    }

    #[test]
    fn identical_stacks_merge() {
        let samples = vec![sample(&["a", "b"]), sample(&["a", "b"]), sample(&["a", "c"])];
        let folded = fold(&samples, &FoldOptions::default());
        assert_eq!(folded.len(), 2);
        assert_eq!(folded.total_count(), 3);
        let ab = FramesKey::new(&samples[0].frames);
        let ac = FramesKey::new(&samples[2].frames);
        assert_eq!(folded.map[&ab], 2);
        assert_eq!(folded.map[&ac], 1);
    }

    #[test]
    fn key_equality_tracks_sequence_equality() {
        let one = sample(&["a", "b"]);
        let two = sample(&["a", "b"]);
        let other = sample(&["b", "a"]);
        assert_eq!(FramesKey::new(&one.frames), FramesKey::new(&two.frames));
        assert_ne!(FramesKey::new(&one.frames), FramesKey::new(&other.frames));
        let prefix = FramesKey::new(&one.frames[..1]);
        assert_ne!(FramesKey::new(&one.frames), prefix);
    }

    #[test]
    fn key_hash_is_order_sensitive_and_memoised() {
        let fwd = sample(&["a", "b"]);
        let rev = sample(&["b", "a"]);
        let k1 = FramesKey::new(&fwd.frames);
        let k2 = FramesKey::new(&rev.frames);
        assert_ne!(k1.hash, k2.hash);
        assert_eq!(k1.hash, FramesKey::new(&fwd.frames).hash);
    }

    #[test]
    fn folding_is_idempotent_over_expansion() {
        let samples = vec![
            sample(&["a", "b"]),
            sample(&["a", "b"]),
            sample(&["a", "b", "c"]),
            sample(&["d"]),
        ];
        let folded = fold(&samples, &FoldOptions::default());

        // expand: one sample per occurrence
        let expanded: Vec<Sample> = folded
            .iter()
            .flat_map(|(key, &count)| {
                (0..count).map(move |_| {
                    let mut s = Sample::new();
                    s.frames = key.frames().to_vec();
                    s
                })
            })
            .collect();
        let refolded = fold(&expanded, &FoldOptions::default());
        assert_eq!(refolded, folded);
    }

    #[test]
    fn folding_is_order_invariant() {
        let samples = vec![
            sample(&["a", "b"]),
            sample(&["a", "c"]),
            sample(&["a", "b", "c"]),
            sample(&["a", "b"]),
            sample(&["d"]),
        ];
        let folded = fold(&samples, &FoldOptions::default());
        let mut rng = rand::thread_rng();
        for _ in 0..8 {
            let mut shuffled = samples.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(fold(&shuffled, &FoldOptions::default()), folded);
        }
    }

    #[test]
    fn max_depth_merges_deep_variants() {
        let samples = vec![
            sample(&["a", "b", "c"]),
            sample(&["a", "b", "d"]),
            sample(&["a"]),
        ];
        let opts = FoldOptions {
            max_depth: 2,
            ..Default::default()
        };
        let folded = fold(&samples, &opts);
        assert_eq!(folded.len(), 2);
        let ab = sample(&["a", "b"]);
        assert_eq!(folded.map[&FramesKey::new(&ab.frames)], 2);
    }

    #[test]
    fn min_count_threshold_filters_rare_stacks() {
        let samples = vec![sample(&["a", "b"]), sample(&["a", "b"]), sample(&["a", "c"])];
        let opts = FoldOptions {
            min_count_threshold: 2,
            ..Default::default()
        };
        let folded = fold(&samples, &opts);
        assert_eq!(folded.len(), 1);
    }

    #[test]
    fn writer_emits_sorted_semicolon_lines() {
        let mut zc = Sample::new();
        zc.frames = vec![Frame::function("z"), Frame::function("c")];
        let mut lib = Sample::new();
        lib.frames = vec![
            Frame::function("a"),
            Frame::library("libc.so.6", false),
            Frame::library("[vdso]", true),
        ];
        let samples = vec![zc, lib];
        let folded = fold(&samples, &FoldOptions::default());

        let mut out = Vec::new();
        folded.write(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a;[libc.so.6];[vdso] 1\nz;c 1\n"
        );
    }
}
