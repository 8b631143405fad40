//! The generic dialect: hand-written or tool-exported stacks with one frame
//! per line, root first. A blank line or a `#` comment ends the current
//! sample. Every sample has count 1 and no process name.

use super::{Frame, Sample, Samples, StackParser};
use crate::error::{Error, Result};
use crate::scan::LineScanner;

pub struct GenericParser;

impl StackParser for GenericParser {
    fn parse<'a>(&self, buffer: &'a str) -> Result<Samples<'a>> {
        let mut samples = Samples::new();
        let mut current = Sample::new();

        for line in LineScanner::new(buffer) {
            if line.is_empty() || line.starts_with('#') {
                flush(&mut samples, &mut current);
            } else {
                current.frames.push(Frame::function(line));
            }
        }
        flush(&mut samples, &mut current);

        if samples.is_empty() {
            return Err(Error::ParseEmpty);
        }
        Ok(samples)
    }

    fn tag(&self) -> &'static str {
        "generic"
    }
}

// Unlike the perf dialect there is nothing to reverse: lines already read
// root→leaf.
fn flush<'a>(samples: &mut Samples<'a>, sample: &mut Sample<'a>) {
    if sample.frames.is_empty() {
        return;
    }
    let done = std::mem::replace(sample, Sample::new());
    if done.is_valid() {
        samples.push(done);
    }
}
