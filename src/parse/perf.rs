//! The `perf script` dialect.
//!
//! A sample is a header line (the one with the PID/event/timestamp colons),
//! followed by zero or more frame lines, terminated by a blank line or EOF:
//!
//! ```text
//! testprog 12345 1748678782.171698: 250000 cpu-clock:u:
//!     7f0b8bf5766d malloc+0x5d (/usr/lib/libc.so.6)
//!     55c8a53c9f61 compute+0x11 (/usr/bin/testprog)
//!     7f53389994d0 [unknown] ([unknown])
//!
//! ```
//!
//! Frames arrive leaf-first and are reversed into root→leaf order when the
//! sample is flushed.

use log::warn;

use super::{flush_reversed, Frame, Sample, Samples, StackParser};
use crate::error::{Error, Result};
use crate::scan::{trim_ascii, LineScanner};

pub struct PerfParser;

impl StackParser for PerfParser {
    fn parse<'a>(&self, buffer: &'a str) -> Result<Samples<'a>> {
        let mut state = PerfState::new();
        for line in LineScanner::new(buffer) {
            state.on_line(line)?;
        }
        let samples = state.finish();
        if samples.is_empty() {
            return Err(Error::ParseEmpty);
        }
        Ok(samples)
    }

    fn tag(&self) -> &'static str {
        "perf-script"
    }
}

/// The per-run (or per-block, in parallel mode) parsing state machine.
pub(crate) struct PerfState<'a> {
    samples: Samples<'a>,
    current: Sample<'a>,
    /// All lines until the next blank line belong to the current sample.
    reading_stack: bool,
}

impl<'a> PerfState<'a> {
    pub(crate) fn new() -> Self {
        PerfState {
            samples: Samples::new(),
            current: Sample::new(),
            reading_stack: false,
        }
    }

    pub(crate) fn on_line(&mut self, line: &'a str) -> Result<()> {
        if line.is_empty() {
            if self.reading_stack {
                flush_reversed(&mut self.samples, &mut self.current);
            }
            self.reading_stack = false;
        } else if !self.reading_stack && line.contains(':') {
            self.on_header_line(line)?;
            self.reading_stack = true;
        } else if self.reading_stack {
            self.on_stack_line(line);
        }
        Ok(())
    }

    /// Flush any in-progress sample and hand back everything parsed.
    pub(crate) fn finish(mut self) -> Samples<'a> {
        if self.reading_stack {
            flush_reversed(&mut self.samples, &mut self.current);
        }
        self.samples
    }

    // we have an event header line, like:
    //
    //     java 25607 4794564.109216: cycles:
    //     java 12688 [002] 6544038.708352: cpu-clock:
    //     vote   913    72.176760:     257597 cycles:uppp:
    fn on_header_line(&mut self, line: &'a str) -> Result<()> {
        self.current.process = line.split_whitespace().next().unwrap_or("");
        self.current.timestamp_us = extract_timestamp(line)?;
        Ok(())
    }

    fn on_stack_line(&mut self, line: &'a str) {
        match parse_stack_frame(line) {
            Some(frame) => {
                // resolved to nothing at all; drop the frame, keep the sample
                if !frame.is_empty() {
                    self.current.frames.push(frame);
                }
            }
            None => warn!("weird stack line: {}", line),
        }
    }
}

/// The timestamp is the numeric token immediately before the first `:`,
/// in fractional seconds; a missing token means 0. A token that starts out
/// numeric but fails to parse is a malformed header, not a missing field.
fn extract_timestamp(line: &str) -> Result<u64> {
    let colon = match line.find(':') {
        Some(i) => i,
        None => return Ok(0),
    };
    let before = &line[..colon];
    let start = match before.rfind(|c: char| c == ' ' || c == '\t') {
        Some(i) => i + 1,
        None => return Ok(0),
    };
    let token = &before[start..];
    if !token.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(0);
    }
    match token.parse::<f64>() {
        Ok(seconds) => Ok((seconds * 1_000_000.0) as u64),
        Err(_) => Err(Error::ParseFormat {
            dialect: "perf-script",
            message: format!("truncated timestamp {:?} in header {:?}", token, line),
        }),
    }
}

// we have a stack line that shows one stack entry from the preceding header:
//
//     ffffffff8103ce3b native_safe_halt ([kernel.kallsyms])
//     7f533952bc77 _dl_check_map_versions+0x597 (/usr/lib/ld-2.28.so)
//     7f53389994d0 [unknown] ([unknown])
//
// Returns None if the line has no address/symbol split at all; an empty
// frame (both symbol and library unresolvable) is returned and skipped by
// the caller.
fn parse_stack_frame(line: &str) -> Option<Frame> {
    let first_space = line.find(|c: char| c == ' ' || c == '\t')?;
    let content = trim_ascii(&line[first_space + 1..]);

    // a trailing parenthesised token is the library the symbol came from
    let (mut func, lib_raw) = match content.rfind('(') {
        Some(open) if content[open..].contains(')') => {
            let close = open + content[open..].find(')').unwrap();
            (trim_ascii(&content[..open]), &content[open + 1..close])
        }
        _ => (content, ""),
    };

    // strip the symbol offset, but only if it really is one
    if func != "[unknown]" {
        if let Some(offset) = func.rfind("+0x") {
            if func[offset + 3..].bytes().all(|b| b.is_ascii_hexdigit()) {
                func = &func[..offset];
            }
        }
    }

    let mut lib = lib_raw;
    let mut bracketed = false;
    if !lib.is_empty() {
        if let Some(slash) = lib.rfind('/') {
            lib = &lib[slash + 1..];
        }
        bracketed = lib.starts_with('[') && lib.ends_with(']');
    }

    if !func.is_empty() && func != "[unknown]" {
        Some(Frame::function(func))
    } else {
        Some(Frame::library(lib, bracketed))
    }
}
