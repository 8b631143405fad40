//! Line scanning over the mapped input.
//!
//! Both scanners share one contract: produce the sequence of trimmed lines as
//! borrowed views into the buffer. A line ends at `\n` or EOF; trimming
//! removes leading and trailing ASCII whitespace (space, tab, CR, LF).

/// Trim ASCII whitespace only. `str::trim` would also eat Unicode spaces,
/// which real captures never contain and the folded format must not alter.
pub fn trim_ascii(line: &str) -> &str {
    line.trim_matches(|c| c == ' ' || c == '\t' || c == '\r' || c == '\n')
}

/// Sequential scanner: a single forward cursor over the buffer.
pub struct LineScanner<'a> {
    buffer: &'a str,
    pos: usize,
}

impl<'a> LineScanner<'a> {
    pub fn new(buffer: &'a str) -> Self {
        LineScanner { buffer, pos: 0 }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.buffer.len()
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.pos >= self.buffer.len() {
            return None;
        }
        let rest = &self.buffer[self.pos..];
        let end = rest.find('\n').unwrap_or_else(|| rest.len());
        self.pos += end + 1;
        Some(trim_ascii(&rest[..end]))
    }
}

/// Indexed scanner: precomputes every line-start offset so any line is
/// addressable in O(1) and contiguous blocks of lines can be handed to
/// workers by index range.
pub struct IndexedLineScanner<'a> {
    buffer: &'a str,
    starts: Vec<usize>,
}

impl<'a> IndexedLineScanner<'a> {
    pub fn new(buffer: &'a str) -> Self {
        let mut starts = Vec::with_capacity(buffer.len() / 32 + 1);
        starts.push(0);
        for (i, b) in buffer.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        if *starts.last().unwrap() == buffer.len() {
            starts.pop();
        }
        IndexedLineScanner { buffer, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// The trimmed `index`th line; empty for out-of-range indices.
    pub fn line(&self, index: usize) -> &'a str {
        if index >= self.starts.len() {
            return "";
        }
        let start = self.starts[index];
        let end = self
            .starts
            .get(index + 1)
            .map(|s| s - 1)
            .unwrap_or_else(|| self.buffer.len());
        trim_ascii(&self.buffer[start..end])
    }

    /// Line-index range `[start, end)` of the `block`th of `num_blocks`
    /// roughly equal contiguous blocks.
    pub fn block_range(&self, block: usize, num_blocks: usize) -> (usize, usize) {
        let total = self.line_count();
        let per_block = total / num_blocks;
        let start = block * per_block;
        let end = if block == num_blocks - 1 {
            total
        } else {
            (block + 1) * per_block
        };
        (start, end)
    }
}
