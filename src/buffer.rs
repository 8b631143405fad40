use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};

/// A read-only memory mapping of the input file.
///
/// Every downstream structure (frames, folded keys, the tree) borrows string
/// slices out of this buffer, so it must outlive the whole pipeline run. The
/// mapping is advised for sequential access and unmapped on drop.
pub struct InputBuffer {
    map: Mmap,
}

impl InputBuffer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let map = unsafe { Mmap::map(&file)? };
        #[cfg(unix)]
        let _ = map.advise(memmap2::Advice::Sequential);
        Ok(InputBuffer { map })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    /// View the mapping as UTF-8 text. Profile captures are ASCII in
    /// practice; anything else is a malformed capture, not an i/o failure.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.map).map_err(|e| Error::ParseFormat {
            dialect: "binary",
            message: format!("input is not valid UTF-8 at byte {}", e.valid_up_to()),
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
