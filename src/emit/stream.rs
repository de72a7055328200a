//! Output streams for the four segments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

/// One of the output files produced by `ModuleBuilder::finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Main,
    Data,
    Strings,
    FrequentWords,
}

impl Segment {
    fn suffix(self) -> &'static str {
        match self {
            Segment::Main => "",
            Segment::Data => "_data",
            Segment::Strings => "_str",
            Segment::FrequentWords => "_freq",
        }
    }
}

/// Opens the segment streams and names the files they end up in.
pub trait ZapStreamFactory {
    fn create_stream(&mut self, segment: Segment) -> io::Result<Box<dyn Write>>;

    /// File name used in `.INSERT` directives (no extension) or on disk.
    fn file_name(&self, segment: Segment, with_extension: bool) -> String;

    /// When true the frequent-words segment is left alone.
    fn frequent_words_file_exists(&self) -> bool;
}

/// Writes `<base>.zap`, `<base>_data.zap`, `<base>_str.zap` and
/// `<base>_freq.zap` into a directory.
#[derive(Debug, Clone)]
pub struct FileStreamFactory {
    dir: PathBuf,
    base: String,
    /// Write the frequent-words stub even when the file is already there.
    force_frequent_words: bool,
}

impl FileStreamFactory {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
            force_frequent_words: false,
        }
    }

    pub fn force_frequent_words(mut self, force: bool) -> Self {
        self.force_frequent_words = force;
        self
    }

    pub fn path(&self, segment: Segment) -> PathBuf {
        self.dir.join(self.file_name(segment, true))
    }
}

impl ZapStreamFactory for FileStreamFactory {
    fn create_stream(&mut self, segment: Segment) -> io::Result<Box<dyn Write>> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(self.path(segment))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn file_name(&self, segment: Segment, with_extension: bool) -> String {
        let name = format!("{}{}", self.base, segment.suffix());
        if with_extension {
            format!("{}.zap", name)
        } else {
            name
        }
    }

    fn frequent_words_file_exists(&self) -> bool {
        !self.force_frequent_words && self.path(Segment::FrequentWords).exists()
    }
}

type SharedSegments = Rc<RefCell<HashMap<Segment, Vec<u8>>>>;

/// Keeps every segment in memory. Clones share the same buffers, so a caller
/// can hand one clone to the module and read the output through another.
#[derive(Debug, Clone)]
pub struct MemoryStreamFactory {
    base: String,
    segments: SharedSegments,
    frequent_words_exist: bool,
}

impl MemoryStreamFactory {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            segments: Rc::new(RefCell::new(HashMap::new())),
            frequent_words_exist: false,
        }
    }

    pub fn with_existing_frequent_words(mut self) -> Self {
        self.frequent_words_exist = true;
        self
    }

    /// Text written to `segment`, if it was ever opened.
    pub fn contents(&self, segment: Segment) -> Option<String> {
        self.segments
            .borrow()
            .get(&segment)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

struct MemoryStream {
    segment: Segment,
    segments: SharedSegments,
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.segments
            .borrow_mut()
            .entry(self.segment)
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ZapStreamFactory for MemoryStreamFactory {
    fn create_stream(&mut self, segment: Segment) -> io::Result<Box<dyn Write>> {
        self.segments.borrow_mut().insert(segment, Vec::new());
        Ok(Box::new(MemoryStream {
            segment,
            segments: Rc::clone(&self.segments),
        }))
    }

    fn file_name(&self, segment: Segment, with_extension: bool) -> String {
        let name = format!("{}{}", self.base, segment.suffix());
        if with_extension {
            format!("{}.zap", name)
        } else {
            name
        }
    }

    fn frequent_words_file_exists(&self) -> bool {
        self.frequent_words_exist
    }
}
