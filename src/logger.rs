//! The simulation's own event-log sink (§4.7 / §6.6) — not to be confused
//! with the crate's ambient diagnostic logging, which goes through the
//! `log`/`env_logger` facade from each binary's `main` (see SPEC_FULL.md
//! §4.8). This sink is a first-class data product: one line per simulated
//! event, gated by verbosity, optionally gzip-compressed.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::scheduler::SimTime;

enum Sink {
    Raw(BufWriter<Box<dyn Write>>),
    Gzip(GzEncoder<BufWriter<Box<dyn Write>>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Raw(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Raw(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Structured, verbosity-gated, append-only event sink.
pub struct Logger {
    sink: Sink,
    verbosity: u8,
}

impl Logger {
    /// Write to a file, optionally gzip-wrapped.
    pub fn to_file(path: &str, verbosity: u8, gzip: bool) -> io::Result<Self> {
        let file: Box<dyn Write> = Box::new(File::create(path)?);
        let sink = Self::wrap(file, gzip);
        Ok(Logger { sink, verbosity })
    }

    /// Write to stdout (default when no `-o` / `--output` path is given).
    pub fn to_stdout(verbosity: u8, gzip: bool) -> Self {
        let out: Box<dyn Write> = Box::new(io::stdout());
        let sink = Self::wrap(out, gzip);
        Logger { sink, verbosity }
    }

    fn wrap(w: Box<dyn Write>, gzip: bool) -> Sink {
        let buffered = BufWriter::new(w);
        if gzip {
            Sink::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            Sink::Raw(buffered)
        }
    }

    /// Emit `kind payload` if `level <= verbosity`.
    pub fn log(&mut self, kind: &str, payload: &std::fmt::Arguments<'_>, level: u8) {
        if level <= self.verbosity {
            let _ = writeln!(self.sink, "{kind} {payload}");
        }
    }

    /// Flush and, for a gzip sink, finish the stream so the footer is
    /// written. Must be called before the process exits.
    pub fn close(self) -> io::Result<()> {
        match self.sink {
            Sink::Raw(mut w) => w.flush(),
            Sink::Gzip(w) => w.finish().map(|_| ()),
        }
    }

    /// Same as [`Logger::close`], but through `&mut self` — for the common
    /// case where the logger lives behind a shared `Rc<RefCell<_>>` handed
    /// to every spawned process and can't be moved out at the end of the
    /// run (the scheduler's own task queue keeps a live reference cycle
    /// through it for the lifetime of the process).
    pub fn finish(&mut self) -> io::Result<()> {
        let placeholder = Sink::Raw(BufWriter::new(Box::new(io::sink()) as Box<dyn Write>));
        match std::mem::replace(&mut self.sink, placeholder) {
            Sink::Raw(mut w) => w.flush(),
            Sink::Gzip(w) => w.finish().map(|_| ()),
        }
    }
}

/// Convenience macro mirroring `Node.log(kind, what, level)`: prepends
/// `now _id_ ` to the formatted body, as §4.7 specifies.
#[macro_export]
macro_rules! node_log {
    ($logger:expr, $kind:expr, $level:expr, $now:expr, $id:expr, $($arg:tt)*) => {
        $logger.log($kind, &format_args!("{} _{}_ {}", $now, $id, format_args!($($arg)*)), $level)
    };
}

/// Convenience macro for node-less lines (e.g. `PM`, top-level setup).
#[macro_export]
macro_rules! sim_log {
    ($logger:expr, $kind:expr, $level:expr, $($arg:tt)*) => {
        $logger.log($kind, &format_args!($($arg)*), $level)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn verbosity_filters_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut logger = Logger::to_file(path.to_str().unwrap(), 1, false).unwrap();
        logger.log("+", &format_args!("0 _1_ 0"), 0);
        logger.log("PER", &format_args!("0 _1_ 0 0.99"), 2);
        logger.close().unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("+ 0 _1_ 0"));
        assert!(!contents.contains("PER"));
    }

    #[test]
    fn node_log_prepends_time_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut logger = Logger::to_file(path.to_str().unwrap(), 4, false).unwrap();
        let now: SimTime = 1234;
        let id = 7u32;
        node_log!(logger, "+", 0, now, id, "{}", 0);
        logger.close().unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.trim_end(), "+ 1234 _7_ 0");
    }
}
