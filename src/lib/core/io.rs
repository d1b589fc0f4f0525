use flate2::read::MultiGzDecoder;
use grep_cli::stdout;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use termcolor::ColorChoice;

use super::error::Result;
use super::fs::is_gzipped;

/// Open a line-oriented text file, decompressing transparently when the
/// path ends in `.gz`. Multi-member streams are accepted so bgzipped files work.
pub fn open_text_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gzipped(path) {
        Box::new(BufReader::with_capacity(256 * 1024, MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };
    Ok(reader)
}

/// Build a writer targeting a file, or stdout when the path is `-`.
pub fn get_writer<P: AsRef<Path>>(path: P) -> Result<Box<dyn Write>> {
    let path = path.as_ref();
    let writer: Box<dyn Write> = if path.as_os_str() == "-" {
        Box::new(stdout(ColorChoice::Never))
    } else {
        Box::new(BufWriter::new(File::create(path)?))
    };
    Ok(writer)
}
