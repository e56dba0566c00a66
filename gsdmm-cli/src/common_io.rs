use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use gsdmm::GsdmmError;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn is_gz(file: &str) -> bool {
    Path::new(file).extension().is_some_and(|ext| ext == "gz")
}

/// Buffered reader over `file`, decompressing `.gz` on the fly.
pub fn open_buf_reader(file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let raw = File::open(file)
        .map_err(|e| anyhow::anyhow!("cannot open {} for reading: {}", file, e))?;
    let reader: Box<dyn BufRead> = if is_gz(file) {
        Box::new(BufReader::new(GzDecoder::new(raw)))
    } else {
        Box::new(BufReader::new(raw))
    };
    Ok(reader)
}

/// Buffered writer to `file`, gzip-compressed for `.gz`.
///
/// `stdout` (any case) writes to standard output.
pub fn open_buf_writer(file: &str) -> anyhow::Result<Box<dyn Write>> {
    if file.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }
    let raw = File::create(file)
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", file, e))?;
    let writer: Box<dyn Write> = if is_gz(file) {
        Box::new(BufWriter::new(GzEncoder::new(raw, Compression::default())))
    } else {
        Box::new(BufWriter::new(raw))
    };
    Ok(writer)
}

/// Write one displayable item per line.
///
/// A closed pipe (e.g. `| head`) ends the output quietly.
pub fn write_types<T: std::fmt::Display>(items: &[T], file: &str) -> anyhow::Result<()> {
    let mut out = open_buf_writer(file)?;
    for item in items {
        match writeln!(out, "{}", item) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(anyhow::anyhow!("writing {}: {}", file, e)),
        }
    }
    out.flush()?;
    Ok(())
}

/// Make sure the directory that will hold `file` exists.
pub fn mkdir(file: &str) -> anyhow::Result<()> {
    match Path::new(file).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(std::fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

///
/// Read one document per line: whitespace-separated integer token ids.
///
/// Lines starting with `#` are skipped; blank lines are empty documents.
/// Ids are kept signed so that negative values can be reported against
/// the vocabulary later.
///
/// * `input_file` - plain text or `.gz`
///
pub fn read_token_lines(input_file: &str) -> anyhow::Result<Vec<Vec<i64>>> {
    let lines: Vec<String> = open_buf_reader(input_file)?
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.starts_with('#')))
        .collect::<std::io::Result<_>>()?;

    // parsing takes more time than reading
    lines
        .par_iter()
        .enumerate()
        .map(|(i, line)| {
            line.split_whitespace()
                .map(|x| {
                    x.parse::<i64>().map_err(|e| {
                        anyhow::anyhow!("document {}: failed to parse `{}`: {}", i, x, e)
                    })
                })
                .collect::<anyhow::Result<Vec<i64>>>()
        })
        .collect()
}

/// Vocabulary size implied by the data: one more than the largest id.
pub fn implied_vocab_size(documents: &[Vec<i64>]) -> usize {
    documents
        .iter()
        .flatten()
        .copied()
        .max()
        .map(|w| (w.max(-1) + 1) as usize)
        .unwrap_or(0)
}

/// Convert signed ids to token ids, rejecting anything outside `[0, V)`.
pub fn to_token_ids(
    documents: &[Vec<i64>],
    vocab_size: usize,
) -> Result<Vec<Vec<usize>>, GsdmmError> {
    documents
        .iter()
        .enumerate()
        .map(|(d, tokens)| {
            tokens
                .iter()
                .enumerate()
                .map(|(position, &token)| {
                    if token < 0 || token as u64 >= vocab_size as u64 {
                        Err(GsdmmError::TokenOutOfRange {
                            document: d,
                            position,
                            token,
                            vocab_size,
                        })
                    } else {
                        Ok(token as usize)
                    }
                })
                .collect()
        })
        .collect()
}
