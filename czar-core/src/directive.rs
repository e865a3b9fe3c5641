//! Removal of `#pragma czar` directive lines.
//!
//! Sources are consumed in fixed-size chunks, so a single logical line may
//! arrive as several fragments without a newline between them. The stripper
//! buffers only as much of a line as it needs to classify it, then either
//! forwards the rest of the line untouched or drops it up to and including
//! the terminating newline.

use std::io::{self, Read, Write};

/// Size of the read buffer used by [`strip_reader`].
pub const READ_BUFFER_SIZE: usize = 1024;

const MARKER: &[u8] = b"#pragma";
const KEYWORD: &[u8] = b"czar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Directive,
    Passthrough,
    Undecided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    LineStart,
    Passing,
    Discarding,
}

/// Streaming directive stripper.
#[derive(Debug)]
pub struct DirectiveStripper {
    mode: Mode,
    pending: Vec<u8>,
    stripped: usize,
}

impl Default for DirectiveStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectiveStripper {
    pub fn new() -> Self {
        Self {
            mode: Mode::LineStart,
            pending: Vec::new(),
            stripped: 0,
        }
    }

    /// Feed one chunk of input, writing every byte that survives to `out`.
    pub fn feed<W: Write>(&mut self, mut chunk: &[u8], out: &mut W) -> io::Result<()> {
        while !chunk.is_empty() {
            let line_end = chunk.iter().position(|&b| b == b'\n').map(|p| p + 1);
            match self.mode {
                Mode::Passing => match line_end {
                    Some(end) => {
                        out.write_all(&chunk[..end])?;
                        chunk = &chunk[end..];
                        self.mode = Mode::LineStart;
                    }
                    None => {
                        out.write_all(chunk)?;
                        return Ok(());
                    }
                },
                Mode::Discarding => match line_end {
                    Some(end) => {
                        chunk = &chunk[end..];
                        self.stripped += 1;
                        self.mode = Mode::LineStart;
                    }
                    None => return Ok(()),
                },
                Mode::LineStart => {
                    let end = line_end.unwrap_or(chunk.len());
                    self.pending.extend_from_slice(&chunk[..end]);
                    chunk = &chunk[end..];
                    let complete = line_end.is_some();
                    match classify(&self.pending, complete) {
                        Decision::Directive => {
                            self.pending.clear();
                            if complete {
                                self.stripped += 1;
                            } else {
                                self.mode = Mode::Discarding;
                            }
                        }
                        Decision::Passthrough => {
                            out.write_all(&self.pending)?;
                            self.pending.clear();
                            if !complete {
                                self.mode = Mode::Passing;
                            }
                        }
                        Decision::Undecided => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Flush a trailing unterminated line and return how many directive
    /// lines were removed.
    pub fn finish<W: Write>(mut self, out: &mut W) -> io::Result<usize> {
        match self.mode {
            Mode::LineStart if !self.pending.is_empty() => {
                if classify(&self.pending, true) == Decision::Directive {
                    self.stripped += 1;
                } else {
                    out.write_all(&self.pending)?;
                }
            }
            Mode::Discarding => self.stripped += 1,
            _ => {}
        }
        out.flush()?;
        Ok(self.stripped)
    }
}

/// Strip directives from `reader` into `writer` using a fixed read buffer.
pub fn strip_reader<R: Read, W: Write>(mut reader: R, mut writer: W) -> io::Result<usize> {
    let mut stripper = DirectiveStripper::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        stripper.feed(&buffer[..read], &mut writer)?;
    }
    stripper.finish(&mut writer)
}

/// In-memory convenience over [`strip_reader`].
pub fn strip_directives(source: &str) -> String {
    let mut out = Vec::with_capacity(source.len());
    let mut stripper = DirectiveStripper::new();
    for chunk in source.as_bytes().chunks(READ_BUFFER_SIZE) {
        // Writes into a Vec cannot fail.
        let _ = stripper.feed(chunk, &mut out);
    }
    let _ = stripper.finish(&mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Whether a complete line (with or without its newline) is a directive.
pub fn is_directive_line(line: &str) -> bool {
    classify(line.as_bytes(), true) == Decision::Directive
}

fn classify(line: &[u8], complete: bool) -> Decision {
    let exhausted = if complete {
        Decision::Passthrough
    } else {
        Decision::Undecided
    };

    let mut index = 0;
    while index < line.len() && is_blank(line[index]) {
        index += 1;
    }

    for &expected in MARKER {
        match line.get(index).copied() {
            None => return exhausted,
            Some(b) if b != expected => return Decision::Passthrough,
            Some(_) => index += 1,
        }
    }

    match line.get(index).copied() {
        None => return exhausted,
        Some(b) if !is_blank(b) => return Decision::Passthrough,
        Some(_) => {}
    }
    while index < line.len() && is_blank(line[index]) {
        index += 1;
    }

    for &expected in KEYWORD {
        match line.get(index).copied() {
            None => return exhausted,
            Some(b) if b != expected => return Decision::Passthrough,
            Some(_) => index += 1,
        }
    }

    match line.get(index).copied() {
        None if complete => Decision::Directive,
        None => Decision::Undecided,
        Some(b' ' | b'\t' | b'\r' | b'\n') => Decision::Directive,
        Some(_) => Decision::Passthrough,
    }
}

fn is_blank(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t')
}
