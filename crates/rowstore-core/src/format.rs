//! Delimited-text snapshot format
//!
//! A snapshot is a sequence of records, one per line, each terminated by `\n`.
//! Fields are separated by a single ASCII delimiter byte (`,` by default).
//!
//! Quoting rules:
//! - A field containing the delimiter, `"`, `\r` or `\n` is wrapped in `"`,
//!   with embedded quotes doubled.
//! - A row holding exactly one empty field is written as `""` so that it is
//!   distinguishable from an empty line, which decodes to a row with no fields.
//!
//! Reading also accepts `\r\n` terminators. Everything the writer produces
//! decodes back to the identical row set.

use std::io::{self, Write};
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{StoreError, StoreResult};

/// One positional record: an ordered list of string fields.
pub type Row = Vec<String>;

const QUOTE: char = '"';

/// True if the field must be quoted to survive a round trip.
fn needs_quotes(field: &str, delimiter: char) -> bool {
    field.chars().any(|c| c == delimiter || c == QUOTE || c == '\r' || c == '\n')
}

/// Append one encoded row (including its terminator) to `out`.
pub fn encode_row(row: &[String], delimiter: u8, out: &mut String) {
    let delimiter = delimiter as char;

    if row.len() == 1 && row[0].is_empty() {
        out.push_str("\"\"\n");
        return;
    }

    for (i, field) in row.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        if needs_quotes(field, delimiter) {
            out.push(QUOTE);
            for c in field.chars() {
                if c == QUOTE {
                    out.push(QUOTE);
                }
                out.push(c);
            }
            out.push(QUOTE);
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Encode a full row set into snapshot text.
pub fn encode_rows(rows: &[Row], delimiter: u8) -> String {
    let mut out = String::with_capacity(rows.len() * 32);
    for row in rows {
        encode_row(row, delimiter, &mut out);
    }
    out
}

/// Stream a full row set into `writer`, one row at a time.
pub fn write_rows<W: Write>(writer: &mut W, rows: &[Row], delimiter: u8) -> io::Result<()> {
    let mut line = String::new();
    for row in rows {
        line.clear();
        encode_row(row, delimiter, &mut line);
        writer.write_all(line.as_bytes())?;
    }
    Ok(())
}

/// Decode snapshot bytes into rows.
pub fn decode_bytes(bytes: &[u8], delimiter: u8) -> StoreResult<Vec<Row>> {
    let text = std::str::from_utf8(bytes).map_err(|e| StoreError::MalformedRow {
        line: Some(line_of_offset(bytes, e.valid_up_to())),
        reason: "snapshot is not valid UTF-8".to_string(),
    })?;
    decode_rows(text, delimiter)
}

/// Decode snapshot text into rows.
pub fn decode_rows(input: &str, delimiter: u8) -> StoreResult<Vec<Row>> {
    let delimiter = delimiter as char;
    let mut chars = input.chars().peekable();
    let mut line = 1usize;
    let mut rows = Vec::new();

    while chars.peek().is_some() {
        rows.push(parse_record(&mut chars, delimiter, &mut line)?);
    }
    Ok(rows)
}

fn parse_record(
    chars: &mut Peekable<Chars<'_>>,
    delimiter: char,
    line: &mut usize,
) -> StoreResult<Row> {
    let mut row = Vec::new();
    let mut only_bare_empty = true;

    loop {
        let (field, quoted) = parse_field(chars, delimiter, line)?;
        only_bare_empty &= !quoted && field.is_empty();
        row.push(field);

        match chars.next() {
            Some(c) if c == delimiter => {
                only_bare_empty = false;
            }
            Some('\n') => {
                *line += 1;
                break;
            }
            Some('\r') if chars.peek() == Some(&'\n') => {
                chars.next();
                *line += 1;
                break;
            }
            None => break,
            Some(c) => {
                return Err(StoreError::MalformedRow {
                    line: Some(*line),
                    reason: format!("unexpected {:?} after closing quote", c),
                });
            }
        }
    }

    // An empty line is a row with no fields
    if row.len() == 1 && only_bare_empty {
        row.clear();
    }
    Ok(row)
}

/// Parse one field, stopping before its terminator. Returns whether it was quoted.
fn parse_field(
    chars: &mut Peekable<Chars<'_>>,
    delimiter: char,
    line: &mut usize,
) -> StoreResult<(String, bool)> {
    let mut field = String::new();

    if chars.peek() == Some(&QUOTE) {
        let opened_at = *line;
        chars.next();
        loop {
            match chars.next() {
                None => {
                    return Err(StoreError::MalformedRow {
                        line: Some(opened_at),
                        reason: "unterminated quoted field".to_string(),
                    });
                }
                Some(QUOTE) => {
                    if chars.peek() == Some(&QUOTE) {
                        chars.next();
                        field.push(QUOTE);
                    } else {
                        return Ok((field, true));
                    }
                }
                Some(c) => {
                    if c == '\n' {
                        *line += 1;
                    }
                    field.push(c);
                }
            }
        }
    }

    while let Some(&c) = chars.peek() {
        if c == delimiter || c == '\n' {
            break;
        }
        if c == '\r' {
            break;
        }
        if c == QUOTE {
            return Err(StoreError::MalformedRow {
                line: Some(*line),
                reason: "quote inside unquoted field".to_string(),
            });
        }
        field.push(c);
        chars.next();
    }
    Ok((field, false))
}

fn line_of_offset(bytes: &[u8], offset: usize) -> usize {
    1 + bytes[..offset].iter().filter(|&&b| b == b'\n').count()
}
