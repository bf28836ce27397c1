use bstr::{BStr, ByteSlice};

/// The `FromStr` analog for `&[u8]`.
pub trait FromBytes: Sized {
    type Err;

    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Err>;
}

/// A simple extension trait that adds some methods to byte slices.
///
/// `bstr` already gives us most of what we need.
pub trait BytesExt {
    // Not `as_bytes()`, since that conflicts with other methods of the same
    // name.
    fn as_byte_slice(&self) -> &[u8];

    fn parse<T: FromBytes>(&self) -> Result<T, <T as FromBytes>::Err> {
        FromBytes::from_bytes(self.as_byte_slice())
    }
}

impl BytesExt for [u8] {
    fn as_byte_slice(&self) -> &[u8] {
        self
    }
}

/// A borrowed line read from a stream, along with its line number.
#[derive(Clone, Copy, Debug)]
pub struct Line<'a> {
    /// The line number, 1-indexed.
    number: usize,
    /// The full line including its line terminator if present.
    full: &'a BStr,
}

impl<'a> Line<'a> {
    pub fn new(number: usize, full: &'a [u8]) -> Line<'a> {
        Line { number, full: full.as_bstr() }
    }

    /// Return the one-indexed line number of this line.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Return only the content of the line, i.e., the line without its
    /// terminator (if present).
    pub fn content(&self) -> &'a BStr {
        strip_line_terminator(self.full).as_bstr()
    }
}

/// An extension trait for `std::io::BufRead` for reading lines as byte
/// strings.
///
/// This is a stripped down version of what's in `bstr::io`. It exists so
/// that the closure can return an `anyhow::Error` instead of being stuck
/// with `std::io::Error`.
pub trait BufReadExt: std::io::BufRead {
    /// Executes the given closure on each (`\n`|`\r\n`)-terminated line in the
    /// underlying reader.
    ///
    /// Iteration stops early when the closure returns `false` or an error.
    fn for_byte_line<F>(&mut self, mut for_each_line: F) -> anyhow::Result<()>
    where
        Self: Sized,
        F: FnMut(Line<'_>) -> anyhow::Result<bool>,
    {
        let mut number = 0;
        let mut bytes = vec![];
        loop {
            bytes.clear();
            let n = self.read_until(b'\n', &mut bytes)?;
            if n == 0 {
                return Ok(());
            }
            number += 1;
            if !for_each_line(Line::new(number, &bytes))? {
                return Ok(());
            }
        }
    }
}

impl<B: std::io::BufRead> BufReadExt for B {}

fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let Some(line) = line.strip_suffix(b"\n") else { return line };
    line.strip_suffix(b"\r").unwrap_or(line)
}
