//! Doom 3 MD5 text formats: shared scanning over keyword records.
//!
//! Both file kinds (`.md5mesh`, `.md5anim`) are count-driven: header
//! counts declare how many entries each `{ }` block holds, and entry lines
//! hold parenthesized vector groups whose parens are whitespace-separated
//! tokens. Joint names are double-quoted and may contain spaces; the record
//! reader already unquotes them, including in keyword position.

pub mod anim;
pub mod mesh;

use crate::error::{MeshError, Position, Result};
use crate::math::{Vec2, Vec3};
use crate::record::{Record, RecordReader, Syntax};

pub const MD5_VERSION: i32 = 10;

/// Record stream with block scanning. Scanning to a keyword skips anything
/// else, which makes unknown top-level statements harmless, exactly where
/// the format's own tools are tolerant.
pub(crate) struct Md5Blocks<'a> {
    records: std::iter::Peekable<RecordReader<'a>>,
    last_line: usize,
}

impl<'a> Md5Blocks<'a> {
    pub fn new(src: &'a str) -> Self {
        Md5Blocks {
            records: RecordReader::new(src, Syntax::Md5).peekable(),
            last_line: 0,
        }
    }

    pub fn next_record(&mut self, looking_for: &str) -> Result<Record> {
        match self.records.next() {
            Some(rec) => {
                self.last_line = rec.line;
                Ok(rec)
            }
            None => Err(self.eof(looking_for)),
        }
    }

    pub fn peek_keyword(&mut self) -> Option<&str> {
        self.records.peek().map(|rec| rec.keyword.as_str())
    }

    /// Advance until a record led by `keyword`.
    pub fn scan_to(&mut self, keyword: &str) -> Result<Record> {
        loop {
            let rec = self.next_record(keyword)?;
            if rec.keyword == keyword {
                return Ok(rec);
            }
        }
    }

    /// Scan to a block opener, tolerating the brace on its own line.
    pub fn scan_block(&mut self, keyword: &str) -> Result<Record> {
        let rec = self.scan_to(keyword)?;
        if rec.args.last().map(String::as_str) != Some("{") {
            let brace = self.next_record("{")?;
            if brace.keyword != "{" {
                return Err(brace.malformed(format!(
                    "expected '{{' opening the {} block, found {:?}",
                    keyword, brace.keyword
                )));
            }
        }
        Ok(rec)
    }

    fn eof(&self, looking_for: &str) -> MeshError {
        MeshError::MalformedRecord {
            position: Position::Line(self.last_line),
            message: format!("end of file while looking for {:?}", looking_for),
        }
    }
}

/// Reads `MD5Version` (10 only) and an optional `commandline` that follows.
pub(crate) fn read_md5_header(blocks: &mut Md5Blocks) -> Result<(i32, Option<String>)> {
    let rec = blocks.scan_to("MD5Version")?;
    let version = rec.i32_arg(0)?;
    if version != MD5_VERSION {
        return Err(MeshError::UnsupportedFeature {
            position: rec.position(),
            keyword: format!("MD5Version {}", version),
        });
    }

    let commandline = if blocks.peek_keyword() == Some("commandline") {
        let rec = blocks.next_record("commandline")?;
        rec.args.first().cloned()
    } else {
        None
    };

    Ok((version, commandline))
}

/// Token walker over one record, for entry lines mixing scalars with
/// space-separated paren groups.
pub(crate) struct Cursor<'r> {
    rec: &'r Record,
    tokens: Vec<&'r str>,
    at: usize,
}

impl<'r> Cursor<'r> {
    /// All tokens including the leading one, for lines with no keyword
    /// (bounds, baseframe, frame float rows).
    pub fn full(rec: &'r Record) -> Self {
        let tokens = std::iter::once(rec.keyword.as_str())
            .chain(rec.args.iter().map(String::as_str))
            .collect();
        Cursor { rec, tokens, at: 0 }
    }

    /// Tokens after the keyword.
    pub fn args(rec: &'r Record) -> Self {
        let tokens = rec.args.iter().map(String::as_str).collect();
        Cursor { rec, tokens, at: 0 }
    }

    pub fn done(&self) -> bool {
        self.at >= self.tokens.len()
    }

    fn next(&mut self) -> Result<&'r str> {
        let token = self.tokens.get(self.at).copied().ok_or_else(|| {
            self.rec
                .malformed("line ended early, expected more tokens")
        })?;
        self.at += 1;
        Ok(token)
    }

    pub fn expect(&mut self, expected: &str) -> Result<()> {
        let found = self.next()?;
        if found != expected {
            return Err(self
                .rec
                .malformed(format!("expected {:?}, found {:?}", expected, found)));
        }
        Ok(())
    }

    pub fn f32(&mut self) -> Result<f32> {
        let raw = self.next()?;
        raw.parse::<f32>()
            .map_err(|_| self.rec.malformed(format!("not a float: {:?}", raw)))
    }

    pub fn i32(&mut self) -> Result<i32> {
        let raw = self.next()?;
        raw.parse::<i32>()
            .map_err(|_| self.rec.malformed(format!("not an integer: {:?}", raw)))
    }

    pub fn usize(&mut self) -> Result<usize> {
        let raw = self.next()?;
        raw.parse::<usize>()
            .map_err(|_| self.rec.malformed(format!("not a count: {:?}", raw)))
    }

    /// `( x y z )` with whitespace-separated parens.
    pub fn vec3(&mut self) -> Result<Vec3> {
        self.expect("(")?;
        let v = Vec3::new(self.f32()?, self.f32()?, self.f32()?);
        self.expect(")")?;
        Ok(v)
    }

    /// `( u v )`.
    pub fn vec2(&mut self) -> Result<Vec2> {
        self.expect("(")?;
        let v = Vec2::new(self.f32()?, self.f32()?);
        self.expect(")")?;
        Ok(v)
    }
}
