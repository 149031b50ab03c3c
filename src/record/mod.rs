use crate::error::{MeshError, Position, Result};

/// Lexical conventions of the text formats.
///
/// `Obj` covers OBJ and MTL: `#` comments, backslash line continuation,
/// plain whitespace tokens. `Md5` covers both MD5 file kinds: `//` comments,
/// double-quoted tokens that may contain whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Obj,
    Md5,
}

/// One keyword-led statement from a text stream.
///
/// `line` is the 1-based number of the source line the statement started on.
/// `rest` keeps the unsplit remainder after the keyword for keywords whose
/// argument is a free-form string (library file names, quoted command lines).
#[derive(Debug, Clone)]
pub struct Record {
    pub keyword: String,
    pub args: Vec<String>,
    pub rest: String,
    pub line: usize,
}

impl Record {
    pub fn position(&self) -> Position {
        Position::Line(self.line)
    }

    /// Argument at `i`, or `MalformedRecord` naming this statement's line.
    pub fn arg(&self, i: usize) -> Result<&str> {
        self.args.get(i).map(String::as_str).ok_or_else(|| {
            self.malformed(format!(
                "{} expects at least {} argument(s), found {}",
                self.keyword,
                i + 1,
                self.args.len()
            ))
        })
    }

    pub fn f32_arg(&self, i: usize) -> Result<f32> {
        let raw = self.arg(i)?;
        raw.parse::<f32>()
            .map_err(|_| self.malformed(format!("{}: not a float: {:?}", self.keyword, raw)))
    }

    pub fn i32_arg(&self, i: usize) -> Result<i32> {
        let raw = self.arg(i)?;
        raw.parse::<i32>()
            .map_err(|_| self.malformed(format!("{}: not an integer: {:?}", self.keyword, raw)))
    }

    pub fn usize_arg(&self, i: usize) -> Result<usize> {
        let raw = self.arg(i)?;
        raw.parse::<usize>()
            .map_err(|_| self.malformed(format!("{}: not a count: {:?}", self.keyword, raw)))
    }

    pub fn malformed(&self, message: impl Into<String>) -> MeshError {
        MeshError::MalformedRecord {
            position: self.position(),
            message: message.into(),
        }
    }

    pub fn unsupported(&self) -> MeshError {
        MeshError::UnsupportedFeature {
            position: self.position(),
            keyword: self.keyword.clone(),
        }
    }
}

/// Splits a text stream into `Record`s: one per non-blank, non-comment
/// logical line, in source order, single pass. No semantic interpretation.
pub struct RecordReader<'a> {
    lines: std::str::Lines<'a>,
    syntax: Syntax,
    line: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(src: &'a str, syntax: Syntax) -> Self {
        Self {
            lines: src.lines(),
            syntax,
            line: 0,
        }
    }

    fn strip_comment<'b>(&self, line: &'b str) -> &'b str {
        let marker = match self.syntax {
            Syntax::Obj => "#",
            Syntax::Md5 => "//",
        };
        match line.find(marker) {
            Some(idx) => &line[..idx],
            None => line,
        }
    }

    /// Collects one logical line, merging OBJ backslash continuations.
    fn next_logical_line(&mut self) -> Option<(String, usize)> {
        loop {
            let raw = self.lines.next()?;
            self.line += 1;
            let start_line = self.line;

            let mut logical = self.strip_comment(raw).trim_end().to_string();
            if self.syntax == Syntax::Obj {
                while let Some(prefix) = logical.strip_suffix('\\') {
                    let mut merged = prefix.trim_end().to_string();
                    if let Some(next) = self.lines.next() {
                        self.line += 1;
                        merged.push(' ');
                        merged.push_str(self.strip_comment(next).trim_end());
                    }
                    logical = merged;
                }
            }

            if !logical.trim().is_empty() {
                return Some((logical, start_line));
            }
        }
    }

    fn tokenize(&self, s: &str) -> Vec<String> {
        match self.syntax {
            Syntax::Obj => s.split_whitespace().map(str::to_string).collect(),
            Syntax::Md5 => {
                let mut out = Vec::new();
                let mut chars = s.char_indices().peekable();
                while let Some(&(start, c)) = chars.peek() {
                    if c.is_whitespace() {
                        chars.next();
                    } else if c == '"' {
                        chars.next();
                        let mut token = String::new();
                        for (_, qc) in chars.by_ref() {
                            if qc == '"' {
                                break;
                            }
                            token.push(qc);
                        }
                        out.push(token);
                    } else {
                        let mut end = start;
                        while let Some(&(idx, nc)) = chars.peek() {
                            if nc.is_whitespace() || nc == '"' {
                                break;
                            }
                            end = idx + nc.len_utf8();
                            chars.next();
                        }
                        out.push(s[start..end].to_string());
                    }
                }
                out
            }
        }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let (logical, line) = self.next_logical_line()?;
        let trimmed = logical.trim_start();

        // The leading token may itself be quoted in md5 syntax (joint and
        // hierarchy entries start with the quoted bone name).
        let keyword_end = match self.syntax {
            Syntax::Md5 if trimmed.starts_with('"') => trimmed[1..]
                .find('"')
                .map(|i| i + 2)
                .unwrap_or(trimmed.len()),
            _ => trimmed.find(char::is_whitespace).unwrap_or(trimmed.len()),
        };
        let rest = trimmed[keyword_end..].trim().to_string();

        let mut tokens = self.tokenize(trimmed).into_iter();
        let keyword = tokens.next().unwrap_or_default();
        let args: Vec<String> = tokens.collect();

        Some(Record {
            keyword,
            args,
            rest,
            line,
        })
    }
}
