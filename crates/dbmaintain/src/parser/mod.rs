//! Statement-boundary parser.
//!
//! Splits script content into the statements handed to the script runner. The
//! scanner is single pass and tracks just enough lexical state to know whether
//! a `;` is a terminator: line and block comments, single-quoted literals,
//! double-quoted identifiers, dollar-quoted bodies (PostgreSQL) and procedural
//! blocks.
//!
//! When a `;` is reached in plain text the statement so far (comments removed,
//! trimmed) is offered to the dialect's block-start predicates. On a match the
//! parser stays in block mode until the dialect's [`BlockEnd`] marker, so the
//! separators inside a procedure body are kept. A PostgreSQL routine with a
//! SQL-standard `BEGIN ATOMIC` body has no dollar quotes to close, so it stays
//! in block mode until the `END` that balances its `BEGIN`.
//!
//! Anything left open at end of input is a [`MaintainError::Parse`] carrying
//! the line and byte offset where the construct began.

use tracing::trace;

use crate::dialect::{BlockEnd, ScriptDialect};
use crate::error::{MaintainError, Result};

/// Splits scripts into statements for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementParser<'a> {
    dialect: &'a ScriptDialect,
}

impl<'a> StatementParser<'a> {
    pub fn new(dialect: &'a ScriptDialect) -> Self {
        Self { dialect }
    }

    /// Split `content` into statements. `script` names the script in errors.
    ///
    /// Statements ended by `;` do not include it. Statements ended by a marker
    /// line (`/`, `GO`) keep their content verbatim, marker excluded.
    /// Comment-only fragments are dropped.
    pub fn parse(&self, script: &str, content: &str) -> Result<Vec<String>> {
        Scanner::new(self.dialect, script, content).run()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Plain,
    LineComment,
    BlockComment,
    SingleQuoted,
    DoubleQuoted,
    DollarQuoted,
}

impl State {
    fn describe(&self) -> &'static str {
        match self {
            State::Plain => "statement",
            State::LineComment => "line comment",
            State::BlockComment => "block comment",
            State::SingleQuoted => "string literal",
            State::DoubleQuoted => "quoted identifier",
            State::DollarQuoted => "dollar-quoted body",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Position {
    line: usize,
    offset: usize,
}

struct Scanner<'a> {
    dialect: &'a ScriptDialect,
    script: &'a str,
    content: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
    state: State,
    /// Where the current quote or comment opened.
    opened_at: Position,
    /// Opening `$tag$` of the current dollar-quoted body.
    dollar_tag: String,
    /// Where the current statement began.
    statement_at: Option<Position>,
    /// Set while inside a procedural block; holds where the block began.
    block_at: Option<Position>,
    /// Statement text as written.
    raw: String,
    /// Statement text with comments blanked, fed to the predicates.
    code: String,
    /// Statement text outside quotes, literals and comments.
    bare: String,
    /// Inside a `BEGIN ATOMIC` routine body.
    atomic: bool,
    statements: Vec<String>,
}

impl<'a> Scanner<'a> {
    fn new(dialect: &'a ScriptDialect, script: &'a str, content: &'a str) -> Self {
        Self {
            dialect,
            script,
            content,
            chars: content.char_indices().collect(),
            pos: 0,
            line: 1,
            state: State::Plain,
            opened_at: Position { line: 1, offset: 0 },
            dollar_tag: String::new(),
            statement_at: None,
            block_at: None,
            raw: String::new(),
            code: String::new(),
            bare: String::new(),
            atomic: false,
            statements: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<String>> {
        while let Some(c) = self.current() {
            match self.state {
                State::Plain => self.plain(c),
                State::LineComment => {
                    self.take(false);
                    if c == '\n' {
                        self.code.push('\n');
                        self.state = State::Plain;
                    }
                }
                State::BlockComment => {
                    if c == '*' && self.peek(1) == Some('/') {
                        self.take_n(2, false);
                        self.code.push(' ');
                        self.state = State::Plain;
                    } else {
                        self.take(false);
                    }
                }
                State::SingleQuoted => self.quoted('\'', self.dialect.backslash_escapes),
                State::DoubleQuoted => self.quoted('"', false),
                State::DollarQuoted => {
                    if c == '$' && self.rest().starts_with(self.dollar_tag.as_str()) {
                        let len = self.dollar_tag.chars().count();
                        self.take_n(len, true);
                        self.state = State::Plain;
                    } else {
                        self.take(true);
                    }
                }
            }
        }

        self.finish_input()
    }

    fn plain(&mut self, c: char) {
        if self.at_line_start() && self.line_marker() {
            return;
        }

        match c {
            '-' if self.peek(1) == Some('-') => {
                self.open(State::LineComment);
                self.take_n(2, false);
            }
            '/' if self.peek(1) == Some('*') => {
                self.open(State::BlockComment);
                self.take_n(2, false);
                self.code.push(' ');
            }
            '\'' => {
                self.open(State::SingleQuoted);
                self.take(true);
            }
            '"' => {
                self.open(State::DoubleQuoted);
                self.take(true);
            }
            '$' if self.dialect.dollar_quoting() => match self.dollar_tag_here() {
                Some(tag) => {
                    self.open(State::DollarQuoted);
                    let len = tag.chars().count();
                    self.dollar_tag = tag;
                    self.take_n(len, true);
                }
                None => self.take(true),
            },
            ';' => self.separator(),
            _ => self.take(true),
        }

        if self.state == State::Plain && self.block_at.is_some() {
            if let BlockEnd::Token(token) = self.dialect.block_end {
                if ends_with_ignore_case(&self.code, token) {
                    self.finish_statement();
                }
            }
        }
    }

    fn quoted(&mut self, quote: char, backslash_escapes: bool) {
        let c = self.chars[self.pos].1;
        if backslash_escapes && c == '\\' {
            self.take(true);
            if self.current().is_some() {
                self.take(true);
            }
        } else if c == quote {
            self.take(true);
            if self.current() == Some(quote) {
                // doubled quote is an escaped quote
                self.take(true);
            } else {
                self.state = State::Plain;
            }
        } else {
            self.take(true);
        }
    }

    /// A `;` in plain text.
    fn separator(&mut self) {
        if self.block_at.is_none() && self.dialect.starts_block(self.code.trim()) {
            trace!(
                "{}: procedural block starts at line {}",
                self.script,
                self.statement_at.map(|p| p.line).unwrap_or(self.line)
            );
            self.block_at = Some(self.statement_at.unwrap_or(Position {
                line: self.line,
                offset: self.chars[self.pos].0,
            }));
            self.atomic = self.dialect.dollar_quoting() && opens_atomic_body(&self.bare);
        }

        let in_block = self.block_at.is_some()
            && (self.dialect.block_end.ignores_separator()
                || (self.atomic && block_depth(&self.bare) > 0));
        if in_block {
            self.take(true);
        } else {
            // the terminator itself is not part of the statement
            self.pos += 1;
            self.finish_statement();
        }
    }

    /// Handle a line holding only the dialect's end marker (`/`, `GO`).
    fn line_marker(&mut self) -> bool {
        let Some(marker) = self.dialect.block_end.line_marker() else {
            return false;
        };
        let rest = self.rest();
        let line_len = rest.find('\n').unwrap_or(rest.len());
        if !rest[..line_len].trim().eq_ignore_ascii_case(marker) {
            return false;
        }

        self.finish_statement();
        let end = self.chars[self.pos].0 + line_len;
        while self.current().is_some() && self.chars[self.pos].0 < end {
            self.pos += 1;
        }
        if self.current() == Some('\n') {
            self.pos += 1;
            self.line += 1;
        }
        true
    }

    fn finish_statement(&mut self) {
        let statement = self.raw.trim();
        if !self.code.trim().is_empty() {
            self.statements.push(statement.to_string());
        }
        self.raw.clear();
        self.code.clear();
        self.bare.clear();
        self.statement_at = None;
        self.block_at = None;
        self.atomic = false;
    }

    fn finish_input(mut self) -> Result<Vec<String>> {
        match self.state {
            State::Plain | State::LineComment => {}
            open => return Err(self.unterminated(open.describe(), self.opened_at)),
        }
        if let Some(at) = self.block_at {
            return Err(self.unterminated("procedural block", at));
        }
        self.finish_statement();
        Ok(self.statements)
    }

    fn unterminated(&self, construct: &str, at: Position) -> MaintainError {
        MaintainError::Parse {
            script: self.script.to_string(),
            line: at.line,
            offset: at.offset,
            construct: construct.to_string(),
        }
    }

    fn open(&mut self, state: State) {
        self.opened_at = self.here();
        self.state = state;
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            offset: self.chars[self.pos].0,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn rest(&self) -> &'a str {
        let content = self.content;
        match self.chars.get(self.pos) {
            Some(&(offset, _)) => &content[offset..],
            None => "",
        }
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.chars[self.pos - 1].1 == '\n'
    }

    /// Consume one character into the statement; `code` excludes comments.
    fn take(&mut self, code: bool) {
        let (offset, c) = self.chars[self.pos];
        if self.statement_at.is_none() && !c.is_whitespace() {
            self.statement_at = Some(Position {
                line: self.line,
                offset,
            });
        }
        self.raw.push(c);
        if code {
            self.code.push(c);
            if self.state == State::Plain {
                self.bare.push(c);
            }
        }
        if c == '\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn take_n(&mut self, n: usize, code: bool) {
        for _ in 0..n {
            if self.current().is_none() {
                break;
            }
            self.take(code);
        }
    }

    /// `$tag$` starting at the current position, if any.
    fn dollar_tag_here(&self) -> Option<String> {
        if self.pos > 0 {
            let prev = self.chars[self.pos - 1].1;
            if prev.is_alphanumeric() || prev == '_' || prev == '$' {
                return None;
            }
        }
        let rest = self.rest();
        let body = &rest[1..];
        let end = body.find('$')?;
        let tag = &body[..end];
        let valid = tag
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c.is_alphabetic() || (i > 0 && c.is_ascii_digit()));
        valid.then(|| format!("${}$", tag))
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
}

/// True when `BEGIN ATOMIC` appears as two consecutive words.
fn opens_atomic_body(bare: &str) -> bool {
    let mut previous = "";
    for word in words(bare) {
        if previous.eq_ignore_ascii_case("BEGIN") && word.eq_ignore_ascii_case("ATOMIC") {
            return true;
        }
        previous = word;
    }
    false
}

/// Open `BEGIN`/`CASE` keywords not yet closed by `END`.
fn block_depth(bare: &str) -> i32 {
    words(bare).fold(0, |depth, word| {
        if word.eq_ignore_ascii_case("BEGIN") || word.eq_ignore_ascii_case("CASE") {
            depth + 1
        } else if word.eq_ignore_ascii_case("END") {
            depth - 1
        } else {
            depth
        }
    })
}

fn ends_with_ignore_case(text: &str, token: &str) -> bool {
    let text = text.trim_end();
    text.len() >= token.len()
        && text.is_char_boundary(text.len() - token.len())
        && text[text.len() - token.len()..].eq_ignore_ascii_case(token)
}
