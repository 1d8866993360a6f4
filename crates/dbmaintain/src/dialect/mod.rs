//! Script dialects.
//!
//! A [`ScriptDialect`] is a plain record: two block-start predicates, a
//! description of how a procedural block ends, and a couple of lexical
//! switches. Dialects are selected by configuration key through the
//! [`DialectCatalog`](crate::core::DialectCatalog); nothing subclasses anything.
//!
//! # Built-in dialects
//!
//! | key | block starts | block end |
//! |---|---|---|
//! | `postgres` | `CREATE [OR REPLACE] FUNCTION/PROCEDURE`, `DO` | separator after the dollar-quoted body, or `END;` balancing `BEGIN ATOMIC` |
//! | `oracle` | `CREATE [OR REPLACE] FUNCTION/PROCEDURE/PACKAGE/TRIGGER/TYPE`, `DECLARE`, `BEGIN` | line holding only `/` |
//! | `db2` | `CREATE [OR REPLACE] FUNCTION/PROCEDURE/TRIGGER`, `BEGIN` | line holding only `/` |
//! | `mysql` | `CREATE [DEFINER=..] FUNCTION/PROCEDURE/TRIGGER/EVENT` | line holding only `/` |
//! | `mssql` | `CREATE/ALTER [OR ALTER] FUNCTION/PROCEDURE/PROC/TRIGGER` | line holding only `GO` |
//! | `hsqldb`, `h2`, `derby` | none | none |

mod matchers;

use crate::core::identifier::IdentifierCase;

/// Predicate over the statement text accumulated so far, comments and
/// surrounding whitespace removed.
pub type BlockStartPredicate = fn(&str) -> bool;

/// How a procedural block is closed once the parser is inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEnd {
    /// A line holding only `/`. Also ends ordinary statements.
    SlashLine,
    /// A line holding only the keyword (case-insensitive). Also ends ordinary statements.
    KeywordLine(&'static str),
    /// The literal token, case-insensitive, outside quotes and comments.
    Token(&'static str),
    /// The first separator once the dollar-quoted body (`$tag$ ... $tag$`) has closed,
    /// or the separator after the `END` that balances a `BEGIN ATOMIC` body.
    DollarQuotedBody,
    /// The dialect has no procedural blocks.
    None,
}

impl BlockEnd {
    /// Marker line content for line-oriented end markers.
    pub fn line_marker(&self) -> Option<&'static str> {
        match self {
            BlockEnd::SlashLine => Some("/"),
            BlockEnd::KeywordLine(keyword) => Some(keyword),
            _ => None,
        }
    }

    /// True when a separator inside a block is ordinary block content.
    pub fn ignores_separator(&self) -> bool {
        matches!(
            self,
            BlockEnd::SlashLine | BlockEnd::KeywordLine(_) | BlockEnd::Token(_)
        )
    }
}

/// Everything the statement parser needs to know about a dialect.
#[derive(Debug, Clone, Copy)]
pub struct ScriptDialect {
    pub name: &'static str,
    pub is_start_of_plsql_block: BlockStartPredicate,
    pub is_start_of_stored_procedure: BlockStartPredicate,
    pub block_end: BlockEnd,
    /// Backslash escapes the next character inside literals (MySQL).
    pub backslash_escapes: bool,
    /// Case the catalog uses for unquoted identifiers.
    pub identifier_case: IdentifierCase,
}

impl ScriptDialect {
    /// True when the normalized statement so far opens a procedural block.
    pub fn starts_block(&self, statement: &str) -> bool {
        (self.is_start_of_plsql_block)(statement) || (self.is_start_of_stored_procedure)(statement)
    }

    /// Dollar quoting is lexed for dialects whose blocks are dollar-quoted.
    pub fn dollar_quoting(&self) -> bool {
        self.block_end == BlockEnd::DollarQuotedBody
    }

    pub fn postgres() -> Self {
        Self {
            name: "postgres",
            is_start_of_plsql_block: matchers::never,
            is_start_of_stored_procedure: matchers::postgres_function,
            block_end: BlockEnd::DollarQuotedBody,
            backslash_escapes: false,
            identifier_case: IdentifierCase::Lower,
        }
    }

    pub fn oracle() -> Self {
        Self {
            name: "oracle",
            is_start_of_plsql_block: matchers::oracle_plsql_block,
            is_start_of_stored_procedure: matchers::never,
            block_end: BlockEnd::SlashLine,
            backslash_escapes: false,
            identifier_case: IdentifierCase::Upper,
        }
    }

    pub fn db2() -> Self {
        Self {
            name: "db2",
            is_start_of_plsql_block: matchers::begin_block,
            is_start_of_stored_procedure: matchers::create_routine,
            block_end: BlockEnd::SlashLine,
            backslash_escapes: false,
            identifier_case: IdentifierCase::Upper,
        }
    }

    pub fn mysql() -> Self {
        Self {
            name: "mysql",
            is_start_of_plsql_block: matchers::never,
            is_start_of_stored_procedure: matchers::mysql_routine,
            block_end: BlockEnd::SlashLine,
            backslash_escapes: true,
            identifier_case: IdentifierCase::Mixed,
        }
    }

    pub fn mssql() -> Self {
        Self {
            name: "mssql",
            is_start_of_plsql_block: matchers::never,
            is_start_of_stored_procedure: matchers::mssql_routine,
            block_end: BlockEnd::KeywordLine("GO"),
            backslash_escapes: false,
            identifier_case: IdentifierCase::Mixed,
        }
    }

    /// Dialect without procedural blocks (HSQLDB, H2, Derby).
    pub fn plain(name: &'static str) -> Self {
        Self {
            name,
            is_start_of_plsql_block: matchers::never,
            is_start_of_stored_procedure: matchers::never,
            block_end: BlockEnd::None,
            backslash_escapes: false,
            identifier_case: IdentifierCase::Upper,
        }
    }
}
