//! Block-start predicates for the built-in dialects.
//!
//! Each predicate receives the statement accumulated so far with comments and
//! surrounding whitespace removed, so anchoring on `^` is enough.

use std::sync::LazyLock;

use regex::Regex;

fn pattern(source: &str) -> Regex {
    // Patterns are literals below; a failure here is a programming error caught by the tests.
    Regex::new(source).unwrap_or_else(|e| panic!("invalid block-start pattern {source}: {e}"))
}

static POSTGRES_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^(CREATE\s+(OR\s+REPLACE\s+)?(FUNCTION|PROCEDURE)\b|DO\b)")
});

static ORACLE_PLSQL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)^(CREATE\s+(OR\s+REPLACE\s+)?((NON)?EDITIONABLE\s+)?(FUNCTION|PROCEDURE|PACKAGE|TRIGGER|TYPE)\b|DECLARE\b|BEGIN\b)",
    )
});

static CREATE_ROUTINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^CREATE\s+(OR\s+REPLACE\s+)?(FUNCTION|PROCEDURE|TRIGGER)\b")
});

static BEGIN_BLOCK: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)^BEGIN\b"));

static MYSQL_ROUTINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^CREATE\s+(DEFINER\s*=\s*\S+\s+)?(FUNCTION|PROCEDURE|TRIGGER|EVENT)\b")
});

static MSSQL_ROUTINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^(CREATE|ALTER|CREATE\s+OR\s+ALTER)\s+(FUNCTION|PROCEDURE|PROC|TRIGGER)\b")
});

pub fn never(_statement: &str) -> bool {
    false
}

pub fn postgres_function(statement: &str) -> bool {
    POSTGRES_FUNCTION.is_match(statement)
}

pub fn oracle_plsql_block(statement: &str) -> bool {
    ORACLE_PLSQL.is_match(statement)
}

pub fn create_routine(statement: &str) -> bool {
    CREATE_ROUTINE.is_match(statement)
}

pub fn begin_block(statement: &str) -> bool {
    BEGIN_BLOCK.is_match(statement)
}

pub fn mysql_routine(statement: &str) -> bool {
    MYSQL_ROUTINE.is_match(statement)
}

pub fn mssql_routine(statement: &str) -> bool {
    MSSQL_ROUTINE.is_match(statement)
}
