/// Kind of a statement, which determines how it's executed
/// and the shape of its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Returns a result-set.
    Query,
    /// Modifies data or schema, and returns a status.
    Execute,
    /// Runs a longer-lived job which reports progress as log lines.
    Extended,
}

/// Keywords which begin a result-set producing statement.
const QUERY_KEYWORDS: &[&str] = &[
    "DESC", "DESCRIBE", "EXPLAIN", "PRAGMA", "SELECT", "SHOW", "VALUES", "WITH",
];

/// Keywords which introduce the extended clause of a statement.
const EXTENDED_KEYWORDS: &[&str] = &["PREDICT", "TRAIN"];

/// Classified is a statement split into its kind and parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<'s> {
    pub kind: Kind,
    /// Standard SQL portion of the statement.
    /// For Extended statements, this is the SELECT which precedes the extended clause.
    pub standard: &'s str,
    /// Extended clause of an Extended statement, beginning with its keyword.
    /// Empty for other kinds.
    pub extended: &'s str,
}

/// Keywords which a table or column name may follow. An extended keyword
/// following one of these is an identifier, as in `FROM predict`.
const IDENTIFIER_PREFIXES: &[&str] = &[
    "AND", "AS", "BY", "CASE", "DISTINCT", "ELSE", "FROM", "HAVING", "IN", "INTO", "JOIN", "NOT",
    "ON", "OR", "SELECT", "SET", "TABLE", "THEN", "UPDATE", "WHEN", "WHERE",
];

/// Classify a statement by its leading keyword, and by whether it has
/// an extended clause.
pub fn classify(statement: &str) -> Classified<'_> {
    let statement = statement.trim().trim_end_matches(';').trim_end();

    let words = words(statement);
    let leading = words.first().map(|(_, word)| *word).unwrap_or_default();

    if let Some(offset) = extended_offset(statement, &words) {
        return Classified {
            kind: Kind::Extended,
            standard: statement[..offset].trim_end(),
            extended: &statement[offset..],
        };
    }

    let kind = if is_keyword(leading, QUERY_KEYWORDS) {
        Kind::Query
    } else {
        Kind::Execute
    };

    Classified {
        kind,
        standard: statement,
        extended: "",
    }
}

// Find the byte offset of an extended clause of `statement`, if it has one.
//
// A statement which leads with an extended keyword is entirely extended.
// Otherwise the clause must follow the FROM of a leading SELECT or WITH,
// must not be in a position which names a table or column,
// and must be followed by its target or end the statement.
fn extended_offset(statement: &str, words: &[(usize, &str)]) -> Option<usize> {
    let (&(leading_offset, leading), rest) = words.split_first()?;

    if is_keyword(leading, EXTENDED_KEYWORDS) {
        return Some(leading_offset);
    }
    if !leading.eq_ignore_ascii_case("SELECT") && !leading.eq_ignore_ascii_case("WITH") {
        return None;
    }

    let mut after_from = false;
    let mut prev = leading;

    for &(offset, word) in rest {
        if after_from
            && is_keyword(word, EXTENDED_KEYWORDS)
            && !is_keyword(prev, IDENTIFIER_PREFIXES)
            && ends_expression(&statement[..offset])
            && begins_target(&statement[offset + word.len()..])
        {
            return Some(offset);
        }
        after_from |= word.eq_ignore_ascii_case("FROM");
        prev = word;
    }
    None
}

fn is_keyword(word: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| word.eq_ignore_ascii_case(k))
}

// Does `head` end with a complete term, rather than an operator or separator?
fn ends_expression(head: &str) -> bool {
    matches!(
        head.trim_end().bytes().last(),
        Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'_' | b')' | b'\'' | b'"' | b'`')
    )
}

// Does `tail` begin with a target name, or is it empty?
fn begins_target(tail: &str) -> bool {
    if !tail.starts_with(|c: char| c.is_ascii_whitespace()) {
        return tail.is_empty();
    }
    match tail.trim_start().bytes().next() {
        None => true,
        Some(b) => b.is_ascii_alphabetic() || matches!(b, b'_' | b'"' | b'`'),
    }
}

// Split `statement` into its bare words and their byte offsets,
// skipping over quoted literals and identifiers, and comments.
fn words(statement: &str) -> Vec<(usize, &str)> {
    let bytes = statement.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1; // Closing quote.
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2; // Closing `*/`.
            }
            b if b.is_ascii_alphanumeric() || b == b'_' => {
                let begin = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                // Skip qualified name parts, as in `iris.train`.
                if begin == 0 || bytes[begin - 1] != b'.' {
                    out.push((begin, &statement[begin..i]));
                }
            }
            _ => i += 1,
        }
    }
    out
}
