//! Source translation in front of Tera.
//!
//! Tera's tag tokens are fixed, so templates written with other delimiters
//! are rewritten to native syntax before parsing:
//!
//! | Written with `L`/`R` | Becomes        |
//! |----------------------|----------------|
//! | `L expr R`           | `{{ expr }}`   |
//! | `L% stmt %R`         | `{% stmt %}`   |
//! | `L# note #R`         | `{# #}`        |
//! | literal `{{`         | `{{ "{{" }}`   |
//!
//! The same pass drops Go-style leading dots (`{{ .NAME }}` reads `NAME`) and
//! records the root variable names each tag refers to. The renderer fills in
//! absent roots under the `zero` missing-key policy and rejects absent
//! required names under `strict`, where Tera alone would treat an undefined
//! name in `{% if X %}` or `X | default(...)` as falsy.
//! Newlines are never added or removed, so Tera's line numbers still match the
//! template source.

use std::collections::BTreeSet;

use super::Delimiters;

const TERA_EXPR: (&str, &str) = ("{{", "}}");
const TERA_STMT: (&str, &str) = ("{%", "%}");
const TERA_COMMENT: (&str, &str) = ("{#", "#}");

/// Words that are never variable names.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "endif", "for", "endfor", "set",
    "set_global", "true", "false", "True", "False", "none", "None", "loop", "self", "super",
    "macro", "endmacro", "block", "endblock", "filter", "endfilter", "raw", "endraw", "include",
    "import", "extends", "as", "with", "break", "continue", "ignore", "missing",
    "__tera_context",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Expression,
    Statement,
    Comment,
}

/// Open/close tokens for the three tag kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    expression: (String, String),
    statement: (String, String),
    comment: (String, String),
}

impl TagSet {
    /// Tags for a delimiter pair. `{{`/`}}` maps to Tera's own tags.
    #[must_use]
    pub fn new(delimiters: &Delimiters) -> Self {
        let (open, close) = (delimiters.open.as_str(), delimiters.close.as_str());
        if (open, close) == TERA_EXPR {
            let owned = |(o, c): (&str, &str)| (o.to_string(), c.to_string());
            return Self {
                expression: owned(TERA_EXPR),
                statement: owned(TERA_STMT),
                comment: owned(TERA_COMMENT),
            };
        }
        Self {
            expression: (open.to_string(), close.to_string()),
            statement: (format!("{open}%"), format!("%{close}")),
            comment: (format!("{open}#"), format!("#{close}")),
        }
    }

    fn tokens(&self, kind: TagKind) -> (&str, &str) {
        let pair = match kind {
            TagKind::Expression => &self.expression,
            TagKind::Statement => &self.statement,
            TagKind::Comment => &self.comment,
        };
        (pair.0.as_str(), pair.1.as_str())
    }

    /// Earliest opener in `text`; the longest token wins a tie.
    fn next_open(&self, text: &str) -> Option<(usize, TagKind)> {
        [TagKind::Expression, TagKind::Statement, TagKind::Comment]
            .into_iter()
            .filter_map(|kind| {
                let open = self.tokens(kind).0;
                text.find(open).map(|idx| (idx, open.len(), kind))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(idx, _, kind)| (idx, kind))
    }
}

/// A tag with no matching close token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclosedTag {
    /// Opening token as written
    pub token: String,
    /// 1-based line of the opening token
    pub line: usize,
}

/// Native Tera source plus the root variable names it refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translated {
    /// Source ready for Tera
    pub source: String,
    /// Top-level names read by expressions and statements
    pub roots: BTreeSet<String>,
    /// Roots that must come from the context. Names bound by the template
    /// itself (`for`, `set`, macro parameters) are left out, and so are names
    /// guarded anywhere by `is defined`; Tera still fails on those if an
    /// unguarded read actually runs
    pub required: BTreeSet<String>,
}

#[derive(Default)]
struct NameScan {
    roots: BTreeSet<String>,
    reads: BTreeSet<String>,
    bound: BTreeSet<String>,
    guarded: BTreeSet<String>,
}

/// Rewrite `source` into native Tera syntax.
pub fn translate(source: &str, tags: &TagSet) -> Result<Translated, UnclosedTag> {
    let mut out = Translated {
        source: String::with_capacity(source.len()),
        ..Translated::default()
    };
    let mut scan = NameScan::default();
    let mut rest = source;
    let mut line = 1;

    while let Some((idx, kind)) = tags.next_open(rest) {
        let (open, close) = tags.tokens(kind);
        let text = &rest[..idx];
        push_literal(&mut out.source, text);
        line += newlines(text);

        let after = &rest[idx + open.len()..];
        let end = find_close(after, close, kind).ok_or_else(|| UnclosedTag {
            token: open.to_string(),
            line,
        })?;
        let inner = &after[..end];

        match kind {
            TagKind::Comment => {
                out.source.push_str(TERA_COMMENT.0);
                out.source.push_str(&"\n".repeat(newlines(inner)));
                out.source.push_str(TERA_COMMENT.1);
            }
            TagKind::Expression | TagKind::Statement => {
                let body = strip_leading_dots(inner);
                collect_roots(&body, kind == TagKind::Statement, &mut scan);
                let (tera_open, tera_close) =
                    if kind == TagKind::Expression { TERA_EXPR } else { TERA_STMT };
                out.source.push_str(tera_open);
                out.source.push_str(&body);
                out.source.push_str(tera_close);
            }
        }

        line += newlines(inner);
        rest = &after[end + close.len()..];
    }

    push_literal(&mut out.source, rest);
    out.required = scan
        .reads
        .iter()
        .filter(|name| !scan.bound.contains(*name) && !scan.guarded.contains(*name))
        .cloned()
        .collect();
    out.roots = scan.roots;
    Ok(out)
}

fn newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

/// Copy literal text, turning any Tera opener into an expression that prints it.
fn push_literal(out: &mut String, text: &str) {
    let mut rest = text;
    while let Some(idx) = rest.find('{') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let escaped = [TERA_EXPR.0, TERA_STMT.0, TERA_COMMENT.0]
            .into_iter()
            .find(|token| tail.starts_with(token));
        match escaped {
            Some(token) => {
                out.push_str("{{ \"");
                out.push_str(token);
                out.push_str("\" }}");
                rest = &tail[token.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
}

/// Byte offset of `close` in `text`, ignoring string literals for code tags.
fn find_close(text: &str, close: &str, kind: TagKind) -> Option<usize> {
    if kind == TagKind::Comment {
        return text.find(close);
    }
    let mut quote: Option<char> = None;
    for (idx, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '"' | '\'' | '`') => quote = Some(c),
            None if text[idx..].starts_with(close) => return Some(idx),
            None => {}
        }
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Drop a `.` that starts a variable reference (`.NAME`), keeping attribute
/// access (`a.b`), numbers and string contents intact.
fn strip_leading_dots(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
                prev = Some(c);
            }
            continue;
        }
        if matches!(c, '"' | '\'' | '`') {
            quote = Some(c);
            out.push(c);
            continue;
        }
        if c == '.'
            && chars.get(i + 1).copied().is_some_and(is_ident_start)
            && !prev.is_some_and(|p| is_ident_char(p) || matches!(p, ')' | ']' | '"' | '\'' | '`'))
        {
            continue;
        }
        out.push(c);
        if !c.is_whitespace() {
            prev = Some(c);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    Punct(char),
    Literal,
}

fn tokenize(body: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if matches!(c, '"' | '\'' | '`') {
            for (_, next) in chars.by_ref() {
                if next == c {
                    break;
                }
            }
            tokens.push(Token::Literal);
        } else if c.is_ascii_digit() {
            while chars.next_if(|(_, n)| is_ident_char(*n) || *n == '.').is_some() {}
            tokens.push(Token::Literal);
        } else if is_ident_start(c) {
            let mut end = start + c.len_utf8();
            while let Some((idx, n)) = chars.next_if(|(_, n)| is_ident_char(*n)) {
                end = idx + n.len_utf8();
            }
            tokens.push(Token::Ident(&body[start..end]));
        } else {
            tokens.push(Token::Punct(c));
        }
    }
    tokens
}

/// Record names read from the template context.
fn collect_roots(body: &str, statement: bool, scan: &mut NameScan) {
    let tokens = tokenize(body);

    // Names bound by the statement itself are not context reads
    let mut bound: BTreeSet<&str> = BTreeSet::new();
    if statement {
        match tokens.first() {
            Some(Token::Ident("for")) => {
                for token in tokens.iter().skip(1) {
                    match token {
                        Token::Ident("in") => break,
                        Token::Ident(name) => {
                            bound.insert(name);
                        }
                        _ => {}
                    }
                }
            }
            Some(Token::Ident("macro")) => {
                for (i, token) in tokens.iter().enumerate().skip(1) {
                    let Token::Ident(name) = token else { continue };
                    let param = i == 1
                        || matches!(tokens.get(i + 1), Some(Token::Punct(',' | ')' | '=')));
                    if param {
                        bound.insert(name);
                    }
                }
            }
            Some(Token::Ident("set" | "set_global" | "filter" | "block")) => {
                if let Some(Token::Ident(name)) = tokens.get(1) {
                    bound.insert(name);
                }
            }
            _ => {}
        }
    }
    scan.bound.extend(bound.iter().map(ToString::to_string));

    for (i, token) in tokens.iter().enumerate() {
        let Token::Ident(name) = token else { continue };
        if KEYWORDS.contains(name) || bound.contains(name) {
            continue;
        }

        let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
        let prev2 = i.checked_sub(2).and_then(|p| tokens.get(p));
        let next = tokens.get(i + 1);
        let next2 = tokens.get(i + 2);

        let attribute_or_filter = matches!(prev, Some(Token::Punct('.' | '|')));
        let call = matches!(next, Some(Token::Punct('(')));
        let keyword_arg =
            matches!(next, Some(Token::Punct('='))) && !matches!(next2, Some(Token::Punct('=')));
        let test_name = matches!(prev, Some(Token::Ident("is")))
            || (matches!(prev, Some(Token::Ident("not"))) && matches!(prev2, Some(Token::Ident("is"))));
        let alias = matches!(prev, Some(Token::Ident("as")));

        if attribute_or_filter || call || keyword_arg || test_name || alias {
            continue;
        }
        scan.roots.insert((*name).to_string());
        if is_definedness_test(&tokens[i + 1..]) {
            scan.guarded.insert((*name).to_string());
        } else {
            scan.reads.insert((*name).to_string());
        }
    }
}

/// Whether `rest` starts with `is [not] defined` or `is [not] undefined`.
fn is_definedness_test(rest: &[Token<'_>]) -> bool {
    match rest {
        [Token::Ident("is"), Token::Ident("not"), Token::Ident(test), ..]
        | [Token::Ident("is"), Token::Ident(test), ..] => matches!(*test, "defined" | "undefined"),
        _ => false,
    }
}
