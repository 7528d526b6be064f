//! Minimal Emacs Lisp s-expression reader.
//!
//! Covers the subset that shows up in `.dir-locals.el`: symbols and keywords,
//! integers, strings with backslash escapes, proper and dotted lists, vectors,
//! `'` quoting and `;` line comments.
//!
//! Dotted pairs are normalized while reading, so `(a . (b c))` and `(a b c)`
//! produce the same value.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

/// Deepest nesting of lists, vectors and quotes the reader accepts
pub const MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SexpError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unclosed delimiter opened at byte {offset}")]
    Unclosed { offset: usize },

    #[error("unexpected '{ch}' at byte {offset}")]
    Unexpected { ch: char, offset: usize },

    #[error("misplaced '.' at byte {offset}")]
    MisplacedDot { offset: usize },

    #[error("expected a single form, found trailing input at byte {offset}")]
    TrailingInput { offset: usize },

    #[error("nesting deeper than {MAX_DEPTH} levels at byte {offset}")]
    TooDeep { offset: usize },
}

/// A read Lisp value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    /// Symbols, including keywords (`:foo`), `t` and `nil`
    Symbol(String),
    Str(String),
    Int(i64),
    /// Elements plus an optional improper tail
    List(Vec<Sexp>, Option<Box<Sexp>>),
    Vector(Vec<Sexp>),
}

impl Sexp {
    pub fn nil() -> Self {
        Sexp::List(Vec::new(), None)
    }

    pub fn symbol(name: &str) -> Self {
        Sexp::Symbol(name.to_string())
    }

    pub fn is_nil(&self) -> bool {
        match self {
            Sexp::Symbol(name) => name == "nil",
            Sexp::List(items, None) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Sexp::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexp::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Strip a leading `'` / `(quote ...)`
    pub fn unquote(&self) -> &Sexp {
        if let Sexp::List(items, None) = self {
            if items.len() == 2 && items[0].as_symbol() == Some("quote") {
                return items[1].unquote();
            }
        }
        self
    }

    pub fn car(&self) -> Option<&Sexp> {
        match self {
            Sexp::List(items, _) => items.first(),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<Sexp> {
        match self {
            Sexp::List(items, tail) if !items.is_empty() => {
                if items.len() == 1 {
                    Some(tail.as_deref().cloned().unwrap_or_else(Sexp::nil))
                } else {
                    Some(Sexp::List(items[1..].to_vec(), tail.clone()))
                }
            }
            _ => None,
        }
    }

    /// Elements of a proper list; `nil` is the empty list
    pub fn list_items(&self) -> Option<&[Sexp]> {
        match self.unquote() {
            Sexp::List(items, None) => Some(items.as_slice()),
            s if s.is_nil() => Some(&[][..]),
            _ => None,
        }
    }

    /// Value of `key` in a property list (`(:a 1 :b 2)`)
    pub fn plist_get(&self, key: &str) -> Option<&Sexp> {
        self.list_items()?
            .chunks(2)
            .find(|pair| pair[0].as_symbol() == Some(key))
            .and_then(|pair| pair.get(1))
    }

    /// Value of `key` in an association list (`((a . 1) (b . 2))`)
    pub fn alist_get(&self, key: &str) -> Option<Sexp> {
        self.list_items()?
            .iter()
            .find(|entry| entry.car().and_then(Sexp::as_symbol) == Some(key))
            .and_then(Sexp::cdr)
    }

    /// Every entry of an association list, as `(key, value)` pairs
    pub fn alist_entries(&self) -> Vec<(&Sexp, Sexp)> {
        self.list_items()
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| Some((entry.car()?, entry.cdr()?)))
            .collect()
    }
}

/// Quote `s` as an Emacs Lisp string literal
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Read exactly one form, ignoring surrounding comments and whitespace
pub fn read(source: &str) -> Result<Sexp, SexpError> {
    let mut reader = Reader::new(source);
    let form = reader.next_form()?.ok_or(SexpError::UnexpectedEof)?;
    reader.skip_trivia();
    if let Some(&(offset, _)) = reader.chars.peek() {
        return Err(SexpError::TrailingInput { offset });
    }
    Ok(form)
}

struct Reader<'a> {
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            depth: 0,
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else if c == ';' {
                while let Some((_, c)) = self.chars.next() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_form(&mut self) -> Result<Option<Sexp>, SexpError> {
        self.skip_trivia();
        let Some(&(offset, c)) = self.chars.peek() else {
            return Ok(None);
        };

        let form = match c {
            '(' => {
                self.chars.next();
                self.nested(offset, |r| r.read_list(offset))?
            }
            '[' => {
                self.chars.next();
                self.nested(offset, |r| r.read_vector(offset))?
            }
            ')' | ']' => return Err(SexpError::Unexpected { ch: c, offset }),
            '"' => {
                self.chars.next();
                self.read_string(offset)?
            }
            '\'' => {
                self.chars.next();
                let quoted = self.nested(offset, Self::expect_form)?;
                Sexp::List(vec![Sexp::symbol("quote"), quoted], None)
            }
            _ => self.read_atom(),
        };
        Ok(Some(form))
    }

    fn nested<F>(&mut self, offset: usize, read: F) -> Result<Sexp, SexpError>
    where
        F: FnOnce(&mut Self) -> Result<Sexp, SexpError>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(SexpError::TooDeep { offset });
        }
        self.depth += 1;
        let form = read(self);
        self.depth -= 1;
        form
    }

    fn expect_form(&mut self) -> Result<Sexp, SexpError> {
        self.next_form()?.ok_or(SexpError::UnexpectedEof)
    }

    fn read_list(&mut self, open: usize) -> Result<Sexp, SexpError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.chars.peek().copied() {
                None => return Err(SexpError::Unclosed { offset: open }),
                Some((_, ')')) => {
                    self.chars.next();
                    return Ok(Sexp::List(items, None));
                }
                Some((offset, '.')) if self.at_lone_dot() => {
                    self.chars.next();
                    if items.is_empty() {
                        return Err(SexpError::MisplacedDot { offset });
                    }
                    let tail = self.expect_form()?;
                    self.skip_trivia();
                    match self.chars.next() {
                        Some((_, ')')) => {}
                        Some((offset, ch)) => return Err(SexpError::Unexpected { ch, offset }),
                        None => return Err(SexpError::Unclosed { offset: open }),
                    }
                    return Ok(match tail {
                        Sexp::List(rest, rest_tail) => {
                            items.extend(rest);
                            Sexp::List(items, rest_tail)
                        }
                        tail if tail.is_nil() => Sexp::List(items, None),
                        tail => Sexp::List(items, Some(Box::new(tail))),
                    });
                }
                Some(_) => items.push(self.expect_form()?),
            }
        }
    }

    fn read_vector(&mut self, open: usize) -> Result<Sexp, SexpError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.chars.peek().copied() {
                None => return Err(SexpError::Unclosed { offset: open }),
                Some((_, ']')) => {
                    self.chars.next();
                    return Ok(Sexp::Vector(items));
                }
                Some((offset, ')')) => return Err(SexpError::Unexpected { ch: ')', offset }),
                Some(_) => items.push(self.expect_form()?),
            }
        }
    }

    fn read_string(&mut self, open: usize) -> Result<Sexp, SexpError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(SexpError::Unclosed { offset: open }),
                Some((_, '"')) => return Ok(Sexp::Str(out)),
                Some((_, '\\')) => match self.chars.next() {
                    None => return Err(SexpError::Unclosed { offset: open }),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    // Escaped newline is a line continuation
                    Some((_, '\n')) => {}
                    Some((_, c)) => out.push(c),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn read_atom(&mut self) -> Sexp {
        let mut token = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if is_delimiter(c) {
                break;
            }
            token.push(c);
            self.chars.next();
        }
        match token.parse::<i64>() {
            Ok(n) => Sexp::Int(n),
            Err(_) => Sexp::Symbol(token),
        }
    }

    /// A `.` followed by a delimiter is the dotted-pair marker, not a symbol
    fn at_lone_dot(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        match ahead.peek() {
            None => true,
            Some(&(_, c)) => is_delimiter(c),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Sexp {
        Sexp::symbol(name)
    }

    #[test]
    fn test_read_atoms() {
        assert_eq!(read("foo").unwrap(), sym("foo"));
        assert_eq!(read(":rust-analyzer").unwrap(), sym(":rust-analyzer"));
        assert_eq!(read("42").unwrap(), Sexp::Int(42));
        assert_eq!(read("-7").unwrap(), Sexp::Int(-7));
        assert_eq!(
            read(r#""a \"quoted\" \\ path\n""#).unwrap(),
            Sexp::Str("a \"quoted\" \\ path\n".to_string())
        );
    }

    #[test]
    fn test_dotted_pairs_are_normalized() {
        let dotted = read("(a . (b c))").unwrap();
        let proper = read("(a b c)").unwrap();
        assert_eq!(dotted, proper);

        let pair = read(r#"(target . "x")"#).unwrap();
        assert_eq!(pair.car(), Some(&sym("target")));
        assert_eq!(pair.cdr(), Some(Sexp::Str("x".to_string())));

        assert_eq!(read("(a . nil)").unwrap(), read("(a)").unwrap());
    }

    #[test]
    fn test_comments_and_quote() {
        let form = read(
            ";;; header comment\n\
             '((nil . ((fill-column . 80)))) ; trailing\n",
        )
        .unwrap();
        let entries = form.alist_entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].0.is_nil());
        assert_eq!(entries[0].1.alist_get("fill-column"), Some(Sexp::Int(80)));
    }

    #[test]
    fn test_plist_get() {
        let form = read(r#"(:target "wasm32" :features ["web"])"#).unwrap();
        assert_eq!(form.plist_get(":target").and_then(Sexp::as_str), Some("wasm32"));
        assert_eq!(
            form.plist_get(":features"),
            Some(&Sexp::Vector(vec![Sexp::Str("web".to_string())]))
        );
        assert_eq!(form.plist_get(":missing"), None);
    }

    #[test]
    fn test_symbols_containing_dots() {
        assert_eq!(read("(a .b)").unwrap(), Sexp::List(vec![sym("a"), sym(".b")], None));
    }

    #[test]
    fn test_read_errors() {
        assert_eq!(read(""), Err(SexpError::UnexpectedEof));
        assert_eq!(read("(a b"), Err(SexpError::Unclosed { offset: 0 }));
        assert_eq!(read(")"), Err(SexpError::Unexpected { ch: ')', offset: 0 }));
        assert_eq!(read("( . a)"), Err(SexpError::MisplacedDot { offset: 2 }));
        assert_eq!(read("(a . b c)"), Err(SexpError::Unexpected { ch: 'c', offset: 7 }));
        assert_eq!(read("a b"), Err(SexpError::TrailingInput { offset: 2 }));
        assert_eq!(read("\"open"), Err(SexpError::Unclosed { offset: 0 }));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        assert_eq!(
            read(&"(".repeat(100_000)),
            Err(SexpError::TooDeep { offset: MAX_DEPTH })
        );
        assert!(matches!(
            read(&"[".repeat(100_000)),
            Err(SexpError::TooDeep { .. })
        ));
        let quotes = format!("{}a", "'".repeat(100_000));
        assert!(matches!(read(&quotes), Err(SexpError::TooDeep { .. })));
    }

    #[test]
    fn test_nesting_up_to_limit_reads() {
        let source = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(read(&source).is_ok());

        let source = format!("{}a{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(matches!(read(&source), Err(SexpError::TooDeep { .. })));
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("plain"), "\"plain\"");
        assert_eq!(quote_string(r#"C:\dir "x""#), r#""C:\\dir \"x\"""#);
        assert_eq!(read(&quote_string("a\\b\"c")).unwrap(), Sexp::Str("a\\b\"c".to_string()));
    }
}
