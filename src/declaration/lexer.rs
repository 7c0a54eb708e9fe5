//! Tokenizer for declaration source
//!
//! Just enough of the TypeScript lexical grammar to walk schema files:
//! identifiers, string and template literals, numbers and punctuation.
//! Comments and whitespace are dropped. Every token keeps its byte span so the
//! reader can quote raw source back (default expressions, index definitions).

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// Single- or double-quoted string, unescaped
    Str(String),
    /// Backtick template literal, raw contents
    Template(String),
    Number(String),
    /// `=>`
    Arrow,
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub span: Range<usize>,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(i) if i == name)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(i) => Some(i),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Tokenize `source`. Never fails: an unterminated literal runs to the end
/// of the input and the reader reports whatever declaration it breaks.
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    let offset = |idx: usize| bytes.get(idx).map(|(o, _)| *o).unwrap_or(source.len());

    while i < bytes.len() {
        let (start, c) = bytes[i];
        let next = bytes.get(i + 1).map(|(_, c)| *c);

        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                while i < bytes.len() && bytes[i].1 != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i].1 == '*' && bytes.get(i + 1).map(|b| b.1) == Some('/')) {
                    if bytes[i].1 == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            '\'' | '"' | '`' => {
                let quote = c;
                let token_line = line;
                let mut value = String::new();
                i += 1;
                while i < bytes.len() && bytes[i].1 != quote {
                    let ch = bytes[i].1;
                    if ch == '\n' {
                        line += 1;
                    }
                    if ch == '\\' && quote != '`' {
                        if let Some((_, escaped)) = bytes.get(i + 1) {
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                            i += 2;
                            continue;
                        }
                    }
                    value.push(ch);
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                let kind = if quote == '`' {
                    TokenKind::Template(value)
                } else {
                    TokenKind::Str(value)
                };
                tokens.push(Token {
                    kind,
                    line: token_line,
                    span: start..offset(i),
                });
            }
            '=' if next == Some('>') => {
                tokens.push(Token {
                    kind: TokenKind::Arrow,
                    line,
                    span: start..offset(i + 2),
                });
                i += 2;
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j].1.is_ascii_digit() || bytes[j].1 == '.' || bytes[j].1 == '_') {
                    j += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Number(source[start..offset(j)].replace('_', "")),
                    line,
                    span: start..offset(j),
                });
                i = j;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j].1.is_alphanumeric() || bytes[j].1 == '_' || bytes[j].1 == '$') {
                    j += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(source[start..offset(j)].to_string()),
                    line,
                    span: start..offset(j),
                });
                i = j;
            }
            other => {
                tokens.push(Token {
                    kind: TokenKind::Punct(other),
                    line,
                    span: start..offset(i + 1),
                });
                i += 1;
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("export const users = pgTable('users', { id: uuid(\"id\") });"),
            vec![
                TokenKind::Ident("export".into()),
                TokenKind::Ident("const".into()),
                TokenKind::Ident("users".into()),
                TokenKind::Punct('='),
                TokenKind::Ident("pgTable".into()),
                TokenKind::Punct('('),
                TokenKind::Str("users".into()),
                TokenKind::Punct(','),
                TokenKind::Punct('{'),
                TokenKind::Ident("id".into()),
                TokenKind::Punct(':'),
                TokenKind::Ident("uuid".into()),
                TokenKind::Punct('('),
                TokenKind::Str("id".into()),
                TokenKind::Punct(')'),
                TokenKind::Punct('}'),
                TokenKind::Punct(')'),
                TokenKind::Punct(';'),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped_and_lines_tracked() {
        let tokens = tokenize("// header\n/* block\n comment */ a\n  b");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[1].line, 4);
    }

    #[test]
    fn test_literals_and_arrow() {
        assert_eq!(
            kinds(r#"() => sql`now()` 'it\'s' 1_000 -5"#),
            vec![
                TokenKind::Punct('('),
                TokenKind::Punct(')'),
                TokenKind::Arrow,
                TokenKind::Ident("sql".into()),
                TokenKind::Template("now()".into()),
                TokenKind::Str("it's".into()),
                TokenKind::Number("1000".into()),
                TokenKind::Number("-5".into()),
            ]
        );
    }

    #[test]
    fn test_spans_quote_source() {
        let source = "index('idx').on(t.a)";
        let tokens = tokenize(source);
        let last = tokens.last().unwrap();
        assert_eq!(&source[tokens[0].span.start..last.span.end], source);
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        let tokens = tokenize("a = 'oops");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Str("oops".into()));
    }
}
