//! CS-002: Lexer. Script text to positioned tokens.
//!
//! Whitespace other than newlines is dropped. Comments start with `#` or
//! `//` at a token boundary and run to the end of the line.

use super::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare run of value characters
    Word,
    /// `"..."` or `'...'`, text holds the unquoted content
    Quoted,
    /// `{name}`, text holds the name
    Hole,
    /// `$name`, text holds the name
    Ref,
    /// `@name`, text holds the name
    Alias,
    Equals,
    Comma,
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub col: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '=' | ',' | '{' | '}' | '"' | '\'')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }
}

/// Tokenize a whole script. The last token is always `Eof`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut cur = Cursor {
        chars: src.chars().peekable(),
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();

    while let Some(c) = cur.peek() {
        let (line, col) = (cur.line, cur.col);
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            col,
        };
        match c {
            '\n' => {
                cur.bump();
                tokens.push(token(TokenKind::Newline, "\n".to_string()));
            }
            c if c.is_whitespace() => {
                cur.bump();
            }
            '#' if tokens.last().map(|t| t.kind) != Some(TokenKind::Equals) => cur.skip_line(),
            '=' => {
                cur.bump();
                tokens.push(token(TokenKind::Equals, "=".to_string()));
            }
            ',' => {
                cur.bump();
                tokens.push(token(TokenKind::Comma, ",".to_string()));
            }
            '{' => {
                cur.bump();
                let name = cur.take_while(is_name_char);
                if cur.peek() != Some('}') || name.is_empty() {
                    let text = format!("{{{}", name);
                    return Err(ParseError::new(line, col, &text, "unterminated hole"));
                }
                cur.bump();
                tokens.push(token(TokenKind::Hole, name));
            }
            '}' => {
                return Err(ParseError::new(line, col, "}", "unexpected '}'"));
            }
            '"' | '\'' => {
                let quote = c;
                cur.bump();
                let text = cur.take_while(|ch| ch != quote && ch != '\n');
                if cur.peek() != Some(quote) {
                    return Err(ParseError::new(line, col, &text, "unterminated quoted string"));
                }
                cur.bump();
                tokens.push(token(TokenKind::Quoted, text));
            }
            '$' | '@' => {
                cur.bump();
                let name = cur.take_while(is_name_char);
                if name.is_empty() {
                    return Err(ParseError::new(line, col, &c.to_string(), "expected a name"));
                }
                let kind = if c == '$' {
                    TokenKind::Ref
                } else {
                    TokenKind::Alias
                };
                tokens.push(token(kind, name));
            }
            _ => {
                let word = cur.take_while(is_word_char);
                if word.starts_with("//") {
                    cur.skip_line();
                    continue;
                }
                tokens.push(token(TokenKind::Word, word));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line: cur.line,
        col: cur.col,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_cs002_simple_command() {
        let toks = tokenize("create vpc cidr=10.0.0.0/16").unwrap();
        let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["create", "vpc", "cidr", "=", "10.0.0.0/16", ""]);
        assert_eq!(toks[4].col, 17);
    }

    #[test]
    fn test_cs002_holes_refs_aliases() {
        assert_eq!(
            kinds("a={x} b=$y c=@z"),
            vec![
                TokenKind::Word,
                TokenKind::Equals,
                TokenKind::Hole,
                TokenKind::Word,
                TokenKind::Equals,
                TokenKind::Ref,
                TokenKind::Word,
                TokenKind::Equals,
                TokenKind::Alias,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_cs002_comments_skipped() {
        assert_eq!(
            kinds("# header\n// other\ncreate vpc # trailing"),
            vec![
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_cs002_hash_after_equals_is_value() {
        let toks = tokenize("userdata=#echo # note").unwrap();
        assert_eq!(toks[2].kind, TokenKind::Word);
        assert_eq!(toks[2].text, "#echo");
        assert_eq!(toks[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_cs002_urls_are_words() {
        let toks = tokenize("userdata=http://host/path").unwrap();
        assert_eq!(toks[2].text, "http://host/path");
    }

    #[test]
    fn test_cs002_quoted_string() {
        let toks = tokenize("value='my web server'").unwrap();
        assert_eq!(toks[2].kind, TokenKind::Quoted);
        assert_eq!(toks[2].text, "my web server");
    }

    #[test]
    fn test_cs002_line_and_column() {
        let toks = tokenize("create vpc\n  delete subnet").unwrap();
        let delete = toks.iter().find(|t| t.text == "delete").unwrap();
        assert_eq!((delete.line, delete.col), (2, 3));
    }

    #[test]
    fn test_cs002_unterminated_hole() {
        let err = tokenize("create vpc cidr={x").unwrap_err();
        assert_eq!((err.line, err.col), (1, 17));
    }

    #[test]
    fn test_cs002_unterminated_quote() {
        assert!(tokenize("name=\"abc").is_err());
    }
}
