//! CS-002: Script parsing.
//!
//! Recursive descent over lexer tokens. The grammar is:
//!
//! ```text
//! Script      ← Statement+ EOF
//! Statement   ← Declaration / Expr
//! Declaration ← Identifier '=' Expr
//! Expr        ← Action (Entity)? (Param)*
//! Param       ← Identifier '=' Value
//! Value       ← Item (',' Item)*
//! Item        ← Word / Quoted / {Hole} / $Ref / @Alias
//! ```
//!
//! The parser builds nothing itself: it emits callbacks in document order to
//! a [`ScriptSink`]. [`ScriptBuilder`] is the sink that assembles the AST.

use super::ast::{Declaration, Expression, Script, Statement};
use super::lexer::{tokenize, Token, TokenKind};
use super::registry;
use super::types::{Action, Value};
use std::collections::HashSet;

/// Parse failure at a location, with the nearest token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {col}: {message} (near '{token}')")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub token: String,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, col: usize, token: &str, message: &str) -> Self {
        ParseError {
            line,
            col,
            token: token.to_string(),
            message: message.to_string(),
        }
    }

    fn at(token: &Token, message: &str) -> Self {
        let text = if token.kind == TokenKind::Newline {
            "end of line"
        } else if token.kind == TokenKind::Eof {
            "end of input"
        } else {
            token.text.as_str()
        };
        ParseError::new(token.line, token.col, text, message)
    }
}

/// A parameter value as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// Unquoted text
    Word(String),
    Quoted(String),
    Int(i64),
    List(Vec<String>),
    Hole(String),
    Ref(String),
    Alias(String),
}

/// Receiver of parse events.
pub trait ScriptSink {
    fn begin_declaration(&mut self, ident: &str);
    fn add_action(&mut self, action: Action);
    fn add_entity(&mut self, entity: &str);
    fn add_param_key(&mut self, key: &str);
    fn add_param_value(&mut self, value: ParsedValue);
    fn end_params(&mut self);
}

/// Identifier rule: `[A-Za-z][A-Za-z0-9._-]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

struct Parser<'s, S: ScriptSink> {
    tokens: Vec<Token>,
    pos: usize,
    sink: &'s mut S,
}

impl<S: ScriptSink> Parser<'_, S> {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and pos never passes it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn script(&mut self) -> Result<(), ParseError> {
        self.skip_newlines();
        if self.peek().kind == TokenKind::Eof {
            return Err(ParseError::at(self.peek(), "expected at least one statement"));
        }
        while self.peek().kind != TokenKind::Eof {
            self.statement()?;
            match self.peek().kind {
                TokenKind::Newline => self.skip_newlines(),
                TokenKind::Eof => {}
                _ => return Err(ParseError::at(self.peek(), "expected end of line")),
            }
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<(), ParseError> {
        if self.peek().kind == TokenKind::Word && self.peek_kind_at(1) == TokenKind::Equals {
            let ident = self.advance();
            if !is_identifier(&ident.text) {
                return Err(ParseError::at(&ident, "invalid identifier"));
            }
            self.advance();
            self.sink.begin_declaration(&ident.text);
        }
        self.expr()
    }

    fn expr(&mut self) -> Result<(), ParseError> {
        let tok = self.advance();
        if tok.kind != TokenKind::Word {
            return Err(ParseError::at(&tok, "expected an action"));
        }
        let action =
            Action::parse(&tok.text).ok_or_else(|| ParseError::at(&tok, "unknown action"))?;
        self.sink.add_action(action);

        if self.peek().kind == TokenKind::Word && self.peek_kind_at(1) != TokenKind::Equals {
            let entity = self.advance();
            if !registry::is_entity(&entity.text) {
                return Err(ParseError::at(&entity, "unknown entity"));
            }
            self.sink.add_entity(&entity.text);
        }

        let mut seen = HashSet::new();
        while self.peek().kind == TokenKind::Word {
            let key = self.advance();
            if !is_identifier(&key.text) {
                return Err(ParseError::at(&key, "invalid parameter name"));
            }
            if !seen.insert(key.text.clone()) {
                return Err(ParseError::at(&key, "duplicate parameter"));
            }
            let eq = self.advance();
            if eq.kind != TokenKind::Equals {
                return Err(ParseError::at(&eq, "expected '='"));
            }
            self.sink.add_param_key(&key.text);
            let value = self.value()?;
            self.sink.add_param_value(value);
        }
        self.sink.end_params();
        Ok(())
    }

    fn value(&mut self) -> Result<ParsedValue, ParseError> {
        let first = self.advance();
        let single = match first.kind {
            TokenKind::Word => match first.text.parse::<i64>() {
                Ok(i) if first.text.bytes().all(|b| b.is_ascii_digit()) => ParsedValue::Int(i),
                _ => ParsedValue::Word(first.text.clone()),
            },
            TokenKind::Quoted => ParsedValue::Quoted(first.text.clone()),
            TokenKind::Hole => ParsedValue::Hole(first.text.clone()),
            TokenKind::Ref => ParsedValue::Ref(first.text.clone()),
            TokenKind::Alias => ParsedValue::Alias(first.text.clone()),
            _ => return Err(ParseError::at(&first, "expected a value")),
        };
        if self.peek().kind != TokenKind::Comma {
            return Ok(single);
        }

        let mut items = Vec::new();
        match first.kind {
            TokenKind::Word | TokenKind::Quoted => items.push(first.text),
            _ => return Err(ParseError::at(&first, "lists only hold plain values")),
        }
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            let item = self.advance();
            match item.kind {
                TokenKind::Word | TokenKind::Quoted => items.push(item.text),
                _ => return Err(ParseError::at(&item, "expected a list item")),
            }
        }
        Ok(ParsedValue::List(items))
    }
}

/// Run the parser over `src`, emitting events to `sink`.
pub fn parse_with<S: ScriptSink>(src: &str, sink: &mut S) -> Result<(), ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        sink,
    };
    parser.script()
}

/// Sink that assembles a [`Script`].
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Script,
    pending_ident: Option<String>,
    current: Option<Expression>,
    current_key: Option<String>,
    declared: HashSet<String>,
}

impl ScriptBuilder {
    pub fn finish(self) -> Script {
        self.script
    }
}

impl ScriptSink for ScriptBuilder {
    fn begin_declaration(&mut self, ident: &str) {
        self.pending_ident = Some(ident.to_string());
    }

    fn add_action(&mut self, action: Action) {
        self.current = Some(Expression::new(action, ""));
    }

    fn add_entity(&mut self, entity: &str) {
        if let Some(expr) = self.current.as_mut() {
            expr.entity = entity.to_string();
        }
    }

    fn add_param_key(&mut self, key: &str) {
        self.current_key = Some(key.to_string());
    }

    fn add_param_value(&mut self, value: ParsedValue) {
        let (Some(expr), Some(key)) = (self.current.as_mut(), self.current_key.take()) else {
            return;
        };
        match value {
            ParsedValue::Word(w) if self.declared.contains(&w) => {
                expr.refs.insert(key, w);
            }
            ParsedValue::Word(s) | ParsedValue::Quoted(s) => {
                expr.params.insert(key, Value::Str(s));
            }
            ParsedValue::Int(i) => {
                expr.params.insert(key, Value::Int(i));
            }
            ParsedValue::List(items) => {
                expr.params.insert(key, Value::List(items));
            }
            ParsedValue::Hole(h) => {
                expr.holes.insert(key, h);
            }
            ParsedValue::Ref(r) => {
                expr.refs.insert(key, r);
            }
            ParsedValue::Alias(a) => {
                expr.aliases.insert(key, a);
            }
        }
    }

    fn end_params(&mut self) {
        let Some(expr) = self.current.take() else {
            return;
        };
        let stmt = match self.pending_ident.take() {
            Some(ident) => {
                self.declared.insert(ident.clone());
                Statement::Decl(Declaration { ident, expr })
            }
            None => Statement::Expr(expr),
        };
        self.script.statements.push(stmt);
    }
}

/// Parse script text into an AST.
pub fn parse(src: &str) -> Result<Script, ParseError> {
    let mut builder = ScriptBuilder::default();
    parse_with(src, &mut builder)?;
    Ok(builder.finish())
}

/// Parse a script file from disk.
pub fn parse_file(path: &std::path::Path) -> Result<Script, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cs002_parse_declaration() {
        let s = parse("myvpc = create vpc cidr=10.0.0.0/16 name=prod").unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.statements[0].ident(), Some("myvpc"));
        let e = s.statements[0].expr();
        assert_eq!(e.action, Action::Create);
        assert_eq!(e.entity, "vpc");
        assert_eq!(e.params["cidr"], Value::str("10.0.0.0/16"));
        assert_eq!(e.params["name"], Value::str("prod"));
    }

    #[test]
    fn test_cs002_parse_spec_example() {
        let src = r#"
myvpc   = create vpc cidr=10.0.0.0/16 name=prod
mysub   = create subnet cidr=10.0.1.0/24 vpc={myvpc}
          create instance image=ami-12345 type=t2.micro count=2 subnet=$mysub name=web
          check instance id=$web state=running timeout=300
"#;
        let s = parse(src).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.statements[1].expr().holes["vpc"], "myvpc");
        let inst = s.statements[2].expr();
        assert_eq!(inst.params["count"], Value::Int(2));
        assert_eq!(inst.refs["subnet"], "mysub");
        let check = s.statements[3].expr();
        assert_eq!(check.action, Action::Check);
        assert_eq!(check.refs["id"], "web");
        assert_eq!(check.params["timeout"], Value::Int(300));
    }

    #[test]
    fn test_cs002_parse_lists_with_spaces() {
        let s = parse("create loadbalancer name=lb subnets=sub-1, sub-2,sub-3").unwrap();
        assert_eq!(
            s.statements[0].expr().params["subnets"],
            Value::List(vec!["sub-1".into(), "sub-2".into(), "sub-3".into()])
        );
    }

    #[test]
    fn test_cs002_parse_value_shapes() {
        let s = parse("update securitygroup id=sg-1 cidr=0.0.0.0/0 portrange=22-23 ip=10.0.0.1 size=007").unwrap();
        let e = s.statements[0].expr();
        assert_eq!(e.params["portrange"], Value::str("22-23"));
        assert_eq!(e.params["ip"], Value::str("10.0.0.1"));
        assert_eq!(e.params["size"], Value::Int(7));
    }

    #[test]
    fn test_cs002_bare_identifier_becomes_ref() {
        let s = parse("a = create vpc cidr=10.0.0.0/16\ncreate subnet cidr=10.0.1.0/24 vpc=a").unwrap();
        assert_eq!(s.statements[1].expr().refs["vpc"], "a");
        assert!(s.statements[1].expr().params.get("vpc").is_none());
    }

    #[test]
    fn test_cs002_quoted_identifier_stays_literal() {
        let s = parse("a = create vpc cidr=10.0.0.0/16\ncreate tag resource=vpc-1 key=Name value='a'").unwrap();
        assert_eq!(s.statements[1].expr().params["value"], Value::str("a"));
    }

    #[test]
    fn test_cs002_unquoted_inline_userdata() {
        let s = parse("create instance image=ami-1 type=t2.micro userdata=#echo # boot").unwrap();
        let e = s.statements[0].expr();
        assert_eq!(e.params["userdata"], Value::str("#echo"));
        assert_eq!(e.params.len(), 3);
    }

    #[test]
    fn test_cs002_aliases() {
        let s = parse("create subnet cidr=10.0.1.0/24 vpc=@prod").unwrap();
        assert_eq!(s.statements[0].expr().aliases["vpc"], "prod");
    }

    #[test]
    fn test_cs002_action_without_entity() {
        let s = parse("authenticate").unwrap();
        assert_eq!(s.statements[0].expr().entity, "");
    }

    #[test]
    fn test_cs002_error_unknown_action() {
        let err = parse("create vpc\nfrobnicate vpc").unwrap_err();
        assert_eq!((err.line, err.col), (2, 1));
        assert_eq!(err.token, "frobnicate");
        assert_eq!(err.message, "unknown action");
    }

    #[test]
    fn test_cs002_error_unknown_entity() {
        let err = parse("create spaceship").unwrap_err();
        assert_eq!(err.token, "spaceship");
        assert_eq!(err.col, 8);
    }

    #[test]
    fn test_cs002_error_missing_value() {
        let err = parse("create vpc cidr=").unwrap_err();
        assert_eq!(err.token, "end of input");
    }

    #[test]
    fn test_cs002_error_duplicate_param() {
        let err = parse("create vpc cidr=a cidr=b").unwrap_err();
        assert_eq!(err.message, "duplicate parameter");
    }

    #[test]
    fn test_cs002_error_empty_script() {
        assert!(parse("\n# only a comment\n").is_err());
    }

    #[test]
    fn test_cs002_error_hole_in_list() {
        assert!(parse("create loadbalancer subnets=a,{b}").is_err());
    }

    #[test]
    fn test_cs002_sink_event_order() {
        #[derive(Default)]
        struct Recorder(Vec<String>);
        impl ScriptSink for Recorder {
            fn begin_declaration(&mut self, ident: &str) {
                self.0.push(format!("decl:{}", ident));
            }
            fn add_action(&mut self, action: Action) {
                self.0.push(format!("action:{}", action));
            }
            fn add_entity(&mut self, entity: &str) {
                self.0.push(format!("entity:{}", entity));
            }
            fn add_param_key(&mut self, key: &str) {
                self.0.push(format!("key:{}", key));
            }
            fn add_param_value(&mut self, value: ParsedValue) {
                self.0.push(format!("value:{:?}", value));
            }
            fn end_params(&mut self) {
                self.0.push("end".into());
            }
        }
        let mut rec = Recorder::default();
        parse_with("v = create vpc cidr={c}", &mut rec).unwrap();
        assert_eq!(
            rec.0,
            vec![
                "decl:v",
                "action:create",
                "entity:vpc",
                "key:cidr",
                "value:Hole(\"c\")",
                "end"
            ]
        );
    }

    #[test]
    fn test_cs002_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infra.cs");
        std::fs::write(&path, "create bucket name=logs\n").unwrap();
        let s = parse_file(&path).unwrap();
        assert_eq!(s.statements[0].expr().entity, "bucket");
        assert!(parse_file(&dir.path().join("missing.cs")).is_err());
    }

    #[test]
    fn test_cs002_is_identifier() {
        assert!(is_identifier("my-vpc.1_x"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a b"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_cs002_roundtrip_display(
                name in "[a-z][a-z0-9-]{0,8}",
                cidr in "10\\.[0-9]{1,2}\\.0\\.0/16",
                count in 1i64..1000,
            ) {
                let src = format!("v = create vpc cidr={} name={} \ncreate instance count={} subnet={{sub}} name=$v", cidr, name, count);
                let script = parse(&src).unwrap();
                let reparsed = parse(&script.to_string()).unwrap();
                let a: Vec<_> = script.expressions().collect();
                let b: Vec<_> = reparsed.expressions().collect();
                prop_assert_eq!(a, b);
                prop_assert_eq!(script.clone(), script);
            }
        }
    }
}
