//! Lexer for tern source code.
//!
//! Raw tokens come from a logos-generated scanner. [`Lexer`] wraps it to
//! add the context-dependent rules logos cannot express on its own:
//!
//! - `-f` is the file-test operator only when it is not the start of `-foo`
//! - an identifier naming a known shell command at the start of a
//!   statement swallows the rest of the command line
//! - the end of input is reported as an `Eof` token forever

use std::fmt;
use std::ops::Range;

use logos::Logos;

use crate::commands::CommandTable;

/// Byte range of a token in the source.
pub type Span = Range<usize>;

/// Words the lexer never treats as identifiers or commands.
pub const KEYWORDS: &[&str] = &[
    "var", "func", "true", "false", "if", "else", "return", "for", "go", "chan", "break", "int",
    "string", "bool", "any", "nil",
];

/// Token kinds.
///
/// Variants without a logos attribute are produced by [`Lexer`] itself.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r]+")]
pub enum TokenKind {
    Illegal,
    Eof,
    /// An implicit shell command line (`ls -la`).
    Command,
    /// The `-f` file-test operator.
    FileTest,

    #[regex(r"#[^\n]*", allow_greedy = true)]
    Comment,
    #[token("\n")]
    Newline,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r#""[^"]*"?"#)]
    String,
    /// `$( … )` with a balanced body.
    #[token("$(", lex_shell_body)]
    ShellExpr,
    /// `$1`, `$2`, …
    #[regex(r"\$[0-9]+")]
    Positional,
    /// `$HOME`, `$USER`, …
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*")]
    EnvVar,

    #[token("=")]
    Assign,
    #[token(":=")]
    Declare,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("!")]
    Bang,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("<-")]
    Arrow,

    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token("var")]
    Var,
    #[token("func")]
    Func,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("return")]
    Return,
    #[token("for")]
    For,
    #[token("go")]
    Go,
    #[token("chan")]
    Chan,
    #[token("break")]
    Break,
    #[token("int")]
    #[token("string")]
    #[token("bool")]
    #[token("any")]
    #[token("nil")]
    TypeName,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
            TokenKind::Command => "COMMAND",
            TokenKind::FileTest => "-f",
            TokenKind::Comment => "COMMENT",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Ident => "IDENT",
            TokenKind::Int => "INT",
            TokenKind::String => "STRING",
            TokenKind::ShellExpr => "$(",
            TokenKind::Positional => "POSITIONAL",
            TokenKind::EnvVar => "ENVVAR",
            TokenKind::Assign => "=",
            TokenKind::Declare => ":=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Bang => "!",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Arrow => "<-",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Var => "var",
            TokenKind::Func => "func",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Return => "return",
            TokenKind::For => "for",
            TokenKind::Go => "go",
            TokenKind::Chan => "chan",
            TokenKind::Break => "break",
            TokenKind::TypeName => "TYPE",
        };
        f.write_str(s)
    }
}

/// Consume the body of `$(` up to its balanced `)`.
///
/// An unterminated body runs to end of input.
fn lex_shell_body(lex: &mut logos::Lexer<TokenKind>) {
    let mut depth = 1usize;
    for (idx, ch) in lex.remainder().char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(idx + 1);
                    return;
                }
            }
            _ => {}
        }
    }
    let rest = lex.remainder().len();
    lex.bump(rest);
}

/// A token with its literal text and source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal text. For strings, shell bodies, `$N` and `$NAME` this is the
    /// payload without delimiters.
    pub literal: String,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, literal: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            literal: literal.into(),
            span,
        }
    }
}

/// Characters after a command name that mean "this is not a command line".
const NOT_A_COMMAND: &[char] = &['(', '=', ':', '<', '[', '.'];

/// Streaming lexer. Call [`Lexer::next_token`] until it returns `Eof`.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    commands: &'a CommandTable,
    statement_start: bool,
    eof: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, commands: &'a CommandTable) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            commands,
            statement_start: true,
            eof: source.len(),
        }
    }

    /// Produce the next token. Returns `Eof` indefinitely at end of input.
    pub fn next_token(&mut self) -> Token {
        let Some(result) = self.inner.next() else {
            return Token::new(TokenKind::Eof, "", self.eof..self.eof);
        };

        let span = self.inner.span();
        let slice = self.inner.slice();
        let token = match result {
            Ok(TokenKind::Minus) if self.file_test_follows() => {
                self.inner.bump(1);
                Token::new(TokenKind::FileTest, "-f", span.start..span.end + 1)
            }
            Ok(TokenKind::Ident) if self.statement_start && self.is_command(slice) => {
                self.command_line(span)
            }
            Ok(TokenKind::String) => {
                let body = slice.strip_prefix('"').unwrap_or(slice);
                let body = body.strip_suffix('"').unwrap_or(body);
                Token::new(TokenKind::String, body, span)
            }
            Ok(TokenKind::ShellExpr) => {
                let body = slice.strip_prefix("$(").unwrap_or(slice);
                let body = body.strip_suffix(')').unwrap_or(body);
                Token::new(TokenKind::ShellExpr, body, span)
            }
            Ok(kind @ (TokenKind::Positional | TokenKind::EnvVar)) => {
                Token::new(kind, slice.trim_start_matches('$'), span)
            }
            Ok(kind) => Token::new(kind, slice, span),
            Err(()) => Token::new(TokenKind::Illegal, slice, span),
        };

        self.statement_start = matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::LBrace | TokenKind::RBrace
        );
        token
    }

    /// `-` directly followed by an `f` that does not continue an identifier.
    fn file_test_follows(&self) -> bool {
        let mut rest = self.inner.remainder().chars();
        rest.next() == Some('f') && !rest.next().is_some_and(is_ident_char)
    }

    fn is_command(&self, name: &str) -> bool {
        if !self.commands.contains(name) {
            return false;
        }
        let next = self
            .inner
            .remainder()
            .chars()
            .find(|c| *c != ' ' && *c != '\t');
        !next.is_some_and(|c| NOT_A_COMMAND.contains(&c))
    }

    /// Consume the rest of a command line, stopping before `\n`, `;` or `}`.
    fn command_line(&mut self, span: Span) -> Token {
        let rest = self.inner.remainder();
        let len = rest.find(['\n', ';', '}']).unwrap_or(rest.len());
        let tail = &rest[..len];
        let text = format!("{}{}", self.inner.slice(), tail);
        self.inner.bump(len);
        Token::new(TokenKind::Command, text.trim_end(), span.start..span.end + len)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize a whole source string. The final token is always `Eof`.
pub fn tokenize(source: &str, commands: &CommandTable) -> Vec<Token> {
    let mut lexer = Lexer::new(source, commands);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}
