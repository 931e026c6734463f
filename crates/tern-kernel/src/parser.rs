//! Parser for tern source code.
//!
//! A hand-written Pratt parser over the token stream from [`Lexer`].
//! Statement routines leave the parser positioned on the last token of the
//! construct they parsed; the statement loop advances past it.
//!
//! Errors accumulate instead of aborting: after a failed statement the
//! parser skips to the next statement boundary and keeps going, so a single
//! pass reports every diagnostic it can find.

use std::sync::Arc;

use crate::ast::{
    Block, DataType, Expr, ForLoop, FunctionLit, IfStmt, InfixOp, Param, PrefixOp, Program,
    ShellWord, Stmt, VarDecl,
};
use crate::commands::CommandTable;
use crate::lexer::{Lexer, Span, Token, TokenKind};

/// Parse error with location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

/// Parse source into a program, or every error found.
pub fn parse(source: &str, commands: &CommandTable) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(source, commands);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

/// Binding power, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,
    And,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        TokenKind::LParen | TokenKind::LBracket => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

fn infix_op(kind: TokenKind) -> Option<InfixOp> {
    let op = match kind {
        TokenKind::Plus => InfixOp::Add,
        TokenKind::Minus => InfixOp::Sub,
        TokenKind::Asterisk => InfixOp::Mul,
        TokenKind::Slash => InfixOp::Div,
        TokenKind::Percent => InfixOp::Mod,
        TokenKind::Lt => InfixOp::Lt,
        TokenKind::Gt => InfixOp::Gt,
        TokenKind::Eq => InfixOp::Eq,
        TokenKind::NotEq => InfixOp::NotEq,
        TokenKind::And => InfixOp::And,
        TokenKind::Or => InfixOp::Or,
        _ => return None,
    };
    Some(op)
}

fn is_type_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::TypeName
            | TokenKind::Asterisk
            | TokenKind::LBracket
            | TokenKind::Func
            | TokenKind::Chan
    )
}

fn ends_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Newline
            | TokenKind::Semicolon
            | TokenKind::RBrace
            | TokenKind::Eof
            | TokenKind::Comment
    )
}

/// Pratt parser with an accumulating error list.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, commands: &'a CommandTable) -> Self {
        let mut lexer = Lexer::new(source, commands);
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
        }
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Parse statements until end of input.
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::Eof) {
            match self.cur.kind {
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Comment => {}
                TokenKind::RBrace => {
                    self.error_at(self.cur.span.clone(), "unexpected }".to_string());
                }
                _ => {
                    if let Some(stmt) = self.parse_statement_checked() {
                        statements.push(stmt);
                    }
                }
            }
            self.next_token();
        }
        Program { statements }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Token cursor
    // ═══════════════════════════════════════════════════════════════════════

    fn next_token(&mut self) {
        let next = self.lexer.next_token();
        self.cur = std::mem::replace(&mut self.peek, next);
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    /// Advance if the next token is `kind`, otherwise record an error.
    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.next_token();
            true
        } else {
            self.peek_error(&kind.to_string());
            false
        }
    }

    fn peek_error(&mut self, expected: &str) {
        let message = format!(
            "expected next token to be {expected}, got {} instead",
            self.peek.kind
        );
        self.error_at(self.peek.span.clone(), message);
    }

    fn error_at(&mut self, span: Span, message: String) {
        self.errors.push(ParseError { span, message });
    }

    fn skip_peek_newlines(&mut self) {
        while self.peek_is(TokenKind::Newline) {
            self.next_token();
        }
    }

    /// Skip to the end of the current statement.
    ///
    /// Stops with the boundary token in `peek` so the caller's loop advances
    /// onto it. Braces opened along the way are skipped as a unit.
    fn synchronize(&mut self) {
        let mut depth = usize::from(self.cur_is(TokenKind::LBrace));
        loop {
            match self.peek.kind {
                TokenKind::Eof => return,
                TokenKind::Newline | TokenKind::Semicolon if depth == 0 => return,
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.next_token();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    /// Parse one statement and require a boundary after it.
    fn parse_statement_checked(&mut self) -> Option<Stmt> {
        let Some(stmt) = self.parse_statement() else {
            self.synchronize();
            return None;
        };
        if ends_statement(self.peek.kind) {
            Some(stmt)
        } else {
            self.peek_error("NEWLINE");
            self.synchronize();
            None
        }
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur.kind {
            TokenKind::Var => self.parse_var_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => Some(Stmt::Break),
            TokenKind::If => self.parse_if_statement().map(Stmt::If),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Go => {
                self.next_token();
                self.parse_expression(Precedence::Lowest).map(Stmt::Go)
            }
            TokenKind::Ident if self.peek_is(TokenKind::Declare) => {
                let name = self.cur.literal.clone();
                self.next_token();
                self.next_token();
                let value = self.parse_expression(Precedence::Lowest)?;
                Some(Stmt::Declare { name, value })
            }
            TokenKind::Ident if self.peek_is(TokenKind::Assign) => {
                let name = self.cur.literal.clone();
                self.next_token();
                self.next_token();
                let value = self.parse_expression(Precedence::Lowest)?;
                Some(Stmt::Assign { name, value })
            }
            TokenKind::Ident if self.peek_is(TokenKind::Arrow) => {
                let channel = self.cur.literal.clone();
                self.next_token();
                self.next_token();
                let value = self.parse_expression(Precedence::Lowest)?;
                Some(Stmt::Send { channel, value })
            }
            _ => self.parse_expression(Precedence::Lowest).map(Stmt::Expr),
        }
    }

    /// `var name [:] [type] [= value]`
    fn parse_var_statement(&mut self) -> Option<Stmt> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur.literal.clone();

        if self.peek_is(TokenKind::Colon) {
            self.next_token();
            if !is_type_start(self.peek.kind) {
                self.peek_error("a data type");
                return None;
            }
        }

        let ty = if is_type_start(self.peek.kind) {
            self.next_token();
            Some(self.parse_type()?)
        } else {
            None
        };

        let value = if self.peek_is(TokenKind::Assign) {
            self.next_token();
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        } else {
            None
        };

        Some(Stmt::Var(VarDecl { name, ty, value }))
    }

    fn parse_return_statement(&mut self) -> Option<Stmt> {
        if ends_statement(self.peek.kind) {
            return Some(Stmt::Return(None));
        }
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        Some(Stmt::Return(Some(value)))
    }

    /// `if cond { … } [else if … | else { … }]`
    fn parse_if_statement(&mut self) -> Option<IfStmt> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let then_branch = self.parse_block()?;

        let else_branch = if self.peek_is(TokenKind::Else) {
            self.next_token();
            if self.peek_is(TokenKind::If) {
                self.next_token();
                let nested = self.parse_if_statement()?;
                Some(Block {
                    statements: vec![Stmt::If(nested)],
                })
            } else {
                if !self.expect_peek(TokenKind::LBrace) {
                    return None;
                }
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Some(IfStmt {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// `for [cond] { … }`
    fn parse_for_statement(&mut self) -> Option<Stmt> {
        let condition = if self.peek_is(TokenKind::LBrace) {
            None
        } else {
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        };
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block()?;
        Some(Stmt::For(ForLoop { condition, body }))
    }

    /// Parse a block. Starts on `{`, ends on the matching `}`.
    fn parse_block(&mut self) -> Option<Block> {
        let mut statements = Vec::new();
        self.next_token();
        while !self.cur_is(TokenKind::RBrace) {
            match self.cur.kind {
                TokenKind::Eof => {
                    let message = "expected next token to be }, got EOF instead".to_string();
                    self.error_at(self.cur.span.clone(), message);
                    return None;
                }
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Comment => {}
                _ => {
                    if let Some(stmt) = self.parse_statement_checked() {
                        statements.push(stmt);
                    }
                }
            }
            self.next_token();
        }
        Some(Block { statements })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expr> {
        let mut left = self.parse_prefix()?;
        while precedence < precedence_of(self.peek.kind) {
            self.next_token();
            left = self.parse_infix(left)?;
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        match token.kind {
            TokenKind::Ident => Some(Expr::Ident(token.literal)),
            TokenKind::Int => match token.literal.parse::<i64>() {
                Ok(n) => Some(Expr::Int(n)),
                Err(_) => {
                    let message = format!("could not parse {:?} as integer", token.literal);
                    self.error_at(token.span, message);
                    None
                }
            },
            TokenKind::String => Some(Expr::Str(token.literal)),
            TokenKind::True => Some(Expr::Bool(true)),
            TokenKind::False => Some(Expr::Bool(false)),
            TokenKind::Bang => self.parse_prefix_op(PrefixOp::Not),
            TokenKind::Minus => self.parse_prefix_op(PrefixOp::Neg),
            TokenKind::FileTest => self.parse_prefix_op(PrefixOp::FileTest),
            TokenKind::Asterisk => self.parse_prefix_op(PrefixOp::Deref),
            TokenKind::Ampersand => self.parse_prefix_op(PrefixOp::Ref),
            TokenKind::Arrow => {
                self.next_token();
                let source = self.parse_expression(Precedence::Prefix)?;
                Some(Expr::Receive(Box::new(source)))
            }
            TokenKind::LParen => {
                self.next_token();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(TokenKind::RParen).then_some(expr)
            }
            TokenKind::Func => self.parse_function_literal(),
            TokenKind::TypeName | TokenKind::Chan => self.parse_type().map(Expr::Type),
            TokenKind::LBracket => self.parse_slice_type_or_literal(),
            TokenKind::ShellExpr | TokenKind::Command => {
                Some(Expr::Shell(ShellWord::split(&token.literal)))
            }
            TokenKind::Positional => match token.literal.parse::<usize>() {
                Ok(n) => Some(Expr::Positional(n)),
                Err(_) => {
                    let message = format!("could not parse {:?} as integer", token.literal);
                    self.error_at(token.span, message);
                    None
                }
            },
            TokenKind::EnvVar => Some(Expr::EnvVar(token.literal)),
            TokenKind::Illegal => {
                self.error_at(token.span, format!("illegal token {:?}", token.literal));
                None
            }
            kind => {
                let message = format!("no prefix parse function for {kind} found");
                self.error_at(token.span, message);
                None
            }
        }
    }

    fn parse_prefix_op(&mut self, op: PrefixOp) -> Option<Expr> {
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Some(Expr::Prefix {
            op,
            right: Box::new(right),
        })
    }

    fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::LParen => {
                let args = self.parse_expression_list(TokenKind::RParen)?;
                Some(Expr::Call {
                    callee: Box::new(left),
                    args,
                })
            }
            TokenKind::LBracket => {
                self.next_token();
                let index = self.parse_expression(Precedence::Lowest)?;
                if !self.expect_peek(TokenKind::RBracket) {
                    return None;
                }
                Some(Expr::Index {
                    left: Box::new(left),
                    index: Box::new(index),
                })
            }
            kind => {
                let op = infix_op(kind)?;
                let precedence = precedence_of(kind);
                self.next_token();
                let right = self.parse_expression(precedence)?;
                Some(Expr::Infix {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
        }
    }

    /// Comma-separated expressions up to `end`. Starts on the opening token.
    ///
    /// Newlines are allowed after the opener, after commas and before `end`.
    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        self.skip_peek_newlines();
        if self.peek_is(end) {
            self.next_token();
            return Some(items);
        }

        self.next_token();
        items.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.skip_peek_newlines();
            if self.peek_is(end) {
                break;
            }
            self.next_token();
            items.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.skip_peek_newlines();
        self.expect_peek(end).then_some(items)
    }

    /// `[]T` as a type expression, or `[]T{a, b}` as a slice literal.
    fn parse_slice_type_or_literal(&mut self) -> Option<Expr> {
        let ty = self.parse_type()?;
        if !self.peek_is(TokenKind::LBrace) {
            return Some(Expr::Type(ty));
        }
        let DataType::Slice(elem) = ty else {
            return Some(Expr::Type(ty));
        };
        self.next_token();
        let items = self.parse_expression_list(TokenKind::RBrace)?;
        Some(Expr::SliceLit { elem: *elem, items })
    }

    /// `func [name](params) [ret] { body }`
    fn parse_function_literal(&mut self) -> Option<Expr> {
        let name = if self.peek_is(TokenKind::Ident) {
            self.next_token();
            Some(self.cur.literal.clone())
        } else {
            None
        };

        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        let params = self.parse_parameters()?;

        let ret = if is_type_start(self.peek.kind) {
            self.next_token();
            self.parse_type()?
        } else {
            DataType::Nil
        };

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block()?;

        Some(Expr::Function(Arc::new(FunctionLit {
            name,
            params,
            ret,
            body,
        })))
    }

    /// Parameter list. Starts on `(`, ends on `)`.
    ///
    /// Names without a type take the next written type (`a, b int`); a
    /// trailing name with no type is an error.
    fn parse_parameters(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Some(params);
        }

        loop {
            if !self.expect_peek(TokenKind::Ident) {
                return None;
            }
            pending.push(self.cur.literal.clone());

            if is_type_start(self.peek.kind) {
                self.next_token();
                let ty = self.parse_type()?;
                params.extend(pending.drain(..).map(|name| Param {
                    name,
                    ty: ty.clone(),
                }));
            }

            if self.peek_is(TokenKind::Comma) {
                self.next_token();
            } else {
                break;
            }
        }

        if let Some(name) = pending.last() {
            let message = format!("expected parameter type for {name}");
            self.error_at(self.peek.span.clone(), message);
            return None;
        }

        self.expect_peek(TokenKind::RParen).then_some(params)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Types
    // ═══════════════════════════════════════════════════════════════════════

    /// Parse a type starting at the current token.
    fn parse_type(&mut self) -> Option<DataType> {
        match self.cur.kind {
            TokenKind::TypeName => match DataType::from_keyword(&self.cur.literal) {
                Some(ty) => Some(ty),
                None => {
                    self.type_error();
                    None
                }
            },
            TokenKind::Asterisk => {
                self.next_token();
                Some(DataType::reference_to(self.parse_type()?))
            }
            TokenKind::LBracket => {
                if !self.expect_peek(TokenKind::RBracket) {
                    return None;
                }
                self.next_token();
                Some(DataType::slice_of(self.parse_type()?))
            }
            TokenKind::Chan => {
                self.next_token();
                Some(DataType::channel_of(self.parse_type()?))
            }
            TokenKind::Func => {
                if !self.expect_peek(TokenKind::LParen) {
                    return None;
                }
                let mut params = Vec::new();
                if self.peek_is(TokenKind::RParen) {
                    self.next_token();
                } else {
                    loop {
                        self.next_token();
                        params.push(self.parse_type()?);
                        if self.peek_is(TokenKind::Comma) {
                            self.next_token();
                        } else {
                            break;
                        }
                    }
                    if !self.expect_peek(TokenKind::RParen) {
                        return None;
                    }
                }
                let ret = if is_type_start(self.peek.kind) {
                    self.next_token();
                    self.parse_type()?
                } else {
                    DataType::Nil
                };
                Some(DataType::Function {
                    params,
                    ret: Box::new(ret),
                })
            }
            _ => {
                self.type_error();
                None
            }
        }
    }

    fn type_error(&mut self) {
        let message = format!("expected a data type, got {} instead", self.cur.kind);
        self.error_at(self.cur.span.clone(), message);
    }
}
