use tracing::{debug, instrument};

use crate::{
    ast::{
        BinaryOperator, Block, Expr, ExprKind, FunctionDecl, Literal, Param, Program, Stmt,
        StmtKind, TopLevel, UnaryOperator, UseDecl, VarDecl,
    },
    lexer::{self, extract},
    token::{Pos, Spanned, Token, TokenKind},
    types::{BaseType, Type},
};

pub type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lexes and parses a whole source file.
///
/// The provided token buffer must be empty; it is filled by the lexer and
/// left in place so that callers may reuse the allocation.
#[instrument(skip_all)]
pub fn parse_program(src: &str, tokens: &mut Vec<Token>) -> Result<Program> {
    parse(src, tokens, Parser::parse_program)
}

/// Lexes and parses a single expression.
pub fn parse_expr(src: &str, tokens: &mut Vec<Token>) -> Result<Expr> {
    parse(src, tokens, |p| {
        let expr = p.parse_expr()?;
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    })
}

fn parse<'src, 'tok, T>(
    src: &'src str,
    tokens: &'tok mut Vec<Token>,
    f: impl FnOnce(&mut Parser<'src, 'tok>) -> Result<T>,
) -> Result<T> {
    assert!(tokens.is_empty());
    lexer::lex(src, tokens);
    debug!(tokens = tokens.len(), "lexed source");

    // The parser never recovers, so the first malformed token is the error.
    if let Some(token) = tokens.iter().find(|token| token.kind.is_error()) {
        return Err(token.pos.wrap(Error::Lexer(token.kind)));
    }

    let mut p = Parser::new(src, tokens);
    f(&mut p)
}

struct Parser<'src, 'tok> {
    src: &'src str,
    tokens: &'tok [Token],
    cursor: usize,
    /// Return type of the function whose body is being parsed.
    return_ty: Option<Type>,
}

impl Parser<'_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut decls = Vec::with_capacity(16);
        while !self.is(TokenKind::Eof) {
            decls.push(self.parse_top_level()?);
        }
        Ok(Program { decls })
    }

    fn parse_top_level(&mut self) -> Result<TopLevel> {
        let token = self.peek();
        match token.kind {
            TokenKind::Bang => self.parse_use().map(TopLevel::Use),
            TokenKind::Extern => self.parse_extern().map(TopLevel::Function),
            kind if kind.is_type_keyword() => {
                let ty = self.parse_type()?;
                let name = self.parse_ident()?;
                if self.is(TokenKind::LParen) {
                    self.parse_function(ty, name, token.pos).map(TopLevel::Function)
                } else {
                    self.parse_var_decl_rest(ty, name, token.pos).map(TopLevel::Global)
                }
            }
            actual => Err(token.pos.wrap(Error::ExpectedTopLevel { actual })),
        }
    }

    /// `!use "path";`
    fn parse_use(&mut self) -> Result<UseDecl> {
        let pos = self.consume(TokenKind::Bang)?.pos;
        self.consume(TokenKind::Use)?;
        let token = self.consume_any(&[TokenKind::String, TokenKind::EscapedString])?;
        let path = match token.kind {
            TokenKind::String => extract::string(token, self.src),
            _ => extract::escaped_string(token, self.src),
        };
        self.consume(TokenKind::Semicolon)?;
        Ok(UseDecl {
            path: path.into(),
            pos,
        })
    }

    fn parse_extern(&mut self) -> Result<FunctionDecl> {
        let pos = self.consume(TokenKind::Extern)?.pos;
        let return_ty = self.parse_type()?;
        let name = self.parse_ident()?;
        let params = self.parse_params()?;
        self.consume(TokenKind::Semicolon)?;
        Ok(FunctionDecl {
            return_ty,
            name,
            params,
            body: None,
            is_extern: true,
            pos,
        })
    }

    fn parse_function(&mut self, return_ty: Type, name: String, pos: Pos) -> Result<FunctionDecl> {
        let params = self.parse_params()?;
        self.return_ty = Some(return_ty);
        let body = self.parse_block()?;
        self.return_ty = None;
        Ok(FunctionDecl {
            return_ty,
            name,
            params,
            body: Some(body),
            is_extern: false,
            pos,
        })
    }

    /// `'(' [type name ['[' ']'] (',' type name ['[' ']'])*] ')'`
    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, |p| {
            let mut ty = p.parse_type()?;
            let name = p.parse_ident()?;
            if p.take(TokenKind::LBracket) {
                p.consume(TokenKind::RBracket)?;
                ty = ty.pointer();
            }
            Ok(Param { ty, name })
        })?;
        self.consume(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<Type> {
        let token = self.peek();
        let Some(base) = BaseType::from_keyword(token.kind) else {
            return Err(token.pos.wrap(Error::ExpectedType { actual: token.kind }));
        };
        self.advance();
        let ty = Type::scalar(base);
        Ok(if self.take(TokenKind::Star) {
            ty.pointer()
        } else {
            ty
        })
    }

    fn parse_ident(&mut self) -> Result<String> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(extract::ident(token, self.src))
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.is(TokenKind::RBrace) && !self.is(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::RBrace)?;
        Ok(Block { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let token = self.peek();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let condition = self.parse_condition()?;
                let body = self.parse_block()?;
                StmtKind::While { condition, body }
            }
            TokenKind::Return => self.parse_return()?,
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            kind if kind.is_type_keyword() => {
                let ty = self.parse_type()?;
                let name = self.parse_ident()?;
                StmtKind::VarDecl(self.parse_var_decl_rest(ty, name, pos)?)
            }
            TokenKind::Identifier => {
                // The left-hand side is parsed as a full expression, so any
                // addressable expression (e.g. `a[i]`) may be assigned to.
                let expr = self.parse_expr()?;
                if self.take(TokenKind::Assign) {
                    let value = self.parse_expr()?;
                    self.consume(TokenKind::Semicolon)?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else {
                    self.consume(TokenKind::Semicolon)?;
                    StmtKind::Expr(expr)
                }
            }
            actual => return Err(pos.wrap(Error::UnknownStatement { actual })),
        };
        Ok(Stmt { kind, pos })
    }

    /// Parses what follows `type name` in a variable declaration.
    fn parse_var_decl_rest(&mut self, ty: Type, name: String, pos: Pos) -> Result<VarDecl> {
        let mut ty = ty;
        let mut array_size = None;
        if self.take(TokenKind::LBracket) {
            let token = self.consume(TokenKind::Number)?;
            let size = extract::int(token, self.src)
                .ok()
                .and_then(|size| u32::try_from(size).ok())
                .filter(|size| *size > 0)
                .ok_or_else(|| token.pos.wrap(Error::InvalidArraySize))?;
            self.consume(TokenKind::RBracket)?;
            ty = ty.array();
            array_size = Some(size);
        }
        let initializer = if self.take(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon)?;
        Ok(VarDecl {
            ty,
            name,
            initializer,
            array_size,
            pos,
        })
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::If)?;
        let condition = self.parse_condition()?;
        let then_block = self.parse_block()?;
        let else_block = if self.take(TokenKind::Else) {
            if self.is(TokenKind::If) {
                // `else if` is an else block holding a single `if`.
                let pos = self.peek().pos;
                let kind = self.parse_if()?;
                Some(Block {
                    stmts: vec![Stmt { kind, pos }],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(StmtKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_condition(&mut self) -> Result<Expr> {
        self.consume(TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        Ok(condition)
    }

    fn parse_return(&mut self) -> Result<StmtKind> {
        let pos = self.consume(TokenKind::Return)?.pos;
        let value = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(TokenKind::Semicolon)?;

        // The checker verifies this again; failing here gives a precise
        // location early.
        let is_nore = self.return_ty.is_some_and(Type::is_nore);
        match (is_nore, &value) {
            (true, Some(_)) => Err(pos.wrap(Error::ValueInNoreReturn)),
            (false, None) => Err(pos.wrap(Error::MissingReturnValue)),
            _ => Ok(StmtKind::Return(value)),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let op_token = self.peek();
            let Some((op, bp)) = Self::infix_binding_power(op_token.kind) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.advance(); // Operator

            // The right operand of `*`, `/` and `%` is a primary, not a unary
            // expression, so `a * -b` is rejected.
            let rhs = if bp == FACTOR_BP {
                self.parse_primary()?
            } else {
                self.parse_expr_bp(bp + 1)?
            };

            let pos = lhs.pos;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            };
        }

        Ok(lhs)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(BinaryOperator, u8)> {
        let bp = match kind {
            TokenKind::EqEq => (BinaryOperator::Eq, 1),
            TokenKind::NotEq => (BinaryOperator::Ne, 1),

            TokenKind::Less => (BinaryOperator::Lt, 2),
            TokenKind::Greater => (BinaryOperator::Gt, 2),
            TokenKind::LessEq => (BinaryOperator::Le, 2),
            TokenKind::GreaterEq => (BinaryOperator::Ge, 2),

            TokenKind::Plus => (BinaryOperator::Add, 3),
            TokenKind::Minus => (BinaryOperator::Sub, 3),

            TokenKind::Star => (BinaryOperator::Mul, FACTOR_BP),
            TokenKind::Slash => (BinaryOperator::Div, FACTOR_BP),
            TokenKind::Percent => (BinaryOperator::Rem, FACTOR_BP),

            _ => return None,
        };
        Some(bp)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let token = self.peek();
        if token.kind == TokenKind::Minus {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOperator::Neg,
                    operand: Box::new(operand),
                },
                pos: token.pos,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Number => {
                let Ok(parsed) = extract::int(token, self.src) else {
                    return Err(pos.wrap(Error::ParseInt));
                };
                ExprKind::Literal(Literal::Int(parsed))
            }
            TokenKind::True => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::False => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::CharLit => ExprKind::Literal(Literal::Char(extract::char(token, self.src))),
            TokenKind::String => ExprKind::String(extract::string(token, self.src)),
            TokenKind::EscapedString => ExprKind::String(extract::escaped_string(token, self.src)),

            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                return Ok(expr);
            }

            TokenKind::Identifier => {
                let name = extract::ident(token, self.src);
                return self.parse_identifier_suffix(name, pos);
            }

            actual => return Err(pos.wrap(Error::ExpectedExpression { actual })),
        };
        Ok(Expr { kind, pos })
    }

    /// Parses an optional `@module` qualifier, then either a call or a chain
    /// of subscripts.
    fn parse_identifier_suffix(&mut self, name: String, pos: Pos) -> Result<Expr> {
        let module = if self.take(TokenKind::At) {
            Some(self.parse_ident()?)
        } else {
            None
        };

        if self.take(TokenKind::LParen) {
            let args = self.parse_list(TokenKind::RParen, Parser::parse_expr)?;
            self.consume(TokenKind::RParen)?;
            return Ok(Expr {
                kind: ExprKind::Call {
                    callee: name,
                    module,
                    args,
                },
                pos,
            });
        }

        if module.is_some() {
            let token = self.peek();
            return Err(token.pos.wrap(Error::Unexpected {
                actual: token.kind,
                expected: TokenKind::LParen,
            }));
        }

        let mut expr = Expr {
            kind: ExprKind::Variable(name),
            pos,
        };
        while self.take(TokenKind::LBracket) {
            let index = self.parse_expr()?;
            self.consume(TokenKind::RBracket)?;
            expr = Expr {
                kind: ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                pos,
            };
        }
        Ok(expr)
    }

    /// Parses `item (',' item)*` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.is(end_delim) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }
}

const FACTOR_BP: u8 = 4;

impl Parser<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok [Token]) -> Parser<'src, 'tok> {
        let mut p = Parser {
            src,
            tokens,
            cursor: 0,
            return_ty: None,
        };
        p.setup();
        p
    }

    /// Setups the parser, skipping any trivia if necessary.
    fn setup(&mut self) {
        while self.peek().kind.is_trivia() {
            self.cursor += 1;
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            // The lexer always produces an `Eof` as the last token.
            None => *self.tokens.last().expect("token stream ends with eof"),
        }
    }

    /// Returns the current token and advances. Skips any trivia.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if c.is_eof() {
            return c;
        }
        while {
            self.cursor += 1;
            self.peek().kind.is_trivia()
        } {}
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if c.kind == expect {
            Ok(self.advance())
        } else {
            Err(c.pos.wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }

    /// Advances if the current token matches any of the provided tokens.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        let c = self.peek();
        if expect.contains(&c.kind) {
            return Ok(self.advance());
        }
        Err(c.pos.wrap(Error::UnexpectedAny {
            actual: c.kind,
            expected: expect,
        }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected token {expected:?}, but got {actual:?}")]
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("expected one of {expected:?}, but got {actual:?}")]
    UnexpectedAny {
        actual: TokenKind,
        expected: &'static [TokenKind],
    },
    #[error("expected type, but got {actual:?}")]
    ExpectedType { actual: TokenKind },
    #[error("unexpected token {actual:?} in expression")]
    ExpectedExpression { actual: TokenKind },
    #[error("unknown statement starting with {actual:?}")]
    UnknownStatement { actual: TokenKind },
    #[error("expected function, extern, global or use, but got {actual:?}")]
    ExpectedTopLevel { actual: TokenKind },
    #[error("array size must be a positive integer")]
    InvalidArraySize,
    #[error("parse int error, out of bounds")]
    ParseInt,
    #[error("nore function cannot return a value")]
    ValueInNoreReturn,
    #[error("non-nore function must return a value")]
    MissingReturnValue,
    #[error("{}", lexer_message(.0))]
    Lexer(TokenKind),
}

fn lexer_message(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::ErrorUnexpectedChar => "unexpected character",
        TokenKind::ErrorUnclosedString => "unclosed string",
        TokenKind::ErrorUnclosedChar => "unclosed character literal",
        TokenKind::ErrorUnescapedLineBreak => "unescaped line break",
        _ => unreachable!("not error token"),
    }
}
