use std::rc::Rc;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, FunctionDef, Literal, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

type ParseFn = fn(&mut Parser) -> Result<Expr, Diagnostic>;

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` to close block")?;
        Ok((items, lbrace.span.to(rbrace.span)))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Keyword(Keyword::Var) => return self.parse_var_decl(),
                TokenKind::Keyword(Keyword::Define) => return self.parse_define(),
                TokenKind::Keyword(Keyword::Func) => return self.parse_function(),
                TokenKind::Keyword(Keyword::Include) => return self.parse_include(),
                TokenKind::Keyword(Keyword::If) => return self.parse_if(),
                TokenKind::Keyword(Keyword::While) => return self.parse_while(),
                TokenKind::Keyword(Keyword::Loop) => return self.parse_loop(),
                TokenKind::Keyword(Keyword::For) => return self.parse_for(),
                TokenKind::Keyword(Keyword::Return) => return self.parse_return(),
                TokenKind::Keyword(Keyword::Break) => {
                    let token = self.advance();
                    self.consume_optional_semicolon();
                    return Ok(Stmt {
                        kind: StmtKind::Break,
                        span: token.span,
                    });
                }
                TokenKind::Keyword(Keyword::Continue) => {
                    let token = self.advance();
                    self.consume_optional_semicolon();
                    return Ok(Stmt {
                        kind: StmtKind::Continue,
                        span: token.span,
                    });
                }
                TokenKind::LBrace => {
                    let (items, span) = self.parse_block()?;
                    return Ok(Stmt {
                        kind: StmtKind::Block(items),
                        span,
                    });
                }
                _ => {}
            }
        }
        self.parse_expression_statement()
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Var)?.span;
        let name_token = self.consume_identifier("expected variable name")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        let end = initializer
            .as_ref()
            .map(|expr| expr.span)
            .unwrap_or(name_token.span);
        Ok(Stmt {
            kind: StmtKind::VarDecl {
                name: name_token.lexeme,
                initializer,
            },
            span: start.to(end),
        })
    }

    fn parse_define(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Define)?.span;
        let name_token = self.consume_identifier("expected name after `define`")?;
        self.consume(TokenKind::Assign, "expected `=` in define statement")?;
        let value = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: start.to(value.span),
            kind: StmtKind::Define {
                name: name_token.lexeme,
                value,
            },
        })
    }

    fn parse_function(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Func)?.span;
        let name_token = self.consume_identifier("expected function name")?;
        self.consume(TokenKind::LParen, "expected `(` after function name")?;
        let mut params: Vec<String> = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("expected parameter name")?;
                if params.contains(&param.lexeme) {
                    return Err(self.error(&param, "duplicate parameter name"));
                }
                params.push(param.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let (body, body_span) = self.parse_block()?;
        let span = start.to(body_span);
        Ok(Stmt {
            span,
            kind: StmtKind::Function(Rc::new(FunctionDef {
                name: name_token.lexeme,
                params,
                body,
                span,
            })),
        })
    }

    fn parse_include(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Include)?.span;
        let name = match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::String | TokenKind::Identifier) => {
                self.advance()
            }
            Some(token) => return Err(self.error(token, "expected module name after `include`")),
            None => return Err(self.error_eof("expected module name after `include`")),
        };
        if name.lexeme.is_empty() {
            return Err(self.error(&name, "module name must not be empty"));
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: start.to(name.span),
            kind: StmtKind::Include(name.lexeme),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span;
        let condition = self.parse_expression()?;
        let (then_branch, then_span) = self.parse_block()?;
        let mut end = then_span;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                let else_if = self.parse_if()?;
                end = else_if.span;
                Some(vec![else_if])
            } else {
                let (branch, span) = self.parse_block()?;
                end = span;
                Some(branch)
            }
        } else {
            None
        };
        Ok(Stmt {
            span: start.to(end),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::While)?.span;
        let condition = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: start.to(span),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Loop)?.span;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: start.to(span),
            kind: StmtKind::Loop { body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::For)?.span;
        let binding = self.consume_identifier("expected loop binding")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: start.to(span),
            kind: StmtKind::For {
                binding: binding.lexeme,
                iterable,
                body,
            },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        let expr = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_optional_semicolon();
        let end = expr.as_ref().map(|e| e.span).unwrap_or(token.span);
        Ok(Stmt {
            span: token.span.to(end),
            kind: StmtKind::Return(expr),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        if self.matches(TokenKind::Assign) {
            let equals = self.previous().clone();
            if !matches!(expr.kind, ExprKind::Variable(_) | ExprKind::Index { .. }) {
                return Err(self.error(&equals, "invalid assignment target"));
            }
            let value = self.parse_expression()?;
            self.consume_optional_semicolon();
            return Ok(Stmt {
                span: expr.span.to(value.span),
                kind: StmtKind::Assign {
                    target: expr,
                    value,
                },
            });
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        self.fold_binary(&[(TokenKind::DoublePipe, BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        self.fold_binary(
            &[(TokenKind::DoubleAmpersand, BinaryOp::And)],
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        self.fold_binary(
            &[
                (TokenKind::EqualEqual, BinaryOp::Equal),
                (TokenKind::BangEqual, BinaryOp::NotEqual),
            ],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        self.fold_binary(
            &[
                (TokenKind::LessEqual, BinaryOp::LessEqual),
                (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
                (TokenKind::Less, BinaryOp::Less),
                (TokenKind::Greater, BinaryOp::Greater),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        self.fold_binary(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        self.fold_binary(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    /// Left-associative chain of `operand (op operand)*` for one precedence level.
    fn fold_binary(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        operand: ParseFn,
    ) -> Result<Expr, Diagnostic> {
        let mut expr = operand(self)?;
        'chain: loop {
            for (token, op) in operators {
                if self.matches(token.clone()) {
                    let right = operand(self)?;
                    expr = Expr {
                        span: expr.span.to(right.span),
                        kind: ExprKind::Binary {
                            op: op.clone(),
                            left: Box::new(expr),
                            right: Box::new(right),
                        },
                    };
                    continue 'chain;
                }
            }
            break;
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let operator = self.previous().span;
        let right = self.parse_unary()?;
        Ok(Expr {
            span: operator.to(right.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(right),
            },
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(TokenKind::LParen) {
                let lparen = self.advance();
                let name = match &expr.kind {
                    ExprKind::Variable(name) => name.clone(),
                    _ => return Err(self.error(&lparen, "only named functions can be called")),
                };
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let paren = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr {
                    span: expr.span.to(paren.span),
                    kind: ExprKind::Call { name, args },
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let bracket = self.consume(TokenKind::RBracket, "expected `]` after index")?;
                expr = Expr {
                    span: expr.span.to(bracket.span),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let Some(token) = self.peek() else {
            return Err(self.error_eof("unexpected end of expression"));
        };
        match &token.kind {
            TokenKind::Keyword(Keyword::True) => Ok(self.literal(Literal::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Ok(self.literal(Literal::Bool(false))),
            TokenKind::Keyword(Keyword::Null) => Ok(self.literal(Literal::Null)),
            TokenKind::Number => {
                let tok = self.advance();
                let digits = tok.lexeme.replace('_', "");
                let literal = if digits.contains(['.', 'e', 'E']) {
                    digits.parse().map(Literal::Float).ok()
                } else {
                    digits.parse().map(Literal::Int).ok()
                };
                let literal =
                    literal.ok_or_else(|| self.error(&tok, "invalid or out of range number"))?;
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(literal),
                })
            }
            TokenKind::String => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::String(tok.lexeme)),
                })
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Variable(tok.lexeme),
                })
            }
            TokenKind::LParen => {
                let lparen = self.advance();
                let inner = self.parse_expression()?;
                let rparen = self.consume(TokenKind::RParen, "expected `)` after expression")?;
                Ok(Expr {
                    span: lparen.span.to(rparen.span),
                    kind: ExprKind::Group(Box::new(inner)),
                })
            }
            TokenKind::LBracket => {
                let lbracket = self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let rbracket =
                    self.consume(TokenKind::RBracket, "expected `]` after array literal")?;
                Ok(Expr {
                    span: lbracket.span.to(rbracket.span),
                    kind: ExprKind::ArrayLiteral(elements),
                })
            }
            _ => Err(self.error(token, "unexpected token in expression")),
        }
    }

    fn literal(&mut self, literal: Literal) -> Expr {
        let tok = self.advance();
        Expr {
            span: tok.span,
            kind: ExprKind::Literal(literal),
        }
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let message = format!("expected keyword `{keyword:?}`");
        self.consume(TokenKind::Keyword(keyword), &message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        let diagnostic = Diagnostic::new(DiagnosticKind::Parser, message).with_span(token.span);
        if token.kind == TokenKind::Eof {
            diagnostic.with_note("reached end of input")
        } else {
            diagnostic.with_note(format!("found `{}`", token.lexeme))
        }
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message)
    }
}
