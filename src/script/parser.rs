//! Recursive-descent parser for pulse scripts

use super::ast::{
    BinaryOp, CompareOp, Expr, ExprKind, FunctionDef, Param, Program, Stmt, StmtKind, Target,
    UnaryOp,
};
use super::error::CompileError;
use super::lexer::{tokenize, Keyword, Op, Token, TokenKind};
use std::rc::Rc;

type PResult<T> = Result<T, CompileError>;

/// Deepest nesting of expressions and blocks the parser accepts
pub const MAX_NESTING: usize = 64;

/// Parse a complete script
pub fn parse_program(source: &str) -> PResult<Program> {
    Parser::new(source)?.parse_program()
}

/// Parse a single expression (used for command-line arguments)
pub fn parse_expression(source: &str) -> PResult<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression_list()?;
    parser.skip_newlines();
    if !parser.at(&TokenKind::Eof) {
        return Err(parser.error("unexpected trailing input after expression"));
    }
    Ok(expr)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> PResult<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
        })
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::Eof) {
                break;
            }
            if self.at(&TokenKind::Indent) {
                return Err(self.error("unexpected indent"));
            }
            body.push(self.statement()?);
        }
        Ok(Program { body })
    }

    // ---- token helpers -------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn at_op(&self, op: Op) -> bool {
        matches!(self.peek(), TokenKind::Op(o) if *o == op)
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_op(&mut self, op: Op) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: Op, what: &str) -> PResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", what)))
        }
    }

    fn expect_name(&mut self, what: &str) -> PResult<String> {
        match self.peek().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(&format!("expected {}", what))),
        }
    }

    fn expect_newline(&mut self) -> PResult<()> {
        match self.peek() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::Dedent => Ok(()),
            _ => Err(self.error("expected end of statement")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn error(&self, message: &str) -> CompileError {
        let found = match self.peek() {
            TokenKind::Name(n) => format!("name '{}'", n),
            TokenKind::Int(i) => format!("number {}", i),
            TokenKind::Float(f) => format!("number {}", f),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Keyword(k) => format!("keyword {:?}", k).to_lowercase(),
            TokenKind::Op(op) => format!("{:?}", op),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        };
        CompileError::new(self.line(), format!("{}, found {}", message, found))
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(CompileError::new(
                self.line(),
                format!("too many nested expressions or blocks (limit {})", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ---- statements ----------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                self.if_statement()?
            }
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Keyword(Keyword::For) => {
                self.advance();
                let var = self.expect_name("loop variable")?;
                if !self.eat_keyword(Keyword::In) {
                    return Err(self.error("expected 'in'"));
                }
                let iter = self.expression_list()?;
                let body = self.block()?;
                StmtKind::For { var, iter, body }
            }
            TokenKind::Keyword(Keyword::Def) => {
                self.advance();
                StmtKind::Def(Rc::new(self.function_def(line)?))
            }
            TokenKind::Keyword(Keyword::Elif) | TokenKind::Keyword(Keyword::Else) => {
                return Err(self.error("'elif'/'else' without matching 'if'"));
            }
            _ => {
                let kind = self.simple_statement()?;
                self.expect_newline()?;
                kind
            }
        };
        Ok(Stmt { kind, line })
    }

    fn if_statement(&mut self) -> PResult<StmtKind> {
        let mut branches = Vec::new();
        let cond = self.expression()?;
        let body = self.block()?;
        branches.push((cond, body));
        let mut otherwise = None;
        loop {
            if self.eat_keyword(Keyword::Elif) {
                let cond = self.expression()?;
                let body = self.block()?;
                branches.push((cond, body));
            } else if self.eat_keyword(Keyword::Else) {
                otherwise = Some(self.block()?);
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn function_def(&mut self, line: usize) -> PResult<FunctionDef> {
        let name = self.expect_name("function name")?;
        self.expect_op(Op::LParen, "'(' after function name")?;
        let mut params: Vec<Param> = Vec::new();
        while !self.at_op(Op::RParen) {
            let pname = self.expect_name("parameter name")?;
            if params.iter().any(|p| p.name == pname) {
                return Err(CompileError::new(
                    self.line(),
                    format!("duplicate argument '{}' in function definition", pname),
                ));
            }
            let default = if self.eat_op(Op::Assign) {
                Some(self.expression()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(CompileError::new(
                        self.line(),
                        "non-default argument follows default argument",
                    ));
                }
                None
            };
            params.push(Param {
                name: pname,
                default,
            });
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        self.expect_op(Op::RParen, "')' after parameters")?;
        let body = self.block()?;
        Ok(FunctionDef {
            name,
            params,
            body,
            line,
        })
    }

    /// `:` followed by an indented suite or one inline simple statement
    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_op(Op::Colon, "':'")?;
        if self.at(&TokenKind::Newline) {
            self.skip_newlines();
            if !self.at(&TokenKind::Indent) {
                return Err(self.error("expected an indented block"));
            }
            self.advance();
            let mut body = Vec::new();
            loop {
                self.skip_newlines();
                if self.at(&TokenKind::Dedent) {
                    self.advance();
                    break;
                }
                if self.at(&TokenKind::Eof) {
                    break;
                }
                if self.at(&TokenKind::Indent) {
                    return Err(self.error("unexpected indent"));
                }
                body.push(self.nested(Self::statement)?);
            }
            Ok(body)
        } else {
            let line = self.line();
            let kind = self.simple_statement()?;
            self.expect_newline()?;
            Ok(vec![Stmt { kind, line }])
        }
    }

    fn simple_statement(&mut self) -> PResult<StmtKind> {
        if self.eat_keyword(Keyword::Return) {
            if matches!(
                self.peek(),
                TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
            ) {
                return Ok(StmtKind::Return(None));
            }
            return Ok(StmtKind::Return(Some(self.expression_list()?)));
        }
        if self.eat_keyword(Keyword::Break) {
            return Ok(StmtKind::Break);
        }
        if self.eat_keyword(Keyword::Continue) {
            return Ok(StmtKind::Continue);
        }
        if self.eat_keyword(Keyword::Pass) {
            return Ok(StmtKind::Pass);
        }
        if self.eat_keyword(Keyword::Raise) {
            return Ok(StmtKind::Raise(self.expression()?));
        }

        let expr = self.expression_list()?;
        let aug = match self.peek() {
            TokenKind::Op(Op::PlusAssign) => Some(BinaryOp::Add),
            TokenKind::Op(Op::MinusAssign) => Some(BinaryOp::Sub),
            TokenKind::Op(Op::StarAssign) => Some(BinaryOp::Mul),
            TokenKind::Op(Op::SlashAssign) => Some(BinaryOp::Div),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let target = self.to_target(expr)?;
            let value = self.expression()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }
        if self.eat_op(Op::Assign) {
            let target = self.to_target(expr)?;
            let value = self.expression_list()?;
            if self.at_op(Op::Assign) {
                return Err(self.error("chained assignment is not supported"));
            }
            return Ok(StmtKind::Assign { target, value });
        }
        Ok(StmtKind::Expr(expr))
    }

    fn to_target(&self, expr: Expr) -> PResult<Target> {
        match expr.kind {
            ExprKind::Name(name) => Ok(Target::Name(name)),
            ExprKind::Index { target, index } => Ok(Target::Index {
                target: *target,
                index: *index,
            }),
            _ => Err(CompileError::new(expr.line, "cannot assign to expression")),
        }
    }

    // ---- expressions ---------------------------------------------------

    /// `expr (, expr)* [,]` - more than one element (or a trailing comma) forms a tuple
    fn expression_list(&mut self) -> PResult<Expr> {
        let line = self.line();
        let first = self.expression()?;
        if !self.at_op(Op::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(Op::Comma) {
            if self.starts_expression() {
                items.push(self.expression()?);
            } else {
                break;
            }
        }
        Ok(Expr::new(ExprKind::Tuple(items), line))
    }

    fn starts_expression(&self) -> bool {
        match self.peek() {
            TokenKind::Name(_) | TokenKind::Int(_) | TokenKind::Float(_) | TokenKind::Str(_) => true,
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::Not | Keyword::True | Keyword::False | Keyword::None
            ),
            TokenKind::Op(op) => matches!(op, Op::LParen | Op::LBracket | Op::Minus | Op::Plus),
            _ => false,
        }
    }

    pub fn expression(&mut self) -> PResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let line = self.line();
        let value = self.or_expr()?;
        if self.eat_keyword(Keyword::If) {
            let cond = self.or_expr()?;
            if !self.eat_keyword(Keyword::Else) {
                return Err(self.error("expected 'else' in conditional expression"));
            }
            let otherwise = self.expression()?;
            return Ok(Expr::new(
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then: Box::new(value),
                    otherwise: Box::new(otherwise),
                },
                line,
            ));
        }
        Ok(value)
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mut left = self.and_expr()?;
        while self.at_keyword(Keyword::Or) {
            let line = self.line();
            self.advance();
            let right = self.and_expr()?;
            left = Expr::new(ExprKind::Or(Box::new(left), Box::new(right)), line);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut left = self.not_expr()?;
        while self.at_keyword(Keyword::And) {
            let line = self.line();
            self.advance();
            let right = self.not_expr()?;
            left = Expr::new(ExprKind::And(Box::new(left), Box::new(right)), line);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        if self.at_keyword(Keyword::Not) {
            let line = self.line();
            self.advance();
            let operand = self.nested(Self::not_expr)?;
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), line));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            TokenKind::Op(Op::Eq) => CompareOp::Eq,
            TokenKind::Op(Op::NotEq) => CompareOp::NotEq,
            TokenKind::Op(Op::Lt) => CompareOp::Lt,
            TokenKind::Op(Op::LtE) => CompareOp::LtE,
            TokenKind::Op(Op::Gt) => CompareOp::Gt,
            TokenKind::Op(Op::GtE) => CompareOp::GtE,
            TokenKind::Keyword(Keyword::In) => CompareOp::In,
            TokenKind::Keyword(Keyword::Is) => {
                if matches!(self.peek_at(1), TokenKind::Keyword(Keyword::Not)) {
                    self.advance();
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                }
            }
            TokenKind::Keyword(Keyword::Not)
                if matches!(self.peek_at(1), TokenKind::Keyword(Keyword::In)) =>
            {
                self.advance();
                CompareOp::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let line = self.line();
        let left = self.additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            rest.push((op, self.additive()?));
        }
        if rest.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                rest,
            },
            line,
        ))
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op(Op::Plus) => BinaryOp::Add,
                TokenKind::Op(Op::Minus) => BinaryOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.term()?;
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), line);
        }
        Ok(left)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op(Op::Star) => BinaryOp::Mul,
                TokenKind::Op(Op::Slash) => BinaryOp::Div,
                TokenKind::Op(Op::DoubleSlash) => BinaryOp::FloorDiv,
                TokenKind::Op(Op::Percent) => BinaryOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.unary()?;
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), line);
        }
        Ok(left)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let line = self.line();
        if self.eat_op(Op::Minus) {
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::new(ExprKind::Unary(UnaryOp::Neg, Box::new(operand)), line));
        }
        if self.eat_op(Op::Plus) {
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::new(ExprKind::Unary(UnaryOp::Pos, Box::new(operand)), line));
        }
        self.power()
    }

    fn power(&mut self) -> PResult<Expr> {
        let base = self.postfix()?;
        if self.at_op(Op::DoubleStar) {
            let line = self.line();
            self.advance();
            // right-associative, and binds tighter than a unary minus on its left
            let exponent = self.nested(Self::unary)?;
            return Ok(Expr::new(
                ExprKind::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
                line,
            ));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            let line = self.line();
            if self.eat_op(Op::LParen) {
                let (args, kwargs) = self.call_arguments()?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    },
                    line,
                );
            } else if self.eat_op(Op::LBracket) {
                let index = self.expression()?;
                self.expect_op(Op::RBracket, "']'")?;
                expr = Expr::new(
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                );
            } else if self.eat_op(Op::Dot) {
                let method = self.expect_name("method name after '.'")?;
                if !self.eat_op(Op::LParen) {
                    return Err(self.error("attribute access is only supported for method calls"));
                }
                let (args, kwargs) = self.call_arguments()?;
                if !kwargs.is_empty() {
                    return Err(CompileError::new(line, "methods do not accept keyword arguments"));
                }
                expr = Expr::new(
                    ExprKind::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                    },
                    line,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Arguments after an opening `(`, consuming the closing `)`
    fn call_arguments(&mut self) -> PResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.at_op(Op::RParen) {
            let is_keyword = matches!(self.peek(), TokenKind::Name(_))
                && matches!(self.peek_at(1), TokenKind::Op(Op::Assign));
            if is_keyword {
                let name = self.expect_name("keyword")?;
                self.advance();
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(CompileError::new(
                        self.line(),
                        format!("keyword argument repeated: {}", name),
                    ));
                }
                kwargs.push((name, self.expression()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.expression()?);
            }
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        self.expect_op(Op::RParen, "')'")?;
        Ok((args, kwargs))
    }

    fn atom(&mut self) -> PResult<Expr> {
        let line = self.line();
        let kind = match self.advance() {
            TokenKind::Int(v) => ExprKind::Int(v),
            TokenKind::Float(v) => ExprKind::Float(v),
            TokenKind::Str(s) => {
                // adjacent literals concatenate
                let mut s = s;
                while let TokenKind::Str(next) = self.peek().clone() {
                    self.advance();
                    s.push_str(&next);
                }
                ExprKind::Str(s)
            }
            TokenKind::Name(n) => ExprKind::Name(n),
            TokenKind::Keyword(Keyword::True) => ExprKind::Bool(true),
            TokenKind::Keyword(Keyword::False) => ExprKind::Bool(false),
            TokenKind::Keyword(Keyword::None) => ExprKind::None,
            TokenKind::Op(Op::LParen) => {
                if self.eat_op(Op::RParen) {
                    ExprKind::Tuple(Vec::new())
                } else {
                    let first = self.expression()?;
                    if self.eat_op(Op::RParen) {
                        return Ok(first);
                    }
                    let mut items = vec![first];
                    while self.eat_op(Op::Comma) {
                        if self.at_op(Op::RParen) {
                            break;
                        }
                        items.push(self.expression()?);
                    }
                    self.expect_op(Op::RParen, "')'")?;
                    ExprKind::Tuple(items)
                }
            }
            TokenKind::Op(Op::LBracket) => {
                let mut items = Vec::new();
                while !self.at_op(Op::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat_op(Op::Comma) {
                        break;
                    }
                }
                self.expect_op(Op::RBracket, "']'")?;
                ExprKind::List(items)
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.error("expected an expression"));
            }
        };
        Ok(Expr::new(kind, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> StmtKind {
        let program = parse_program(source).unwrap();
        assert_eq!(program.body.len(), 1);
        program.body[0].kind.clone()
    }

    #[test]
    fn test_parse_assignment() {
        match single("x = 1 + 2 * 3") {
            StmtKind::Assign {
                target: Target::Name(name),
                value,
            } => {
                assert_eq!(name, "x");
                match value.kind {
                    ExprKind::Binary(BinaryOp::Add, _, right) => {
                        assert!(matches!(right.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_with_defaults() {
        match single("def f(x, y=2):\n    return x + y\n") {
            StmtKind::Def(def) => {
                assert_eq!(def.name, "f");
                assert_eq!(def.params.len(), 2);
                assert!(def.params[1].default.is_some());
                assert_eq!(def.body.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_elif_else() {
        let src = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        match single(src) {
            StmtKind::If {
                branches,
                otherwise,
            } => {
                assert_eq!(branches.len(), 2);
                assert!(otherwise.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_inline_suite() {
        match single("if x: return 1\n") {
            StmtKind::If { branches, .. } => {
                assert!(matches!(branches[0].1[0].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_conditional_expression_with_is_none() {
        let expr = parse_expression("0.0 if a is None else b - a").unwrap();
        match expr.kind {
            ExprKind::Conditional { cond, .. } => {
                assert!(matches!(
                    cond.kind,
                    ExprKind::Compare { ref rest, .. } if rest[0].0 == CompareOp::Is
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_is_not_and_not_in() {
        let expr = parse_expression("a is not None and b not in c").unwrap();
        assert!(matches!(expr.kind, ExprKind::And(_, _)));
    }

    #[test]
    fn test_parse_tuples() {
        assert!(matches!(parse_expression("()").unwrap().kind, ExprKind::Tuple(v) if v.is_empty()));
        assert!(matches!(parse_expression("(1,)").unwrap().kind, ExprKind::Tuple(v) if v.len() == 1));
        assert!(matches!(parse_expression("(1)").unwrap().kind, ExprKind::Int(1)));
        assert!(matches!(parse_expression("1, 2").unwrap().kind, ExprKind::Tuple(v) if v.len() == 2));
        assert!(matches!(
            parse_expression("((0, 'x', a, b), (1, 'y', c, d), )").unwrap().kind,
            ExprKind::Tuple(v) if v.len() == 2
        ));
    }

    #[test]
    fn test_parse_return_tuple() {
        let program = parse_program("def f():\n    return 1, (2, 3)\n").unwrap();
        let def = program.functions().next().unwrap();
        match &def.body[0].kind {
            StmtKind::Return(Some(expr)) => {
                assert!(matches!(&expr.kind, ExprKind::Tuple(v) if v.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_method_call_and_index() {
        let expr = parse_expression("xs.append(ys[0])").unwrap();
        assert!(matches!(expr.kind, ExprKind::MethodCall { ref method, .. } if method == "append"));
    }

    #[test]
    fn test_parse_keyword_arguments() {
        let expr = parse_expression("f(1, y=2)").unwrap();
        match expr.kind {
            ExprKind::Call { args, kwargs, .. } => {
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs[0].0, "y");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        match expr.kind {
            ExprKind::Binary(BinaryOp::Pow, _, right) => {
                assert!(matches!(right.kind, ExprKind::Binary(BinaryOp::Pow, _, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors_carry_lines() {
        let err = parse_program("x = 1\ny = \n").unwrap_err();
        assert_eq!(err.line, 2);
        let err = parse_program("def f(:\n    pass\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_deep_nesting_is_compile_error() {
        let shallow = format!("x = {}1{}\n", "(".repeat(20), ")".repeat(20));
        assert!(parse_program(&shallow).is_ok());

        let deep = format!("x = {}1{}\n", "(".repeat(1000), ")".repeat(1000));
        let err = parse_program(&deep).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("nested"));

        let negations = format!("x = {}1\n", "-".repeat(1000));
        assert!(parse_program(&negations).is_err());

        let mut blocks = String::new();
        for level in 0..200 {
            blocks.push_str(&format!("{}if x:\n", " ".repeat(level)));
        }
        blocks.push_str(&format!("{}pass\n", " ".repeat(200)));
        assert!(parse_program(&blocks).is_err());
    }

    #[test]
    fn test_reject_assignment_to_call() {
        assert!(parse_program("f() = 1\n").is_err());
    }

    #[test]
    fn test_reject_orphan_else() {
        assert!(parse_program("else:\n    pass\n").is_err());
    }

    #[test]
    fn test_reject_empty_block() {
        assert!(parse_program("if x:\ny = 1\n").is_err());
    }

    #[test]
    fn test_multiline_brackets() {
        let program = parse_program("xs = [1,\n      2,\n      3]\n").unwrap();
        assert_eq!(program.body.len(), 1);
    }
}
