//! Script compiler: lexemes to an owned expression tree.
//!
//! Precedence (lowest → highest):
//!   if-chain / ternary  →  or  →  and  →  not  →  comparison  →  primary
//!
//! Argument references are stored unresolved; the same tree runs against
//! any argument store.  Nested fields are compiled here, once, with the
//! nesting depth bounded by [`Config::max_depth`].

use std::cmp::Ordering;

use tracing::trace;

use super::field::{parse_field, AccessChain, AccessStep, ArgRef, AutoIndex};
use super::lexer::{tokenize, Keyword, Lexeme, LexemeKind, Operator};
use crate::config::Config;
use crate::error::{ErrorCode, FormatError, Result};
use crate::render::FormatSpec;
use crate::value::{Access, AttributeName, IndexingValue, Variable};

// ── Tree ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_operator(op: Operator) -> Option<Self> {
        Some(match op {
            Operator::Eq => CompareOp::Eq,
            Operator::Ne => CompareOp::Ne,
            Operator::Lt => CompareOp::Lt,
            Operator::Le => CompareOp::Le,
            Operator::Gt => CompareOp::Gt,
            Operator::Ge => CompareOp::Ge,
            _ => return None,
        })
    }

    /// Whether an ordering satisfies the operator.  Unordered operands
    /// (NaN) only satisfy `!=`.
    pub fn holds(self, ord: Option<Ordering>) -> bool {
        match (self, ord) {
            (CompareOp::Ne, None) => true,
            (_, None) => false,
            (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        }
    }
}

/// One node of a compiled script.  Each node owns its children.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Variable),
    Argument(ArgRef),
    /// A `{...}` field nested inside a script.
    Field(Box<Field>),
    Not(Box<Node>),
    /// Two or more operands, evaluated left to right until one is falsy.
    And(Vec<Node>),
    /// Two or more operands, evaluated left to right until one is truthy.
    Or(Vec<Node>),
    Compare {
        op: CompareOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
        offset: usize,
    },
    /// `if`/`elif` chain or `? :` ternary chain: the first branch whose
    /// condition is truthy wins.
    Conditional {
        branches: Vec<(Node, Node)>,
        otherwise: Option<Box<Node>>,
    },
}

/// A compiled replacement field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value {
        arg: ArgRef,
        spec: Option<FormatSpec>,
    },
    /// `{$ ...}` shorthand script.
    Script(Node),
}

// ── Compiler ──────────────────────────────────────────────────────────────────

/// Compiles every field and script of one format string.
///
/// Holds the automatic field numbering, which runs across the whole string
/// in textual order, nested fields included.
pub struct Compiler<'c> {
    config: &'c Config,
    auto: AutoIndex,
    depth: usize,
}

impl<'c> Compiler<'c> {
    pub fn new(config: &'c Config) -> Self {
        Compiler {
            config,
            auto: AutoIndex::new(config.strict_auto_index),
            depth: 0,
        }
    }

    /// Compile the content of a `{...}` block starting at `base`.
    pub fn compile_field(&mut self, src: &str, base: usize) -> Result<Field> {
        if src.starts_with('$') {
            return Ok(Field::Script(self.compile_script(src, base, true)?));
        }
        let (arg, spec) = parse_field(src, base, &mut self.auto)?;
        self.check_steps(&arg)?;
        Ok(Field::Value { arg, spec })
    }

    /// Compile one script.  With `shorthand`, a leading lone `$` demands the
    /// `cond ? a : b` form.
    pub fn compile_script(&mut self, src: &str, base: usize, shorthand: bool) -> Result<Node> {
        let tokens = tokenize(src, base)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: base + src.len(),
            compiler: self,
        };
        let node = parser.parse_script(shorthand)?;
        trace!(offset = base, ?node, "compiled script");
        Ok(node)
    }

    fn enter(&mut self, offset: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(FormatError::new(
                ErrorCode::RecursionLimit,
                format!("nesting deeper than {} levels", self.config.max_depth),
            )
            .at(offset));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Access chains are walked recursively, so they share the depth limit.
    fn check_steps(&self, arg: &ArgRef) -> Result<()> {
        match arg.steps.get(self.config.max_depth) {
            Some(step) => Err(FormatError::new(
                ErrorCode::RecursionLimit,
                format!("access chain longer than {} steps", self.config.max_depth),
            )
            .at(step.offset)),
            None => Ok(()),
        }
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser<'p, 'c> {
    tokens: Vec<Lexeme>,
    pos: usize,
    /// Offset just past the script, reported for errors at end of input.
    end: usize,
    compiler: &'p mut Compiler<'c>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Lexeme> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&LexemeKind> {
        self.peek().map(|l| &l.kind)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.tokens.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |l| l.offset)
    }

    fn eat_op(&mut self, op: Operator) -> bool {
        if self.peek_kind() == Some(&LexemeKind::Operator(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.peek_kind() == Some(&LexemeKind::Keyword(k)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Error for a lexeme that does not fit here, or for running out.
    fn unexpected(&self, wanted: &str) -> FormatError {
        match self.peek() {
            Some(l) => FormatError::new(
                ErrorCode::InvalidCondition,
                format!("expected {wanted}, found {}", l.kind),
            )
            .at(l.offset),
            None => FormatError::new(
                ErrorCode::EndOfString,
                format!("expected {wanted}, found end of script"),
            )
            .at(self.end),
        }
    }

    fn expect_op(&mut self, op: Operator) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", op.as_str())))
        }
    }

    fn nested<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.compiler.enter(offset)?;
        let result = f(self);
        self.compiler.leave();
        result
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_script(&mut self, shorthand: bool) -> Result<Node> {
        let marker = self.peek_kind() == Some(&LexemeKind::Dollar);
        if marker {
            self.pos += 1;
        }
        let node = if marker && shorthand {
            self.parse_shorthand()?
        } else {
            self.parse_expr()?
        };
        match self.peek() {
            None => Ok(node),
            Some(l) => Err(FormatError::new(
                ErrorCode::InvalidCondition,
                format!("unexpected {} after expression", l.kind),
            )
            .at(l.offset)),
        }
    }

    /// `cond ? a [: b]`, where the `?` is mandatory.
    fn parse_shorthand(&mut self) -> Result<Node> {
        let cond = self.parse_or()?;
        if !self.eat_op(Operator::Question) {
            return Err(FormatError::new(ErrorCode::InvalidCondition, "expected '?' after condition")
                .at(self.offset()));
        }
        self.parse_branches(cond)
    }

    fn parse_expr(&mut self) -> Result<Node> {
        if self.peek_kind() == Some(&LexemeKind::Keyword(Keyword::If)) {
            return self.parse_if();
        }
        let cond = self.parse_or()?;
        if self.eat_op(Operator::Question) {
            self.parse_branches(cond)
        } else {
            Ok(cond)
        }
    }

    /// Branches after the first `?`.  `a ? b : c ? d : e` folds into one
    /// conditional with two branches.
    fn parse_branches(&mut self, cond: Node) -> Result<Node> {
        let mut branches = vec![(cond, self.parse_or()?)];
        let mut otherwise = None;
        while self.eat_op(Operator::Colon) {
            if self.peek_kind() == Some(&LexemeKind::Keyword(Keyword::If)) {
                otherwise = Some(Box::new(self.parse_if()?));
                break;
            }
            let next = self.parse_or()?;
            if !self.eat_op(Operator::Question) {
                otherwise = Some(Box::new(next));
                break;
            }
            branches.push((next, self.parse_or()?));
        }
        Ok(Node::Conditional { branches, otherwise })
    }

    fn parse_if(&mut self) -> Result<Node> {
        let offset = self.offset();
        self.pos += 1;
        self.nested(offset, |p| {
            let mut branches = Vec::new();
            let mut otherwise = None;
            loop {
                let cond = p.parse_or()?;
                p.expect_op(Operator::Colon)?;
                let body = p.parse_expr()?;
                branches.push((cond, body));

                if p.eat_keyword(Keyword::Elif) {
                    continue;
                }
                if p.eat_keyword(Keyword::Else) {
                    p.expect_op(Operator::Colon)?;
                    otherwise = Some(Box::new(p.parse_expr()?));
                }
                if p.eat_keyword(Keyword::End) {
                    break;
                }
                return Err(p.unexpected("'elif', 'else' or 'end'"));
            }
            Ok(Node::Conditional { branches, otherwise })
        })
    }

    fn parse_or(&mut self) -> Result<Node> {
        let first = self.parse_and()?;
        let mut operands = Vec::new();
        while self.eat_keyword(Keyword::Or) || self.eat_op(Operator::OrOr) {
            operands.push(self.parse_and()?);
        }
        if operands.is_empty() {
            return Ok(first);
        }
        operands.insert(0, first);
        Ok(Node::Or(operands))
    }

    fn parse_and(&mut self) -> Result<Node> {
        let first = self.parse_not()?;
        let mut operands = Vec::new();
        while self.eat_keyword(Keyword::And) || self.eat_op(Operator::AndAnd) {
            operands.push(self.parse_not()?);
        }
        if operands.is_empty() {
            return Ok(first);
        }
        operands.insert(0, first);
        Ok(Node::And(operands))
    }

    fn parse_not(&mut self) -> Result<Node> {
        let offset = self.offset();
        if self.eat_op(Operator::Not) {
            let inner = self.nested(offset, Self::parse_not)?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Lexeme {
                kind: LexemeKind::Operator(op),
                offset,
            }) => CompareOp::from_operator(*op).map(|c| (c, *offset)),
            _ => None,
        };
        let Some((op, offset)) = op else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        Ok(Node::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            offset,
        })
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let Some(lexeme) = self.next() else {
            return Err(FormatError::new(ErrorCode::EndOfString, "unexpected end of script")
                .at(self.end));
        };
        let offset = lexeme.offset;
        match lexeme.kind {
            LexemeKind::Literal(v) => Ok(Node::Literal(v)),
            LexemeKind::Argument(key) => {
                let steps = self.parse_steps()?;
                let arg = ArgRef { key, steps, offset };
                self.compiler.check_steps(&arg)?;
                Ok(Node::Argument(arg))
            }
            LexemeKind::Field(text) => self.nested(offset, |p| {
                let field = p.compiler.compile_field(&text, offset + 1)?;
                Ok(Node::Field(Box::new(field)))
            }),
            LexemeKind::Operator(Operator::LParen) => self.nested(offset, |p| {
                let inner = p.parse_expr()?;
                p.expect_op(Operator::RParen)?;
                Ok(inner)
            }),
            other => Err(FormatError::new(
                ErrorCode::InvalidCondition,
                format!("expected a value, found {other}"),
            )
            .at(offset)),
        }
    }

    fn parse_steps(&mut self) -> Result<AccessChain> {
        let mut steps = AccessChain::new();
        loop {
            let offset = self.offset();
            let access = if self.eat_op(Operator::Dot) {
                Access::Attribute(self.parse_attribute()?)
            } else if self.eat_op(Operator::LBracket) {
                Access::Index(self.parse_index()?)
            } else {
                return Ok(steps);
            };
            steps.push(AccessStep { access, offset });
        }
    }

    fn parse_attribute(&mut self) -> Result<AttributeName> {
        let offset = self.offset();
        match self.next() {
            Some(Lexeme {
                kind: LexemeKind::Identifier(name),
                ..
            }) => AttributeName::new(name).map_err(|e| e.at(offset)),
            Some(l) => Err(FormatError::new(
                ErrorCode::InvalidAttribute,
                format!("expected an attribute name, found {}", l.kind),
            )
            .at(offset)),
            None => Err(FormatError::new(ErrorCode::EndOfString, "expected an attribute name")
                .at(self.end)),
        }
    }

    /// Content of `[...]` after the `[`: an integer, a string key, or a
    /// slice with optional integer bounds.
    fn parse_index(&mut self) -> Result<IndexingValue> {
        if let Some(LexemeKind::Literal(Variable::Str(key))) = self.peek_kind() {
            let key = key.to_string();
            self.pos += 1;
            self.expect_index_close()?;
            return Ok(IndexingValue::Key(key));
        }

        let begin = self.parse_bound()?;
        if self.eat_op(Operator::Colon) {
            let end = self.parse_bound()?;
            self.expect_index_close()?;
            return Ok(IndexingValue::Slice {
                begin: begin.unwrap_or(0),
                end,
            });
        }
        match begin {
            Some(n) => {
                self.expect_index_close()?;
                Ok(IndexingValue::Index(n))
            }
            None => Err(self.invalid_index()),
        }
    }

    fn parse_bound(&mut self) -> Result<Option<i64>> {
        match self.peek_kind() {
            Some(LexemeKind::Literal(Variable::Int(n))) => {
                let n = *n;
                self.pos += 1;
                Ok(Some(n))
            }
            Some(LexemeKind::Literal(_)) => Err(self.invalid_index()),
            _ => Ok(None),
        }
    }

    fn expect_index_close(&mut self) -> Result<()> {
        if self.eat_op(Operator::RBracket) {
            Ok(())
        } else {
            Err(self.invalid_index())
        }
    }

    fn invalid_index(&self) -> FormatError {
        match self.peek() {
            Some(l) => FormatError::new(
                ErrorCode::InvalidIndex,
                format!("invalid index {}", l.kind),
            )
            .at(l.offset),
            None => FormatError::new(ErrorCode::EndOfString, "unterminated index").at(self.end),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
