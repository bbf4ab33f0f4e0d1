// program ::= (use | extern | function | global)*
// use ::= '!' 'use' STRING ';'
// extern ::= 'extern' TYPE ID '(' [param (',' param)*] ')' ';'
// function ::= TYPE ID '(' [param (',' param)*] ')' block
// global ::= var_decl
// param ::= TYPE ID ['[' ']']
// TYPE ::= base_type ['*']
// block ::= '{' stmt* '}'
// stmt ::= var_decl
//        | 'if' '(' expr ')' block ['else' (block | if)]
//        | 'while' '(' expr ')' block
//        | 'return' [expr] ';'
//        | block
//        | expr '=' expr ';'
//        | expr ';'
// var_decl ::= TYPE ID ['[' INT ']'] ['=' expr] ';'
// expr ::= equality
// equality ::= comparison (('==' | '!=') comparison)*
// comparison ::= term (('<' | '>' | '<=' | '>=') term)*
// term ::= factor (('+' | '-') factor)*
// factor ::= unary (('*' | '/' | '%') primary)*
// unary ::= '-' unary | primary
// primary ::= INT | 'true' | 'false' | CHAR | STRING | '(' expr ')'
//           | ID ['@' ID] '(' [expr (',' expr)*] ')'
//           | ID ('[' expr ']')*

use std::fmt;

use crate::{token::Pos, types::Type};

#[derive(Debug, PartialEq, Default)]
pub struct Program {
    pub decls: Vec<TopLevel>,
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            TopLevel::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = &VarDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            TopLevel::Global(global) => Some(global),
            _ => None,
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum TopLevel {
    Function(FunctionDecl),
    Use(UseDecl),
    Global(VarDecl),
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub return_ty: Type,
    pub name: String,
    pub params: Vec<Param>,
    /// Absent iff `is_extern`.
    pub body: Option<Block>,
    pub is_extern: bool,
    pub pos: Pos,
}

impl FunctionDecl {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|param| param.ty).collect()
    }
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
}

#[derive(Debug, PartialEq)]
pub struct UseDecl {
    pub path: String,
    pub pos: Pos,
}

#[derive(Debug, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    VarDecl(VarDecl),
    Assign {
        target: Expr,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    Expr(Expr),
    Block(Block),
}

#[derive(Debug, PartialEq)]
pub struct VarDecl {
    /// For arrays, this is the array type itself (`is_array` is set).
    pub ty: Type,
    pub name: String,
    pub initializer: Option<Expr>,
    pub array_size: Option<u32>,
    pub pos: Pos,
}

impl VarDecl {
    pub fn is_array(&self) -> bool {
        self.ty.is_array
    }
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    String(Box<str>),
    Variable(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        /// The `module` in `callee@module(...)`.
        module: Option<String>,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Char(char),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Sub
                | BinaryOperator::Mul
                | BinaryOperator::Div
                | BinaryOperator::Rem
        )
    }

    /// The source (and C) spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
