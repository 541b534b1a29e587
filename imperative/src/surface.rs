use std::{fmt::Display, rc::Rc};

use crate::util::{Located, Location};

// names that bind or reference declarations, along with where they were written
pub type Binder = Located<String>;

// a whole program: a sequence of top-level statements
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stms: Vec<Stm>,
}

// statements in the surface language
pub type Stm = Located<StmData>;
#[derive(Debug, Clone, PartialEq)]
pub enum StmData {
    // Variable declarations: [ var x : INT; ]
    VarDecl { id: Binder, ty: Binder },

    // Assignments: [ x := e; ]
    Assign { id: Binder, exp: Exp },

    // Reading a line of input into a variable: [ input x; ]
    Input { id: Binder },

    // Printing the value of an expression: [ print e; ]
    Print { exp: Exp },

    // Conditionals, without an else branch: [ if e { ... } ]
    If { cond: Exp, stms: Vec<Stm> },

    // Loops: [ while e { ... } ]
    While { cond: Exp, stms: Vec<Stm> },

    // Bare blocks, which only introduce a scope: [ { ... } ]
    Block { stms: Vec<Stm> },

    // Procedure declarations: [ proc p(a : INT, b : STRING) { ... } ]
    // The body is shared with the procedure symbol so it can be run on each call.
    ProcedureDecl {
        name: Binder,
        params: Vec<Param>,
        stms: Rc<Vec<Stm>>,
    },

    // Procedure calls: [ p(1, "x"); ]
    ProcedureCall { name: Binder, args: Vec<Exp> },
}

// procedure parameters, which are always annotated with a type
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: Binder,
    pub ty: Binder,
}

// expressions in the surface language
pub type Exp = Located<ExpData>;
#[derive(Debug, Clone, PartialEq)]
pub enum ExpData {
    // References to variables: [ x ]
    Name { name: String },

    // Literals: [ true ], [ 1 ], [ "hello" ]
    BoolLit { b: bool },
    IntLit { i: i64 },
    StrLit { s: String },

    // Prefix operators: [ -x ]
    Prefix { op: PrefixOp, exp: Rc<Exp> },

    // Infix operators: [ x + y ]
    Infix {
        op: InfixOp,
        exp1: Rc<Exp>,
        exp2: Rc<Exp>,
    },
}

// prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Plus,
    Minus,
    Not,
}

// infix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Sum,
    Sub,
    Mul,
    Div,

    Equals,
    NotEquals,

    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl InfixOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            InfixOp::Sum | InfixOp::Sub | InfixOp::Mul | InfixOp::Div
        )
    }
}

pub fn prefix(location: Location, op: PrefixOp, exp: Exp) -> Exp {
    Exp::new(
        location,
        ExpData::Prefix {
            op,
            exp: Rc::new(exp),
        },
    )
}

// an infix expression, located from the start of the first operand to the end of the second
pub fn infix(op: InfixOp, exp1: Exp, exp2: Exp) -> Exp {
    Exp::new(
        exp1.location.join(&exp2.location),
        ExpData::Infix {
            op,
            exp1: Rc::new(exp1),
            exp2: Rc::new(exp2),
        },
    )
}

impl Display for PrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixOp::Plus => "+",
            PrefixOp::Minus => "-",
            PrefixOp::Not => "not",
        }
        .fmt(f)
    }
}

impl Display for InfixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOp::Sum => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Equals => "==",
            InfixOp::NotEquals => "!=",
            InfixOp::GreaterThan => ">",
            InfixOp::GreaterOrEqual => ">=",
            InfixOp::LessThan => "<",
            InfixOp::LessOrEqual => "<=",
        }
        .fmt(f)
    }
}
