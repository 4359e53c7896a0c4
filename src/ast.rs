//! Árbol de sintaxis abstracta.
//!
//! Los nodos son datos puros. Todo nodo al que otros nodos apuntan vive
//! en [`Nodes`], la arena de una compilación, y se refiere mediante un
//! [`Id`]. Las cadenas de operadores binarios asocian a la izquierda:
//! `1 - 2 - 3` es `TermOp(TermOp(1, 2), 3)`.

use crate::{
    arena::{Arena, ArenaError, Bump, Id},
    lex::Keyword,
};
use std::{
    fmt::{self, Display},
    ops::Index,
};

/// Una variable. Los nombres son exactamente una letra ASCII mayúscula.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(char);

impl Var {
    /// Valida un nombre de variable.
    pub fn new(name: &str) -> Option<Var> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_uppercase() => Some(Var(letter)),
            _ => None,
        }
    }
}

impl Display for Var {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// Una constante entera, preservada como texto hasta generación de código.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Num(String);

impl Num {
    pub fn new<S: Into<String>>(digits: S) -> Self {
        Num(digits.into())
    }

    /// Dígitos sin ceros a la izquierda. `"000"` se normaliza a `"0"`.
    pub fn normalized(&self) -> &str {
        match self.0.trim_start_matches('0') {
            "" => "0",
            digits => digits,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.normalized() == "0"
    }
}

impl Display for Num {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Factor {
    Var(Var),
    Num(Num),
    Paren(Id<Expr>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MulOp {
    Mul,
    Div,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddOp {
    Add,
    Sub,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// Cadena multiplicativa: un factor solo o un nodo `*`/`/`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Product {
    Factor(Id<Factor>),
    Op(Id<FactorOp>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactorOp {
    pub lhs: Product,
    pub rhs: Id<Factor>,
    pub op: MulOp,
}

/// Una cadena multiplicativa con signo unario opcional. Solo el primer
/// término de una expresión puede llevar signo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub body: Product,
    pub sign: Option<Sign>,
}

/// Cadena aditiva: un término solo o un nodo `+`/`-`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sum {
    Term(Id<Term>),
    Op(Id<TermOp>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermOp {
    pub lhs: Sum,
    pub rhs: Id<Term>,
    pub op: AddOp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub body: Sum,
}

/// Un argumento de PRINT.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintItem {
    Expr(Id<Expr>),
    Str(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExprList(pub Vec<PrintItem>);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarList(pub Vec<Var>);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Relop {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,

    /// `><`, se acepta con una advertencia.
    Crazy,
}

impl Display for Relop {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relop = match self {
            Relop::Eq => "=",
            Relop::Ne => "<>",
            Relop::Lt => "<",
            Relop::Lte => "<=",
            Relop::Gt => ">",
            Relop::Gte => ">=",
            Relop::Crazy => "><",
        };

        fmt.write_str(relop)
    }
}

/// Destino de GOTO/GOSUB. Se sabe que la expresión es un numeral simple,
/// el cual se guarda junto a ella.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub expr: Id<Expr>,
    pub line: Num,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stat {
    Print(ExprList),
    If {
        lhs: Id<Expr>,
        relop: Relop,
        rhs: Id<Expr>,
        then: Id<Stat>,
    },
    Goto(Target),
    Input(VarList),
    Let {
        var: Var,
        expr: Id<Expr>,
    },
    Gosub(Target),
    Return,
    Clear,
    List,
    Run,
    End,
}

impl Stat {
    /// Palabra clave que introduce esta sentencia.
    pub fn keyword(&self) -> Keyword {
        match self {
            Stat::Print(_) => Keyword::Print,
            Stat::If { .. } => Keyword::If,
            Stat::Goto(_) => Keyword::Goto,
            Stat::Input(_) => Keyword::Input,
            Stat::Let { .. } => Keyword::Let,
            Stat::Gosub(_) => Keyword::Gosub,
            Stat::Return => Keyword::Return,
            Stat::Clear => Keyword::Clear,
            Stat::List => Keyword::List,
            Stat::Run => Keyword::Run,
            Stat::End => Keyword::End,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub number: Option<Num>,
    pub stat: Id<Stat>,

    /// Posición en el archivo fuente, a partir de 1.
    pub source_line: u32,
}

/// Un programa analizado junto con la arena dueña de sus nodos.
pub struct Program {
    pub nodes: Nodes,
    pub lines: Vec<Line>,

    /// Todo destino de LET, en orden de primera aparición.
    pub variables: Vec<Var>,
}

impl Program {
    /// Texto fuente canónico de este programa.
    pub fn listing(&self) -> Listing<'_> {
        Listing { program: self }
    }
}

/// Arena de una compilación: un presupuesto de bytes compartido más una
/// arena tipada por cada clase de nodo.
pub struct Nodes {
    bump: Bump,
    factors: Arena<Factor>,
    factor_ops: Arena<FactorOp>,
    terms: Arena<Term>,
    term_ops: Arena<TermOp>,
    exprs: Arena<Expr>,
    stats: Arena<Stat>,
}

/// Un tipo de nodo almacenado en [`Nodes`].
pub trait Node: Sized {
    fn arena(nodes: &Nodes) -> &Arena<Self>;
    fn arena_mut(nodes: &mut Nodes) -> (&mut Arena<Self>, &mut Bump);
}

macro_rules! node {
    ($type:ty => $field:ident) => {
        impl Node for $type {
            fn arena(nodes: &Nodes) -> &Arena<Self> {
                &nodes.$field
            }

            fn arena_mut(nodes: &mut Nodes) -> (&mut Arena<Self>, &mut Bump) {
                (&mut nodes.$field, &mut nodes.bump)
            }
        }
    };
}

node!(Factor => factors);
node!(FactorOp => factor_ops);
node!(Term => terms);
node!(TermOp => term_ops);
node!(Expr => exprs);
node!(Stat => stats);

impl Nodes {
    pub fn new(capacity: usize) -> Self {
        Nodes {
            bump: Bump::new(capacity),
            factors: Arena::new(),
            factor_ops: Arena::new(),
            terms: Arena::new(),
            term_ops: Arena::new(),
            exprs: Arena::new(),
            stats: Arena::new(),
        }
    }

    pub fn alloc<T: Node>(&mut self, node: T) -> Result<Id<T>, ArenaError> {
        let (arena, bump) = T::arena_mut(self);
        arena.alloc(bump, node)
    }

    /// La constante de la que consiste una expresión, si no es más que un
    /// numeral simple: sin signo, sin operadores, sin paréntesis.
    pub fn constant(&self, expr: Id<Expr>) -> Option<&Num> {
        let term = match self[expr].body {
            Sum::Term(term) => &self[term],
            Sum::Op(_) => return None,
        };

        match (term.sign, term.body) {
            (None, Product::Factor(factor)) => match &self[factor] {
                Factor::Num(num) => Some(num),
                _ => None,
            },

            _ => None,
        }
    }
}

impl<T: Node> Index<Id<T>> for Nodes {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        &T::arena(self)[id]
    }
}

/// Muestra un programa como texto fuente que se analiza de vuelta al mismo árbol.
pub struct Listing<'a> {
    program: &'a Program,
}

impl Display for Listing<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = &self.program.nodes;

        for line in &self.program.lines {
            if let Some(number) = &line.number {
                write!(fmt, "{} ", number)?;
            }

            write_stat(fmt, nodes, line.stat)?;
            writeln!(fmt)?;
        }

        Ok(())
    }
}

fn write_stat(fmt: &mut fmt::Formatter<'_>, nodes: &Nodes, stat: Id<Stat>) -> fmt::Result {
    let stat = &nodes[stat];
    write!(fmt, "{}", stat.keyword())?;

    match stat {
        Stat::Print(ExprList(items)) => {
            for (i, item) in items.iter().enumerate() {
                fmt.write_str(if i == 0 { " " } else { ", " })?;
                match item {
                    PrintItem::Expr(expr) => write_expr(fmt, nodes, *expr)?,
                    PrintItem::Str(string) => write_string(fmt, string)?,
                }
            }

            Ok(())
        }

        Stat::If {
            lhs,
            relop,
            rhs,
            then,
        } => {
            fmt.write_str(" ")?;
            write_expr(fmt, nodes, *lhs)?;
            write!(fmt, " {} ", relop)?;
            write_expr(fmt, nodes, *rhs)?;
            write!(fmt, " {} ", Keyword::Then)?;
            write_stat(fmt, nodes, *then)
        }

        Stat::Goto(target) | Stat::Gosub(target) => {
            fmt.write_str(" ")?;
            write_expr(fmt, nodes, target.expr)
        }

        Stat::Input(VarList(vars)) => {
            for (i, var) in vars.iter().enumerate() {
                write!(fmt, "{}{}", if i == 0 { " " } else { ", " }, var)?;
            }

            Ok(())
        }

        Stat::Let { var, expr } => {
            write!(fmt, " {} = ", var)?;
            write_expr(fmt, nodes, *expr)
        }

        Stat::Return | Stat::Clear | Stat::List | Stat::Run | Stat::End => Ok(()),
    }
}

// Las cadenas se desenrollan en vectores para que secuencias largas de
// operadores no recurran una vez por operador.

fn write_expr(fmt: &mut fmt::Formatter<'_>, nodes: &Nodes, expr: Id<Expr>) -> fmt::Result {
    let mut rest = Vec::new();
    let mut body = nodes[expr].body;
    let first = loop {
        match body {
            Sum::Term(term) => break term,
            Sum::Op(op) => {
                let op = &nodes[op];
                rest.push((op.op, op.rhs));
                body = op.lhs;
            }
        }
    };

    write_term(fmt, nodes, first)?;
    for (op, term) in rest.into_iter().rev() {
        fmt.write_str(match op {
            AddOp::Add => " + ",
            AddOp::Sub => " - ",
        })?;

        write_term(fmt, nodes, term)?;
    }

    Ok(())
}

fn write_term(fmt: &mut fmt::Formatter<'_>, nodes: &Nodes, term: Id<Term>) -> fmt::Result {
    let term = &nodes[term];
    match term.sign {
        Some(Sign::Plus) => fmt.write_str("+")?,
        Some(Sign::Minus) => fmt.write_str("-")?,
        None => (),
    }

    let mut rest = Vec::new();
    let mut body = term.body;
    let first = loop {
        match body {
            Product::Factor(factor) => break factor,
            Product::Op(op) => {
                let op = &nodes[op];
                rest.push((op.op, op.rhs));
                body = op.lhs;
            }
        }
    };

    write_factor(fmt, nodes, first)?;
    for (op, factor) in rest.into_iter().rev() {
        fmt.write_str(match op {
            MulOp::Mul => " * ",
            MulOp::Div => " / ",
        })?;

        write_factor(fmt, nodes, factor)?;
    }

    Ok(())
}

fn write_factor(fmt: &mut fmt::Formatter<'_>, nodes: &Nodes, factor: Id<Factor>) -> fmt::Result {
    match &nodes[factor] {
        Factor::Var(var) => write!(fmt, "{}", var),
        Factor::Num(num) => write!(fmt, "{}", num),
        Factor::Paren(expr) => {
            fmt.write_str("(")?;
            write_expr(fmt, nodes, *expr)?;
            fmt.write_str(")")
        }
    }
}

fn write_string(fmt: &mut fmt::Formatter<'_>, string: &str) -> fmt::Result {
    fmt.write_str("\"")?;
    for c in string.chars() {
        match c {
            '\n' => fmt.write_str("\\n")?,
            '\t' => fmt.write_str("\\t")?,
            '"' => fmt.write_str("\\\"")?,
            '\\' => fmt.write_str("\\\\")?,
            c => write!(fmt, "{}", c)?,
        }
    }

    fmt.write_str("\"")
}
