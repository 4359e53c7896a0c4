//! Representación intermedia.
//!
//! Un listado plano de máquina de pila. Todo valor es un entero con signo de
//! 64 bits; las hojas apilan y los operadores binarios extraen dos operandos
//! y apilan un resultado. El flujo de control usa [`Label`]s simbólicas.

use std::fmt::{self, Display};

pub struct Program {
    /// Cantidad de slots de variables, numerados a partir de 1.
    pub slots: u32,

    /// Cadenas de PRINT, una entrada por aparición.
    pub strings: Vec<String>,

    pub code: Vec<Instruction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// Una línea declarada, por número normalizado.
    Line(String),

    /// Generada por el compilador, numerada a partir de 1.
    Skip(u32),

    /// Epílogo compartido.
    End,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StringId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    SetLabel(Label),
    PushConst(i64),
    Load(Slot),
    Store(Slot),

    /// Extrae rhs, luego lhs; apila `lhs op rhs`.
    Binary(BinOp),

    Negate,

    /// Extrae dos operandos y salta a `target` a menos que `condition` se
    /// cumpla entre ellos. El tope de la pila es el operando derecho, excepto
    /// si `swapped` está activo, en cuyo caso es el izquierdo.
    SkipUnless {
        condition: Condition,
        swapped: bool,
        target: Label,
    },

    Jump(Label),

    /// Incrementa el contador de profundidad e invoca a `Label`.
    Gosub(Label),

    /// Retorna del GOSUB más interno, o continúa en `guard` si no hay
    /// ninguno activo.
    Return(Label),

    PrintInt,
    PrintStr(StringId),
    PrintNewline,
    Input(Slot),
}

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Line(number) => write!(fmt, "line{}", number),
            Label::Skip(skip) => write!(fmt, "skip{}", skip),
            Label::End => fmt.write_str("end"),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            SetLabel(label) => write!(fmt, "{}:", label),
            PushConst(value) => write!(fmt, "\tpush {}", value),
            Load(Slot(slot)) => write!(fmt, "\tload ${}", slot),
            Store(Slot(slot)) => write!(fmt, "\tstore ${}", slot),
            Binary(op) => write!(fmt, "\t{:?}", op),
            Negate => fmt.write_str("\tneg"),

            SkipUnless {
                condition,
                swapped,
                target,
            } => {
                let order = if *swapped { " swapped" } else { "" };
                write!(fmt, "\tskip unless {:?}{} -> {}", condition, order, target)
            }

            Jump(label) => write!(fmt, "\tjump {}", label),
            Gosub(label) => write!(fmt, "\tgosub {}", label),
            Return(guard) => write!(fmt, "\treturn else {}", guard),
            PrintInt => fmt.write_str("\tprint int"),
            PrintStr(StringId(id)) => write!(fmt, "\tprint str{}", id),
            PrintNewline => fmt.write_str("\tprint newline"),
            Input(Slot(slot)) => write!(fmt, "\tinput ${}", slot),
        }
    }
}

impl Display for Program {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "slots: {}", self.slots)?;
        for (id, string) in self.strings.iter().enumerate() {
            writeln!(fmt, "str{}: {:?}", id, string)?;
        }

        for instruction in &self.code {
            writeln!(fmt, "{}", instruction)?;
        }

        Ok(())
    }
}
