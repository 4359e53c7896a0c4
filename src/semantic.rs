//! Reducción de AST a IR.
//!
//! Un único recorrido en orden de programa. Cada destino distinto de LET
//! posee un slot fijo, asignado en orden de primera asignación; las expresiones
//! se vuelven secuencias de máquina de pila; IF y RETURN toman etiquetas
//! de salto de un mismo contador creciente.

use std::collections::HashMap;
use thiserror::Error;

use crate::{
    arena::Id,
    ast::{self, *},
    ir::{self, BinOp, Condition, Instruction, Label, Slot, StringId},
    source::Located,
};

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Variable `{0}` is never assigned with `LET`")]
    Undeclared(Var),

    #[error("Integer literal `{0}` is out of range")]
    IntegerOverflow(String),
}

impl ast::Program {
    /// Reduce el programa completo.
    pub fn lower(&self) -> Semantic<ir::Program> {
        let slots = self
            .variables
            .iter()
            .zip(1..)
            .map(|(&var, slot)| (var, Slot(slot)))
            .collect();

        let mut context = Context {
            nodes: &self.nodes,
            slots,
            strings: Vec::new(),
            code: Vec::new(),
            last_skip: 0,
            line: 1,
        };

        for line in &self.lines {
            context.line = line.source_line;
            if let Some(number) = &line.number {
                context.push(Instruction::SetLabel(line_label(number)));
            }

            context.stat(line.stat)?;
        }

        Ok(ir::Program {
            slots: self.variables.len() as u32,
            strings: context.strings,
            code: context.code,
        })
    }
}

struct Context<'a> {
    nodes: &'a Nodes,
    slots: HashMap<Var, Slot>,
    strings: Vec<String>,
    code: Vec<Instruction>,
    last_skip: u32,
    line: u32,
}

impl Context<'_> {
    fn stat(&mut self, stat: Id<Stat>) -> Semantic<()> {
        let nodes = self.nodes;
        match &nodes[stat] {
            Stat::Print(ExprList(items)) => {
                for item in items {
                    match item {
                        PrintItem::Expr(expr) => {
                            self.expr(*expr)?;
                            self.push(Instruction::PrintInt);
                        }

                        PrintItem::Str(string) => {
                            let id = StringId(self.strings.len() as u32);
                            self.strings.push(string.clone());
                            self.push(Instruction::PrintStr(id));
                        }
                    }
                }

                self.push(Instruction::PrintNewline);
            }

            Stat::If {
                lhs,
                relop,
                rhs,
                then,
            } => {
                // `>` y `>=` son `<` y `<=` con los operandos extraídos en orden inverso
                let (condition, swapped) = match relop {
                    Relop::Eq => (Condition::Equal, false),
                    Relop::Ne | Relop::Crazy => (Condition::NotEqual, false),
                    Relop::Lt => (Condition::Less, false),
                    Relop::Lte => (Condition::LessOrEqual, false),
                    Relop::Gt => (Condition::Less, true),
                    Relop::Gte => (Condition::LessOrEqual, true),
                };

                self.expr(*lhs)?;
                self.expr(*rhs)?;

                let skip = self.skip_label();
                self.push(Instruction::SkipUnless {
                    condition,
                    swapped,
                    target: skip.clone(),
                });

                self.stat(*then)?;
                self.push(Instruction::SetLabel(skip));
            }

            Stat::Goto(target) => self.push(Instruction::Jump(line_label(&target.line))),
            Stat::Gosub(target) => self.push(Instruction::Gosub(line_label(&target.line))),

            Stat::Return => {
                let guard = self.skip_label();
                self.push(Instruction::Return(guard.clone()));
                self.push(Instruction::SetLabel(guard));
            }

            Stat::Input(VarList(vars)) => {
                for var in vars {
                    let slot = self.slot(*var)?;
                    self.push(Instruction::Input(slot));
                }
            }

            Stat::Let { var, expr } => {
                self.expr(*expr)?;
                let slot = self.slot(*var)?;
                self.push(Instruction::Store(slot));
            }

            Stat::End => self.push(Instruction::Jump(Label::End)),
            Stat::Clear | Stat::List | Stat::Run => (),
        }

        Ok(())
    }

    fn expr(&mut self, expr: Id<Expr>) -> Semantic<()> {
        let nodes = self.nodes;

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

        self.term(first)?;
        for (op, term) in rest.into_iter().rev() {
            self.term(term)?;
            self.push(Instruction::Binary(match op {
                AddOp::Add => BinOp::Add,
                AddOp::Sub => BinOp::Sub,
            }));
        }

        Ok(())
    }

    fn term(&mut self, term: Id<Term>) -> Semantic<()> {
        let nodes = self.nodes;
        let Term { body, sign } = nodes[term];

        // Un literal negado se pliega, así `-9223372036854775808` es representable
        if let (Some(Sign::Minus), Product::Factor(factor)) = (sign, body) {
            if let Factor::Num(num) = &nodes[factor] {
                let value = self.constant(&format!("-{}", num.normalized()))?;
                self.push(Instruction::PushConst(value));
                return Ok(());
            }
        }

        let mut rest = Vec::new();
        let mut body = body;
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

        self.factor(first)?;
        for (op, factor) in rest.into_iter().rev() {
            self.factor(factor)?;
            self.push(Instruction::Binary(match op {
                MulOp::Mul => BinOp::Mul,
                MulOp::Div => BinOp::Div,
            }));
        }

        if let Some(Sign::Minus) = sign {
            self.push(Instruction::Negate);
        }

        Ok(())
    }

    fn factor(&mut self, factor: Id<Factor>) -> Semantic<()> {
        let nodes = self.nodes;
        match &nodes[factor] {
            Factor::Var(var) => {
                let slot = self.slot(*var)?;
                self.push(Instruction::Load(slot));
            }

            Factor::Num(num) => {
                let value = self.constant(num.normalized())?;
                self.push(Instruction::PushConst(value));
            }

            Factor::Paren(expr) => self.expr(*expr)?,
        }

        Ok(())
    }

    fn constant(&self, digits: &str) -> Semantic<i64> {
        digits
            .parse()
            .map_err(|_| self.error(SemanticError::IntegerOverflow(digits.to_owned())))
    }

    fn slot(&self, var: Var) -> Semantic<Slot> {
        self.slots
            .get(&var)
            .copied()
            .ok_or_else(|| self.error(SemanticError::Undeclared(var)))
    }

    fn skip_label(&mut self) -> Label {
        self.last_skip += 1;
        Label::Skip(self.last_skip)
    }

    fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    fn error(&self, error: SemanticError) -> Located<SemanticError> {
        Located::at(error, self.line)
    }
}

fn line_label(number: &Num) -> Label {
    Label::Line(number.normalized().to_owned())
}
