#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use tinybc::{
    ast,
    error::Diagnostics,
    ir::{BinOp, Condition, Instruction, Label, Program, Slot, StringId},
    source::{Located, Source},
    CompileError, Options,
};

/// Reduce un programa, haciendo fallar la prueba ante cualquier error fatal.
pub fn compile(source: &str) -> Program {
    match try_compile(source) {
        Ok(program) => program,
        Err(error) => panic!("failed to compile: {}", error),
    }
}

pub fn try_compile(source: &str) -> Result<Program, Located<CompileError>> {
    let source = Source::new("test.bas", source);
    tinybc::compile(&source, &Options::default(), &mut Diagnostics::new())
}

pub fn parse(source: &str) -> Result<ast::Program, Located<CompileError>> {
    let source = Source::new("test.bas", source);
    tinybc::parse_source(&source, &Options::default(), &mut Diagnostics::new())
}

/// Compila y ejecuta, retornando todo lo impreso.
pub fn exec(source: &str) -> String {
    exec_with_input(source, &[])
}

pub fn exec_with_input(source: &str, input: &[i64]) -> String {
    let program = compile(source);
    match Machine::new(&program, input).run(100_000) {
        Ok(output) => output,
        Err(fault) => panic!("program faulted: {:?}", fault),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Fault {
    DivideByZero,
    StackUnderflow,
    UnknownLabel(Label),
    CyclesExceeded,
}

/// Intérprete de referencia para la máquina de pila.
///
/// Refleja el código nativo: aquí los valores y las direcciones de retorno
/// viven en pilas separadas, pero GOSUB sigue siendo una llamada real y
/// RETURN solo consulta el contador de profundidad para decidir si hay una activa.
pub struct Machine<'a> {
    program: &'a Program,
    labels: HashMap<&'a Label, usize>,
    stack: Vec<i64>,
    calls: Vec<usize>,
    depth: u64,
    slots: Vec<i64>,
    input: VecDeque<i64>,
    output: String,
}

impl<'a> Machine<'a> {
    pub fn new(program: &'a Program, input: &[i64]) -> Self {
        let labels = program
            .code
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| match instruction {
                Instruction::SetLabel(label) => Some((label, index)),
                _ => None,
            })
            .collect();

        Machine {
            program,
            labels,
            stack: Vec::new(),
            calls: Vec::new(),
            depth: 0,
            slots: vec![0; program.slots as usize],
            input: input.iter().copied().collect(),
            output: String::new(),
        }
    }

    pub fn run(mut self, cycles: usize) -> Result<String, Fault> {
        let mut pc = 0;
        for _ in 0..cycles {
            let instruction = match self.program.code.get(pc) {
                Some(instruction) => instruction,
                None => return Ok(self.output),
            };

            pc += 1;
            match instruction {
                Instruction::SetLabel(_) => (),
                Instruction::PushConst(value) => self.stack.push(*value),
                Instruction::Load(slot) => {
                    let value = self.slots[index(*slot)];
                    self.stack.push(value);
                }

                Instruction::Store(slot) => {
                    let value = self.pop()?;
                    self.slots[index(*slot)] = value;
                }

                Instruction::Binary(op) => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let result = match op {
                        BinOp::Add => lhs.wrapping_add(rhs),
                        BinOp::Sub => lhs.wrapping_sub(rhs),
                        BinOp::Mul => lhs.wrapping_mul(rhs),
                        BinOp::Div => lhs.checked_div(rhs).ok_or(Fault::DivideByZero)?,
                    };

                    self.stack.push(result);
                }

                Instruction::Negate => {
                    let value = self.pop()?;
                    self.stack.push(value.wrapping_neg());
                }

                Instruction::SkipUnless {
                    condition,
                    swapped,
                    target,
                } => {
                    let top = self.pop()?;
                    let below = self.pop()?;
                    let (left, right) = if *swapped { (top, below) } else { (below, top) };

                    let holds = match condition {
                        Condition::Equal => left == right,
                        Condition::NotEqual => left != right,
                        Condition::Less => left < right,
                        Condition::LessOrEqual => left <= right,
                    };

                    if !holds {
                        pc = self.target(target)?;
                    }
                }

                Instruction::Jump(Label::End) => return Ok(self.output),
                Instruction::Jump(target) => pc = self.target(target)?,

                Instruction::Gosub(target) => {
                    self.depth += 1;
                    self.calls.push(pc);
                    pc = self.target(target)?;
                }

                Instruction::Return(guard) => {
                    if self.depth == 0 {
                        pc = self.target(guard)?;
                    } else {
                        self.depth -= 1;
                        pc = self.calls.pop().ok_or(Fault::StackUnderflow)?;
                    }
                }

                Instruction::PrintInt => {
                    let value = self.pop()?;
                    self.output.push_str(&value.to_string());
                }

                Instruction::PrintStr(StringId(id)) => {
                    self.output.push_str(&self.program.strings[*id as usize]);
                }

                Instruction::PrintNewline => self.output.push('\n'),

                // Una lectura fallida deja la variable intacta
                Instruction::Input(slot) => {
                    if let Some(value) = self.input.pop_front() {
                        self.slots[index(*slot)] = value;
                    }
                }
            }
        }

        Err(Fault::CyclesExceeded)
    }

    fn pop(&mut self) -> Result<i64, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    fn target(&self, label: &Label) -> Result<usize, Fault> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Fault::UnknownLabel(label.clone()))
    }
}

fn index(Slot(slot): Slot) -> usize {
    slot as usize - 1
}
