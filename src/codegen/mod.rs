//! Generación de código ensamblador.
//!
//! Recorre un [`ir::Program`] a través de un [`Emitter`]. Los emisores
//! escriben en dos buffers independientes, la sección de datos y el flujo
//! de instrucciones, que se concatenan en un solo documento una vez que
//! se ha recorrido el programa completo.

use crate::{
    arch::{Emitter, Native},
    ir::{self, Instruction, Label},
};

use std::io::{self, Write};

/// Buffers de salida para un programa.
#[derive(Default)]
pub struct Context {
    data: Vec<u8>,
    text: Vec<u8>,
}

impl Context {
    pub fn data(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn text(&mut self) -> &mut Vec<u8> {
        &mut self.text
    }
}

/// Emite código ensamblador para la arquitectura nativa del compilador.
pub fn emit<W: Write>(program: &ir::Program, output: &mut W) -> io::Result<()> {
    emit_with::<Native<'_>, W>(program, output)
}

fn emit_with<'a, E, W>(program: &'a ir::Program, output: &mut W) -> io::Result<()>
where
    E: Emitter<'a>,
    W: Write,
{
    let mut emitter = E::new(Context::default(), program)?;
    for instruction in &program.code {
        put_instruction(&mut emitter, instruction)?;
    }

    let cx = emitter.epilogue()?;
    output.write_all(&cx.data)?;
    output.write_all(&cx.text)?;
    output.flush()
}

fn put_instruction<'a, E: Emitter<'a>>(emitter: &mut E, instruction: &Instruction) -> io::Result<()> {
    use Instruction::*;

    match instruction {
        SetLabel(label) => emitter.set_label(label),
        PushConst(value) => emitter.push_const(*value),
        Load(slot) => emitter.load(*slot),
        Store(slot) => emitter.store(*slot),
        Binary(op) => emitter.binary(*op),
        Negate => emitter.negate(),

        SkipUnless {
            condition,
            swapped,
            target,
        } => emitter.skip_unless(*condition, *swapped, target),

        Jump(target) => emitter.jump(target),
        Gosub(target) => emitter.gosub(target),
        Return(guard) => emitter.ret(guard),
        PrintInt => emitter.print_int(),
        PrintStr(string) => emitter.print_str(*string),
        PrintNewline => emitter.print_newline(),
        Input(slot) => emitter.input(*slot),
    }
}

/// Símbolo local de ensamblador para una etiqueta.
pub fn label_symbol(label: &Label) -> String {
    format!(".L{}", label)
}
