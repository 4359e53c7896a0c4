//! Implementación para x86-64 System V, ensamblador de GNU (sintaxis AT&T).
//!
//! La pila de expresiones es la pila de hardware. GOSUB es un `call`
//! simple, por lo cual las direcciones de retorno comparten esa pila; ambas
//! están balanceadas en cada frontera de sentencia. Como la profundidad de
//! pila en un punto de llamada no se conoce estáticamente, cada llamada a
//! la biblioteca de C realinea `%rsp` a 16 bytes por medio de `%rbx`.
//!
//! La salida es independiente de posición: los datos se direccionan
//! relativos a `%rip` y las llamadas a biblioteca pasan por la PLT.

use super::Emitter as _;
use crate::{
    codegen::{label_symbol, Context},
    ir::{BinOp, Condition, Label, Program, Slot, StringId},
};

use std::io::{self, Write};

/// Contador de profundidad de GOSUB/RETURN.
const DEPTH: &str = "gosub_depth(%rip)";

/// Implementación de emisión de código para x86-64.
pub struct Emitter<'a> {
    cx: Context,
    strings: &'a [String],
}

impl<'a> super::Emitter<'a> for Emitter<'a> {
    // Esta es una arquitectura de 64 bits
    const VALUE_SIZE: u32 = 8;

    fn new(cx: Context, program: &'a Program) -> io::Result<Self> {
        let mut emitter = Emitter {
            cx,
            strings: &program.strings,
        };

        let data = emitter.cx.data();
        writeln!(data, ".extern printf")?;
        writeln!(data, ".extern scanf")?;
        writeln!(data)?;
        writeln!(data, ".data")?;
        writeln!(data, ".balign {}", Self::VALUE_SIZE)?;
        writeln!(data, "gosub_depth:\t.quad 0")?;
        writeln!(data, "fmt_int:\t.asciz \"%lld\"")?;
        writeln!(data, "fmt_str:\t.asciz \"%s\"")?;
        writeln!(data, "fmt_newline:\t.asciz \"\\n\"")?;

        let text = emitter.cx.text();
        writeln!(text)?;
        writeln!(text, ".text")?;
        writeln!(text, ".globl main")?;
        writeln!(text, "main:")?;

        // Prólogo, %rbx pertenece al llamador y se restaura al salir
        emit!(emitter, "pushq", "%rbp")?;
        emit!(emitter, "movq", "%rsp, %rbp")?;
        emit!(emitter, "pushq", "%rbx")?;

        if program.slots > 0 {
            emit!(emitter, "subq", "${}, %rsp", program.slots * Self::VALUE_SIZE)?;
            for slot in (1..=program.slots).map(Slot) {
                let address = Self::slot_address(slot);
                emit!(emitter, "movq", "$0, {}", address)?;
            }
        }

        Ok(emitter)
    }

    fn epilogue(mut self) -> io::Result<Context> {
        self.set_label(&Label::End)?;

        emit!(self, "movq", "-{}(%rbp), %rbx", Self::VALUE_SIZE)?;
        emit!(self, "movq", "%rbp, %rsp")?;
        emit!(self, "popq", "%rbp")?;
        emit!(self, "xorl", "%eax, %eax")?;
        emit!(self, "ret")?;

        writeln!(self.cx.text())?;
        writeln!(self.cx.text(), ".section .note.GNU-stack,\"\",@progbits")?;

        Ok(self.cx)
    }

    fn cx(&mut self) -> &mut Context {
        &mut self.cx
    }

    fn push_const(&mut self, value: i64) -> io::Result<()> {
        // Los operandos inmediatos se extienden en signo desde 32 bits
        if i32::try_from(value).is_ok() {
            emit!(self, "pushq", "${}", value)
        } else {
            emit!(self, "movabsq", "${}, %rax", value)?;
            emit!(self, "pushq", "%rax")
        }
    }

    fn load(&mut self, slot: Slot) -> io::Result<()> {
        emit!(self, "pushq", "{}", Self::slot_address(slot))
    }

    fn store(&mut self, slot: Slot) -> io::Result<()> {
        emit!(self, "popq", "{}", Self::slot_address(slot))
    }

    fn binary(&mut self, op: BinOp) -> io::Result<()> {
        emit!(self, "popq", "%rcx")?;
        emit!(self, "popq", "%rax")?;

        match op {
            BinOp::Add => emit!(self, "addq", "%rcx, %rax")?,
            BinOp::Sub => emit!(self, "subq", "%rcx, %rax")?,
            BinOp::Mul => emit!(self, "imulq", "%rcx")?,
            BinOp::Div => {
                emit!(self, "cqto")?;
                emit!(self, "idivq", "%rcx")?;
            }
        }

        emit!(self, "pushq", "%rax")
    }

    fn negate(&mut self) -> io::Result<()> {
        emit!(self, "negq", "(%rsp)")
    }

    fn skip_unless(
        &mut self,
        condition: Condition,
        swapped: bool,
        target: &Label,
    ) -> io::Result<()> {
        // %rax termina siendo el lado izquierdo de la comparación
        let (first, second) = if swapped {
            ("%rax", "%rcx")
        } else {
            ("%rcx", "%rax")
        };

        emit!(self, "popq", "{}", first)?;
        emit!(self, "popq", "{}", second)?;
        emit!(self, "cmpq", "%rcx, %rax")?;

        let jump = match condition {
            Condition::Equal => "jne",
            Condition::NotEqual => "je",
            Condition::Less => "jge",
            Condition::LessOrEqual => "jg",
        };

        emit!(self, jump, "{}", label_symbol(target))
    }

    fn jump(&mut self, target: &Label) -> io::Result<()> {
        emit!(self, "jmp", "{}", label_symbol(target))
    }

    fn gosub(&mut self, target: &Label) -> io::Result<()> {
        emit!(self, "incq", "{}", DEPTH)?;
        emit!(self, "call", "{}", label_symbol(target))
    }

    fn ret(&mut self, guard: &Label) -> io::Result<()> {
        emit!(self, "cmpq", "$0, {}", DEPTH)?;
        emit!(self, "je", "{}", label_symbol(guard))?;
        emit!(self, "decq", "{}", DEPTH)?;
        emit!(self, "ret")
    }

    fn print_int(&mut self) -> io::Result<()> {
        emit!(self, "popq", "%rsi")?;
        emit!(self, "leaq", "fmt_int(%rip), %rdi")?;
        self.call_c("printf")
    }

    fn print_str(&mut self, StringId(id): StringId) -> io::Result<()> {
        let strings = self.strings;
        let string = strings.get(id as usize).map_or("", String::as_str);

        let data = self.cx.data();
        write!(data, "str_{}:\t.asciz \"", id)?;
        write_escaped(data, string)?;
        writeln!(data, "\"")?;

        emit!(self, "leaq", "str_{}(%rip), %rsi", id)?;
        emit!(self, "leaq", "fmt_str(%rip), %rdi")?;
        self.call_c("printf")
    }

    fn print_newline(&mut self) -> io::Result<()> {
        emit!(self, "leaq", "fmt_newline(%rip), %rdi")?;
        self.call_c("printf")
    }

    fn input(&mut self, slot: Slot) -> io::Result<()> {
        emit!(self, "leaq", "{}, %rsi", Self::slot_address(slot))?;
        emit!(self, "leaq", "fmt_int(%rip), %rdi")?;
        self.call_c("scanf")
    }
}

impl Emitter<'_> {
    /// Invoca una función variádica de C con argumentos ya en registros.
    fn call_c(&mut self, function: &str) -> io::Result<()> {
        // No se usan registros vectoriales para argumentos variádicos
        emit!(self, "xorl", "%eax, %eax")?;
        emit!(self, "movq", "%rsp, %rbx")?;
        emit!(self, "andq", "$-16, %rsp")?;
        emit!(self, "call", "{}@PLT", function)?;
        emit!(self, "movq", "%rbx, %rsp")
    }

    /// El slot `n` vive justo debajo del `%rbx` preservado.
    fn slot_address(Slot(slot): Slot) -> String {
        format!("-{}(%rbp)", Self::VALUE_SIZE * (slot + 1))
    }
}

/// Escribe una cadena en sintaxis `.asciz`, con bytes no imprimibles en octal.
fn write_escaped<W: Write>(output: &mut W, string: &str) -> io::Result<()> {
    for byte in string.bytes() {
        match byte {
            b'"' => output.write_all(b"\\\"")?,
            b'\\' => output.write_all(b"\\\\")?,
            b' '..=b'~' => output.write_all(&[byte])?,
            _ => write!(output, "\\{:03o}", byte)?,
        }
    }

    Ok(())
}
