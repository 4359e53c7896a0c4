//! Detalles específicos de la arquitectura objetivo.
//!
//! Este módulo expone la interfaz de generación de código que cada
//! arquitectura implementa en su propio submódulo. El recorrido en
//! [`crate::codegen`] solamente interactúa con un [`Emitter`].

use crate::{
    codegen::{label_symbol, Context},
    ir::{BinOp, Condition, Label, Program, Slot, StringId},
};

use std::io::{self, Write};

mod x86_64;

pub use x86_64::Emitter as X86_64;

/// Arquitectura sobre la que corre el compilador.
pub type Native<'a> = X86_64<'a>;

/// Emisión de código ensamblador para un programa.
///
/// Los tipos que implementan este trait traducen operaciones primitivas
/// de la máquina de pila intermedia a código máquina para su arquitectura.
/// La sección de datos y el flujo de instrucciones se escriben en buffers
/// separados del [`Context`].
pub trait Emitter<'a>: Sized {
    /// Tamaño natural de un valor, en bytes.
    const VALUE_SIZE: u32;

    /// Construir a partir de un contexto de emisión y el programa a emitir.
    ///
    /// Las importaciones, los datos fijos y el prólogo de entrada se emiten aquí.
    fn new(cx: Context, program: &'a Program) -> io::Result<Self>;

    /// Emite el epílogo compartido y devuelve los buffers terminados.
    fn epilogue(self) -> io::Result<Context>;

    /// Obtiene el contexto de emisión.
    fn cx(&mut self) -> &mut Context;

    /// Define una etiqueta en la posición actual.
    fn set_label(&mut self, label: &Label) -> io::Result<()> {
        writeln!(self.cx().text(), "{}:", label_symbol(label))
    }

    /// Apila una constante.
    fn push_const(&mut self, value: i64) -> io::Result<()>;

    /// Apila los contenidos del slot de una variable.
    fn load(&mut self, slot: Slot) -> io::Result<()>;

    /// Extrae hacia el slot de una variable.
    fn store(&mut self, slot: Slot) -> io::Result<()>;

    /// Extrae dos operandos, apila el resultado.
    fn binary(&mut self, op: BinOp) -> io::Result<()>;

    /// Niega el valor en el tope de la pila.
    fn negate(&mut self) -> io::Result<()>;

    /// Extrae dos operandos y salta a `target` a menos que se cumpla `condition`.
    fn skip_unless(&mut self, condition: Condition, swapped: bool, target: &Label)
        -> io::Result<()>;

    /// Saltar incondicionalmente a una etiqueta.
    fn jump(&mut self, target: &Label) -> io::Result<()>;

    /// Incrementa el contador de profundidad y realiza una llamada de hardware.
    fn gosub(&mut self, target: &Label) -> io::Result<()>;

    /// Retorno de hardware si el contador de profundidad no es cero, de lo
    /// contrario un salto a `guard`.
    fn ret(&mut self, guard: &Label) -> io::Result<()>;

    /// Extrae e imprime un entero con signo.
    fn print_int(&mut self) -> io::Result<()>;

    /// Imprime una cadena del programa.
    fn print_str(&mut self, string: StringId) -> io::Result<()>;

    fn print_newline(&mut self) -> io::Result<()>;

    /// Lee un entero con signo hacia un slot.
    fn input(&mut self, slot: Slot) -> io::Result<()>;
}
