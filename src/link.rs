//! Construcción de ejecutables.
//!
//! Una vez que se ha emitido código ensamblador, este debe ser ensamblado
//! y enlazado contra la biblioteca de C para producir un ejecutable. Ambos
//! pasos se delegan a `gcc`, que lee el ensamblador desde un pipe.

use std::{
    io::BufWriter,
    path::Path,
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
};

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Opciones a aplicar durante el enlazado.
    pub struct LinkOptions: u32 {
        /// Remover símbolos del ejecutable final.
        const STRIP = 0x01;

        /// Producir un ejecutable dependiente de posición.
        const NO_PIE = 0x02;
    }
}

/// Un error de ensamblado o enlazado.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkerError {
    /// Ocurrió un error de E/S durante la invocación de comandos externos.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// El ensamblador no expuso un pipe para su entrada estándar.
    #[error("Linker standard input is not available")]
    Stdin,

    /// El enlazador inició su ejecución, pero falló en enlazar.
    #[error("Linker exited with status code {0:?}")]
    Failed(ExitStatus),
}

/// Instancia del enlazador para un ejecutable definido.
pub struct Linker {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

impl Linker {
    /// Comando que ensambla y enlaza.
    const COMMAND: &'static str = "gcc";

    /// Inicia una instancia del enlazador.
    ///
    /// El enlazador tratará de emitir un ejecutable y escribirlo a
    /// la ruta indicada por `output`.
    pub fn spawn<O>(output: &O, opts: LinkOptions) -> Result<Self, LinkerError>
    where
        O: AsRef<Path> + ?Sized,
    {
        let mut command = Command::new(Self::COMMAND);
        command
            .arg("-o")
            .arg(output.as_ref())
            .args(&["-xassembler", "-"])
            .stdin(Stdio::piped());

        if opts.contains(LinkOptions::STRIP) {
            command.arg("-s");
        }

        if opts.contains(LinkOptions::NO_PIE) {
            command.arg("-no-pie");
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or(LinkerError::Stdin)?;

        Ok(Linker {
            child,
            stdin: BufWriter::new(stdin),
        })
    }

    /// Obtiene la entrada estándar del proceso que espera recibir ensamblador.
    ///
    /// Luego de [`Linker::spawn()`], se debe escribir aquí el ensamblador en la
    /// forma exacta en que fue emitido por la generación de código.
    pub fn stdin(&mut self) -> &mut BufWriter<ChildStdin> {
        &mut self.stdin
    }

    /// Indica el fin del flujo de código y espera al enlazador.
    pub fn finish(self) -> Result<(), LinkerError> {
        let Linker { mut child, stdin } = self;

        // Vacía y cierra el pipe
        stdin.into_inner().map_err(|error| error.into_error())?;

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(LinkerError::Failed(status))
        }
    }
}
