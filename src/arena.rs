//! Almacenamiento de nodos para una compilación.
//!
//! El AST es una gran población de nodos pequeños que se refieren entre sí.
//! Los nodos viven en [`Arena`]s tipadas y se refieren unos a otros mediante
//! handles enteros ([`Id`]), por lo cual no hay lifetimes por nodo y nada
//! se libera antes de que se descarte la compilación completa.
//!
//! Todas las arenas de una compilación consumen un mismo presupuesto fijo de
//! bytes, un [`Bump`]. Cada asignación reserva espacio alineado para un valor
//! tal como lo haría un bump allocator sobre un único buffer, y falla
//! cuando la capacidad restante no es suficiente.

use std::{
    alloc::Layout,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use thiserror::Error;

/// Presupuesto por defecto: 4 MiB.
pub const DEFAULT_ARENA_CAPACITY: usize = 4 * 1024 * 1024;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("Out of memory: arena capacity of {capacity} bytes exhausted")]
    OutOfMemory { capacity: usize },
}

/// Un presupuesto fijo de bytes con un desplazamiento creciente.
#[derive(Debug)]
pub struct Bump {
    capacity: usize,
    offset: usize,
}

impl Bump {
    pub fn new(capacity: usize) -> Self {
        Bump {
            capacity,
            offset: 0,
        }
    }

    /// Reserva espacio alineado para un `T`.
    pub fn reserve<T>(&mut self) -> Result<(), ArenaError> {
        let layout = Layout::new::<T>();

        let padding = (layout.align() - self.offset % layout.align()) % layout.align();
        let end = self
            .offset
            .checked_add(padding)
            .and_then(|start| start.checked_add(layout.size()))
            .filter(|&end| end <= self.capacity)
            .ok_or(ArenaError::OutOfMemory {
                capacity: self.capacity,
            })?;

        self.offset = end;
        Ok(())
    }
}

impl Default for Bump {
    fn default() -> Self {
        Bump::new(DEFAULT_ARENA_CAPACITY)
    }
}

/// Handle a un valor de tipo `T` en una [`Arena<T>`].
pub struct Id<T> {
    index: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "#{}", self.index)
    }
}

/// Almacenamiento de solo inserción para un tipo de nodo.
pub struct Arena<T> {
    nodes: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    /// Coloca `node` en la arena, cargando su tamaño a `bump`.
    pub fn alloc(&mut self, bump: &mut Bump, node: T) -> Result<Id<T>, ArenaError> {
        bump.reserve::<T>()?;

        let index = self.nodes.len();
        self.nodes.push(node);

        Ok(Id {
            index,
            marker: PhantomData,
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena::new()
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        &self.nodes[id.index]
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.nodes[id.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_pads_for_alignment() {
        let mut bump = Bump::new(64);

        bump.reserve::<u8>().unwrap();
        assert_eq!(bump.offset, 1);

        bump.reserve::<u64>().unwrap();
        assert_eq!(bump.offset, 16);
    }

    #[test]
    fn exhausted_budget_fails() {
        let mut bump = Bump::new(12);
        let mut arena = Arena::new();

        arena.alloc(&mut bump, 1u64).unwrap();
        assert_eq!(
            arena.alloc(&mut bump, 2u64),
            Err(ArenaError::OutOfMemory { capacity: 12 })
        );
        assert_eq!(bump.offset, 8);
    }

    #[test]
    fn handles_stay_valid() {
        let mut bump = Bump::default();
        let mut arena = Arena::new();

        let first = arena.alloc(&mut bump, String::from("first")).unwrap();
        let ids: Vec<_> = (0..100)
            .map(|n| arena.alloc(&mut bump, n.to_string()).unwrap())
            .collect();

        arena[first].push('!');
        assert_eq!(arena[first], "first!");
        assert_eq!(arena[ids[42]], "42");
    }
}
