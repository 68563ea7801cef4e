//! Symbolic Program Model
//!
//! In-memory IR the sub-render-states lower into: programs, entry
//! functions, parameters, operands, and atoms. The model is deliberately
//! text-free; source emission happens once, at cache-finalization time.

mod atom;
mod mask;
mod param;
mod program;
mod types;

pub use atom::{Access, Atom, AtomOp, BinOp, Builtin, Operand};
pub use mask::Mask;
pub use param::{AutoBinding, Content, ParamId, ParamKind, Parameter, Semantic};
pub use program::{Function, Program, ProgramSet};
pub use types::{GpuType, Stage};
