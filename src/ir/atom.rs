//! Function Atoms
//!
//! Atoms are the statements of the program model: assignments, the three
//! arithmetic ops, builtin invocations, texture samples, and calls into
//! shader-library functions by name. Each atom carries the integer
//! stage-order key that groups it inside its function; the effective
//! execution order is the stable sort of atoms by that key.

use smallvec::SmallVec;

use super::mask::Mask;
use super::param::ParamId;
use crate::errors::{Result, RtssError};

/// How an operand touches its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// Reference to a parameter inside an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub param: ParamId,
    pub access: Access,
    pub mask: Mask,
}

impl Operand {
    #[must_use]
    pub fn read(param: ParamId, mask: Mask) -> Operand {
        Operand {
            param,
            access: Access::Read,
            mask,
        }
    }

    #[must_use]
    pub fn write(param: ParamId, mask: Mask) -> Operand {
        Operand {
            param,
            access: Access::Write,
            mask,
        }
    }

    #[must_use]
    pub fn read_write(param: ParamId, mask: Mask) -> Operand {
        Operand {
            param,
            access: Access::ReadWrite,
            mask,
        }
    }

    fn writes(&self) -> bool {
        matches!(self.access, Access::Write | Access::ReadWrite)
    }
}

/// Arithmetic operator of a binary atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

/// Builtin invocation with fixed arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `dst = normalize(src)`.
    Normalize,
    /// `dst = clamp(src, 0, 1)`.
    Saturate,
    /// `dst = mix(a, b, t)`, `t` a single lane.
    Lerp,
    /// `dst = dot(a, b)`, `dst` a single lane.
    Dot,
}

impl Builtin {
    fn arity(self) -> usize {
        match self {
            Builtin::Normalize | Builtin::Saturate => 2,
            Builtin::Dot => 3,
            Builtin::Lerp => 4,
        }
    }
}

/// Operation performed by an atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomOp {
    /// `dst = src`; arity 2.
    Assign,
    /// `dst = a <op> b`; arity 3.
    Binary(BinOp),
    /// `dst = sample(sampler, coord)`; arity 3.
    Sample,
    /// Builtin with its own fixed arity.
    Invoke(Builtin),
    /// Shader-library function call by name; the destination is whichever
    /// operands the callee writes.
    Call(String),
}

/// One statement of a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    op: AtomOp,
    stage: u32,
    operands: SmallVec<[Operand; 4]>,
}

impl Atom {
    /// Build an atom, validating arity and operand masks.
    ///
    /// Violations are internal invariants and abort the enclosing build.
    pub fn new(
        op: AtomOp,
        stage: u32,
        operands: impl IntoIterator<Item = Operand>,
    ) -> Result<Atom> {
        let operands: SmallVec<[Operand; 4]> = operands.into_iter().collect();

        let expected = match &op {
            AtomOp::Assign => Some(2),
            AtomOp::Binary(_) | AtomOp::Sample => Some(3),
            AtomOp::Invoke(builtin) => Some(builtin.arity()),
            AtomOp::Call(_) => None,
        };
        if let Some(expected) = expected
            && operands.len() != expected
        {
            return Err(RtssError::internal(format!(
                "atom {op:?} expects {expected} operands, got {}",
                operands.len()
            )));
        }
        if matches!(op, AtomOp::Call(_)) && operands.is_empty() {
            return Err(RtssError::internal("library call without operands"));
        }

        for operand in &operands {
            if operand.mask.is_empty() {
                return Err(RtssError::internal("operand with empty component mask"));
            }
            if operand.writes() && !operand.mask.is_contiguous() {
                return Err(RtssError::internal(format!(
                    "write mask {:?} is not contiguous",
                    operand.mask
                )));
            }
        }

        // Fixed-form atoms write through their first operand; read arity of
        // the value positions must agree with the destination lanes.
        match &op {
            AtomOp::Assign | AtomOp::Binary(_) => {
                let dst = &operands[0];
                if !dst.writes() {
                    return Err(RtssError::internal("first operand must be writable"));
                }
                for src in &operands[1..] {
                    if src.mask != Mask::ALL
                        && dst.mask != Mask::ALL
                        && src.mask.float_count() != dst.mask.float_count()
                    {
                        return Err(RtssError::internal(format!(
                            "read mask {:?} does not match write arity {:?}",
                            src.mask, dst.mask
                        )));
                    }
                }
            }
            AtomOp::Sample | AtomOp::Invoke(_) => {
                if !operands[0].writes() {
                    return Err(RtssError::internal("first operand must be writable"));
                }
            }
            AtomOp::Call(_) => {}
        }

        Ok(Atom { op, stage, operands })
    }

    #[must_use]
    pub fn op(&self) -> &AtomOp {
        &self.op
    }

    /// Stage-order group key.
    #[must_use]
    pub fn stage(&self) -> u32 {
        self.stage
    }

    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }
}
