//! Programs and Entry Functions
//!
//! A [`Program`] is the compilation unit of one GPU stage: an
//! insertion-ordered set of shader-library dependencies, a list of uniform
//! parameters, and exactly one entry [`Function`]. All parameters live in a
//! slotmap arena owned by the program; functions and atoms refer to them by
//! [`ParamId`] only.
//!
//! Deduplication across materials is content-addressed: two programs with
//! identical structure produce the same [`Program::structural_hash`]
//! regardless of which material drove their creation, of arena key values,
//! and of any emitted text.

use std::hash::{Hash, Hasher};

use slotmap::SlotMap;
use xxhash_rust::xxh3::Xxh3;

use super::atom::{Atom, Operand};
use super::param::{AutoBinding, Content, ParamId, ParamKind, Parameter};
use super::types::{GpuType, Stage};
use crate::errors::{Result, RtssError};

/// Entry function of a program: three parameter lists plus the atom list.
///
/// Atoms are stored in insertion order; [`Function::ordered_atoms`] yields
/// the effective execution order (stable sort by stage-order key).
#[derive(Debug, Clone, Default)]
pub struct Function {
    pub(crate) inputs: Vec<ParamId>,
    pub(crate) outputs: Vec<ParamId>,
    pub(crate) locals: Vec<ParamId>,
    pub(crate) atoms: Vec<Atom>,
}

impl Function {
    #[must_use]
    pub fn inputs(&self) -> &[ParamId] {
        &self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &[ParamId] {
        &self.outputs
    }

    #[must_use]
    pub fn locals(&self) -> &[ParamId] {
        &self.locals
    }

    /// Atoms in insertion order.
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Atoms in effective execution order: stable sort by stage-order key,
    /// insertion order breaking ties.
    #[must_use]
    pub fn ordered_atoms(&self) -> Vec<&Atom> {
        let mut ordered: Vec<&Atom> = self.atoms.iter().collect();
        ordered.sort_by_key(|atom| atom.stage());
        ordered
    }
}

/// A compilation unit of a single GPU stage.
#[derive(Debug, Clone)]
pub struct Program {
    stage: Stage,
    arena: SlotMap<ParamId, Parameter>,
    dependencies: Vec<String>,
    uniforms: Vec<ParamId>,
    main: Function,
}

impl Program {
    #[must_use]
    pub fn new(stage: Stage) -> Program {
        Program {
            stage,
            arena: SlotMap::with_key(),
            dependencies: Vec::new(),
            uniforms: Vec::new(),
            main: Function::default(),
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn main(&self) -> &Function {
        &self.main
    }

    #[must_use]
    pub fn param(&self, id: ParamId) -> &Parameter {
        &self.arena[id]
    }

    #[must_use]
    pub fn uniforms(&self) -> &[ParamId] {
        &self.uniforms
    }

    /// Shader-library dependencies in registration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Register a shader-library dependency; duplicates collapse.
    pub fn add_dependency(&mut self, name: &str) {
        if !self.dependencies.iter().any(|dep| dep == name) {
            self.dependencies.push(name.to_owned());
        }
    }

    // ── Parameter resolution ─────────────────────────────────────────────────

    /// Resolve an entry-function input by `(content, index)`.
    ///
    /// Idempotent: a matching existing parameter is returned as-is, and a
    /// type disagreement is a [`RtssError::ParameterConflict`].
    pub fn resolve_input(&mut self, content: Content, index: u32, ty: GpuType) -> Result<ParamId> {
        if let Some(&id) = self
            .main
            .inputs
            .iter()
            .find(|&&id| self.arena[id].content() == Some((content, index)))
        {
            return self.check_type(id, ty);
        }
        let id = self.arena.insert(Parameter::input(content, index, ty));
        self.main.inputs.push(id);
        Ok(id)
    }

    /// Resolve an entry-function output by `(content, index)`.
    ///
    /// On a fragment function the content is constrained to the declared
    /// fragment output set.
    pub fn resolve_output(&mut self, content: Content, index: u32, ty: GpuType) -> Result<ParamId> {
        if self.stage == Stage::Fragment && !content.is_fragment_output() {
            return Err(RtssError::internal(format!(
                "{content:?} is not a member of the fragment output set"
            )));
        }
        if let Some(&id) = self
            .main
            .outputs
            .iter()
            .find(|&&id| self.arena[id].content() == Some((content, index)))
        {
            return self.check_type(id, ty);
        }
        let id = self.arena.insert(Parameter::output(content, index, ty));
        self.main.outputs.push(id);
        Ok(id)
    }

    /// Create a fresh function-scope local. Names are unique per function.
    pub fn resolve_local(&mut self, ty: GpuType, name: &str) -> Result<ParamId> {
        if self
            .main
            .locals
            .iter()
            .any(|&id| self.arena[id].name == name)
        {
            return Err(RtssError::internal(format!("duplicate local name '{name}'")));
        }
        let id = self.arena.insert(Parameter::local(name, ty));
        self.main.locals.push(id);
        Ok(id)
    }

    /// Resolve an auto-bound uniform; requests for the same binding collapse.
    pub fn resolve_uniform(&mut self, binding: AutoBinding, ty: GpuType) -> Result<ParamId> {
        if let Some(&id) = self.uniforms.iter().find(
            |&&id| matches!(self.arena[id].kind, ParamKind::Uniform { binding: Some(b) } if b == binding),
        ) {
            return self.check_type(id, ty);
        }
        let id = self.arena.insert(Parameter::uniform(binding, ty));
        self.uniforms.push(id);
        Ok(id)
    }

    /// Resolve a user-set uniform by name.
    pub fn resolve_user_uniform(&mut self, name: &str, ty: GpuType) -> Result<ParamId> {
        if let Some(&id) = self.uniforms.iter().find(|&&id| {
            matches!(self.arena[id].kind, ParamKind::Uniform { binding: None })
                && self.arena[id].name == name
        }) {
            return self.check_type(id, ty);
        }
        let id = self.arena.insert(Parameter::user_uniform(name, ty));
        self.uniforms.push(id);
        Ok(id)
    }

    fn check_type(&self, id: ParamId, requested: GpuType) -> Result<ParamId> {
        let existing = &self.arena[id];
        if existing.ty == requested {
            Ok(id)
        } else {
            Err(RtssError::ParameterConflict {
                name: existing.name.clone(),
                existing: existing.ty,
                requested,
            })
        }
    }

    // ── Packer support ───────────────────────────────────────────────────────

    /// Insert a pre-built input parameter (merged varyings).
    pub(crate) fn add_input_raw(&mut self, param: Parameter) -> ParamId {
        let id = self.arena.insert(param);
        self.main.inputs.push(id);
        id
    }

    /// Insert a pre-built output parameter (merged varyings).
    pub(crate) fn add_output_raw(&mut self, param: Parameter) -> ParamId {
        let id = self.arena.insert(param);
        self.main.outputs.push(id);
        id
    }

    /// Remove an input parameter. Referencing it from a surviving atom is a
    /// programmer error.
    pub fn delete_input(&mut self, id: ParamId) {
        debug_assert!(!self.is_referenced(id), "deleted input is still referenced");
        self.main.inputs.retain(|&p| p != id);
        self.arena.remove(id);
    }

    /// Remove an output parameter. Referencing it from a surviving atom is a
    /// programmer error.
    pub fn delete_output(&mut self, id: ParamId) {
        debug_assert!(
            !self.is_referenced(id),
            "deleted output is still referenced"
        );
        self.main.outputs.retain(|&p| p != id);
        self.arena.remove(id);
    }

    fn is_referenced(&self, id: ParamId) -> bool {
        self.main
            .atoms
            .iter()
            .flat_map(Atom::operands)
            .any(|operand| operand.param == id)
    }

    // ── Atoms ────────────────────────────────────────────────────────────────

    /// Append an atom to the entry function.
    pub fn push_atom(&mut self, atom: Atom) {
        self.main.atoms.push(atom);
    }

    pub(crate) fn atoms_mut(&mut self) -> impl Iterator<Item = &mut Atom> {
        self.main.atoms.iter_mut()
    }

    // ── Validation and hashing ───────────────────────────────────────────────

    /// Check that every operand references a parameter reachable through the
    /// program's uniforms or the function's inputs/outputs/locals.
    pub fn validate(&self) -> Result<()> {
        for atom in &self.main.atoms {
            for operand in atom.operands() {
                if self.position_of(operand.param).is_none() {
                    return Err(RtssError::internal(format!(
                        "operand of {:?} references a parameter outside the program",
                        atom.op()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Stable structural digest over (dependencies, ordered parameter
    /// definitions, effective atom sequence).
    ///
    /// Operand references are hashed by the parameter's position in its
    /// list, never by arena key, so the digest is stable across builds.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();

        self.stage.hash(&mut hasher);
        self.dependencies.hash(&mut hasher);

        for section in [
            &self.uniforms,
            &self.main.inputs,
            &self.main.outputs,
            &self.main.locals,
        ] {
            section.len().hash(&mut hasher);
            for &id in section {
                self.arena[id].hash(&mut hasher);
            }
        }

        for atom in self.main.ordered_atoms() {
            atom.op().hash(&mut hasher);
            atom.stage().hash(&mut hasher);
            for operand in atom.operands() {
                let position = self
                    .position_of(operand.param)
                    .expect("validated before hashing");
                position.hash(&mut hasher);
                operand.access.hash(&mut hasher);
                operand.mask.bits().hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// `(section, index)` of a parameter: uniforms, inputs, outputs, locals.
    fn position_of(&self, id: ParamId) -> Option<(u8, usize)> {
        let sections: [&[ParamId]; 4] = [
            &self.uniforms,
            &self.main.inputs,
            &self.main.outputs,
            &self.main.locals,
        ];
        sections.iter().enumerate().find_map(|(section, list)| {
            list.iter()
                .position(|&p| p == id)
                .map(|index| (section as u8, index))
        })
    }
}

/// The vertex + fragment program pair under construction for one pass.
#[derive(Debug, Clone)]
pub struct ProgramSet {
    pub vertex: Program,
    pub fragment: Program,
}

impl Default for ProgramSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramSet {
    #[must_use]
    pub fn new() -> ProgramSet {
        ProgramSet {
            vertex: Program::new(Stage::Vertex),
            fragment: Program::new(Stage::Fragment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::mask::Mask;
    use crate::ir::atom::AtomOp;

    #[test]
    fn input_resolution_is_idempotent() {
        let mut program = Program::new(Stage::Vertex);
        let a = program
            .resolve_input(Content::NormalObjectSpace, 0, GpuType::Float3)
            .unwrap();
        let b = program
            .resolve_input(Content::NormalObjectSpace, 0, GpuType::Float3)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(program.main().inputs().len(), 1);
    }

    #[test]
    fn conflicting_type_is_rejected() {
        let mut program = Program::new(Stage::Vertex);
        program
            .resolve_input(Content::TextureCoordinate, 0, GpuType::Float2)
            .unwrap();
        let conflict = program.resolve_input(Content::TextureCoordinate, 0, GpuType::Float3);
        assert!(matches!(conflict, Err(RtssError::ParameterConflict { .. })));
    }

    #[test]
    fn fragment_outputs_are_constrained() {
        let mut program = Program::new(Stage::Fragment);
        assert!(
            program
                .resolve_output(Content::FragmentColor, 0, GpuType::Float4)
                .is_ok()
        );
        assert!(
            program
                .resolve_output(Content::ColorDiffuse, 0, GpuType::Float4)
                .is_err()
        );
    }

    #[test]
    fn duplicate_local_name_is_rejected() {
        let mut program = Program::new(Stage::Fragment);
        program.resolve_local(GpuType::Float4, "texel").unwrap();
        let dup = program.resolve_local(GpuType::Float4, "texel");
        assert!(matches!(dup, Err(RtssError::InternalInvariant(_))));
    }

    #[test]
    fn uniform_binding_requests_collapse() {
        let mut program = Program::new(Stage::Vertex);
        let a = program
            .resolve_uniform(AutoBinding::WorldMatrix, GpuType::Mat4)
            .unwrap();
        let b = program
            .resolve_uniform(AutoBinding::WorldMatrix, GpuType::Mat4)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(program.uniforms().len(), 1);
    }

    #[test]
    fn dependencies_keep_insertion_order_without_duplicates() {
        let mut program = Program::new(Stage::Vertex);
        program.add_dependency("FFPLib_Transform");
        program.add_dependency("FFPLib_Common");
        program.add_dependency("FFPLib_Transform");
        assert_eq!(
            program.dependencies(),
            ["FFPLib_Transform", "FFPLib_Common"]
        );
    }

    #[test]
    fn structural_hash_ignores_arena_key_values() {
        // Build the same structure twice, the second time with extra churn
        // in the arena so the key values differ.
        let build = |churn: bool| {
            let mut program = Program::new(Stage::Vertex);
            if churn {
                let tmp = program.resolve_local(GpuType::Float1, "tmp").unwrap();
                program.main.locals.retain(|&p| p != tmp);
                program.arena.remove(tmp);
            }
            program.add_dependency("FFPLib_Transform");
            let wvp = program
                .resolve_uniform(AutoBinding::WorldViewProjMatrix, GpuType::Mat4)
                .unwrap();
            let pos_in = program
                .resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)
                .unwrap();
            let pos_out = program
                .resolve_output(Content::PositionProjectiveSpace, 0, GpuType::Float4)
                .unwrap();
            program.push_atom(
                Atom::new(
                    AtomOp::Call("FFP_Transform".into()),
                    100,
                    [
                        Operand::read(wvp, Mask::ALL),
                        Operand::read(pos_in, Mask::ALL),
                        Operand::write(pos_out, Mask::ALL),
                    ],
                )
                .unwrap(),
            );
            program.structural_hash()
        };
        assert_eq!(build(false), build(true));
    }

    #[test]
    fn structural_hash_sees_atom_order() {
        // Same atoms, same stage-order key; only insertion order differs, so
        // the effective sequence differs and the digest must too.
        let build = |swap: bool| {
            let mut program = Program::new(Stage::Fragment);
            let out = program
                .resolve_output(Content::FragmentColor, 0, GpuType::Float4)
                .unwrap();
            let diffuse = program
                .resolve_input(Content::ColorDiffuse, 0, GpuType::Float4)
                .unwrap();
            let specular = program
                .resolve_input(Content::ColorSpecular, 0, GpuType::Float4)
                .unwrap();
            let mut sources = [diffuse, specular];
            if swap {
                sources.reverse();
            }
            for source in sources {
                program.push_atom(
                    Atom::new(
                        AtomOp::Assign,
                        5100,
                        [Operand::write(out, Mask::ALL), Operand::read(source, Mask::ALL)],
                    )
                    .unwrap(),
                );
            }
            program.structural_hash()
        };
        assert_ne!(build(false), build(true));
    }
}
