//! Pass Snapshots and the Material Provider Seam
//!
//! The generator never holds onto externally owned material objects; it
//! works from value-type [`PassDescriptor`] snapshots requested through
//! [`MaterialProvider`] and re-resolved on each use.
//!
//! Descriptors are hashable mirrors of render state the engine owns:
//! floating-point fields hash by bit pattern so that equal descriptors are
//! equal keys, which is what makes generated programs deduplicate across
//! materials.

use std::hash::{Hash, Hasher};

use glam::{Mat4, Vec4};
use smallvec::SmallVec;

/// Opaque handle of a technique owned by the material system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TechniqueHandle(pub u64);

/// Identifier of a program compiled and owned by the render system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompiledProgramId(pub u64);

/// Blend source argument of a layer blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendSource {
    /// Running color accumulated by earlier texture units.
    Current,
    /// The texel sampled by this unit.
    Texture,
    /// Interpolated per-vertex diffuse color.
    Diffuse,
    /// Interpolated per-vertex specular color.
    Specular,
    /// Manual constant supplied by the material author.
    Manual,
}

/// Blend operation of a layer blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Source1,
    Source2,
    Modulate,
    ModulateX2,
    ModulateX4,
    Add,
    AddSigned,
    AddSmooth,
    Subtract,
    BlendDiffuseAlpha,
    BlendTextureAlpha,
    BlendCurrentAlpha,
    BlendManual,
    DotProduct,
}

/// How a texture unit combines its sample with the running color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerBlend {
    pub op: BlendOp,
    pub source1: BlendSource,
    pub source2: BlendSource,
    /// Constant color for a `Manual` source.
    pub manual_color: Vec4,
    /// Blend weight for [`BlendOp::BlendManual`].
    pub manual_factor: f32,
}

impl LayerBlend {
    /// `op(source1, source2)` with no manual constants.
    #[must_use]
    pub fn new(op: BlendOp, source1: BlendSource, source2: BlendSource) -> LayerBlend {
        LayerBlend {
            op,
            source1,
            source2,
            manual_color: Vec4::ZERO,
            manual_factor: 0.0,
        }
    }

    /// True when the blend involves a manual constant.
    #[must_use]
    pub fn uses_manual(&self) -> bool {
        self.op == BlendOp::BlendManual
            || self.source1 == BlendSource::Manual
            || self.source2 == BlendSource::Manual
    }
}

impl Default for LayerBlend {
    fn default() -> Self {
        LayerBlend::new(BlendOp::Modulate, BlendSource::Texture, BlendSource::Current)
    }
}

impl Hash for LayerBlend {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        self.source1.hash(state);
        self.source2.hash(state);
        hash_vec4(self.manual_color, state);
        self.manual_factor.to_bits().hash(state);
    }
}

impl Eq for LayerBlend {}

/// Declared texture dimensionality of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Tex1d,
    Tex2d,
    Tex3d,
    Cube,
}

/// Environment-map flavor of [`TextureEffect::EnvironmentMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvMapKind {
    Curved,
    Planar,
    Reflection,
    Normal,
}

/// Per-unit effect flag from the fixed-function description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureEffect {
    EnvironmentMap(EnvMapKind),
    ProjectiveTexture,
}

/// Snapshot of one texture unit of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureUnitDesc {
    pub texture_type: TextureType,
    /// Which texcoord set of the geometry feeds this unit.
    pub texcoord_set: u32,
    pub effects: SmallVec<[TextureEffect; 2]>,
    pub color_blend: LayerBlend,
    pub alpha_blend: LayerBlend,
    /// Texture transform applied to the unit's coordinates, if any.
    pub texture_transform: Option<Mat4>,
}

impl Default for TextureUnitDesc {
    fn default() -> Self {
        TextureUnitDesc {
            texture_type: TextureType::Tex2d,
            texcoord_set: 0,
            effects: SmallVec::new(),
            color_blend: LayerBlend::default(),
            alpha_blend: LayerBlend::default(),
            texture_transform: None,
        }
    }
}

impl Hash for TextureUnitDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.texture_type.hash(state);
        self.texcoord_set.hash(state);
        self.effects.hash(state);
        self.color_blend.hash(state);
        self.alpha_blend.hash(state);
        match self.texture_transform {
            None => false.hash(state),
            Some(matrix) => {
                true.hash(state);
                for value in matrix.to_cols_array() {
                    value.to_bits().hash(state);
                }
            }
        }
    }
}

impl Eq for TextureUnitDesc {}

/// Fog curve of a pass-level fog override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FogMode {
    None,
    Linear,
    Exp,
    Exp2,
}

/// Pass-level fog override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogDesc {
    pub mode: FogMode,
    pub color: Vec4,
    pub density: f32,
    pub start: f32,
    pub end: f32,
}

impl Default for FogDesc {
    fn default() -> Self {
        FogDesc {
            mode: FogMode::None,
            color: Vec4::ZERO,
            density: 0.0,
            start: 0.0,
            end: 1.0,
        }
    }
}

impl Hash for FogDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mode.hash(state);
        hash_vec4(self.color, state);
        self.density.to_bits().hash(state);
        self.start.to_bits().hash(state);
        self.end.to_bits().hash(state);
    }
}

impl Eq for FogDesc {}

/// Comparison function of the alpha-rejection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    AlwaysPass,
    AlwaysFail,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    Greater,
}

/// Alpha-rejection settings of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaReject {
    pub func: CompareFunc,
    pub reference: f32,
}

impl Default for AlphaReject {
    fn default() -> Self {
        AlphaReject {
            func: CompareFunc::AlwaysPass,
            reference: 0.0,
        }
    }
}

impl Hash for AlphaReject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.func.hash(state);
        self.reference.to_bits().hash(state);
    }
}

impl Eq for AlphaReject {}

/// Value snapshot of everything the generator reads from a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emissive: Vec4,
    pub shininess: f32,
    pub lighting: bool,
    pub fog: FogDesc,
    pub texture_units: Vec<TextureUnitDesc>,
    pub alpha_reject: AlphaReject,
    pub point_sprites: bool,
}

impl Default for PassDescriptor {
    fn default() -> Self {
        PassDescriptor {
            ambient: Vec4::new(1.0, 1.0, 1.0, 1.0),
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vec4::ZERO,
            emissive: Vec4::ZERO,
            shininess: 0.0,
            lighting: true,
            fog: FogDesc::default(),
            texture_units: Vec::new(),
            alpha_reject: AlphaReject::default(),
            point_sprites: false,
        }
    }
}

impl Hash for PassDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_vec4(self.ambient, state);
        hash_vec4(self.diffuse, state);
        hash_vec4(self.specular, state);
        hash_vec4(self.emissive, state);
        self.shininess.to_bits().hash(state);
        self.lighting.hash(state);
        self.fog.hash(state);
        self.texture_units.hash(state);
        self.alpha_reject.hash(state);
        self.point_sprites.hash(state);
    }
}

impl Eq for PassDescriptor {}

fn hash_vec4<H: Hasher>(value: Vec4, state: &mut H) {
    for lane in value.to_array() {
        lane.to_bits().hash(state);
    }
}

/// The material system the generator collaborates with.
///
/// The generator holds no references into the material system; everything
/// is keyed by `(material, group)` names and re-resolved per call.
pub trait MaterialProvider {
    /// Snapshot of the given pass, or `None` if the material/pass is gone.
    fn pass_snapshot(
        &self,
        material: &str,
        group: &str,
        pass_index: usize,
    ) -> Option<PassDescriptor>;

    /// Clone the material's source technique under the given scheme,
    /// returning a handle to the shader-generated copy.
    fn clone_technique(&mut self, material: &str, group: &str, scheme: &str)
    -> Option<TechniqueHandle>;

    /// Install the cached program pair on a cloned technique.
    fn assign_programs(
        &mut self,
        technique: TechniqueHandle,
        vertex: CompiledProgramId,
        fragment: CompiledProgramId,
    );
}
