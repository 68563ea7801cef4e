//! Program Parameters
//!
//! A parameter is the unit of data flow in the program model. Entry-function
//! inputs and outputs are identified by `(semantic, content, index)`; locals
//! and uniforms are identified by name. Uniforms additionally carry an
//! auto-binding naming the engine quantity that feeds them each frame, or
//! declare themselves user-set.

use slotmap::new_key_type;

use super::types::GpuType;

new_key_type! {
    /// Handle of a parameter inside its program's arena.
    pub struct ParamId;
}

/// Hardware attribute semantic of an input/output parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Color,
    TexCoord,
    Tangent,
    Binormal,
    BlendWeights,
    BlendIndices,
}

/// Abstract meaning of an input/output parameter.
///
/// Content tags are what dedup parameter requests across sub-render-states:
/// two resolutions of the same `(content, index)` pair yield the same
/// parameter object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Content {
    PositionObjectSpace,
    PositionProjectiveSpace,
    PositionViewSpace,
    NormalObjectSpace,
    NormalViewSpace,
    ColorDiffuse,
    ColorSpecular,
    TextureCoordinate,
    /// Per-vertex fog attenuation factor, interpolated like a texcoord.
    FogFactor,
    /// Final fragment color, the sole member of the fragment output set.
    FragmentColor,
}

impl Content {
    /// Semantic the content maps onto.
    #[must_use]
    pub fn semantic(self) -> Semantic {
        match self {
            Content::PositionObjectSpace
            | Content::PositionProjectiveSpace
            | Content::PositionViewSpace => Semantic::Position,
            Content::NormalObjectSpace | Content::NormalViewSpace => Semantic::Normal,
            Content::ColorDiffuse | Content::ColorSpecular | Content::FragmentColor => {
                Semantic::Color
            }
            Content::TextureCoordinate | Content::FogFactor => Semantic::TexCoord,
        }
    }

    /// True for contents allowed as fragment-function outputs.
    #[must_use]
    pub fn is_fragment_output(self) -> bool {
        matches!(self, Content::FragmentColor)
    }

    /// Short name fragment used when generating parameter names.
    #[must_use]
    pub(crate) fn name_stem(self) -> &'static str {
        match self {
            Content::PositionObjectSpace => "position_os",
            Content::PositionProjectiveSpace => "position_proj",
            Content::PositionViewSpace => "position_vs",
            Content::NormalObjectSpace => "normal_os",
            Content::NormalViewSpace => "normal_vs",
            Content::ColorDiffuse => "diffuse",
            Content::ColorSpecular => "specular",
            Content::TextureCoordinate => "texcoord",
            Content::FogFactor => "fog_factor",
            Content::FragmentColor => "frag_color",
        }
    }
}

/// Well-known engine quantity feeding an auto-bound uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoBinding {
    WorldMatrix,
    ViewMatrix,
    ProjectionMatrix,
    WorldViewMatrix,
    WorldViewProjMatrix,
    InverseTransposeWorldMatrix,
    InverseTransposeWorldViewMatrix,
    /// Texture transform matrix of the given texture unit.
    TextureMatrix(u32),
    /// Projector view-projection matrix of the given texture unit.
    TextureViewProjMatrix(u32),
    /// Sampler bound to the given texture unit.
    TextureSampler(u32),
    CameraPositionObjectSpace,
    AmbientLightColor,
    /// Scene ambient modulated by surface ambient, plus surface emissive.
    DerivedSceneColor,
    SurfaceDiffuse,
    SurfaceSpecular,
    SurfaceShininess,
    AlphaRejectionValue,
    LightPositionViewSpace(u32),
    LightDirectionViewSpace(u32),
    LightDiffuseColor(u32),
    LightSpecularColor(u32),
    LightAttenuation(u32),
    SpotlightParams(u32),
    FogColor,
    /// `(density, linear start, linear end, 1 / (end - start))`.
    FogParams,
}

impl AutoBinding {
    /// Generated uniform name for the binding.
    #[must_use]
    pub fn uniform_name(self) -> String {
        match self {
            AutoBinding::WorldMatrix => "world_matrix".into(),
            AutoBinding::ViewMatrix => "view_matrix".into(),
            AutoBinding::ProjectionMatrix => "projection_matrix".into(),
            AutoBinding::WorldViewMatrix => "worldview_matrix".into(),
            AutoBinding::WorldViewProjMatrix => "worldviewproj_matrix".into(),
            AutoBinding::InverseTransposeWorldMatrix => "inv_transpose_world_matrix".into(),
            AutoBinding::InverseTransposeWorldViewMatrix => "inv_transpose_worldview_matrix".into(),
            AutoBinding::TextureMatrix(unit) => format!("texture_matrix{unit}"),
            AutoBinding::TextureViewProjMatrix(unit) => format!("texture_viewproj_matrix{unit}"),
            AutoBinding::TextureSampler(unit) => format!("texture_sampler{unit}"),
            AutoBinding::CameraPositionObjectSpace => "camera_position_os".into(),
            AutoBinding::AmbientLightColor => "ambient_light_color".into(),
            AutoBinding::DerivedSceneColor => "derived_scene_color".into(),
            AutoBinding::SurfaceDiffuse => "surface_diffuse".into(),
            AutoBinding::SurfaceSpecular => "surface_specular".into(),
            AutoBinding::SurfaceShininess => "surface_shininess".into(),
            AutoBinding::AlphaRejectionValue => "alpha_rejection_value".into(),
            AutoBinding::LightPositionViewSpace(i) => format!("light_position_vs{i}"),
            AutoBinding::LightDirectionViewSpace(i) => format!("light_direction_vs{i}"),
            AutoBinding::LightDiffuseColor(i) => format!("light_diffuse{i}"),
            AutoBinding::LightSpecularColor(i) => format!("light_specular{i}"),
            AutoBinding::LightAttenuation(i) => format!("light_attenuation{i}"),
            AutoBinding::SpotlightParams(i) => format!("spotlight_params{i}"),
            AutoBinding::FogColor => "fog_color".into(),
            AutoBinding::FogParams => "fog_params".into(),
        }
    }
}

/// Where a parameter lives and how it is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Entry-function input, identified by `(semantic, content, index)`.
    Input {
        semantic: Semantic,
        content: Content,
        index: u32,
    },
    /// Entry-function output, identified by `(semantic, content, index)`.
    Output {
        semantic: Semantic,
        content: Content,
        index: u32,
    },
    /// Function-scope temporary, identified by name.
    Local,
    /// Program-scope constant, engine-fed when `binding` is `Some`.
    Uniform { binding: Option<AutoBinding> },
}

/// One parameter of a program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub ty: GpuType,
    pub kind: ParamKind,
}

impl Parameter {
    pub(crate) fn input(content: Content, index: u32, ty: GpuType) -> Parameter {
        Parameter {
            name: format!("i_{}{index}", content.name_stem()),
            ty,
            kind: ParamKind::Input {
                semantic: content.semantic(),
                content,
                index,
            },
        }
    }

    pub(crate) fn output(content: Content, index: u32, ty: GpuType) -> Parameter {
        Parameter {
            name: format!("o_{}{index}", content.name_stem()),
            ty,
            kind: ParamKind::Output {
                semantic: content.semantic(),
                content,
                index,
            },
        }
    }

    pub(crate) fn local(name: &str, ty: GpuType) -> Parameter {
        Parameter {
            name: name.to_owned(),
            ty,
            kind: ParamKind::Local,
        }
    }

    pub(crate) fn uniform(binding: AutoBinding, ty: GpuType) -> Parameter {
        Parameter {
            name: binding.uniform_name(),
            ty,
            kind: ParamKind::Uniform {
                binding: Some(binding),
            },
        }
    }

    pub(crate) fn user_uniform(name: &str, ty: GpuType) -> Parameter {
        Parameter {
            name: name.to_owned(),
            ty,
            kind: ParamKind::Uniform { binding: None },
        }
    }

    /// Content tag for inputs/outputs, `None` otherwise.
    #[must_use]
    pub fn content(&self) -> Option<(Content, u32)> {
        match self.kind {
            ParamKind::Input { content, index, .. } | ParamKind::Output { content, index, .. } => {
                Some((content, index))
            }
            _ => None,
        }
    }

    /// Semantic for inputs/outputs, `None` otherwise.
    #[must_use]
    pub fn semantic(&self) -> Option<Semantic> {
        match self.kind {
            ParamKind::Input { semantic, .. } | ParamKind::Output { semantic, .. } => {
                Some(semantic)
            }
            _ => None,
        }
    }
}
