//! Fixed-Function Lighting
//!
//! Per-vertex lighting in view space. The diffuse (and optionally
//! specular) contributions of every light accumulate into the vertex color
//! outputs; the fragment side only ever sees the interpolated results.

use crate::errors::Result;
use crate::ir::{
    Atom, AtomOp, AutoBinding, Content, GpuType, Mask, Operand, ParamId, ProgramSet,
};
use crate::states::{BuildContext, specular_enabled, stage};

/// Per-light resolved uniform handles. Directional lights leave `position`
/// unset; point lights leave `direction` unset.
#[derive(Debug, Clone, Default)]
struct LightParams {
    position: Option<ParamId>,
    direction: Option<ParamId>,
    attenuation: Option<ParamId>,
    spot_params: Option<ParamId>,
    diffuse: Option<ParamId>,
    specular: Option<ParamId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Default)]
pub struct LightingState {
    specular: bool,

    worldview: Option<ParamId>,
    inv_transpose_worldview: Option<ParamId>,
    derived_scene_color: Option<ParamId>,
    shininess: Option<ParamId>,

    position_in: Option<ParamId>,
    normal_in: Option<ParamId>,
    view_position: Option<ParamId>,
    view_normal: Option<ParamId>,
    diffuse_out: Option<ParamId>,
    specular_out: Option<ParamId>,

    lights: Vec<(LightKind, LightParams)>,
}

impl LightingState {
    pub const TYPE_TAG: &'static str = "FFP_Lighting";

    #[must_use]
    pub fn new() -> LightingState {
        LightingState::default()
    }

    pub fn copy_from(&mut self, other: &LightingState) {
        self.specular = other.specular;
    }

    pub fn resolve_parameters(&mut self, set: &mut ProgramSet, ctx: &BuildContext) -> Result<()> {
        self.specular = specular_enabled(ctx.pass);

        let vs = &mut set.vertex;
        self.worldview = Some(vs.resolve_uniform(AutoBinding::WorldViewMatrix, GpuType::Mat4)?);
        self.inv_transpose_worldview = Some(
            vs.resolve_uniform(AutoBinding::InverseTransposeWorldViewMatrix, GpuType::Mat4)?,
        );
        self.derived_scene_color =
            Some(vs.resolve_uniform(AutoBinding::DerivedSceneColor, GpuType::Float4)?);

        self.position_in =
            Some(vs.resolve_input(Content::PositionObjectSpace, 0, GpuType::Float4)?);
        self.normal_in = Some(vs.resolve_input(Content::NormalObjectSpace, 0, GpuType::Float3)?);
        self.view_position = Some(vs.resolve_local(GpuType::Float3, "view_position")?);
        self.view_normal = Some(vs.resolve_local(GpuType::Float3, "view_normal")?);
        self.diffuse_out = Some(vs.resolve_output(Content::ColorDiffuse, 0, GpuType::Float4)?);

        if self.specular {
            self.shininess =
                Some(vs.resolve_uniform(AutoBinding::SurfaceShininess, GpuType::Float1)?);
            self.specular_out =
                Some(vs.resolve_output(Content::ColorSpecular, 0, GpuType::Float4)?);
        }

        // One uniform block per light, indexed across all kinds in the
        // order directional, point, spot.
        let [directional, point, spot] = ctx.light_counts;
        let mut index = 0;
        self.lights.clear();
        for (kind, count) in [
            (LightKind::Directional, directional),
            (LightKind::Point, point),
            (LightKind::Spot, spot),
        ] {
            for _ in 0..count {
                let mut params = LightParams {
                    diffuse: Some(
                        vs.resolve_uniform(AutoBinding::LightDiffuseColor(index), GpuType::Float4)?,
                    ),
                    ..LightParams::default()
                };
                if kind != LightKind::Directional {
                    params.position = Some(vs.resolve_uniform(
                        AutoBinding::LightPositionViewSpace(index),
                        GpuType::Float4,
                    )?);
                    params.attenuation = Some(
                        vs.resolve_uniform(AutoBinding::LightAttenuation(index), GpuType::Float4)?,
                    );
                }
                if kind != LightKind::Point {
                    params.direction = Some(vs.resolve_uniform(
                        AutoBinding::LightDirectionViewSpace(index),
                        GpuType::Float4,
                    )?);
                }
                if kind == LightKind::Spot {
                    params.spot_params = Some(
                        vs.resolve_uniform(AutoBinding::SpotlightParams(index), GpuType::Float4)?,
                    );
                }
                if self.specular {
                    params.specular = Some(
                        vs.resolve_uniform(
                            AutoBinding::LightSpecularColor(index),
                            GpuType::Float4,
                        )?,
                    );
                }
                self.lights.push((kind, params));
                index += 1;
            }
        }
        Ok(())
    }

    pub fn resolve_dependencies(&self, set: &mut ProgramSet) {
        set.vertex.add_dependency("FFPLib_Common");
        set.vertex.add_dependency("FFPLib_Lighting");
    }

    pub fn emit_atoms(&self, set: &mut ProgramSet, _ctx: &BuildContext) -> Result<()> {
        let vs = &mut set.vertex;
        let xyz = Mask::X | Mask::Y | Mask::Z;

        vs.push_atom(Atom::new(
            AtomOp::Call("FFP_TransformPosition".into()),
            stage::VS_LIGHTING,
            [
                Operand::read(self.worldview.expect("resolved"), Mask::ALL),
                Operand::read(self.position_in.expect("resolved"), Mask::ALL),
                Operand::write(self.view_position.expect("resolved"), xyz),
            ],
        )?);
        vs.push_atom(Atom::new(
            AtomOp::Call("FFP_TransformNormal".into()),
            stage::VS_LIGHTING,
            [
                Operand::read(self.inv_transpose_worldview.expect("resolved"), Mask::ALL),
                Operand::read(self.normal_in.expect("resolved"), xyz),
                Operand::write(self.view_normal.expect("resolved"), xyz),
            ],
        )?);

        // Base color before any light: derived scene color, alpha included.
        vs.push_atom(Atom::new(
            AtomOp::Assign,
            stage::VS_LIGHTING,
            [
                Operand::write(self.diffuse_out.expect("resolved"), Mask::ALL),
                Operand::read(self.derived_scene_color.expect("resolved"), Mask::ALL),
            ],
        )?);
        if let Some(specular_out) = self.specular_out {
            // Specular starts black and only accumulates light terms.
            vs.push_atom(Atom::new(
                AtomOp::Call("FFP_InitSpecular".into()),
                stage::VS_LIGHTING,
                [Operand::write(specular_out, Mask::ALL)],
            )?);
        }

        for (kind, params) in &self.lights {
            let function = match (kind, self.specular) {
                (LightKind::Directional, false) => "FFP_Light_Directional_Diffuse",
                (LightKind::Directional, true) => "FFP_Light_Directional_DiffuseSpecular",
                (LightKind::Point, false) => "FFP_Light_Point_Diffuse",
                (LightKind::Point, true) => "FFP_Light_Point_DiffuseSpecular",
                (LightKind::Spot, false) => "FFP_Light_Spot_Diffuse",
                (LightKind::Spot, true) => "FFP_Light_Spot_DiffuseSpecular",
            };

            let mut operands = vec![Operand::read(self.view_normal.expect("resolved"), xyz)];
            if *kind != LightKind::Directional || self.specular {
                operands.push(Operand::read(self.view_position.expect("resolved"), xyz));
            }
            if let Some(position) = params.position {
                operands.push(Operand::read(position, xyz));
            }
            if let Some(direction) = params.direction {
                operands.push(Operand::read(direction, xyz));
            }
            if let Some(attenuation) = params.attenuation {
                operands.push(Operand::read(attenuation, Mask::ALL));
            }
            if let Some(spot_params) = params.spot_params {
                operands.push(Operand::read(spot_params, xyz));
            }
            operands.push(Operand::read(params.diffuse.expect("resolved"), xyz));
            if self.specular {
                operands.push(Operand::read(params.specular.expect("resolved"), xyz));
                operands.push(Operand::read(self.shininess.expect("resolved"), Mask::X));
            }
            operands.push(Operand::read_write(self.diffuse_out.expect("resolved"), xyz));
            if let Some(specular_out) = self.specular_out {
                operands.push(Operand::read_write(specular_out, xyz));
            }

            vs.push_atom(Atom::new(
                AtomOp::Call(function.into()),
                stage::VS_LIGHTING,
                operands,
            )?);
        }
        Ok(())
    }
}
