//! Sub-Render-State Registry
//!
//! Factories keyed by type tag. The built-in fixed-function factories are
//! installed at construction; extensions register before the first build
//! and the registry is treated as immutable afterwards. Registration order
//! is what breaks execution-order ties during composition.
//!
//! The registry is also the seam to the material-script compiler: each
//! factory publishes a metadata table of the properties it understands and
//! parses `(property, arguments)` pairs into configured instances.

use rustc_hash::FxHashMap;

use crate::errors::{Result, RtssError};
use crate::pass::PassDescriptor;
use crate::states::{
    ColorState, FogState, LightingState, SubRenderState, TexturingState, TransformState,
};

/// Script property understood by a factory: name plus the closed value set.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDesc {
    pub name: &'static str,
    pub values: &'static [&'static str],
}

/// Creates sub-render-state instances for passes and script properties.
pub trait SubRenderStateFactory {
    /// Stable key of the produced state kind.
    fn type_tag(&self) -> &'static str;

    /// Contribute instances for a pass; contributing nothing is fine.
    fn create_or_retrieve(&self, pass: &PassDescriptor, out: &mut Vec<SubRenderState>);

    /// Script properties this factory understands.
    fn properties(&self) -> &'static [PropertyDesc] {
        &[]
    }

    /// Parse one script property into a configured instance.
    fn parse_property(&self, name: &str, args: &[&str]) -> Result<SubRenderState> {
        let _ = args;
        Err(RtssError::InvalidScript(format!(
            "factory '{}' has no property '{name}'",
            self.type_tag()
        )))
    }
}

struct TransformFactory;

impl SubRenderStateFactory for TransformFactory {
    fn type_tag(&self) -> &'static str {
        TransformState::TYPE_TAG
    }

    fn create_or_retrieve(&self, _pass: &PassDescriptor, out: &mut Vec<SubRenderState>) {
        out.push(SubRenderState::Transform(TransformState::new()));
    }
}

struct LightingFactory;

impl SubRenderStateFactory for LightingFactory {
    fn type_tag(&self) -> &'static str {
        LightingState::TYPE_TAG
    }

    fn create_or_retrieve(&self, pass: &PassDescriptor, out: &mut Vec<SubRenderState>) {
        if pass.lighting {
            out.push(SubRenderState::Lighting(LightingState::new()));
        }
    }
}

struct TexturingFactory;

impl SubRenderStateFactory for TexturingFactory {
    fn type_tag(&self) -> &'static str {
        TexturingState::TYPE_TAG
    }

    fn create_or_retrieve(&self, pass: &PassDescriptor, out: &mut Vec<SubRenderState>) {
        for (index, unit) in pass.texture_units.iter().enumerate() {
            out.push(SubRenderState::Texturing(TexturingState::new(
                index as u32,
                unit.clone(),
            )));
        }
    }

    fn properties(&self) -> &'static [PropertyDesc] {
        const PROPERTIES: &[PropertyDesc] = &[PropertyDesc {
            name: "texturing_stage",
            values: &["ffp", "late_add_blend"],
        }];
        PROPERTIES
    }

    fn parse_property(&self, name: &str, args: &[&str]) -> Result<SubRenderState> {
        if name != "texturing_stage" {
            return Err(RtssError::InvalidScript(format!(
                "factory '{}' has no property '{name}'",
                self.type_tag()
            )));
        }
        match args {
            ["ffp"] => Ok(SubRenderState::Texturing(TexturingState::template(false))),
            ["late_add_blend"] => {
                Ok(SubRenderState::Texturing(TexturingState::template(true)))
            }
            _ => Err(RtssError::InvalidScript(format!(
                "texturing_stage expects one of [ffp, late_add_blend], got {args:?}"
            ))),
        }
    }
}

struct FogFactory;

impl SubRenderStateFactory for FogFactory {
    fn type_tag(&self) -> &'static str {
        FogState::TYPE_TAG
    }

    fn create_or_retrieve(&self, _pass: &PassDescriptor, out: &mut Vec<SubRenderState>) {
        out.push(SubRenderState::Fog(FogState::new()));
    }
}

struct ColorFactory;

impl SubRenderStateFactory for ColorFactory {
    fn type_tag(&self) -> &'static str {
        ColorState::TYPE_TAG
    }

    fn create_or_retrieve(&self, _pass: &PassDescriptor, out: &mut Vec<SubRenderState>) {
        out.push(SubRenderState::ColorFinalize(ColorState::new()));
    }
}

/// Factory catalog, iterated in registration order.
pub struct Registry {
    factories: Vec<Box<dyn SubRenderStateFactory>>,
    by_tag: FxHashMap<&'static str, usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the built-in fixed-function factories installed.
    #[must_use]
    pub fn new() -> Registry {
        let mut registry = Registry {
            factories: Vec::new(),
            by_tag: FxHashMap::default(),
        };
        registry
            .register(Box::new(TransformFactory))
            .expect("built-in tags are unique");
        registry
            .register(Box::new(LightingFactory))
            .expect("built-in tags are unique");
        registry
            .register(Box::new(TexturingFactory))
            .expect("built-in tags are unique");
        registry
            .register(Box::new(FogFactory))
            .expect("built-in tags are unique");
        registry
            .register(Box::new(ColorFactory))
            .expect("built-in tags are unique");
        registry
    }

    /// Register an extension factory. Tags must be unique.
    pub fn register(&mut self, factory: Box<dyn SubRenderStateFactory>) -> Result<()> {
        let tag = factory.type_tag();
        if self.by_tag.contains_key(tag) {
            return Err(RtssError::InvalidScript(format!(
                "factory '{tag}' is already registered"
            )));
        }
        self.by_tag.insert(tag, self.factories.len());
        self.factories.push(factory);
        Ok(())
    }

    /// Factories in registration order.
    #[must_use]
    pub fn factories(&self) -> &[Box<dyn SubRenderStateFactory>] {
        &self.factories
    }

    #[must_use]
    pub fn factory(&self, tag: &str) -> Option<&dyn SubRenderStateFactory> {
        self.by_tag.get(tag).map(|&index| &*self.factories[index])
    }

    /// Parse a material-script property into a configured instance.
    ///
    /// Unknown tags and unknown properties surface as
    /// [`RtssError::InvalidScript`] without touching any in-flight build.
    pub fn parse_property(
        &self,
        type_tag: &str,
        name: &str,
        args: &[&str],
    ) -> Result<SubRenderState> {
        let factory = self.factory(type_tag).ok_or_else(|| {
            RtssError::InvalidScript(format!("unknown sub-render-state type '{type_tag}'"))
        })?;
        factory.parse_property(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins_are_installed_in_order() {
        let registry = Registry::new();
        let tags: Vec<_> = registry.factories().iter().map(|f| f.type_tag()).collect();
        assert_eq!(
            tags,
            [
                TransformState::TYPE_TAG,
                LightingState::TYPE_TAG,
                TexturingState::TYPE_TAG,
                FogState::TYPE_TAG,
                ColorState::TYPE_TAG,
            ]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = Registry::new();
        let result = registry.register(Box::new(TransformFactory));
        assert!(matches!(result, Err(RtssError::InvalidScript(_))));
    }

    #[test]
    fn parse_known_property() {
        let registry = Registry::new();
        let state = registry
            .parse_property(TexturingState::TYPE_TAG, "texturing_stage", &["late_add_blend"])
            .unwrap();
        match state {
            SubRenderState::Texturing(texturing) => assert!(texturing.late_add_blend()),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_property_is_invalid_script() {
        let registry = Registry::new();
        let unknown_prop =
            registry.parse_property(TexturingState::TYPE_TAG, "texturing_mode", &["ffp"]);
        assert!(matches!(unknown_prop, Err(RtssError::InvalidScript(_))));

        let unknown_tag = registry.parse_property("FFP_Unknown", "texturing_stage", &["ffp"]);
        assert!(matches!(unknown_tag, Err(RtssError::InvalidScript(_))));

        let bad_value =
            registry.parse_property(TexturingState::TYPE_TAG, "texturing_stage", &["pbr"]);
        assert!(matches!(bad_value, Err(RtssError::InvalidScript(_))));
    }
}
