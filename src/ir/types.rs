//! GPU Parameter Types
//!
//! Closed set of numeric and sampler types a parameter can carry. The
//! mapping to surface syntax lives in the writer; the program model only
//! cares about identity and lane widths.

/// Concrete type of a program parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuType {
    Float1,
    Float2,
    Float3,
    Float4,
    Int1,
    Int2,
    Int3,
    Int4,
    Uint1,
    Uint2,
    Uint3,
    Uint4,
    Mat3,
    Mat4,
    Sampler1d,
    Sampler2d,
    Sampler3d,
    SamplerCube,
}

impl GpuType {
    /// Float vector type of the given lane width (1–4).
    #[must_use]
    pub fn float_vec(width: u32) -> GpuType {
        match width {
            1 => GpuType::Float1,
            2 => GpuType::Float2,
            3 => GpuType::Float3,
            4 => GpuType::Float4,
            _ => unreachable!("float vector width out of range: {width}"),
        }
    }

    /// Lane count for scalar/vector types, `None` for matrices and samplers.
    #[must_use]
    pub fn lane_count(self) -> Option<u32> {
        match self {
            GpuType::Float1 | GpuType::Int1 | GpuType::Uint1 => Some(1),
            GpuType::Float2 | GpuType::Int2 | GpuType::Uint2 => Some(2),
            GpuType::Float3 | GpuType::Int3 | GpuType::Uint3 => Some(3),
            GpuType::Float4 | GpuType::Int4 | GpuType::Uint4 => Some(4),
            _ => None,
        }
    }

    /// True for the sampler family.
    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            GpuType::Sampler1d | GpuType::Sampler2d | GpuType::Sampler3d | GpuType::SamplerCube
        )
    }
}

/// GPU program stage a [`crate::ir::Program`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}
