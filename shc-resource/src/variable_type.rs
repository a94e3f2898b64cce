use serde::{Deserialize, Serialize};

/// Type of a reflected attribute or uniform, as seen by the host renderer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariableType {
    Unknown,
    Bool,
    BoolVec2,
    BoolVec3,
    BoolVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    FloatMat2,
    FloatMat3,
    FloatMat4,
    Sampler2D,
    SamplerCube,
}
