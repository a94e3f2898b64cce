mod program_reflection;
mod shader_stage;
mod variable_type;

pub use program_reflection::*;
pub use shader_stage::*;
pub use variable_type::*;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgramFile {
    version: ProgramFileVersion,
    vertex_spv: Vec<u32>,
    fragment_spv: Vec<u32>,
    reflection: ProgramReflection,
}

impl ProgramFile {
    pub fn new(
        version: ProgramFileVersion,
        vertex_spv: Vec<u32>,
        fragment_spv: Vec<u32>,
        reflection: ProgramReflection,
    ) -> Self {
        Self {
            version,
            vertex_spv,
            fragment_spv,
            reflection,
        }
    }

    pub fn version(&self) -> ProgramFileVersion {
        self.version
    }

    pub fn spv(&self, stage: ShaderStage) -> &[u32] {
        match stage {
            ShaderStage::Vertex => &self.vertex_spv,
            ShaderStage::Fragment => &self.fragment_spv,
        }
    }

    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgramFileVersion {
    V1,
}

impl Display for ProgramFileVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::V1 => write!(f, "v1"),
        }
    }
}
