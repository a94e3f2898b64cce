use crate::{ShaderStage, VariableType};
use serde::{Deserialize, Serialize};

/// Resource contract of a linked program. Every sequence keeps discovery
/// order: vertex stage first, then fragment stage.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    pub attribs: Vec<AttribInfo>,
    pub uniform_blocks: Vec<UniformBlockInfo>,
    pub uniforms: Vec<UniformInfo>,
}

impl ProgramReflection {
    pub fn find_attrib(&self, name: &str) -> Option<&AttribInfo> {
        self.attribs.iter().find(|attrib| attrib.name == name)
    }

    pub fn find_uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|uniform| uniform.name == name)
    }

    /// Uniforms living in the given block, in block order.
    pub fn block_uniforms(&self, block_index: u32) -> impl Iterator<Item = &UniformInfo> {
        self.uniforms
            .iter()
            .filter(move |uniform| uniform.block_index == Some(block_index))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttribInfo {
    pub name: String,
    pub ty: VariableType,
    pub location: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockInfo {
    pub binding: u32,
    pub size: u32,
    pub stage: ShaderStage,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub ty: VariableType,
    pub array_size: u32,
    /// Index into [`ProgramReflection::uniform_blocks`]; `None` for opaque
    /// resources, which carry a `binding` instead.
    pub block_index: Option<u32>,
    pub block_offset: u32,
    pub binding: Option<u32>,
    pub array_stride: u32,
    pub matrix_stride: u32,
    pub stage: ShaderStage,
}
