mod compiler;
mod frontend;
mod linker;
mod location_allocator;
mod program;
mod reflection;
mod shader;
mod translator;

pub use compiler::CompileError;
pub use linker::{location_footprint, LinkError, LinkOptions, LinkStatus, LinkedProgram};
pub use location_allocator::LocationAllocator;
pub use program::{BindAttribError, Program, ReflectionAccessError};
pub use shader::Shader;
pub use translator::{
    translate, uniform_block_name, LimitationKind, PreprocessError, Translation,
    TranslationLimitation, TARGET_GLSL_VERSION,
};

pub use shc_resource::{
    AttribInfo, ProgramReflection, ShaderStage, UniformBlockInfo, UniformInfo, VariableType,
};
