use crate::{
    frontend::FrontendSession,
    linker::interface::{assign_provisional, StageInterface},
    translator::{PreprocessError, Translation},
};
use log::debug;
use naga::{valid::ModuleInfo, Module};
use shc_resource::ShaderStage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("shader is already compiled")]
    AlreadyCompiled,
    #[error("failed to translate {stage} shader: {source}")]
    Translate {
        stage: ShaderStage,
        #[source]
        source: PreprocessError,
    },
    #[error("failed to parse {stage} shader:\n{message}")]
    Parse { stage: ShaderStage, message: String },
    #[error("{stage} shader has no entry point")]
    MissingEntryPoint { stage: ShaderStage },
    #[error("{stage} shader failed validation: {message}")]
    Validation { stage: ShaderStage, message: String },
}

/// Validated module of one stage, carrying provisional locations and
/// bindings until a link assigns the final ones.
#[derive(Debug)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub module: Module,
    pub info: ModuleInfo,
}

/// Parses translated source with the front end and validates it.
pub fn compile(
    stage: ShaderStage,
    translation: &Translation,
    session: &mut FrontendSession,
) -> Result<CompiledShader, CompileError> {
    let mut module = session
        .parse(stage, &translation.source)
        .map_err(|message| CompileError::Parse { stage, message })?;

    let mut interface =
        StageInterface::collect(&module).ok_or(CompileError::MissingEntryPoint { stage })?;
    assign_provisional(&mut module, &mut interface);

    debug!(
        "{} shader: {} input(s), {} output(s), {} texture(s), {} uniform block(s).",
        stage,
        interface.inputs.len(),
        interface.outputs.len(),
        interface.textures.len(),
        interface.uniform_blocks.len()
    );

    let info = session
        .validate(&module)
        .map_err(|message| CompileError::Validation { stage, message })?;

    Ok(CompiledShader {
        stage,
        module,
        info,
    })
}
