use crate::{
    compiler::{compile, CompileError, CompiledShader},
    frontend::FrontendSession,
    translator::translate,
};
use log::debug;
use shc_resource::ShaderStage;

/// One compilation unit for one stage. Populated by exactly one call to
/// [`Shader::compile`].
#[derive(Debug, Default)]
pub struct Shader {
    stage: Option<ShaderStage>,
    compiled: Option<CompiledShader>,
    translated_source: String,
    info_log: String,
}

impl Shader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates and compiles legacy source. Returns `false` with the
    /// diagnostic in [`Shader::info_log`] on failure, or when this shader was
    /// already compiled; in that case the first result is kept.
    pub fn compile(&mut self, stage: ShaderStage, source: &str) -> bool {
        if self.stage.is_some() {
            self.append_log(&CompileError::AlreadyCompiled.to_string());
            return false;
        }

        let mut session = FrontendSession::acquire();
        self.stage = Some(stage);

        let translation = match translate(source, stage) {
            Ok(translation) => translation,
            Err(err) => {
                debug!("{} shader failed to translate.", stage);
                let err = CompileError::Translate { stage, source: err };
                self.append_log(&format!("error: {}", err));
                return false;
            }
        };

        for limitation in &translation.limitations {
            self.append_log(&format!("warning: {}", limitation));
        }

        let result = compile(stage, &translation, &mut session);
        self.translated_source = translation.source;

        match result {
            Ok(compiled) => {
                debug!("{} shader compiled.", stage);
                self.compiled = Some(compiled);
                true
            }
            Err(err) => {
                debug!("{} shader failed to compile.", stage);
                self.append_log(&format!("error: {}", err));
                false
            }
        }
    }

    pub fn stage(&self) -> Option<ShaderStage> {
        self.stage
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn info_log(&self) -> &str {
        &self.info_log
    }

    /// Target-dialect source handed to the front end; empty before compile.
    pub fn translated_source(&self) -> &str {
        &self.translated_source
    }

    pub(crate) fn compiled(&self) -> Option<&CompiledShader> {
        self.compiled.as_ref()
    }

    fn append_log(&mut self, message: &str) {
        self.info_log.push_str(message);
        self.info_log.push('\n');
    }
}
