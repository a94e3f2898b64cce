use log::debug;
use naga::{
    front::glsl::{Error, Frontend, Options},
    valid::{Capabilities, ModuleInfo, ValidationFlags, Validator},
    Module,
};
use parking_lot::{const_mutex, Mutex, MutexGuard};
use shc_resource::ShaderStage;

/// Parser state shared by the whole process. naga's GLSL frontend keeps
/// scratch buffers between parses, so a single instance is reused and every
/// compile or link holds it for its full duration.
static FRONTEND: Mutex<Option<Frontend>> = const_mutex(None);

/// Scoped ownership of the process-wide front end. Compile and link calls are
/// serialized on it; dropping the session releases it on every exit path.
pub struct FrontendSession {
    frontend: MutexGuard<'static, Option<Frontend>>,
}

impl FrontendSession {
    pub fn acquire() -> Self {
        let frontend = FRONTEND.lock();
        debug!("front end acquired.");
        Self { frontend }
    }

    /// Parses target-dialect source into a naga module. The error is the
    /// rendered diagnostic.
    pub fn parse(&mut self, stage: ShaderStage, source: &str) -> Result<Module, String> {
        let frontend = self.frontend.get_or_insert_with(Frontend::default);
        let options = Options::from(naga_stage(stage));

        frontend
            .parse(&options, source)
            .map_err(|errors| render_errors(&errors, source))
    }

    pub fn validate(&self, module: &Module) -> Result<ModuleInfo, String> {
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(module)
            .map_err(|err| err.to_string())
    }
}

impl Drop for FrontendSession {
    fn drop(&mut self) {
        debug!("front end released.");
    }
}

/// One diagnostic per line, prefixed with the line it points at.
fn render_errors(errors: &[Error], source: &str) -> String {
    errors
        .iter()
        .map(|err| {
            let prefix = err
                .meta
                .to_range()
                .and_then(|range| source.get(..range.start));

            match prefix {
                Some(prefix) => format!("line {}: {}", prefix.matches('\n').count() + 1, err),
                None => err.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}
