use crate::{
    frontend::FrontendSession,
    linker::{link, LinkOptions, LinkStatus, LinkedProgram},
    shader::Shader,
};
use log::debug;
use shc_resource::{ProgramReflection, ShaderStage, UniformInfo, VariableType};
use std::collections::BTreeMap;
use thiserror::Error;
use zerocopy::AsBytes;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindAttribError {
    #[error("attribute locations cannot change after the program is linked")]
    AlreadyLinked,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReflectionAccessError {
    #[error("program is not linked")]
    NotLinked,
    #[error("index {index} is out of range; {count} entries available")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Link unit of one vertex and one fragment shader. Copies what it needs
/// from the shaders, which may be dropped afterwards.
#[derive(Debug, Default)]
pub struct Program {
    options: LinkOptions,
    attrib_locations: BTreeMap<String, u32>,
    status: Option<LinkStatus>,
    linked: Option<LinkedProgram>,
    info_log: String,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LinkOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Pins an attribute to a location for the upcoming link.
    pub fn bind_attrib_location(
        &mut self,
        name: impl Into<String>,
        location: u32,
    ) -> Result<(), BindAttribError> {
        if self.status.is_some() {
            return Err(BindAttribError::AlreadyLinked);
        }

        self.attrib_locations.insert(name.into(), location);
        Ok(())
    }

    /// Links the pair. A program links at most once; any further call fails.
    pub fn link(&mut self, vertex: &Shader, fragment: &Shader) -> bool {
        if self.status.is_some() {
            self.append_log("error: program is already linked");
            return false;
        }

        let session = FrontendSession::acquire();
        let result = link(
            vertex.compiled(),
            fragment.compiled(),
            &self.attrib_locations,
            &self.options,
            &session,
        );

        match result {
            Ok(linked) => {
                debug!("program linked.");
                self.status = Some(LinkStatus::Success);
                self.linked = Some(linked);
                true
            }
            Err(err) => {
                debug!("program failed to link: {:?}", err.status());
                self.status = Some(err.status());
                self.append_log(&format!("error: {}", err));
                false
            }
        }
    }

    /// `None` until [`Program::link`] was called.
    pub fn link_status(&self) -> Option<LinkStatus> {
        self.status
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    pub fn info_log(&self) -> &str {
        &self.info_log
    }

    /// SPIR-V words of one stage; empty unless the link succeeded.
    pub fn spv(&self, stage: ShaderStage) -> &[u32] {
        match (&self.linked, stage) {
            (Some(linked), ShaderStage::Vertex) => &linked.vertex_spv,
            (Some(linked), ShaderStage::Fragment) => &linked.fragment_spv,
            (None, _) => &[],
        }
    }

    pub fn spv_bytes(&self, stage: ShaderStage) -> &[u8] {
        self.spv(stage).as_bytes()
    }

    /// Size of [`Program::spv`] in bytes.
    pub fn spv_size(&self, stage: ShaderStage) -> usize {
        self.spv_bytes(stage).len()
    }

    pub fn wgsl(&self, stage: ShaderStage) -> Option<&str> {
        let linked = self.linked.as_ref()?;

        match stage {
            ShaderStage::Vertex => linked.vertex_wgsl.as_deref(),
            ShaderStage::Fragment => linked.fragment_wgsl.as_deref(),
        }
    }

    pub fn reflection(&self) -> Result<&ProgramReflection, ReflectionAccessError> {
        self.linked
            .as_ref()
            .map(|linked| &linked.reflection)
            .ok_or(ReflectionAccessError::NotLinked)
    }

    pub fn active_attrib_count(&self) -> usize {
        self.reflection()
            .map_or(0, |reflection| reflection.attribs.len())
    }

    pub fn active_attrib_name(&self, index: usize) -> Result<&str, ReflectionAccessError> {
        let attrib = entry(&self.reflection()?.attribs, index)?;
        Ok(&attrib.name)
    }

    pub fn active_attrib_type(&self, index: usize) -> Result<VariableType, ReflectionAccessError> {
        Ok(entry(&self.reflection()?.attribs, index)?.ty)
    }

    pub fn active_attrib_location(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(entry(&self.reflection()?.attribs, index)?.location)
    }

    pub fn active_uniform_block_count(&self) -> usize {
        self.reflection()
            .map_or(0, |reflection| reflection.uniform_blocks.len())
    }

    pub fn active_uniform_block_binding(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(entry(&self.reflection()?.uniform_blocks, index)?.binding)
    }

    /// Block size in bytes.
    pub fn active_uniform_block_size(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(entry(&self.reflection()?.uniform_blocks, index)?.size)
    }

    pub fn active_uniform_block_stage(
        &self,
        index: usize,
    ) -> Result<ShaderStage, ReflectionAccessError> {
        Ok(entry(&self.reflection()?.uniform_blocks, index)?.stage)
    }

    pub fn active_uniform_count(&self) -> usize {
        self.reflection()
            .map_or(0, |reflection| reflection.uniforms.len())
    }

    pub fn active_uniform_name(&self, index: usize) -> Result<&str, ReflectionAccessError> {
        Ok(&self.uniform(index)?.name)
    }

    pub fn active_uniform_type(&self, index: usize) -> Result<VariableType, ReflectionAccessError> {
        Ok(self.uniform(index)?.ty)
    }

    pub fn active_uniform_array_size(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(self.uniform(index)?.array_size)
    }

    pub fn active_uniform_array_stride(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(self.uniform(index)?.array_stride)
    }

    pub fn active_uniform_matrix_stride(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(self.uniform(index)?.matrix_stride)
    }

    pub fn active_uniform_stage(&self, index: usize) -> Result<ShaderStage, ReflectionAccessError> {
        Ok(self.uniform(index)?.stage)
    }

    /// Binding of an opaque uniform; `None` for block members.
    pub fn active_uniform_binding(
        &self,
        index: usize,
    ) -> Result<Option<u32>, ReflectionAccessError> {
        Ok(self.uniform(index)?.binding)
    }

    /// Owning block of a block member; `None` for opaque uniforms.
    pub fn active_uniform_block_index(
        &self,
        index: usize,
    ) -> Result<Option<u32>, ReflectionAccessError> {
        Ok(self.uniform(index)?.block_index)
    }

    pub fn active_uniform_block_offset(&self, index: usize) -> Result<u32, ReflectionAccessError> {
        Ok(self.uniform(index)?.block_offset)
    }

    fn uniform(&self, index: usize) -> Result<&UniformInfo, ReflectionAccessError> {
        entry(&self.reflection()?.uniforms, index)
    }

    fn append_log(&mut self, message: &str) {
        self.info_log.push_str(message);
        self.info_log.push('\n');
    }
}

fn entry<T>(entries: &[T], index: usize) -> Result<&T, ReflectionAccessError> {
    entries
        .get(index)
        .ok_or(ReflectionAccessError::IndexOutOfRange {
            index,
            count: entries.len(),
        })
}
