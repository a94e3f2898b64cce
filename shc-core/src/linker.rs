mod footprint;
pub(crate) mod interface;

pub use footprint::location_footprint;

use self::interface::{apply_binding, apply_locations, InterfaceVar, ResourceVar, StageInterface};
use crate::{
    compiler::CompiledShader, frontend::FrontendSession, location_allocator::LocationAllocator,
    reflection::reflect_stage,
};
use log::{debug, warn};
use naga::{back::spv, back::wgsl, valid::ModuleInfo, Module};
use shc_resource::{ProgramReflection, ShaderStage};
use std::{collections::BTreeMap, num::NonZeroU32};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Number of attribute locations the allocator may hand out.
    pub attrib_capacity: u32,
    /// Number of varying locations the allocator may hand out.
    pub varying_capacity: u32,
    pub spirv_version: (u8, u8),
    /// Also write each linked stage as WGSL.
    pub emit_wgsl: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            attrib_capacity: i32::MAX as u32,
            varying_capacity: i32::MAX as u32,
            spirv_version: (1, 0),
            emit_wgsl: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Success,
    VertexParseFail,
    FragmentParseFail,
    UnresolvedVarying,
    BackendLinkFail,
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("vertex shader is not a successfully compiled vertex stage")]
    VertexParseFail,
    #[error("fragment shader is not a successfully compiled fragment stage")]
    FragmentParseFail,
    #[error("fragment input `{name}` does not match any vertex output")]
    UnresolvedVarying { name: String },
    #[error("attribute `{name}` cannot be placed at location {location}")]
    AttribLocationUnavailable { name: String, location: u32 },
    #[error("no {namespace} left for `{name}`")]
    LocationsExhausted {
        namespace: &'static str,
        name: String,
    },
    #[error("linked {stage} shader failed validation: {message}")]
    Validation { stage: ShaderStage, message: String },
    #[error("failed to emit SPIR-V for the {stage} shader: {source}")]
    SpirV {
        stage: ShaderStage,
        #[source]
        source: spv::Error,
    },
}

impl LinkError {
    pub fn status(&self) -> LinkStatus {
        match self {
            Self::VertexParseFail => LinkStatus::VertexParseFail,
            Self::FragmentParseFail => LinkStatus::FragmentParseFail,
            Self::UnresolvedVarying { .. } => LinkStatus::UnresolvedVarying,
            Self::AttribLocationUnavailable { .. }
            | Self::LocationsExhausted { .. }
            | Self::Validation { .. }
            | Self::SpirV { .. } => LinkStatus::BackendLinkFail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProgram {
    pub vertex_spv: Vec<u32>,
    pub fragment_spv: Vec<u32>,
    pub vertex_wgsl: Option<String>,
    pub fragment_wgsl: Option<String>,
    pub reflection: ProgramReflection,
}

/// One stage of a link in progress: a private copy of the compiled module
/// and its interface.
struct LinkStage {
    stage: ShaderStage,
    module: Module,
    interface: StageInterface,
}

impl LinkStage {
    fn new(shader: &CompiledShader, stage: ShaderStage) -> Option<Self> {
        if shader.stage != stage {
            return None;
        }

        // activity comes from the compile-time analysis; the clone keeps
        // every handle of the original module valid
        let module = shader.module.clone();
        let mut interface = StageInterface::collect(&module)?;
        interface.mark_activity(&module, &shader.info);

        Some(Self {
            stage,
            module,
            interface,
        })
    }
}

/// Links a compiled vertex/fragment pair: pins and allocates attribute
/// locations, matches varyings by name, assigns bindings, then emits SPIR-V
/// for both stages and reflects the active resources.
pub fn link(
    vertex: Option<&CompiledShader>,
    fragment: Option<&CompiledShader>,
    attrib_locations: &BTreeMap<String, u32>,
    options: &LinkOptions,
    session: &FrontendSession,
) -> Result<LinkedProgram, LinkError> {
    let mut vertex = vertex
        .and_then(|shader| LinkStage::new(shader, ShaderStage::Vertex))
        .ok_or(LinkError::VertexParseFail)?;
    let mut fragment = fragment
        .and_then(|shader| LinkStage::new(shader, ShaderStage::Fragment))
        .ok_or(LinkError::FragmentParseFail)?;

    assign_attrib_locations(&mut vertex, attrib_locations, options.attrib_capacity)?;
    let mut varyings = assign_varying_locations(&mut vertex, options.varying_capacity)?;
    resolve_fragment_inputs(&mut fragment, &mut varyings)?;
    assign_bindings(&mut vertex, &mut fragment)?;

    let mut reflection = ProgramReflection::default();
    let mut emitted = Vec::with_capacity(2);

    for stage in [&mut vertex, &mut fragment] {
        let entry_point = stage.interface.entry_point;
        apply_locations(&mut stage.module, entry_point, &stage.interface.inputs);
        apply_locations(&mut stage.module, entry_point, &stage.interface.outputs);

        let info = session
            .validate(&stage.module)
            .map_err(|message| LinkError::Validation {
                stage: stage.stage,
                message,
            })?;
        let spv = write_spv(&stage.module, &info, options)
            .map_err(|source| LinkError::SpirV {
                stage: stage.stage,
                source,
            })?;
        let wgsl = if options.emit_wgsl {
            write_wgsl(stage.stage, &stage.module, &info)
        } else {
            None
        };

        reflect_stage(stage.stage, &stage.module, &stage.interface, &mut reflection);
        emitted.push((spv, wgsl));
    }

    let (fragment_spv, fragment_wgsl) = emitted.pop().unwrap_or_default();
    let (vertex_spv, vertex_wgsl) = emitted.pop().unwrap_or_default();

    debug!(
        "linked: {} attrib(s), {} uniform block(s), {} uniform(s).",
        reflection.attribs.len(),
        reflection.uniform_blocks.len(),
        reflection.uniforms.len()
    );

    Ok(LinkedProgram {
        vertex_spv,
        fragment_spv,
        vertex_wgsl,
        fragment_wgsl,
        reflection,
    })
}

/// Reserves caller-pinned attributes first, then allocates the remaining
/// active inputs and finally the inactive ones, each in declaration order.
fn assign_attrib_locations(
    vertex: &mut LinkStage,
    attrib_locations: &BTreeMap<String, u32>,
    capacity: u32,
) -> Result<(), LinkError> {
    let mut allocator = LocationAllocator::new(capacity);
    let mut pinned = vec![false; vertex.interface.inputs.len()];

    for (index, input) in vertex.interface.inputs.iter_mut().enumerate() {
        let location = match attrib_locations.get(&input.name) {
            Some(location) => *location,
            None => continue,
        };

        if !allocator.reserve(location, slot_count(&vertex.module, input)) {
            return Err(LinkError::AttribLocationUnavailable {
                name: input.name.clone(),
                location,
            });
        }

        input.location = location;
        pinned[index] = true;
    }

    for active in [true, false] {
        for (index, input) in vertex.interface.inputs.iter_mut().enumerate() {
            if pinned[index] || input.active != active {
                continue;
            }

            input.location = allocate(&mut allocator, &vertex.module, input, "attribute locations")?;
        }
    }

    Ok(())
}

/// Vertex output locations by name, and the allocator they were taken from.
struct Varyings {
    locations: BTreeMap<String, u32>,
    allocator: LocationAllocator,
}

/// Allocates vertex outputs, active before inactive, and records the name
/// to location map fragment inputs are resolved against.
fn assign_varying_locations(
    vertex: &mut LinkStage,
    capacity: u32,
) -> Result<Varyings, LinkError> {
    let mut allocator = LocationAllocator::new(capacity);
    let mut locations = BTreeMap::new();

    for active in [true, false] {
        for output in vertex
            .interface
            .outputs
            .iter_mut()
            .filter(|output| output.active == active)
        {
            output.location = allocate(&mut allocator, &vertex.module, output, "varying locations")?;
            locations.insert(output.name.clone(), output.location);
        }
    }

    Ok(Varyings {
        locations,
        allocator,
    })
}

/// Every active fragment input must name a vertex output. An inactive input
/// without one gets a location no vertex output uses.
fn resolve_fragment_inputs(
    fragment: &mut LinkStage,
    varyings: &mut Varyings,
) -> Result<(), LinkError> {
    for input in &mut fragment.interface.inputs {
        input.location = match varyings.locations.get(&input.name) {
            Some(location) => *location,
            None if !input.active => allocate(
                &mut varyings.allocator,
                &fragment.module,
                input,
                "varying locations",
            )?,
            None => {
                return Err(LinkError::UnresolvedVarying {
                    name: input.name.clone(),
                });
            }
        };
    }

    Ok(())
}

/// Hands out bindings from one counter: vertex samplers, vertex blocks,
/// fragment samplers, fragment blocks. Inactive resources follow in the same
/// order so they never collide with active ones.
fn assign_bindings(vertex: &mut LinkStage, fragment: &mut LinkStage) -> Result<(), LinkError> {
    let mut allocator = LocationAllocator::new(u32::MAX);

    for active in [true, false] {
        for stage in [&mut *vertex, &mut *fragment] {
            let resources = stage
                .interface
                .textures
                .iter()
                .chain(stage.interface.uniform_blocks.iter())
                .filter(|resource| resource.active == active)
                .cloned()
                .collect::<Vec<_>>();

            for resource in resources {
                let binding = allocate_binding(&mut allocator, &resource)?;
                apply_binding(&mut stage.module, &resource, binding);
            }
        }
    }

    Ok(())
}

fn slot_count(module: &Module, var: &InterfaceVar) -> NonZeroU32 {
    NonZeroU32::new(var.footprint(module)).unwrap_or(NonZeroU32::MIN)
}

fn allocate(
    allocator: &mut LocationAllocator,
    module: &Module,
    var: &InterfaceVar,
    namespace: &'static str,
) -> Result<u32, LinkError> {
    allocator
        .allocate(slot_count(module, var))
        .ok_or_else(|| LinkError::LocationsExhausted {
            namespace,
            name: var.name.clone(),
        })
}

fn allocate_binding(
    allocator: &mut LocationAllocator,
    resource: &ResourceVar,
) -> Result<u32, LinkError> {
    allocator
        .allocate(NonZeroU32::MIN)
        .ok_or_else(|| LinkError::LocationsExhausted {
            namespace: "bindings",
            name: resource.name.clone(),
        })
}

fn write_spv(
    module: &Module,
    info: &ModuleInfo,
    options: &LinkOptions,
) -> Result<Vec<u32>, spv::Error> {
    let spv_options = spv::Options {
        lang_version: options.spirv_version,
        flags: spv::WriterFlags::DEBUG | spv::WriterFlags::LABEL_VARYINGS,
        ..Default::default()
    };

    spv::write_vec(module, info, &spv_options, None)
}

fn write_wgsl(stage: ShaderStage, module: &Module, info: &ModuleInfo) -> Option<String> {
    match wgsl::write_string(module, info, wgsl::WriterFlags::empty()) {
        Ok(source) => Some(source),
        Err(err) => {
            warn!("failed to write the {} shader as WGSL: {}", stage, err);
            None
        }
    }
}
