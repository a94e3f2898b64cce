use super::footprint::location_footprint;
use crate::translator::{SAMPLER_PREFIX, TEXTURE_PREFIX};
use naga::{
    valid::{GlobalUse, ModuleInfo},
    AddressSpace, Binding, Function, GlobalVariable, Handle, Module, ResourceBinding, Type,
    TypeInner,
};

/// Group of the sampler half of a legacy combined sampler. The texture half
/// keeps group 0 and both halves share the binding number.
pub const SAMPLER_GROUP: u32 = 1;

/// Where the location decoration of an interface variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSlot {
    Argument(usize),
    Result,
    ResultMember(usize),
}

#[derive(Debug, Clone)]
pub struct InterfaceVar {
    pub name: String,
    pub ty: Handle<Type>,
    pub slot: LocationSlot,
    pub location: u32,
    pub active: bool,
}

impl InterfaceVar {
    pub fn footprint(&self, module: &Module) -> u32 {
        location_footprint(&module.types, self.ty).max(1)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceVar {
    /// Name as declared in the legacy source.
    pub name: String,
    pub global: Handle<GlobalVariable>,
    /// Sampler half of a split combined sampler.
    pub sampler: Option<Handle<GlobalVariable>>,
    pub active: bool,
}

/// Locations and resources one stage module exposes, in declaration order.
#[derive(Debug, Clone)]
pub struct StageInterface {
    pub entry_point: usize,
    pub inputs: Vec<InterfaceVar>,
    pub outputs: Vec<InterfaceVar>,
    pub textures: Vec<ResourceVar>,
    pub uniform_blocks: Vec<ResourceVar>,
}

impl StageInterface {
    /// Collects the interface of the module's first entry point. Everything
    /// starts out active until [`StageInterface::mark_activity`] runs.
    pub fn collect(module: &Module) -> Option<Self> {
        let entry_point = module.entry_points.first()?;
        let function = &entry_point.function;

        let mut inputs = Vec::with_capacity(function.arguments.len());

        for (index, argument) in function.arguments.iter().enumerate() {
            if let Some(Binding::Location { location, .. }) = &argument.binding {
                inputs.push(InterfaceVar {
                    name: argument.name.clone().unwrap_or_default(),
                    ty: argument.ty,
                    slot: LocationSlot::Argument(index),
                    location: *location,
                    active: true,
                });
            }
        }

        let mut outputs = Vec::new();

        if let Some(result) = &function.result {
            match &result.binding {
                Some(Binding::Location { location, .. }) => {
                    outputs.push(InterfaceVar {
                        name: String::new(),
                        ty: result.ty,
                        slot: LocationSlot::Result,
                        location: *location,
                        active: true,
                    });
                }
                Some(_) => {}
                None => {
                    if let TypeInner::Struct { members, .. } = &module.types[result.ty].inner {
                        for (index, member) in members.iter().enumerate() {
                            if let Some(Binding::Location { location, .. }) = &member.binding {
                                outputs.push(InterfaceVar {
                                    name: member.name.clone().unwrap_or_default(),
                                    ty: member.ty,
                                    slot: LocationSlot::ResultMember(index),
                                    location: *location,
                                    active: true,
                                });
                            }
                        }
                    }
                }
            }
        }

        let mut textures = Vec::new();
        let mut uniform_blocks = Vec::new();

        for (handle, global) in module.global_variables.iter() {
            match global.space {
                AddressSpace::Handle => {
                    if !matches!(module.types[global.ty].inner, TypeInner::Image { .. }) {
                        continue;
                    }

                    let declared = global.name.clone().unwrap_or_default();
                    let (name, sampler) = match declared.strip_prefix(TEXTURE_PREFIX) {
                        Some(name) => (
                            name.to_owned(),
                            find_global(module, &format!("{}{}", SAMPLER_PREFIX, name)),
                        ),
                        None => (declared.clone(), None),
                    };

                    textures.push(ResourceVar {
                        name,
                        global: handle,
                        sampler,
                        active: true,
                    });
                }
                AddressSpace::Uniform => {
                    let name = global
                        .name
                        .clone()
                        .or_else(|| module.types[global.ty].name.clone())
                        .unwrap_or_default();

                    uniform_blocks.push(ResourceVar {
                        name,
                        global: handle,
                        sampler: None,
                        active: true,
                    });
                }
                _ => {}
            }
        }

        Some(Self {
            entry_point: 0,
            inputs,
            outputs,
            textures,
            uniform_blocks,
        })
    }

    /// Marks every variable the shader's `main` never touches as inactive.
    pub fn mark_activity(&mut self, module: &Module, info: &ModuleInfo) {
        let main = find_main(module);
        let entry_point = self.entry_point;
        let is_used = |global: Handle<GlobalVariable>| {
            let usage = match main {
                Some(main) => info[main][global],
                None => info.get_entry_point(entry_point)[global],
            };
            usage.intersects(GlobalUse::READ | GlobalUse::WRITE)
        };

        for var in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            // the front end mirrors each interface variable into a private
            // global of the same name, which is what `main` accesses
            var.active = match find_private_global(module, &var.name) {
                Some(global) => is_used(global),
                None => true,
            };
        }

        for texture in &mut self.textures {
            texture.active =
                is_used(texture.global) || texture.sampler.map_or(false, |sampler| is_used(sampler));
        }

        for block in &mut self.uniform_blocks {
            block.active = is_used(block.global);
        }
    }
}

/// Gives every input, every non-fragment output and every resource its own
/// location or binding so the module validates on its own. Linking replaces
/// all of these.
pub fn assign_provisional(module: &mut Module, interface: &mut StageInterface) {
    let mut next_location = 0u32;

    for input in &mut interface.inputs {
        input.location = next_location;
        next_location = next_location.saturating_add(input.footprint(module));
    }

    let is_fragment = module
        .entry_points
        .get(interface.entry_point)
        .map_or(false, |entry_point| entry_point.stage == naga::ShaderStage::Fragment);

    if !is_fragment {
        let mut next_location = 0u32;

        for output in &mut interface.outputs {
            output.location = next_location;
            next_location = next_location.saturating_add(output.footprint(module));
        }
    }

    apply_locations(module, interface.entry_point, &interface.inputs);
    apply_locations(module, interface.entry_point, &interface.outputs);

    for (binding, resource) in interface
        .textures
        .iter()
        .chain(interface.uniform_blocks.iter())
        .enumerate()
    {
        apply_binding(module, resource, binding as u32);
    }
}

/// Writes each variable's `location` into the entry point's decorations.
pub fn apply_locations(module: &mut Module, entry_point: usize, vars: &[InterfaceVar]) {
    let function = &mut module.entry_points[entry_point].function;
    let mut result_members = None;

    for var in vars {
        match var.slot {
            LocationSlot::Argument(index) => {
                if let Some(binding) = function.arguments[index].binding.as_mut() {
                    set_location(binding, var.location);
                }
            }
            LocationSlot::Result => {
                if let Some(binding) = function
                    .result
                    .as_mut()
                    .and_then(|result| result.binding.as_mut())
                {
                    set_location(binding, var.location);
                }
            }
            LocationSlot::ResultMember(index) => {
                let ty = match &function.result {
                    Some(result) => result.ty,
                    None => continue,
                };
                let (_, members, _, changed) =
                    result_members.get_or_insert_with(|| match &module.types[ty].inner {
                        TypeInner::Struct { members, span } => (ty, members.clone(), *span, false),
                        _ => (ty, vec![], 0, false),
                    });

                if let Some(binding) = members
                    .get_mut(index)
                    .and_then(|member| member.binding.as_mut())
                {
                    *changed |= set_location(binding, var.location);
                }
            }
        }
    }

    // the result struct is shared by handle, so it is replaced in place; an
    // unchanged value must not be re-inserted into the unique arena
    if let Some((ty, members, span, true)) = result_members {
        let name = module.types[ty].name.clone();
        module.types.replace(
            ty,
            Type {
                name,
                inner: TypeInner::Struct { members, span },
            },
        );
    }
}

pub fn apply_binding(module: &mut Module, resource: &ResourceVar, binding: u32) {
    module.global_variables[resource.global].binding = Some(ResourceBinding { group: 0, binding });

    if let Some(sampler) = resource.sampler {
        module.global_variables[sampler].binding = Some(ResourceBinding {
            group: SAMPLER_GROUP,
            binding,
        });
    }
}

fn set_location(binding: &mut Binding, new_location: u32) -> bool {
    match binding {
        Binding::Location { location, .. } if *location != new_location => {
            *location = new_location;
            true
        }
        _ => false,
    }
}

fn find_main(module: &Module) -> Option<Handle<Function>> {
    module
        .functions
        .iter()
        .find(|(_, function)| function.name.as_deref() == Some("main"))
        .map(|(handle, _)| handle)
}

fn find_global(module: &Module, name: &str) -> Option<Handle<GlobalVariable>> {
    module
        .global_variables
        .iter()
        .find(|(_, global)| global.name.as_deref() == Some(name))
        .map(|(handle, _)| handle)
}

fn find_private_global(module: &Module, name: &str) -> Option<Handle<GlobalVariable>> {
    module
        .global_variables
        .iter()
        .find(|(_, global)| {
            global.space == AddressSpace::Private && global.name.as_deref() == Some(name)
        })
        .map(|(handle, _)| handle)
}
