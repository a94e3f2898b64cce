use crate::{linker::interface::StageInterface, translator::MAT2_PREFIX};
use naga::{
    ArraySize, Handle, ImageDimension, Module, Scalar, ScalarKind, StructMember, Type, TypeInner,
    UniqueArena, VectorSize,
};
use shc_resource::{
    AttribInfo, ProgramReflection, ShaderStage, UniformBlockInfo, UniformInfo, VariableType,
};

/// Appends the active resources of one linked stage to `reflection`: its
/// samplers, its first active uniform block with flattened members, and for
/// the vertex stage its active inputs.
pub fn reflect_stage(
    stage: ShaderStage,
    module: &Module,
    interface: &StageInterface,
    reflection: &mut ProgramReflection,
) {
    for texture in interface.textures.iter().filter(|texture| texture.active) {
        let global = &module.global_variables[texture.global];

        reflection.uniforms.push(UniformInfo {
            name: texture.name.clone(),
            ty: variable_type(&module.types, global.ty),
            array_size: 1,
            block_index: None,
            block_offset: 0,
            binding: global.binding.as_ref().map(|binding| binding.binding),
            array_stride: 0,
            matrix_stride: 0,
            stage,
        });
    }

    // one synthesized block per stage at most
    if let Some(block) = interface.uniform_blocks.iter().find(|block| block.active) {
        let global = &module.global_variables[block.global];

        if let TypeInner::Struct { members, span } = &module.types[global.ty].inner {
            let block_index = reflection.uniform_blocks.len() as u32;

            reflection.uniform_blocks.push(UniformBlockInfo {
                binding: global
                    .binding
                    .as_ref()
                    .map_or(0, |binding| binding.binding),
                size: *span,
                stage,
            });

            let mut flattener = MemberFlattener {
                types: &module.types,
                stage,
                block_index,
                uniforms: &mut reflection.uniforms,
            };
            flattener.flatten(members, "", 0);
        }
    }

    if stage == ShaderStage::Vertex {
        for input in interface.inputs.iter().filter(|input| input.active) {
            reflection.attribs.push(AttribInfo {
                name: input.name.clone(),
                ty: variable_type(&module.types, input.ty),
                location: input.location,
            });
        }
    }
}

struct MemberFlattener<'a> {
    types: &'a UniqueArena<Type>,
    stage: ShaderStage,
    block_index: u32,
    uniforms: &'a mut Vec<UniformInfo>,
}

impl<'a> MemberFlattener<'a> {
    fn flatten(&mut self, members: &[StructMember], prefix: &str, base_offset: u32) {
        let types = self.types;

        for member in members {
            let member_name = member.name.as_deref().unwrap_or_default();
            let name = if prefix.is_empty() {
                member_name.to_owned()
            } else {
                format!("{}.{}", prefix, member_name)
            };
            let offset = base_offset + member.offset;

            match &types[member.ty].inner {
                TypeInner::Struct { members, .. } => {
                    self.flatten(members, &name, offset);
                }
                TypeInner::Array { base, size, stride } => {
                    let count = match size {
                        ArraySize::Constant(count) => count.get(),
                        ArraySize::Dynamic => 0,
                    };

                    match &types[*base].inner {
                        TypeInner::Struct { members, .. } => {
                            for index in 0..count {
                                self.flatten(
                                    members,
                                    &format!("{}[{}]", name, index),
                                    offset + index * stride,
                                );
                            }
                        }
                        _ => {
                            self.push(format!("{}[0]", name), *base, offset, count, *stride);
                        }
                    }
                }
                _ => {
                    self.push(name, member.ty, offset, 1, 0);
                }
            }
        }
    }

    fn push(
        &mut self,
        name: String,
        ty: Handle<Type>,
        offset: u32,
        array_size: u32,
        array_stride: u32,
    ) {
        // a legacy `mat2` lives in the block as a padded `mat2x4`
        let legacy_mat2 = name.strip_prefix(MAT2_PREFIX).map(str::to_owned);
        let (name, reflected_ty) = match legacy_mat2 {
            Some(legacy) => (legacy, VariableType::FloatMat2),
            None => (name, variable_type(self.types, ty)),
        };

        self.uniforms.push(UniformInfo {
            name,
            ty: reflected_ty,
            array_size,
            block_index: Some(self.block_index),
            block_offset: offset,
            binding: None,
            array_stride,
            matrix_stride: matrix_stride(&self.types[ty].inner),
            stage: self.stage,
        });
    }
}

/// Column stride of a matrix as laid out by the front end: two-row columns
/// are packed, wider ones are padded to four components. Legacy `mat2`
/// uniforms never reach the two-row case; they are stored as `mat2x4`.
fn matrix_stride(inner: &TypeInner) -> u32 {
    match inner {
        TypeInner::Matrix { rows, scalar, .. } => match rows {
            VectorSize::Bi => 2 * scalar.width as u32,
            _ => 4 * scalar.width as u32,
        },
        _ => 0,
    }
}

pub fn variable_type(types: &UniqueArena<Type>, ty: Handle<Type>) -> VariableType {
    match &types[ty].inner {
        TypeInner::Scalar(scalar) => vector_type(*scalar, 1),
        TypeInner::Vector { size, scalar } => vector_type(*scalar, *size as u32),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if *scalar == Scalar::F32 && columns == rows => match columns {
            VectorSize::Bi => VariableType::FloatMat2,
            VectorSize::Tri => VariableType::FloatMat3,
            VectorSize::Quad => VariableType::FloatMat4,
        },
        TypeInner::Array { base, .. } => variable_type(types, *base),
        TypeInner::Image { dim, arrayed, .. } if !arrayed => match dim {
            ImageDimension::D2 => VariableType::Sampler2D,
            ImageDimension::Cube => VariableType::SamplerCube,
            _ => VariableType::Unknown,
        },
        _ => VariableType::Unknown,
    }
}

fn vector_type(scalar: Scalar, components: u32) -> VariableType {
    if scalar.kind != ScalarKind::Bool && scalar.width != 4 {
        return VariableType::Unknown;
    }

    match (scalar.kind, components) {
        (ScalarKind::Bool, 1) => VariableType::Bool,
        (ScalarKind::Bool, 2) => VariableType::BoolVec2,
        (ScalarKind::Bool, 3) => VariableType::BoolVec3,
        (ScalarKind::Bool, 4) => VariableType::BoolVec4,
        (ScalarKind::Sint, 1) => VariableType::Int,
        (ScalarKind::Sint, 2) => VariableType::IntVec2,
        (ScalarKind::Sint, 3) => VariableType::IntVec3,
        (ScalarKind::Sint, 4) => VariableType::IntVec4,
        (ScalarKind::Float, 1) => VariableType::Float,
        (ScalarKind::Float, 2) => VariableType::FloatVec2,
        (ScalarKind::Float, 3) => VariableType::FloatVec3,
        (ScalarKind::Float, 4) => VariableType::FloatVec4,
        _ => VariableType::Unknown,
    }
}
