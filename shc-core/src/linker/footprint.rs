use naga::{ArraySize, Handle, ScalarKind, Type, TypeInner, UniqueArena};

const SLOT_SIZE: u32 = 16;

/// Number of consecutive interface locations a value of type `ty` occupies.
/// Each location holds 16 bytes; 64-bit types need twice the room.
pub fn location_footprint(types: &UniqueArena<Type>, ty: Handle<Type>) -> u32 {
    match &types[ty].inner {
        TypeInner::Scalar(scalar) => slots(scalar_width(scalar.kind, scalar.width), 1),
        TypeInner::Vector { size, scalar } => {
            slots(scalar_width(scalar.kind, scalar.width), *size as u32)
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => *columns as u32 * slots(scalar.width as u32, *rows as u32),
        TypeInner::Array { base, size, .. } => {
            let count = match size {
                ArraySize::Constant(count) => count.get(),
                ArraySize::Dynamic => 1,
            };
            count.saturating_mul(location_footprint(types, *base))
        }
        TypeInner::Struct { members, .. } => members
            .iter()
            .map(|member| location_footprint(types, member.ty))
            .fold(0, u32::saturating_add),
        _ => 0,
    }
}

fn scalar_width(kind: ScalarKind, width: u8) -> u32 {
    match kind {
        // booleans are 32-bit at the interface
        ScalarKind::Bool => 4,
        _ => width as u32,
    }
}

fn slots(width: u32, components: u32) -> u32 {
    (width * components + SLOT_SIZE - 1) / SLOT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use naga::{Scalar, Span, StructMember, VectorSize};
    use std::num::NonZeroU32;

    fn add(types: &mut UniqueArena<Type>, inner: TypeInner) -> Handle<Type> {
        types.insert(Type { name: None, inner }, Span::default())
    }

    #[test]
    fn test_scalar_and_vector_footprint() {
        let mut types = UniqueArena::new();
        let float = add(&mut types, TypeInner::Scalar(Scalar::F32));
        let vec4 = add(
            &mut types,
            TypeInner::Vector {
                size: VectorSize::Quad,
                scalar: Scalar::F32,
            },
        );
        let dvec3 = add(
            &mut types,
            TypeInner::Vector {
                size: VectorSize::Tri,
                scalar: Scalar::F64,
            },
        );

        assert_eq!(location_footprint(&types, float), 1);
        assert_eq!(location_footprint(&types, vec4), 1);
        assert_eq!(location_footprint(&types, dvec3), 2);
    }

    #[test]
    fn test_matrix_footprint() {
        let mut types = UniqueArena::new();
        let mat4 = add(
            &mut types,
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar: Scalar::F32,
            },
        );
        let mat3x2 = add(
            &mut types,
            TypeInner::Matrix {
                columns: VectorSize::Tri,
                rows: VectorSize::Bi,
                scalar: Scalar::F32,
            },
        );

        assert_eq!(location_footprint(&types, mat4), 4);
        assert_eq!(location_footprint(&types, mat3x2), 3);
    }

    #[test]
    fn test_aggregate_footprint() {
        let mut types = UniqueArena::new();
        let vec2 = add(
            &mut types,
            TypeInner::Vector {
                size: VectorSize::Bi,
                scalar: Scalar::F32,
            },
        );
        let array = add(
            &mut types,
            TypeInner::Array {
                base: vec2,
                size: ArraySize::Constant(NonZeroU32::new(3).unwrap()),
                stride: 8,
            },
        );
        let mat2 = add(
            &mut types,
            TypeInner::Matrix {
                columns: VectorSize::Bi,
                rows: VectorSize::Bi,
                scalar: Scalar::F32,
            },
        );
        let structure = add(
            &mut types,
            TypeInner::Struct {
                members: vec![
                    StructMember {
                        name: Some("points".to_owned()),
                        ty: array,
                        binding: None,
                        offset: 0,
                    },
                    StructMember {
                        name: Some("basis".to_owned()),
                        ty: mat2,
                        binding: None,
                        offset: 32,
                    },
                ],
                span: 48,
            },
        );

        assert_eq!(location_footprint(&types, array), 3);
        assert_eq!(location_footprint(&types, structure), 5);
    }

    #[test]
    fn test_opaque_types_take_no_slots() {
        let mut types = UniqueArena::new();
        let sampler = add(&mut types, TypeInner::Sampler { comparison: false });

        assert_eq!(location_footprint(&types, sampler), 0);
    }
}
