mod preprocess;
mod uniform_scan;

pub use self::preprocess::PreprocessError;

use self::{
    preprocess::preprocess,
    uniform_scan::{scan_uniform_decls, UniformDecl},
};
use log::{debug, warn};
use shc_resource::ShaderStage;
use std::fmt::{Display, Formatter, Result as FmtResult};

pub const TARGET_GLSL_VERSION: u32 = 450;

pub(crate) const TEXTURE_PREFIX: &str = "compat_texture_";
pub(crate) const SAMPLER_PREFIX: &str = "compat_sampler_";
pub(crate) const MAT2_PREFIX: &str = "compat_mat2_";

const VERTEX_UNIFORM_BLOCK: &str = "compat_VertexUniforms";
const FRAGMENT_UNIFORM_BLOCK: &str = "compat_FragmentUniforms";
const FRAG_COLOR: &str = "compat_FragColor";

/// Block member type holding a legacy `mat2` with the std140 column stride.
const MAT2_STORAGE_TYPE: &str = "mat2x4";

/// Legacy sampling built-ins and their target equivalents.
const SAMPLING_MACROS: [(&str, &str); 5] = [
    ("texture2D", "texture"),
    ("texture2DLod", "textureLod"),
    ("texture2DProj", "textureProj"),
    ("textureCube", "texture"),
    ("textureCubeLod", "textureLod"),
];

#[derive(Debug, Clone)]
pub struct Translation {
    pub source: String,
    pub limitations: Vec<TranslationLimitation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitationKind {
    /// A `uniform` declaration outside the recognized grammar, kept as
    /// written.
    UniformDeclaration,
    /// `gl_FragData` used with anything but a literal `[0]`.
    FragDataIndex,
}

/// A construct the translator could not carry over to the target dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationLimitation {
    pub kind: LimitationKind,
    pub line: usize,
    pub text: String,
}

impl Display for TranslationLimitation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            LimitationKind::UniformDeclaration => write!(
                f,
                "line {}: `{}` is not a recognized uniform declaration; it is kept as written",
                self.line, self.text
            ),
            LimitationKind::FragDataIndex => write!(
                f,
                "line {}: `{}` is only emulated as `{}[0]`",
                self.line, self.text, self.text
            ),
        }
    }
}

/// Rewrites legacy-dialect source for one stage into target-dialect source.
/// Fails only when the legacy preprocessor rejects the source.
pub fn translate(source: &str, stage: ShaderStage) -> Result<Translation, PreprocessError> {
    let preprocessed = preprocess(source, stage)?;
    let source = preprocessed.source;
    let scan = scan_uniform_decls(&source);

    let mut limitations = scan
        .unrecognized
        .iter()
        .map(|unrecognized| TranslationLimitation {
            kind: LimitationKind::UniformDeclaration,
            line: line_number(&source, unrecognized.offset),
            text: unrecognized.text.clone(),
        })
        .collect::<Vec<_>>();

    limitations.extend(
        preprocessed
            .unmapped_frag_data
            .into_iter()
            .map(|line| TranslationLimitation {
                kind: LimitationKind::FragDataIndex,
                line,
                text: "gl_FragData".to_owned(),
            }),
    );

    let mut rewritten = Vec::with_capacity(scan.decls.len());

    for decl in scan.decls {
        // neither a sampler array nor a matrix array can stand behind one
        // macro name
        if (decl.is_opaque() || decl.is_mat2()) && !decl.array_suffix.is_empty() {
            limitations.push(TranslationLimitation {
                kind: LimitationKind::UniformDeclaration,
                line: line_number(&source, decl.offset),
                text: source[decl.offset..decl.end()].to_owned(),
            });
            continue;
        }

        rewritten.push(decl);
    }

    limitations.sort_by_key(|limitation| limitation.line);

    for limitation in &limitations {
        warn!("{} shader: {}", stage, limitation);
    }

    let (opaque, loose): (Vec<_>, Vec<_>) = rewritten.iter().partition(|decl| decl.is_opaque());

    debug!(
        "{} shader: {} loose uniform(s), {} sampler(s).",
        stage,
        loose.len(),
        opaque.len()
    );

    let body = rewrite_declarations(&source, &rewritten, stage);
    let mut translated = generate_preamble(stage, &opaque, &loose);
    translated.push_str(&body);

    Ok(Translation {
        source: translated,
        limitations,
    })
}

pub fn uniform_block_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => VERTEX_UNIFORM_BLOCK,
        ShaderStage::Fragment => FRAGMENT_UNIFORM_BLOCK,
    }
}

/// Replaces the last loose declaration with the synthesized block and drops
/// every other matched declaration. Opaque declarations move to the preamble.
fn rewrite_declarations(source: &str, decls: &[UniformDecl], stage: ShaderStage) -> String {
    let loose = decls
        .iter()
        .filter(|decl| !decl.is_opaque())
        .collect::<Vec<_>>();
    let block = generate_uniform_block(stage, &loose);
    let last_loose = decls.iter().rposition(|decl| !decl.is_opaque());

    let mut output = source.to_owned();

    // back to front, so earlier offsets stay valid
    for (index, decl) in decls.iter().enumerate().rev() {
        let replacement = if Some(index) == last_loose {
            block.as_str()
        } else {
            ""
        };

        output.replace_range(decl.offset..decl.end(), replacement);
    }

    output
}

fn generate_uniform_block(stage: ShaderStage, loose: &[&UniformDecl]) -> String {
    if loose.is_empty() {
        return String::new();
    }

    let mut block = format!(
        "layout(std140, binding = 0) uniform {}\n{{\n",
        uniform_block_name(stage)
    );

    for decl in loose {
        block.push('\t');

        if decl.is_mat2() {
            // std140 pads each `mat2` column to 16 bytes; the front end only
            // lays out matrices with at least three rows that way
            block.push_str(&format!("{} {}{}", MAT2_STORAGE_TYPE, MAT2_PREFIX, decl.name));
        } else {
            block.push_str(&decl.declaration());
        }

        block.push_str(";\n");
    }

    block.push_str("};\n");
    block
}

fn generate_preamble(
    stage: ShaderStage,
    opaque: &[&UniformDecl],
    loose: &[&UniformDecl],
) -> String {
    let mut preamble = format!("#version {}\n", TARGET_GLSL_VERSION);

    // the type keywords are macro names below, so the pairs come first
    for decl in opaque {
        let texture_type = match decl.ty.as_str() {
            "samplerCube" => "textureCube",
            _ => "texture2D",
        };

        preamble.push_str(&format!(
            "layout(set = 0, binding = 0) uniform {} {}{};\n",
            texture_type, TEXTURE_PREFIX, decl.name
        ));
        preamble.push_str(&format!(
            "layout(set = 1, binding = 0) uniform sampler {}{};\n",
            SAMPLER_PREFIX, decl.name
        ));
    }

    for (legacy, target) in SAMPLING_MACROS {
        preamble.push_str(&format!("#define {} {}\n", legacy, target));
    }

    match stage {
        ShaderStage::Vertex => {
            preamble.push_str("#define attribute layout(location = 0) in\n");
            preamble.push_str("#define varying layout(location = 0) out\n");
        }
        ShaderStage::Fragment => {
            preamble.push_str("#define varying layout(location = 0) in\n");
            preamble.push_str(&format!("#define gl_FragColor {}\n", FRAG_COLOR));
            preamble.push_str(&format!(
                "layout(location = 0) out vec4 {};\n",
                FRAG_COLOR
            ));
        }
    }

    for decl in opaque {
        preamble.push_str(&format!(
            "#define {0} {1}({2}{0}, {3}{0})\n",
            decl.name, decl.ty, TEXTURE_PREFIX, SAMPLER_PREFIX
        ));
    }

    for decl in loose.iter().filter(|decl| decl.is_mat2()) {
        preamble.push_str(&format!(
            "#define {0} mat2({1}{0})\n",
            decl.name, MAT2_PREFIX
        ));
    }

    preamble
}

fn line_number(source: &str, offset: usize) -> usize {
    source
        .get(..offset)
        .map_or(1, |prefix| prefix.matches('\n').count() + 1)
}
