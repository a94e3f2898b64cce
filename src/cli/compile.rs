use crate::metadata::{load_metadata, ProgramMetadata};
use anyhow::{anyhow, Context, Error as AnyError};
use log::{debug, info, warn};
use shc_core::{LinkOptions, Program, Shader, ShaderStage};
use shc_resource::{ProgramFile, ProgramFileVersion};
use std::path::{Path, PathBuf};

pub struct CompileArgs<'a> {
    pub vertex: Option<&'a PathBuf>,
    pub fragment: Option<&'a PathBuf>,
    pub output: Option<&'a PathBuf>,
    pub reflection: Option<&'a PathBuf>,
    pub emit_wgsl: bool,
}

pub fn compile(args: &CompileArgs) -> Result<(), AnyError> {
    info!("compiling program.");

    let vertex_path = match args.vertex {
        Some(path) => path.as_path(),
        None => return Err(anyhow!("the vertex shader path is not specified")),
    };
    let fragment_path = match args.fragment {
        Some(path) => path.as_path(),
        None => return Err(anyhow!("the fragment shader path is not specified")),
    };

    let output = match args.output {
        Some(output) => output.to_owned(),
        None => {
            let output = std::env::current_dir()?.join("program.res");
            warn!(
                "the output path is not specified, defaulting to `{}`.",
                output.display()
            );
            output
        }
    };

    if output.exists() {
        warn!(
            "the output path `{}` already exists, it will be overwritten.",
            output.display()
        );
    }

    let metadata = load_metadata::<ProgramMetadata>(vertex_path)?.unwrap_or_default();
    let emit_wgsl = args.emit_wgsl || metadata.emit_wgsl;

    let vertex = compile_shader(ShaderStage::Vertex, vertex_path)?;
    let fragment = compile_shader(ShaderStage::Fragment, fragment_path)?;

    let mut program = Program::with_options(LinkOptions {
        emit_wgsl,
        ..LinkOptions::default()
    });

    for (name, location) in &metadata.attrib_locations {
        debug!("pinning attribute `{}` to location {}.", name, location);
        program
            .bind_attrib_location(name.as_str(), *location)
            .with_context(|| format!("failed to pin the attribute `{}`", name))?;
    }

    if !program.link(&vertex, &fragment) {
        return Err(anyhow!("{}", program.info_log().trim_end())).with_context(|| {
            format!(
                "failed to link `{}` and `{}` ({:?})",
                vertex_path.display(),
                fragment_path.display(),
                program.link_status()
            )
        });
    }

    let reflection = program.reflection()?.clone();
    info!(
        "linked: {} attrib(s), {} uniform block(s), {} uniform(s).",
        reflection.attribs.len(),
        reflection.uniform_blocks.len(),
        reflection.uniforms.len()
    );

    if let Some(reflection_path) = args.reflection {
        let json = serde_json::to_string_pretty(&reflection)
            .with_context(|| format!("failed to serialize the reflection"))?;
        write_file(reflection_path, json.as_bytes())
            .with_context(|| format!("failed to write the reflection"))?;
    }

    if emit_wgsl {
        for (stage, extension) in [
            (ShaderStage::Vertex, "vert.wgsl"),
            (ShaderStage::Fragment, "frag.wgsl"),
        ] {
            match program.wgsl(stage) {
                Some(wgsl) => {
                    write_file(&output.with_extension(extension), wgsl.as_bytes())
                        .with_context(|| format!("failed to write the {} WGSL", stage))?;
                }
                None => {
                    warn!("no WGSL was produced for the {} shader.", stage);
                }
            }
        }
    }

    let program_file = ProgramFile::new(
        ProgramFileVersion::V1,
        program.spv(ShaderStage::Vertex).to_vec(),
        program.spv(ShaderStage::Fragment).to_vec(),
        reflection,
    );
    let program_file_data = bincode::serialize(&program_file)
        .with_context(|| format!("failed to serialize the program file"))?;

    write_file(&output, &program_file_data)
        .with_context(|| format!("failed to write the program file"))?;

    info!(
        "compilation finished ({} + {} bytes of SPIR-V).",
        program.spv_size(ShaderStage::Vertex),
        program.spv_size(ShaderStage::Fragment)
    );

    Ok(())
}

fn compile_shader(stage: ShaderStage, path: &Path) -> Result<Shader, AnyError> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read the {} shader `{}`", stage, path.display()))?;

    let mut shader = Shader::new();

    if !shader.compile(stage, &source) {
        return Err(anyhow!("{}", shader.info_log().trim_end())).with_context(|| {
            format!(
                "failed to compile the {} shader `{}`",
                stage,
                path.display()
            )
        });
    }

    debug!(
        "translated {} shader `{}`:\n{}",
        stage,
        path.display(),
        shader.translated_source()
    );

    Ok(shader)
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), AnyError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("failed to create the output directory `{}`", dir.display())
            })?;
        }
    }

    std::fs::write(path, content)
        .with_context(|| format!("failed to write to `{}`", path.display()))?;

    Ok(())
}
