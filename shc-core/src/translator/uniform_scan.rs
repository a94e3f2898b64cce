/// Built-in sampler types that stay individually declared instead of moving
/// into the synthesized uniform block.
pub const OPAQUE_TYPES: [&str; 2] = ["sampler2D", "samplerCube"];

const UNIFORM_KEYWORD: &str = "uniform";

/// One `uniform [precision] type name[array];` declaration found in the
/// source. Offsets are byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub offset: usize,
    pub length: usize,
    pub precision: Option<String>,
    pub ty: String,
    pub name: String,
    pub array_suffix: String,
}

impl UniformDecl {
    /// Declaration text as it appears inside a uniform block. The precision
    /// qualifier is left out: the front end rejects qualifiers on block
    /// members, and the target dialect ignores precision.
    pub fn declaration(&self) -> String {
        format!("{} {}{}", self.ty, self.name, self.array_suffix)
    }

    pub fn is_opaque(&self) -> bool {
        OPAQUE_TYPES.contains(&self.ty.as_str())
    }

    pub fn is_mat2(&self) -> bool {
        self.ty == "mat2"
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// A `uniform` keyword that did not start a declaration of the recognized
/// grammar, e.g. `uniform float a, b;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedUniform {
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct UniformScan {
    pub decls: Vec<UniformDecl>,
    pub unrecognized: Vec<UnrecognizedUniform>,
}

/// Finds every loose or opaque uniform declaration of the form
/// `uniform [precision] type name [array];`.
///
/// The grammar is intentionally narrow: multi-declarator lines, struct
/// definitions and interface blocks do not match and are reported in
/// [`UniformScan::unrecognized`].
pub fn scan_uniform_decls(source: &str) -> UniformScan {
    let bytes = source.as_bytes();
    let mut scan = UniformScan::default();
    let mut search = 0;

    while let Some(found) = source[search..].find(UNIFORM_KEYWORD) {
        let start = search + found;
        let keyword_end = start + UNIFORM_KEYWORD.len();

        if 0 < start && is_word_byte(bytes[start - 1]) {
            search = keyword_end;
            continue;
        }

        if bytes.get(keyword_end).copied().map_or(false, is_word_byte) {
            search = keyword_end;
            continue;
        }

        match parse_uniform_decl(source, start) {
            Some(decl) => {
                search = decl.end();
                scan.decls.push(decl);
            }
            None => {
                scan.unrecognized.push(UnrecognizedUniform {
                    offset: start,
                    text: statement_text(source, start),
                });
                search = keyword_end;
            }
        }
    }

    scan
}

fn parse_uniform_decl(source: &str, start: usize) -> Option<UniformDecl> {
    let bytes = source.as_bytes();
    let first = skip_required_spaces(bytes, start + UNIFORM_KEYWORD.len())?;
    let first_end = word_end(bytes, first)?;
    let second = skip_required_spaces(bytes, first_end)?;
    let second_end = word_end(bytes, second)?;

    // `uniform precision type name ...`
    if let Some(third) = skip_required_spaces(bytes, second_end) {
        if let Some(third_end) = word_end(bytes, third) {
            if let Some((array_suffix, end)) = declaration_tail(source, third_end) {
                return Some(UniformDecl {
                    offset: start,
                    length: end - start,
                    precision: Some(source[first..first_end].to_owned()),
                    ty: source[second..second_end].to_owned(),
                    name: source[third..third_end].to_owned(),
                    array_suffix,
                });
            }
        }
    }

    // `uniform type name ...`
    let (array_suffix, end) = declaration_tail(source, second_end)?;

    Some(UniformDecl {
        offset: start,
        length: end - start,
        precision: None,
        ty: source[first..first_end].to_owned(),
        name: source[second..second_end].to_owned(),
        array_suffix,
    })
}

/// Matches an optional single-line `[...]` suffix followed by `;`. Returns the
/// suffix and the offset right after the semicolon.
fn declaration_tail(source: &str, cursor: usize) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let open = skip_spaces(bytes, cursor);

    if bytes.get(open) == Some(&b'[') {
        let mut close = open + 1;

        while close < bytes.len() && bytes[close] != b'\n' {
            if bytes[close] == b']' {
                let semicolon = skip_spaces(bytes, close + 1);

                if bytes.get(semicolon) == Some(&b';') {
                    return Some((source[open..=close].to_owned(), semicolon + 1));
                }
            }

            close += 1;
        }

        return None;
    }

    let semicolon = skip_spaces(bytes, cursor);

    if bytes.get(semicolon) == Some(&b';') {
        Some((String::new(), semicolon + 1))
    } else {
        None
    }
}

fn statement_text(source: &str, start: usize) -> String {
    let end = source[start..]
        .find(|c| c == ';' || c == '{' || c == '\n')
        .map(|end| start + end)
        .unwrap_or(source.len());
    let end = if source[end..].starts_with(';') {
        end + 1
    } else {
        end
    };

    source[start..end].trim().to_owned()
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_space_byte(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

fn skip_while(bytes: &[u8], mut cursor: usize, predicate: impl Fn(u8) -> bool) -> usize {
    while cursor < bytes.len() && predicate(bytes[cursor]) {
        cursor += 1;
    }

    cursor
}

fn skip_spaces(bytes: &[u8], cursor: usize) -> usize {
    skip_while(bytes, cursor, is_space_byte)
}

fn skip_required_spaces(bytes: &[u8], cursor: usize) -> Option<usize> {
    let skipped = skip_spaces(bytes, cursor);

    if skipped == cursor {
        None
    } else {
        Some(skipped)
    }
}

fn word_end(bytes: &[u8], cursor: usize) -> Option<usize> {
    let end = skip_while(bytes, cursor, is_word_byte);

    if end == cursor {
        None
    } else {
        Some(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl_texts(source: &str) -> Vec<String> {
        scan_uniform_decls(source)
            .decls
            .iter()
            .map(|decl| decl.declaration())
            .collect()
    }

    #[test]
    fn test_scan_basic_declarations() {
        let source = "uniform mat4 mvp;\nuniform highp vec4 color;\nuniform float weights[4];\n";
        let scan = scan_uniform_decls(source);

        assert_eq!(scan.decls.len(), 3);
        assert!(scan.unrecognized.is_empty());

        assert_eq!(scan.decls[0].offset, 0);
        assert_eq!(scan.decls[0].length, "uniform mat4 mvp;".len());
        assert_eq!(scan.decls[0].precision, None);
        assert_eq!(scan.decls[1].precision.as_deref(), Some("highp"));
        assert_eq!(scan.decls[1].ty, "vec4");
        assert_eq!(scan.decls[1].name, "color");
        assert_eq!(scan.decls[2].array_suffix, "[4]");
        assert_eq!(
            decl_texts(source),
            vec!["mat4 mvp", "vec4 color", "float weights[4]"]
        );
    }

    #[test]
    fn test_scan_spacing_variants() {
        let source = "uniform\tvec2  offset ;\nuniform\nlowp float\tscale [ 2 ] ;";

        assert_eq!(decl_texts(source), vec!["vec2 offset", "float scale[ 2 ]"]);
    }

    #[test]
    fn test_scan_marks_opaque_types() {
        let scan = scan_uniform_decls("uniform sampler2D tex;\nuniform mediump samplerCube env;\nuniform vec3 tint;");

        let opaque = scan
            .decls
            .iter()
            .map(|decl| decl.is_opaque())
            .collect::<Vec<_>>();
        assert_eq!(opaque, vec![true, true, false]);
    }

    #[test]
    fn test_scan_skips_multi_declarators() {
        let scan = scan_uniform_decls("uniform float a, b;\nuniform float c;");

        assert_eq!(scan.decls.len(), 1);
        assert_eq!(scan.decls[0].name, "c");
        assert_eq!(scan.unrecognized.len(), 1);
        assert_eq!(scan.unrecognized[0].text, "uniform float a, b;");
    }

    #[test]
    fn test_scan_requires_keyword_boundary() {
        let scan = scan_uniform_decls("float myuniform;\nuniforms float x;\nfloat a_uniform = 1.0;");

        assert!(scan.decls.is_empty());
        assert!(scan.unrecognized.is_empty());
    }

    #[test]
    fn test_scan_ignores_blocks() {
        let scan = scan_uniform_decls("uniform Block {\n  float a;\n};\n");

        assert!(scan.decls.is_empty());
        assert_eq!(scan.unrecognized.len(), 1);
        assert_eq!(scan.unrecognized[0].text, "uniform Block");
    }

    #[test]
    fn test_scan_array_suffix_extends_to_semicolon() {
        let scan = scan_uniform_decls("uniform float grid[2][3];\nuniform vec4 data[SIZE];");

        assert_eq!(scan.decls[0].array_suffix, "[2][3]");
        assert_eq!(scan.decls[1].array_suffix, "[SIZE]");
    }
}
