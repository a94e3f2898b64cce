use super::line_number;
use log::debug;
use pp_rs::{
    pp::Preprocessor,
    token::{Integer, Location, PreprocessorError, Punct, Token, TokenValue},
};
use shc_resource::ShaderStage;
use thiserror::Error;

/// Macros a legacy ES 100 compiler defines before the first line.
const LEGACY_DEFINES: [(&str, &str); 3] = [
    ("GL_ES", "1"),
    ("GL_FRAGMENT_PRECISION_HIGH", "1"),
    ("__VERSION__", "100"),
];

const FRAG_DATA: &str = "gl_FragData";
const FRAG_COLOR: &str = "gl_FragColor";

#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: failed to preprocess legacy source: {kind:?}")]
pub struct PreprocessError {
    pub line: usize,
    pub kind: PreprocessorError,
}

/// Legacy source with conditionals resolved, macros expanded and comments,
/// `#version`, `#extension` and `#pragma` directives removed.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub source: String,
    /// Lines of `gl_FragData` uses that could not be folded into the single
    /// color output.
    pub unmapped_frag_data: Vec<usize>,
}

/// Runs the legacy preprocessor over `source` and writes the surviving tokens
/// back out. Line breaks between tokens are kept, so line numbers of the
/// output match the input.
pub fn preprocess(source: &str, stage: ShaderStage) -> Result<Preprocessed, PreprocessError> {
    let error = |(kind, location): (PreprocessorError, Location)| PreprocessError {
        line: line_number(source, location.start as usize),
        kind,
    };

    let mut preprocessor = Preprocessor::new(source);

    for (name, value) in LEGACY_DEFINES {
        preprocessor.add_define(name, value).map_err(error)?;
    }

    let tokens = preprocessor.collect::<Result<Vec<_>, _>>().map_err(error)?;
    let mut writer = TokenWriter::new(source);
    let mut unmapped_frag_data = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let token = &tokens[index];

        match &token.value {
            TokenValue::Version(_) | TokenValue::Extension(_) | TokenValue::Pragma(_) => {
                debug!(
                    "dropped directive on line {}.",
                    line_number(source, token.location.start as usize)
                );
            }
            TokenValue::Ident(name) if name == FRAG_DATA && stage == ShaderStage::Fragment => {
                if let [_, _, close, ..] = &tokens[index + 1..] {
                    if indexes_first_element(&tokens[index + 1..]) {
                        writer.write(token, FRAG_COLOR);
                        writer.skip(close);
                        index += 4;
                        continue;
                    }
                }

                unmapped_frag_data.push(line_number(source, token.location.start as usize));
                writer.write(token, name);
            }
            value => writer.write(token, &render(value)),
        }

        index += 1;
    }

    Ok(Preprocessed {
        source: writer.finish(),
        unmapped_frag_data,
    })
}

/// `[0]` right after `gl_FragData`; the only element of the legacy output
/// array that has a target counterpart.
fn indexes_first_element(rest: &[Token]) -> bool {
    match rest {
        [open, index, close, ..] => {
            open.value == TokenValue::Punct(Punct::LeftBracket)
                && matches!(
                    index.value,
                    TokenValue::Integer(Integer { value: 0, .. })
                )
                && close.value == TokenValue::Punct(Punct::RightBracket)
        }
        _ => false,
    }
}

struct TokenWriter<'a> {
    source: &'a str,
    output: String,
    /// End of the furthest source token written so far.
    cursor: usize,
}

impl<'a> TokenWriter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            output: String::with_capacity(source.len()),
            cursor: 0,
        }
    }

    fn write(&mut self, token: &Token, text: &str) {
        let start = token.location.start as usize;

        if self.cursor <= start {
            self.separate(start);
            self.cursor = self.cursor.max(token.location.end as usize);
        } else if !self.output.is_empty() {
            // macro expansions carry the location of the macro body
            self.output.push(' ');
        }

        self.output.push_str(text);
    }

    fn skip(&mut self, token: &Token) {
        self.cursor = self.cursor.max(token.location.end as usize);
    }

    fn finish(mut self) -> String {
        self.separate(self.source.len());
        self.output
    }

    /// Reproduces the gap in front of `start`: whitespace as written,
    /// anything else (directives, comments, macro names) as its line breaks.
    fn separate(&mut self, start: usize) {
        let gap = self.source.get(self.cursor..start).unwrap_or_default();

        if gap.chars().all(char::is_whitespace) {
            self.output.push_str(gap);
            return;
        }

        match gap.matches('\n').count() {
            0 => self.output.push(' '),
            lines => self.output.extend(std::iter::repeat('\n').take(lines)),
        }
    }
}

fn render(value: &TokenValue) -> String {
    match value {
        TokenValue::Ident(name) => name.clone(),
        TokenValue::Integer(integer) if integer.signed => integer.value.to_string(),
        TokenValue::Integer(integer) => format!("{}u", integer.value),
        // `Debug` always keeps a fraction or an exponent, so the literal
        // stays a float
        TokenValue::Float(float) => format!("{:?}", float.value),
        TokenValue::Punct(punct) => punct_text(*punct).to_owned(),
        TokenValue::Version(_) | TokenValue::Extension(_) | TokenValue::Pragma(_) => String::new(),
    }
}

fn punct_text(punct: Punct) -> &'static str {
    match punct {
        Punct::AddAssign => "+=",
        Punct::SubAssign => "-=",
        Punct::MulAssign => "*=",
        Punct::DivAssign => "/=",
        Punct::ModAssign => "%=",
        Punct::LeftShiftAssign => "<<=",
        Punct::RightShiftAssign => ">>=",
        Punct::AndAssign => "&=",
        Punct::XorAssign => "^=",
        Punct::OrAssign => "|=",
        Punct::Increment => "++",
        Punct::Decrement => "--",
        Punct::LogicalAnd => "&&",
        Punct::LogicalOr => "||",
        Punct::LogicalXor => "^^",
        Punct::LessEqual => "<=",
        Punct::GreaterEqual => ">=",
        Punct::EqualEqual => "==",
        Punct::NotEqual => "!=",
        Punct::LeftShift => "<<",
        Punct::RightShift => ">>",
        Punct::LeftBrace => "{",
        Punct::RightBrace => "}",
        Punct::LeftParen => "(",
        Punct::RightParen => ")",
        Punct::LeftBracket => "[",
        Punct::RightBracket => "]",
        Punct::LeftAngle => "<",
        Punct::RightAngle => ">",
        Punct::Semicolon => ";",
        Punct::Comma => ",",
        Punct::Colon => ":",
        Punct::Dot => ".",
        Punct::Equal => "=",
        Punct::Bang => "!",
        Punct::Minus => "-",
        Punct::Tilde => "~",
        Punct::Plus => "+",
        Punct::Star => "*",
        Punct::Slash => "/",
        Punct::Percent => "%",
        Punct::Pipe => "|",
        Punct::Caret => "^",
        Punct::Ampersand => "&",
        Punct::Question => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        preprocess(source, ShaderStage::Fragment).unwrap().source
    }

    #[test]
    fn test_plain_source_is_unchanged() {
        let source = "attribute vec4 position;\nvoid main() {\n    gl_Position = position;\n}\n";

        assert_eq!(
            preprocess(source, ShaderStage::Vertex).unwrap().source,
            source
        );
    }

    #[test]
    fn test_conditionals_are_resolved() {
        let source = "#ifdef HQ\nuniform highp vec4 tint;\n#else\nuniform lowp vec4 tint;\n#endif\nvoid main() {}\n";
        let output = run(source);

        assert_eq!(output.matches("tint").count(), 1);
        assert!(output.contains("uniform lowp vec4 tint;"));
        assert!(!output.contains('#'));
        assert_eq!(output.lines().count(), source.lines().count());
    }

    #[test]
    fn test_legacy_defines() {
        let output = run("#ifdef GL_ES\nprecision mediump float;\n#endif\n#if __VERSION__ == 100\nuniform float a;\n#endif\n");

        assert!(output.contains("precision mediump float;"));
        assert!(output.contains("uniform float a;"));
    }

    #[test]
    fn test_macros_are_expanded() {
        let output = run("#define SIZE 4\nuniform vec4 data[SIZE];\n");

        assert!(output.contains("uniform vec4 data[ 4 ];"));
        assert!(!output.contains("SIZE"));
    }

    #[test]
    fn test_directives_and_comments_keep_lines() {
        let source = "#version 100\n#extension GL_OES_standard_derivatives : enable\n// uniform float hidden;\nuniform float shown; /* trailing */\n";
        let output = run(source);

        assert_eq!(output, "\n\n\nuniform float shown;\n");
    }

    #[test]
    fn test_literals_are_rewritten() {
        let output = run("float a = 1.0; float b = .5; int c = 0x10; uint d = 3u;\n");

        assert_eq!(output, "float a = 1.0; float b = 0.5; int c = 16; uint d = 3u;\n");
    }

    #[test]
    fn test_first_frag_data_element_becomes_frag_color() {
        let preprocessed =
            preprocess("void main() {\n    gl_FragData[0] = vec4(1.0);\n}\n", ShaderStage::Fragment)
                .unwrap();

        assert_eq!(
            preprocessed.source,
            "void main() {\n    gl_FragColor = vec4(1.0);\n}\n"
        );
        assert!(preprocessed.unmapped_frag_data.is_empty());
    }

    #[test]
    fn test_other_frag_data_uses_are_reported() {
        let preprocessed = preprocess(
            "void main() {\n    gl_FragData[1] = vec4(1.0);\n}\n",
            ShaderStage::Fragment,
        )
        .unwrap();

        assert_eq!(preprocessed.unmapped_frag_data, vec![2]);
        assert!(preprocessed.source.contains("gl_FragData[1]"));
    }

    #[test]
    fn test_errors_carry_line() {
        let err = preprocess("void main() {}\n#endif\n", ShaderStage::Vertex).unwrap_err();

        assert_eq!(err.line, 2);
        assert_eq!(err.kind, PreprocessorError::EndifOutsideOfBlock);
    }
}
