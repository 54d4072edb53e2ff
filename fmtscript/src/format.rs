//! Compiled format strings and the top-level format calls.

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::render::{PlainRenderer, Render};
use crate::script::compile::{Compiler, Field, Node};
use crate::script::interp::ExecContext;
use crate::script::split::{split, BlockKind};
use crate::value::ArgStore;

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Field(Field),
    Script(Node),
}

/// A format string split and compiled once, renderable any number of times
/// against different arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pieces: Vec<Piece>,
}

impl Format {
    /// Compile with the default [`Config`].
    pub fn compile(src: &str) -> Result<Self> {
        Self::compile_with(src, &Config::default())
    }

    pub fn compile_with(src: &str, config: &Config) -> Result<Self> {
        let blocks = split(src)?;
        let mut compiler = Compiler::new(config);
        let mut pieces = Vec::with_capacity(blocks.len());
        for block in &blocks {
            pieces.push(match block.kind {
                BlockKind::Text => Piece::Text(block.text.to_string()),
                BlockKind::Field => Piece::Field(compiler.compile_field(&block.text, block.offset)?),
                BlockKind::Script => {
                    Piece::Script(compiler.compile_script(&block.text, block.offset, false)?)
                }
            });
        }
        debug!(blocks = pieces.len(), len = src.len(), "compiled format string");
        Ok(Format { pieces })
    }

    /// Render into a fresh string with the [`PlainRenderer`].
    pub fn render(&self, args: &ArgStore<'_>) -> Result<String> {
        let mut out = String::new();
        self.render_to(&mut out, args)?;
        Ok(out)
    }

    /// Append to `out`.  On error, text rendered before the failing block
    /// stays in `out`.
    pub fn render_to(&self, out: &mut String, args: &ArgStore<'_>) -> Result<()> {
        self.render_with(out, args, &PlainRenderer)
    }

    pub fn render_with(
        &self,
        out: &mut String,
        args: &ArgStore<'_>,
        renderer: &dyn Render,
    ) -> Result<()> {
        let ctx = ExecContext::new(args, renderer);
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Field(field) => ctx.render_field(field, out)?,
                Piece::Script(node) => out.push_str(&ctx.eval(node)?.to_string()),
            }
        }
        Ok(())
    }
}

/// Compile and render `fmt` in one go.
pub fn format(fmt: &str, args: &ArgStore<'_>) -> Result<String> {
    format_with(fmt, args, &Config::default())
}

pub fn format_with(fmt: &str, args: &ArgStore<'_>, config: &Config) -> Result<String> {
    Format::compile_with(fmt, config)?.render(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn text_and_fields() {
        let name = "Ann";
        let args = ArgStore::new().arg(name).arg(&3);
        assert_eq!(format("{0} has {1} cats", &args).unwrap(), "Ann has 3 cats");
        assert_eq!(format("{{{0}}}", &args).unwrap(), "{Ann}");
    }

    #[test]
    fn automatic_numbering() {
        let args = ArgStore::new().arg("a").arg("b");
        assert_eq!(format("{}-{}", &args).unwrap(), "a-b");
        let err = format("{}-{0}", &args).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFieldName);

        let lenient = Config {
            strict_auto_index: false,
            ..Config::default()
        };
        assert_eq!(format_with("{1}{}", &args, &lenient).unwrap(), "ba");
    }

    #[test]
    fn compiled_format_is_reusable() {
        let f = Format::compile("[$0 == 1 ? 'one' : 'many']").unwrap();
        assert_eq!(f.render(&ArgStore::new().arg(&1)).unwrap(), "one");
        assert_eq!(f.render(&ArgStore::new().arg(&5)).unwrap(), "many");
        // Arguments are resolved per call, not at compile time.
        assert_eq!(
            f.render(&ArgStore::new()).unwrap_err().code,
            ErrorCode::InvalidIndex
        );
    }

    #[test]
    fn partial_output_is_kept() {
        let f = Format::compile("ok {0} then {1}").unwrap();
        let mut out = String::new();
        let err = f.render_to(&mut out, &ArgStore::new().arg(&1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIndex);
        assert_eq!(err.offset, Some(13));
        assert_eq!(out, "ok 1 then ");
    }

    #[test]
    fn script_values_splice() {
        let args = ArgStore::new().arg(&2.0);
        assert_eq!(format("[$0]|[$0 > 1]|[7]", &args).unwrap(), "2.0|true|7");
    }

    #[test]
    fn compile_errors_carry_offsets() {
        let err = Format::compile("ab {0.} cd").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAttribute);
        assert_eq!(err.offset, Some(6));
        let err = Format::compile("x[$0 ==]").unwrap_err();
        assert_eq!(err.code, ErrorCode::EndOfString);
        assert_eq!(err.offset, Some(7));
    }
}
