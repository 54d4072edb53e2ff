use proptest::prelude::*;
use fmtscript::script::lexer::tokenize;
use fmtscript::script::split::{split, BlockKind};
use fmtscript::{format, ArgStore, Format};

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '{' | '}' | '[' | ']') {
            out.push(c);
        }
        out.push(c);
    }
    out
}

proptest! {
    /// Splitting and compiling arbitrary input returns Ok or Err, never panics.
    #[test]
    fn compile_does_not_panic(s in "\\PC*") {
        let _ = split(&s);
        let _ = Format::compile(&s);
    }

    /// Inputs built from the language's own alphabet reach deeper paths.
    #[test]
    fn script_soup_does_not_panic(s in "[\\[\\]{}$@0-9a-z.:'\" ?!=<>&|()-]{0,40}") {
        if let Ok(f) = Format::compile(&s) {
            let n = 1;
            let word = "word";
            let args = ArgStore::new().arg(&n).arg(word).named_arg("x", &n);
            let _ = f.render(&args);
        }
    }
}

proptest! {
    /// Escaping every delimiter and splitting gives back the original text.
    #[test]
    fn escape_round_trip(s in "\\PC*") {
        let escaped = escape(&s);
        let blocks = split(&escaped).unwrap();
        if s.is_empty() {
            prop_assert!(blocks.is_empty());
        } else {
            prop_assert_eq!(blocks.len(), 1);
            prop_assert_eq!(blocks[0].kind, BlockKind::Text);
            prop_assert_eq!(blocks[0].text.as_ref(), s.as_str());
        }
        prop_assert_eq!(format(&escaped, &ArgStore::new()).unwrap(), s);
    }
}

proptest! {
    /// Lexeme offsets are strictly increasing and inside the source.
    #[test]
    fn lexeme_offsets_ordered(s in "\\PC{0,40}", base in 0usize..1000) {
        if let Ok(lexemes) = tokenize(&s, base) {
            let mut last = None;
            for l in &lexemes {
                prop_assert!(l.offset >= base && l.offset < base + s.len());
                if let Some(prev) = last {
                    prop_assert!(l.offset > prev);
                }
                last = Some(l.offset);
            }
        }
    }
}

proptest! {
    /// Integer literals survive the lexer and come back out unchanged.
    #[test]
    fn integer_literal_round_trip(n in -1_000_000_000_000i64..1_000_000_000_000i64) {
        let out = format(&format!("[{n}]"), &ArgStore::new()).unwrap();
        prop_assert_eq!(out, n.to_string());
    }

    /// Script comparisons agree with Rust's ordering.
    #[test]
    fn comparison_matches_ordering(a in any::<i64>(), b in any::<i64>()) {
        let args = ArgStore::new().arg(&a).arg(&b);
        let out = format("[$0 < $1]|[$0 == $1]|[$0 >= $1]", &args).unwrap();
        prop_assert_eq!(out, format!("{}|{}|{}", a < b, a == b, a >= b));
    }

    /// String indexing never fails, whatever the position.
    #[test]
    fn string_index_is_lenient(s in "\\PC{0,12}", i in -20i64..20) {
        let args = ArgStore::new().arg(s.as_str());
        let out = format(&format!("{{0[{i}]}}"), &args).unwrap();
        prop_assert!(out.chars().count() <= 1);
    }
}
