//! CommonJS to ES module rewrite
//!
//! The rewrite is purely syntactic. Every `require("literal")` call found in
//! the source becomes a hoisted namespace import, and the original body runs
//! unchanged inside the classic CommonJS function wrapper. Because the body is
//! copied verbatim, each original line maps to exactly one generated line.

use std::path::Path;

use logos::Logos;

use super::source_map::{SourceMap, SourceMapBuilder};

/// Tokens relevant to finding `require("...")` calls.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum CjsToken {
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[token("/*", skip_block_comment)]
    BlockComment,

    #[token("`", skip_template)]
    Template,

    #[regex(r#""([^"\\\n]|\\(.|\r?\n))*""#)]
    #[regex(r"'([^'\\\n]|\\(.|\r?\n))*'")]
    Str,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(".")]
    Dot,
}

fn skip_block_comment(lex: &mut logos::Lexer<CjsToken>) -> logos::Skip {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(remainder.len()),
    }
    logos::Skip
}

fn skip_template(lex: &mut logos::Lexer<CjsToken>) -> logos::Skip {
    let remainder = lex.remainder();
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '`' => {
                lex.bump(i + 1);
                return logos::Skip;
            }
            _ => {}
        }
    }
    lex.bump(remainder.len());
    logos::Skip
}

/// Result of rewriting one CommonJS source.
#[derive(Debug, Clone)]
pub struct CommonJsModule {
    /// Generated ES module source
    pub code: String,
    /// Map from `code` back to the original text
    pub source_map: SourceMap,
    /// Literal `require` specifiers, in order of first appearance
    pub requires: Vec<String>,
}

/// Collect literal `require("...")` specifiers, deduplicated, in source order.
pub fn find_requires(source: &str) -> Vec<String> {
    // Unrecognised input (operators, numbers, regex bodies) stays in the
    // stream as `None` so it separates the tokens around it
    let mut lexer = CjsToken::lexer(source);
    let mut tokens: Vec<(Option<CjsToken>, &str)> = Vec::new();
    while let Some(token) = lexer.next() {
        tokens.push((token.ok(), lexer.slice()));
    }

    let mut requires: Vec<String> = Vec::new();
    for (i, window) in tokens.windows(4).enumerate() {
        let is_call = matches!(
            window,
            [
                (Some(CjsToken::Ident), "require"),
                (Some(CjsToken::LParen), _),
                (Some(CjsToken::Str), _),
                (Some(CjsToken::RParen), _),
            ]
        );
        // `foo.require("x")` is a method call, not a module load
        let is_member = i > 0 && tokens[i - 1].0 == Some(CjsToken::Dot);
        if is_call && !is_member {
            let specifier = unquote(window[2].1);
            if !requires.contains(&specifier) {
                requires.push(specifier);
            }
        }
    }
    requires
}

/// Rewrite CommonJS `source` located at `path` into an ES module.
pub fn transform(source: &str, path: &Path) -> CommonJsModule {
    let requires = find_requires(source);
    let filename = path.to_string_lossy();
    let dirname = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string());

    // Prelude: everything on generated line 0
    let mut code = String::new();
    let mut deps = Vec::with_capacity(requires.len());
    for (i, specifier) in requires.iter().enumerate() {
        let literal = js_string(specifier);
        code.push_str(&format!("import * as __cjs_dep{} from {}; ", i, literal));
        deps.push(format!("{}: __cjs_dep{}", literal, i));
    }
    code.push_str("const __cjs_module = { exports: {} }; ");
    code.push_str(&format!("const __cjs_deps = {{ {} }}; ", deps.join(", ")));
    code.push_str(concat!(
        "const __cjs_require = (id) => { ",
        "if (!Object.prototype.hasOwnProperty.call(__cjs_deps, id)) { ",
        "const error = new Error(`Cannot find module '${id}'`); ",
        "error.code = \"MODULE_NOT_FOUND\"; throw error; } ",
        "const ns = __cjs_deps[id]; return \"default\" in ns ? ns.default : ns; }; ",
        "(function (exports, require, module, __filename, __dirname) {\n",
    ));

    // Body: original text, verbatim apart from a neutralised hashbang
    let body = match source.strip_prefix("#!") {
        Some(rest) => format!("//{}", rest),
        None => source.to_string(),
    };
    let mut line_count = body.split('\n').count();
    if body.ends_with('\n') {
        line_count -= 1;
    }
    code.push_str(&body);
    if !body.ends_with('\n') {
        code.push('\n');
    }

    code.push_str(&format!(
        "}}).call(__cjs_module.exports, __cjs_module.exports, __cjs_require, __cjs_module, {}, {});\n",
        js_string(&filename),
        js_string(&dirname),
    ));
    code.push_str("export default __cjs_module.exports;\n");

    let mut builder = SourceMapBuilder::new(filename.into_owned()).source_content(source);
    for line in 0..line_count {
        let line = line as u32;
        builder.add(line + 1, 0, line, 0);
    }

    CommonJsModule {
        code,
        source_map: builder.build(),
        requires,
    }
}

/// JSON string literals are valid JavaScript string literals.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Decode a quoted JavaScript string literal.
fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            // Line continuation
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') => {}
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
