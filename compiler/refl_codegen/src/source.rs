//! Source file layout: preamble, module registration and the optional
//! split into a primary and a class-definition source.

use refl_ir::Introspect;

use crate::context::{mangle, quote, CodegenContext};

/// Include lines every dictionary source needs.
const RUNTIME_INCLUDES: &[&str] = &[
    "<new>",
    "<string>",
    "<typeinfo>",
    "<vector>",
    "\"refl/Buffer.h\"",
    "\"refl/ClassInfo.h\"",
    "\"refl/CollectionProxy.h\"",
];

/// Emit the banner and the include lines.
pub fn emit_preamble<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    headers: &[String],
    extra_includes: &[String],
) {
    ctx.writeln("// Do NOT change. Changes will be lost next time file is generated");
    ctx.newline();
    for include in RUNTIME_INCLUDES {
        ctx.writeln(&format!("#include {include}"));
    }
    ctx.newline();
    if !headers.is_empty() {
        ctx.writeln("// Header files passed as explicit arguments");
        for header in headers {
            ctx.writeln(&format!("#include {}", quote(header)));
        }
        ctx.newline();
    }
    if !extra_includes.is_empty() {
        ctx.writeln("// Header files passed via #pragma extra_include");
        for header in extra_includes {
            ctx.writeln(&format!("#include {}", quote(header)));
        }
        ctx.newline();
    }
}

/// Everything the module registration embeds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModulePayload {
    /// Module name, the stem of the dictionary source.
    pub module_name: String,
    pub headers: Vec<String>,
    pub include_paths: Vec<String>,
    /// Forward declarations of every autoload key.
    pub fwd_decls: String,
    /// Inline header payload, used when headers are not shipped.
    pub payload: String,
    /// Header map lines, already terminated by the null marker.
    pub header_map: String,
}

/// Raw-string delimiters must not appear in the embedded text.
fn raw_string(delimiter: &str, text: &str) -> String {
    format!("R\"{delimiter}(\n{text}){delimiter}\"")
}

/// Emit the function that registers the module with the runtime, and the
/// static object that calls it at load time.
pub fn emit_module_registration<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    module: &ModulePayload,
) {
    let trigger = format!(
        "TriggerDictionaryInitialization_{}",
        mangle(&module.module_name)
    );
    ctx.open("namespace");
    ctx.open(&format!("void {trigger}_Impl()"));

    ctx.writeln("static const char* headers[] = {");
    for header in &module.headers {
        ctx.writeln(&format!("{},", quote(header)));
    }
    ctx.writeln("nullptr");
    ctx.writeln("};");

    ctx.writeln("static const char* includePaths[] = {");
    for path in &module.include_paths {
        ctx.writeln(&format!("{},", quote(path)));
    }
    ctx.writeln("nullptr");
    ctx.writeln("};");

    ctx.writeln(&format!(
        "static const char* fwdDeclCode = {};",
        raw_string("DICTFWDDCLS", &module.fwd_decls)
    ));
    ctx.writeln(&format!(
        "static const char* payloadCode = {};",
        raw_string("DICTPAYLOAD", &module.payload)
    ));
    ctx.writeln("static const char* classesHeaders[] = {");
    ctx.write(&module.header_map);
    ctx.writeln("};");

    ctx.writeln("static bool isInitialized = false;");
    ctx.open("if (!isInitialized)");
    ctx.writeln(&format!(
        "refl::RegisterModule({}, headers, includePaths, payloadCode, fwdDeclCode, {trigger}_Impl, classesHeaders);",
        quote(&module.module_name)
    ));
    ctx.writeln("isInitialized = true;");
    ctx.close("");
    ctx.close("");
    ctx.open("static struct DictInit");
    ctx.open("DictInit()");
    ctx.writeln(&format!("{trigger}_Impl();"));
    ctx.close("");
    ctx.close(" refl_dict_initializer;");
    ctx.close("");
    ctx.open(&format!("void {trigger}()"));
    ctx.writeln(&format!("{trigger}_Impl();"));
    ctx.close("");
}

/// Final text of the generated sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sources {
    pub primary: String,
    /// Class-specific code, when splitting was requested.
    pub classdef: Option<String>,
}

/// Put the generated pieces together.
///
/// Without `split` everything lands in the primary source. With it the
/// class code moves to the class-definition source, which repeats the
/// preamble so that it compiles on its own.
pub fn assemble(preamble: &str, class_code: &str, registration: &str, split: bool) -> Sources {
    if split {
        Sources {
            primary: format!("{preamble}{registration}"),
            classdef: Some(format!("{preamble}{class_code}")),
        }
    } else {
        Sources {
            primary: format!("{preamble}{class_code}{registration}"),
            classdef: None,
        }
    }
}
