//! Registration boilerplate.
//!
//! Every generated class (selected or closure-discovered) gets a
//! `GenerateInitInstanceLocal` function that builds its runtime class info
//! once, plus the allocation wrappers the runtime calls through. Versioned
//! classes also get their class accessor functions, and selected namespaces
//! get an init function of their own.

use refl_ir::{split_scopes, Introspect, StlKind};
use refl_select::{ReadRule, SelectedEntity};

use crate::closure::ClosureEntry;
use crate::context::{mangle, quote, CodegenContext};
use crate::plan::{cxx_name, ClassPlan};
use crate::scope::{close_namespaces, nesting, open_namespaces};

/// What the runtime needs to know to register one class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration<'r> {
    /// Name the class is registered under.
    pub name: String,
    /// Type spelling valid in any scope.
    pub spelled: String,
    pub mangled: String,
    pub version: i32,
    pub header: String,
    pub line: u32,
    /// A `streamer_` wrapper is installed.
    pub has_streamer: bool,
    pub is_abstract: bool,
    pub transient: Vec<String>,
    pub read_rules: Vec<&'r ReadRule>,
    pub collection: Option<StlKind>,
}

impl<'r> Registration<'r> {
    pub fn for_class<P: Introspect + ?Sized>(
        port: &P,
        plan: &ClassPlan,
        entity: &SelectedEntity,
        read_rules: &'r [ReadRule],
        has_streamer: bool,
    ) -> Self {
        let decl = port.decl(plan.decl);
        let is_abstract = decl.as_class().is_some_and(|class| class.is_abstract);
        Registration {
            name: entity.normalized_name.clone(),
            spelled: format!("::{}", decl.qualified_name),
            mangled: mangle(&entity.normalized_name),
            version: plan.version.unwrap_or(0),
            header: decl.location.file.clone(),
            line: decl.location.line,
            has_streamer,
            is_abstract,
            transient: plan
                .members
                .iter()
                .filter(|member| member.transient)
                .map(|member| member.name.clone())
                .collect(),
            read_rules: read_rules
                .iter()
                .filter(|rule| port.normalized_name(&rule.target_class) == entity.normalized_name)
                .collect(),
            collection: None,
        }
    }

    /// Containers are declared by their standard header unless the
    /// universe has a declaration with a known location.
    pub fn for_container<P: Introspect + ?Sized>(port: &P, entry: &ClosureEntry) -> Self {
        let location = entry
            .decl
            .map(|id| port.decl(id).location.clone())
            .filter(|location| location.is_known());
        let (header, line) = match location {
            Some(location) => (location.file, location.line),
            None => (entry.kind.template_name().to_string(), 0),
        };
        Registration {
            name: entry.normalized_name.clone(),
            spelled: cxx_name(&entry.normalized_name),
            mangled: mangle(&entry.normalized_name),
            version: 0,
            header,
            line,
            has_streamer: true,
            is_abstract: false,
            transient: Vec::new(),
            read_rules: Vec::new(),
            collection: Some(entry.kind),
        }
    }
}

/// Emit the class info initializer of one class.
pub fn emit_class_init<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    registration: &Registration<'_>,
) {
    let ty = &registration.spelled;
    let m = &registration.mangled;
    ctx.open("namespace refl_dict");
    if !registration.is_abstract {
        ctx.writeln(&format!("static void *new_{m}(void *p = nullptr);"));
        ctx.writeln(&format!(
            "static void *newArray_{m}(refl::Long_t size, void *p);"
        ));
    }
    ctx.writeln(&format!("static void delete_{m}(void *p);"));
    ctx.writeln(&format!("static void deleteArray_{m}(void *p);"));
    ctx.writeln(&format!("static void destruct_{m}(void *p);"));
    if registration.has_streamer {
        ctx.writeln(&format!(
            "static void streamer_{m}(refl::Buffer &refl_b, void *refl_obj);"
        ));
    }
    ctx.newline();
    ctx.writeln("// Function generating the singleton type initializer");
    ctx.writeln(&format!(
        "static refl::ClassInfo *GenerateInitInstanceLocal(const {ty}*)"
    ));
    ctx.open("");
    ctx.writeln(&format!(
        "static refl::ClassInfo instance({}, {}, {}, {},",
        quote(&registration.name),
        registration.version,
        quote(&registration.header),
        registration.line
    ));
    ctx.writeln(&format!(
        "                                typeid({ty}), sizeof({ty}));"
    ));
    if !registration.is_abstract {
        ctx.writeln(&format!("instance.SetNew(&new_{m});"));
        ctx.writeln(&format!("instance.SetNewArray(&newArray_{m});"));
    }
    ctx.writeln(&format!("instance.SetDelete(&delete_{m});"));
    ctx.writeln(&format!("instance.SetDeleteArray(&deleteArray_{m});"));
    ctx.writeln(&format!("instance.SetDestructor(&destruct_{m});"));
    if registration.has_streamer {
        ctx.writeln(&format!("instance.SetStreamerFunc(&streamer_{m});"));
    }
    if let Some(kind) = registration.collection {
        ctx.writeln(&format!(
            "instance.AdoptCollectionProxy(refl::GenerateProxy< {ty} >(refl::CollectionKind::{}));",
            kind.collection_tag()
        ));
    }
    if !registration.transient.is_empty() {
        let names: Vec<String> = registration.transient.iter().map(|n| quote(n)).collect();
        ctx.writeln(&format!(
            "instance.SetTransientMembers({{{}}});",
            names.join(", ")
        ));
    }
    emit_read_rules(ctx, &registration.read_rules);
    ctx.writeln("return &instance;");
    ctx.close("");
    ctx.writeln(&format!(
        "refl::ClassInfo *GenerateInitInstance(const {ty}*)"
    ));
    ctx.open("");
    ctx.writeln(&format!(
        "return GenerateInitInstanceLocal(static_cast<const {ty}*>(nullptr));"
    ));
    ctx.close("");
    ctx.writeln("// Static variable to force the class initialization");
    ctx.writeln(&format!(
        "static refl::ClassInfo *refl_init_{m} = GenerateInitInstanceLocal(static_cast<const {ty}*>(nullptr));"
    ));
    ctx.close(" // namespace refl_dict");
    ctx.newline();
}

fn emit_read_rules<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, rules: &[&ReadRule]) {
    if rules.is_empty() {
        return;
    }
    ctx.newline();
    ctx.writeln("// Schema evolution read rules");
    ctx.writeln(&format!(
        "std::vector<refl::SchemaRule> readrules({});",
        rules.len()
    ));
    for (index, rule) in rules.iter().enumerate() {
        ctx.open("");
        ctx.writeln(&format!("refl::SchemaRule &rule = readrules[{index}];"));
        ctx.writeln(&format!("rule.fSourceClass = {};", quote(&rule.source_class)));
        ctx.writeln(&format!("rule.fTargetClass = {};", quote(&rule.target_class)));
        for (key, value) in &rule.fields {
            ctx.writeln(&format!("rule.f{} = {};", capitalize(key), quote(value)));
        }
        if !rule.code.is_empty() {
            ctx.writeln(&format!("rule.fCode = {};", quote(&rule.code)));
        }
        ctx.close("");
    }
    ctx.writeln("instance.SetReadRules(readrules);");
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Emit the allocation and streamer wrappers the class info points at.
///
/// Containers bring their own collection streamer, so only classes get a
/// wrapper around their `Streamer` member function.
pub fn emit_wrappers<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    registration: &Registration<'_>,
) {
    let ty = &registration.spelled;
    let m = &registration.mangled;
    ctx.open("namespace refl_dict");
    if !registration.is_abstract {
        ctx.writeln("// Wrappers around operator new");
        ctx.open(&format!("static void *new_{m}(void *p)"));
        ctx.writeln(&format!("return p ? new(p) {ty} : new {ty};"));
        ctx.close("");
        ctx.open(&format!(
            "static void *newArray_{m}(refl::Long_t nElements, void *p)"
        ));
        ctx.writeln(&format!(
            "return p ? new(p) {ty}[nElements] : new {ty}[nElements];"
        ));
        ctx.close("");
    }
    ctx.writeln("// Wrapper around operator delete");
    ctx.open(&format!("static void delete_{m}(void *p)"));
    ctx.writeln(&format!("delete (static_cast<{ty}*>(p));"));
    ctx.close("");
    ctx.open(&format!("static void deleteArray_{m}(void *p)"));
    ctx.writeln(&format!("delete [] (static_cast<{ty}*>(p));"));
    ctx.close("");
    ctx.open(&format!("static void destruct_{m}(void *p)"));
    ctx.writeln(&format!("typedef {ty} current_t;"));
    ctx.writeln("(static_cast<current_t*>(p))->~current_t();");
    ctx.close("");
    if registration.has_streamer && registration.collection.is_none() {
        ctx.writeln("// Wrapper around a custom streamer member function.");
        ctx.open(&format!(
            "static void streamer_{m}(refl::Buffer &refl_b, void *refl_obj)"
        ));
        ctx.writeln(&format!("(({ty}*)refl_obj)->{ty}::Streamer(refl_b);"));
        ctx.close("");
    }
    ctx.close(" // namespace refl_dict");
    ctx.newline();
}

/// Emit `Class_Name`, `ImplFileName`, `ImplFileLine`, `Dictionary` and
/// `Class` for a versioned class.
pub fn emit_class_functions<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ClassPlan,
) {
    let nesting = nesting(ctx.port, plan.decl);
    let prefix = nesting.template_prefix;
    let local = &nesting.local;
    let init = format!(
        "::refl_dict::GenerateInitInstanceLocal(static_cast<const {}*>(nullptr))",
        nesting.global()
    );
    open_namespaces(ctx, &nesting);

    ctx.separator();
    ctx.writeln(&format!("{prefix}const char *{local}::Class_Name()"));
    ctx.open("");
    ctx.writeln(&format!("return {};", quote(&nesting.qualified)));
    ctx.close("");
    ctx.newline();

    ctx.separator();
    ctx.writeln(&format!("{prefix}const char *{local}::ImplFileName()"));
    ctx.open("");
    ctx.writeln(&format!("return {init}->GetImplFileName();"));
    ctx.close("");
    ctx.newline();

    ctx.separator();
    ctx.writeln(&format!("{prefix}int {local}::ImplFileLine()"));
    ctx.open("");
    ctx.writeln(&format!("return {init}->GetImplFileLine();"));
    ctx.close("");
    ctx.newline();

    ctx.separator();
    ctx.writeln(&format!("{prefix}refl::Class *{local}::Dictionary()"));
    ctx.open("");
    ctx.writeln(&format!("fgIsA = {init}->GetClass();"));
    ctx.writeln("return fgIsA;");
    ctx.close("");
    ctx.newline();

    ctx.separator();
    ctx.writeln(&format!("{prefix}refl::Class *{local}::Class()"));
    ctx.open("");
    ctx.writeln(&format!("if (!fgIsA) {{ fgIsA = {init}->GetClass(); }}"));
    ctx.writeln("return fgIsA;");
    ctx.close("");
    ctx.newline();

    close_namespaces(ctx, &nesting);
}

/// Emit the init function of a selected namespace.
pub fn emit_namespace_init<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    entity: &SelectedEntity,
) {
    let decl = ctx.port.decl(entity.decl);
    let qualified = decl.qualified_name.clone();
    let location = decl.location.clone();
    let segments: Vec<String> = split_scopes(&qualified)
        .into_iter()
        .map(str::to_string)
        .collect();
    let dictionary = format!("{}_Dictionary", mangle(&qualified));

    for segment in &segments {
        ctx.open(&format!("namespace {segment}"));
    }
    ctx.open("namespace refl_dict");
    ctx.writeln("inline refl::ClassInfo *GenerateInitInstance();");
    ctx.writeln(&format!("static refl::Class *{dictionary}();"));
    ctx.newline();
    ctx.writeln("// Function generating the singleton type initializer");
    ctx.writeln("inline refl::ClassInfo *GenerateInitInstance()");
    ctx.open("");
    ctx.writeln(&format!(
        "static refl::ClassInfo instance({}, 0 /*version*/, {}, {},",
        quote(&qualified),
        quote(&location.file),
        location.line
    ));
    ctx.writeln(&format!("                                &{dictionary});"));
    ctx.writeln("return &instance;");
    ctx.close("");
    ctx.writeln("// Static variable to force the class initialization");
    ctx.writeln(&format!(
        "static refl::ClassInfo *refl_init_{} = GenerateInitInstance();",
        mangle(&qualified)
    ));
    ctx.newline();
    ctx.writeln("// Dictionary for non-versioned classes");
    ctx.open(&format!("static refl::Class *{dictionary}()"));
    ctx.writeln("return GenerateInitInstance()->GetClass();");
    ctx.close("");
    ctx.close(" // namespace refl_dict");
    for segment in segments.iter().rev() {
        ctx.close(&format!(" // namespace {segment}"));
    }
    ctx.newline();
}
