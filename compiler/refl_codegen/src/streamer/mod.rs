//! Streamer generation.
//!
//! Every versioned class gets a `Streamer(refl::Buffer &)` member function
//! with a read branch and a write branch. The member-wise form wraps the
//! data members in a version envelope:
//!
//! ```text
//! read:  version + byte count, bases, members, byte-count check
//! write: version placeholder, bases, members, byte count patched in
//! ```
//!
//! Each persistent member is transferred according to its plan category;
//! transient members appear in neither branch. Containers and strings have
//! their own sub-generators.

mod container;
mod string;

use refl_ir::names::resolve_typedefs;
use refl_ir::{Fundamental, Introspect, TypeRef};
use refl_select::EntityFlags;

pub use container::emit_collection_streamer;

use crate::context::{quote, CodegenContext};
use crate::plan::{
    cxx_name, cxx_type, ArrayElement, ClassPlan, MemberShape, MemberStreamPlan, ObjectStreamer,
};
use crate::scope::{close_namespaces, nesting, open_namespaces, Nesting};

/// Which `Streamer` a class gets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamerKind {
    /// Member-wise transfer inside a version envelope.
    MemberWise,
    /// Schema-driven transfer through the runtime class description.
    Auto,
    /// Version `<= 0`: forwards to the bases, or fails at run time.
    Degenerate,
}

impl StreamerKind {
    /// `None` when no streamer is generated at all: metadata-only and
    /// `noStreamer` entities, containers, and classes without a version.
    pub fn of(plan: &ClassPlan, flags: EntityFlags) -> Option<StreamerKind> {
        if flags.intersects(
            EntityFlags::METADATA_ONLY | EntityFlags::NO_STREAMER | EntityFlags::GENERIC_CONTAINER,
        ) {
            return None;
        }
        let version = plan.version?;
        if version <= 0 {
            Some(StreamerKind::Degenerate)
        } else if flags.contains(EntityFlags::STREAMER_INFO) {
            Some(StreamerKind::Auto)
        } else {
            Some(StreamerKind::MemberWise)
        }
    }
}

/// Emit the `Streamer` member function of a class.
#[tracing::instrument(level = "trace", skip_all, fields(class = %plan.class))]
pub fn emit_streamer<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ClassPlan,
    kind: StreamerKind,
) {
    let nesting = nesting(ctx.port, plan.decl);
    open_namespaces(ctx, &nesting);
    ctx.separator();
    ctx.writeln(&format!(
        "{}void {}::Streamer(refl::Buffer &refl_b)",
        nesting.template_prefix, nesting.local
    ));
    ctx.open("");
    ctx.writeln(&format!("// Stream an object of class {}.", nesting.qualified));
    ctx.newline();
    match kind {
        StreamerKind::MemberWise => emit_member_wise(ctx, plan, &nesting),
        StreamerKind::Auto => emit_auto(ctx, &nesting),
        StreamerKind::Degenerate => emit_degenerate(ctx, plan, &nesting),
    }
    ctx.close("");
    ctx.newline();
    close_namespaces(ctx, &nesting);
}

fn emit_member_wise<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ClassPlan,
    nesting: &Nesting,
) {
    let class = nesting.global();
    ctx.writeln("refl::UInt_t refl_s, refl_c;");
    ctx.open("if (refl_b.IsReading())");
    ctx.writeln(
        "refl::Version_t refl_v = refl_b.ReadVersion(&refl_s, &refl_c); if (refl_v) { }",
    );
    emit_bases(ctx, plan);
    for member in plan.persistent() {
        emit_member(ctx, member, true);
    }
    ctx.writeln(&format!(
        "refl_b.CheckByteCount(refl_s, refl_c, {class}::IsA());"
    ));
    ctx.reopen("else");
    ctx.writeln(&format!("refl_c = refl_b.WriteVersion({class}::IsA(), true);"));
    emit_bases(ctx, plan);
    for member in plan.persistent() {
        emit_member(ctx, member, false);
    }
    ctx.writeln("refl_b.SetByteCount(refl_c, true);");
    ctx.close("");
}

fn emit_auto<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, nesting: &Nesting) {
    let class = nesting.global();
    ctx.open("if (refl_b.IsReading())");
    ctx.writeln(&format!("refl_b.ReadClassBuffer({class}::Class(), this);"));
    ctx.reopen("else");
    ctx.writeln(&format!("refl_b.WriteClassBuffer({class}::Class(), this);"));
    ctx.close("");
}

fn emit_degenerate<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ClassPlan,
    nesting: &Nesting,
) {
    if !plan.bases.is_empty() {
        emit_bases(ctx, plan);
        return;
    }
    // Derived classes that do read still find a consistent buffer.
    ctx.writeln(&format!(
        "refl::Error({}, \"version id <=0 in class definition, dummy Streamer() called\"); \
         if (refl_b.IsReading()) {{ }}",
        quote(&format!("{}::Streamer", nesting.qualified))
    ));
}

fn emit_bases<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, plan: &ClassPlan) {
    for base in &plan.bases {
        ctx.writeln(&format!("::{}::Streamer(refl_b);", cxx_name(base)));
    }
}

/// Open a flattened loop over a fixed array and return the element
/// expression. Scalars need no loop.
pub(crate) fn open_element_loop<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    name: &str,
    dims: &[u64],
    index: &str,
) -> String {
    if dims.is_empty() {
        return name.to_string();
    }
    let count: u64 = dims.iter().product();
    ctx.open(&format!(
        "for (int {index} = 0; {index} < {count}; {index}++)"
    ));
    format!("{name}{}[{index}]", "[0]".repeat(dims.len() - 1))
}

pub(crate) fn close_element_loop<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    dims: &[u64],
) {
    if !dims.is_empty() {
        ctx.close("");
    }
}

fn emit_member<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    member: &MemberStreamPlan,
    reading: bool,
) {
    let name = member.name.as_str();
    match &member.shape {
        MemberShape::Fundamental(fundamental) => {
            emit_fundamental(ctx, name, *fundamental, reading);
        }
        MemberShape::Enumeral => emit_enumeral(ctx, name, reading),
        MemberShape::FixedArray { element, dims } => {
            emit_fixed_array(ctx, name, *element, dims, reading);
        }
        MemberShape::FundamentalPointer { element, length } => {
            emit_fast_array(ctx, member, *element, length, reading);
        }
        MemberShape::String(form) => string::emit_member(ctx, name, form, reading),
        MemberShape::Container { plan, holder } => {
            container::emit_member(ctx, name, plan, holder, reading);
        }
        MemberShape::Object {
            class,
            streamer,
            dims,
        } => {
            let element = open_element_loop(ctx, name, dims, "refl_i");
            match streamer {
                ObjectStreamer::Own => ctx.writeln(&format!("{element}.Streamer(refl_b);")),
                ObjectStreamer::Generic => ctx.writeln(&format!(
                    "refl_b.StreamObject(&({element}), typeid({}));",
                    cxx_name(class)
                )),
            }
            close_element_loop(ctx, dims);
        }
        MemberShape::ObjectPointer { dims, .. } => {
            let element = open_element_loop(ctx, name, dims, "refl_i");
            let op = if reading { ">>" } else { "<<" };
            ctx.writeln(&format!("refl_b {op} {element};"));
            close_element_loop(ctx, dims);
        }
    }
}

fn emit_fundamental<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    target: &str,
    fundamental: Fundamental,
    reading: bool,
) {
    match (fundamental.is_narrowed(), reading) {
        (true, true) => ctx.writeln(&format!(
            "{{ float refl_dummy; refl_b >> refl_dummy; {target} = {}(refl_dummy); }}",
            fundamental.spelling()
        )),
        (true, false) => ctx.writeln(&format!("refl_b << float({target});")),
        (false, true) => ctx.writeln(&format!("refl_b >> {target};")),
        (false, false) => ctx.writeln(&format!("refl_b << {target};")),
    }
}

fn emit_enumeral<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    target: &str,
    reading: bool,
) {
    if reading {
        ctx.writeln(&format!(
            "refl_b >> *reinterpret_cast<refl::Int_t*>(&{target});"
        ));
    } else {
        ctx.writeln(&format!("refl_b << (refl::Int_t){target};"));
    }
}

/// Runtime call suffix of the narrowed array transfers.
fn narrowed_suffix(fundamental: Fundamental) -> &'static str {
    match fundamental {
        Fundamental::Float16 => "Float16",
        _ => "Double32",
    }
}

fn emit_fixed_array<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    name: &str,
    element: ArrayElement,
    dims: &[u64],
    reading: bool,
) {
    if let ArrayElement::Fundamental(fundamental) = element {
        if fundamental.is_narrowed() {
            let count: u64 = dims.iter().product();
            let storage = fundamental.storage().spelling();
            let suffix = narrowed_suffix(fundamental);
            let first = format!("&{name}{}", "[0]".repeat(dims.len()));
            if reading {
                ctx.writeln(&format!(
                    "refl_b.ReadStaticArray{suffix}(reinterpret_cast<{storage}*>({first}));"
                ));
            } else {
                ctx.writeln(&format!(
                    "refl_b.WriteArray{suffix}(reinterpret_cast<{storage}*>({first}), {count});"
                ));
            }
            return;
        }
    }
    let target = open_element_loop(ctx, name, dims, "refl_i");
    match element {
        ArrayElement::Fundamental(fundamental) => {
            emit_fundamental(ctx, &target, fundamental, reading);
        }
        ArrayElement::Enumeral => emit_enumeral(ctx, &target, reading),
    }
    close_element_loop(ctx, dims);
}

/// Pointer to a run of numbers whose length is another data member.
fn emit_fast_array<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    member: &MemberStreamPlan,
    element: Fundamental,
    length: &str,
    reading: bool,
) {
    let name = member.name.as_str();
    let resolved = resolve_typedefs(ctx.port, &member.ty);
    let pointee = resolved
        .unqualified()
        .pointee()
        .map(TypeRef::unqualified)
        .cloned()
        .unwrap_or(TypeRef::Fundamental(element));
    let allocated = cxx_type(&pointee);
    // Enumerations travel as `Int_t`.
    let data = if matches!(pointee, TypeRef::Named(_)) {
        format!("reinterpret_cast<refl::Int_t*>({name})")
    } else {
        name.to_string()
    };
    let suffix = if element.is_narrowed() {
        narrowed_suffix(element)
    } else {
        ""
    };
    if reading {
        ctx.writeln(&format!("delete [] {name};"));
        ctx.writeln(&format!("{name} = nullptr;"));
        ctx.open(&format!("if ({length})"));
        ctx.writeln(&format!("{name} = new {allocated}[{length}];"));
        ctx.writeln(&format!("refl_b.ReadFastArray{suffix}({data}, {length});"));
        ctx.close("");
    } else {
        ctx.writeln(&format!("refl_b.WriteFastArray{suffix}({data}, {length});"));
    }
}
