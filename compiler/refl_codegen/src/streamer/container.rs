//! Standard container transfer.
//!
//! A container is written as an `int` element count followed by its
//! elements; maps write key and value of each entry in turn. Elements that
//! are objects go through a runtime class looked up by `typeid` before the
//! loop, so a missing dictionary is reported once instead of per element.
//!
//! Reading clears the container and rebuilds it with the insertion call its
//! kind supports. `forward_list` only grows at the front and is reversed
//! once all elements are in.

use refl_ir::stl::Insertion;
use refl_ir::Introspect;

use super::{close_element_loop, open_element_loop, string};
use crate::closure::ClosureEntry;
use crate::context::{mangle, quote, CodegenContext};
use crate::plan::{cxx_name, ContainerPlan, Element, Holder};

/// Runtime class type an element is looked up by.
fn class_type(element: &Element) -> String {
    match element {
        Element::ObjectPointer(name) => cxx_name(name),
        other => other.cxx_type(),
    }
}

fn lookup_classes<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ContainerPlan,
    context: &str,
) {
    let slots = std::iter::once(&plan.first).chain(plan.second.as_ref());
    for (index, element) in slots.enumerate() {
        if !element.needs_class() {
            continue;
        }
        let tcl = index + 1;
        let ty = class_type(element);
        ctx.writeln(&format!(
            "refl::Class *refl_tcl{tcl} = refl::Buffer::GetClass(typeid({ty}));"
        ));
        ctx.open(&format!("if (refl_tcl{tcl} == nullptr)"));
        ctx.writeln(&format!(
            "refl::Error({}, {});",
            quote(context),
            quote(&format!("Missing the class object for {ty}!"))
        ));
        ctx.writeln("return;");
        ctx.close("");
    }
}

/// Declare `var` and read one element into it.
fn emit_read_element<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    element: &Element,
    var: &str,
    tcl: usize,
) {
    let ty = element.cxx_type();
    match element {
        Element::Fundamental(_) => {
            ctx.writeln(&format!("{ty} {var};"));
            ctx.writeln(&format!("refl_b >> {var};"));
        }
        Element::Enumeral(_) => {
            ctx.writeln(&format!("refl::Int_t {var}_int;"));
            ctx.writeln(&format!("refl_b >> {var}_int;"));
            ctx.writeln(&format!("{ty} {var} = static_cast<{ty}>({var}_int);"));
        }
        Element::String => {
            ctx.writeln(&format!("{ty} {var};"));
            string::emit_read(ctx, var);
        }
        Element::Object(_) | Element::Container(_) => {
            ctx.writeln(&format!("{ty} {var};"));
            ctx.writeln(&format!("refl_b.StreamObject(&{var}, refl_tcl{tcl});"));
        }
        Element::ObjectPointer(_) => {
            ctx.writeln(&format!(
                "{ty} {var} = ({ty})refl_b.ReadObjectAny(refl_tcl{tcl});"
            ));
        }
    }
}

fn emit_write_element<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    element: &Element,
    expr: &str,
    tcl: usize,
) {
    match element {
        Element::Fundamental(_) => ctx.writeln(&format!("refl_b << {expr};")),
        Element::Enumeral(_) => ctx.writeln(&format!("refl_b << (refl::Int_t){expr};")),
        Element::String => string::emit_write(ctx, expr),
        Element::Object(_) | Element::Container(_) => {
            let ty = element.cxx_type();
            ctx.writeln(&format!("refl_b.StreamObject(({ty}*)&{expr}, refl_tcl{tcl});"));
        }
        Element::ObjectPointer(_) => {
            ctx.writeln(&format!("refl_b.WriteObjectAny({expr}, refl_tcl{tcl});"));
        }
    }
}

/// Rebuild `refl_stl` from the buffer.
fn emit_read_body<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ContainerPlan,
    context: &str,
) {
    ctx.writeln("refl_stl.clear();");
    lookup_classes(ctx, plan, context);
    ctx.writeln("int refl_i, refl_n;");
    ctx.writeln("refl_b >> refl_n;");
    if plan.kind.can_reserve() {
        ctx.writeln("refl_stl.reserve(refl_n);");
    }
    ctx.open("for (refl_i = 0; refl_i < refl_n; refl_i++)");
    emit_read_element(ctx, &plan.first, "refl_t", 1);
    let insertion = plan.kind.insertion();
    if let Some(second) = &plan.second {
        emit_read_element(ctx, second, "refl_t2", 2);
        ctx.writeln(&format!(
            "std::pair<{} const, {}> refl_t3(refl_t, refl_t2);",
            plan.first.cxx_type(),
            second.cxx_type()
        ));
        ctx.writeln("refl_stl.insert(refl_t3);");
    } else {
        let call = match insertion {
            Insertion::PushBack => "push_back",
            Insertion::PushFront => "push_front",
            Insertion::Insert => "insert",
        };
        ctx.writeln(&format!("refl_stl.{call}(refl_t);"));
    }
    ctx.close("");
    if insertion == Insertion::PushFront {
        ctx.writeln("refl_stl.reverse();");
    }
}

/// Write the contents of `refl_stl`.
fn emit_write_body<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    plan: &ContainerPlan,
    context: &str,
) {
    ctx.writeln("int refl_n = int(std::distance(refl_stl.begin(), refl_stl.end()));");
    lookup_classes(ctx, plan, context);
    ctx.writeln("refl_b << refl_n;");
    ctx.open("if (refl_n)");
    ctx.open("for (auto refl_k = refl_stl.begin(); refl_k != refl_stl.end(); ++refl_k)");
    match &plan.second {
        Some(second) => {
            emit_write_element(ctx, &plan.first, "((*refl_k).first)", 1);
            emit_write_element(ctx, second, "((*refl_k).second)", 2);
        }
        None => emit_write_element(ctx, &plan.first, "(*refl_k)", 1),
    }
    ctx.close("");
    ctx.close("");
}

/// Transfer a container data member.
pub(crate) fn emit_member<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    name: &str,
    plan: &ContainerPlan,
    holder: &Holder,
    reading: bool,
) {
    let ty = cxx_name(&plan.type_name);
    let context = format!("{name} streamer");
    let dims = holder.dims();
    let expr = open_element_loop(ctx, name, dims, "refl_a");
    let pointer = matches!(holder, Holder::Pointer | Holder::PointerArray(_));
    match (reading, pointer) {
        (true, false) => {
            ctx.open("");
            ctx.writeln(&format!("{ty} &refl_stl = {expr};"));
            emit_read_body(ctx, plan, &context);
            ctx.close("");
        }
        (true, true) => {
            ctx.open("");
            ctx.writeln(&format!("delete {expr};"));
            ctx.writeln(&format!("{expr} = new {ty};"));
            ctx.writeln(&format!("{ty} &refl_stl = *{expr};"));
            emit_read_body(ctx, plan, &context);
            ctx.close("");
        }
        (false, false) => {
            ctx.open("");
            ctx.writeln(&format!("{ty} &refl_stl = {expr};"));
            emit_write_body(ctx, plan, &context);
            ctx.close("");
        }
        // A missing container is written as an empty one.
        (false, true) => {
            ctx.open(&format!("if ({expr} == nullptr)"));
            ctx.writeln("int refl_n = 0;");
            ctx.writeln("refl_b << refl_n;");
            ctx.reopen("else");
            ctx.writeln(&format!("{ty} &refl_stl = *{expr};"));
            emit_write_body(ctx, plan, &context);
            ctx.close("");
        }
    }
    close_element_loop(ctx, dims);
}

/// Free streamer function of a closure-discovered container, installed in
/// its registration.
pub fn emit_collection_streamer<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    entry: &ClosureEntry,
    plan: &ContainerPlan,
) {
    let ty = cxx_name(&plan.type_name);
    let context = format!("{} streamer", entry.normalized_name);
    ctx.separator();
    ctx.writeln(&format!(
        "static void streamer_{}(refl::Buffer &refl_b, void *refl_obj)",
        mangle(&entry.normalized_name)
    ));
    ctx.open("");
    ctx.writeln(&format!("// Stream an object of class {ty}."));
    ctx.newline();
    ctx.writeln(&format!("{ty} &refl_stl = *static_cast<{ty}*>(refl_obj);"));
    ctx.open("if (refl_b.IsReading())");
    emit_read_body(ctx, plan, &context);
    ctx.reopen("else");
    emit_write_body(ctx, plan, &context);
    ctx.close("");
    ctx.close("");
    ctx.newline();
}
