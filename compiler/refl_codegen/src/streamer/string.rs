//! Character-string members.
//!
//! Strings travel through the runtime's narrow string, which writes a
//! one-byte length (or `255` followed by a four-byte length) and the bytes.

use refl_ir::Introspect;

use super::{close_element_loop, open_element_loop};
use crate::context::CodegenContext;
use crate::plan::StringForm;

/// Read one string into the lvalue `target`.
pub(crate) fn emit_read<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, target: &str) {
    ctx.writeln(&format!(
        "{{ refl::NarrowString refl_str; refl_str.Streamer(refl_b); {target} = refl_str.Data(); }}"
    ));
}

/// Write one `std::string` expression.
pub(crate) fn emit_write<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, source: &str) {
    ctx.writeln(&format!(
        "{{ refl::NarrowString refl_str(({source}).c_str()); refl_str.Streamer(refl_b); }}"
    ));
}

pub(crate) fn emit_member<P: Introspect + ?Sized>(
    ctx: &mut CodegenContext<'_, P>,
    name: &str,
    form: &StringForm,
    reading: bool,
) {
    match form {
        StringForm::Value if reading => emit_read(ctx, name),
        StringForm::Value => emit_write(ctx, name),
        StringForm::Array(dims) => {
            let element = open_element_loop(ctx, name, dims, "refl_i");
            if reading {
                emit_read(ctx, &element);
            } else {
                emit_write(ctx, &element);
            }
            close_element_loop(ctx, dims);
        }
        StringForm::Pointer if reading => ctx.writeln(&format!(
            "{{ refl::NarrowString refl_str; refl_str.Streamer(refl_b); \
             delete {name}; {name} = new std::string(refl_str.Data()); }}"
        )),
        // A null string is written as an empty one.
        StringForm::Pointer => ctx.writeln(&format!(
            "{{ refl::NarrowString refl_str({name} ? {name}->c_str() : \"\"); \
             refl_str.Streamer(refl_b); }}"
        )),
    }
}
