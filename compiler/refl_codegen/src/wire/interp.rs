//! Executes member stream plans against dynamic values.
//!
//! Each member shape is transferred the way the generated streamer
//! transfers it. A few runtime behaviors are folded into the value model:
//! a string pointer is always allocated on read, so it is modeled as a
//! plain string, and the same holds for containers held by pointer.

use std::collections::BTreeMap;
use std::rc::Rc;

use refl_ir::{Fundamental, Introspect};
use refl_select::Selection;
use rustc_hash::FxHashMap;
use tracing::trace;

use super::{WireError, WireReader, WireWriter};
use crate::plan::{
    plan_class, ArrayElement, ClassPlan, ContainerPlan, Element, Holder, MemberShape, StringForm,
};

/// A dynamic value of any streamable shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    /// Signed integers and enumerals.
    Int(i64),
    UInt(u64),
    Real(f64),
    Str(String),
    /// Fixed array, flattened in row-major order.
    Array(Vec<Value>),
    /// Sequence and set containers.
    Seq(Vec<Value>),
    /// Map containers, in stream order.
    Map(Vec<(Value, Value)>),
    Object(Object),
    Pointer(Option<Box<Value>>),
}

/// An instance of a class: its streamed bases and persistent members.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    /// Normalized class name.
    pub class: String,
    pub bases: Vec<Object>,
    pub fields: BTreeMap<String, Value>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Object {
            class: class.into(),
            bases: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_base(mut self, base: Object) -> Self {
        self.bases.push(base);
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// A member value, searched in the bases too.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .get(name)
            .or_else(|| self.bases.iter().find_map(|base| base.get(name)))
    }
}

/// How a class transfers itself.
enum ClassStreamer {
    /// Envelope with the given version, bases, members.
    Enveloped(u16),
    /// Version `<= 0`: bases only.
    Degenerate,
}

/// Runs class plans against a [`WireWriter`] or [`WireReader`].
pub struct Interpreter<'a, P: Introspect + ?Sized> {
    port: &'a P,
    selection: Option<&'a Selection>,
    plans: FxHashMap<String, Rc<ClassPlan>>,
}

impl<'a, P: Introspect + ?Sized> Interpreter<'a, P> {
    pub fn new(port: &'a P) -> Self {
        Interpreter {
            port,
            selection: None,
            plans: FxHashMap::default(),
        }
    }

    /// Apply the member overrides of the selected classes.
    #[must_use]
    pub fn with_selection(mut self, selection: &'a Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Stream an object to bytes.
    pub fn write(&mut self, object: &Object) -> Result<Vec<u8>, WireError> {
        let mut writer = WireWriter::new();
        self.write_object(&mut writer, object)?;
        Ok(writer.into_bytes())
    }

    /// Read an object of `class` that must span all of `bytes`.
    pub fn read(&mut self, class: &str, bytes: &[u8]) -> Result<Object, WireError> {
        let mut reader = WireReader::new(bytes);
        let object = self.read_object(&mut reader, class)?;
        if !reader.is_at_end() {
            return Err(WireError::TrailingBytes {
                count: reader.remaining(),
            });
        }
        Ok(object)
    }

    fn plan(&mut self, class: &str) -> Result<Rc<ClassPlan>, WireError> {
        let normalized = self.port.normalized_name(class);
        if let Some(plan) = self.plans.get(&normalized) {
            return Ok(Rc::clone(plan));
        }
        let Some((id, decl)) = self.port.lookup_class(&normalized) else {
            return Err(WireError::UnknownClass(normalized));
        };
        if decl.version.is_none() && decl.declares_streamer() {
            return Err(WireError::CustomStreamer { class: normalized });
        }
        let entity = self
            .selection
            .and_then(|selection| selection.class(&normalized));
        let (plan, errors) = plan_class(self.port, id, entity);
        if let Some(error) = errors.first() {
            return Err(WireError::Unstreamable {
                class: normalized,
                reason: error.to_string(),
            });
        }
        trace!(class = %normalized, members = plan.members.len(), "class plan cached");
        let plan = Rc::new(plan);
        self.plans.insert(normalized, Rc::clone(&plan));
        Ok(plan)
    }

    fn streamer(plan: &ClassPlan) -> Result<ClassStreamer, WireError> {
        match plan.version {
            // Classes without a version go through the generic object
            // transfer, which writes version 0.
            None => Ok(ClassStreamer::Enveloped(0)),
            Some(version) if version <= 0 => Ok(ClassStreamer::Degenerate),
            Some(version) => u16::try_from(version)
                .map(ClassStreamer::Enveloped)
                .map_err(|_| WireError::InvalidVersion(version)),
        }
    }

    pub fn write_object(
        &mut self,
        writer: &mut WireWriter,
        object: &Object,
    ) -> Result<(), WireError> {
        let plan = self.plan(&object.class)?;
        let streamer = Self::streamer(&plan)?;
        let envelope = match streamer {
            ClassStreamer::Enveloped(version) => Some(writer.begin_envelope(version)),
            ClassStreamer::Degenerate => None,
        };
        for base in &plan.bases {
            let Some(value) = object.bases.iter().find(|b| &b.class == base) else {
                return Err(WireError::MissingValue {
                    member: base.clone(),
                });
            };
            self.write_object(writer, value)?;
        }
        if let Some(position) = envelope {
            for member in plan.persistent() {
                let value = object
                    .fields
                    .get(&member.name)
                    .ok_or_else(|| WireError::MissingValue {
                        member: member.name.clone(),
                    })?;
                self.write_member(writer, &member.name, &member.shape, value, object)?;
            }
            writer.end_envelope(position);
        }
        Ok(())
    }

    pub fn read_object(
        &mut self,
        reader: &mut WireReader<'_>,
        class: &str,
    ) -> Result<Object, WireError> {
        let plan = self.plan(class)?;
        let mut object = Object::new(self.port.normalized_name(class));
        let envelope = match Self::streamer(&plan)? {
            ClassStreamer::Enveloped(_) => Some(reader.read_envelope(&object.class)?),
            ClassStreamer::Degenerate => None,
        };
        for base in &plan.bases {
            let value = self.read_object(reader, base)?;
            object.bases.push(value);
        }
        if let Some(envelope) = envelope {
            for member in plan.persistent() {
                let value = self.read_member(reader, &member.name, &member.shape, &object)?;
                object.fields.insert(member.name.clone(), value);
            }
            reader.check_envelope(envelope, &object.class)?;
        }
        Ok(object)
    }

    fn write_member(
        &mut self,
        writer: &mut WireWriter,
        name: &str,
        shape: &MemberShape,
        value: &Value,
        owner: &Object,
    ) -> Result<(), WireError> {
        match shape {
            MemberShape::Fundamental(fundamental) => {
                write_fundamental(writer, name, *fundamental, value)
            }
            MemberShape::Enumeral => write_enumeral(writer, name, value),
            MemberShape::FixedArray { element, dims } => {
                let items = array_of(name, value, dims.iter().product::<u64>() as usize)?;
                match element {
                    ArrayElement::Fundamental(fundamental) if fundamental.is_narrowed() => {
                        writer.write_i32(count(items.len())?);
                        for item in items {
                            write_fundamental(writer, name, *fundamental, item)?;
                        }
                    }
                    ArrayElement::Fundamental(fundamental) => {
                        for item in items {
                            write_fundamental(writer, name, *fundamental, item)?;
                        }
                    }
                    ArrayElement::Enumeral => {
                        for item in items {
                            write_enumeral(writer, name, item)?;
                        }
                    }
                }
                Ok(())
            }
            MemberShape::FundamentalPointer { element, length } => {
                let expected = evaluate_length(name, length, owner)?;
                let items = array_of(name, value, expected)?;
                for item in items {
                    write_fundamental(writer, name, *element, item)?;
                }
                Ok(())
            }
            MemberShape::String(form) => match form {
                StringForm::Value | StringForm::Pointer => {
                    writer.write_string(as_str(name, value)?);
                    Ok(())
                }
                StringForm::Array(dims) => {
                    let items = array_of(name, value, dims.iter().product::<u64>() as usize)?;
                    for item in items {
                        writer.write_string(as_str(name, item)?);
                    }
                    Ok(())
                }
            },
            MemberShape::Container { plan, holder } => match holder {
                Holder::Value | Holder::Pointer => self.write_container(writer, name, plan, value),
                Holder::Array(dims) | Holder::PointerArray(dims) => {
                    let items = array_of(name, value, dims.iter().product::<u64>() as usize)?;
                    for item in items {
                        self.write_container(writer, name, plan, item)?;
                    }
                    Ok(())
                }
            },
            MemberShape::Object { dims, .. } => {
                if dims.is_empty() {
                    return self.write_object(writer, as_object(name, value)?);
                }
                let items = array_of(name, value, dims.iter().product::<u64>() as usize)?;
                for item in items {
                    self.write_object(writer, as_object(name, item)?)?;
                }
                Ok(())
            }
            MemberShape::ObjectPointer { dims, .. } => {
                if dims.is_empty() {
                    return self.write_pointer(writer, name, value);
                }
                let items = array_of(name, value, dims.iter().product::<u64>() as usize)?;
                for item in items {
                    self.write_pointer(writer, name, item)?;
                }
                Ok(())
            }
        }
    }

    fn read_member(
        &mut self,
        reader: &mut WireReader<'_>,
        name: &str,
        shape: &MemberShape,
        owner: &Object,
    ) -> Result<Value, WireError> {
        match shape {
            MemberShape::Fundamental(fundamental) => read_fundamental(reader, *fundamental),
            MemberShape::Enumeral => Ok(Value::Int(i64::from(reader.read_i32()?))),
            MemberShape::FixedArray { element, dims } => {
                let expected = dims.iter().product::<u64>() as usize;
                let mut items = Vec::with_capacity(expected);
                match element {
                    ArrayElement::Fundamental(fundamental) if fundamental.is_narrowed() => {
                        let actual = reader.read_count()?;
                        if actual != expected {
                            return Err(WireError::LengthMismatch {
                                member: name.to_string(),
                                expected,
                                actual,
                            });
                        }
                        for _ in 0..expected {
                            items.push(read_fundamental(reader, *fundamental)?);
                        }
                    }
                    ArrayElement::Fundamental(fundamental) => {
                        for _ in 0..expected {
                            items.push(read_fundamental(reader, *fundamental)?);
                        }
                    }
                    ArrayElement::Enumeral => {
                        for _ in 0..expected {
                            items.push(Value::Int(i64::from(reader.read_i32()?)));
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            MemberShape::FundamentalPointer { element, length } => {
                let expected = evaluate_length(name, length, owner)?;
                let mut items = Vec::with_capacity(expected);
                for _ in 0..expected {
                    items.push(read_fundamental(reader, *element)?);
                }
                Ok(Value::Array(items))
            }
            MemberShape::String(form) => match form {
                StringForm::Value | StringForm::Pointer => Ok(Value::Str(reader.read_string()?)),
                StringForm::Array(dims) => {
                    let expected = dims.iter().product::<u64>() as usize;
                    let mut items = Vec::with_capacity(expected);
                    for _ in 0..expected {
                        items.push(Value::Str(reader.read_string()?));
                    }
                    Ok(Value::Array(items))
                }
            },
            MemberShape::Container { plan, holder } => match holder {
                Holder::Value | Holder::Pointer => self.read_container(reader, plan),
                Holder::Array(dims) | Holder::PointerArray(dims) => {
                    let expected = dims.iter().product::<u64>() as usize;
                    let mut items = Vec::with_capacity(expected);
                    for _ in 0..expected {
                        items.push(self.read_container(reader, plan)?);
                    }
                    Ok(Value::Array(items))
                }
            },
            MemberShape::Object { class, dims, .. } => {
                if dims.is_empty() {
                    return Ok(Value::Object(self.read_object(reader, class)?));
                }
                let expected = dims.iter().product::<u64>() as usize;
                let mut items = Vec::with_capacity(expected);
                for _ in 0..expected {
                    items.push(Value::Object(self.read_object(reader, class)?));
                }
                Ok(Value::Array(items))
            }
            MemberShape::ObjectPointer { class, dims } => {
                if dims.is_empty() {
                    return self.read_pointer(reader, class);
                }
                let expected = dims.iter().product::<u64>() as usize;
                let mut items = Vec::with_capacity(expected);
                for _ in 0..expected {
                    items.push(self.read_pointer(reader, class)?);
                }
                Ok(Value::Array(items))
            }
        }
    }

    /// A presence flag followed by the object.
    fn write_pointer(
        &mut self,
        writer: &mut WireWriter,
        name: &str,
        value: &Value,
    ) -> Result<(), WireError> {
        let Value::Pointer(target) = value else {
            return Err(mismatch(name, "a pointer"));
        };
        match target {
            None => {
                writer.write_u8(0);
                Ok(())
            }
            Some(target) => {
                writer.write_u8(1);
                self.write_object(writer, as_object(name, target)?)
            }
        }
    }

    fn read_pointer(&mut self, reader: &mut WireReader<'_>, class: &str) -> Result<Value, WireError> {
        if reader.read_u8()? == 0 {
            return Ok(Value::Pointer(None));
        }
        let object = self.read_object(reader, class)?;
        Ok(Value::Pointer(Some(Box::new(Value::Object(object)))))
    }

    fn write_container(
        &mut self,
        writer: &mut WireWriter,
        name: &str,
        plan: &ContainerPlan,
        value: &Value,
    ) -> Result<(), WireError> {
        match (&plan.second, value) {
            (Some(second), Value::Map(entries)) => {
                writer.write_i32(count(entries.len())?);
                for (key, mapped) in entries {
                    self.write_element(writer, name, &plan.first, key)?;
                    self.write_element(writer, name, second, mapped)?;
                }
                Ok(())
            }
            (None, Value::Seq(items)) => {
                writer.write_i32(count(items.len())?);
                for item in items {
                    self.write_element(writer, name, &plan.first, item)?;
                }
                Ok(())
            }
            (Some(_), _) => Err(mismatch(name, "a map")),
            (None, _) => Err(mismatch(name, "a sequence")),
        }
    }

    fn read_container(
        &mut self,
        reader: &mut WireReader<'_>,
        plan: &ContainerPlan,
    ) -> Result<Value, WireError> {
        let n = reader.read_count()?;
        match &plan.second {
            Some(second) => {
                let mut entries = Vec::with_capacity(n.min(reader.remaining()));
                for _ in 0..n {
                    let key = self.read_element(reader, &plan.first)?;
                    let mapped = self.read_element(reader, second)?;
                    entries.push((key, mapped));
                }
                Ok(Value::Map(entries))
            }
            None => {
                let mut items = Vec::with_capacity(n.min(reader.remaining()));
                for _ in 0..n {
                    items.push(self.read_element(reader, &plan.first)?);
                }
                Ok(Value::Seq(items))
            }
        }
    }

    fn write_element(
        &mut self,
        writer: &mut WireWriter,
        name: &str,
        element: &Element,
        value: &Value,
    ) -> Result<(), WireError> {
        match element {
            Element::Fundamental(fundamental) => {
                write_fundamental(writer, name, *fundamental, value)
            }
            Element::Enumeral(_) => write_enumeral(writer, name, value),
            Element::String => {
                writer.write_string(as_str(name, value)?);
                Ok(())
            }
            Element::Object(_) => self.write_object(writer, as_object(name, value)?),
            Element::ObjectPointer(_) => self.write_pointer(writer, name, value),
            Element::Container(plan) => self.write_container(writer, name, plan, value),
        }
    }

    fn read_element(
        &mut self,
        reader: &mut WireReader<'_>,
        element: &Element,
    ) -> Result<Value, WireError> {
        match element {
            Element::Fundamental(fundamental) => read_fundamental(reader, *fundamental),
            Element::Enumeral(_) => Ok(Value::Int(i64::from(reader.read_i32()?))),
            Element::String => Ok(Value::Str(reader.read_string()?)),
            Element::Object(class) => Ok(Value::Object(self.read_object(reader, class)?)),
            Element::ObjectPointer(class) => self.read_pointer(reader, class),
            Element::Container(plan) => self.read_container(reader, plan),
        }
    }
}

fn mismatch(member: &str, expected: &'static str) -> WireError {
    WireError::TypeMismatch {
        member: member.to_string(),
        expected,
    }
}

fn count(len: usize) -> Result<i32, WireError> {
    i32::try_from(len).map_err(|_| WireError::InvalidCount(i64::try_from(len).unwrap_or(i64::MAX)))
}

fn as_str<'v>(member: &str, value: &'v Value) -> Result<&'v str, WireError> {
    match value {
        Value::Str(text) => Ok(text),
        _ => Err(mismatch(member, "a string")),
    }
}

fn as_object<'v>(member: &str, value: &'v Value) -> Result<&'v Object, WireError> {
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(mismatch(member, "an object")),
    }
}

fn array_of<'v>(member: &str, value: &'v Value, expected: usize) -> Result<&'v [Value], WireError> {
    let Value::Array(items) = value else {
        return Err(mismatch(member, "an array"));
    };
    if items.len() != expected {
        return Err(WireError::LengthMismatch {
            member: member.to_string(),
            expected,
            actual: items.len(),
        });
    }
    Ok(items)
}

/// Evaluate a length expression: a product of integer members and
/// literals.
fn evaluate_length(member: &str, expression: &str, owner: &Object) -> Result<usize, WireError> {
    let unsupported = || WireError::UnsupportedLength {
        member: member.to_string(),
        expression: expression.to_string(),
    };
    let mut product: i64 = 1;
    for factor in expression.split('*').map(str::trim) {
        let value = if let Ok(literal) = factor.parse::<i64>() {
            literal
        } else {
            match owner.get(factor) {
                Some(Value::Int(value)) => *value,
                Some(Value::UInt(value)) => i64::try_from(*value).map_err(|_| unsupported())?,
                _ => return Err(unsupported()),
            }
        };
        product = product.checked_mul(value).ok_or_else(unsupported)?;
    }
    usize::try_from(product).map_err(|_| WireError::InvalidCount(product))
}

fn write_enumeral(writer: &mut WireWriter, member: &str, value: &Value) -> Result<(), WireError> {
    let Value::Int(value) = value else {
        return Err(mismatch(member, "an enumerator value"));
    };
    let value = i32::try_from(*value).map_err(|_| mismatch(member, "a 32-bit enumerator"))?;
    writer.write_i32(value);
    Ok(())
}

fn write_fundamental(
    writer: &mut WireWriter,
    member: &str,
    fundamental: Fundamental,
    value: &Value,
) -> Result<(), WireError> {
    let expected = fundamental.spelling();
    let range = || WireError::TypeMismatch {
        member: member.to_string(),
        expected,
    };
    match (fundamental, value) {
        (Fundamental::Bool, Value::Bool(v)) => writer.write_bool(*v),
        (Fundamental::Char | Fundamental::SignedChar, Value::Int(v)) => {
            writer.write_i8(i8::try_from(*v).map_err(|_| range())?);
        }
        (Fundamental::UChar, Value::UInt(v)) => {
            writer.write_u8(u8::try_from(*v).map_err(|_| range())?);
        }
        (Fundamental::Short, Value::Int(v)) => {
            writer.write_i16(i16::try_from(*v).map_err(|_| range())?);
        }
        (Fundamental::UShort, Value::UInt(v)) => {
            writer.write_u16(u16::try_from(*v).map_err(|_| range())?);
        }
        (Fundamental::Int, Value::Int(v)) => {
            writer.write_i32(i32::try_from(*v).map_err(|_| range())?);
        }
        (Fundamental::UInt, Value::UInt(v)) => {
            writer.write_u32(u32::try_from(*v).map_err(|_| range())?);
        }
        (Fundamental::Long | Fundamental::LongLong, Value::Int(v)) => writer.write_i64(*v),
        (Fundamental::ULong | Fundamental::ULongLong, Value::UInt(v)) => writer.write_u64(*v),
        #[allow(clippy::cast_possible_truncation)]
        (Fundamental::Float | Fundamental::Float16 | Fundamental::Double32, Value::Real(v)) => {
            writer.write_f32(*v as f32);
        }
        (Fundamental::Double, Value::Real(v)) => writer.write_f64(*v),
        _ => {
            return Err(WireError::TypeMismatch {
                member: member.to_string(),
                expected,
            })
        }
    }
    Ok(())
}

fn read_fundamental(reader: &mut WireReader<'_>, fundamental: Fundamental) -> Result<Value, WireError> {
    Ok(match fundamental {
        Fundamental::Bool => Value::Bool(reader.read_bool()?),
        Fundamental::Char | Fundamental::SignedChar => Value::Int(i64::from(reader.read_i8()?)),
        Fundamental::UChar => Value::UInt(u64::from(reader.read_u8()?)),
        Fundamental::Short => Value::Int(i64::from(reader.read_i16()?)),
        Fundamental::UShort => Value::UInt(u64::from(reader.read_u16()?)),
        Fundamental::Int => Value::Int(i64::from(reader.read_i32()?)),
        Fundamental::UInt => Value::UInt(u64::from(reader.read_u32()?)),
        Fundamental::Long | Fundamental::LongLong => Value::Int(reader.read_i64()?),
        Fundamental::ULong | Fundamental::ULongLong => Value::UInt(reader.read_u64()?),
        Fundamental::Float | Fundamental::Float16 | Fundamental::Double32 => {
            Value::Real(f64::from(reader.read_f32()?))
        }
        Fundamental::Double => Value::Real(reader.read_f64()?),
    })
}
