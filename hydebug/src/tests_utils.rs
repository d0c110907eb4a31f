//! In-memory implementation of [`UniversalApi`] used by the tests of this crate and of its
//! dependents (feature `test-utils`).
//!
//! Objects live forever in an append-only store; handles are references to them. Handle
//! values are odd so that [`UniversalApi::is_valid_handle`] has something to check, and any
//! use of a closed handle panics, which makes a leak of an underlying handle through the
//! debug layer impossible to miss.
use std::{
    collections::{HashMap, hash_map::DefaultHasher},
    hash::{Hash, Hasher},
};

use strum::IntoEnumIterator;

use crate::{
    api::{Constant, UniversalApi},
    handle::UHandle,
};

/// Object of the mock object model.
#[derive(Debug, Clone, PartialEq)]
pub enum MockObject {
    None,
    NotImplemented,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<usize>),
    List(Vec<usize>),
    /// Insertion ordered `(key, value)` pairs.
    Dict(Vec<(usize, usize)>),
    /// Type object, exception types included.
    Type(&'static str),
    /// Plain instance with settable attributes, created by calling the object type.
    Namespace(HashMap<String, usize>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Subtract,
    Multiply,
    TrueDivide,
}

impl Arith {
    fn int(self, a: i64, b: i64) -> Option<i64> {
        match self {
            Arith::Add => a.checked_add(b),
            Arith::Subtract => a.checked_sub(b),
            Arith::Multiply => a.checked_mul(b),
            Arith::TrueDivide => None,
        }
    }

    fn float(self, a: f64, b: f64) -> f64 {
        match self {
            Arith::Add => a + b,
            Arith::Subtract => a - b,
            Arith::Multiply => a * b,
            Arith::TrueDivide => a / b,
        }
    }
}

#[derive(Debug)]
pub struct MockApi {
    objects: Vec<MockObject>,
    /// Handle slot to object id. `None` once the handle is closed.
    handles: Vec<Option<usize>>,
    constants: Vec<UHandle>,
    error: Option<(usize, String)>,
    closes: usize,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    pub fn new() -> Self {
        let mut api = MockApi {
            objects: Vec::new(),
            handles: Vec::new(),
            constants: Vec::new(),
            error: None,
            closes: 0,
        };
        for constant in Constant::iter() {
            let object = match constant {
                Constant::None => MockObject::None,
                Constant::True => MockObject::Bool(true),
                Constant::False => MockObject::Bool(false),
                Constant::NotImplemented => MockObject::NotImplemented,
                Constant::Ellipsis => MockObject::Ellipsis,
                Constant::BaseObjectType => MockObject::Type("object"),
                Constant::TypeType => MockObject::Type("type"),
                Constant::BoolType => MockObject::Type("bool"),
                Constant::LongType => MockObject::Type("int"),
                Constant::FloatType => MockObject::Type("float"),
                Constant::UnicodeType => MockObject::Type("str"),
                Constant::BytesType => MockObject::Type("bytes"),
                Constant::TupleType => MockObject::Type("tuple"),
                Constant::ListType => MockObject::Type("list"),
                Constant::DictType => MockObject::Type("dict"),
                other => MockObject::Type(other.into()),
            };
            let uh = api.alloc(object);
            api.constants.push(uh);
        }
        api
    }

    /// Handles returned by the api and not closed yet, constants excluded.
    pub fn open_handle_count(&self) -> usize {
        self.handles[self.constants.len()..]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Number of successful calls to [`UniversalApi::close`].
    pub fn close_count(&self) -> usize {
        self.closes
    }

    pub fn is_open(&self, h: UHandle) -> bool {
        self.slot(h)
            .and_then(|slot| self.handles.get(slot))
            .is_some_and(Option::is_some)
    }

    /// The pending error as `"<type name>: <message>"`.
    pub fn pending_error(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|(ty, message)| format!("{}: {message}", self.render(*ty)))
    }

    /// Object behind an open handle.
    pub fn object(&self, h: UHandle) -> &MockObject {
        &self.objects[self.obj(h)]
    }

    fn slot(&self, h: UHandle) -> Option<usize> {
        (h.0 & 1 == 1).then_some(h.0 >> 1)
    }

    fn obj(&self, h: UHandle) -> usize {
        match self.slot(h).and_then(|slot| self.handles.get(slot).copied()) {
            Some(Some(id)) => id,
            Some(None) => panic!("mock api: use of closed handle {h}"),
            None => panic!("mock api: {h} was never issued"),
        }
    }

    fn new_handle(&mut self, id: usize) -> UHandle {
        self.handles.push(Some(id));
        UHandle(((self.handles.len() - 1) << 1) | 1)
    }

    fn alloc(&mut self, object: MockObject) -> UHandle {
        self.objects.push(object);
        self.new_handle(self.objects.len() - 1)
    }

    fn constant_obj(&self, constant: Constant) -> usize {
        self.obj(self.constants[constant as usize])
    }

    fn raise(&mut self, ty: Constant, message: impl Into<String>) {
        self.error = Some((self.constant_obj(ty), message.into()));
    }

    fn raise_null(&mut self, ty: Constant, message: impl Into<String>) -> UHandle {
        self.raise(ty, message);
        UHandle::NULL
    }

    fn raise_int(&mut self, ty: Constant, message: impl Into<String>) -> i32 {
        self.raise(ty, message);
        -1
    }

    fn numeric(&self, id: usize) -> Option<Num> {
        match self.objects[id] {
            MockObject::Bool(b) => Some(Num::Int(b as i64)),
            MockObject::Int(v) => Some(Num::Int(v)),
            MockObject::Float(v) => Some(Num::Float(v)),
            _ => None,
        }
    }

    fn key_eq(&self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        match (&self.objects[a], &self.objects[b]) {
            (MockObject::Str(x), MockObject::Str(y)) => x == y,
            (MockObject::Bytes(x), MockObject::Bytes(y)) => x == y,
            _ => match (self.numeric(a), self.numeric(b)) {
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            },
        }
    }

    fn type_constant(&self, id: usize) -> Constant {
        match self.objects[id] {
            MockObject::Bool(_) => Constant::BoolType,
            MockObject::Int(_) => Constant::LongType,
            MockObject::Float(_) => Constant::FloatType,
            MockObject::Str(_) => Constant::UnicodeType,
            MockObject::Bytes(_) => Constant::BytesType,
            MockObject::Tuple(_) => Constant::TupleType,
            MockObject::List(_) => Constant::ListType,
            MockObject::Dict(_) => Constant::DictType,
            MockObject::Type(_) => Constant::TypeType,
            _ => Constant::BaseObjectType,
        }
    }

    fn render_all(&self, ids: &[usize]) -> String {
        ids.iter()
            .map(|id| self.render(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render(&self, id: usize) -> String {
        match &self.objects[id] {
            MockObject::None => "None".to_string(),
            MockObject::NotImplemented => "NotImplemented".to_string(),
            MockObject::Ellipsis => "Ellipsis".to_string(),
            MockObject::Bool(true) => "True".to_string(),
            MockObject::Bool(false) => "False".to_string(),
            MockObject::Int(v) => v.to_string(),
            MockObject::Float(v) => format!("{v:?}"),
            MockObject::Str(s) => format!("{s:?}"),
            MockObject::Bytes(b) => format!("b{:?}", String::from_utf8_lossy(b)),
            MockObject::Tuple(items) if items.len() == 1 => {
                format!("({},)", self.render(items[0]))
            }
            MockObject::Tuple(items) => format!("({})", self.render_all(items)),
            MockObject::List(items) => format!("[{}]", self.render_all(items)),
            MockObject::Dict(pairs) => format!(
                "{{{}}}",
                pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.render(*k), self.render(*v)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            MockObject::Type(name) => (*name).to_string(),
            MockObject::Namespace(attrs) => format!("<object with {} attribute(s)>", attrs.len()),
        }
    }

    fn arith(&mut self, h1: UHandle, h2: UHandle, op: Arith) -> UHandle {
        let (a, b) = (self.obj(h1), self.obj(h2));
        if op == Arith::Add {
            if let (MockObject::Str(x), MockObject::Str(y)) = (&self.objects[a], &self.objects[b])
            {
                let joined = format!("{x}{y}");
                return self.alloc(MockObject::Str(joined));
            }
        }
        match (self.numeric(a), self.numeric(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) if op != Arith::TrueDivide => {
                match op.int(x, y) {
                    Some(v) => self.alloc(MockObject::Int(v)),
                    None => self.raise_null(Constant::ValueError, "integer overflow"),
                }
            }
            (Some(x), Some(y)) => {
                if op == Arith::TrueDivide && y.as_f64() == 0.0 {
                    return self.raise_null(Constant::ValueError, "division by zero");
                }
                self.alloc(MockObject::Float(op.float(x.as_f64(), y.as_f64())))
            }
            _ => self.raise_null(Constant::TypeError, "unsupported operand types"),
        }
    }

    fn index(&self, len: usize, key: usize) -> Option<usize> {
        let Some(Num::Int(i)) = self.numeric(key) else {
            return None;
        };
        let i = if i < 0 { i + len as i64 } else { i };
        (0..len as i64).contains(&i).then_some(i as usize)
    }
}

impl UniversalApi for MockApi {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_valid_handle(&self, h: UHandle) -> bool {
        h.0 & 1 == 1
    }

    fn constant(&self, constant: Constant) -> UHandle {
        self.constants[constant as usize]
    }

    fn dup(&mut self, h: UHandle) -> UHandle {
        let id = self.obj(h);
        self.new_handle(id)
    }

    fn close(&mut self, h: UHandle) {
        // Panics if already closed.
        self.obj(h);
        assert!(
            !self.constants.contains(&h),
            "mock api: close of constant handle {h}"
        );
        if let Some(slot) = self.slot(h) {
            self.handles[slot] = None;
            self.closes += 1;
        }
    }

    fn long_from_i64(&mut self, value: i64) -> UHandle {
        self.alloc(MockObject::Int(value))
    }

    fn long_as_i64(&mut self, h: UHandle) -> i64 {
        let id = self.obj(h);
        match self.numeric(id) {
            Some(Num::Int(v)) => v,
            _ => {
                self.raise(Constant::TypeError, "an integer is required");
                -1
            }
        }
    }

    fn float_from_f64(&mut self, value: f64) -> UHandle {
        self.alloc(MockObject::Float(value))
    }

    fn float_as_f64(&mut self, h: UHandle) -> f64 {
        let id = self.obj(h);
        match self.numeric(id) {
            Some(num) => num.as_f64(),
            None => {
                self.raise(Constant::TypeError, "must be real number");
                -1.0
            }
        }
    }

    fn bool_from_bool(&mut self, value: bool) -> UHandle {
        let constant = if value { Constant::True } else { Constant::False };
        let id = self.constant_obj(constant);
        self.new_handle(id)
    }

    fn number_check(&mut self, h: UHandle) -> bool {
        let id = self.obj(h);
        self.numeric(id).is_some()
    }

    fn add(&mut self, h1: UHandle, h2: UHandle) -> UHandle {
        self.arith(h1, h2, Arith::Add)
    }

    fn subtract(&mut self, h1: UHandle, h2: UHandle) -> UHandle {
        self.arith(h1, h2, Arith::Subtract)
    }

    fn multiply(&mut self, h1: UHandle, h2: UHandle) -> UHandle {
        self.arith(h1, h2, Arith::Multiply)
    }

    fn true_divide(&mut self, h1: UHandle, h2: UHandle) -> UHandle {
        self.arith(h1, h2, Arith::TrueDivide)
    }

    fn negative(&mut self, h: UHandle) -> UHandle {
        let id = self.obj(h);
        match self.numeric(id) {
            Some(Num::Int(v)) => match v.checked_neg() {
                Some(v) => self.alloc(MockObject::Int(v)),
                None => self.raise_null(Constant::ValueError, "integer overflow"),
            },
            Some(Num::Float(v)) => self.alloc(MockObject::Float(-v)),
            None => self.raise_null(Constant::TypeError, "bad operand type for unary -"),
        }
    }

    fn is_true(&mut self, h: UHandle) -> i32 {
        let truth = match &self.objects[self.obj(h)] {
            MockObject::None => false,
            MockObject::Bool(b) => *b,
            MockObject::Int(v) => *v != 0,
            MockObject::Float(v) => *v != 0.0,
            MockObject::Str(s) => !s.is_empty(),
            MockObject::Bytes(b) => !b.is_empty(),
            MockObject::Tuple(items) | MockObject::List(items) => !items.is_empty(),
            MockObject::Dict(pairs) => !pairs.is_empty(),
            _ => true,
        };
        truth as i32
    }

    fn is(&mut self, h1: UHandle, h2: UHandle) -> bool {
        self.obj(h1) == self.obj(h2)
    }

    fn type_of(&mut self, h: UHandle) -> UHandle {
        let constant = self.type_constant(self.obj(h));
        let id = self.constant_obj(constant);
        self.new_handle(id)
    }

    fn type_check(&mut self, h: UHandle, ty: UHandle) -> bool {
        let ty = self.obj(ty);
        let actual = self.type_constant(self.obj(h));
        ty == self.constant_obj(actual)
            || ty == self.constant_obj(Constant::BaseObjectType)
            || (actual == Constant::BoolType && ty == self.constant_obj(Constant::LongType))
    }

    fn repr(&mut self, h: UHandle) -> UHandle {
        let rendered = self.render(self.obj(h));
        self.alloc(MockObject::Str(rendered))
    }

    fn str(&mut self, h: UHandle) -> UHandle {
        let id = self.obj(h);
        if let MockObject::Str(_) = self.objects[id] {
            return self.new_handle(id);
        }
        self.repr(h)
    }

    fn hash(&mut self, h: UHandle) -> i64 {
        let id = self.obj(h);
        let mut hasher = DefaultHasher::new();
        match &self.objects[id] {
            MockObject::Bool(b) => return *b as i64,
            MockObject::Int(v) => return *v,
            MockObject::Float(v) => return v.to_bits() as i64,
            MockObject::Str(s) => s.hash(&mut hasher),
            MockObject::Bytes(b) => b.hash(&mut hasher),
            MockObject::List(_) | MockObject::Dict(_) | MockObject::Namespace(_) => {
                self.raise(Constant::TypeError, "unhashable type");
                return -1;
            }
            _ => return id as i64,
        }
        hasher.finish() as i64
    }

    fn length(&mut self, h: UHandle) -> isize {
        let len = match &self.objects[self.obj(h)] {
            MockObject::Str(s) => s.chars().count(),
            MockObject::Bytes(b) => b.len(),
            MockObject::Tuple(items) | MockObject::List(items) => items.len(),
            MockObject::Dict(pairs) => pairs.len(),
            _ => {
                self.raise(Constant::TypeError, "object has no len()");
                return -1;
            }
        };
        len as isize
    }

    fn get_attr_s(&mut self, h: UHandle, name: &str) -> UHandle {
        let found = match &self.objects[self.obj(h)] {
            MockObject::Namespace(attrs) => attrs.get(name).copied(),
            _ => None,
        };
        match found {
            Some(id) => self.new_handle(id),
            None => self.raise_null(
                Constant::Exception,
                format!("object has no attribute '{name}'"),
            ),
        }
    }

    fn set_attr_s(&mut self, h: UHandle, name: &str, value: UHandle) -> i32 {
        let (id, value) = (self.obj(h), self.obj(value));
        match &mut self.objects[id] {
            MockObject::Namespace(attrs) => {
                attrs.insert(name.to_string(), value);
                0
            }
            _ => self.raise_int(Constant::TypeError, "object attributes are read-only"),
        }
    }

    fn has_attr_s(&mut self, h: UHandle, name: &str) -> bool {
        match &self.objects[self.obj(h)] {
            MockObject::Namespace(attrs) => attrs.contains_key(name),
            _ => false,
        }
    }

    fn get_item(&mut self, h: UHandle, key: UHandle) -> UHandle {
        let (id, key) = (self.obj(h), self.obj(key));
        let found = match &self.objects[id] {
            MockObject::Tuple(items) | MockObject::List(items) => {
                match self.index(items.len(), key) {
                    Some(i) => Ok(items[i]),
                    None => Err((Constant::IndexError, "index out of range")),
                }
            }
            MockObject::Dict(pairs) => pairs
                .iter()
                .find(|(k, _)| self.key_eq(*k, key))
                .map(|(_, v)| *v)
                .ok_or((Constant::KeyError, "key not found")),
            _ => Err((Constant::TypeError, "object is not subscriptable")),
        };
        match found {
            Ok(item) => self.new_handle(item),
            Err((ty, message)) => self.raise_null(ty, message),
        }
    }

    fn set_item(&mut self, h: UHandle, key: UHandle, value: UHandle) -> i32 {
        let (id, key, value) = (self.obj(h), self.obj(key), self.obj(value));
        let slot = match &self.objects[id] {
            MockObject::List(items) => match self.index(items.len(), key) {
                Some(i) => Ok(Some(i)),
                None => Err((Constant::IndexError, "index out of range")),
            },
            MockObject::Dict(pairs) => Ok(pairs.iter().position(|(k, _)| self.key_eq(*k, key))),
            _ => Err((Constant::TypeError, "object does not support item assignment")),
        };
        let slot = match slot {
            Ok(slot) => slot,
            Err((ty, message)) => return self.raise_int(ty, message),
        };
        match (&mut self.objects[id], slot) {
            (MockObject::List(items), Some(i)) => items[i] = value,
            (MockObject::Dict(pairs), Some(i)) => pairs[i].1 = value,
            (MockObject::Dict(pairs), None) => pairs.push((key, value)),
            _ => unreachable!("item slot computed for a non container"),
        }
        0
    }

    fn contains(&mut self, container: UHandle, key: UHandle) -> i32 {
        let (id, key) = (self.obj(container), self.obj(key));
        let found = match &self.objects[id] {
            MockObject::Tuple(items) | MockObject::List(items) => {
                items.iter().any(|item| self.key_eq(*item, key))
            }
            MockObject::Dict(pairs) => pairs.iter().any(|(k, _)| self.key_eq(*k, key)),
            MockObject::Str(s) => match &self.objects[key] {
                MockObject::Str(needle) => s.contains(needle.as_str()),
                _ => return self.raise_int(Constant::TypeError, "'in <string>' requires string"),
            },
            _ => return self.raise_int(Constant::TypeError, "object is not a container"),
        };
        found as i32
    }

    fn call(&mut self, callable: UHandle, args: &[UHandle]) -> UHandle {
        let callable = self.obj(callable);
        let args: Vec<usize> = args.iter().map(|&h| self.obj(h)).collect();
        let ty = match self.objects[callable] {
            MockObject::Type(_) => Constant::iter().find(|c| self.constant_obj(*c) == callable),
            _ => None,
        };

        match (ty, args.as_slice()) {
            (Some(Constant::BaseObjectType), []) => {
                self.alloc(MockObject::Namespace(HashMap::new()))
            }
            (Some(Constant::LongType), [arg]) => {
                let converted = match (&self.objects[*arg], self.numeric(*arg)) {
                    (_, Some(num)) => Ok(num.as_f64() as i64),
                    (MockObject::Str(s), None) => s
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| (Constant::ValueError, "invalid literal for int()")),
                    _ => Err((Constant::TypeError, "int() argument must be a number")),
                };
                match converted {
                    Ok(v) => self.alloc(MockObject::Int(v)),
                    Err((ty, message)) => self.raise_null(ty, message),
                }
            }
            (Some(Constant::UnicodeType), [arg]) => {
                let id = *arg;
                let rendered = match &self.objects[id] {
                    MockObject::Str(s) => s.clone(),
                    _ => self.render(id),
                };
                self.alloc(MockObject::Str(rendered))
            }
            (Some(Constant::TupleType), []) => self.alloc(MockObject::Tuple(Vec::new())),
            (Some(Constant::ListType), []) => self.alloc(MockObject::List(Vec::new())),
            (Some(Constant::DictType), []) => self.alloc(MockObject::Dict(Vec::new())),
            _ => self.raise_null(Constant::TypeError, "object is not callable"),
        }
    }

    fn tuple_from_array(&mut self, items: &[UHandle]) -> UHandle {
        let items = items.iter().map(|&h| self.obj(h)).collect();
        self.alloc(MockObject::Tuple(items))
    }

    fn list_new(&mut self, len: isize) -> UHandle {
        if len < 0 {
            return self.raise_null(Constant::ValueError, "negative list size");
        }
        let none = self.constant_obj(Constant::None);
        self.alloc(MockObject::List(vec![none; len as usize]))
    }

    fn list_append(&mut self, list: UHandle, item: UHandle) -> i32 {
        let (id, item) = (self.obj(list), self.obj(item));
        match &mut self.objects[id] {
            MockObject::List(items) => {
                items.push(item);
                0
            }
            _ => self.raise_int(Constant::TypeError, "append to a non list"),
        }
    }

    fn dict_new(&mut self) -> UHandle {
        self.alloc(MockObject::Dict(Vec::new()))
    }

    fn unicode_from_str(&mut self, value: &str) -> UHandle {
        self.alloc(MockObject::Str(value.to_string()))
    }

    fn unicode_as_utf8(&mut self, h: UHandle) -> Option<&[u8]> {
        let id = self.obj(h);
        if !matches!(self.objects[id], MockObject::Str(_)) {
            self.raise(Constant::TypeError, "expected a str object");
            return None;
        }
        match &self.objects[id] {
            MockObject::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    fn bytes_from_slice(&mut self, data: &[u8]) -> UHandle {
        self.alloc(MockObject::Bytes(data.to_vec()))
    }

    fn bytes_size(&mut self, h: UHandle) -> isize {
        match &self.objects[self.obj(h)] {
            MockObject::Bytes(b) => b.len() as isize,
            _ => {
                self.raise(Constant::TypeError, "expected a bytes object");
                -1
            }
        }
    }

    fn bytes_as_slice(&mut self, h: UHandle) -> Option<&[u8]> {
        let id = self.obj(h);
        if !matches!(self.objects[id], MockObject::Bytes(_)) {
            self.raise(Constant::TypeError, "expected a bytes object");
            return None;
        }
        match &self.objects[id] {
            MockObject::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    fn err_set_string(&mut self, ty: UHandle, message: &str) {
        self.error = Some((self.obj(ty), message.to_string()));
    }

    fn err_occurred(&mut self) -> bool {
        self.error.is_some()
    }

    fn err_clear(&mut self) {
        self.error = None;
    }

    fn err_no_memory(&mut self) -> UHandle {
        self.raise_null(Constant::MemoryError, "out of memory")
    }

    fn dump(&self, h: UHandle) -> String {
        self.render(self.obj(h))
    }

    fn fatal_error(&self, message: &str) -> ! {
        panic!("fatal error: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_odd_and_closable() {
        let mut api = MockApi::new();
        let h = api.long_from_i64(3);
        assert!(api.is_valid_handle(h));
        assert_eq!(api.open_handle_count(), 1);
        api.close(h);
        assert!(!api.is_open(h));
        assert_eq!(api.open_handle_count(), 0);
        assert_eq!(api.close_count(), 1);
    }

    #[test]
    #[should_panic(expected = "use of closed handle")]
    fn closed_handles_panic() {
        let mut api = MockApi::new();
        let h = api.unicode_from_str("x");
        api.close(h);
        api.dump(h);
    }

    #[test]
    #[should_panic(expected = "close of constant handle")]
    fn constants_cannot_be_closed() {
        let mut api = MockApi::new();
        let none = api.constant(Constant::None);
        api.close(none);
    }

    #[test]
    fn containers_and_errors() {
        let mut api = MockApi::new();
        let list = api.list_new(0);
        let one = api.long_from_i64(1);
        assert_eq!(api.list_append(list, one), 0);
        assert_eq!(api.dump(list), "[1]");

        let missing = api.long_from_i64(5);
        assert!(api.get_item(list, missing).is_null());
        assert_eq!(
            api.pending_error().as_deref(),
            Some("IndexError: index out of range")
        );
        api.err_clear();
        assert!(!api.err_occurred());
    }
}
