//! Interface of the trusted underlying api wrapped by a debug session.
//!
//! The debug layer never interprets a [`UHandle`]; it only forwards it to an implementation of
//! [`UniversalApi`]. Errors follow the underlying convention: operations producing a handle
//! return [`UHandle::NULL`] and operations producing an integer return `-1`, with the error
//! left pending (see [`UniversalApi::err_occurred`]).
use strum::{EnumCount, EnumIter, IntoStaticStr};

use crate::handle::UHandle;

/// Builtin objects exposed as constant handles by the underlying api.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr)]
#[repr(usize)]
pub enum Constant {
    None,
    True,
    False,
    NotImplemented,
    Ellipsis,
    BaseException,
    Exception,
    TypeError,
    ValueError,
    IndexError,
    KeyError,
    MemoryError,
    BaseObjectType,
    TypeType,
    BoolType,
    LongType,
    FloatType,
    UnicodeType,
    BytesType,
    TupleType,
    ListType,
    DictType,
}

/// Operations of the trusted implementation.
///
/// Implementors own the real objects. Every handle they return is owned by the caller and must
/// eventually be passed to [`UniversalApi::close`], except the constant handles.
pub trait UniversalApi {
    /// Name of the implementation, used in diagnostics.
    fn name(&self) -> &str;

    /// Cheap plausibility check of a handle produced by this implementation.
    fn is_valid_handle(&self, _h: UHandle) -> bool {
        true
    }

    fn constant(&self, constant: Constant) -> UHandle;

    fn dup(&mut self, h: UHandle) -> UHandle;
    fn close(&mut self, h: UHandle);

    fn long_from_i64(&mut self, value: i64) -> UHandle;
    fn long_as_i64(&mut self, h: UHandle) -> i64;
    fn float_from_f64(&mut self, value: f64) -> UHandle;
    fn float_as_f64(&mut self, h: UHandle) -> f64;
    fn bool_from_bool(&mut self, value: bool) -> UHandle;
    fn number_check(&mut self, h: UHandle) -> bool;
    fn add(&mut self, h1: UHandle, h2: UHandle) -> UHandle;
    fn subtract(&mut self, h1: UHandle, h2: UHandle) -> UHandle;
    fn multiply(&mut self, h1: UHandle, h2: UHandle) -> UHandle;
    fn true_divide(&mut self, h1: UHandle, h2: UHandle) -> UHandle;
    fn negative(&mut self, h: UHandle) -> UHandle;

    fn is_true(&mut self, h: UHandle) -> i32;
    fn is(&mut self, h1: UHandle, h2: UHandle) -> bool;
    fn type_of(&mut self, h: UHandle) -> UHandle;
    fn type_check(&mut self, h: UHandle, ty: UHandle) -> bool;
    fn repr(&mut self, h: UHandle) -> UHandle;
    fn str(&mut self, h: UHandle) -> UHandle;
    fn hash(&mut self, h: UHandle) -> i64;
    fn length(&mut self, h: UHandle) -> isize;
    fn get_attr_s(&mut self, h: UHandle, name: &str) -> UHandle;
    fn set_attr_s(&mut self, h: UHandle, name: &str, value: UHandle) -> i32;
    fn has_attr_s(&mut self, h: UHandle, name: &str) -> bool;
    fn get_item(&mut self, h: UHandle, key: UHandle) -> UHandle;
    fn set_item(&mut self, h: UHandle, key: UHandle, value: UHandle) -> i32;
    fn contains(&mut self, container: UHandle, key: UHandle) -> i32;
    fn call(&mut self, callable: UHandle, args: &[UHandle]) -> UHandle;

    fn tuple_from_array(&mut self, items: &[UHandle]) -> UHandle;
    fn list_new(&mut self, len: isize) -> UHandle;
    fn list_append(&mut self, list: UHandle, item: UHandle) -> i32;
    fn dict_new(&mut self) -> UHandle;

    fn unicode_from_str(&mut self, value: &str) -> UHandle;
    /// UTF-8 encoding of a string object, valid while `h` is open.
    fn unicode_as_utf8(&mut self, h: UHandle) -> Option<&[u8]>;
    fn bytes_from_slice(&mut self, data: &[u8]) -> UHandle;
    fn bytes_size(&mut self, h: UHandle) -> isize;
    /// Contents of a bytes object, valid while `h` is open.
    fn bytes_as_slice(&mut self, h: UHandle) -> Option<&[u8]>;

    fn err_set_string(&mut self, ty: UHandle, message: &str);
    fn err_occurred(&mut self) -> bool;
    fn err_clear(&mut self);
    /// Set a memory error and return `UHandle::NULL`.
    fn err_no_memory(&mut self) -> UHandle;

    /// Human readable rendering of the object behind `h`.
    fn dump(&self, h: UHandle) -> String;

    /// Report an unrecoverable error and terminate.
    fn fatal_error(&self, message: &str) -> ! {
        eprintln!("Fatal error in '{}': {message}", self.name());
        std::process::abort()
    }
}
