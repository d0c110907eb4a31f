//! Forwarding surface of the debug session.
//!
//! Each operation mirrors one [`UniversalApi`] operation: handle arguments are unwrapped, the
//! call is forwarded, and a handle result is wrapped into a fresh open [`DHandle`]. Non-handle
//! results, including the `-1`/NULL error convention of the api, are passed through as is.
use crate::{
    api::UniversalApi,
    handle::{self, DHandle, UHandle},
    raw_data::{GuardedBuffer, RawData},
    session::DebugSession,
    utils::error::DebugResult,
};

impl<A: UniversalApi> DebugSession<A> {
    fn forward_unary(
        &mut self,
        h: DHandle,
        op: impl FnOnce(&mut A, UHandle) -> UHandle,
    ) -> DebugResult<DHandle> {
        let uh = handle::unwrap(self, h)?;
        let result = op(&mut self.api, uh);
        handle::open(self, result)
    }

    fn forward_binary(
        &mut self,
        h1: DHandle,
        h2: DHandle,
        op: impl FnOnce(&mut A, UHandle, UHandle) -> UHandle,
    ) -> DebugResult<DHandle> {
        let uh1 = handle::unwrap(self, h1)?;
        let uh2 = handle::unwrap(self, h2)?;
        let result = op(&mut self.api, uh1, uh2);
        handle::open(self, result)
    }

    fn forward_query<T>(
        &mut self,
        h: DHandle,
        op: impl FnOnce(&mut A, UHandle) -> T,
    ) -> DebugResult<T> {
        let uh = handle::unwrap(self, h)?;
        Ok(op(&mut self.api, uh))
    }

    fn unwrap_all(&mut self, handles: &[DHandle]) -> DebugResult<Vec<UHandle>> {
        handles
            .iter()
            .map(|&dh| handle::unwrap(self, dh))
            .collect()
    }

    /// New handle to the object behind `h`. Both must be closed independently.
    pub fn dup(&mut self, h: DHandle) -> DebugResult<DHandle> {
        self.forward_unary(h, |api, uh| api.dup(uh))
    }

    /// Close `h` in the session and in the underlying api.
    pub fn close(&mut self, h: DHandle) -> DebugResult<()> {
        let uh = handle::close_and_check(self, h)?;
        if !uh.is_null() {
            self.api.close(uh);
        }
        Ok(())
    }

    pub fn long_from_i64(&mut self, value: i64) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.long_from_i64(value);
        handle::open(self, uh)
    }

    pub fn long_as_i64(&mut self, h: DHandle) -> DebugResult<i64> {
        self.forward_query(h, |api, uh| api.long_as_i64(uh))
    }

    pub fn float_from_f64(&mut self, value: f64) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.float_from_f64(value);
        handle::open(self, uh)
    }

    pub fn float_as_f64(&mut self, h: DHandle) -> DebugResult<f64> {
        self.forward_query(h, |api, uh| api.float_as_f64(uh))
    }

    pub fn bool_from_bool(&mut self, value: bool) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.bool_from_bool(value);
        handle::open(self, uh)
    }

    pub fn number_check(&mut self, h: DHandle) -> DebugResult<bool> {
        self.forward_query(h, |api, uh| api.number_check(uh))
    }

    pub fn add(&mut self, h1: DHandle, h2: DHandle) -> DebugResult<DHandle> {
        self.forward_binary(h1, h2, |api, a, b| api.add(a, b))
    }

    pub fn subtract(&mut self, h1: DHandle, h2: DHandle) -> DebugResult<DHandle> {
        self.forward_binary(h1, h2, |api, a, b| api.subtract(a, b))
    }

    pub fn multiply(&mut self, h1: DHandle, h2: DHandle) -> DebugResult<DHandle> {
        self.forward_binary(h1, h2, |api, a, b| api.multiply(a, b))
    }

    pub fn true_divide(&mut self, h1: DHandle, h2: DHandle) -> DebugResult<DHandle> {
        self.forward_binary(h1, h2, |api, a, b| api.true_divide(a, b))
    }

    pub fn negative(&mut self, h: DHandle) -> DebugResult<DHandle> {
        self.forward_unary(h, |api, uh| api.negative(uh))
    }

    pub fn is_true(&mut self, h: DHandle) -> DebugResult<i32> {
        self.forward_query(h, |api, uh| api.is_true(uh))
    }

    /// Identity comparison of the objects behind `h1` and `h2`.
    pub fn is(&mut self, h1: DHandle, h2: DHandle) -> DebugResult<bool> {
        let uh1 = handle::unwrap(self, h1)?;
        let uh2 = handle::unwrap(self, h2)?;
        Ok(self.api.is(uh1, uh2))
    }

    pub fn type_of(&mut self, h: DHandle) -> DebugResult<DHandle> {
        self.forward_unary(h, |api, uh| api.type_of(uh))
    }

    pub fn type_check(&mut self, h: DHandle, ty: DHandle) -> DebugResult<bool> {
        let uh = handle::unwrap(self, h)?;
        let uty = handle::unwrap(self, ty)?;
        Ok(self.api.type_check(uh, uty))
    }

    pub fn repr(&mut self, h: DHandle) -> DebugResult<DHandle> {
        self.forward_unary(h, |api, uh| api.repr(uh))
    }

    pub fn str(&mut self, h: DHandle) -> DebugResult<DHandle> {
        self.forward_unary(h, |api, uh| api.str(uh))
    }

    pub fn hash(&mut self, h: DHandle) -> DebugResult<i64> {
        self.forward_query(h, |api, uh| api.hash(uh))
    }

    pub fn length(&mut self, h: DHandle) -> DebugResult<isize> {
        self.forward_query(h, |api, uh| api.length(uh))
    }

    pub fn get_attr_s(&mut self, h: DHandle, name: &str) -> DebugResult<DHandle> {
        self.forward_unary(h, |api, uh| api.get_attr_s(uh, name))
    }

    pub fn set_attr_s(&mut self, h: DHandle, name: &str, value: DHandle) -> DebugResult<i32> {
        let uh = handle::unwrap(self, h)?;
        let uvalue = handle::unwrap(self, value)?;
        Ok(self.api.set_attr_s(uh, name, uvalue))
    }

    pub fn has_attr_s(&mut self, h: DHandle, name: &str) -> DebugResult<bool> {
        self.forward_query(h, |api, uh| api.has_attr_s(uh, name))
    }

    pub fn get_item(&mut self, h: DHandle, key: DHandle) -> DebugResult<DHandle> {
        self.forward_binary(h, key, |api, obj, key| api.get_item(obj, key))
    }

    pub fn set_item(&mut self, h: DHandle, key: DHandle, value: DHandle) -> DebugResult<i32> {
        let uh = handle::unwrap(self, h)?;
        let ukey = handle::unwrap(self, key)?;
        let uvalue = handle::unwrap(self, value)?;
        Ok(self.api.set_item(uh, ukey, uvalue))
    }

    pub fn contains(&mut self, container: DHandle, key: DHandle) -> DebugResult<i32> {
        let ucontainer = handle::unwrap(self, container)?;
        let ukey = handle::unwrap(self, key)?;
        Ok(self.api.contains(ucontainer, ukey))
    }

    pub fn call(&mut self, callable: DHandle, args: &[DHandle]) -> DebugResult<DHandle> {
        let ucallable = handle::unwrap(self, callable)?;
        let uargs = self.unwrap_all(args)?;
        let result = self.api.call(ucallable, &uargs);
        handle::open(self, result)
    }

    pub fn tuple_from_array(&mut self, items: &[DHandle]) -> DebugResult<DHandle> {
        self.enter()?;
        let uitems = self.unwrap_all(items)?;
        let result = self.api.tuple_from_array(&uitems);
        handle::open(self, result)
    }

    pub fn list_new(&mut self, len: isize) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.list_new(len);
        handle::open(self, uh)
    }

    pub fn list_append(&mut self, list: DHandle, item: DHandle) -> DebugResult<i32> {
        let ulist = handle::unwrap(self, list)?;
        let uitem = handle::unwrap(self, item)?;
        Ok(self.api.list_append(ulist, uitem))
    }

    pub fn dict_new(&mut self) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.dict_new();
        handle::open(self, uh)
    }

    pub fn unicode_from_str(&mut self, value: &str) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.unicode_from_str(value);
        handle::open(self, uh)
    }

    /// UTF-8 bytes of the string behind `h`, as a read-only copy whose validity ends when `h`
    /// is closed. `None` when the api reports an error.
    pub fn unicode_as_utf8(&mut self, h: DHandle) -> DebugResult<Option<RawData>> {
        let uh = handle::unwrap(self, h)?;
        if let Some(raw) = self.attached_raw_data(h) {
            return Ok(Some(raw));
        }
        let buffer = match self.api.unicode_as_utf8(uh) {
            Some(bytes) => GuardedBuffer::copy(bytes, true)?,
            None => return Ok(None),
        };
        self.attach_buffer(h, buffer).map(Some)
    }

    pub fn bytes_from_slice(&mut self, data: &[u8]) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.bytes_from_slice(data);
        handle::open(self, uh)
    }

    pub fn bytes_size(&mut self, h: DHandle) -> DebugResult<isize> {
        self.forward_query(h, |api, uh| api.bytes_size(uh))
    }

    /// Contents of the bytes object behind `h`, under the same rules as
    /// [`DebugSession::unicode_as_utf8`].
    pub fn bytes_as_slice(&mut self, h: DHandle) -> DebugResult<Option<RawData>> {
        let uh = handle::unwrap(self, h)?;
        if let Some(raw) = self.attached_raw_data(h) {
            return Ok(Some(raw));
        }
        let buffer = match self.api.bytes_as_slice(uh) {
            Some(bytes) => GuardedBuffer::copy(bytes, true)?,
            None => return Ok(None),
        };
        self.attach_buffer(h, buffer).map(Some)
    }

    pub fn err_set_string(&mut self, ty: DHandle, message: &str) -> DebugResult<()> {
        let uty = handle::unwrap(self, ty)?;
        self.api.err_set_string(uty, message);
        Ok(())
    }

    pub fn err_occurred(&mut self) -> DebugResult<bool> {
        self.enter()?;
        Ok(self.api.err_occurred())
    }

    pub fn err_clear(&mut self) -> DebugResult<()> {
        self.enter()?;
        self.api.err_clear();
        Ok(())
    }

    pub fn err_no_memory(&mut self) -> DebugResult<DHandle> {
        self.enter()?;
        let uh = self.api.err_no_memory();
        handle::open(self, uh)
    }

    pub fn fatal_error(&self, message: &str) -> ! {
        self.api.fatal_error(message)
    }
}
