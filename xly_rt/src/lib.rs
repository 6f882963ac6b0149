// ABOUTME: C-ABI runtime library linked into every native-compiled Xenly binary

//! Every Xenly value at runtime is an opaque pointer to an [`XlyVal`] on the
//! heap. The runtime owns all allocation; there is no GC — values are
//! leaked and reclaimed in bulk at process exit, matching the lifetime of a
//! short-lived compiled binary. Compiled code never touches the struct
//! internals directly, only the `extern "C"` functions declared here.
//!
//! Calling convention: System V AMD64. Every function here takes / returns
//! `*mut XlyVal`, matching what `xenlyc`'s code generator emits calls to.

use std::ffi::{c_char, c_int, CStr, CString};
use std::os::raw::c_double;

/// The tagged runtime value. Arrays hold raw pointers to other heap-allocated
/// values rather than owned `XlyVal`s, since compiled code shares the same
/// backing allocations across pushes, indexing, and module calls.
///
/// `repr(C)` is load-bearing: the code generator's numeric fast paths read
/// the discriminant as a 4-byte tag at offset 0 (`cmpl $1, (%rdi)` to test
/// for `Str`) and the `Number` payload as an `f64` at offset 8
/// (`movsd 8(%rdi), %xmm0`), matching `Number = 0` / `Str = 1` below. A
/// default `repr(Rust)` layout gives neither guarantee.
#[repr(C)]
pub enum XlyVal {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Array(Vec<*mut XlyVal>),
}

fn alloc(v: XlyVal) -> *mut XlyVal {
    Box::into_raw(Box::new(v))
}

unsafe fn deref<'a>(v: *mut XlyVal) -> &'a XlyVal {
    &*v
}

fn truthy(v: &XlyVal) -> bool {
    match v {
        XlyVal::Null => false,
        XlyVal::Bool(b) => *b,
        XlyVal::Number(n) => *n != 0.0,
        XlyVal::Str(s) => !s.is_empty(),
        XlyVal::Array(_) => true,
    }
}

fn to_display_string(v: &XlyVal) -> String {
    match v {
        XlyVal::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        XlyVal::Str(s) => s.clone(),
        XlyVal::Bool(b) => b.to_string(),
        XlyVal::Null => "null".to_string(),
        XlyVal::Array(items) => {
            let mut out = String::from("[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                // SAFETY: compiled code only ever stores live XlyVal pointers.
                let inner = unsafe { deref(*item) };
                if matches!(inner, XlyVal::Str(_)) {
                    out.push('"');
                    out.push_str(&to_display_string(inner));
                    out.push('"');
                } else {
                    out.push_str(&to_display_string(inner));
                }
            }
            out.push(']');
            out
        }
    }
}

fn type_name(v: &XlyVal) -> &'static str {
    match v {
        XlyVal::Number(_) => "number",
        XlyVal::Str(_) => "string",
        XlyVal::Bool(_) => "bool",
        XlyVal::Null => "null",
        XlyVal::Array(_) => "array",
    }
}

fn vals_equal(a: &XlyVal, b: &XlyVal) -> bool {
    match (a, b) {
        (XlyVal::Number(x), XlyVal::Number(y)) => x == y,
        (XlyVal::Str(x), XlyVal::Str(y)) => x == y,
        (XlyVal::Bool(x), XlyVal::Bool(y)) => x == y,
        (XlyVal::Null, XlyVal::Null) => true,
        (XlyVal::Array(x), XlyVal::Array(y)) => std::ptr::eq(x, y),
        _ => false,
    }
}

fn num_of(v: &XlyVal) -> f64 {
    match v {
        XlyVal::Number(n) => *n,
        _ => 0.0,
    }
}

// ── constructors ─────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn xly_num(n: c_double) -> *mut XlyVal {
    alloc(XlyVal::Number(n))
}

/// # Safety
/// `s` must be a valid, NUL-terminated C string (or null).
#[no_mangle]
pub unsafe extern "C" fn xly_str(s: *const c_char) -> *mut XlyVal {
    let owned = if s.is_null() {
        String::new()
    } else {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    };
    alloc(XlyVal::Str(owned))
}

#[no_mangle]
pub extern "C" fn xly_bool(b: c_int) -> *mut XlyVal {
    alloc(XlyVal::Bool(b != 0))
}

#[no_mangle]
pub extern "C" fn xly_null() -> *mut XlyVal {
    alloc(XlyVal::Null)
}

// ── arithmetic / comparison ──────────────────────────────────────────────

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_add(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    let (va, vb) = (deref(a), deref(b));
    if matches!(va, XlyVal::Str(_)) || matches!(vb, XlyVal::Str(_)) {
        let mut s = to_display_string(va);
        s.push_str(&to_display_string(vb));
        alloc(XlyVal::Str(s))
    } else {
        alloc(XlyVal::Number(num_of(va) + num_of(vb)))
    }
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_sub(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Number(num_of(deref(a)) - num_of(deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_mul(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Number(num_of(deref(a)) * num_of(deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_div(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Number(num_of(deref(a)) / num_of(deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_mod(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Number(num_of(deref(a)) % num_of(deref(b))))
}

/// # Safety
/// `a` must be a valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_neg(a: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Number(-num_of(deref(a))))
}

/// # Safety
/// `a` must be a valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_not(a: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(!truthy(deref(a))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_eq(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(vals_equal(deref(a), deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_neq(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(!vals_equal(deref(a), deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_lt(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(num_of(deref(a)) < num_of(deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_gt(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(num_of(deref(a)) > num_of(deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_lte(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(num_of(deref(a)) <= num_of(deref(b))))
}

/// # Safety
/// `a` and `b` must be valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_gte(a: *mut XlyVal, b: *mut XlyVal) -> *mut XlyVal {
    alloc(XlyVal::Bool(num_of(deref(a)) >= num_of(deref(b))))
}

/// # Safety
/// `v` must be a valid `XlyVal*` produced by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn xly_truthy(v: *mut XlyVal) -> c_int {
    if v.is_null() {
        return 0;
    }
    truthy(deref(v)) as c_int
}

// ── I/O ───────────────────────────────────────────────────────────────────

/// # Safety
/// `vals` must point to `n` valid `XlyVal*` entries.
#[no_mangle]
pub unsafe extern "C" fn xly_print(vals: *mut *mut XlyVal, n: usize) {
    use std::io::Write;
    let mut out = String::new();
    for i in 0..n {
        if i > 0 {
            out.push(' ');
        }
        let ptr = *vals.add(i);
        out.push_str(&to_display_string(deref(ptr)));
    }
    out.push('\n');
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let _ = lock.write_all(out.as_bytes());
    let _ = lock.flush();
}

/// # Safety
/// `prompt` must be null or a valid `XlyVal*` produced by this library.
#[no_mangle]
pub unsafe extern "C" fn xly_input(prompt: *mut XlyVal) -> *mut XlyVal {
    use std::io::Write;
    if !prompt.is_null() {
        print!("{}", to_display_string(deref(prompt)));
        let _ = std::io::stdout().flush();
    }
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(_) => alloc(XlyVal::Str(line.trim_end_matches(['\n', '\r']).to_string())),
        Err(_) => alloc(XlyVal::Str(String::new())),
    }
}

// ── string conversion ─────────────────────────────────────────────────────

/// # Safety
/// `v` must be a valid `XlyVal*` produced by this library, or null.
/// The returned pointer is owned by the caller and must be freed with
/// [`xly_free_cstr`].
#[no_mangle]
pub unsafe extern "C" fn xly_to_cstr(v: *mut XlyVal) -> *mut c_char {
    let s = if v.is_null() {
        "null".to_string()
    } else {
        to_display_string(deref(v))
    };
    CString::new(s).unwrap_or_default().into_raw()
}

/// Releases a string previously returned by [`xly_to_cstr`] or
/// [`value_to_string`].
///
/// # Safety
/// `s` must be a pointer returned by one of those functions, or null.
#[no_mangle]
pub unsafe extern "C" fn xly_free_cstr(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// # Safety
/// `v` must be a valid `XlyVal*` produced by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn xly_typeof(v: *mut XlyVal) -> *mut XlyVal {
    let name = if v.is_null() { "null" } else { type_name(deref(v)) };
    alloc(XlyVal::Str(name.to_string()))
}

/// # Safety
/// `v` must be a valid `XlyVal*` produced by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn value_to_string(v: *mut XlyVal) -> *mut c_char {
    xly_to_cstr(v)
}

// ── value utilities ───────────────────────────────────────────────────────

/// # Safety
/// `v` must be a valid `XlyVal*` produced by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn value_clone(v: *mut XlyVal) -> *mut XlyVal {
    if v.is_null() {
        return xly_null();
    }
    match deref(v) {
        XlyVal::Number(n) => alloc(XlyVal::Number(*n)),
        XlyVal::Str(s) => alloc(XlyVal::Str(s.clone())),
        XlyVal::Bool(b) => alloc(XlyVal::Bool(*b)),
        XlyVal::Null => xly_null(),
        XlyVal::Array(items) => {
            let cloned: Vec<*mut XlyVal> = items.iter().map(|p| value_clone(*p)).collect();
            alloc(XlyVal::Array(cloned))
        }
    }
}

/// Frees a scalar value's owned memory (numbers, strings, bools, null).
/// Arrays are long-lived and shared across the program, so — like the
/// reference runtime — this leaves them alone; the process exit reclaims
/// everything at once.
///
/// # Safety
/// `v` must be a valid `XlyVal*` produced by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn value_destroy(v: *mut XlyVal) {
    if v.is_null() {
        return;
    }
    match deref(v) {
        XlyVal::Number(_) | XlyVal::Str(_) | XlyVal::Bool(_) | XlyVal::Null => {
            drop(Box::from_raw(v));
        }
        XlyVal::Array(_) => {}
    }
}

// ── array operations ──────────────────────────────────────────────────────

/// # Safety
/// `elems` must point to `n` valid `XlyVal*` entries (or be null if `n == 0`).
#[no_mangle]
pub unsafe extern "C" fn xly_array_create(elems: *mut *mut XlyVal, n: usize) -> *mut XlyVal {
    let mut items = Vec::with_capacity(n);
    for i in 0..n {
        items.push(*elems.add(i));
    }
    alloc(XlyVal::Array(items))
}

/// # Safety
/// `arr` must be a valid `XlyVal*` of variant `Array`.
#[no_mangle]
pub unsafe extern "C" fn xly_array_len(arr: *mut XlyVal) -> usize {
    match deref(arr) {
        XlyVal::Array(items) => items.len(),
        _ => 0,
    }
}

/// # Safety
/// `arr` must be a valid `XlyVal*` of variant `Array`; `idx` in bounds.
#[no_mangle]
pub unsafe extern "C" fn xly_array_get(arr: *mut XlyVal, idx: usize) -> *mut XlyVal {
    match deref(arr) {
        XlyVal::Array(items) => items.get(idx).copied().unwrap_or_else(xly_null),
        _ => xly_null(),
    }
}

/// # Safety
/// `arr` must be a valid `XlyVal*` of variant `Array`; `idx` in bounds.
#[no_mangle]
pub unsafe extern "C" fn xly_array_set(arr: *mut XlyVal, idx: usize, val: *mut XlyVal) {
    if let XlyVal::Array(items) = &mut *arr {
        if let Some(slot) = items.get_mut(idx) {
            *slot = val;
        } else {
            while items.len() < idx {
                items.push(xly_null());
            }
            items.push(val);
        }
    }
}

/// # Safety
/// `arr` must be a valid `XlyVal*` of variant `Array`.
#[no_mangle]
pub unsafe extern "C" fn xly_array_push(arr: *mut XlyVal, val: *mut XlyVal) -> *mut XlyVal {
    if let XlyVal::Array(items) = &mut *arr {
        items.push(val);
    }
    arr
}

/// # Safety
/// `collection` and `index_val` must be valid `XlyVal*` produced by this
/// library.
#[no_mangle]
pub unsafe extern "C" fn xly_index(collection: *mut XlyVal, index_val: *mut XlyVal) -> *mut XlyVal {
    if collection.is_null() || index_val.is_null() {
        return xly_null();
    }
    let idx = match deref(index_val) {
        XlyVal::Number(n) => *n as i64,
        _ => return xly_null(),
    };
    match deref(collection) {
        XlyVal::Array(items) => {
            if idx < 0 || idx as usize >= items.len() {
                xly_null()
            } else {
                items[idx as usize]
            }
        }
        XlyVal::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            if idx < 0 || idx as usize >= chars.len() {
                xly_null()
            } else {
                alloc(XlyVal::Str(chars[idx as usize].to_string()))
            }
        }
        _ => xly_null(),
    }
}

// ── module dispatch ────────────────────────────────────────────────────────

mod modules;

/// Dispatches a `module.function(args...)` call to the same native
/// functions the interpreter exposes (math/string/io), reimplemented here
/// against the `XlyVal` C-ABI representation since the interpreter's
/// `Value` type never crosses the FFI boundary.
///
/// # Safety
/// `mod_name` and `fn_name` must be valid NUL-terminated C strings. `args`
/// must point to `argc` valid `XlyVal*` entries (or be null if `argc == 0`).
#[no_mangle]
pub unsafe extern "C" fn xly_call_module(
    mod_name: *const c_char,
    fn_name: *const c_char,
    args: *mut *mut XlyVal,
    argc: usize,
) -> *mut XlyVal {
    let module = CStr::from_ptr(mod_name).to_string_lossy();
    let func = CStr::from_ptr(fn_name).to_string_lossy();
    let mut arg_vals = Vec::with_capacity(argc);
    for i in 0..argc {
        arg_vals.push(deref(*args.add(i)));
    }
    match modules::dispatch(&module, &func, &arg_vals) {
        Some(v) => alloc(v),
        None => {
            eprintln!("[xenly runtime] '{func}' not found in module '{module}'");
            xly_null()
        }
    }
}

// ── process exit ───────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn xly_exit(code: c_int) -> ! {
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_truthiness_and_display() {
        let v = xly_num(0.0);
        unsafe {
            assert_eq!(xly_truthy(v), 0);
            assert_eq!(to_display_string(deref(v)), "0");
        }
    }

    #[test]
    fn test_add_concatenates_when_either_side_is_string() {
        unsafe {
            let a = xly_str(CString::new("x=").unwrap().as_ptr());
            let b = xly_num(3.0);
            let r = xly_add(a, b);
            assert_eq!(to_display_string(deref(r)), "x=3");
        }
    }

    #[test]
    fn test_array_push_and_index() {
        unsafe {
            let arr = xly_array_create(std::ptr::null_mut(), 0);
            let v1 = xly_num(1.0);
            xly_array_push(arr, v1);
            assert_eq!(xly_array_len(arr), 1);
            let got = xly_array_get(arr, 0);
            assert_eq!(num_of(deref(got)), 1.0);
        }
    }

    #[test]
    fn test_index_out_of_range_is_null() {
        unsafe {
            let arr = xly_array_create(std::ptr::null_mut(), 0);
            let idx = xly_num(5.0);
            let r = xly_index(arr, idx);
            assert!(matches!(deref(r), XlyVal::Null));
        }
    }

    #[test]
    fn test_typeof_names() {
        unsafe {
            assert_eq!(to_display_string(deref(xly_typeof(xly_num(1.0)))), "number");
            assert_eq!(to_display_string(deref(xly_typeof(xly_null()))), "null");
        }
    }
}
