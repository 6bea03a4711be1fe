//! FFI layer for the mobile host.
//!
//! This module provides C-compatible functions that can be called from the
//! React Native / Kotlin / Swift side. All data crosses the boundary as JSON
//! strings, and list controllers hold `serde_json::Value` entities.
//!
//! # Memory Management
//!
//! - Strings returned by `pitstop_*` functions are allocated by Rust
//! - Caller must free them with `pitstop_string_free`
//! - List pointers must be freed with `pitstop_list_free`
//!
//! # Error Handling
//!
//! Functions returning JSON use either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{
    apply_optimistic_update, generate_temp_id, is_temp_id, rollback_optimistic_update,
    OptimisticList, OptimisticUpdate,
};
use serde_json::Value;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// List controller over JSON entities.
pub type JsonList = OptimisticList<Value>;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

fn ok_json<T: serde::Serialize>(value: T) -> *mut c_char {
    to_c_string(FfiResult::ok(value).to_json())
}

fn err_json(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `pitstop_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::from(c"{\"error\":\"string contained null bytes\"}").into_raw(),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Parse a JSON argument, naming it in the error.
unsafe fn parse_arg<T: serde::de::DeserializeOwned>(
    ptr: *const c_char,
    name: &str,
) -> Result<T, String> {
    let raw = from_c_string(ptr).ok_or_else(|| format!("invalid {name} string"))?;
    serde_json::from_str(&raw).map_err(|e| format!("parse error in {name}: {e}"))
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `pitstop_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn pitstop_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Stateless primitives
// ============================================================================

/// Apply one optimistic update to a JSON array.
///
/// # Returns
/// JSON string: `{"ok": [items]}` or `{"error": "message"}`
///
/// # Safety
/// - `items_json` and `update_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pitstop_string_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_apply_update(
    items_json: *const c_char,
    update_json: *const c_char,
) -> *mut c_char {
    let items: Vec<Value> = match parse_arg(items_json, "items") {
        Ok(i) => i,
        Err(e) => return err_json(e),
    };
    let update: OptimisticUpdate<Value> = match parse_arg(update_json, "update") {
        Ok(u) => u,
        Err(e) => return err_json(e),
    };

    ok_json(apply_optimistic_update(&items, &update))
}

/// Roll back one optimistic update on a JSON array.
///
/// `original_json` may be null when no pre-image is available.
///
/// # Safety
/// - `items_json` and `update_json` must be valid null-terminated C strings or null
/// - `original_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `pitstop_string_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_rollback_update(
    items_json: *const c_char,
    update_json: *const c_char,
    original_json: *const c_char,
) -> *mut c_char {
    let items: Vec<Value> = match parse_arg(items_json, "items") {
        Ok(i) => i,
        Err(e) => return err_json(e),
    };
    let update: OptimisticUpdate<Value> = match parse_arg(update_json, "update") {
        Ok(u) => u,
        Err(e) => return err_json(e),
    };
    let original: Option<Value> = if original_json.is_null() {
        None
    } else {
        match parse_arg(original_json, "original") {
            Ok(o) => Some(o),
            Err(e) => return err_json(e),
        }
    };

    ok_json(rollback_optimistic_update(&items, &update, original.as_ref()))
}

/// Generate a client-side placeholder id.
///
/// # Returns
/// Plain (non-JSON) string. Caller must free with `pitstop_string_free`.
#[no_mangle]
pub extern "C" fn pitstop_generate_temp_id() -> *mut c_char {
    to_c_string(generate_temp_id())
}

/// Whether `id` is a client-side placeholder id. Null is not.
///
/// # Safety
/// - `id` must be a valid null-terminated C string or null
#[no_mangle]
pub unsafe extern "C" fn pitstop_is_temp_id(id: *const c_char) -> bool {
    from_c_string(id).is_some_and(|s| is_temp_id(&s))
}

// ============================================================================
// List controller lifecycle
// ============================================================================

/// Create a list controller.
///
/// `items_json` may be null for an empty list.
///
/// # Returns
/// Pointer to the list, or null if `items_json` is not a JSON array.
///
/// # Safety
/// - `items_json` must be a valid null-terminated C string or null
/// - Caller must free the returned pointer with `pitstop_list_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_new(items_json: *const c_char) -> *mut JsonList {
    let items: Vec<Value> = if items_json.is_null() {
        Vec::new()
    } else {
        match parse_arg(items_json, "items") {
            Ok(i) => i,
            Err(_) => return ptr::null_mut(),
        }
    };

    Box::into_raw(Box::new(JsonList::with_data(items)))
}

/// Free a list controller.
///
/// # Safety
/// - `list` must be a valid pointer from `pitstop_list_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_free(list: *mut JsonList) {
    if !list.is_null() {
        drop(Box::from_raw(list));
    }
}

/// Apply and register an optimistic update.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `list` must be a valid pointer from `pitstop_list_new` or null
/// - `update_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `pitstop_string_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_add(
    list: *mut JsonList,
    update_json: *const c_char,
) -> *mut c_char {
    let list = match list.as_mut() {
        Some(l) => l,
        None => return err_json("null list pointer"),
    };
    let update: OptimisticUpdate<Value> = match parse_arg(update_json, "update") {
        Ok(u) => u,
        Err(e) => return err_json(e),
    };

    match list.add_optimistic_update(update) {
        Ok(()) => ok_json(()),
        Err(e) => err_json(e.to_string()),
    }
}

/// Confirm a pending update. Returns false for a null list or unknown id.
///
/// # Safety
/// - `list` must be a valid pointer from `pitstop_list_new` or null
/// - `op_id` must be a valid null-terminated C string or null
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_confirm(list: *mut JsonList, op_id: *const c_char) -> bool {
    match (list.as_mut(), from_c_string(op_id)) {
        (Some(list), Some(op_id)) => list.confirm_update(&op_id),
        _ => false,
    }
}

/// Roll back a pending update.
///
/// # Returns
/// JSON string: `{"ok": "restored" | "missingPreImage" | "notPending"}` or
/// `{"error": "message"}`
///
/// # Safety
/// - `list` must be a valid pointer from `pitstop_list_new` or null
/// - `op_id` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `pitstop_string_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_rollback(
    list: *mut JsonList,
    op_id: *const c_char,
) -> *mut c_char {
    let list = match list.as_mut() {
        Some(l) => l,
        None => return err_json("null list pointer"),
    };
    let op_id = match from_c_string(op_id) {
        Some(id) => id,
        None => return err_json("invalid operation id"),
    };

    ok_json(list.rollback_update(&op_id))
}

/// Replace the list's data with fresh server data, keeping pending updates.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `list` must be a valid pointer from `pitstop_list_new` or null
/// - `items_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `pitstop_string_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_set_data(
    list: *mut JsonList,
    items_json: *const c_char,
) -> *mut c_char {
    let list = match list.as_mut() {
        Some(l) => l,
        None => return err_json("null list pointer"),
    };
    let items: Vec<Value> = match parse_arg(items_json, "items") {
        Ok(i) => i,
        Err(e) => return err_json(e),
    };

    list.set_data(items);
    ok_json(())
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ListView<'a> {
    items: &'a [Value],
    pending_count: usize,
    has_pending_updates: bool,
}

/// Get the visible items and pending state.
///
/// # Returns
/// JSON string: `{"ok": {"items": [...], "pendingCount": n, "hasPendingUpdates": b}}`
///
/// # Safety
/// - `list` must be a valid pointer from `pitstop_list_new` or null
/// - Caller must free the returned string with `pitstop_string_free`
#[no_mangle]
pub unsafe extern "C" fn pitstop_list_data(list: *const JsonList) -> *mut c_char {
    let list = match list.as_ref() {
        Some(l) => l,
        None => return err_json("null list pointer"),
    };

    ok_json(ListView {
        items: list.data(),
        pending_count: list.pending_count(),
        has_pending_updates: list.has_pending_updates(),
    })
}

// ============================================================================
// Version Info
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn pitstop_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the queue snapshot format version.
#[no_mangle]
pub extern "C" fn pitstop_snapshot_format_version() -> u32 {
    crate::SNAPSHOT_FORMAT_VERSION
}
