//! The `extern "C"` shim emitted alongside a generated parser so
//! `Driver::generate_parser` can load it as a `cdylib` with `libloading`
//! (spec §4.6/§4.7 "dynamic code loading").
//!
//! Grounded on `fire833-lang-explorer`'s use of `libloading` to load a
//! freshly-built shared object and call back into it through a narrow
//! `extern "C"` surface; JSON is the wire format across that boundary
//! (via `serde_json`) rather than passing Rust's own unstable ABI for
//! arbitrary generic types across the dylib edge.

use std::fmt::Write as _;

/// Appends the FFI entry points for `class` to `out`. `class_parse_ffi`
/// parses the NUL-free UTF-8 byte slice `[ptr, ptr+len)`, serializes either
/// the resulting tree or the `ParseFailure` to JSON, and hands the caller an
/// owned buffer plus its length; `class_free` gives that buffer back so the
/// host process can release it once it has copied the JSON out.
pub fn emit_ffi_shim(out: &mut String, class: &str) {
    writeln!(
        out,
        "\n\
#[no_mangle]\n\
pub extern \"C\" fn {class}_parse_ffi(ptr: *const u8, len: usize, out_len: *mut usize) -> *mut u8 {{\n\
\x20   let input = unsafe {{ std::slice::from_raw_parts(ptr, len) }};\n\
\x20   let source = match std::str::from_utf8(input) {{\n\
\x20       Ok(s) => s,\n\
\x20       Err(_) => {{\n\
\x20           let body = serde_json::json!({{\"ok\": false, \"error\": \"input is not valid UTF-8\"}});\n\
\x20           return {class}_leak_json(&body, out_len);\n\
\x20       }}\n\
\x20   }};\n\
\x20   let parser = {class}::new(source, pegc::log::Log::None);\n\
\x20   let body = match parser.parse(source) {{\n\
\x20       Ok(tree) => serde_json::json!({{\"ok\": true, \"tree\": tree}}),\n\
\x20       Err(e) => serde_json::json!({{\"ok\": false, \"error\": e.to_string(), \"pointer\": e.pointer}}),\n\
\x20   }};\n\
\x20   {class}_leak_json(&body, out_len)\n\
}}\n\
\n\
fn {class}_leak_json(value: &serde_json::Value, out_len: *mut usize) -> *mut u8 {{\n\
\x20   let bytes = serde_json::to_vec(value).unwrap_or_default();\n\
\x20   unsafe {{ *out_len = bytes.len(); }}\n\
\x20   let mut boxed = bytes.into_boxed_slice();\n\
\x20   let ptr = boxed.as_mut_ptr();\n\
\x20   std::mem::forget(boxed);\n\
\x20   ptr\n\
}}\n\
\n\
/// Releases a buffer previously returned by `{class}_parse_ffi`. The caller\n\
/// must pass back the exact `(ptr, len)` pair it received.\n\
#[no_mangle]\n\
pub extern \"C\" fn {class}_free(ptr: *mut u8, len: usize) {{\n\
\x20   if ptr.is_null() {{\n\
\x20       return;\n\
\x20   }}\n\
\x20   unsafe {{\n\
\x20       drop(Box::from_raw(std::slice::from_raw_parts_mut(ptr, len)));\n\
\x20   }}\n\
}}\n"
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_matching_parse_and_free_exports() {
        let mut out = String::new();
        emit_ffi_shim(&mut out, "Toy");
        assert!(out.contains("Toy_parse_ffi"));
        assert!(out.contains("Toy_free"));
        assert!(out.contains("#[no_mangle]"));
    }
}
