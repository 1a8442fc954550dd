use std::ffi::{c_void, CStr};
use std::os::raw::c_char;

use hearth::Host;

/// Capability announced when the manifest entry has no `args`
const DEFAULT_CAPABILITY: &str = "capability";

/// Capability Plugin - announces its `args` as a host capability
///
/// Returns `1` without a host and `2` if the capability is already taken.
///
/// # Safety
/// `host` must be the host pointer passed by hearth and `args` null or a
/// valid C string.
#[no_mangle]
pub unsafe extern "C" fn hearth_plugin_main(host: *mut c_void, args: *const c_char) -> i32 {
    if host.is_null() {
        return 1;
    }
    let host = Host::from_raw(host);

    let capability = if args.is_null() {
        DEFAULT_CAPABILITY.to_string()
    } else {
        CStr::from_ptr(args).to_string_lossy().into_owned()
    };

    if host.register_capability(capability) {
        0
    } else {
        2
    }
}
