//! OS interface names by index.

use sdbrowse_core::types::Interface;

/// Looks up the OS name of an interface index (`2` -> `eth0`).
#[cfg(unix)]
pub fn system_interface_name(interface: Interface) -> Option<String> {
    let index = u32::try_from(interface.0).ok().filter(|i| *i > 0)?;
    let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];

    // SAFETY: buf holds IF_NAMESIZE bytes as if_indextoname requires, and the
    // returned pointer is only read when non-null, in which case it points
    // into buf and is NUL-terminated.
    let name = unsafe {
        let ptr = libc::if_indextoname(index, buf.as_mut_ptr());
        if ptr.is_null() {
            return None;
        }
        std::ffi::CStr::from_ptr(ptr)
    };

    Some(name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
pub fn system_interface_name(_interface: Interface) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_indices_have_no_name() {
        assert_eq!(system_interface_name(Interface::UNSPEC), None);
        assert_eq!(system_interface_name(Interface(0)), None);
    }
}
