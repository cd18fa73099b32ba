/// Answers questions about where keystrokes are currently going.
pub trait ForegroundContext {
    /// Bundle identifier (or platform equivalent) of the frontmost application.
    fn current_application_identifier(&self) -> Option<String>;

    /// Whether the focused field is a password field or secure input is on.
    fn is_focused_field_secure(&self) -> bool;
}

/// Queries the running desktop session.
///
/// Only macOS exposes both answers. Elsewhere the application is unknown and
/// fields are never reported secure, so an allowlist blocks everything there
/// and a denylist blocks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemContext;

#[cfg(target_os = "macos")]
#[link(name = "Carbon", kind = "framework")]
extern "C" {
    /// True while any application (usually a password field) holds secure
    /// event input.
    fn IsSecureEventInputEnabled() -> bool;
}

#[cfg(target_os = "macos")]
impl ForegroundContext for SystemContext {
    fn current_application_identifier(&self) -> Option<String> {
        unsafe { frontmost_bundle_identifier() }
    }

    fn is_focused_field_secure(&self) -> bool {
        // SAFETY: takes no arguments and only reads process-wide state
        unsafe { IsSecureEventInputEnabled() }
    }
}

#[cfg(target_os = "macos")]
#[allow(deprecated)]
unsafe fn frontmost_bundle_identifier() -> Option<String> {
    use cocoa::base::{id, nil};
    use cocoa::foundation::NSString;
    use objc::{class, msg_send, sel, sel_impl};

    let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
    if workspace == nil {
        return None;
    }

    let frontmost: id = msg_send![workspace, frontmostApplication];
    if frontmost == nil {
        return None;
    }

    let bundle_id: id = msg_send![frontmost, bundleIdentifier];
    if bundle_id == nil {
        return None;
    }

    let cstr = NSString::UTF8String(bundle_id);
    if cstr.is_null() {
        return None;
    }

    Some(
        std::ffi::CStr::from_ptr(cstr)
            .to_string_lossy()
            .into_owned(),
    )
}

#[cfg(not(target_os = "macos"))]
impl ForegroundContext for SystemContext {
    fn current_application_identifier(&self) -> Option<String> {
        None
    }

    fn is_focused_field_secure(&self) -> bool {
        false
    }
}
