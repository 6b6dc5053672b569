//! Interface to the page hosting the client.

use tokio::sync::broadcast;

/// Visibility of the hosting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// The page is shown to the user.
    Visible,
    /// The page is in the background, e.g. because another app took the foreground.
    Hidden,
}

/// The page the client runs in.
///
/// Implemented by the embedding environment (a browser binding, a webview bridge, or a test fake).
pub trait Host: Send + Sync {
    /// Whether the page runs in a secure (HTTPS or equivalent) context.
    fn is_secure_context(&self) -> bool;

    /// Whether the page runs on a mobile device that can open the authenticator app directly.
    fn is_mobile_device(&self) -> bool;

    /// Navigates the page to `url`. The platform gives no feedback on whether an app handled it.
    fn navigate(&self, url: &str);

    /// Subscribes to visibility changes from now on.
    fn visibility(&self) -> broadcast::Receiver<Visibility>;

    /// Shows rendered QR code markup to the user.
    fn display_qr_code(&self, svg: &str);
}
