//! Client-side consumption of notifications.
//!
//! A [`StudentSession`] keeps a [`LocalView`] fresh by combining a push
//! subscription on the student's room with a [`ReconciliationLoop`] that
//! re-fetches the full list on a fixed interval. Either path replaces the
//! view with an authoritative snapshot.

pub mod feed;
pub mod http;
pub mod push;
pub mod reconcile;
pub mod session;
pub mod tls;
pub mod view;

pub use feed::NotificationFeed;
pub use http::HttpNotificationClient;
pub use push::{PushTransport, WsPushTransport};
pub use reconcile::{
    DEFAULT_RECONCILE_INTERVAL, PollCounters, ReconcileConfig, ReconciliationLoop, RefreshTrigger,
};
pub use session::StudentSession;
pub use tls::install_rustls_provider;
pub use view::{LocalView, ViewState};
