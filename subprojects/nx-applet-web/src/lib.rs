//! Web applet configuration.
//!
//! The web applet (and its Shop, OfflineWeb, LoginShare and WifiWebAuth
//! siblings) takes its parameters as a TLV argument storage: see
//! [`arg`] for the layout. [`WebCommonConfig`] builds that storage for a
//! regular web page, [`WebWifiConfig`] builds the fixed-layout argument of
//! the captive-portal applet.
//!
//! With the `show` feature (on by default) the configs can be launched
//! through `nx-libapplet`; without it they are plain byte builders.

#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "horizon")]
extern crate nx_panic_handler as _; // Provides #[panic_handler]

pub mod arg;
mod common;
mod error;
#[cfg(all(target_os = "horizon", feature = "show"))]
mod show;
mod wifi;

pub use self::{
    arg::{WebArgKind, WebArgType, WebCommonTlvStorage, WebShimKind},
    common::{
        WEB_LAST_URL_SIZE, WebAppletId, WebCommonConfig, WebCommonReturnValue, web_la_version,
    },
    error::WebConfigError,
    wifi::{WebWifiConfig, WebWifiPageArg, WebWifiReturnValue},
};
