#![deny(unreachable_pub)]

mod adapter;
mod error;
mod extract;
mod forum;
mod hosts;
mod image_host;
mod types;

pub use adapter::{Adapter, AdapterContext};
pub use error::AdapterError;
pub use forum::ViperAdapter;
pub use hosts::adapter_for;
pub use image_host::ImageHostAdapter;
pub use types::{GalleryDescriptor, HostRecipe, SuccessMarker, UrlPair};
