pub mod header;
pub mod icon;
pub mod descriptor;
pub mod bundle;
pub mod error;

pub use header::{BundleHeader, HeaderError};
pub use icon::{encode_icon, encode_image, rgb565};
pub use bundle::{assemble, BundleReader, BundleSummary, BundleWriter};
pub use error::{BundleError, Stage};
