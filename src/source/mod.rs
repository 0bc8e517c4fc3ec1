//! PDF source resolution (path, base64 upload, URL)

mod resolver;

pub use resolver::{resolve_base64, resolve_path, resolve_url, ResolvedPdf};
