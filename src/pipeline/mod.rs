//! Building blocks the engines are assembled from.
//!
//! Each submodule wraps exactly one mechanism, so an engine reads as a short
//! composition of them inside a scratch scope.
//!
//! 1. [`render`]:    bind pdfium, open documents, rasterise pages to PNG
//! 2. [`text`]:      pull the text layer out of a document in-process
//! 3. [`supervise`]: run an external tool with captured output and a deadline
//! 4. [`collect`]:   gather the Markdown files a tool left in a directory
//!
//! `render` and `text` block; callers run them on `spawn_blocking`.

pub mod collect;
pub mod render;
pub mod supervise;
pub mod text;

/// Separator between per-page texts.
pub const PAGE_SEPARATOR: &str = "\n\n";
