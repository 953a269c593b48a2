//! Item-list (C7) and message-template (part of C6) file loaders (§6.2,
//! §6.3). The concrete wire encoding stays out of scope; these loaders
//! only produce the shapes `perfcore-items` needs at runtime.

mod item_file;
mod template_file;

pub use item_file::{load_item_file, LoaderError as ItemFileError};
pub use template_file::{load_template_file, LoaderError as TemplateFileError};
