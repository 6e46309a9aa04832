//! Shared data model: file identity, declarations, and markup intervals.

pub mod file_id;
pub mod markup;
pub mod symbol;
pub mod token_attrs;

pub use file_id::FileId;
pub use markup::{Markup, Refd};
pub use symbol::{FileEntry, SymbolDeclaration, WHOLE_FILE_OFFSET};
pub use token_attrs::{TokenAttributes, TokenKind};
