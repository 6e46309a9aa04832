//! `Markup`: a half-open byte interval plus its semantic attributes and a
//! possibly-deferred link target.

use std::sync::Arc;

use crate::model::symbol::SymbolDeclaration;
use crate::model::token_attrs::TokenAttributes;

/// How a markup's hyperlink target should be resolved, captured as a
/// tagged variant rather than resolved eagerly (see design notes: resolving
/// eagerly would miss targets defined in translation units parsed later).
#[derive(Clone)]
pub enum Refd {
    /// Link directly to a known symbol.
    Direct(Arc<SymbolDeclaration>),
    /// Resolve at render time via the USR -> definition map; a later TU may
    /// have produced the definition after this markup was recorded.
    ByUsr(String),
    /// A static externally-resolved URL (e.g. from a doxygen tag file).
    External(String),
    /// No link.
    None,
}

impl Refd {
    pub fn is_none(&self) -> bool {
        matches!(self, Refd::None)
    }
}

impl std::fmt::Debug for Refd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refd::Direct(_) => write!(f, "Refd::Direct(..)"),
            Refd::ByUsr(usr) => write!(f, "Refd::ByUsr({usr:?})"),
            Refd::External(url) => write!(f, "Refd::External({url:?})"),
            Refd::None => write!(f, "Refd::None"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Markup {
    pub begin_offset: u32,
    pub end_offset: u32,
    pub attrs: TokenAttributes,
    pub file_unique_name: Option<String>,
    pub refd: Refd,
}

impl Markup {
    pub fn new(begin_offset: u32, end_offset: u32, attrs: TokenAttributes) -> Self {
        Markup {
            begin_offset,
            end_offset,
            attrs,
            file_unique_name: None,
            refd: Refd::None,
        }
    }

    /// Markups with no attrs, no link, and no file-unique-name carry no
    /// information and are dropped before sorting.
    pub fn is_meaningless(&self) -> bool {
        self.attrs.is_empty() && self.refd.is_none() && self.file_unique_name.is_none()
    }

    pub fn has_link(&self) -> bool {
        !self.refd.is_none()
    }
}

/// Total order used to sort markups before rendering: `(beginOffset asc,
/// endOffset desc)`. Under this order, nested markups always appear after
/// their enclosing markup and nesting is well-formed by construction.
pub fn markup_order_key(m: &Markup) -> (u32, std::cmp::Reverse<u32>) {
    (m.begin_offset, std::cmp::Reverse(m.end_offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::token_attrs::{TokenAttributes, TokenKind};

    #[test]
    fn meaningless_markup_has_no_attrs_link_or_name() {
        let m = Markup::new(0, 1, TokenAttributes::new(TokenKind::None));
        assert!(m.is_meaningless());
    }

    #[test]
    fn markup_with_attrs_is_not_meaningless() {
        let m = Markup::new(0, 1, TokenAttributes::new(TokenKind::Kw));
        assert!(!m.is_meaningless());
    }

    #[test]
    fn sort_key_orders_by_begin_then_end_desc() {
        let mut ms = vec![
            Markup::new(5, 10, TokenAttributes::new(TokenKind::Kw)),
            Markup::new(0, 20, TokenAttributes::new(TokenKind::Kw)),
            Markup::new(0, 10, TokenAttributes::new(TokenKind::Kw)),
        ];
        ms.sort_by_key(markup_order_key);
        assert_eq!(
            ms.iter().map(|m| (m.begin_offset, m.end_offset)).collect::<Vec<_>>(),
            vec![(0, 20), (0, 10), (5, 10)]
        );
    }
}
