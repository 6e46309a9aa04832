//! Per-file markup list and the supplementary-merge algorithm (C4).

use parking_lot::Mutex;

use crate::model::markup::{markup_order_key, Markup};

/// Appended to during annotation (possibly from one thread per file, since
/// only one TU ever claims a given file); sorted and merged at render time.
pub struct MarkupBuilder {
    markups: Mutex<Vec<Markup>>,
}

impl MarkupBuilder {
    pub fn new() -> Self {
        MarkupBuilder {
            markups: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, m: Markup) {
        if m.is_meaningless() {
            return;
        }
        self.markups.lock().push(m);
    }

    /// Sorts the accumulated markups by `(beginOffset asc, endOffset desc)`
    /// and returns them, leaving the builder empty.
    pub fn take_sorted(&self) -> Vec<Markup> {
        let mut ms = std::mem::take(&mut *self.markups.lock());
        ms.sort_by_key(markup_order_key);
        ms
    }
}

impl Default for MarkupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges `supplementary` (typically fallback-highlighter output) into the
/// already-sorted `primary` list, dropping any supplementary markup that
/// would partially overlap a primary one. Disjoint and strictly-nested
/// supplementary markups are inserted so the result stays sorted.
pub fn merge_supplementary(primary: Vec<Markup>, supplementary: Vec<Markup>) -> Vec<Markup> {
    let mut result = primary;

    'outer: for supp in supplementary {
        let mut insert_at = result.len();
        for (i, p) in result.iter().enumerate() {
            let disjoint = supp.end_offset <= p.begin_offset || p.end_offset <= supp.begin_offset;
            let nested_in_p = p.begin_offset <= supp.begin_offset && supp.end_offset <= p.end_offset;
            let contains_p = supp.begin_offset <= p.begin_offset && p.end_offset <= supp.end_offset;

            if !disjoint && !nested_in_p && !contains_p {
                // Partial overlap: drop the supplementary markup entirely.
                continue 'outer;
            }
            if supp.begin_offset < p.begin_offset
                || (supp.begin_offset == p.begin_offset && supp.end_offset > p.end_offset)
            {
                insert_at = i;
                break;
            }
        }
        result.insert(insert_at, supp);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::token_attrs::{TokenAttributes, TokenKind};

    fn mk(b: u32, e: u32, kind: TokenKind) -> Markup {
        Markup::new(b, e, TokenAttributes::new(kind))
    }

    #[test]
    fn meaningless_markups_never_enter_the_builder() {
        let b = MarkupBuilder::new();
        b.push(mk(0, 1, TokenKind::None));
        assert!(b.take_sorted().is_empty());
    }

    #[test]
    fn sorted_output_respects_total_order() {
        let b = MarkupBuilder::new();
        b.push(mk(5, 6, TokenKind::Kw));
        b.push(mk(0, 10, TokenKind::Ty));
        b.push(mk(0, 3, TokenKind::Kw));
        let out = b.take_sorted();
        assert_eq!(
            out.iter().map(|m| (m.begin_offset, m.end_offset)).collect::<Vec<_>>(),
            vec![(0, 10), (0, 3), (5, 6)]
        );
    }

    #[test]
    fn supplementary_disjoint_is_inserted() {
        let primary = vec![mk(10, 20, TokenKind::Kw)];
        let supp = vec![mk(0, 5, TokenKind::LitStr)];
        let merged = merge_supplementary(primary, supp);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].begin_offset, 0);
    }

    #[test]
    fn supplementary_partial_overlap_is_dropped() {
        let primary = vec![mk(10, 20, TokenKind::Kw)];
        let supp = vec![mk(5, 15, TokenKind::LitStr)];
        let merged = merge_supplementary(primary, supp);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn supplementary_nested_inside_primary_is_kept() {
        let primary = vec![mk(0, 20, TokenKind::Cmmt)];
        let supp = vec![mk(2, 10, TokenKind::LitStr)];
        let merged = merge_supplementary(primary, supp);
        assert_eq!(merged.len(), 2);
    }
}
