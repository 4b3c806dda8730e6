use std::borrow::Cow;
use std::ops::RangeInclusive;

use memchr::memmem;

/// Inclusive byte range of a balanced `{ ... }` pair inside an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub open: usize,
    pub close: usize,
}

impl Block {
    pub fn range(&self) -> RangeInclusive<usize> {
        self.open..=self.close
    }
}

/// Outcome of a scoped substitution.
#[derive(Debug, Clone)]
pub struct BlockEdit<'a> {
    /// Borrowed from the input whenever nothing was changed.
    pub content: Cow<'a, [u8]>,
    pub block: Option<Block>,
    pub replacements: usize,
    pub changed: bool,
}

impl<'a> BlockEdit<'a> {
    fn unchanged(content: &'a [u8], block: Option<Block>) -> Self {
        BlockEdit {
            content: Cow::Borrowed(content),
            block,
            replacements: 0,
            changed: false,
        }
    }
}

/// Find the first `{` after the first occurrence of `marker` and return the
/// range up to the brace that brings the nesting depth back to zero.
///
/// This is a raw byte scan. Braces inside quoted strings or comments are
/// counted like any other brace, so a string value containing `{` or `}`
/// inside the block will throw the match off.
pub fn locate_block(content: &[u8], marker: &[u8]) -> Option<Block> {
    let key = memmem::find(content, marker)?;
    let open = key + memchr::memchr(b'{', &content[key..])?;

    let mut depth = 0usize;
    for (offset, &byte) in content[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(Block {
                        open,
                        close: open + offset,
                    });
                }
            }
            _ => {}
        }
    }

    // Ran off the end: unterminated block.
    None
}

/// Replace every non-overlapping occurrence of `find` with `replace`, but only
/// inside the brace block that follows `marker`.
///
/// A missing marker, a marker with no `{` after it, an unterminated block, an
/// empty `find`, or a substitution that leaves the block byte-identical all
/// return the input untouched with `changed == false`.
pub fn replace_in_block<'a>(
    content: &'a [u8],
    marker: &[u8],
    find: &[u8],
    replace: &[u8],
) -> BlockEdit<'a> {
    let Some(block) = locate_block(content, marker) else {
        return BlockEdit::unchanged(content, None);
    };

    let original = &content[block.range()];
    let (new_block, replacements) = replace_all(original, find, replace);
    if replacements == 0 || new_block == original {
        return BlockEdit::unchanged(content, Some(block));
    }

    let mut out = Vec::with_capacity(content.len() - original.len() + new_block.len());
    out.extend_from_slice(&content[..block.open]);
    out.extend_from_slice(&new_block);
    out.extend_from_slice(&content[block.close + 1..]);

    BlockEdit {
        content: Cow::Owned(out),
        block: Some(block),
        replacements,
        changed: true,
    }
}

fn replace_all(haystack: &[u8], find: &[u8], replace: &[u8]) -> (Vec<u8>, usize) {
    if find.is_empty() {
        return (haystack.to_vec(), 0);
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut last = 0;
    let mut count = 0;
    for pos in memmem::find_iter(haystack, find) {
        out.extend_from_slice(&haystack[last..pos]);
        out.extend_from_slice(replace);
        last = pos + find.len();
        count += 1;
    }
    out.extend_from_slice(&haystack[last..]);

    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &[u8] = b"requiredModules";

    fn edit<'a>(content: &'a [u8], find: &str, replace: &str) -> BlockEdit<'a> {
        replace_in_block(content, MARKER, find.as_bytes(), replace.as_bytes())
    }

    #[test]
    fn replaces_inside_required_modules() {
        let src = br#"mission = { requiredModules = { ["A"] = "Vietnam Assets Pack by EightBall & Tobi", } }"#;
        let out = edit(
            src,
            "Vietnam Assets Pack by EightBall & Tobi",
            "[VWV] Vietnam Assets Pack",
        );
        assert!(out.changed);
        assert_eq!(out.replacements, 1);
        assert_eq!(
            out.content.as_ref(),
            br#"mission = { requiredModules = { ["A"] = "[VWV] Vietnam Assets Pack", } }"#
        );
    }

    #[test]
    fn text_outside_block_is_untouched() {
        let src = b"desc = \"Pack\" requiredModules = { \"Pack\", \"Pack\" } after = \"Pack\"";
        let out = edit(src, "Pack", "P");
        assert!(out.changed);
        assert_eq!(out.replacements, 2);
        assert_eq!(
            out.content.as_ref(),
            b"desc = \"Pack\" requiredModules = { \"P\", \"P\" } after = \"Pack\"".as_slice()
        );
    }

    #[test]
    fn nested_braces_close_at_depth_zero() {
        let src = b"requiredModules = { a = { \"X\" }, \"X\" } tail = { \"X\" }";
        let block = locate_block(src, MARKER).unwrap();
        assert_eq!(block, Block { open: 18, close: 37 });
        assert_eq!(&src[block.range()], b"{ a = { \"X\" }, \"X\" }".as_slice());

        let out = edit(src, "X", "Y");
        assert_eq!(
            out.content.as_ref(),
            b"requiredModules = { a = { \"Y\" }, \"Y\" } tail = { \"X\" }".as_slice()
        );
    }

    #[test]
    fn unterminated_block_is_a_no_op() {
        let src = b"requiredModules = { [\"A\"] = \"X\", { ";
        assert_eq!(locate_block(src, MARKER), None);
        let out = edit(src, "X", "Y");
        assert!(!out.changed);
        assert!(out.block.is_none());
        assert!(matches!(out.content, Cow::Borrowed(_)));
        assert_eq!(out.content.as_ref(), src.as_slice());
    }

    #[test]
    fn missing_marker_is_a_no_op() {
        let src = b"otherModules = { \"X\" }";
        let out = edit(src, "X", "Y");
        assert!(!out.changed);
        assert!(out.block.is_none());
        assert_eq!(out.content.as_ref(), src.as_slice());
    }

    #[test]
    fn marker_without_brace_is_a_no_op() {
        let src = b"X requiredModules = nil X";
        let out = edit(src, "X", "Y");
        assert!(!out.changed);
        assert_eq!(out.content.as_ref(), src.as_slice());
    }

    #[test]
    fn absent_search_string_reports_block_but_no_change() {
        let src = b"requiredModules = { \"A\" }";
        let out = edit(src, "Z", "Y");
        assert!(!out.changed);
        assert_eq!(out.block, Some(Block { open: 18, close: 24 }));
        assert_eq!(out.content.as_ref(), src.as_slice());
    }

    #[test]
    fn identical_replacement_is_not_a_change() {
        let src = b"requiredModules = { \"A\" }";
        let out = edit(src, "A", "A");
        assert!(!out.changed);
        assert!(matches!(out.content, Cow::Borrowed(_)));
    }

    #[test]
    fn empty_search_is_a_no_op() {
        let src = b"requiredModules = { \"A\" }";
        let out = edit(src, "", "B");
        assert!(!out.changed);
        assert_eq!(out.content.as_ref(), src.as_slice());
    }

    #[test]
    fn only_first_marker_block_is_edited() {
        let src = b"requiredModules = { \"X\" } requiredModules = { \"X\" }";
        let out = edit(src, "X", "Y");
        assert_eq!(
            out.content.as_ref(),
            b"requiredModules = { \"Y\" } requiredModules = { \"X\" }".as_slice()
        );
    }

    #[test]
    fn replacements_do_not_overlap() {
        let src = b"requiredModules = { aaaa }";
        let out = edit(src, "aa", "b");
        assert_eq!(out.replacements, 2);
        assert_eq!(out.content.as_ref(), b"requiredModules = { bb }".as_slice());
    }

    #[test]
    fn replacement_may_change_block_length() {
        let src = b"requiredModules = { x } end";
        let out = edit(src, "x", "{longer}");
        assert!(out.changed);
        assert_eq!(out.content.as_ref(), b"requiredModules = { {longer} } end".as_slice());
    }

    #[test]
    fn brace_inside_string_is_counted() {
        // Known limitation: the closing brace in the string ends the block early.
        let src = b"requiredModules = { \"}\", \"X\" }";
        let block = locate_block(src, MARKER).unwrap();
        assert_eq!(&src[block.range()], b"{ \"}".as_slice());
        assert!(!edit(src, "X", "Y").changed);
    }
}
