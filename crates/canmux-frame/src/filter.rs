//! Acceptance filters.
//!
//! A frame passes when `(id & mask) == code` and, for each enabled
//! must-match flag, the frame's extended/RTR bit equals the required value.

use crate::frame::CanFrame;

/// Identifier/mask predicate with optional exact matching on the
/// extended and RTR flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Filter {
    pub code: u32,
    pub mask: u32,
    pub extended_must_match: bool,
    pub extended_value: bool,
    pub rtr_must_match: bool,
    pub rtr_value: bool,
}

impl Filter {
    /// Accept every frame.
    pub fn pass_all() -> Self {
        Self::default()
    }

    /// Accept exactly one (id, extended, rtr) triple.
    pub fn pass_one_id(id: u32, extended: bool, rtr: bool) -> Self {
        Self {
            code: id,
            mask: u32::MAX,
            extended_must_match: true,
            extended_value: extended,
            rtr_must_match: true,
            rtr_value: rtr,
        }
    }

    /// Accept every identifier whose masked bits equal `code`. Flags are not
    /// checked.
    pub fn id_mask(code: u32, mask: u32) -> Self {
        Self {
            code: code & mask,
            mask,
            ..Self::default()
        }
    }

    pub fn does_pass(&self, frame: &CanFrame) -> bool {
        (frame.id() & self.mask) == self.code
            && (!self.extended_must_match || frame.is_extended() == self.extended_value)
            && (!self.rtr_must_match || frame.is_remote() == self.rtr_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u32, extended: bool, rtr: bool) -> CanFrame {
        if rtr {
            CanFrame::new_remote(id, extended, 0).unwrap()
        } else {
            CanFrame::new(id, extended, &[]).unwrap()
        }
    }

    #[test]
    fn pass_all_accepts_every_combination() {
        let filter = Filter::pass_all();
        for extended in [false, true] {
            for rtr in [false, true] {
                assert!(filter.does_pass(&frame(0x123, extended, rtr)));
                assert!(filter.does_pass(&frame(0x7FF, extended, rtr)));
                assert!(filter.does_pass(&frame(0, extended, rtr)));
            }
        }
    }

    #[test]
    fn pass_one_id_accepts_only_its_triple() {
        let filter = Filter::pass_one_id(0x123, false, false);
        assert!(filter.does_pass(&frame(0x123, false, false)));
        assert!(!filter.does_pass(&frame(0x124, false, false)));
        assert!(!filter.does_pass(&frame(0x123, true, false)));
        assert!(!filter.does_pass(&frame(0x123, false, true)));
    }

    #[test]
    fn id_mask_matches_range() {
        let filter = Filter::id_mask(0x100, 0x700);
        assert!(filter.does_pass(&frame(0x100, false, false)));
        assert!(filter.does_pass(&frame(0x1FF, false, false)));
        assert!(filter.does_pass(&frame(0x1FF, true, true)));
        assert!(!filter.does_pass(&frame(0x200, false, false)));
    }

    #[test]
    fn flag_only_filter() {
        let filter = Filter {
            extended_must_match: true,
            extended_value: true,
            ..Filter::pass_all()
        };
        assert!(filter.does_pass(&frame(0x1, true, false)));
        assert!(!filter.does_pass(&frame(0x1, false, false)));
    }
}
