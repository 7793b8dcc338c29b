use super::*;
use crate::util::Offset;

/// Entry of a `StackMapTable`, compressed relative to the previous entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    SameLocalsOneStack {
        offset_delta: u16,
        stack: VerificationType,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<VerificationType>,
    },

    /// Frame has exactly the locals and stack specified
    Full {
        offset_delta: u16,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }
}

impl Frame {
    /// Locals in the form they take in a stack map frame
    ///
    /// Category-2 values take up a single entry (the `Top` after them is implicit), unset slots
    /// become `Top`, and trailing `Top`s are dropped.
    pub fn stack_map_locals(&self) -> Vec<VerificationType> {
        let mut locals = vec![];
        let mut slots = self.locals.iter();
        while let Some(local) = slots.next() {
            match local {
                Some(typ) if typ.is_category2() => {
                    locals.push(typ.clone());
                    slots.next();
                }
                Some(typ) => locals.push(typ.clone()),
                None => locals.push(VerificationType::Top),
            }
        }
        while locals.last() == Some(&VerificationType::Top) {
            locals.pop();
        }
        locals
    }

    /// Compute the most compact stack map frame describing this frame, given the previous one
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Frame) -> StackMapFrame {
        let this_locals = self.stack_map_locals();
        let prev_locals = previous_frame.stack_map_locals();

        match self.stack.len() {
            0 => {
                if this_locals.len() <= prev_locals.len() {
                    let len_difference = prev_locals.len() - this_locals.len();
                    let this_is_prefix_of_prev = prev_locals.starts_with(&this_locals);
                    if len_difference < 4 && this_is_prefix_of_prev {
                        return if len_difference == 0 {
                            StackMapFrame::SameLocalsNoStack { offset_delta }
                        } else {
                            StackMapFrame::ChopLocalsNoStack {
                                offset_delta,
                                chopped_k: len_difference as u8,
                            }
                        };
                    }
                } else if this_locals.len() - prev_locals.len() < 4
                    && this_locals.starts_with(&prev_locals)
                {
                    return StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: this_locals[prev_locals.len()..].to_vec(),
                    };
                }
            }
            1 if this_locals == prev_locals => {
                if let Ok(top) = self.peek() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: top.clone(),
                    };
                }
            }
            _ => (),
        }

        StackMapFrame::Full {
            offset_delta,
            locals: this_locals,
            stack: self.stack.iter().map(|(_, t)| t.clone()).collect(),
        }
    }
}

impl Analysis {
    /// Stack map frames for every block entry that needs one
    ///
    /// The frame before the first entry is the frame on entry to the method (`initial_frame`).
    /// Offset 0 only gets an entry if something jumps back to it. Unreached blocks have no frame
    /// and so are skipped.
    pub fn stack_map_table(&self, initial_frame: &Frame) -> Vec<StackMapFrame> {
        let mut previous_frame = initial_frame;
        let mut previous_offset: Option<Offset> = None;
        let mut stack_map_frames = vec![];

        for (offset, flags) in self.flags.iter().enumerate() {
            let needs_frame = if offset == 0 {
                flags.intersects(OffsetFlags::JUMP_TARGET | OffsetFlags::EXCEPTION_HANDLER)
            } else {
                flags.contains(OffsetFlags::BLOCK_ENTRY)
            };
            if !needs_frame {
                continue;
            }
            let offset = Offset(offset);
            let frame = match self.frame_before(offset) {
                Some(frame) => frame,
                None => continue,
            };

            // Analyzed code is never longer than `MAX_CODE_LENGTH`, so this fits in a `u16`
            let offset_delta = match previous_offset {
                None => offset.0,
                Some(previous_offset) => offset.0 - previous_offset.0 - 1,
            };
            stack_map_frames.push(frame.stack_map_frame(offset_delta as u16, previous_frame));

            previous_frame = frame;
            previous_offset = Some(offset);
        }

        stack_map_frames
    }
}
