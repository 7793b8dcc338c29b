use super::*;
use crate::jvm::{BinaryName, RefType, VerifierErrorKind};
use crate::util::{OffsetVec, Width};
use std::fmt::{Display, Error as FmtError, Formatter};

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Frames are values: every instruction produces a new frame from a copy (`clone`) of the frame
/// before it, so successors of a branch start out with independent states.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame {
    /// Local variables, indexed by slot
    ///
    /// `None` is a slot that has never been written. A category-2 value in slot `i` is always
    /// followed by `Top` in slot `i + 1`.
    pub locals: Vec<Option<VerificationType>>,

    /// Types of values on the stack (offsets are in words, so `long` and `double` count twice)
    pub stack: OffsetVec<VerificationType>,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }

    /// Pop the value at the top of the stack
    pub fn pop(&mut self) -> Result<VerificationType, VerifierErrorKind> {
        self.stack
            .pop()
            .map(|(_, typ)| typ)
            .ok_or(VerifierErrorKind::EmptyStack)
    }

    /// Discard the top `n` values (not words) from the stack
    pub fn pop_n(&mut self, n: usize) -> Result<(), VerifierErrorKind> {
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    /// Pop a value of exactly the given type
    pub fn pop_expecting_type(
        &mut self,
        expected: VerificationType,
    ) -> Result<VerificationType, VerifierErrorKind> {
        let found = self.pop()?;
        if found == expected {
            Ok(found)
        } else {
            Err(VerifierErrorKind::InvalidType { expected, found })
        }
    }

    /// Pop a value taking up the given number of words
    pub fn pop_expecting_width(
        &mut self,
        expected_width: usize,
    ) -> Result<VerificationType, VerifierErrorKind> {
        let found = self.pop()?;
        let found_width = found.width();
        if found_width == expected_width {
            Ok(found)
        } else {
            Err(VerifierErrorKind::InvalidWidth(found_width))
        }
    }

    /// Pop any reference (including `null` and uninitialized references)
    pub fn pop_reference(&mut self) -> Result<VerificationType, VerifierErrorKind> {
        let found = self.pop()?;
        if found.is_reference() {
            Ok(found)
        } else {
            Err(VerifierErrorKind::NotReference(found))
        }
    }

    /// Peek at the value at the top of the stack
    pub fn peek(&self) -> Result<&VerificationType, VerifierErrorKind> {
        self.stack.last().ok_or(VerifierErrorKind::EmptyStack)
    }

    pub fn push(&mut self, typ: VerificationType) {
        self.stack.push(typ);
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Size of the stack in words
    pub fn stack_size(&self) -> usize {
        self.stack.offset_len().0
    }

    /// Number of local slots in use (counting the `Top` following category-2 values)
    pub fn locals_size(&self) -> usize {
        self.locals.len()
    }

    /// Read a local variable
    ///
    /// Fails if the slot is out of range, was never written, or holds `Top`.
    pub fn load(&self, index: u16) -> Result<VerificationType, VerifierErrorKind> {
        match self.locals.get(index as usize) {
            Some(Some(VerificationType::Top)) | Some(None) | None => {
                Err(VerifierErrorKind::InvalidLocal(index))
            }
            Some(Some(typ)) => Ok(typ.clone()),
        }
    }

    /// Read a local variable of exactly the given type
    pub fn load_expecting_type(
        &self,
        index: u16,
        expected: VerificationType,
    ) -> Result<VerificationType, VerifierErrorKind> {
        let found = self.load(index)?;
        if found == expected {
            Ok(found)
        } else {
            Err(VerifierErrorKind::InvalidType { expected, found })
        }
    }

    /// Write a local variable, growing the locals if needed
    ///
    /// Category-2 values also write `Top` into the next slot. Overwriting the second half of a
    /// category-2 value turns the first half into `Top`.
    pub fn store(&mut self, index: u16, typ: VerificationType) {
        let index = index as usize;
        let is_category2 = typ.is_category2();
        let needed = if is_category2 { index + 2 } else { index + 1 };
        if self.locals.len() < needed {
            self.locals.resize(needed, None);
        }

        if index > 0 && matches!(&self.locals[index - 1], Some(prev) if prev.is_category2()) {
            self.locals[index - 1] = Some(VerificationType::Top);
        }

        self.locals[index] = Some(typ);
        if is_category2 {
            self.locals[index + 1] = Some(VerificationType::Top);
        }
    }

    /// Mark an uninitialized reference as initialized, everywhere it occurs
    ///
    /// For `Uninitialized`, only values created by the same `new` instruction are replaced. For
    /// `UninitializedThis`, every `UninitializedThis` is replaced (there is only ever one receiver).
    pub fn reference_initialized(
        &mut self,
        reference: &VerificationType,
    ) -> Result<(), VerifierErrorKind> {
        match reference {
            VerificationType::Uninitialized(uninit) => {
                let initialized = VerificationType::Object(uninit.verification_type.clone());
                self.replace_all(|typ| typ == reference, &initialized);
                Ok(())
            }
            VerificationType::UninitializedThis(class) => {
                let initialized = VerificationType::Object(class.clone());
                self.replace_all(
                    |typ| matches!(typ, VerificationType::UninitializedThis(_)),
                    &initialized,
                );
                Ok(())
            }
            other => Err(VerifierErrorKind::NotUninitialized(other.clone())),
        }
    }

    /// Reset the stack to hold just the exception caught by a handler
    pub fn enter_exception_handler(&mut self, caught: BinaryName) {
        self.stack.clear();
        self.stack.push(VerificationType::Object(RefType::Object(caught)));
    }

    fn replace_all(
        &mut self,
        is_match: impl Fn(&VerificationType) -> bool,
        updated: &VerificationType,
    ) {
        let mut replaced: OffsetVec<VerificationType> = std::mem::take(&mut self.stack)
            .into_iter()
            .map(|(_, typ)| if is_match(&typ) { updated.clone() } else { typ })
            .collect();
        std::mem::swap(&mut self.stack, &mut replaced);

        for local in self.locals.iter_mut().flatten() {
            if is_match(local) {
                *local = updated.clone();
            }
        }
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        f.write_str("locals=[")?;
        for (i, local) in self.locals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match local {
                Some(typ) => write!(f, "{}", typ)?,
                None => f.write_str("_")?,
            }
        }
        f.write_str("] stack=[")?;
        for (i, (_, typ)) in self.stack.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", typ)?;
        }
        f.write_str("]")
    }
}
