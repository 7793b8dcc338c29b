use std::fmt::{Debug, Error as FmtError, Formatter};
use std::iter::FromIterator;
use std::ops::{Add, Sub};

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// Offset into an `OffsetVec`, or into the code array of a method
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Offset(pub usize);

impl Sub for Offset {
    type Output = isize;

    fn sub(self, other: Offset) -> isize {
        (self.0 as isize) - (other.0 as isize)
    }
}

impl Add<usize> for Offset {
    type Output = Offset;

    fn add(self, width: usize) -> Offset {
        Offset(self.0 + width)
    }
}

/// A vector of elements of different logical "widths", where the offset of an element is the sum
/// of the widths of the elements before it (as opposed to the number of preceding elements).
///
/// The operand stack is the main user: `long` and `double` values take up two words of stack,
/// everything else takes one, and the JVM measures the stack in words.
#[derive(Clone, PartialEq, Eq)]
pub struct OffsetVec<T> {
    entries: Vec<T>,

    /// Sum of the widths of all entries (aka. offset of the next element to be added)
    offset_len: Offset,
}

impl<T: Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: Offset(0),
        }
    }

    /// Number of entries (not their total width)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total width of the entries
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning its offset
    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len = offset + elem.width();
        self.entries.push(elem);
        offset
    }

    /// Remove the entry at the back, along with the offset it was at
    pub fn pop(&mut self) -> Option<(Offset, T)> {
        let elem = self.entries.pop()?;
        self.offset_len = Offset(self.offset_len.0 - elem.width());
        Some((self.offset_len, elem))
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = Offset(0);
    }

    /// Iterate over entries and their offsets, from the front
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            entries: self.entries.iter(),
            next_offset: Offset(0),
        }
    }
}

/// Iterator over the entries of a borrowed `OffsetVec`, along with their offsets
pub struct Iter<'a, T> {
    entries: std::slice::Iter<'a, T>,
    next_offset: Offset,
}

impl<'a, T: Width> Iterator for Iter<'a, T> {
    type Item = (Offset, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let elem = self.entries.next()?;
        let offset = self.next_offset;
        self.next_offset = offset + elem.width();
        Some((offset, elem))
    }
}

/// Iterator over the entries of an owned `OffsetVec`, along with their offsets
pub struct IntoIter<T> {
    entries: std::vec::IntoIter<T>,
    next_offset: Offset,
}

impl<T: Width> Iterator for IntoIter<T> {
    type Item = (Offset, T);

    fn next(&mut self) -> Option<Self::Item> {
        let elem = self.entries.next()?;
        let offset = self.next_offset;
        self.next_offset = offset + elem.width();
        Some((offset, elem))
    }
}

impl<T: Width> IntoIterator for OffsetVec<T> {
    type Item = (Offset, T);
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter {
            entries: self.entries.into_iter(),
            next_offset: Offset(0),
        }
    }
}

impl<'a, T: Width> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: Width> Default for OffsetVec<T> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        offset_vec.extend(elems);
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, elems: U) {
        for elem in elems {
            self.push(elem);
        }
    }
}

impl<T: Debug + Width> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let mut list = f.debug_list();
        for (offset, elem) in self {
            list.entry(&format_args!("#{} = {:?}", offset.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        OneWide(u8),
        TwoWide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::OneWide(_) => 1,
                Slot::TwoWide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_track_widths() {
        let slots: OffsetVec<Slot> = [
            Slot::OneWide(1),
            Slot::TwoWide(2),
            Slot::TwoWide(3),
            Slot::OneWide(4),
        ]
        .into_iter()
        .collect();
        assert_eq!(slots.len(), 4);
        assert_eq!(slots.offset_len(), Offset(6));
        assert_eq!(
            slots.iter().map(|(offset, _)| offset).collect::<Vec<_>>(),
            vec![Offset(0), Offset(1), Offset(3), Offset(5)]
        );
        assert_eq!(
            slots.into_iter().last(),
            Some((Offset(5), Slot::OneWide(4)))
        );
    }

    #[test]
    fn pop_rewinds_offset() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new();
        assert_eq!(slots.push(Slot::TwoWide(1)), Offset(0));
        assert_eq!(slots.push(Slot::OneWide(2)), Offset(2));
        assert_eq!(slots.last(), Some(&Slot::OneWide(2)));

        assert_eq!(slots.pop(), Some((Offset(2), Slot::OneWide(2))));
        assert_eq!(slots.offset_len(), Offset(2));
        assert_eq!(slots.pop(), Some((Offset(0), Slot::TwoWide(1))));
        assert_eq!(slots.pop(), None);
        assert_eq!(slots.offset_len(), Offset(0));
    }

    #[test]
    fn clear_and_debug() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new();
        slots.extend([Slot::TwoWide(1), Slot::OneWide(2)]);
        assert_eq!(
            format!("{:?}", slots),
            "[#0 = TwoWide(1), #2 = OneWide(2)]"
        );
        slots.clear();
        assert!(slots.is_empty());
        assert_eq!(slots, OffsetVec::default());
    }
}
