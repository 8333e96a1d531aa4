// crates/zkapp-merkle/src/list.rs

//! Generic hash-consed list.
//!
//! Commitment: `fold(next_hash, empty)` over elements in push order. The
//! element pushed last is the *head*; it is the first one popped and the
//! first one yielded by [`MerkleList::iter`] ("pop order").
//! [`MerkleList::for_each_bounded`] walks the other way ("push order").

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;
use zkapp_crypto::Field;

use crate::MerkleError;

/// How a list commits to one more element.
pub trait ListHasher<T> {
    /// Commitment after pushing `element` onto a list committed by `previous`.
    fn next_hash(previous: Field, element: &T) -> Field;

    /// Commitment of the empty list.
    fn empty_hash() -> Field;
}

/// One list cell: the element plus the commitment of everything below it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithHash<T> {
    /// Commitment of the list before this element was pushed.
    pub previous_hash: Field,
    /// The element.
    pub element: T,
}

/// Hash-consed list of `T`, committed with hasher `H`.
pub struct MerkleList<T, H> {
    hash: Field,
    empty: Field,
    // Push order; the head is the last cell.
    cells: Vec<WithHash<T>>,
    _hasher: PhantomData<fn() -> H>,
}

impl<T: Clone, H> Clone for MerkleList<T, H> {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash,
            empty: self.empty,
            cells: self.cells.clone(),
            _hasher: PhantomData,
        }
    }
}

impl<T: fmt::Debug, H> fmt::Debug for MerkleList<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleList")
            .field("hash", &self.hash)
            .field("len", &self.cells.len())
            .field("cells", &self.cells)
            .finish()
    }
}

impl<T: PartialEq, H> PartialEq for MerkleList<T, H> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.empty == other.empty && self.cells == other.cells
    }
}

impl<T: Eq, H> Eq for MerkleList<T, H> {}

impl<T, H: ListHasher<T>> Default for MerkleList<T, H> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, H: ListHasher<T>> MerkleList<T, H> {
    /// The empty list, committed by `H::empty_hash()`.
    #[must_use]
    pub fn empty() -> Self {
        Self::empty_from(H::empty_hash())
    }

    /// An empty list that continues from an existing commitment `base`.
    ///
    /// `is_empty()` compares against `base`, so popping stops there.
    #[must_use]
    pub const fn empty_from(base: Field) -> Self {
        Self {
            hash: base,
            empty: base,
            cells: Vec::new(),
            _hasher: PhantomData,
        }
    }

    /// Build a list whose pop order equals `items` order.
    pub fn from_reverse<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut list = Self::empty();
        for x in items.into_iter().rev() {
            list.push(x);
        }
        list
    }

    /// Reassemble a list from a claimed commitment and witness cells (push order).
    ///
    /// Nothing is checked here; pops check each witnessed head and
    /// [`MerkleList::verify_chain`] checks everything at once.
    #[must_use]
    pub const fn from_raw_parts(hash: Field, empty: Field, cells: Vec<WithHash<T>>) -> Self {
        Self {
            hash,
            empty,
            cells,
            _hasher: PhantomData,
        }
    }

    /// Split into `(hash, empty, cells)`.
    #[must_use]
    pub fn into_raw_parts(self) -> (Field, Field, Vec<WithHash<T>>) {
        (self.hash, self.empty, self.cells)
    }

    /// Current commitment.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> Field {
        self.hash
    }

    /// Commitment this list counts as empty.
    #[inline]
    #[must_use]
    pub const fn empty_hash(&self) -> Field {
        self.empty
    }

    /// True iff the commitment equals the empty commitment.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash == self.empty
    }

    /// Number of witnessed elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Push `element` onto the head.
    pub fn push(&mut self, element: T) {
        let previous_hash = self.hash;
        self.hash = H::next_hash(previous_hash, &element);
        self.cells.push(WithHash {
            previous_hash,
            element,
        });
    }

    /// Push `element` iff `cond`.
    pub fn push_if(&mut self, cond: bool, element: T) {
        if cond {
            self.push(element);
        }
    }

    /// Pop the head, checking the witness against the commitment.
    ///
    /// An empty list yields `Ok(None)` and stays unchanged.
    pub fn pop(&mut self) -> Result<Option<T>, MerkleError> {
        if self.is_empty() {
            return Ok(None);
        }
        let Some(cell) = self.cells.pop() else {
            return Err(MerkleError::MissingWitness { hash: self.hash });
        };
        let computed = H::next_hash(cell.previous_hash, &cell.element);
        if computed != self.hash {
            debug!(expected = %self.hash, %computed, "merkle list witness mismatch");
            let expected = self.hash;
            self.cells.push(cell);
            return Err(MerkleError::WitnessMismatch { expected, computed });
        }
        self.hash = cell.previous_hash;
        Ok(Some(cell.element))
    }

    /// Pop the head; an empty list is an error.
    pub fn pop_exn(&mut self) -> Result<T, MerkleError> {
        self.pop()?.ok_or(MerkleError::Empty)
    }

    /// Pop iff `cond`; the list is untouched otherwise.
    ///
    /// A taken pop on an empty list is an error.
    pub fn pop_if(&mut self, cond: bool) -> Result<Option<T>, MerkleError> {
        if cond {
            self.pop_exn().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Elements in pop order (head first).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.cells.iter().rev().map(|c| &c.element)
    }

    /// Visit exactly `max` slots in push order.
    ///
    /// Slot `i` receives `Some(element)` while elements remain and `None`
    /// (a dummy) afterwards. The whole chain is re-hashed before the first
    /// callback so a bad witness never produces partial output.
    pub fn for_each_bounded<F>(&self, max: usize, mut f: F) -> Result<(), MerkleError>
    where
        F: FnMut(Option<&T>, usize),
    {
        if self.cells.len() > max {
            return Err(MerkleError::TooLong {
                len: self.cells.len(),
                max,
            });
        }
        self.verify_chain()?;
        for i in 0..max {
            f(self.cells.get(i).map(|c| &c.element), i);
        }
        Ok(())
    }

    /// Recompute the commitment from the empty hash over all witnesses.
    pub fn verify_chain(&self) -> Result<(), MerkleError> {
        let mut acc = self.empty;
        for cell in &self.cells {
            if cell.previous_hash != acc {
                return Err(MerkleError::WitnessMismatch {
                    expected: cell.previous_hash,
                    computed: acc,
                });
            }
            acc = H::next_hash(acc, &cell.element);
        }
        if acc == self.hash {
            Ok(())
        } else {
            Err(MerkleError::WitnessMismatch {
                expected: self.hash,
                computed: acc,
            })
        }
    }

    /// Fail unless the commitment equals `expected`.
    pub fn assert_hash(&self, expected: Field) -> Result<(), MerkleError> {
        if self.hash == expected {
            Ok(())
        } else {
            Err(MerkleError::HashMismatch {
                expected,
                actual: self.hash,
            })
        }
    }

    /// Map elements into another list type, re-hashing with `H2`.
    ///
    /// Order is preserved; the result starts from `H2::empty_hash()`.
    pub fn map_into<U, H2, F>(self, mut f: F) -> MerkleList<U, H2>
    where
        H2: ListHasher<U>,
        F: FnMut(T) -> U,
    {
        let mut out = MerkleList::<U, H2>::empty();
        for cell in self.cells {
            out.push(f(cell.element));
        }
        out
    }
}

impl<T: Clone, H: ListHasher<T>> MerkleList<T, H> {
    /// Clone the elements out in pop order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T, H: ListHasher<T>> FromIterator<T> for MerkleList<T, H> {
    /// Push every item in iteration order.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::empty();
        list.extend(iter);
        list
    }
}

impl<T, H: ListHasher<T>> Extend<T> for MerkleList<T, H> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push(x);
        }
    }
}
