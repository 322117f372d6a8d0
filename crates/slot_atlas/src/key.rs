use std::fmt;
use std::marker::PhantomData;

pub(crate) const FIRST_HANDLE: u64 = 1 << 12;
pub(crate) const FIRST_STAMP: u64 = 1 << 12;

slotmap::new_key_type! {
    pub(crate) struct NodeKey;
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id<Tag, Repr> {
    raw: Repr,
    _marker: PhantomData<Tag>,
}

impl<Tag, Repr: Copy> Copy for Id<Tag, Repr> {}

impl<Tag, Repr: Copy> Clone for Id<Tag, Repr> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag, Repr: fmt::Debug> fmt::Debug for Id<Tag, Repr> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(formatter)
    }
}

impl<Tag, Repr: fmt::Display> fmt::Display for Id<Tag, Repr> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(formatter)
    }
}

impl<Tag, Repr> Id<Tag, Repr> {
    pub(crate) const fn new(raw: Repr) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn raw(self) -> Repr
    where
        Repr: Copy,
    {
        self.raw
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotTag {}
/// Opaque identifier of one live allocation. Never reused by an allocator.
pub type SlotHandle = Id<SlotTag, u64>;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StampTag {}
/// Recency counter value; smaller is older.
pub type Stamp = Id<StampTag, u64>;

impl Stamp {
    /// Assigned to pinned leaves so that they sort after every real stamp.
    pub const PINNED: Stamp = Stamp::new(u64::MAX);

    pub const fn is_pinned(self) -> bool {
        self.raw == u64::MAX
    }
}

/// Monotonic source of handles or stamps, scoped to one allocator.
#[derive(Debug)]
pub(crate) struct Counter<Tag> {
    next: u64,
    _marker: PhantomData<Tag>,
}

impl<Tag> Counter<Tag> {
    pub(crate) const fn starting_at(first: u64) -> Self {
        Self {
            next: first,
            _marker: PhantomData,
        }
    }

    pub(crate) fn advance(&mut self) -> Id<Tag, u64> {
        let id = Id::new(self.next);
        self.next = self.next.checked_add(1).expect("atlas counter overflow");
        id
    }
}
