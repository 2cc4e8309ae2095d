//! Identity shared by everything the simulation tracks day to day.

/// Something that keeps its identity while its state changes.
///
/// Items, contracts and purchase orders implement this; persistence keys
/// rows by `id()`.
pub trait Entity {
    type Id: Copy + Ord + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
