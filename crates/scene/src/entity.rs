use foundation::handles::Handle;

/// Identity of a live map shape owned by a [`crate::World`].
///
/// Handles are generational: once a shape is disposed its id never resolves
/// again, even after the slot is reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(pub Handle);

impl ShapeId {
    pub fn index(&self) -> u32 {
        self.0.index()
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}
