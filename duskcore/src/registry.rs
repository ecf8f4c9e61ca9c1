use std::sync::Arc;

use indexmap::IndexMap;

use crate::surface::Surface;
use crate::{SessionId, SurfaceId};

/// Insertion-ordered, identity-keyed record of live surfaces and the
/// session each one is bound to.
///
/// Fan-out iterates registration order, so ordering is part of the
/// contract; removal preserves the order of the remaining entries.
#[derive(Default)]
pub struct SurfaceRegistry {
    entries: IndexMap<SurfaceId, RegisteredSurface>,
}

struct RegisteredSurface {
    surface: Arc<Surface>,
    session: SessionId,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, surface: Arc<Surface>, session: SessionId) {
        self.entries
            .insert(surface.id().clone(), RegisteredSurface { surface, session });
    }

    /// Unregistering a surface that is not a member is a no-op.
    pub fn unregister(&mut self, id: &SurfaceId) -> Option<Arc<Surface>> {
        self.entries.shift_remove(id).map(|entry| entry.surface)
    }

    pub fn contains(&self, id: &SurfaceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn session_of(&self, id: &SurfaceId) -> Option<SessionId> {
        self.entries.get(id).map(|entry| entry.session)
    }

    /// Surfaces bound to `session`, in registration order.
    pub fn members_of(&self, session: SessionId) -> Vec<Arc<Surface>> {
        self.entries
            .values()
            .filter(|entry| entry.session == session)
            .map(|entry| Arc::clone(&entry.surface))
            .collect()
    }

    /// Every registered surface, in registration order.
    pub fn surfaces(&self) -> Vec<Arc<Surface>> {
        self.entries
            .values()
            .map(|entry| Arc::clone(&entry.surface))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceSpec;

    fn surface(name: &str) -> Arc<Surface> {
        Surface::new(SurfaceSpec::display(name))
    }

    #[test]
    fn members_keep_registration_order() {
        let session = SessionId::new();
        let other = SessionId::new();
        let mut registry = SurfaceRegistry::new();

        registry.register(surface("b"), session);
        registry.register(surface("a"), session);
        registry.register(surface("c"), other);
        registry.register(surface("d"), session);

        let members: Vec<String> = registry
            .members_of(session)
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(members, ["b", "a", "d"]);
    }

    #[test]
    fn removal_preserves_order_of_the_rest() {
        let session = SessionId::new();
        let mut registry = SurfaceRegistry::new();
        registry.register(surface("a"), session);
        registry.register(surface("b"), session);
        registry.register(surface("c"), session);

        registry.unregister(&SurfaceId("b".to_string()));
        let members: Vec<String> = registry
            .members_of(session)
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(members, ["a", "c"]);
    }

    #[test]
    fn unregistering_a_stranger_is_a_no_op() {
        let mut registry = SurfaceRegistry::new();
        registry.register(surface("a"), SessionId::new());

        assert!(registry.unregister(&SurfaceId("ghost".to_string())).is_none());
        assert_eq!(registry.len(), 1);
    }
}
