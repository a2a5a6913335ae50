use crate::keys::EntityRef;
use core::marker::PhantomData;

/// A side table keyed by `K`, growing on demand and filling unseen slots
/// with `V::default()`.
///
/// Used for per-span and per-node annotations computed after the primary
/// arena is built (e.g. the `used` propagation pass over already-allocated
/// `OperationSpan`s).
#[derive(Clone, Debug)]
pub struct SecondaryMap<K, V: Clone + Default> {
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V: Clone + Default> SecondaryMap<K, V> {
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }

    pub fn get(&self, key: K) -> &V {
        self.elems.get(key.index()).unwrap_or(&self.default)
    }

    pub fn set(&mut self, key: K, value: V) {
        let index = key.index();
        if index >= self.elems.len() {
            self.elems.resize(index + 1, self.default.clone());
        }
        self.elems[index] = value;
    }
}

impl<K: EntityRef, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V: Clone + Default> core::ops::Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, PartialEq, Eq)]
    struct K(u32);
    crate::entity_impl!(K, "k");

    #[test]
    fn unset_keys_read_as_default() {
        let map: SecondaryMap<K, bool> = SecondaryMap::new();
        assert!(!*map.get(K::new(41)));
    }

    #[test]
    fn set_then_get() {
        let mut map: SecondaryMap<K, u32> = SecondaryMap::new();
        map.set(K::new(3), 99);
        assert_eq!(*map.get(K::new(3)), 99);
        assert_eq!(*map.get(K::new(0)), 0);
    }
}
