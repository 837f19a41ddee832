use rand::seq::SliceRandom;
use rand::Rng;

/// Source of uniform permutations. Any `rand::Rng` is one; tests pass a seeded `StdRng`.
pub trait Shuffler {
    fn shuffle<T>(&mut self, items: &mut [T]);
}

impl<R: Rng + ?Sized> Shuffler for R {
    fn shuffle<T>(&mut self, items: &mut [T]) {
        SliceRandom::shuffle(items, self);
    }
}
