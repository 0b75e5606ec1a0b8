//! Re-exports the parts of rayon that we use, so that the `single-threaded`
//! feature can swap in sequential replacements.

pub(crate) mod prelude {
    pub(crate) use rayon::iter::IndexedParallelIterator;
    pub(crate) use rayon::iter::IntoParallelRefIterator;
    pub(crate) use rayon::iter::IntoParallelRefMutIterator;
    pub(crate) use rayon::iter::ParallelIterator;
}
