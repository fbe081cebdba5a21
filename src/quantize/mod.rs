pub(crate) mod lookup;
pub(crate) mod median_cut;
