mod energy;
mod refine;
mod types;
mod weights;

pub use energy::{apply_cut, build_graph};
pub use refine::{segment, segment_with_cancel, Summary};
pub use types::{Label, Mask, Params, SeedRect};
pub use weights::NeighborWeights;
