mod dinic;
mod flow;

pub use dinic::CancelToken;
pub use flow::{Edge, FlowNetwork};
