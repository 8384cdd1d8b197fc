pub mod backward_op;
pub mod graph;

pub use backward_op::BackwardOp;
pub use graph::NodeId;
