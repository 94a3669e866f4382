pub mod analysis;
pub mod echo;
pub mod speech;
pub mod topic;
pub mod turn;
