//! Repository layer.
//!
//! Each repository is a cheap, cloneable handle over a shared
//! [`VideoStore`](crate::store::VideoStore). All mutation of stored state goes
//! through these types.

pub mod task_repo;
pub mod video_repo;

pub use task_repo::TaskRepo;
pub use video_repo::VideoRepo;
