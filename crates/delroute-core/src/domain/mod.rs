mod cid;
mod duration;
mod timestamp;

pub use cid::Cid;
pub use duration::AdvisoryTtl;
pub use timestamp::UnixMillis;
