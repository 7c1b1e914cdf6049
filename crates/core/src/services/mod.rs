mod batch;
mod ledger;
mod live;
mod retry;
mod snapshot;

pub use batch::*;
pub use ledger::*;
pub use live::*;
pub use retry::*;
pub use snapshot::*;
