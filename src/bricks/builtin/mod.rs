//! Builtin bricks shipped with the runtime

mod basic;
mod control;
mod timing;
mod variables;

pub use basic::{EchoBrick, IdentityBrick, ReturnBrick, ThrowBrick};
pub use control::{ForEachBrick, IfElseBrick, TryExceptBrick};
pub use timing::WaitBrick;
pub use variables::{GetModVariableBrick, SetModVariableBrick, WaitModVariableBrick};

use super::Brick;
use std::sync::Arc;

/// Every builtin brick
pub fn all() -> Vec<Arc<dyn Brick>> {
    vec![
        Arc::new(IfElseBrick),
        Arc::new(ForEachBrick),
        Arc::new(TryExceptBrick),
        Arc::new(EchoBrick),
        Arc::new(IdentityBrick),
        Arc::new(ReturnBrick),
        Arc::new(ThrowBrick),
        Arc::new(WaitBrick),
        Arc::new(SetModVariableBrick),
        Arc::new(GetModVariableBrick),
        Arc::new(WaitModVariableBrick),
    ]
}
