mod collector;
mod config;
mod engine;
mod face;
mod gate;
mod kinematics;
mod scorer;
mod verdict;
mod wasm;

pub use collector::*;
pub use config::*;
pub use engine::*;
pub use face::*;
pub use gate::*;
pub use kinematics::*;
pub use scorer::*;
pub use verdict::*;
pub use wasm::*;

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
