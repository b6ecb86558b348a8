// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod ids;
pub mod model;
pub mod scheduler;
pub mod selection;
pub mod state;
pub mod store;
pub mod tracker;
pub mod view;

pub use ids::*;
pub use model::*;
pub use scheduler::*;
pub use selection::*;
pub use state::*;
pub use store::*;
pub use tracker::*;
pub use view::*;
